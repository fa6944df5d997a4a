//! Loads the configuration and prints what the application would serve as `GET /config`.
//!
//! Run with `-c /absolute/path/config.xml` or with `StarConfigPath` set. `--dump-config` dumps the
//! configuration as TOML instead.

use log::{info, Level};
use starconfig::cfg_loader::Builder;
use starconfig::error;
use starconfig::{AnyError, MemoryStore};
use starconfig_cfg_helpers::CfgDump;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Opts {
    /// Print the configuration on a single line.
    #[structopt(long = "compact")]
    compact: bool,

    #[structopt(flatten)]
    dump: CfgDump,
}

fn main() {
    env_logger::init();
    let (opts, loader): (Opts, _) = Builder::new()
        .missing_env_message("Set StarConfigPath or pass -c with the configuration file")
        .build();
    let log_cfg = starconfig_cfg_helpers::config_logging(Level::Debug);
    let store = MemoryStore::new();
    let result = error::log_errors(module_path!(), || -> Result<(), AnyError> {
        let cfg = loader.materialize(&store)?;
        log_cfg(&cfg);
        opts.dump.dump(&cfg);
        let current = starconfig::current(&store).ok_or("No configuration in the store")?;
        let body = if opts.compact {
            serde_json::to_string(&*current)?
        } else {
            serde_json::to_string_pretty(&*current)?
        };
        println!("{}", body);
        info!("Served configuration {}", current.id());
        Ok(())
    });
    if result.is_err() {
        std::process::exit(1);
    }
}
