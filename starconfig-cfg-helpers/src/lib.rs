#![doc(test(attr(deny(warnings))))]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Starconfig configuration helpers
//!
//! These helpers sit next to the [`starconfig`] loader. They aim at making the user experience
//! around the application's configuration more smooth. Specifically, they allow logging the
//! configuration whenever it is loaded and dumping the configuration the application actually
//! uses.
//!
//! # Features
//!
//! * `json` (on by default) enables dumping in JSON. TOML is always available.

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::process;
use std::str::FromStr;

use log::{log, Level};
use starconfig::value::exact_f64;
use starconfig::{AnyError, Configuration, Value};
use structopt::StructOpt;

/// Creates a function to log the configuration every time it is loaded.
///
/// This is useful when examining logs, to know with which configuration a problem happened. Call
/// the returned function with each freshly materialized configuration.
///
/// # Examples
///
/// ```rust
/// use log::Level;
/// use starconfig::{Entry, MemoryStore};
///
/// let log_cfg = starconfig_cfg_helpers::config_logging(Level::Info);
/// let store = MemoryStore::new();
/// let cfg = starconfig::install(&store, vec![Entry::new("HttpPort", 8080)]).unwrap();
/// log_cfg(&cfg);
/// ```
pub fn config_logging(level: Level) -> impl Fn(&Configuration) + Send + Sync + 'static {
    move |cfg: &Configuration| {
        log!(level, "Using configuration {} with {} entries", cfg.id(), cfg.len());
        for (key, value) in cfg {
            log!(level, "  {} = {} ({})", key, value, value.kind());
        }
    }
}

/// Unknown name passed as the `--dump-config-as` format.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DumpFormatParseError(String);

impl Display for DumpFormatParseError {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        write!(fmt, "Invalid config format {}", self.0)
    }
}

impl Error for DumpFormatParseError {}

/// The formats the configuration can be dumped in.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum DumpFormat {
    /// TOML.
    ///
    /// TOML has no null, so the null entries are left out.
    Toml,
    /// Pretty-printed JSON.
    #[cfg(feature = "json")]
    Json,
}

fn toml_value(value: &Value) -> Option<toml::Value> {
    let converted = match value {
        Value::Integer(i) => toml::Value::Integer(*i),
        // A float only if it is the very same number, so precision isn't silently lost.
        Value::Decimal(d) => match exact_f64(d) {
            Some(f) => toml::Value::Float(f),
            None => toml::Value::String(d.to_string()),
        },
        Value::Bool(b) => toml::Value::Boolean(*b),
        Value::Timestamp(ts) => {
            let text = ts.to_rfc3339();
            match text.parse::<toml::value::Datetime>() {
                Ok(dt) => toml::Value::Datetime(dt),
                Err(_) => toml::Value::String(text),
            }
        }
        Value::Null => return None,
        Value::String(s) => toml::Value::String(s.clone()),
    };
    Some(converted)
}

impl DumpFormat {
    /// Renders the configuration as text in this format.
    pub fn render(self, cfg: &Configuration) -> Result<String, AnyError> {
        let dump = match self {
            DumpFormat::Toml => {
                let table = cfg
                    .iter()
                    .filter_map(|(key, value)| toml_value(value).map(|v| (key.clone(), v)))
                    .collect();
                toml::to_string_pretty(&toml::Value::Table(table))?
            }
            #[cfg(feature = "json")]
            DumpFormat::Json => serde_json::to_string_pretty(cfg)?,
        };
        Ok(dump)
    }

    fn dump(self, cfg: &Configuration) {
        match self.render(cfg) {
            Ok(dump) => println!("{}", dump),
            Err(e) => {
                eprintln!("Can't dump the configuration: {}", e);
                process::exit(1);
            }
        }
    }
}

impl FromStr for DumpFormat {
    type Err = DumpFormatParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "toml" => Ok(DumpFormat::Toml),
            #[cfg(feature = "json")]
            "json" => Ok(DumpFormat::Json),
            s => Err(DumpFormatParseError(s.to_owned())),
        }
    }
}

/// A command line fragment to add `--dump-config` to allow showing loaded configuration.
///
/// When this is added into the command line options structure, the `--dump-config` and
/// `--dump-config-as` options are added.
///
/// These dump the current configuration and exit.
///
/// The configuration is one file, but it can be hard to tell which one (it is often found through
/// an environment variable) and how the values in it were typed. This allows the user to query
/// the actual configuration the application would use.
///
/// # Examples
///
/// ```rust
/// use starconfig::cfg_loader::Builder;
/// use starconfig::{Entry, MemoryStore};
/// use starconfig_cfg_helpers::CfgDump;
/// use structopt::StructOpt;
///
/// #[derive(Debug, StructOpt)]
/// struct Opts {
///     #[structopt(flatten)]
///     dump: CfgDump,
/// }
///
/// let (opts, _loader): (Opts, _) = Builder::new().build_from(vec!["app"]);
/// let store = MemoryStore::new();
/// let cfg = starconfig::install(&store, vec![Entry::new("Debug", true)]).unwrap();
/// // Not asked to on the command line, so this does nothing
/// opts.dump.dump(&cfg);
/// ```
#[derive(Clone, Debug, Default, StructOpt)]
pub struct CfgDump {
    /// Dump the parsed configuration and exit.
    #[structopt(long = "--dump-config")]
    dump_config: bool,

    /// Dump the parsed configuration and exit.
    ///
    /// Allows choosing the format to dump in: toml
    #[cfg_attr(feature = "json", doc = "json")]
    #[structopt(long = "--dump-config-as")]
    dump_config_as: Option<DumpFormat>,
}

impl CfgDump {
    /// The format to dump in, if dumping was asked for.
    pub fn requested(&self) -> Option<DumpFormat> {
        match (self.dump_config_as, self.dump_config) {
            (Some(format), _) => Some(format),
            (None, true) => Some(DumpFormat::Toml),
            (None, false) => None,
        }
    }

    /// Dump configuration if it is asked for in the options.
    ///
    /// If the parsed options specify to dump the configuration, this does so and exits. If the
    /// options don't specify that, it does nothing.
    ///
    /// Note that for configuration to be dumped, it needs to be loaded first. Therefore call this
    /// after a successful materialization.
    pub fn dump(&self, cfg: &Configuration) {
        if let Some(format) = self.requested() {
            format.dump(cfg);
            process::exit(0);
        }
    }
}
