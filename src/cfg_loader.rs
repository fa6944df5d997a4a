//! Configuration loading.
//!
//! Loading takes a specifier (see [`specifier`][crate::specifier]), finds the file, parses it and
//! installs the result into a [`Store`] as *the* configuration, replacing whatever configuration
//! was there before. The replacement happens in a single store transaction, so readers of the
//! store see either the old or the new configuration, never both or none.
//!
//! For the common case, the [`materialize`] function does everything. If the specifier should come
//! from the command line or the environment lookup needs to be tweaked, go through the
//! [`Builder`]:
//!
//! 1. Create a [`Builder`] with [`Builder::new`].
//! 2. Configure it.
//! 3. Parse the command line and prepare the loader with [`build`][Builder::build] (or
//!    [`build_no_opts`][Builder::build_no_opts] if the command line should not be considered).
//! 4. Load (as many times as needed) the configuration using
//!    [`materialize`][Loader::materialize].
//!
//! # Examples
//!
//! ```rust
//! use starconfig::cfg_loader::Builder;
//! use starconfig::{Error, MemoryStore};
//!
//! let store = MemoryStore::new();
//! let loader = Builder::new()
//!     .specifier("%MyAppConfig%")
//!     .missing_env_message("Point MyAppConfig to the configuration file")
//!     .env_lookup(|_| None)
//!     .build_no_opts();
//! match loader.materialize(&store) {
//!     Err(e @ Error::MissingEnvironmentVariable { .. }) => {
//!         assert_eq!("Point MyAppConfig to the configuration file", e.to_string());
//!     }
//!     other => panic!("Unexpected {:?}", other),
//! }
//! assert!(starconfig::current(&store).is_none());
//! ```

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, trace, warn};
use structopt::clap::{App, ArgMatches};
use structopt::{StructOpt, StructOptInternal};

use crate::configuration::{Configuration, Entry};
use crate::error::Error;
use crate::format;
use crate::specifier::{Specifier, DEFAULT_SPECIFIER};
use crate::store::Store;

#[derive(StructOpt)]
struct CommonOpts {
    /// The configuration file (absolute path), or %VARIABLE% holding the path to it.
    #[structopt(short = "c", long = "config")]
    config: Option<String>,
}

struct OptWrapper<O> {
    common: CommonOpts,
    other: O,
}

// StructOpt doesn't like flatten with type parameter, so we do it manually ‒ we take the type
// parameter's clap definition and add our own into it.
impl<O: StructOpt> StructOpt for OptWrapper<O> {
    fn clap<'a, 'b>() -> App<'a, 'b> {
        CommonOpts::augment_clap(O::clap())
    }

    fn from_clap(matches: &ArgMatches) -> Self {
        OptWrapper {
            common: StructOpt::from_clap(matches),
            other: StructOpt::from_clap(matches),
        }
    }
}

type EnvLookup = Box<dyn Fn(&str) -> Option<OsString> + Send + Sync>;

/// A builder for [`Loader`].
///
/// See the [module documentation](index.html) for details about the use.
pub struct Builder {
    specifier: String,
    missing_env_message: Option<String>,
    env: EnvLookup,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// Creates a new loader builder.
    ///
    /// The configuration is looked for through the `StarConfigPath` environment variable unless
    /// configured otherwise.
    pub fn new() -> Self {
        Self {
            specifier: DEFAULT_SPECIFIER.to_owned(),
            missing_env_message: None,
            env: Box::new(|name: &str| env::var_os(name)),
        }
    }

    /// Sets where to look for the configuration file.
    ///
    /// This is either an absolute path or `%VARIABLE%`. A `--config` on the command line takes
    /// precedence.
    pub fn specifier<S: Into<String>>(self, specifier: S) -> Self {
        Self {
            specifier: specifier.into(),
            ..self
        }
    }

    /// Replaces the error message used when the environment variable is not set.
    ///
    /// This can be used to tell the user how to fix the installation.
    pub fn missing_env_message<M: Into<String>>(self, message: M) -> Self {
        Self {
            missing_env_message: Some(message.into()),
            ..self
        }
    }

    /// Replaces the way environment variables are looked up.
    ///
    /// By default, the process environment is used. The variable is looked up on every load.
    pub fn env_lookup<F>(self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString> + Send + Sync + 'static,
    {
        Self {
            env: Box::new(lookup),
            ..self
        }
    }

    /// Turn the builder into the [`Loader`].
    ///
    /// This parses the command line options ‒ the ones specified by the type parameter, enriched
    /// by the `-c/--config` option to override the specifier.
    ///
    /// If the command line parsing fails, the application terminates (and prints relevant help).
    pub fn build<O: StructOpt>(self) -> (O, Loader) {
        let opts = OptWrapper::<O>::from_args();
        debug!("Parsed command line arguments");
        self.with_opts(opts)
    }

    /// Like [`build`][Builder::build], but parses the given arguments instead of the ones of the
    /// process.
    ///
    /// The first item is the program name.
    pub fn build_from<O, I>(self, args: I) -> (O, Loader)
    where
        O: StructOpt,
        I: IntoIterator,
        I::Item: Into<OsString> + Clone,
    {
        let opts = OptWrapper::<O>::from_iter(args);
        self.with_opts(opts)
    }

    fn with_opts<O>(self, opts: OptWrapper<O>) -> (O, Loader) {
        let mut loader = self.build_no_opts();
        if let Some(specifier) = opts.common.config {
            loader.specifier = specifier;
        }
        (opts.other, loader)
    }

    /// Turns this into the [`Loader`], without command line parsing.
    ///
    /// This is likely useful for tests.
    pub fn build_no_opts(self) -> Loader {
        trace!("Created cfg loader for {}", self.specifier);
        Loader {
            specifier: self.specifier,
            missing_env_message: self.missing_env_message,
            env: self.env,
        }
    }
}

/// The loader of configuration.
///
/// This is created by the [`Builder`]. See the [module documentation](index.html) for details.
pub struct Loader {
    specifier: String,
    missing_env_message: Option<String>,
    env: EnvLookup,
}

impl Loader {
    /// The specifier this loads from.
    pub fn specifier(&self) -> &str {
        &self.specifier
    }

    /// Finds the path of the configuration file.
    pub fn resolve(&self) -> Result<PathBuf, Error> {
        let specifier: Specifier = self.specifier.parse()?;
        specifier
            .resolve_with(|name| (self.env)(name))
            .map_err(|e| match e {
                Error::MissingEnvironmentVariable { name, .. } => {
                    Error::MissingEnvironmentVariable {
                        name,
                        message: self.missing_env_message.clone(),
                    }
                }
                e => e,
            })
    }

    /// Reads and parses the configuration file, without installing it anywhere.
    pub fn load(&self) -> Result<Vec<Entry>, Error> {
        let path = self.resolve()?;
        debug!("Loading configuration from {:?}", path);
        format::read_file(&path)
    }

    /// Loads the configuration file and makes it the current configuration of the store.
    ///
    /// On error, the store is left untouched.
    pub fn materialize<S: Store + ?Sized>(&self, store: &S) -> Result<Arc<Configuration>, Error> {
        let entries = self.load()?;
        install(store, entries)
    }
}

/// Replaces whatever configuration the store holds with a new one made of the entries.
///
/// All the configurations in the store are deleted (normally there's at most one) and the new one
/// created, in a single transaction.
pub fn install<S: Store + ?Sized>(
    store: &S,
    entries: Vec<Entry>,
) -> Result<Arc<Configuration>, Error> {
    let mut created = None;
    store
        .transact(&mut |txn| {
            let old = txn.configurations();
            if old.len() > 1 {
                warn!(
                    "Store holds {} configurations instead of one, removing all of them",
                    old.len()
                );
            }
            for id in old {
                trace!("Deleting configuration {}", id);
                txn.delete(id)?;
            }
            created = Some(txn.create(entries.clone())?);
            Ok(())
        })
        .map_err(Error::StoreTransactionFailed)?;
    let created = created.ok_or_else(|| {
        Error::StoreTransactionFailed("The store committed without running the transaction".into())
    })?;
    info!(
        "Installed configuration {} with {} entries",
        created.id(),
        created.len()
    );
    Ok(created)
}

/// Loads the configuration file and makes it the current configuration of the store.
///
/// The `specifier` is either an absolute path to the file or `%VARIABLE%`, an environment
/// variable holding the path ([`DEFAULT_SPECIFIER`] is the conventional one). If the variable is
/// not set, the error carries `missing_env_message` if provided.
///
/// # Examples
///
/// ```rust
/// use starconfig::{Error, MemoryStore};
///
/// let store = MemoryStore::new();
/// let err = starconfig::materialize(&store, "config.json", None).unwrap_err();
/// assert!(matches!(err, Error::InvalidSpecifier(_)));
/// ```
pub fn materialize<S: Store + ?Sized>(
    store: &S,
    specifier: &str,
    missing_env_message: Option<&str>,
) -> Result<Arc<Configuration>, Error> {
    let mut builder = Builder::new().specifier(specifier);
    if let Some(message) = missing_env_message {
        builder = builder.missing_env_message(message);
    }
    builder.build_no_opts().materialize(store)
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use crate::store::{current, MemoryStore, StoreError, Transaction};
    use crate::value::Value;

    use super::*;

    #[derive(StructOpt)]
    struct Opts {
        #[structopt(long = "verbose")]
        verbose: bool,
    }

    fn no_env() -> Builder {
        Builder::new().env_lookup(|_| None)
    }

    #[test]
    fn default_specifier() {
        let loader = Builder::new().build_no_opts();
        assert_eq!("%StarConfigPath%", loader.specifier());
    }

    #[test]
    fn missing_default_variable() {
        let store = MemoryStore::new();
        match no_env().build_no_opts().materialize(&store).unwrap_err() {
            Error::MissingEnvironmentVariable { name, message } => {
                assert_eq!("StarConfigPath", name);
                assert!(message.is_none());
            }
            e => panic!("Unexpected error {:?}", e),
        }
        assert!(current(&store).is_none());
    }

    #[test]
    fn message_override() {
        let loader = no_env()
            .specifier("%Nope%")
            .missing_env_message("Install me properly")
            .build_no_opts();
        let err = loader.resolve().unwrap_err();
        assert_eq!("Install me properly", err.to_string());
    }

    #[test]
    fn env_indirection() {
        let loader = Builder::new()
            .specifier("%AppConfig%")
            .env_lookup(|name| {
                if name == "AppConfig" {
                    Some(OsString::from("/srv/app/config.xml"))
                } else {
                    None
                }
            })
            .build_no_opts();
        assert_eq!(PathBuf::from("/srv/app/config.xml"), loader.resolve().unwrap());
    }

    #[test]
    fn command_line_override() {
        let (opts, loader): (Opts, _) =
            no_env().build_from(vec!["app", "--verbose", "-c", "%FromCmdLine%"]);
        assert!(opts.verbose);
        assert_eq!("%FromCmdLine%", loader.specifier());

        let (opts, loader): (Opts, _) = no_env().specifier("%Configured%").build_from(vec!["app"]);
        assert!(!opts.verbose);
        assert_eq!("%Configured%", loader.specifier());
    }

    #[test]
    fn invalid_specifier_keeps_store() {
        let store = MemoryStore::new();
        let old = install(&store, vec![Entry::new("a", 1)]).unwrap();
        let err = materialize(&store, "relative.json", None).unwrap_err();
        assert!(matches!(err, Error::InvalidSpecifier(ref s) if s == "relative.json"));
        assert_eq!(Some(old), current(&store));
    }

    #[test]
    fn install_replaces() {
        let store = MemoryStore::new();
        let first = install(&store, vec![Entry::new("a", 1), Entry::new("b", 2)]).unwrap();
        let second = install(&store, vec![Entry::new("a", 3)]).unwrap();
        assert_ne!(first.id(), second.id());
        let configs = store.configurations();
        assert_eq!(1, configs.len());
        assert_eq!(Some(&Value::Integer(3)), configs[0].get("a"));
        assert!(!configs[0].contains_key("b"));
    }

    #[test]
    fn install_cleans_up_extra() {
        let store = MemoryStore::new();
        store
            .transact(&mut |txn| {
                txn.create(vec![Entry::new("a", 1)])?;
                txn.create(vec![Entry::new("a", 2)])?;
                Ok(())
            })
            .unwrap();
        assert_eq!(2, store.configurations().len());
        install(&store, vec![Entry::new("a", 3)]).unwrap();
        let configs = store.configurations();
        assert_eq!(1, configs.len());
        assert_eq!(Some(&Value::Integer(3)), configs[0].get("a"));
    }

    struct RefusingStore(MemoryStore);

    impl Store for RefusingStore {
        fn transact(
            &self,
            body: &mut dyn FnMut(&mut dyn Transaction) -> Result<(), StoreError>,
        ) -> Result<(), StoreError> {
            self.0.transact(&mut |txn| {
                body(txn)?;
                Err("Disk full".into())
            })
        }

        fn configurations(&self) -> Vec<Arc<Configuration>> {
            self.0.configurations()
        }
    }

    #[test]
    fn failed_commit_keeps_old() {
        let store = RefusingStore(MemoryStore::new());
        let old = install(&store.0, vec![Entry::new("a", 1)]).unwrap();
        match install(&store, vec![Entry::new("a", 2)]) {
            Err(Error::StoreTransactionFailed(e)) => assert_eq!("Disk full", e.to_string()),
            other => panic!("Unexpected result {:?}", other),
        }
        assert_eq!(vec![old], store.configurations());
    }
}
