//! Finding where the configuration file lives.
//!
//! The application names its configuration file by a *specifier*. That is either an absolute
//! path, or the name of an environment variable wrapped in `%` signs (`%StarConfigPath%`), in
//! which case the variable holds the path.

use std::env;
use std::ffi::OsString;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::trace;

use crate::error::Error;

/// The character wrapping environment variable names in a specifier.
pub const SENTINEL: char = '%';

/// The environment variable consulted when the application doesn't say otherwise.
pub const DEFAULT_ENV_VAR: &str = "StarConfigPath";

/// The specifier used when the application doesn't say otherwise.
pub const DEFAULT_SPECIFIER: &str = "%StarConfigPath%";

/// A parsed specifier.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Specifier {
    /// An absolute path to the configuration file.
    Path(PathBuf),
    /// The name of an environment variable holding the path.
    EnvVar(String),
}

impl Specifier {
    /// Resolves the specifier to a path, looking into the process environment.
    pub fn resolve(&self) -> Result<PathBuf, Error> {
        self.resolve_with(|name| env::var_os(name))
    }

    /// Resolves the specifier to a path, looking up variables through the given function.
    ///
    /// The path from the environment is returned as is. It is not checked to be absolute or to
    /// exist, that shows once the file gets opened.
    pub fn resolve_with<F>(&self, lookup: F) -> Result<PathBuf, Error>
    where
        F: FnOnce(&str) -> Option<OsString>,
    {
        match self {
            Specifier::Path(path) => Ok(path.clone()),
            Specifier::EnvVar(name) => {
                trace!("Looking up environment variable {}", name);
                lookup(name)
                    .map(PathBuf::from)
                    .ok_or_else(|| Error::MissingEnvironmentVariable {
                        name: name.clone(),
                        message: None,
                    })
            }
        }
    }
}

impl Default for Specifier {
    fn default() -> Self {
        Specifier::EnvVar(DEFAULT_ENV_VAR.to_owned())
    }
}

impl FromStr for Specifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidSpecifier(s.to_owned());
        if Path::new(s).is_absolute() {
            Ok(Specifier::Path(PathBuf::from(s)))
        } else if let Some(rest) = s.strip_prefix(SENTINEL) {
            let name = rest.strip_suffix(SENTINEL).unwrap_or(rest);
            // These can't be looked up in the environment, so they can't be right.
            if name.is_empty() || name.contains(&[SENTINEL, '=', '\0'][..]) {
                Err(invalid())
            } else {
                Ok(Specifier::EnvVar(name.to_owned()))
            }
        } else {
            Err(invalid())
        }
    }
}

impl Display for Specifier {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        match self {
            Specifier::Path(path) => write!(fmt, "{}", path.display()),
            Specifier::EnvVar(name) => write!(fmt, "{}{}{}", SENTINEL, name, SENTINEL),
        }
    }
}
