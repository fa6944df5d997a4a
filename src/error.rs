//! Error handling utilities.

use std::error::Error as StdError;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::{Error as IoError, ErrorKind};
use std::path::{Path, PathBuf};

use err_context::prelude::*;
use log::{log, Level};

/// A wrapper type for any error.
///
/// This is just a type alias for boxed standard error. Stores report their failures through this.
pub type AnyError = Box<dyn StdError + Send + Sync>;

/// Everything that can go wrong when loading a configuration.
///
/// Whatever the error, the store is left as it was before the load started.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The specifier is neither an absolute path nor a `%VARIABLE%`.
    InvalidSpecifier(String),

    /// The specifier refers to an environment variable that is not set.
    MissingEnvironmentVariable {
        name: String,
        /// Replaces the default message, if set.
        message: Option<String>,
    },

    /// The configuration file doesn't exist.
    FileNotFound { path: PathBuf, source: IoError },

    /// We are not allowed to read the configuration file.
    AccessDenied { path: PathBuf, source: IoError },

    /// Some other I/O failure while opening or reading the file.
    Io {
        path: Option<PathBuf>,
        source: IoError,
    },

    /// The file extension is neither `.json` nor `.xml`.
    UnsupportedFormat { path: PathBuf },

    /// The file can't be parsed or doesn't have the shape of a configuration.
    MalformedConfig {
        reason: String,
        source: Option<AnyError>,
    },

    /// The store refused to commit the new configuration.
    StoreTransactionFailed(AnyError),
}

impl Error {
    /// Sorts an error from opening a file into the right variant.
    pub(crate) fn open(path: &Path, source: IoError) -> Self {
        let path = path.to_owned();
        match source.kind() {
            ErrorKind::NotFound => Error::FileNotFound { path, source },
            ErrorKind::PermissionDenied => Error::AccessDenied { path, source },
            _ => Error::Io {
                path: Some(path),
                source,
            },
        }
    }

    pub(crate) fn malformed<R: Into<String>>(reason: R) -> Self {
        Error::MalformedConfig {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn malformed_by<R, E>(reason: R, source: E) -> Self
    where
        R: Into<String>,
        E: Into<AnyError>,
    {
        Error::MalformedConfig {
            reason: reason.into(),
            source: Some(source.into()),
        }
    }
}

impl Display for Error {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        match self {
            Error::InvalidSpecifier(specifier) => write!(
                fmt,
                "Invalid configuration path '{}'. It must either refer to an environment variable \
                 using the %<variable name>% syntax, or be an absolute path to a JSON or XML \
                 configuration file",
                specifier
            ),
            Error::MissingEnvironmentVariable {
                message: Some(message),
                ..
            } => fmt.write_str(message),
            Error::MissingEnvironmentVariable { name, message: None } => write!(
                fmt,
                "Could not find the environment variable '{}'. Set it to the path of a JSON or \
                 XML configuration file",
                name
            ),
            Error::FileNotFound { path, .. } => {
                write!(fmt, "Configuration file {:?} does not exist", path)
            }
            Error::AccessDenied { path, .. } => {
                write!(fmt, "Access to configuration file {:?} denied", path)
            }
            Error::Io {
                path: Some(path), ..
            } => write!(fmt, "Failed to read configuration file {:?}", path),
            Error::Io { path: None, .. } => fmt.write_str("Failed to read configuration"),
            Error::UnsupportedFormat { path } => {
                let ext = path
                    .extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_default();
                write!(
                    fmt,
                    "Unknown or unsupported file extension '{}' of {:?}",
                    ext, path
                )
            }
            Error::MalformedConfig { reason, .. } => {
                write!(fmt, "Invalid configuration file: {}", reason)
            }
            Error::StoreTransactionFailed(_) => {
                fmt.write_str("Failed to store the new configuration")
            }
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::FileNotFound { source, .. }
            | Error::AccessDenied { source, .. }
            | Error::Io { source, .. } => Some(source),
            Error::MalformedConfig {
                source: Some(source),
                ..
            } => Some(&**source),
            Error::StoreTransactionFailed(source) => Some(&**source),
            _ => None,
        }
    }
}

/// How to format errors in logs.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[non_exhaustive]
pub enum ErrorLogFormat {
    /// Multi-cause error will span multiple log messages.
    MultiLine,

    /// The error is formatted on a single line.
    ///
    /// The causes are separated by semicolons.
    SingleLine,
}

/// Log one error on given log level.
///
/// It is printed to the log with all the causes.
pub fn log_error(level: Level, target: &str, e: &AnyError, format: ErrorLogFormat) {
    match format {
        ErrorLogFormat::MultiLine => {
            for cause in e.chain() {
                log!(target: target, level, "{}", cause);
            }
        }
        ErrorLogFormat::SingleLine => {
            log!(target: target, level, "{}", e.display("; "));
        }
    }
}

/// A wrapper around a fallible function, logging any returned errors.
///
/// The errors will be logged in the provided target. You may want to provide `module_path!` as the
/// target.
///
/// # Examples
///
/// ```rust
/// use err_context::prelude::*;
/// use starconfig::error;
/// use starconfig::MemoryStore;
///
/// let store = MemoryStore::new();
/// let result = error::log_errors(module_path!(), || {
///     starconfig::materialize(&store, "/nonexistent/config.json", None)
///         .context("Didn't manage to load the configuration")?;
///     Ok(())
/// });
/// assert!(result.is_err());
/// ```
pub fn log_errors<R, F>(target: &str, f: F) -> Result<R, AnyError>
where
    F: FnOnce() -> Result<R, AnyError>,
{
    let result = f();
    if let Err(ref e) = result {
        log_error(Level::Error, target, e, ErrorLogFormat::MultiLine);
    }
    result
}
