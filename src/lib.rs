#![doc(test(attr(deny(warnings))))]
#![forbid(unsafe_code)]

//! Loading of application configuration from a single JSON or XML file.
//!
//! An application usually has a bunch of settings it reads from somewhere ‒ ports, paths,
//! switches. This crate reads them from one file and turns them into a flat, typed key-value
//! [`Configuration`]. The configuration is kept in a [`Store`] as a singleton ‒ there's at most one
//! current configuration at any time ‒ and it can be reloaded whenever the application decides
//! to. The reload replaces the old configuration atomically, so nobody ever sees the store without
//! a configuration, or with two of them.
//!
//! # What the crate does and how
//!
//! The loading goes through these steps:
//!
//! 1. The *specifier* is resolved to a path (see [`specifier`]). It is either an absolute path or
//!    the name of an environment variable holding the path, like `%StarConfigPath%`.
//! 2. The file is parsed according to its extension (see [`format`]). JSON carries its own types,
//!    XML is all text, so the types are inferred (see [`coerce`]).
//! 3. The old configuration is deleted from the store and the new one created in one transaction
//!    (see [`cfg_loader`] and [`store`]).
//!
//! Reading the configuration is then just asking the store for it with [`current`].
//!
//! # Examples
//!
//! ```rust
//! use std::fs;
//!
//! use starconfig::MemoryStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let path = std::env::temp_dir().join(format!("starconfig-doc-{}.xml", std::process::id()));
//! fs::write(&path, "<config><HttpPort>8080</HttpPort><Debug>true</Debug></config>")?;
//!
//! let store = MemoryStore::new();
//! starconfig::materialize(&store, path.to_str().unwrap(), None)?;
//!
//! let cfg = starconfig::current(&store).expect("Just loaded");
//! assert_eq!(8080, cfg.get_as::<i64>("HttpPort")?);
//! assert!(cfg.get_as::<bool>("Debug")?);
//! # fs::remove_file(&path)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! * `xml` (on by default): support for XML configuration files. Without it, only JSON is
//!   supported.

pub mod cfg_loader;
pub mod coerce;
mod configuration;
pub mod error;
pub mod format;
pub mod specifier;
pub mod store;
pub mod value;

pub use crate::cfg_loader::{install, materialize};
pub use crate::configuration::{ConfigId, Configuration, Entry, LookupError};
pub use crate::error::{AnyError, Error};
pub use crate::specifier::{Specifier, DEFAULT_ENV_VAR, DEFAULT_SPECIFIER};
pub use crate::store::{current, MemoryStore, Store, StoreError, Transaction};
pub use crate::value::{FromValue, Value, ValueKind};

pub mod prelude {
    pub use super::{current, materialize, Configuration, MemoryStore, Store, Value};
}
