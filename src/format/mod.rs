//! Parsing configuration files into entries.
//!
//! A configuration file is either JSON or XML, told apart by its extension. Both are reduced to
//! the same thing, a list of [`Entry`]s with typed [`Value`][crate::Value]s.
//!
//! * JSON: the file holds a single object. Its members are the entries, typed by JSON itself.
//! * XML: the root element is `config`. Its child elements (and attributes, prefixed with `@`) are
//!   the entries. The text is turned into the most specific type through
//!   [`coerce`][crate::coerce::coerce].

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, trace};

use crate::configuration::Entry;
use crate::error::Error;

pub mod json;
#[cfg(feature = "xml")]
pub mod xml;

/// A supported configuration file format.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Format {
    Json,
    #[cfg(feature = "xml")]
    Xml,
}

impl Format {
    /// Picks the format by the (case insensitive) file extension.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::path::Path;
    /// use starconfig::format::Format;
    ///
    /// assert_eq!(Format::Json, Format::from_path(Path::new("/etc/app/Config.JSON")).unwrap());
    /// assert!(Format::from_path(Path::new("/etc/app/Config.toml")).is_err());
    /// ```
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_ref().map(String::as_str) {
            Some("json") => Ok(Format::Json),
            #[cfg(feature = "xml")]
            Some("xml") => Ok(Format::Xml),
            _ => Err(Error::UnsupportedFormat {
                path: path.to_owned(),
            }),
        }
    }
}

/// Parses a configuration of the given format out of the reader.
///
/// Every entry has a non-empty key.
pub fn normalize<R: BufRead>(reader: R, format: Format) -> Result<Vec<Entry>, Error> {
    let entries = match format {
        Format::Json => json::parse(reader)?,
        #[cfg(feature = "xml")]
        Format::Xml => xml::parse(reader)?,
    };
    if entries.iter().any(|entry| entry.key.is_empty()) {
        return Err(Error::malformed("configuration keys must not be empty"));
    }
    trace!("Parsed {} entries from {:?}", entries.len(), format);
    Ok(entries)
}

/// Opens and parses a configuration file.
///
/// The file is closed before this returns, successfully or not.
pub fn read_file(path: &Path) -> Result<Vec<Entry>, Error> {
    debug!("Reading configuration file {:?}", path);
    let file = File::open(path).map_err(|e| Error::open(path, e))?;
    let format = Format::from_path(path)?;
    normalize(BufReader::new(file), format).map_err(|e| match e {
        Error::Io { path: None, source } => Error::Io {
            path: Some(path.to_owned()),
            source,
        },
        e => e,
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn extension_case_insensitive() {
        for name in &["a.json", "a.JSON", "a.Json", "dir.xml/a.json"] {
            assert_eq!(Format::Json, Format::from_path(Path::new(name)).unwrap());
        }
    }

    #[cfg(feature = "xml")]
    #[test]
    fn xml_extension() {
        assert_eq!(Format::Xml, Format::from_path(Path::new("Config.Xml")).unwrap());
    }

    #[test]
    fn empty_key() {
        for json in &[r#"{"": 1}"#, r#"{"": 1, "a": 2}"#] {
            match normalize(json.as_bytes(), Format::Json) {
                Err(Error::MalformedConfig { reason, .. }) => {
                    assert_eq!("configuration keys must not be empty", reason)
                }
                other => panic!("Unexpected result for {}: {:?}", json, other),
            }
        }
        assert_eq!(1, normalize(&br#"{" ": 1}"#[..], Format::Json).unwrap().len());
    }

    #[test]
    fn unsupported() {
        for name in &["a.yaml", "a", "a.json.bak", ".json", "json"] {
            match Format::from_path(Path::new(name)) {
                Err(Error::UnsupportedFormat { path }) => assert_eq!(PathBuf::from(name), path),
                other => panic!("Unexpected result for {}: {:?}", name, other),
            }
        }
    }
}
