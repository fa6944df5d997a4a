//! The configuration entity.

use std::collections::btree_map::{BTreeMap, Iter, Keys};
use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::ser::{Serialize, Serializer};

use crate::value::{FromValue, KindMismatch, Value, ValueKind};

/// One key-value pair of a configuration.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Entry {
    pub key: String,
    pub value: Value,
}

impl Entry {
    pub fn new<K: Into<String>, V: Into<Value>>(key: K, value: V) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A handle of a configuration inside a store.
///
/// Handles are handed out in increasing order, so they also tell which configuration was created
/// first.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ConfigId(pub u64);

impl Display for ConfigId {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        write!(fmt, "#{}", self.0)
    }
}

/// A loaded configuration.
///
/// This is a flat mapping from keys to [`Value`]s. It is created by a store (see
/// [`Transaction::create`][crate::store::Transaction::create]) and the whole thing is replaced on
/// each reload, it is not modified in place by the loading.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Configuration {
    id: ConfigId,
    entries: BTreeMap<String, Value>,
}

impl Configuration {
    pub fn new<I>(id: ConfigId, entries: I) -> Self
    where
        I: IntoIterator<Item = Entry>,
    {
        let entries = entries
            .into_iter()
            .map(|Entry { key, value }| (key, value))
            .collect();
        Self { id, entries }
    }

    pub fn id(&self) -> ConfigId {
        self.id
    }

    /// Looks up a value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Looks up a value of a specific type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use starconfig::{ConfigId, Configuration, Entry, LookupError};
    ///
    /// let cfg = Configuration::new(ConfigId(1), vec![Entry::new("HttpPort", 8080)]);
    /// assert_eq!(8080, cfg.get_as::<i64>("HttpPort").unwrap());
    /// assert!(matches!(cfg.get_as::<bool>("HttpPort"), Err(LookupError::Mismatch { .. })));
    /// assert!(matches!(cfg.get_as::<i64>("Debug"), Err(LookupError::Missing(_))));
    /// ```
    pub fn get_as<T: FromValue>(&self, key: &str) -> Result<T, LookupError> {
        let value = self
            .get(key)
            .ok_or_else(|| LookupError::Missing(key.to_owned()))?;
        T::from_value(value).map_err(|KindMismatch { expected, found }| LookupError::Mismatch {
            key: key.to_owned(),
            expected,
            found,
        })
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterates through the entries, ordered by the key.
    pub fn iter(&self) -> Iter<String, Value> {
        self.entries.iter()
    }

    pub fn keys(&self) -> Keys<String, Value> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn set(&mut self, key: String, value: Value) {
        self.entries.insert(key, value);
    }
}

impl<'a> IntoIterator for &'a Configuration {
    type Item = (&'a String, &'a Value);
    type IntoIter = Iter<'a, String, Value>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Serializes as a map of the entries (the id is not part of it).
impl Serialize for Configuration {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(s)
    }
}

/// Returned by [`Configuration::get_as`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LookupError {
    /// There's no such key.
    Missing(String),
    /// The key is there, but holds a value of another kind.
    Mismatch {
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },
}

impl Display for LookupError {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        match self {
            LookupError::Missing(key) => write!(fmt, "Configuration key '{}' not found", key),
            LookupError::Mismatch {
                key,
                expected,
                found,
            } => write!(
                fmt,
                "Configuration key '{}' holds a {}, expected {}",
                key, found, expected
            ),
        }
    }
}

impl Error for LookupError {}
