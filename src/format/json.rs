//! The JSON configuration format.
//!
//! The file is a single object. Members map to [`Value`]s directly: integers that fit into `i64`
//! become integers, other numbers become decimals. Nested arrays and objects are not configuration
//! values, they are kept as their JSON text.

use std::collections::HashSet;
use std::fmt::{Formatter, Result as FmtResult};
use std::io::{Error as IoError, Read};
use std::str::FromStr;

use log::debug;
use rust_decimal::Decimal;
use serde::de::{Deserialize, Deserializer, Error as DeError, MapAccess, Visitor};
use serde_json::error::Category;
use serde_json::{Number, Value as JsonValue};

use crate::configuration::Entry;
use crate::error::Error;
use crate::value::Value;

/// The members of the top-level object, in the order of the file.
///
/// Unlike deserializing into a map, this refuses duplicate keys instead of letting the last one
/// win.
struct Members(Vec<(String, JsonValue)>);

impl<'de> Deserialize<'de> for Members {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct MembersVisitor;

        impl<'de> Visitor<'de> for MembersVisitor {
            type Value = Members;

            fn expecting(&self, fmt: &mut Formatter) -> FmtResult {
                fmt.write_str("a single JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Members, A::Error> {
                let mut seen = HashSet::new();
                let mut members = Vec::new();
                while let Some((key, value)) = map.next_entry::<String, JsonValue>()? {
                    if !seen.insert(key.clone()) {
                        return Err(A::Error::custom(format_args!("duplicate key '{}'", key)));
                    }
                    members.push((key, value));
                }
                Ok(Members(members))
            }
        }

        d.deserialize_map(MembersVisitor)
    }
}

/// Parses a JSON configuration.
pub fn parse<R: Read>(reader: R) -> Result<Vec<Entry>, Error> {
    let Members(members) = serde_json::from_reader(reader).map_err(|e| match e.classify() {
        Category::Io => Error::Io {
            path: None,
            source: IoError::from(e),
        },
        Category::Data => Error::malformed_by(
            "JSON configuration files must contain a single JSON object with unique keys",
            e,
        ),
        Category::Syntax | Category::Eof => Error::malformed_by("invalid JSON syntax", e),
    })?;
    members
        .into_iter()
        .map(|(key, value)| {
            let value = convert(&key, value)?;
            Ok(Entry { key, value })
        })
        .collect()
}

/// Maps an already typed JSON value to a configuration value.
pub(crate) fn convert(key: &str, value: JsonValue) -> Result<Value, Error> {
    let value = match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(b),
        JsonValue::String(s) => Value::String(s),
        JsonValue::Number(n) => number(key, &n)?,
        nested @ JsonValue::Array(_) | nested @ JsonValue::Object(_) => {
            debug!("Keeping nested value of '{}' as JSON text", key);
            Value::String(nested.to_string())
        }
    };
    Ok(value)
}

fn number(key: &str, n: &Number) -> Result<Value, Error> {
    if let Some(i) = n.as_i64() {
        return Ok(Value::Integer(i));
    }
    if let Some(u) = n.as_u64() {
        return Ok(Value::Decimal(Decimal::from(u)));
    }
    let text = n.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map(Value::Decimal)
        .map_err(|e| {
            Error::malformed_by(
                format!("number {} of key '{}' doesn't fit into a decimal", text, key),
                e,
            )
        })
}
