//! The typed values configuration entries hold.
//!
//! Whatever format the configuration file is written in, every value ends up as one of the scalar
//! kinds of [`Value`]. There are no lists or nested tables ‒ a configuration is a flat mapping
//! from keys to these.

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};

use chrono::{DateTime, FixedOffset, Timelike};
use rust_decimal::Decimal;
use serde::ser::{Serialize, Serializer};

/// A single configuration value.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Value {
    /// A 64-bit signed integer.
    Integer(i64),
    /// A decimal number.
    ///
    /// Anything numeric that didn't come in as an `i64` integer, including integral values written
    /// with a fraction (JSON `1.0`) and integers too big for an `i64`.
    Decimal(Decimal),
    /// A boolean.
    Bool(bool),
    /// A point in time, with the offset it was written with.
    ///
    /// Timestamps written without an offset are interpreted in the local time zone.
    Timestamp(DateTime<FixedOffset>),
    /// An explicitly empty value.
    Null,
    /// Anything else.
    String(String),
}

/// The kind of a [`Value`], without the payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ValueKind {
    Integer,
    Decimal,
    Bool,
    Timestamp,
    Null,
    String,
}

impl Display for ValueKind {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        let name = match self {
            ValueKind::Integer => "integer",
            ValueKind::Decimal => "decimal",
            ValueKind::Bool => "boolean",
            ValueKind::Timestamp => "timestamp",
            ValueKind::Null => "null",
            ValueKind::String => "string",
        };
        fmt.write_str(name)
    }
}

impl Value {
    /// Which kind of value this is.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Integer(_) => ValueKind::Integer,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::Bool(_) => ValueKind::Bool,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::Null => ValueKind::Null,
            Value::String(_) => ValueKind::String,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a decimal.
    ///
    /// Integers are widened, so a key holding `5` can be read as a decimal too.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Integer(i) => Some(Decimal::from(*i)),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Value::Timestamp(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Formats the value the way it would be written in a configuration file.
///
/// Parsing the output with [`coerce`][crate::coerce::coerce] gives back an equal value, except for
/// [`Null`][Value::Null] (rendered as an empty string) and strings that happen to look like one of
/// the other kinds.
impl Display for Value {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        match self {
            Value::Integer(i) => write!(fmt, "{}", i),
            Value::Decimal(d) => write!(fmt, "{}", d),
            Value::Bool(b) => write!(fmt, "{}", b),
            Value::Timestamp(t) => {
                // Seven fractional digits, the shape coerce recognizes as a timestamp.
                write!(
                    fmt,
                    "{}.{:07}",
                    t.format("%Y-%m-%dT%H:%M:%S"),
                    t.nanosecond() / 100
                )?;
                if t.offset().local_minus_utc() == 0 {
                    fmt.write_str("Z")
                } else {
                    write!(fmt, "{}", t.format("%:z"))
                }
            }
            Value::Null => Ok(()),
            Value::String(s) => fmt.write_str(s),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Integer(i) => s.serialize_i64(*i),
            Value::Decimal(d) => match exact_f64(d) {
                Some(f) => s.serialize_f64(f),
                None => s.serialize_str(&d.to_string()),
            },
            Value::Bool(b) => s.serialize_bool(*b),
            Value::Timestamp(_) => s.serialize_str(&self.to_string()),
            Value::Null => s.serialize_none(),
            Value::String(v) => s.serialize_str(v),
        }
    }
}

/// Converts the decimal to a float, but only if the float reads back as the very same decimal.
///
/// Dumps use this to write a decimal as a number when it is safe and as a string otherwise.
pub fn exact_f64(d: &Decimal) -> Option<f64> {
    let f: f64 = d.to_string().parse().ok()?;
    let back: Decimal = f.to_string().parse().ok()?;
    if back == *d && f.is_finite() {
        Some(f)
    } else {
        None
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

macro_rules! from_small_int {
    ($($ty: ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Integer(i64::from(v))
                }
            }
        )*
    };
}

from_small_int!(i8, i16, i32, u8, u16, u32);

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Returned when a value doesn't have the kind the caller asked for.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KindMismatch {
    pub expected: ValueKind,
    pub found: ValueKind,
}

impl Display for KindMismatch {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        write!(fmt, "Expected {}, found {}", self.expected, self.found)
    }
}

impl Error for KindMismatch {}

/// Types that can be extracted out of a [`Value`].
///
/// Used by [`Configuration::get_as`][crate::Configuration::get_as].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, KindMismatch>;
}

macro_rules! from_value {
    ($ty: ty, $kind: ident, $extract: expr) => {
        impl FromValue for $ty {
            fn from_value(value: &Value) -> Result<Self, KindMismatch> {
                let extract: fn(&Value) -> Option<$ty> = $extract;
                extract(value).ok_or(KindMismatch {
                    expected: ValueKind::$kind,
                    found: value.kind(),
                })
            }
        }
    };
}

from_value!(i64, Integer, Value::as_i64);
from_value!(Decimal, Decimal, Value::as_decimal);
from_value!(bool, Bool, Value::as_bool);
from_value!(DateTime<FixedOffset>, Timestamp, |v| v.as_timestamp().copied());
from_value!(String, String, |v| v.as_str().map(str::to_owned));

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, KindMismatch> {
        Ok(value.clone())
    }
}

/// Null reads as `None`, anything else has to be a `T`.
impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, KindMismatch> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
