//! Inferring the type of untyped text.
//!
//! XML carries no types, everything in there is text. The [`coerce`] function picks the most
//! specific [`Value`] a piece of text can represent.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone};
use log::trace;
use rust_decimal::Decimal;

use crate::value::Value;

const TRUE_FORMS: &[&str] = &["true", "TRUE", "True"];
const FALSE_FORMS: &[&str] = &["false", "FALSE", "False"];

/// Turns a piece of text into the most specific value it represents.
///
/// The candidates are tried in this order, first match wins:
///
/// 1. A boolean (`true`, `TRUE`, `True` and the same forms of `false`).
/// 2. A round-trip ISO-8601 timestamp with exactly seven fractional digits
///    (`2024-03-01T12:30:00.5000000+02:00`, see [`parse_timestamp`]).
/// 3. A 64-bit signed integer.
/// 4. A decimal number.
/// 5. The text itself.
///
/// Numbers are tried after timestamps and integers before decimals, so `5` is an integer, not a
/// `5.0` decimal. This never fails, anything unrecognized stays a string.
///
/// # Examples
///
/// ```rust
/// use starconfig::coerce::coerce;
/// use starconfig::Value;
///
/// assert_eq!(Value::Integer(8080), coerce("8080"));
/// assert_eq!(Value::Bool(true), coerce("True"));
/// assert_eq!(Value::from("localhost"), coerce("localhost"));
/// ```
pub fn coerce(text: &str) -> Value {
    let value = if TRUE_FORMS.contains(&text) {
        Value::Bool(true)
    } else if FALSE_FORMS.contains(&text) {
        Value::Bool(false)
    } else if let Some(ts) = parse_timestamp(text) {
        Value::Timestamp(ts)
    } else if let Ok(i) = i64::from_str(text) {
        Value::Integer(i)
    } else if let Some(d) = parse_decimal(text) {
        Value::Decimal(d)
    } else {
        Value::String(text.to_owned())
    };
    trace!("Coerced {:?} to {}", text, value.kind());
    value
}

// The decimal parser skips underscores, which are not a part of any number notation here.
fn parse_decimal(text: &str) -> Option<Decimal> {
    if text.contains('_') {
        return None;
    }
    Decimal::from_str(text).ok()
}

/// The shape of the date and time part of a timestamp, `d` stands for any ASCII digit.
const TIMESTAMP_SHAPE: &[u8] = b"dddd-dd-ddTdd:dd:dd.ddddddd";

/// The shape of an explicit offset, after its sign.
const OFFSET_SHAPE: &[u8] = b"dd:dd";

fn has_shape(text: &[u8], shape: &[u8]) -> bool {
    text.len() == shape.len()
        && text.iter().zip(shape).all(|(&c, &s)| match s {
            b'd' => c.is_ascii_digit(),
            s => c == s,
        })
}

fn parse_offset(zone: &str) -> Option<FixedOffset> {
    let (sign, rest) = match *zone.as_bytes().first()? {
        b'+' => (1, &zone[1..]),
        b'-' => (-1, &zone[1..]),
        _ => return None,
    };
    if !has_shape(rest.as_bytes(), OFFSET_SHAPE) {
        return None;
    }
    let hours: i32 = rest[..2].parse().ok()?;
    let minutes: i32 = rest[3..].parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Parses a round-trip ISO-8601 timestamp.
///
/// The accepted form is `yyyy-MM-ddTHH:mm:ss.fffffff`, with exactly seven fractional digits,
/// optionally followed by `Z` or an offset `+hh:mm`/`-hh:mm`. This is the form
/// [`Value`]'s `Display` produces. Without the zone, the local time zone is assumed; if the local
/// time doesn't exist (it falls into a DST gap), the text is not a timestamp.
///
/// ```rust
/// use starconfig::coerce::parse_timestamp;
///
/// assert!(parse_timestamp("2009-06-15T13:45:30.0000000-07:00").is_some());
/// assert!(parse_timestamp("2009-06-15T13:45:30Z").is_none());
/// ```
pub fn parse_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    let base_len = TIMESTAMP_SHAPE.len();
    if !text.is_char_boundary(base_len) {
        return None;
    }
    let (base, zone) = text.split_at(base_len);
    if !has_shape(base.as_bytes(), TIMESTAMP_SHAPE) {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(base, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    let offset = match zone {
        "" => {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(DateTime::<FixedOffset>::from)
        }
        "Z" => FixedOffset::east_opt(0)?,
        zone => parse_offset(zone)?,
    };
    offset.from_local_datetime(&naive).single()
}
