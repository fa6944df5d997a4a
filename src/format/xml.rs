//! The XML configuration format.
//!
//! The document is first turned into a structural JSON form (see [`to_json`]) and the `config`
//! object is picked out of that. Everything in XML is text, so the values go through
//! [`coerce`][crate::coerce::coerce] to get their types.
//!
//! ```xml
//! <?xml version="1.0"?>
//! <config Environment="staging">
//!   <HttpPort>8080</HttpPort>
//!   <Debug>true</Debug>
//!   <Proxy/>
//! </config>
//! ```
//!
//! This gives `@Environment = "staging"`, `HttpPort = 8080`, `Debug = true` and `Proxy = null`.

use std::io::{BufRead, Error as IoError};

use log::trace;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Decoder, Reader};
use serde_json::{Map, Value as JsonValue};

use super::json;
use crate::coerce::coerce;
use crate::configuration::Entry;
use crate::error::Error;
use crate::value::Value;

/// The name of the root element.
pub const ROOT: &str = "config";

/// Prefix of the attribute names in the structural form.
pub const ATTRIBUTE_PREFIX: &str = "@";

/// The key holding the text of an element that also has attributes or child elements.
pub const TEXT_KEY: &str = "#text";

struct Element {
    name: String,
    members: Map<String, JsonValue>,
    text: Option<String>,
}

impl Element {
    fn open(start: &BytesStart, decoder: Decoder) -> Result<Self, Error> {
        let name = decoder
            .decode(start.name().as_ref())
            .map_err(|e| Error::malformed_by("invalid element name", e))?
            .into_owned();
        let mut members = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| {
                Error::malformed_by(format!("invalid attribute of <{}>", name), e)
            })?;
            let key = decoder
                .decode(attr.key.as_ref())
                .map_err(|e| Error::malformed_by("invalid attribute name", e))?;
            let value = attr.decode_and_unescape_value(decoder).map_err(xml_error)?;
            members.insert(
                format!("{}{}", ATTRIBUTE_PREFIX, key),
                JsonValue::String(value.into_owned()),
            );
        }
        Ok(Self {
            name,
            members,
            text: None,
        })
    }

    fn push_text(&mut self, text: &str) {
        match self.text {
            Some(ref mut existing) => existing.push_str(text),
            None => self.text = Some(text.to_owned()),
        }
    }

    fn into_json(self) -> (String, JsonValue) {
        let Element {
            name,
            mut members,
            text,
        } = self;
        // Only the edges of the whole text are trimmed, not the pieces it was split into.
        let text = text
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty());
        let value = match text {
            None if members.is_empty() => JsonValue::Null,
            Some(text) if members.is_empty() => JsonValue::String(text),
            text => {
                if let Some(text) = text {
                    members.insert(TEXT_KEY.to_owned(), JsonValue::String(text));
                }
                JsonValue::Object(members)
            }
        };
        (name, value)
    }
}

fn xml_error(e: quick_xml::Error) -> Error {
    match e {
        quick_xml::Error::Io(e) => Error::Io {
            path: None,
            source: IoError::new(e.kind(), e.to_string()),
        },
        e => Error::malformed_by("invalid XML syntax", e),
    }
}

// Repeated elements of the same name turn into an array.
fn insert(members: &mut Map<String, JsonValue>, name: String, value: JsonValue) {
    match members.get_mut(&name) {
        Some(JsonValue::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = JsonValue::Array(vec![first, value]);
        }
        None => {
            members.insert(name, value);
        }
    }
}

fn add_text(stack: &mut [Element], text: &str) -> Result<(), Error> {
    match stack.last_mut() {
        Some(element) => {
            element.push_text(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(Error::malformed("text outside of the root element")),
    }
}

fn close(
    stack: &mut [Element],
    document: &mut Map<String, JsonValue>,
    element: Element,
) -> Result<(), Error> {
    let (name, value) = element.into_json();
    match stack.last_mut() {
        Some(parent) => insert(&mut parent.members, name, value),
        None if document.is_empty() => {
            document.insert(name, value);
        }
        None => return Err(Error::malformed("more than one root element")),
    }
    Ok(())
}

/// Converts an XML document into its structural JSON form.
///
/// The result is an object with a single member, named by the root element. Inside:
///
/// * Element names become keys.
/// * An element with only text becomes a string, an empty element becomes `null`.
/// * Attributes become members with the `@` prefix. If an element has attributes or child
///   elements, it becomes an object and its text (if any) goes under `#text`.
/// * Repeated elements of the same name become an array.
/// * CDATA is text. Comments, processing instructions and the declaration are dropped.
///
/// Leading and trailing whitespace of an element's text is trimmed. Whitespace inside it is kept,
/// even when the text is split by comments or CDATA sections. Text that is only whitespace
/// counts as no text.
pub fn to_json<R: BufRead>(reader: R) -> Result<Map<String, JsonValue>, Error> {
    let mut reader = Reader::from_reader(reader);
    let decoder = reader.decoder();
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut document = Map::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(start) => stack.push(Element::open(&start, decoder)?),
            Event::Empty(start) => {
                let element = Element::open(&start, decoder)?;
                close(&mut stack, &mut document, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::malformed("unexpected closing tag"))?;
                close(&mut stack, &mut document, element)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(xml_error)?;
                add_text(&mut stack, &text)?;
            }
            Event::CData(cdata) => {
                let text = decoder
                    .decode(&cdata)
                    .map_err(|e| Error::malformed_by("invalid CDATA section", e))?;
                add_text(&mut stack, &text)?;
            }
            Event::Eof => break,
            _ => (),
        }
        buf.clear();
    }
    if let Some(open) = stack.last() {
        return Err(Error::malformed(format!(
            "element <{}> is not closed",
            open.name
        )));
    }
    if document.is_empty() {
        return Err(Error::malformed("no root element"));
    }
    Ok(document)
}

/// Parses an XML configuration.
pub fn parse<R: BufRead>(reader: R) -> Result<Vec<Entry>, Error> {
    let mut document = to_json(reader)?;
    let config = match document.remove(ROOT) {
        Some(JsonValue::Object(config)) => config,
        _ => {
            return Err(Error::malformed(
                "XML configuration files must contain a root 'config' node",
            ))
        }
    };
    config
        .into_iter()
        .map(|(key, value)| {
            let value = resolve(&key, value)?;
            Ok(Entry { key, value })
        })
        .collect()
}

fn resolve(key: &str, value: JsonValue) -> Result<Value, Error> {
    match value {
        JsonValue::String(text) => Ok(coerce(&text)),
        JsonValue::Array(_) => Err(Error::malformed(format!(
            "key '{}' appears more than once",
            key
        ))),
        JsonValue::Object(_) => Err(Error::malformed(format!(
            "key '{}' holds a nested value, only scalar values are supported",
            key
        ))),
        typed => {
            trace!("Key '{}' is already typed", key);
            json::convert(key, typed)
        }
    }
}
