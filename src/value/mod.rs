//! Module for the in-memory JSON value tree
//!
//! [`JsonValue`] is the fully materialized representation of a JSON document.
//! [`JsonTreeReader`] and [`JsonTreeWriter`] implement the streaming traits
//! on top of it, so code written against [`JsonReader`] or [`JsonWriter`]
//! works with a tree the same way it works with JSON text.

mod tree_reader;
mod tree_writer;

pub use tree_reader::JsonTreeReader;
pub use tree_writer::JsonTreeWriter;

use crate::reader::{JsonReader, JsonStreamReader, ReaderError, ReaderSettings, TransferError};
use crate::writer::{JsonNumberError, JsonStreamWriter, JsonWriter, WriterSettings};
use std::collections::HashMap;
use std::fmt::Display;
use std::io::{Read, Write};

/// Numeric value of a [`JsonValue::Number`]
///
/// JSON does not distinguish integers from floating point numbers, but an
/// `f64` cannot represent all `i64` values exactly, so both representations
/// are kept. Parsing stores a literal as [`I64`](Self::I64) when it is an
/// integer in the `i64` range and as [`F64`](Self::F64) otherwise.
#[derive(Clone, Copy, Debug)]
pub enum JsonNumber {
    /// Integer in the `i64` range, e.g. parsed from `12`
    I64(i64),
    /// Any other number, e.g. parsed from `12.5` or `1e100`
    F64(f64),
}

impl JsonNumber {
    /// Returns the value as `i64`, if it has the integer representation
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            JsonNumber::I64(i) => Some(*i),
            JsonNumber::F64(_) => None,
        }
    }

    /// Returns the value as `f64`, converting an integer value lossily if
    /// its magnitude exceeds 2^53
    pub fn as_f64(&self) -> f64 {
        match self {
            JsonNumber::I64(i) => *i as f64,
            JsonNumber::F64(f) => *f,
        }
    }
}

/// Compares by numeric value: `I64(2)` equals `F64(2.0)`. Unlike `f64`
/// equality, `F64(f64::NAN)` equals itself, so trees containing such a
/// value still compare equal to their copies.
impl PartialEq for JsonNumber {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (JsonNumber::I64(a), JsonNumber::I64(b)) => a == b,
            (JsonNumber::F64(a), JsonNumber::F64(b)) => a == b || (a.is_nan() && b.is_nan()),
            (JsonNumber::I64(a), JsonNumber::F64(b)) | (JsonNumber::F64(b), JsonNumber::I64(a)) => {
                *a as f64 == *b
            }
        }
    }
}

/// Writes the value the way it appears in a JSON document; non-finite
/// values are written as `NaN`, `Infinity` and `-Infinity`
impl Display for JsonNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JsonNumber::I64(i) => write!(f, "{i}"),
            JsonNumber::F64(v) if v.is_nan() => f.write_str("NaN"),
            JsonNumber::F64(v) if v.is_infinite() => {
                f.write_str(if *v < 0.0 { "-Infinity" } else { "Infinity" })
            }
            JsonNumber::F64(v) => write!(f, "{v}"),
        }
    }
}

/// A JSON value as a materialized tree
///
/// Containers own their children exclusively; [`Clone`] performs a deep copy.
/// Object members are stored in a [`HashMap`], so member order is not
/// preserved and the last write for a name wins.
///
/// # Example
///
/// ```
/// # use jsonpull::value::*;
/// let value = JsonValue::from_json_str(r#"{"a": [1, 2.5]}"#)?;
/// let a = value.get("a").unwrap();
/// assert_eq!(Some(1), a.get_index(0).and_then(JsonValue::as_i64));
/// assert_eq!(Some(2.5), a.get_index(1).and_then(JsonValue::as_f64));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, PartialEq, Debug)]
pub enum JsonValue {
    /// JSON `null`
    Null,
    /// JSON boolean value
    Bool(bool),
    /// JSON number value
    Number(JsonNumber),
    /// JSON string value
    String(String),
    /// JSON array of values
    Array(Vec<JsonValue>),
    /// JSON object, mapping member names to values
    Object(HashMap<String, JsonValue>),
}

impl JsonValue {
    /// Returns whether the value is JSON `null`
    pub fn is_null(&self) -> bool {
        matches!(self, JsonValue::Null)
    }

    /// Returns the boolean value, if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JsonValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number as `i64`, if this is a number with the integer
    /// representation
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            JsonValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Returns the number as `f64`, if this is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            JsonValue::Number(n) => Some(n.as_f64()),
            _ => None,
        }
    }

    /// Returns the string content, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsonValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the elements, if this is an array
    pub fn as_array(&self) -> Option<&Vec<JsonValue>> {
        match self {
            JsonValue::Array(elements) => Some(elements),
            _ => None,
        }
    }

    /// Returns the elements for in-place mutation, if this is an array
    pub fn as_array_mut(&mut self) -> Option<&mut Vec<JsonValue>> {
        match self {
            JsonValue::Array(elements) => Some(elements),
            _ => None,
        }
    }

    /// Returns the members, if this is an object
    pub fn as_object(&self) -> Option<&HashMap<String, JsonValue>> {
        match self {
            JsonValue::Object(members) => Some(members),
            _ => None,
        }
    }

    /// Returns the members for in-place mutation, if this is an object
    pub fn as_object_mut(&mut self) -> Option<&mut HashMap<String, JsonValue>> {
        match self {
            JsonValue::Object(members) => Some(members),
            _ => None,
        }
    }

    /// Returns the value of the member with the given name, if this is an
    /// object which has such a member
    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.as_object().and_then(|members| members.get(name))
    }

    /// Returns the element at the given index, if this is an array with
    /// enough elements
    pub fn get_index(&self, index: usize) -> Option<&JsonValue> {
        self.as_array().and_then(|elements| elements.get(index))
    }
}

// Conversion between trees, JSON text and JSON streams
impl JsonValue {
    /// Parses a JSON document with [default settings](ReaderSettings::default)
    pub fn from_json(json: impl Read) -> Result<JsonValue, ReaderError> {
        JsonValue::from_json_custom(json, ReaderSettings::default())
    }

    /// Parses a JSON document from a string with
    /// [default settings](ReaderSettings::default)
    pub fn from_json_str(json: &str) -> Result<JsonValue, ReaderError> {
        JsonValue::from_json(json.as_bytes())
    }

    /// Parses a JSON document with custom settings
    ///
    /// With default settings trailing data after the value is an error; with
    /// lenient settings only the first top-level value is consumed.
    pub fn from_json_custom(
        json: impl Read,
        settings: ReaderSettings,
    ) -> Result<JsonValue, ReaderError> {
        let mut json_reader = JsonStreamReader::new_custom(json, settings);
        let value = JsonValue::read_from(&mut json_reader)?;
        // With default settings this rejects trailing data
        json_reader.peek()?;
        Ok(value)
    }

    /// Reads the next value from a JSON reader as a tree
    pub fn read_from(json_reader: &mut impl JsonReader) -> Result<JsonValue, ReaderError> {
        let mut tree_writer = JsonTreeWriter::new();
        match json_reader.transfer_to(&mut tree_writer) {
            Ok(()) => {}
            Err(TransferError::ReaderError(e)) => return Err(e),
            // The tree writer performs no IO
            Err(TransferError::WriterError(_)) => unreachable!("tree writer reported an IO error"),
        }
        Ok(tree_writer.into_value())
    }

    /// Writes the value to a JSON writer
    ///
    /// Fails with [`JsonNumberError::InvalidNumber`] when the tree contains
    /// a non-finite number, which is not representable in JSON.
    pub fn write_to(&self, json_writer: &mut impl JsonWriter) -> Result<(), JsonNumberError> {
        match self {
            JsonValue::Null => json_writer.null_value()?,
            JsonValue::Bool(b) => json_writer.bool_value(*b)?,
            JsonValue::Number(JsonNumber::I64(i)) => json_writer.number_value(*i)?,
            JsonValue::Number(JsonNumber::F64(f)) => json_writer.fp_number_value(*f)?,
            JsonValue::String(s) => json_writer.string_value(s)?,
            JsonValue::Array(elements) => {
                json_writer.begin_array()?;
                for element in elements {
                    element.write_to(json_writer)?;
                }
                json_writer.end_array()?;
            }
            JsonValue::Object(members) => {
                json_writer.begin_object()?;
                for (name, value) in members {
                    json_writer.name(name)?;
                    value.write_to(json_writer)?;
                }
                json_writer.end_object()?;
            }
        }
        Ok(())
    }

    /// Writes the value as a JSON document with
    /// [default settings](WriterSettings::default)
    pub fn write_json(&self, writer: impl Write) -> Result<(), JsonNumberError> {
        self.write_json_custom(writer, WriterSettings::default())
    }

    /// Writes the value as a JSON document with custom settings
    pub fn write_json_custom(
        &self,
        writer: impl Write,
        settings: WriterSettings,
    ) -> Result<(), JsonNumberError> {
        let mut json_writer = JsonStreamWriter::new_custom(writer, settings);
        self.write_to(&mut json_writer)?;
        json_writer.finish_document()?;
        Ok(())
    }

    /// Returns the value as a compact JSON document
    pub fn to_json_string(&self) -> Result<String, JsonNumberError> {
        let mut out = Vec::new();
        self.write_json(&mut out)?;
        match String::from_utf8(out) {
            Ok(json) => Ok(json),
            // The writer only produces valid UTF-8
            Err(_) => unreachable!("writer produced invalid UTF-8"),
        }
    }
}

/// Writes the value as a compact JSON document
///
/// Fails when the tree contains a non-finite number; use
/// [`write_to`](JsonValue::write_to) directly to get the reason.
impl Display for JsonValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_json_string() {
            Ok(json) => f.write_str(&json),
            Err(_) => Err(std::fmt::Error),
        }
    }
}

impl From<bool> for JsonValue {
    fn from(value: bool) -> Self {
        JsonValue::Bool(value)
    }
}

impl From<i64> for JsonValue {
    fn from(value: i64) -> Self {
        JsonValue::Number(JsonNumber::I64(value))
    }
}

impl From<f64> for JsonValue {
    fn from(value: f64) -> Self {
        JsonValue::Number(JsonNumber::F64(value))
    }
}

impl From<&str> for JsonValue {
    fn from(value: &str) -> Self {
        JsonValue::String(value.to_owned())
    }
}

impl From<String> for JsonValue {
    fn from(value: String) -> Self {
        JsonValue::String(value)
    }
}

impl From<Vec<JsonValue>> for JsonValue {
    fn from(value: Vec<JsonValue>) -> Self {
        JsonValue::Array(value)
    }
}

impl From<HashMap<String, JsonValue>> for JsonValue {
    fn from(value: HashMap<String, JsonValue>) -> Self {
        JsonValue::Object(value)
    }
}
