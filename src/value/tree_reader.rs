//! Tree-backed implementation of [`JsonReader`]

use super::{JsonNumber, JsonValue};
use crate::reader::{Expected, JsonReader, JsonToken, ReaderError, ReaderPosition};
use crate::scope::{Scope, ScopeStack};
use std::collections::hash_map;
use std::iter::Peekable;
use std::slice;

/// Cursor position within the tree; containers are represented by their
/// iterator so begin and end tokens can be synthesized
#[derive(Debug)]
enum Slot<'a> {
    /// A value which has not been consumed yet
    Value(&'a JsonValue),
    /// Elements of an array whose start has been consumed
    ArrayIter(Peekable<slice::Iter<'a, JsonValue>>),
    /// Members of an object whose start has been consumed
    ObjectIter(Peekable<hash_map::Iter<'a, String, JsonValue>>),
    /// A member name promoted to a string value, see
    /// [`JsonTreeReader::promote_name_to_value`]
    PromotedName(&'a str),
}

fn token_of(value: &JsonValue) -> JsonToken {
    match value {
        JsonValue::Null => JsonToken::Null,
        JsonValue::Bool(_) => JsonToken::Boolean,
        JsonValue::Number(_) => JsonToken::Number,
        JsonValue::String(_) => JsonToken::String,
        JsonValue::Array(_) => JsonToken::BeginArray,
        JsonValue::Object(_) => JsonToken::BeginObject,
    }
}

/// A JSON reader implementation which reads from a [`JsonValue`] tree
///
/// The methods of [`JsonReader`] behave the same as for
/// [`JsonStreamReader`](crate::reader::JsonStreamReader) reading the
/// corresponding JSON text, except that error locations only carry a path
/// and no line information. Numbers stored as [`JsonNumber::F64`] are
/// treated like their number literal, so for example
/// [`next_i64`](JsonReader::next_i64) fails for them.
///
/// # Example
///
/// ```
/// # use jsonpull::reader::*;
/// # use jsonpull::value::*;
/// let value = JsonValue::from_json_str(r#"{"a": 1}"#)?;
/// let mut json_reader = JsonTreeReader::new(&value);
/// json_reader.begin_object()?;
/// assert_eq!("a", json_reader.next_name()?);
/// assert_eq!(1, json_reader.next_i64()?);
/// json_reader.end_object()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct JsonTreeReader<'a> {
    /// Cursor stack, innermost position last; empty once the top-level
    /// value has been consumed
    slots: Vec<Slot<'a>>,
    stack: ScopeStack,
}

impl<'a> JsonTreeReader<'a> {
    /// Creates a reader for the given value as top-level value
    pub fn new(value: &'a JsonValue) -> Self {
        JsonTreeReader {
            slots: vec![Slot::Value(value)],
            stack: ScopeStack::new(),
        }
    }

    /// Consumes the name of the next object member as if it were a string
    /// value
    ///
    /// Afterwards the name can be read with a value method such as
    /// [`next_string`](JsonReader::next_string), followed by the member
    /// value. This allows deserializing member names as typed values.
    pub fn promote_name_to_value(&mut self) -> Result<(), ReaderError> {
        self.check_not_closed();
        match self.peek()? {
            JsonToken::Name => {}
            token => return Err(self.unexpected(Expected::Name, token)),
        }
        let (name, value) = self.next_entry();
        self.stack.set_path_name(name);
        self.stack.replace_top(Scope::DanglingName);
        self.slots.push(Slot::Value(value));
        self.slots.push(Slot::PromotedName(name));
        Ok(())
    }

    fn check_not_closed(&self) {
        if self.stack.top() == Scope::Closed {
            panic!("Incorrect reader usage: reader is closed");
        }
    }

    fn unexpected(&self, expected: Expected, actual: JsonToken) -> ReaderError {
        ReaderError::UnexpectedToken {
            expected,
            actual,
            location: self.current_position(),
        }
    }

    fn malformed_number(&self, literal: String) -> ReaderError {
        ReaderError::MalformedNumber {
            literal,
            location: self.current_position(),
        }
    }

    /// Returns the value the cursor is positioned before, without consuming
    /// it; the caller must have verified that the next token is a value
    fn peek_value(&mut self) -> &'a JsonValue {
        match self.slots.last_mut() {
            Some(Slot::Value(value)) => *value,
            Some(Slot::ArrayIter(iter)) => match iter.peek() {
                Some(value) => *value,
                None => unreachable!("array iterator is exhausted"),
            },
            _ => unreachable!("no value available"),
        }
    }

    /// Consumes the value the cursor is positioned before; the caller must
    /// have verified that the next token is a value
    fn take_value(&mut self) -> &'a JsonValue {
        if let Some(Slot::ArrayIter(iter)) = self.slots.last_mut() {
            return match iter.next() {
                Some(value) => value,
                None => unreachable!("array iterator is exhausted"),
            };
        }
        match self.slots.pop() {
            Some(Slot::Value(value)) => value,
            _ => unreachable!("no value available"),
        }
    }

    /// Consumes the next object member entry; the caller must have verified
    /// that the next token is a member name
    fn next_entry(&mut self) -> (&'a str, &'a JsonValue) {
        match self.slots.last_mut() {
            Some(Slot::ObjectIter(iter)) => match iter.next() {
                Some((name, value)) => (name, value),
                None => unreachable!("object iterator is exhausted"),
            },
            _ => unreachable!("no member name available"),
        }
    }

    /// Updates the scope after a value has been fully consumed
    fn on_value_end(&mut self) {
        match self.stack.top() {
            Scope::EmptyDocument => self.stack.replace_top(Scope::NonemptyDocument),
            Scope::EmptyArray => {
                self.stack.replace_top(Scope::NonemptyArray);
                self.stack.increment_path_index();
            }
            Scope::NonemptyArray => self.stack.increment_path_index(),
            Scope::DanglingName => self.stack.replace_top(Scope::NonemptyObject),
            // A value cannot end in any other scope
            scope => unreachable!("value ended in scope {scope}"),
        }
    }

    /// Consumes a scalar value, or a promoted name
    fn consume_scalar(&mut self) {
        if matches!(self.slots.last(), Some(Slot::PromotedName(_))) {
            self.slots.pop();
            // The member value is still pending, the scope stays DanglingName
            return;
        }
        self.take_value();
        self.on_value_end();
    }

    fn next_int<T>(&mut self) -> Result<T, ReaderError>
    where
        T: TryFrom<i64> + std::str::FromStr,
    {
        self.check_not_closed();
        match self.peek()? {
            JsonToken::Number | JsonToken::String => {}
            token => return Err(self.unexpected(Expected::Number, token)),
        }
        if let Some(Slot::PromotedName(name)) = self.slots.last() {
            let name = *name;
            return match name.parse() {
                Ok(v) => {
                    self.slots.pop();
                    Ok(v)
                }
                Err(_) => Err(self.malformed_number(name.to_owned())),
            };
        }
        let value = self.peek_value();
        let converted: Option<T> = match value {
            JsonValue::Number(JsonNumber::I64(i)) => T::try_from(*i).ok(),
            // A number with a fraction or exponent is not an integer
            JsonValue::Number(JsonNumber::F64(_)) => None,
            JsonValue::String(s) => s.parse().ok(),
            _ => unreachable!("peek reported a string or number"),
        };
        match converted {
            Some(v) => {
                self.take_value();
                self.on_value_end();
                Ok(v)
            }
            None => {
                let literal = match value {
                    JsonValue::Number(n) => n.to_string(),
                    JsonValue::String(s) => s.clone(),
                    _ => unreachable!("peek reported a string or number"),
                };
                Err(self.malformed_number(literal))
            }
        }
    }
}

impl JsonReader for JsonTreeReader<'_> {
    fn peek(&mut self) -> Result<JsonToken, ReaderError> {
        self.check_not_closed();
        let token = match self.slots.last_mut() {
            None => JsonToken::EndOfDocument,
            Some(Slot::Value(value)) => token_of(value),
            Some(Slot::ArrayIter(iter)) => match iter.peek() {
                Some(value) => token_of(value),
                None => JsonToken::EndArray,
            },
            Some(Slot::ObjectIter(iter)) => match iter.peek() {
                Some(_) => JsonToken::Name,
                None => JsonToken::EndObject,
            },
            Some(Slot::PromotedName(_)) => JsonToken::String,
        };
        Ok(token)
    }

    fn begin_object(&mut self) -> Result<(), ReaderError> {
        self.check_not_closed();
        match self.peek()? {
            JsonToken::BeginObject => {}
            token => return Err(self.unexpected(Expected::ObjectStart, token)),
        }
        match self.take_value() {
            JsonValue::Object(members) => {
                self.slots.push(Slot::ObjectIter(members.iter().peekable()));
                self.stack.push(Scope::EmptyObject);
            }
            _ => unreachable!("peek reported object start"),
        }
        Ok(())
    }

    fn end_object(&mut self) -> Result<(), ReaderError> {
        self.check_not_closed();
        match self.peek()? {
            JsonToken::EndObject => {}
            token => return Err(self.unexpected(Expected::ObjectEnd, token)),
        }
        self.slots.pop();
        self.stack.pop();
        self.on_value_end();
        Ok(())
    }

    fn begin_array(&mut self) -> Result<(), ReaderError> {
        self.check_not_closed();
        match self.peek()? {
            JsonToken::BeginArray => {}
            token => return Err(self.unexpected(Expected::ArrayStart, token)),
        }
        match self.take_value() {
            JsonValue::Array(elements) => {
                self.slots.push(Slot::ArrayIter(elements.iter().peekable()));
                self.stack.push(Scope::EmptyArray);
            }
            _ => unreachable!("peek reported array start"),
        }
        Ok(())
    }

    fn end_array(&mut self) -> Result<(), ReaderError> {
        self.check_not_closed();
        match self.peek()? {
            JsonToken::EndArray => {}
            token => return Err(self.unexpected(Expected::ArrayEnd, token)),
        }
        self.slots.pop();
        self.stack.pop();
        self.on_value_end();
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, ReaderError> {
        Ok(!matches!(
            self.peek()?,
            JsonToken::EndArray | JsonToken::EndObject | JsonToken::EndOfDocument
        ))
    }

    fn next_name(&mut self) -> Result<String, ReaderError> {
        self.check_not_closed();
        match self.peek()? {
            JsonToken::Name => {}
            token => return Err(self.unexpected(Expected::Name, token)),
        }
        let (name, value) = self.next_entry();
        self.stack.set_path_name(name);
        self.stack.replace_top(Scope::DanglingName);
        self.slots.push(Slot::Value(value));
        Ok(name.to_owned())
    }

    fn next_string(&mut self) -> Result<String, ReaderError> {
        self.check_not_closed();
        match self.peek()? {
            JsonToken::String | JsonToken::Number => {}
            token => return Err(self.unexpected(Expected::String, token)),
        }
        if let Some(Slot::PromotedName(name)) = self.slots.last() {
            let name = (*name).to_owned();
            self.slots.pop();
            return Ok(name);
        }
        let result = match self.take_value() {
            JsonValue::String(s) => s.clone(),
            JsonValue::Number(n) => n.to_string(),
            _ => unreachable!("peek reported a string or number"),
        };
        self.on_value_end();
        Ok(result)
    }

    fn next_number_as_string(&mut self) -> Result<String, ReaderError> {
        self.check_not_closed();
        match self.peek()? {
            JsonToken::Number => {}
            token => return Err(self.unexpected(Expected::Number, token)),
        }
        let literal = match self.take_value() {
            JsonValue::Number(n) => n.to_string(),
            _ => unreachable!("peek reported a number"),
        };
        self.on_value_end();
        Ok(literal)
    }

    fn next_i64(&mut self) -> Result<i64, ReaderError> {
        self.next_int()
    }

    fn next_i32(&mut self) -> Result<i32, ReaderError> {
        self.next_int()
    }

    fn next_f64(&mut self) -> Result<f64, ReaderError> {
        self.check_not_closed();
        match self.peek()? {
            JsonToken::Number | JsonToken::String => {}
            token => return Err(self.unexpected(Expected::Number, token)),
        }
        if let Some(Slot::PromotedName(name)) = self.slots.last() {
            let name = *name;
            return match name.parse() {
                Ok(v) => {
                    self.slots.pop();
                    Ok(v)
                }
                Err(_) => Err(self.malformed_number(name.to_owned())),
            };
        }
        let value = self.peek_value();
        let converted = match value {
            JsonValue::Number(n) => Ok(n.as_f64()),
            JsonValue::String(s) => s.parse::<f64>().map_err(|_| s.clone()),
            _ => unreachable!("peek reported a string or number"),
        };
        match converted {
            Ok(f) => {
                self.take_value();
                self.on_value_end();
                Ok(f)
            }
            Err(literal) => Err(self.malformed_number(literal)),
        }
    }

    fn next_bool(&mut self) -> Result<bool, ReaderError> {
        self.check_not_closed();
        match self.peek()? {
            JsonToken::Boolean => {}
            token => return Err(self.unexpected(Expected::Boolean, token)),
        }
        let b = match self.take_value() {
            JsonValue::Bool(b) => *b,
            _ => unreachable!("peek reported a boolean"),
        };
        self.on_value_end();
        Ok(b)
    }

    fn next_null(&mut self) -> Result<(), ReaderError> {
        self.check_not_closed();
        match self.peek()? {
            JsonToken::Null => {}
            token => return Err(self.unexpected(Expected::Null, token)),
        }
        self.take_value();
        self.on_value_end();
        Ok(())
    }

    fn skip_value(&mut self) -> Result<(), ReaderError> {
        self.check_not_closed();
        if self.peek()? == JsonToken::Name {
            self.next_name()?;
            self.stack.set_path_name("null");
            return Ok(());
        }
        let mut depth = 0_u64;
        loop {
            let token = self.peek()?;
            match token {
                JsonToken::EndArray | JsonToken::EndObject | JsonToken::EndOfDocument
                    if depth == 0 =>
                {
                    return Err(self.unexpected(Expected::Value, token));
                }
                JsonToken::BeginArray => {
                    self.begin_array()?;
                    depth += 1;
                    continue;
                }
                JsonToken::BeginObject => {
                    self.begin_object()?;
                    depth += 1;
                    continue;
                }
                JsonToken::EndArray => {
                    self.end_array()?;
                    depth -= 1;
                }
                JsonToken::EndObject => {
                    self.end_object()?;
                    depth -= 1;
                }
                JsonToken::Name => {
                    self.next_name()?;
                    continue;
                }
                JsonToken::String | JsonToken::Number | JsonToken::Boolean | JsonToken::Null => {
                    self.consume_scalar();
                }
                // Handled by the guard arm above when depth == 0
                JsonToken::EndOfDocument => unreachable!("EndOfDocument inside a value"),
            }
            if depth == 0 {
                return Ok(());
            }
        }
    }

    fn path(&self) -> String {
        self.stack.format_path()
    }

    fn current_position(&self) -> ReaderPosition {
        ReaderPosition {
            path: Some(self.stack.format_path()),
            line_pos: None,
        }
    }

    fn close(&mut self) {
        self.slots.clear();
        self.stack.close();
    }
}
