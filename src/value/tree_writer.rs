//! Tree-backed implementation of [`JsonWriter`]

use super::{JsonNumber, JsonValue};
use crate::json_number::is_valid_json_number;
use crate::writer::{
    FiniteNumber, FloatingPointNumber, JsonNumberError, JsonWriter, WriterSettings,
};
use std::collections::HashMap;

enum Container {
    Array(Vec<JsonValue>),
    Object(HashMap<String, JsonValue>),
}

/// In-progress container together with the name under which it will be
/// attached to its parent object, if any
struct Frame {
    container: Container,
    name: Option<String>,
}

/// Parses a valid JSON number literal into its tree representation
fn parse_number(literal: &str) -> JsonNumber {
    match literal.parse::<i64>() {
        Ok(i) => JsonNumber::I64(i),
        Err(_) => match literal.parse::<f64>() {
            Ok(f) => JsonNumber::F64(f),
            // Every valid JSON number literal parses as f64
            Err(_) => unreachable!("cannot parse JSON number '{literal}'"),
        },
    }
}

/// A JSON writer implementation which builds a [`JsonValue`] tree
///
/// The methods of [`JsonWriter`] behave the same as for
/// [`JsonStreamWriter`](crate::writer::JsonStreamWriter), except that no IO
/// is performed, so the `Result` returns are always `Ok`. Once the value is
/// complete it is obtained with [`into_value`](Self::into_value).
///
/// # Example
///
/// ```
/// # use jsonpull::value::*;
/// # use jsonpull::writer::JsonWriter;
/// let mut tree_writer = JsonTreeWriter::new();
/// tree_writer.begin_object()?;
/// tree_writer.name("a")?;
/// tree_writer.number_value(1)?;
/// tree_writer.end_object()?;
///
/// let value = tree_writer.into_value();
/// assert_eq!(Some(1), value.get("a").and_then(JsonValue::as_i64));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct JsonTreeWriter {
    /// In-progress containers, innermost last
    stack: Vec<Frame>,
    /// Name of the current member, held back until its value is written
    pending_name: Option<String>,
    /// The completed top-level value
    root: Option<JsonValue>,
    settings: WriterSettings,
}

impl Default for JsonTreeWriter {
    fn default() -> Self {
        JsonTreeWriter::new()
    }
}

impl JsonTreeWriter {
    /// Creates a tree writer without any value, with
    /// [default settings](WriterSettings::default)
    pub fn new() -> Self {
        JsonTreeWriter::new_custom(WriterSettings::default())
    }

    /// Creates a tree writer with custom settings
    ///
    /// Only [`lenient`](WriterSettings::lenient) and
    /// [`serialize_nulls`](WriterSettings::serialize_nulls) have an effect;
    /// the text layout settings do not apply to a tree. A lenient tree
    /// writer accepts multiple top-level values, each replacing the
    /// previous one as root.
    pub fn new_custom(settings: WriterSettings) -> Self {
        JsonTreeWriter {
            stack: Vec::new(),
            pending_name: None,
            root: None,
            settings,
        }
    }

    /// Returns the written value
    ///
    /// # Panics
    ///
    /// Panics when the document is incomplete, that is when no value has
    /// been written yet or an array, object or member is still open.
    pub fn into_value(self) -> JsonValue {
        if self.pending_name.is_some() || !self.stack.is_empty() {
            panic!("Incorrect writer usage: attempt to take value of incomplete document");
        }
        match self.root {
            Some(value) => value,
            None => panic!("Incorrect writer usage: attempt to take value before writing one"),
        }
    }

    /// Verifies that a value may be written in the current scope
    fn check_before_value(&self) {
        match self.stack.last() {
            Some(Frame {
                container: Container::Object(_),
                ..
            }) if self.pending_name.is_none() => {
                panic!("Incorrect writer usage: attempt to write value when member name is expected");
            }
            None if self.root.is_some() && !self.settings.lenient => {
                panic!("Incorrect writer usage: attempt to write multiple top-level values, only allowed in lenient mode");
            }
            _ => {}
        }
    }

    /// Attaches a completed value to the enclosing container, or makes it
    /// the root when no container is open
    fn put(&mut self, value: JsonValue) {
        self.check_before_value();
        match self.stack.last_mut() {
            Some(Frame {
                container: Container::Array(elements),
                ..
            }) => elements.push(value),
            Some(Frame {
                container: Container::Object(members),
                ..
            }) => {
                let name = match self.pending_name.take() {
                    Some(name) => name,
                    // Checked by check_before_value
                    None => unreachable!("missing member name"),
                };
                // Last write for a name wins
                members.insert(name, value);
            }
            None => self.root = Some(value),
        }
    }

    fn begin_container(&mut self, container: Container) {
        self.check_before_value();
        let name = self.pending_name.take();
        self.stack.push(Frame { container, name });
    }

    fn end_container(&mut self, expect_array: bool, close_bracket: &str) {
        if self.pending_name.is_some() {
            panic!("Incorrect writer usage: attempt to end object while member value is expected");
        }
        let matches = match self.stack.last() {
            Some(Frame {
                container: Container::Array(_),
                ..
            }) => expect_array,
            Some(Frame {
                container: Container::Object(_),
                ..
            }) => !expect_array,
            None => false,
        };
        if !matches {
            panic!("Incorrect writer usage: attempt to write {close_bracket:?} without matching open container");
        }
        let frame = match self.stack.pop() {
            Some(frame) => frame,
            None => unreachable!("container stack is empty"),
        };
        let value = match frame.container {
            Container::Array(elements) => JsonValue::Array(elements),
            Container::Object(members) => JsonValue::Object(members),
        };
        // Reinstate the name under which the container is attached
        self.pending_name = frame.name;
        self.put(value);
    }
}

impl JsonWriter for JsonTreeWriter {
    fn begin_object(&mut self) -> Result<(), std::io::Error> {
        self.begin_container(Container::Object(HashMap::new()));
        Ok(())
    }

    fn end_object(&mut self) -> Result<(), std::io::Error> {
        self.end_container(false, "}");
        Ok(())
    }

    fn begin_array(&mut self) -> Result<(), std::io::Error> {
        self.begin_container(Container::Array(Vec::new()));
        Ok(())
    }

    fn end_array(&mut self) -> Result<(), std::io::Error> {
        self.end_container(true, "]");
        Ok(())
    }

    fn name(&mut self, name: &str) -> Result<(), std::io::Error> {
        if self.pending_name.is_some() {
            panic!("Incorrect writer usage: member name has already been written");
        }
        if !matches!(
            self.stack.last(),
            Some(Frame {
                container: Container::Object(_),
                ..
            })
        ) {
            panic!("Incorrect writer usage: attempt to write member name outside of object");
        }
        self.pending_name = Some(name.to_owned());
        Ok(())
    }

    fn null_value(&mut self) -> Result<(), std::io::Error> {
        if self.pending_name.is_some() && !self.settings.serialize_nulls {
            // Drop the complete member
            self.pending_name = None;
            return Ok(());
        }
        self.put(JsonValue::Null);
        Ok(())
    }

    fn bool_value(&mut self, value: bool) -> Result<(), std::io::Error> {
        self.put(JsonValue::Bool(value));
        Ok(())
    }

    fn string_value(&mut self, value: &str) -> Result<(), std::io::Error> {
        self.put(JsonValue::String(value.to_owned()));
        Ok(())
    }

    fn number_value<N: FiniteNumber>(&mut self, value: N) -> Result<(), std::io::Error> {
        self.put(JsonValue::Number(parse_number(&value.to_json_number())));
        Ok(())
    }

    fn fp_number_value<N: FloatingPointNumber>(
        &mut self,
        value: N,
    ) -> Result<(), JsonNumberError> {
        let literal = value.to_json_number()?;
        self.put(JsonValue::Number(parse_number(&literal)));
        Ok(())
    }

    fn number_string_value(&mut self, value: &str) -> Result<(), JsonNumberError> {
        if !is_valid_json_number(value) {
            return Err(JsonNumberError::InvalidNumber(value.to_owned()));
        }
        self.put(JsonValue::Number(parse_number(value)));
        Ok(())
    }

    fn flush(&mut self) -> Result<(), std::io::Error> {
        Ok(())
    }

    fn finish_document(self) -> Result<(), std::io::Error> {
        if self.pending_name.is_some() || !self.stack.is_empty() || self.root.is_none() {
            panic!("Incorrect writer usage: attempt to finish incomplete document");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_document() {
        let mut tree_writer = JsonTreeWriter::new();
        tree_writer.begin_object().unwrap();
        tree_writer.name("a").unwrap();
        tree_writer.begin_array().unwrap();
        tree_writer.number_value(1).unwrap();
        tree_writer.fp_number_value(2.5).unwrap();
        tree_writer.string_value("s").unwrap();
        tree_writer.bool_value(true).unwrap();
        tree_writer.null_value().unwrap();
        tree_writer.end_array().unwrap();
        tree_writer.end_object().unwrap();

        assert_eq!(
            JsonValue::from_json_str(r#"{"a": [1, 2.5, "s", true, null]}"#).unwrap(),
            tree_writer.into_value()
        );
    }

    #[test]
    fn last_write_for_name_wins() {
        let mut tree_writer = JsonTreeWriter::new();
        tree_writer.begin_object().unwrap();
        tree_writer.name("a").unwrap();
        tree_writer.number_value(1).unwrap();
        tree_writer.name("a").unwrap();
        tree_writer.number_value(2).unwrap();
        tree_writer.end_object().unwrap();

        assert_eq!(
            JsonValue::from_json_str(r#"{"a": 2}"#).unwrap(),
            tree_writer.into_value()
        );
    }

    #[test]
    fn number_literals() {
        let mut tree_writer = JsonTreeWriter::new();
        tree_writer.begin_array().unwrap();
        tree_writer.number_string_value("12").unwrap();
        tree_writer.number_string_value("12.0").unwrap();
        tree_writer.number_string_value("1e500").unwrap();
        tree_writer.number_value(u64::MAX).unwrap();
        tree_writer.end_array().unwrap();

        let value = tree_writer.into_value();
        assert_eq!(Some(&JsonValue::Number(JsonNumber::I64(12))), value.get_index(0));
        assert_eq!(
            Some(&JsonValue::Number(JsonNumber::F64(12.0))),
            value.get_index(1)
        );
        assert_eq!(
            Some(&JsonValue::Number(JsonNumber::F64(f64::INFINITY))),
            value.get_index(2)
        );
        assert_eq!(
            Some(&JsonValue::Number(JsonNumber::F64(u64::MAX as f64))),
            value.get_index(3)
        );
    }

    #[test]
    fn invalid_number_literal_is_rejected() {
        let mut tree_writer = JsonTreeWriter::new();
        match tree_writer.number_string_value("NaN") {
            Err(JsonNumberError::InvalidNumber(s)) => assert_eq!("NaN", s),
            r => panic!("unexpected result: {r:?}"),
        }
    }

    #[test]
    #[should_panic(expected = "Incorrect writer usage")]
    fn value_without_name_panics() {
        let mut tree_writer = JsonTreeWriter::new();
        tree_writer.begin_object().unwrap();
        let _ = tree_writer.bool_value(true);
    }

    #[test]
    #[should_panic(expected = "Incorrect writer usage")]
    fn name_outside_object_panics() {
        let mut tree_writer = JsonTreeWriter::new();
        tree_writer.begin_array().unwrap();
        let _ = tree_writer.name("a");
    }

    #[test]
    #[should_panic(expected = "Incorrect writer usage")]
    fn second_top_level_value_panics() {
        let mut tree_writer = JsonTreeWriter::new();
        tree_writer.bool_value(true).unwrap();
        let _ = tree_writer.bool_value(false);
    }

    #[test]
    fn lenient_replaces_root() {
        let mut tree_writer = JsonTreeWriter::new_custom(WriterSettings {
            lenient: true,
            ..Default::default()
        });
        tree_writer.bool_value(true).unwrap();
        tree_writer.number_value(2).unwrap();

        assert_eq!(JsonValue::from(2_i64), tree_writer.into_value());
    }

    #[test]
    fn null_suppression() {
        let mut tree_writer = JsonTreeWriter::new_custom(WriterSettings {
            serialize_nulls: false,
            ..Default::default()
        });
        tree_writer.begin_object().unwrap();
        tree_writer.name("a").unwrap();
        tree_writer.null_value().unwrap();
        tree_writer.name("b").unwrap();
        tree_writer.number_value(1).unwrap();
        tree_writer.end_object().unwrap();

        assert_eq!(
            JsonValue::from_json_str(r#"{"b": 1}"#).unwrap(),
            tree_writer.into_value()
        );
    }

    #[test]
    #[should_panic(expected = "Incorrect writer usage")]
    fn mismatched_container_end_panics() {
        let mut tree_writer = JsonTreeWriter::new();
        tree_writer.begin_array().unwrap();
        let _ = tree_writer.end_object();
    }

    #[test]
    #[should_panic(expected = "Incorrect writer usage")]
    fn incomplete_document_value_panics() {
        let mut tree_writer = JsonTreeWriter::new();
        tree_writer.begin_array().unwrap();
        tree_writer.into_value();
    }

    #[test]
    #[should_panic(expected = "Incorrect writer usage")]
    fn empty_document_value_panics() {
        JsonTreeWriter::new().into_value();
    }
}
