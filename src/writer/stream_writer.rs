//! Streaming implementation of [`JsonWriter`]

use super::*;
use crate::json_number::is_valid_json_number;
use crate::scope::{Scope, ScopeStack};
use std::io::Write;

const WRITER_BUF_SIZE: usize = 1024;

/// Settings to customize the JSON output
///
/// These settings are used by [`JsonStreamWriter::new_custom`]. To avoid
/// repeating the default values for unchanged settings,
/// `..Default::default()` can be used:
/// ```
/// # use jsonpull::writer::WriterSettings;
/// WriterSettings {
///     html_safe: true,
///     // For all other settings use the default
///     ..Default::default()
/// }
/// # ;
/// ```
#[derive(Clone, Debug)]
pub struct WriterSettings {
    /// Whether the writer may produce documents which strict readers reject
    ///
    /// When enabled the document may contain any number of top-level values,
    /// including none at all; the values are separated by line breaks.
    /// Disabled by default.
    pub lenient: bool,

    /// Whether to escape characters with special meaning in HTML
    ///
    /// When enabled `<`, `>`, `&`, `=` and `'` are written as Unicode
    /// escape sequences, so that the output can be embedded in HTML and XML
    /// documents without further escaping. Disabled by default.
    pub html_safe: bool,

    /// Whether object members with a `null` value are written
    ///
    /// When disabled, writing a member name followed by
    /// [`null_value`](JsonWriter::null_value) writes nothing at all; `null`
    /// elements of arrays and a top-level `null` are always written.
    /// Enabled by default.
    pub serialize_nulls: bool,

    /// String with which to indent nested values, or `None` for compact
    /// output on a single line
    ///
    /// When indentation is enabled, elements and members are placed on
    /// lines of their own and the member name separator becomes `": "`
    /// instead of `":"`.
    pub indent: Option<String>,
}

impl Default for WriterSettings {
    fn default() -> Self {
        WriterSettings {
            lenient: false,
            html_safe: false,
            serialize_nulls: true,
            indent: None,
        }
    }
}

enum CharEscape {
    Literal(&'static str),
    Unicode,
}

/// A JSON writer implementation which writes data to a [`Write`]
///
/// Output is buffered internally, so wrapping the underlying writer in a
/// [`BufWriter`](std::io::BufWriter) is normally not necessary. The data is
/// only guaranteed to be completely written once
/// [`finish_document`](JsonWriter::finish_document) (or
/// [`flush`](JsonWriter::flush)) has been called.
///
/// # Example
///
/// ```
/// # use jsonpull::writer::*;
/// let mut writer = Vec::<u8>::new();
/// let mut json_writer = JsonStreamWriter::new_custom(
///     &mut writer,
///     WriterSettings {
///         indent: Some("  ".to_owned()),
///         ..Default::default()
///     },
/// );
/// json_writer.begin_array()?;
/// json_writer.bool_value(true)?;
/// json_writer.end_array()?;
/// json_writer.finish_document()?;
///
/// assert_eq!(String::from_utf8(writer)?, "[\n  true\n]");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct JsonStreamWriter<W: Write> {
    writer: W,
    buf: [u8; WRITER_BUF_SIZE],
    /// Index at which the next byte is placed in `buf`
    buf_write_pos: usize,
    stack: ScopeStack,
    /// Name of the current member, held back until its value is written
    deferred_name: Option<String>,
    settings: WriterSettings,
}

impl<W: Write> JsonStreamWriter<W> {
    /// Creates a JSON writer with [default settings](WriterSettings::default)
    pub fn new(writer: W) -> Self {
        JsonStreamWriter::new_custom(writer, WriterSettings::default())
    }

    /// Creates a JSON writer with custom settings
    pub fn new_custom(writer: W, settings: WriterSettings) -> Self {
        JsonStreamWriter {
            writer,
            buf: [0; WRITER_BUF_SIZE],
            buf_write_pos: 0,
            stack: ScopeStack::new(),
            deferred_name: None,
            settings,
        }
    }
}

impl<W: Write> std::fmt::Debug for JsonStreamWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStreamWriter")
            .field("deferred_name", &self.deferred_name)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// Output buffering
impl<W: Write> JsonStreamWriter<W> {
    fn flush_buf(&mut self) -> Result<(), std::io::Error> {
        self.writer.write_all(&self.buf[..self.buf_write_pos])?;
        self.buf_write_pos = 0;
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), std::io::Error> {
        let mut pos = 0;
        while pos < bytes.len() {
            let copied = (bytes.len() - pos).min(WRITER_BUF_SIZE - self.buf_write_pos);
            self.buf[self.buf_write_pos..self.buf_write_pos + copied]
                .copy_from_slice(&bytes[pos..pos + copied]);
            self.buf_write_pos += copied;
            pos += copied;
            if self.buf_write_pos == WRITER_BUF_SIZE {
                self.flush_buf()?;
            }
        }
        Ok(())
    }

    fn write_str(&mut self, s: &str) -> Result<(), std::io::Error> {
        self.write_bytes(s.as_bytes())
    }
}

// String escaping
impl<W: Write> JsonStreamWriter<W> {
    fn escape_char(&self, c: char) -> Option<CharEscape> {
        match c {
            '"' => Some(CharEscape::Literal("\\\"")),
            '\\' => Some(CharEscape::Literal("\\\\")),
            '\n' => Some(CharEscape::Literal("\\n")),
            '\r' => Some(CharEscape::Literal("\\r")),
            '\t' => Some(CharEscape::Literal("\\t")),
            '\u{0008}' => Some(CharEscape::Literal("\\b")),
            '\u{000C}' => Some(CharEscape::Literal("\\f")),
            c if (c as u32) < 0x20 => Some(CharEscape::Unicode),
            '<' | '>' | '&' | '=' | '\'' if self.settings.html_safe => Some(CharEscape::Unicode),
            // Valid JSON, but JavaScript line terminators when the output is
            // embedded in a script
            '\u{2028}' | '\u{2029}' => Some(CharEscape::Unicode),
            _ => None,
        }
    }

    fn write_escaped_string(&mut self, value: &str) -> Result<(), std::io::Error> {
        self.write_bytes(b"\"")?;
        let mut start = 0;
        for (i, c) in value.char_indices() {
            let escape = match self.escape_char(c) {
                None => continue,
                Some(escape) => escape,
            };
            self.write_bytes(value[start..i].as_bytes())?;
            match escape {
                CharEscape::Literal(s) => self.write_str(s)?,
                // All escaped chars are in the basic multilingual plane, so
                // a single escape sequence suffices
                CharEscape::Unicode => self.write_str(&format!("\\u{:04x}", c as u32))?,
            }
            start = i + c.len_utf8();
        }
        self.write_bytes(value[start..].as_bytes())?;
        self.write_bytes(b"\"")
    }
}

// Grammar enforcement and layout
impl<W: Write> JsonStreamWriter<W> {
    /// Writes a line break followed by the current indentation, when
    /// indentation is enabled
    fn newline(&mut self) -> Result<(), std::io::Error> {
        let indent = match &self.settings.indent {
            None => return Ok(()),
            Some(indent) => indent.clone(),
        };
        self.write_bytes(b"\n")?;
        // The document frame is not indented
        for _ in 1..self.stack.len() {
            self.write_str(&indent)?;
        }
        Ok(())
    }

    /// Writes the deferred member name, preceded by a member separator
    /// when necessary
    fn write_deferred_name(&mut self) -> Result<(), std::io::Error> {
        let name = match self.deferred_name.take() {
            None => return Ok(()),
            Some(name) => name,
        };
        if self.stack.top() == Scope::NonemptyObject {
            self.write_bytes(b",")?;
        }
        self.newline()?;
        self.stack.replace_top(Scope::DanglingName);
        self.write_escaped_string(&name)
    }

    /// Prepares for writing a value: verifies that a value is allowed in
    /// the current scope and writes pending separators
    fn before_value(&mut self) -> Result<(), std::io::Error> {
        match self.stack.top() {
            Scope::EmptyDocument => self.stack.replace_top(Scope::NonemptyDocument),
            Scope::NonemptyDocument => {
                if !self.settings.lenient {
                    panic!("Incorrect writer usage: attempt to write multiple top-level values, only allowed in lenient mode");
                }
                self.write_bytes(b"\n")?;
            }
            Scope::EmptyArray => {
                self.stack.replace_top(Scope::NonemptyArray);
                self.newline()?;
            }
            Scope::NonemptyArray => {
                self.write_bytes(b",")?;
                self.newline()?;
            }
            Scope::DanglingName => {
                self.stack.replace_top(Scope::NonemptyObject);
                self.write_bytes(if self.settings.indent.is_some() {
                    b": ".as_slice()
                } else {
                    b":".as_slice()
                })?;
            }
            Scope::EmptyObject | Scope::NonemptyObject => {
                panic!("Incorrect writer usage: attempt to write value when member name is expected");
            }
            // Only reachable through a closed tree writer; the stream
            // writer is consumed by finish_document
            Scope::Closed => panic!("Incorrect writer usage: writer is closed"),
        }
        Ok(())
    }

    /// Ends the current container, which must match `expected` scopes
    fn end_container(
        &mut self,
        empty: Scope,
        nonempty: Scope,
        close_bracket: &str,
    ) -> Result<(), std::io::Error> {
        if self.deferred_name.is_some() {
            panic!("Incorrect writer usage: attempt to end object while member value is expected");
        }
        let top = self.stack.top();
        if top != empty && top != nonempty {
            panic!("Incorrect writer usage: attempt to end {close_bracket:?} container in scope {top}");
        }
        let was_nonempty = top == nonempty;
        self.stack.pop();
        if was_nonempty {
            self.newline()?;
        }
        self.write_str(close_bracket)
    }
}

impl<W: Write> JsonWriter for JsonStreamWriter<W> {
    fn begin_object(&mut self) -> Result<(), std::io::Error> {
        self.write_deferred_name()?;
        self.before_value()?;
        self.stack.push(Scope::EmptyObject);
        self.write_bytes(b"{")
    }

    fn end_object(&mut self) -> Result<(), std::io::Error> {
        self.end_container(Scope::EmptyObject, Scope::NonemptyObject, "}")
    }

    fn begin_array(&mut self) -> Result<(), std::io::Error> {
        self.write_deferred_name()?;
        self.before_value()?;
        self.stack.push(Scope::EmptyArray);
        self.write_bytes(b"[")
    }

    fn end_array(&mut self) -> Result<(), std::io::Error> {
        self.end_container(Scope::EmptyArray, Scope::NonemptyArray, "]")
    }

    fn name(&mut self, name: &str) -> Result<(), std::io::Error> {
        if self.deferred_name.is_some() {
            panic!("Incorrect writer usage: member name has already been written");
        }
        if !matches!(
            self.stack.top(),
            Scope::EmptyObject | Scope::NonemptyObject
        ) {
            panic!("Incorrect writer usage: attempt to write member name outside of object");
        }
        self.deferred_name = Some(name.to_owned());
        Ok(())
    }

    fn null_value(&mut self) -> Result<(), std::io::Error> {
        if self.deferred_name.is_some() && !self.settings.serialize_nulls {
            // Drop the complete member
            self.deferred_name = None;
            return Ok(());
        }
        self.write_deferred_name()?;
        self.before_value()?;
        self.write_str("null")
    }

    fn bool_value(&mut self, value: bool) -> Result<(), std::io::Error> {
        self.write_deferred_name()?;
        self.before_value()?;
        self.write_str(if value { "true" } else { "false" })
    }

    fn string_value(&mut self, value: &str) -> Result<(), std::io::Error> {
        self.write_deferred_name()?;
        self.before_value()?;
        self.write_escaped_string(value)
    }

    fn number_value<N: FiniteNumber>(&mut self, value: N) -> Result<(), std::io::Error> {
        self.write_deferred_name()?;
        self.before_value()?;
        self.write_str(&value.to_json_number())
    }

    fn fp_number_value<N: FloatingPointNumber>(
        &mut self,
        value: N,
    ) -> Result<(), JsonNumberError> {
        let number = value.to_json_number()?;
        self.write_deferred_name()?;
        self.before_value()?;
        self.write_str(&number)?;
        Ok(())
    }

    fn number_string_value(&mut self, value: &str) -> Result<(), JsonNumberError> {
        if !is_valid_json_number(value) {
            return Err(JsonNumberError::InvalidNumber(value.to_owned()));
        }
        self.write_deferred_name()?;
        self.before_value()?;
        self.write_str(value)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), std::io::Error> {
        self.flush_buf()?;
        self.writer.flush()
    }

    fn finish_document(mut self) -> Result<(), std::io::Error> {
        if self.deferred_name.is_some() {
            panic!("Incorrect writer usage: attempt to finish document while member value is expected");
        }
        match self.stack.top() {
            Scope::NonemptyDocument => {}
            Scope::EmptyDocument => {
                if !self.settings.lenient {
                    panic!("Incorrect writer usage: attempt to finish document without any value");
                }
            }
            _ => panic!("Incorrect writer usage: attempt to finish document with unclosed arrays or objects"),
        }
        self.flush_buf()?;
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_with<F>(settings: WriterSettings, f: F) -> String
    where
        F: FnOnce(&mut JsonStreamWriter<&mut Vec<u8>>) -> Result<(), std::io::Error>,
    {
        let mut out = Vec::new();
        let mut json_writer = JsonStreamWriter::new_custom(&mut out, settings);
        f(&mut json_writer).unwrap();
        json_writer.finish_document().unwrap();
        String::from_utf8(out).unwrap()
    }

    fn write_compact<F>(f: F) -> String
    where
        F: FnOnce(&mut JsonStreamWriter<&mut Vec<u8>>) -> Result<(), std::io::Error>,
    {
        write_with(WriterSettings::default(), f)
    }

    #[test]
    fn compact_document() {
        let json = write_compact(|w| {
            w.begin_object()?;
            w.name("a")?;
            w.begin_array()?;
            w.number_value(1)?;
            w.fp_number_value(2.5).unwrap();
            w.string_value("s")?;
            w.bool_value(true)?;
            w.null_value()?;
            w.end_array()?;
            w.name("b")?;
            w.begin_object()?;
            w.end_object()?;
            w.end_object()
        });
        assert_eq!(r#"{"a":[1,2.5,"s",true,null],"b":{}}"#, json);
    }

    #[test]
    fn pretty_printing() {
        let json = write_with(
            WriterSettings {
                indent: Some("  ".to_owned()),
                ..Default::default()
            },
            |w| {
                w.begin_object()?;
                w.name("a")?;
                w.begin_array()?;
                w.number_value(1)?;
                w.number_value(2)?;
                w.end_array()?;
                w.name("b")?;
                w.begin_array()?;
                w.end_array()?;
                w.end_object()
            },
        );
        assert_eq!(
            "{\n  \"a\": [\n    1,\n    2\n  ],\n  \"b\": []\n}",
            json
        );
    }

    #[test]
    fn string_escaping() {
        let json = write_compact(|w| w.string_value("a\"b\\c\nd\te\u{0001}f\u{2028}"));
        assert_eq!("\"a\\\"b\\\\c\\nd\\te\\u0001f\\u2028\"", json);
    }

    #[test]
    fn html_safe_escaping() {
        let json = write_with(
            WriterSettings {
                html_safe: true,
                ..Default::default()
            },
            |w| w.string_value("<a>&'\"\n"),
        );
        assert_eq!("\"\\u003ca\\u003e\\u0026\\u0027\\\"\\n\"", json);
    }

    #[test]
    fn html_chars_without_html_safe() {
        let json = write_compact(|w| w.string_value("<a>&='"));
        assert_eq!(r#""<a>&='""#, json);
    }

    #[test]
    fn null_suppression() {
        let json = write_with(
            WriterSettings {
                serialize_nulls: false,
                ..Default::default()
            },
            |w| {
                w.begin_object()?;
                w.name("a")?;
                w.null_value()?;
                w.end_object()
            },
        );
        assert_eq!("{}", json);

        // Nulls in arrays are always written
        let json = write_with(
            WriterSettings {
                serialize_nulls: false,
                ..Default::default()
            },
            |w| {
                w.begin_array()?;
                w.null_value()?;
                w.end_array()
            },
        );
        assert_eq!("[null]", json);

        let json = write_compact(|w| {
            w.begin_object()?;
            w.name("a")?;
            w.null_value()?;
            w.end_object()
        });
        assert_eq!(r#"{"a":null}"#, json);
    }

    #[test]
    fn null_suppression_keeps_following_members() {
        let json = write_with(
            WriterSettings {
                serialize_nulls: false,
                ..Default::default()
            },
            |w| {
                w.begin_object()?;
                w.name("a")?;
                w.null_value()?;
                w.name("b")?;
                w.number_value(1)?;
                w.end_object()
            },
        );
        assert_eq!(r#"{"b":1}"#, json);
    }

    #[test]
    fn lenient_multiple_top_level_values() {
        let json = write_with(
            WriterSettings {
                lenient: true,
                ..Default::default()
            },
            |w| {
                w.number_value(1)?;
                w.bool_value(true)?;
                w.number_value(2)
            },
        );
        assert_eq!("1\ntrue\n2", json);
    }

    #[test]
    fn number_string_values() {
        let json = write_compact(|w| {
            w.begin_array()?;
            w.number_string_value("1e500").unwrap();
            w.number_string_value("-0.5").unwrap();
            w.end_array()
        });
        assert_eq!("[1e500,-0.5]", json);

        let mut out = Vec::new();
        let mut json_writer = JsonStreamWriter::new(&mut out);
        match json_writer.number_string_value("NaN") {
            Err(JsonNumberError::InvalidNumber(s)) => assert_eq!("NaN", s),
            r => panic!("unexpected result: {r:?}"),
        }
    }

    #[test]
    fn nonfinite_fp_numbers_are_rejected() {
        let mut out = Vec::new();
        let mut json_writer = JsonStreamWriter::new(&mut out);
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            match json_writer.fp_number_value(value) {
                Err(JsonNumberError::InvalidNumber(_)) => {}
                r => panic!("unexpected result: {r:?}"),
            }
        }
    }

    #[test]
    #[should_panic(expected = "Incorrect writer usage")]
    fn value_without_name_panics() {
        let mut out = Vec::new();
        let mut json_writer = JsonStreamWriter::new(&mut out);
        json_writer.begin_object().unwrap();
        let _ = json_writer.bool_value(true);
    }

    #[test]
    #[should_panic(expected = "Incorrect writer usage")]
    fn name_outside_object_panics() {
        let mut out = Vec::new();
        let mut json_writer = JsonStreamWriter::new(&mut out);
        json_writer.begin_array().unwrap();
        let _ = json_writer.name("a");
    }

    #[test]
    #[should_panic(expected = "Incorrect writer usage")]
    fn duplicate_name_panics() {
        let mut out = Vec::new();
        let mut json_writer = JsonStreamWriter::new(&mut out);
        json_writer.begin_object().unwrap();
        json_writer.name("a").unwrap();
        let _ = json_writer.name("b");
    }

    #[test]
    #[should_panic(expected = "Incorrect writer usage")]
    fn second_top_level_value_panics() {
        let mut out = Vec::new();
        let mut json_writer = JsonStreamWriter::new(&mut out);
        json_writer.bool_value(true).unwrap();
        let _ = json_writer.bool_value(false);
    }

    #[test]
    #[should_panic(expected = "Incorrect writer usage")]
    fn finish_incomplete_document_panics() {
        let mut out = Vec::new();
        let mut json_writer = JsonStreamWriter::new(&mut out);
        json_writer.begin_array().unwrap();
        let _ = json_writer.finish_document();
    }

    #[test]
    #[should_panic(expected = "Incorrect writer usage")]
    fn finish_empty_document_panics() {
        let mut out = Vec::new();
        let json_writer = JsonStreamWriter::new(&mut out);
        let _ = json_writer.finish_document();
    }

    #[test]
    fn lenient_empty_document_is_allowed() {
        let json = write_with(
            WriterSettings {
                lenient: true,
                ..Default::default()
            },
            |_| Ok(()),
        );
        assert_eq!("", json);
    }

    #[test]
    fn large_output_flushes_buffer() {
        let big_string = "x".repeat(10 * WRITER_BUF_SIZE);
        let json = write_compact(|w| w.string_value(&big_string));
        assert_eq!(format!("\"{big_string}\""), json);
    }
}
