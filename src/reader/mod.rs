//! Module for reading JSON data
//!
//! [`JsonReader`] is the pull-based trait for reading JSON documents token by
//! token. [`JsonStreamReader`] reads JSON text from a [`Read`](std::io::Read);
//! [`JsonTreeReader`](crate::value::JsonTreeReader) reads from an in-memory
//! [`JsonValue`](crate::value::JsonValue). Code written against the trait
//! works with either.

mod stream_reader;
pub use stream_reader::*;

use crate::writer::{JsonNumberError, JsonWriter};
use std::fmt::Display;
use thiserror::Error;

/// Token which a [`JsonReader`] can encounter, reported by [`JsonReader::peek`]
#[derive(PartialEq, Eq, Clone, Copy, Debug, strum::Display)]
pub enum JsonToken {
    /// Start of a JSON array: `[`
    BeginArray,
    /// End of a JSON array: `]`
    EndArray,
    /// Start of a JSON object: `{`
    BeginObject,
    /// End of a JSON object: `}`
    EndObject,
    /// Name of an object member
    Name,
    /// JSON string value
    String,
    /// JSON number value
    Number,
    /// JSON boolean value, `true` or `false`
    Boolean,
    /// JSON `null`
    Null,
    /// End of the document; no further top-level value follows
    ///
    /// [`peek`](JsonReader::peek) reports this instead of failing. Any attempt
    /// to consume a token here fails with [`ReaderError::UnexpectedToken`].
    EndOfDocument,
}

/// What a [`JsonReader`] method expected to find, for error reporting
#[derive(PartialEq, Eq, Clone, Copy, Debug, strum::Display)]
pub enum Expected {
    /// Any JSON value
    #[strum(serialize = "a value")]
    Value,
    /// An object member name
    #[strum(serialize = "a member name")]
    Name,
    /// A string value
    #[strum(serialize = "a string value")]
    String,
    /// A number value
    #[strum(serialize = "a number value")]
    Number,
    /// A boolean value
    #[strum(serialize = "a boolean value")]
    Boolean,
    /// A JSON `null`
    #[strum(serialize = "null")]
    Null,
    /// The start of an array
    #[strum(serialize = "array start")]
    ArrayStart,
    /// The end of an array
    #[strum(serialize = "array end")]
    ArrayEnd,
    /// The start of an object
    #[strum(serialize = "object start")]
    ObjectStart,
    /// The end of an object
    #[strum(serialize = "object end")]
    ObjectEnd,
}

/// Line and column of a position in the read JSON document
///
/// Both are 1-based; the column is the byte offset within the line, so for
/// lines with non-ASCII content it can differ from the character offset an
/// editor shows.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct LinePosition {
    /// 1-based line number
    pub line: u64,
    /// 1-based column within the line
    pub column: u64,
}

impl Display for LinePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Position of a [`JsonReader`] in the JSON document
///
/// A tree-backed reader has no lines and columns, so only the path is
/// available there.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ReaderPosition {
    /// Path in dot and bracket notation, for example `$.a[2]`, if available
    pub path: Option<String>,
    /// Line and column, if available
    pub line_pos: Option<LinePosition>,
}

impl Display for ReaderPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.line_pos, &self.path) {
            (Some(line_pos), Some(path)) => write!(f, "{line_pos} (path {path})"),
            (Some(line_pos), None) => write!(f, "{line_pos}"),
            (None, Some(path)) => write!(f, "path {path}"),
            (None, None) => f.write_str("<location unavailable>"),
        }
    }
}

/// JSON syntax error, see [`ReaderError::SyntaxError`]
#[derive(PartialEq, Eq, Clone, Error, Debug)]
#[error("JSON syntax error {kind} at {location}")]
pub struct JsonSyntaxError {
    /// Kind of the error
    pub kind: SyntaxErrorKind,
    /// Location where the error occurred in the JSON document
    pub location: ReaderPosition,
}

/// Describes why JSON text is considered malformed
#[derive(PartialEq, Eq, Clone, Copy, Debug, strum::Display)]
#[non_exhaustive]
pub enum SyntaxErrorKind {
    /// A comment was encountered, but comments are only allowed by lenient
    /// parsing
    CommentsNotEnabled,
    /// A comma before the end of an array or object was encountered, but
    /// trailing commas are only allowed by lenient parsing
    TrailingCommaNotEnabled,
    /// A second top-level value was encountered, but multiple top-level
    /// values are only allowed by lenient parsing
    MultipleTopLevelValuesNotEnabled,
    /// A construct was encountered which only lenient parsing accepts, such
    /// as an unquoted or single-quoted string, a `;` separator, a `=` name
    /// separator or a non-executable prefix
    MalformedJson,
    /// A value was expected, but the input cannot start one
    ExpectedValue,
    /// An object member name (or the end of the object) was expected
    ExpectedName,
    /// A `:` between a member name and its value was expected
    ExpectedColon,
    /// A `,` or the end of the enclosing array or object was expected
    ExpectedCommaOrEnd,
    /// A string was not terminated before the end of the input
    UnterminatedString,
    /// A block comment was not terminated before the end of the input
    UnterminatedComment,
    /// An unknown escape sequence, e.g. `\x`, was encountered
    UnknownEscapeSequence,
    /// An escape sequence was not terminated before the end of the input
    UnterminatedEscapeSequence,
    /// A malformed escape sequence, e.g. `\u00GA`, was encountered
    MalformedEscapeSequence,
    /// A `\uXXXX` escape sequence encoding half of a surrogate pair is not
    /// followed by its matching second half
    UnpairedSurrogateEscapeSequence,
    /// The document ended in the middle of a value or with unclosed arrays
    /// or objects
    IncompleteDocument,
    /// Arrays and objects are nested deeper than
    /// [`ReaderSettings::max_nesting_depth`] allows
    MaxDepthExceeded,
}

/// Error which occurred while reading from a JSON reader
#[derive(Error, Debug)]
pub enum ReaderError {
    /// The JSON document is malformed
    #[error("syntax error: {0}")]
    SyntaxError(#[from] JsonSyntaxError),

    /// The next token does not match what the called method expects
    ///
    /// For example calling [`JsonReader::next_bool`] when the next token is a
    /// string. The reader remains positioned before the token, so a caller
    /// which can handle multiple token types may [`peek`](JsonReader::peek)
    /// and retry.
    #[error("expected {expected} but got {actual} at {location}")]
    UnexpectedToken {
        /// What the method expected
        expected: Expected,
        /// The actual token
        actual: JsonToken,
        /// Location in the JSON document
        location: ReaderPosition,
    },

    /// A number cannot be converted to the requested numeric type
    ///
    /// For example calling [`JsonReader::next_i64`] for the literal `3.5`,
    /// or a value which overflows the requested type.
    #[error("cannot parse '{literal}' as requested number type at {location}")]
    MalformedNumber {
        /// The number literal (or coerced string content)
        literal: String,
        /// Location in the JSON document
        location: ReaderPosition,
    },

    /// An IO error occurred while trying to read from the underlying reader,
    /// including malformed UTF-8 data
    #[error("IO error '{error}' at (roughly) {location}")]
    IoError {
        /// The IO error which occurred
        error: std::io::Error,
        /// Rough location at which the error occurred
        location: ReaderPosition,
    },
}

/// Error which occurred while transferring JSON data with
/// [`JsonReader::transfer_to`]
#[derive(Error, Debug)]
pub enum TransferError {
    /// Error which occurred on the reading side
    #[error("reader error: {0}")]
    ReaderError(#[from] ReaderError),
    /// Error which occurred on the writing side
    #[error("writer error: {0}")]
    WriterError(#[from] std::io::Error),
}

/// A trait for pull-based JSON readers
///
/// The methods of this trait form a state machine over the JSON grammar: the
/// sequence of calls must match the structure of the document. [`peek`] looks
/// at the next token without consuming it, which allows dispatching on the
/// token type. Consuming a token through a method which does not match it
/// fails with [`ReaderError::UnexpectedToken`].
///
/// # Panics
///
/// Methods panic when the reader is used in a way that violates its
/// lifecycle, for example performing any operation after [`close`] was
/// called. Such panics always indicate a bug in the calling code, not bad
/// input data; data-dependent problems are reported as [`ReaderError`]s.
///
/// # Example
///
/// ```
/// # use jsonpull::reader::*;
/// let mut json_reader = JsonStreamReader::new("[1, \"two\"]".as_bytes());
/// json_reader.begin_array()?;
/// while json_reader.has_next()? {
///     match json_reader.peek()? {
///         JsonToken::Number => println!("number: {}", json_reader.next_i64()?),
///         JsonToken::String => println!("string: {}", json_reader.next_string()?),
///         _ => json_reader.skip_value()?,
///     }
/// }
/// json_reader.end_array()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// [`peek`]: Self::peek
/// [`close`]: Self::close
pub trait JsonReader {
    /// Peeks at the type of the next token without consuming it
    ///
    /// Peeking is idempotent: repeated calls return the same token until it
    /// is consumed. At the end of the document this returns
    /// [`JsonToken::EndOfDocument`] instead of failing.
    fn peek(&mut self) -> Result<JsonToken, ReaderError>;

    /// Consumes the start of a JSON object
    ///
    /// Afterwards the members of the object can be consumed with
    /// [`next_name`](Self::next_name) (or [`has_next`](Self::has_next) to
    /// detect the end), each followed by the member value.
    fn begin_object(&mut self) -> Result<(), ReaderError>;

    /// Consumes the end of the current JSON object
    ///
    /// Fails with [`ReaderError::UnexpectedToken`] if the object still has
    /// unconsumed members.
    fn end_object(&mut self) -> Result<(), ReaderError>;

    /// Consumes the start of a JSON array
    fn begin_array(&mut self) -> Result<(), ReaderError>;

    /// Consumes the end of the current JSON array
    ///
    /// Fails with [`ReaderError::UnexpectedToken`] if the array still has
    /// unconsumed elements.
    fn end_array(&mut self) -> Result<(), ReaderError>;

    /// Returns whether the current array or object has more elements or
    /// members to consume
    ///
    /// At the top level it returns whether another top-level value is
    /// present, which is only possible when multiple top-level values are
    /// enabled.
    fn has_next(&mut self) -> Result<bool, ReaderError>;

    /// Consumes and returns the name of the next object member
    fn next_name(&mut self) -> Result<String, ReaderError>;

    /// Consumes and returns a JSON string value
    ///
    /// A number token is accepted as well and returned as its literal text,
    /// matching the coercion numeric readers apply to strings.
    fn next_string(&mut self) -> Result<String, ReaderError>;

    /// Consumes a JSON number and returns its literal text unmodified
    ///
    /// This preserves the exact representation, which matters when
    /// transferring values whose magnitude or precision exceeds the built-in
    /// numeric types.
    fn next_number_as_string(&mut self) -> Result<String, ReaderError>;

    /// Consumes a JSON number as an `i64`
    ///
    /// Only integral literals are accepted: a literal with a fraction or
    /// exponent, such as `3.5` or even `3.0`, fails with
    /// [`ReaderError::MalformedNumber`] instead of being truncated or
    /// rounded. A string token whose content parses as an integer is
    /// accepted as well.
    fn next_i64(&mut self) -> Result<i64, ReaderError>;

    /// Consumes a JSON number as an `i32`
    ///
    /// Same rules as [`next_i64`](Self::next_i64), additionally failing for
    /// values outside the `i32` range.
    fn next_i32(&mut self) -> Result<i32, ReaderError>;

    /// Consumes a JSON number as an `f64`
    ///
    /// A string token whose content parses as a number is accepted as well.
    /// Results which are NaN or infinite fail with
    /// [`ReaderError::MalformedNumber`] unless lenient parsing is enabled.
    fn next_f64(&mut self) -> Result<f64, ReaderError>;

    /// Consumes a JSON boolean value
    fn next_bool(&mut self) -> Result<bool, ReaderError>;

    /// Consumes a JSON `null`
    fn next_null(&mut self) -> Result<(), ReaderError>;

    /// Skips the next value (or the next member name)
    ///
    /// Complete arrays and objects are skipped including all nested values,
    /// without materializing their content. When a member name is skipped,
    /// the reader is positioned before the member value afterwards.
    fn skip_value(&mut self) -> Result<(), ReaderError>;

    /// Path to the current cursor position in dot and bracket notation, for
    /// example `$.a[2]`
    fn path(&self) -> String;

    /// The current position of the reader, as used in error locations
    fn current_position(&self) -> ReaderPosition;

    /// Closes the reader
    ///
    /// Afterwards the reader rejects all further operations by panicking.
    /// Closing an already closed reader has no effect.
    fn close(&mut self);

    /// Reads the next value and writes it to the given writer
    ///
    /// Transfers one complete value, including all nested values, token by
    /// token. Number literals are transferred as text and therefore keep
    /// their exact representation.
    ///
    /// # Example
    ///
    /// ```
    /// # use jsonpull::reader::*;
    /// # use jsonpull::writer::*;
    /// let mut json_reader = JsonStreamReader::new(r#"{"a": [1,   2.5]}"#.as_bytes());
    /// let mut output = Vec::<u8>::new();
    /// let mut json_writer = JsonStreamWriter::new(&mut output);
    /// json_reader.transfer_to(&mut json_writer)?;
    /// json_writer.finish_document()?;
    /// assert_eq!(String::from_utf8(output)?, r#"{"a":[1,2.5]}"#);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    fn transfer_to<W: JsonWriter>(&mut self, json_writer: &mut W) -> Result<(), TransferError>
    where
        Self: Sized,
    {
        let mut depth = 0_u64;
        loop {
            let token = self.peek()?;
            match token {
                JsonToken::EndArray | JsonToken::EndObject | JsonToken::EndOfDocument
                    if depth == 0 =>
                {
                    return Err(ReaderError::UnexpectedToken {
                        expected: Expected::Value,
                        actual: token,
                        location: self.current_position(),
                    }
                    .into());
                }
                JsonToken::Name => {
                    let name = self.next_name()?;
                    json_writer.name(&name)?;
                    continue;
                }
                JsonToken::BeginArray => {
                    self.begin_array()?;
                    json_writer.begin_array()?;
                    depth += 1;
                    continue;
                }
                JsonToken::BeginObject => {
                    self.begin_object()?;
                    json_writer.begin_object()?;
                    depth += 1;
                    continue;
                }
                JsonToken::EndArray => {
                    self.end_array()?;
                    json_writer.end_array()?;
                    depth -= 1;
                }
                JsonToken::EndObject => {
                    self.end_object()?;
                    json_writer.end_object()?;
                    depth -= 1;
                }
                JsonToken::String => json_writer.string_value(&self.next_string()?)?,
                JsonToken::Number => {
                    let number = self.next_number_as_string()?;
                    if let Err(e) = json_writer.number_string_value(&number) {
                        match e {
                            // The reader only produces valid number literals
                            JsonNumberError::InvalidNumber(e) => {
                                unreachable!("writer rejected valid JSON number: {e}")
                            }
                            JsonNumberError::IoError(e) => {
                                return Err(TransferError::WriterError(e))
                            }
                        }
                    }
                }
                JsonToken::Boolean => json_writer.bool_value(self.next_bool()?)?,
                JsonToken::Null => {
                    self.next_null()?;
                    json_writer.null_value()?;
                }
                // Handled by the guard arm above when depth == 0
                JsonToken::EndOfDocument => unreachable!("EndOfDocument inside a value"),
            }
            if depth == 0 {
                return Ok(());
            }
        }
    }
}
