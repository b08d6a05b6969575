//! Module for writing JSON data
//!
//! [`JsonWriter`] is the push-based trait for producing JSON documents token
//! by token. [`JsonStreamWriter`] writes JSON text to a
//! [`Write`](std::io::Write); [`JsonTreeWriter`](crate::value::JsonTreeWriter)
//! builds an in-memory [`JsonValue`](crate::value::JsonValue). Code written
//! against the trait works with either.

mod stream_writer;
pub use stream_writer::*;

use duplicate::duplicate_item;
use thiserror::Error;

/// Error which occurred while writing a JSON number
#[derive(Error, Debug)]
pub enum JsonNumberError {
    /// The number is not a valid JSON number
    ///
    /// The data contains the error message.
    #[error("invalid JSON number: {0}")]
    InvalidNumber(String),
    /// An IO error occurred while trying to write to the underlying writer
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

mod sealed {
    /// Sealed trait preventing implementations of the number traits outside
    /// this crate
    pub trait Sealed {}
}

/// A number type whose values are all valid, finite JSON numbers
///
/// This trait is implemented for the built-in integer types; it is sealed
/// and cannot be implemented outside this crate.
pub trait FiniteNumber: sealed::Sealed {
    /// JSON number representation of the value
    #[doc(hidden)]
    fn to_json_number(&self) -> String;
}

/// A floating point number type whose values may be NaN or infinite, which
/// valid JSON numbers cannot represent
///
/// This trait is implemented for the built-in floating point types; it is
/// sealed and cannot be implemented outside this crate.
pub trait FloatingPointNumber: sealed::Sealed {
    /// JSON number representation of the value, failing for non-finite
    /// values
    #[doc(hidden)]
    fn to_json_number(&self) -> Result<String, JsonNumberError>;
}

#[duplicate_item(
    int_type;
    [u8]; [i8];
    [u16]; [i16];
    [u32]; [i32];
    [u64]; [i64];
    [u128]; [i128];
    [usize]; [isize];
)]
impl sealed::Sealed for int_type {}

#[duplicate_item(
    int_type;
    [u8]; [i8];
    [u16]; [i16];
    [u32]; [i32];
    [u64]; [i64];
    [u128]; [i128];
    [usize]; [isize];
)]
impl FiniteNumber for int_type {
    fn to_json_number(&self) -> String {
        self.to_string()
    }
}

#[duplicate_item(float_type; [f32]; [f64];)]
impl sealed::Sealed for float_type {}

#[duplicate_item(float_type; [f32]; [f64];)]
impl FloatingPointNumber for float_type {
    fn to_json_number(&self) -> Result<String, JsonNumberError> {
        if self.is_finite() {
            Ok(self.to_string())
        } else {
            Err(JsonNumberError::InvalidNumber(format!(
                "non-finite number: {self}"
            )))
        }
    }
}

/// A trait for push-based JSON writers
///
/// The methods mirror the tokens a [`JsonReader`](crate::reader::JsonReader)
/// produces. The writer enforces that the calls form a valid JSON document;
/// calls which would produce malformed JSON panic, since they always
/// indicate a bug in the calling code. Data-dependent problems, such as IO
/// errors or non-finite floating point values, are returned as errors.
///
/// Once all values have been written, [`finish_document`] must be called to
/// verify that the document is complete and to write any buffered data.
///
/// # Example
///
/// ```
/// # use jsonpull::writer::*;
/// let mut writer = Vec::<u8>::new();
/// let mut json_writer = JsonStreamWriter::new(&mut writer);
///
/// json_writer.begin_object()?;
/// json_writer.name("a")?;
/// json_writer.number_value(1)?;
/// json_writer.end_object()?;
/// json_writer.finish_document()?;
///
/// assert_eq!(String::from_utf8(writer)?, r#"{"a":1}"#);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// [`finish_document`]: Self::finish_document
pub trait JsonWriter {
    /// Begins a JSON object
    ///
    /// Afterwards members can be written with [`name`](Self::name) followed
    /// by a value, and the object is closed with
    /// [`end_object`](Self::end_object).
    fn begin_object(&mut self) -> Result<(), std::io::Error>;

    /// Ends the current JSON object
    ///
    /// # Panics
    /// Panics when no object is open, or a member name has been written
    /// without a value.
    fn end_object(&mut self) -> Result<(), std::io::Error>;

    /// Begins a JSON array
    fn begin_array(&mut self) -> Result<(), std::io::Error>;

    /// Ends the current JSON array
    ///
    /// # Panics
    /// Panics when no array is open.
    fn end_array(&mut self) -> Result<(), std::io::Error>;

    /// Writes the name of the next object member
    ///
    /// The name is held back until the member value is written, which
    /// allows suppressing the complete member for `null` values, see
    /// [`WriterSettings::serialize_nulls`].
    ///
    /// # Panics
    /// Panics when no object is open or a name has already been written
    /// for the current member.
    fn name(&mut self, name: &str) -> Result<(), std::io::Error>;

    /// Writes a JSON `null`
    fn null_value(&mut self) -> Result<(), std::io::Error>;

    /// Writes a JSON boolean value
    fn bool_value(&mut self, value: bool) -> Result<(), std::io::Error>;

    /// Writes a JSON string value
    ///
    /// Characters are escaped as needed, see
    /// [`WriterSettings::html_safe`] for the extended escaping mode.
    fn string_value(&mut self, value: &str) -> Result<(), std::io::Error>;

    /// Writes a JSON number value from an integer type
    fn number_value<N: FiniteNumber>(&mut self, value: N) -> Result<(), std::io::Error>;

    /// Writes a JSON number value from a floating point type
    ///
    /// Fails with [`JsonNumberError::InvalidNumber`] for NaN and infinite
    /// values, which JSON numbers cannot represent.
    fn fp_number_value<N: FloatingPointNumber>(&mut self, value: N)
        -> Result<(), JsonNumberError>;

    /// Writes the literal text of a JSON number
    ///
    /// Fails with [`JsonNumberError::InvalidNumber`] when the string is not
    /// a valid JSON number.
    fn number_string_value(&mut self, value: &str) -> Result<(), JsonNumberError>;

    /// Writes buffered data to the underlying writer and flushes it
    ///
    /// Normally calling [`finish_document`](Self::finish_document) at the
    /// end suffices; this method is for incrementally writing long
    /// documents.
    fn flush(&mut self) -> Result<(), std::io::Error>;

    /// Verifies that the document is complete and writes any remaining
    /// buffered data
    ///
    /// # Panics
    /// Panics when the document is incomplete: arrays or objects are still
    /// open, or no top-level value has been written. In lenient mode any
    /// number of top-level values, including none, is permitted.
    fn finish_document(self) -> Result<(), std::io::Error>;
}
