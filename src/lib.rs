//! Jsonpull is a JSON library built around a streaming [`JsonReader`] and
//! [`JsonWriter`] pair, with an in-memory [`JsonValue`] tree that speaks the
//! same streaming contract.
//!
//! JSON data is processed as a sequence of tokens pulled from a reader or
//! pushed into a writer, without building an intermediate tree unless one is
//! asked for. The tree-backed [`JsonTreeReader`] and [`JsonTreeWriter`]
//! implement the same traits as their text-backed counterparts, so code
//! written against the traits works with either backend.
//!
//! # Terminology
//!
//! This crate uses the same terminology as the JSON specification:
//!
//! - *object*: `{ ... }`
//!   - *member*: name-value pair in an object, e.g. `"a": 1`
//! - *array*: `[ ... ]`
//! - *literal*: `true`, `false` and `null`
//!
//! # Usage examples
//!
//! ## Reading
//!
//! ```
//! # use jsonpull::reader::*;
//! // In this example JSON data comes from a string;
//! // normally it would come from a file or a network connection
//! let json = r#"{"a": [1, 2, true]}"#;
//! let mut json_reader = JsonStreamReader::new(json.as_bytes());
//!
//! json_reader.begin_object()?;
//! assert_eq!(json_reader.next_name()?, "a");
//!
//! json_reader.begin_array()?;
//! assert_eq!(json_reader.next_i64()?, 1);
//! json_reader.skip_value()?;
//! assert_eq!(json_reader.next_bool()?, true);
//! json_reader.end_array()?;
//!
//! json_reader.end_object()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Writing
//!
//! ```
//! # use jsonpull::writer::*;
//! // In this example JSON bytes are stored in a Vec;
//! // normally they would be written to a file or a network connection
//! let mut writer = Vec::<u8>::new();
//! let mut json_writer = JsonStreamWriter::new(&mut writer);
//!
//! json_writer.begin_object()?;
//! json_writer.name("a")?;
//!
//! json_writer.begin_array()?;
//! json_writer.number_value(1)?;
//! json_writer.bool_value(true)?;
//! json_writer.end_array()?;
//!
//! json_writer.end_object()?;
//! // Ensures that the document is complete and all data is written
//! json_writer.finish_document()?;
//!
//! assert_eq!(String::from_utf8(writer)?, r#"{"a":[1,true]}"#);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Value tree
//!
//! ```
//! # use jsonpull::value::JsonValue;
//! let value = JsonValue::from_json_str(r#"{"a": [1, 2]}"#)?;
//! assert_eq!(value.get("a").and_then(|a| a.get_index(1)).and_then(JsonValue::as_i64), Some(2));
//! assert_eq!(value.to_json_string()?, r#"{"a":[1,2]}"#);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! [`JsonReader`]: reader::JsonReader
//! [`JsonWriter`]: writer::JsonWriter
//! [`JsonValue`]: value::JsonValue
//! [`JsonTreeReader`]: value::JsonTreeReader
//! [`JsonTreeWriter`]: value::JsonTreeWriter

#![warn(missing_docs)]
#![forbid(unsafe_code)]
// Fail on warnings in doc examples
#![doc(test(attr(deny(warnings))))]
// Allow `assert_eq!(true, ...)` because it is used to check a bool value
// and not a 'flag' / 'state', and `assert_eq!` makes that more explicit
#![allow(clippy::bool_assert_comparison)]
// Allow in general `needless_return` because that makes it sometimes more obvious
// that an expression is the result of the function
#![allow(clippy::needless_return)]

pub mod reader;
pub mod value;
pub mod writer;

mod json_number;
mod scope;
