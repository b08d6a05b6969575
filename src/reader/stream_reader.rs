//! Streaming implementation of [`JsonReader`]

use super::*;
use crate::scope::{Scope, ScopeStack};
use std::io::{ErrorKind, Read};
use std::str::FromStr;

const READER_BUF_SIZE: usize = 1024;
const DEFAULT_MAX_NESTING_DEPTH: u32 = 128;

/// UTF-8 encoding of a byte order mark (U+FEFF)
const BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
/// Prefix some servers place before JSON responses to make them
/// non-executable as JavaScript; consumed in lenient mode
const NON_EXECUTE_PREFIX: &[u8] = b")]}'\n";

/// Smallest value whose magnitude can still take another digit without
/// overflowing `i64` (values are accumulated in negative space)
const MIN_INCOMPLETE_INTEGER: i64 = i64::MIN / 10;

/// Token which has been peeked at but (at least partially) not consumed yet
#[derive(PartialEq, Clone, Copy, strum::Display, Debug)]
enum PeekedToken {
    ObjectStart,
    ObjectEnd,
    ArrayStart,
    ArrayEnd,
    True,
    False,
    // Also used for lenient empty array slots, which consume no input
    Null,
    // Reader state: opening quote has not been consumed yet for any of these
    DoubleQuoted,
    SingleQuoted,
    Unquoted,
    DoubleQuotedName,
    SingleQuotedName,
    UnquotedName,
    // Reader state: number has already been consumed, value is in `peeked_long`
    Long,
    // Reader state: literal has not been consumed, length is in `peeked_number_len`
    Number,
    // Reader state: value has been consumed into `peeked_str` after a
    // failed numeric conversion; the variant keeps the original token class
    BufferedString,
    BufferedNumber,
    Eof,
}

/// Classification of the previously scanned char of a number literal
#[derive(PartialEq, Clone, Copy)]
enum NumberChar {
    None,
    Sign,
    Digit,
    Decimal,
    FractionDigit,
    ExpE,
    ExpSign,
    ExpDigit,
}

/// Settings to customize JSON parsing behavior
///
/// These settings are used by [`JsonStreamReader::new_custom`]. To avoid
/// repeating the default values for unchanged settings,
/// `..Default::default()` can be used:
/// ```
/// # use jsonpull::reader::ReaderSettings;
/// ReaderSettings {
///     lenient: true,
///     // For all other settings use the default
///     ..Default::default()
/// }
/// # ;
/// ```
#[derive(Clone, Debug)]
pub struct ReaderSettings {
    /// Whether to parse leniently, accepting JSON documents which strict
    /// parsing rejects
    ///
    /// When enabled the reader additionally accepts:
    /// - single-quoted strings and member names: `'a'`
    /// - unquoted strings and member names: `{a: b}`
    /// - `//`, `/* */` and `#` comments
    /// - `;` as separator between elements and members
    /// - `=` and `=>` as separator between a member name and its value
    /// - the non-executable prefix `)]}'\n` at the start of the document
    /// - case-insensitive keywords, e.g. `True` or `NULL`
    /// - empty array slots read as `null`: `[1,,2]`
    /// - a trailing comma before `]` or `}`: `[1, 2,]`
    /// - multiple top-level values, e.g. `true [] 1`
    /// - NaN and Infinity results for [`JsonReader::next_f64`]
    pub lenient: bool,

    /// Maximum nesting depth of arrays and objects, or `None` for no limit
    ///
    /// Exceeding the limit fails with
    /// [`SyntaxErrorKind::MaxDepthExceeded`]; without a limit a document
    /// such as `[[[[[`… can exhaust the stack of a recursive caller. The
    /// default is 128.
    pub max_nesting_depth: Option<u32>,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        ReaderSettings {
            lenient: false,
            max_nesting_depth: Some(DEFAULT_MAX_NESTING_DEPTH),
        }
    }
}

fn is_literal_byte(b: u8) -> bool {
    !matches!(
        b,
        b'/' | b'\\'
            | b';'
            | b'#'
            | b'='
            | b'{'
            | b'}'
            | b'['
            | b']'
            | b':'
            | b','
            | b' '
            | b'\t'
            | b'\x0C'
            | b'\r'
            | b'\n'
            | b'"'
            | b'\''
    )
}

/// A JSON reader implementation which consumes data from a [`Read`]
///
/// The data must be UTF-8 encoded; an optional byte order mark at the start
/// is skipped. The reader buffers internally, so wrapping the underlying
/// reader in a [`BufReader`](std::io::BufReader) is normally not necessary.
///
/// # Example
///
/// ```
/// # use jsonpull::reader::*;
/// let json = r#"{"a": 1}"#;
/// let mut json_reader = JsonStreamReader::new(json.as_bytes());
///
/// json_reader.begin_object()?;
/// assert_eq!(json_reader.next_name()?, "a");
/// assert_eq!(json_reader.next_i64()?, 1);
/// json_reader.end_object()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct JsonStreamReader<R: Read> {
    reader: R,
    buf: [u8; READER_BUF_SIZE],
    /// Index of the next unread byte in `buf`
    buf_pos: usize,
    /// Index one past the last valid byte in `buf`
    buf_end: usize,
    reached_eof: bool,
    /// Position in the document of `buf[0]`
    buf_start_doc_pos: u64,
    /// 0-based number of the current line
    line: u64,
    /// Position in the document at which the current line starts
    line_start_pos: u64,
    checked_bom: bool,

    peeked: Option<PeekedToken>,
    /// Value of a number consumed through the integer fast path
    peeked_long: i64,
    /// Byte length of a peeked number literal which has not been consumed yet
    peeked_number_len: usize,
    /// Already consumed value, kept for retrying after a failed conversion
    peeked_str: Option<String>,

    stack: ScopeStack,
    settings: ReaderSettings,
}

impl<R: Read> JsonStreamReader<R> {
    /// Creates a JSON reader with [default settings](ReaderSettings::default)
    pub fn new(reader: R) -> Self {
        JsonStreamReader::new_custom(reader, ReaderSettings::default())
    }

    /// Creates a JSON reader with custom settings
    ///
    /// The settings can be used to customize which JSON documents the
    /// reader accepts, most notably [lenient
    /// parsing](ReaderSettings::lenient).
    pub fn new_custom(reader: R, settings: ReaderSettings) -> Self {
        JsonStreamReader {
            reader,
            buf: [0; READER_BUF_SIZE],
            buf_pos: 0,
            buf_end: 0,
            reached_eof: false,
            buf_start_doc_pos: 0,
            line: 0,
            line_start_pos: 0,
            checked_bom: false,
            peeked: None,
            peeked_long: 0,
            peeked_number_len: 0,
            peeked_str: None,
            stack: ScopeStack::new(),
            settings,
        }
    }
}

impl<R: Read> std::fmt::Debug for JsonStreamReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStreamReader")
            .field("peeked", &self.peeked)
            .field("position", &self.current_position())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// Buffer management and low-level byte access
impl<R: Read> JsonStreamReader<R> {
    /// Position in the document of the next unread byte
    fn doc_pos(&self) -> u64 {
        self.buf_start_doc_pos + self.buf_pos as u64
    }

    /// Makes at least `minimum` unread bytes available in the buffer,
    /// compacting it if necessary; returns false when the end of the input
    /// is reached first
    fn fill_buffer(&mut self, minimum: usize) -> Result<bool, ReaderError> {
        debug_assert!(minimum <= READER_BUF_SIZE);
        if self.buf_pos > 0 {
            self.buf.copy_within(self.buf_pos..self.buf_end, 0);
            self.buf_start_doc_pos += self.buf_pos as u64;
            self.buf_end -= self.buf_pos;
            self.buf_pos = 0;
        }
        while self.buf_end < minimum {
            if self.reached_eof {
                return Ok(false);
            }
            match self.reader.read(&mut self.buf[self.buf_end..]) {
                Ok(0) => self.reached_eof = true,
                Ok(n) => self.buf_end += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.io_error(e)),
            }
        }
        Ok(true)
    }

    /// Returns whether at least `count` unread bytes are available,
    /// filling the buffer as needed
    fn ensure_bytes(&mut self, count: usize) -> Result<bool, ReaderError> {
        if self.buf_end - self.buf_pos >= count {
            return Ok(true);
        }
        self.fill_buffer(count)
    }

    /// Next unread byte without consuming it, or `None` at the end of the
    /// input
    fn peek_byte(&mut self) -> Result<Option<u8>, ReaderError> {
        if !self.ensure_bytes(1)? {
            return Ok(None);
        }
        Ok(Some(self.buf[self.buf_pos]))
    }

    /// Consumes the next byte, updating line information
    ///
    /// Must only be called when a byte is available.
    fn consume(&mut self) {
        debug_assert!(self.buf_pos < self.buf_end);
        let b = self.buf[self.buf_pos];
        self.buf_pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.line_start_pos = self.doc_pos();
        }
    }

    /// Consumes `count` already available bytes which are known to not
    /// contain line terminators, e.g. a number literal
    fn consume_bytes(&mut self, count: usize) {
        debug_assert!(self.buf_end - self.buf_pos >= count);
        self.buf_pos += count;
    }
}

// Error construction
impl<R: Read> JsonStreamReader<R> {
    fn syntax_error(&self, kind: SyntaxErrorKind) -> ReaderError {
        ReaderError::SyntaxError(JsonSyntaxError {
            kind,
            location: self.current_position(),
        })
    }

    fn io_error(&self, error: std::io::Error) -> ReaderError {
        ReaderError::IoError {
            error,
            location: self.current_position(),
        }
    }

    fn unexpected_token(&self, expected: Expected, actual: PeekedToken) -> ReaderError {
        ReaderError::UnexpectedToken {
            expected,
            actual: map_token(actual),
            location: self.current_position(),
        }
    }

    fn malformed_number(&self, literal: String) -> ReaderError {
        ReaderError::MalformedNumber {
            literal,
            location: self.current_position(),
        }
    }

    /// Fails with a syntax error of the given kind unless lenient parsing
    /// is enabled
    fn require_lenient(&self, kind: SyntaxErrorKind) -> Result<(), ReaderError> {
        if self.settings.lenient {
            Ok(())
        } else {
            Err(self.syntax_error(kind))
        }
    }

    fn check_not_closed(&self) {
        if self.stack.top() == Scope::Closed {
            panic!("Incorrect reader usage: reader is closed");
        }
    }
}

// Whitespace, comments and token classification
impl<R: Read> JsonStreamReader<R> {
    /// Skips until the end of the current line, consuming the line
    /// terminator as well
    fn skip_to_line_end(&mut self) -> Result<(), ReaderError> {
        while let Some(b) = self.peek_byte()? {
            self.consume();
            if b == b'\n' {
                break;
            }
        }
        Ok(())
    }

    fn skip_block_comment(&mut self) -> Result<(), ReaderError> {
        loop {
            match self.peek_byte()? {
                None => return Err(self.syntax_error(SyntaxErrorKind::UnterminatedComment)),
                Some(b'*') => {
                    self.consume();
                    if let Some(b'/') = self.peek_byte()? {
                        self.consume();
                        return Ok(());
                    }
                }
                Some(_) => self.consume(),
            }
        }
    }

    /// Skips whitespace and (in lenient mode) comments; afterwards the
    /// reader is positioned at the returned byte, which is not consumed
    fn peek_non_whitespace(&mut self) -> Result<Option<u8>, ReaderError> {
        loop {
            let b = match self.peek_byte()? {
                None => return Ok(None),
                Some(b) => b,
            };
            match b {
                b' ' | b'\t' | b'\r' | b'\n' => self.consume(),
                b'#' => {
                    self.require_lenient(SyntaxErrorKind::CommentsNotEnabled)?;
                    self.consume();
                    self.skip_to_line_end()?;
                }
                b'/' => {
                    // Lone '/' is left to the value parser, which rejects it
                    let next = if self.ensure_bytes(2)? {
                        self.buf[self.buf_pos + 1]
                    } else {
                        return Ok(Some(b));
                    };
                    match next {
                        b'/' => {
                            self.require_lenient(SyntaxErrorKind::CommentsNotEnabled)?;
                            self.consume_bytes(2);
                            self.skip_to_line_end()?;
                        }
                        b'*' => {
                            self.require_lenient(SyntaxErrorKind::CommentsNotEnabled)?;
                            self.consume_bytes(2);
                            self.skip_block_comment()?;
                        }
                        _ => return Ok(Some(b)),
                    }
                }
                _ => return Ok(Some(b)),
            }
        }
    }

    /// Like [`peek_non_whitespace`](Self::peek_non_whitespace), but fails
    /// with the given syntax error kind at the end of the input
    fn require_non_whitespace(&mut self, kind: SyntaxErrorKind) -> Result<u8, ReaderError> {
        match self.peek_non_whitespace()? {
            Some(b) => Ok(b),
            None => Err(self.syntax_error(kind)),
        }
    }

    /// Skips the byte order mark at the start of the document, if present
    fn consume_bom(&mut self) -> Result<(), ReaderError> {
        self.checked_bom = true;
        // Result can be ignored, a document shorter than the BOM is handled
        // by the length check below
        let _ = self.fill_buffer(BOM.len())?;
        if self.buf_end - self.buf_pos >= BOM.len()
            && self.buf[self.buf_pos..self.buf_pos + BOM.len()] == BOM
        {
            self.consume_bytes(BOM.len());
            // The BOM is not part of the first line's content
            self.line_start_pos += BOM.len() as u64;
        }
        Ok(())
    }

    /// Consumes the non-executable prefix `)]}'\n`, if present
    fn consume_non_execute_prefix(&mut self) -> Result<(), ReaderError> {
        if self.peek_non_whitespace()?.is_none() {
            return Ok(());
        }
        if !self.ensure_bytes(NON_EXECUTE_PREFIX.len())? {
            return Ok(());
        }
        if &self.buf[self.buf_pos..self.buf_pos + NON_EXECUTE_PREFIX.len()] == NON_EXECUTE_PREFIX {
            // Consume byte by byte to account for the line terminator
            for _ in 0..NON_EXECUTE_PREFIX.len() {
                self.consume();
            }
        }
        Ok(())
    }

    /// Tries to classify the next bytes as a `true`, `false` or `null`
    /// keyword; consumes the keyword on success
    ///
    /// Must only be called when at least one byte is available.
    fn peek_keyword(&mut self) -> Result<Option<PeekedToken>, ReaderError> {
        let (keyword, token) = match self.buf[self.buf_pos].to_ascii_lowercase() {
            b't' => ("true", PeekedToken::True),
            b'f' => ("false", PeekedToken::False),
            b'n' => ("null", PeekedToken::Null),
            _ => return Ok(None),
        };
        let len = keyword.len();
        if !self.ensure_bytes(len)? {
            return Ok(None);
        }
        let candidate = &self.buf[self.buf_pos..self.buf_pos + len];
        let matches = if self.settings.lenient {
            candidate.eq_ignore_ascii_case(keyword.as_bytes())
        } else {
            candidate == keyword.as_bytes()
        };
        if !matches {
            return Ok(None);
        }
        // The keyword must not continue as a longer literal, e.g. `nullx`
        if self.ensure_bytes(len + 1)? && is_literal_byte(self.buf[self.buf_pos + len]) {
            return Ok(None);
        }
        self.consume_bytes(len);
        Ok(Some(token))
    }

    /// Tries to classify the next bytes as a number literal
    ///
    /// A bare integer which fits `i64` is consumed directly into
    /// `peeked_long`; any other valid literal is left in the buffer with its
    /// length recorded in `peeked_number_len`.
    fn peek_number(&mut self) -> Result<Option<PeekedToken>, ReaderError> {
        // The value is accumulated negated so that i64::MIN is representable
        let mut value: i64 = 0;
        let mut negative = false;
        let mut fits_in_long = true;
        let mut last = NumberChar::None;
        let mut len = 0_usize;

        loop {
            if self.buf_pos + len == self.buf_end {
                if len == READER_BUF_SIZE {
                    // Too long to classify; falls back to an unquoted literal
                    return Ok(None);
                }
                if !self.fill_buffer(len + 1)? {
                    break;
                }
            }
            let b = self.buf[self.buf_pos + len];
            match b {
                b'-' => match last {
                    NumberChar::None => {
                        negative = true;
                        last = NumberChar::Sign;
                    }
                    NumberChar::ExpE => last = NumberChar::ExpSign,
                    _ => return Ok(None),
                },
                b'+' => match last {
                    NumberChar::ExpE => last = NumberChar::ExpSign,
                    _ => return Ok(None),
                },
                b'e' | b'E' => match last {
                    NumberChar::Digit | NumberChar::FractionDigit => last = NumberChar::ExpE,
                    _ => return Ok(None),
                },
                b'.' => match last {
                    NumberChar::Digit => last = NumberChar::Decimal,
                    _ => return Ok(None),
                },
                b'0'..=b'9' => {
                    let digit = (b - b'0') as i64;
                    match last {
                        NumberChar::None | NumberChar::Sign => {
                            value = -digit;
                            last = NumberChar::Digit;
                        }
                        NumberChar::Digit => {
                            if value == 0 {
                                // Leading zeros are not a valid number
                                return Ok(None);
                            }
                            let new_value = value.wrapping_mul(10).wrapping_sub(digit);
                            fits_in_long &= value > MIN_INCOMPLETE_INTEGER
                                || (value == MIN_INCOMPLETE_INTEGER && new_value < value);
                            value = new_value;
                        }
                        NumberChar::Decimal | NumberChar::FractionDigit => {
                            last = NumberChar::FractionDigit;
                        }
                        NumberChar::ExpE | NumberChar::ExpSign | NumberChar::ExpDigit => {
                            last = NumberChar::ExpDigit;
                        }
                    }
                }
                _ if is_literal_byte(b) => {
                    // Continues as a non-number literal, e.g. `123abc`
                    return Ok(None);
                }
                _ => break,
            }
            len += 1;
        }

        if last == NumberChar::Digit
            && fits_in_long
            && (value != i64::MIN || negative)
            && (value != 0 || !negative)
        {
            self.peeked_long = if negative { value } else { -value };
            self.consume_bytes(len);
            Ok(Some(PeekedToken::Long))
        } else if matches!(
            last,
            NumberChar::Digit | NumberChar::FractionDigit | NumberChar::ExpDigit
        ) {
            self.peeked_number_len = len;
            Ok(Some(PeekedToken::Number))
        } else {
            Ok(None)
        }
    }
}

// String reading
impl<R: Read> JsonStreamReader<R> {
    fn read_hex_escape(&mut self) -> Result<u32, ReaderError> {
        let mut value = 0_u32;
        for _ in 0..4 {
            let b = match self.peek_byte()? {
                None => {
                    return Err(self.syntax_error(SyntaxErrorKind::UnterminatedEscapeSequence))
                }
                Some(b) => b,
            };
            let digit = match b {
                b'0'..=b'9' => b - b'0',
                b'a'..=b'f' => b - b'a' + 10,
                b'A'..=b'F' => b - b'A' + 10,
                _ => return Err(self.syntax_error(SyntaxErrorKind::MalformedEscapeSequence)),
            };
            self.consume();
            value = value * 16 + digit as u32;
        }
        Ok(value)
    }

    /// Reads a `\uXXXX` escape sequence after the `\u` has been consumed,
    /// reading a second escape sequence when the first one encodes half of
    /// a surrogate pair
    fn read_unicode_escape(&mut self) -> Result<char, ReaderError> {
        let value = self.read_hex_escape()?;
        if (0xDC00..=0xDFFF).contains(&value) {
            // Low surrogate without preceding high surrogate
            return Err(self.syntax_error(SyntaxErrorKind::UnpairedSurrogateEscapeSequence));
        }
        if (0xD800..=0xDBFF).contains(&value) {
            let mut paired = self.ensure_bytes(2)?;
            paired = paired
                && self.buf[self.buf_pos] == b'\\'
                && self.buf[self.buf_pos + 1] == b'u';
            if !paired {
                return Err(self.syntax_error(SyntaxErrorKind::UnpairedSurrogateEscapeSequence));
            }
            self.consume_bytes(2);
            let low = self.read_hex_escape()?;
            if !(0xDC00..=0xDFFF).contains(&low) {
                return Err(self.syntax_error(SyntaxErrorKind::UnpairedSurrogateEscapeSequence));
            }
            let c = 0x10000 + ((value - 0xD800) << 10) + (low - 0xDC00);
            match char::from_u32(c) {
                Some(c) => Ok(c),
                // Surrogate pairs always encode valid chars
                None => unreachable!("invalid surrogate pair result {c:#X}"),
            }
        } else {
            match char::from_u32(value) {
                Some(c) => Ok(c),
                // Non-surrogate values < 0x10000 are always valid chars
                None => unreachable!("invalid unicode escape value {value:#X}"),
            }
        }
    }

    /// Reads the escape sequence after the `\` has been consumed
    fn read_escape_char(&mut self) -> Result<char, ReaderError> {
        let b = match self.peek_byte()? {
            None => return Err(self.syntax_error(SyntaxErrorKind::UnterminatedEscapeSequence)),
            Some(b) => b,
        };
        self.consume();
        match b {
            b'u' => self.read_unicode_escape(),
            b't' => Ok('\t'),
            b'b' => Ok('\u{0008}'),
            b'n' => Ok('\n'),
            b'r' => Ok('\r'),
            b'f' => Ok('\u{000C}'),
            // An escaped line terminator continues the string on the next
            // line, producing the terminator itself
            b'\n' => Ok('\n'),
            b'\'' | b'"' | b'\\' | b'/' => Ok(b as char),
            _ => Err(self.syntax_error(SyntaxErrorKind::UnknownEscapeSequence)),
        }
    }

    fn into_string(&self, bytes: Vec<u8>) -> Result<String, ReaderError> {
        String::from_utf8(bytes)
            .map_err(|e| self.io_error(std::io::Error::new(ErrorKind::InvalidData, e)))
    }

    /// Reads the value of a string after its opening quote has been
    /// consumed
    ///
    /// Contiguous runs without escapes are copied in one step; the scratch
    /// buffer grows at escapes and buffer boundaries.
    fn read_quoted(&mut self, quote: u8) -> Result<String, ReaderError> {
        let mut value = Vec::new();
        loop {
            if !self.ensure_bytes(1)? {
                return Err(self.syntax_error(SyntaxErrorKind::UnterminatedString));
            }
            // Line terminators end the run so line counting stays accurate
            let run_len = self.buf[self.buf_pos..self.buf_end]
                .iter()
                .position(|&b| b == quote || b == b'\\' || b == b'\n');
            match run_len {
                None => {
                    // The string continues past the buffered bytes
                    value.extend_from_slice(&self.buf[self.buf_pos..self.buf_end]);
                    self.consume_bytes(self.buf_end - self.buf_pos);
                }
                Some(len) => {
                    value.extend_from_slice(&self.buf[self.buf_pos..self.buf_pos + len]);
                    self.consume_bytes(len);
                    let b = self.buf[self.buf_pos];
                    self.consume();
                    if b == quote {
                        return self.into_string(value);
                    } else if b == b'\\' {
                        let c = self.read_escape_char()?;
                        let mut encoded = [0_u8; 4];
                        value.extend_from_slice(c.encode_utf8(&mut encoded).as_bytes());
                    } else {
                        // Raw line terminator within the string
                        value.push(b'\n');
                    }
                }
            }
        }
    }

    /// Skips a string after its opening quote has been consumed, still
    /// validating escape sequences
    fn skip_quoted(&mut self, quote: u8) -> Result<(), ReaderError> {
        loop {
            match self.peek_byte()? {
                None => return Err(self.syntax_error(SyntaxErrorKind::UnterminatedString)),
                Some(b) if b == quote => {
                    self.consume();
                    return Ok(());
                }
                Some(b'\\') => {
                    self.consume();
                    self.read_escape_char()?;
                }
                Some(_) => self.consume(),
            }
        }
    }

    fn read_unquoted(&mut self) -> Result<String, ReaderError> {
        let mut value = Vec::new();
        while let Some(b) = self.peek_byte()? {
            if !is_literal_byte(b) {
                break;
            }
            self.consume();
            value.push(b);
        }
        self.into_string(value)
    }

    fn skip_unquoted(&mut self) -> Result<(), ReaderError> {
        while let Some(b) = self.peek_byte()? {
            if !is_literal_byte(b) {
                break;
            }
            self.consume();
        }
        Ok(())
    }
}

// Token peeking and consumption
impl<R: Read> JsonStreamReader<R> {
    fn peek_internal(&mut self) -> Result<PeekedToken, ReaderError> {
        if let Some(p) = self.peeked {
            return Ok(p);
        }
        let p = self.do_peek()?;
        self.peeked = Some(p);
        Ok(p)
    }

    fn do_peek(&mut self) -> Result<PeekedToken, ReaderError> {
        let scope = self.stack.top();
        match scope {
            Scope::EmptyArray => self.stack.replace_top(Scope::NonemptyArray),
            Scope::NonemptyArray => {
                let b = self.require_non_whitespace(SyntaxErrorKind::IncompleteDocument)?;
                match b {
                    b']' => {
                        self.consume();
                        return Ok(PeekedToken::ArrayEnd);
                    }
                    b';' => {
                        self.require_lenient(SyntaxErrorKind::MalformedJson)?;
                        self.consume();
                    }
                    b',' => self.consume(),
                    _ => return Err(self.syntax_error(SyntaxErrorKind::ExpectedCommaOrEnd)),
                }
            }
            Scope::EmptyObject | Scope::NonemptyObject => {
                if scope == Scope::NonemptyObject {
                    let b = self.require_non_whitespace(SyntaxErrorKind::IncompleteDocument)?;
                    match b {
                        b'}' => {
                            self.consume();
                            return Ok(PeekedToken::ObjectEnd);
                        }
                        b';' => {
                            self.require_lenient(SyntaxErrorKind::MalformedJson)?;
                            self.consume();
                        }
                        b',' => self.consume(),
                        _ => return Err(self.syntax_error(SyntaxErrorKind::ExpectedCommaOrEnd)),
                    }
                }
                let b = self.require_non_whitespace(SyntaxErrorKind::IncompleteDocument)?;
                return match b {
                    b'"' => {
                        self.consume();
                        Ok(PeekedToken::DoubleQuotedName)
                    }
                    b'\'' => {
                        self.require_lenient(SyntaxErrorKind::MalformedJson)?;
                        self.consume();
                        Ok(PeekedToken::SingleQuotedName)
                    }
                    b'}' => {
                        if scope == Scope::EmptyObject {
                            self.consume();
                            Ok(PeekedToken::ObjectEnd)
                        } else {
                            // `}` directly after a member separator
                            self.require_lenient(SyntaxErrorKind::TrailingCommaNotEnabled)?;
                            self.consume();
                            Ok(PeekedToken::ObjectEnd)
                        }
                    }
                    _ if is_literal_byte(b) => {
                        self.require_lenient(SyntaxErrorKind::MalformedJson)?;
                        Ok(PeekedToken::UnquotedName)
                    }
                    _ => Err(self.syntax_error(SyntaxErrorKind::ExpectedName)),
                };
            }
            Scope::DanglingName => {
                self.stack.replace_top(Scope::NonemptyObject);
                let b = self.require_non_whitespace(SyntaxErrorKind::IncompleteDocument)?;
                match b {
                    b':' => self.consume(),
                    b'=' => {
                        self.require_lenient(SyntaxErrorKind::MalformedJson)?;
                        self.consume();
                        if let Some(b'>') = self.peek_byte()? {
                            self.consume();
                        }
                    }
                    _ => return Err(self.syntax_error(SyntaxErrorKind::ExpectedColon)),
                }
            }
            Scope::EmptyDocument => {
                if !self.checked_bom {
                    self.consume_bom()?;
                }
                if self.settings.lenient {
                    self.consume_non_execute_prefix()?;
                }
                self.stack.replace_top(Scope::NonemptyDocument);
                if self.peek_non_whitespace()?.is_none() {
                    return Ok(PeekedToken::Eof);
                }
            }
            Scope::NonemptyDocument => match self.peek_non_whitespace()? {
                None => return Ok(PeekedToken::Eof),
                Some(_) => {
                    self.require_lenient(SyntaxErrorKind::MultipleTopLevelValuesNotEnabled)?;
                }
            },
            // All public methods reject closed readers beforehand
            Scope::Closed => unreachable!("closed reader was peeked"),
        }

        // Value position
        let b = match self.peek_non_whitespace()? {
            Some(b) => b,
            None => return Err(self.syntax_error(SyntaxErrorKind::IncompleteDocument)),
        };
        match b {
            b'[' => {
                self.consume();
                Ok(PeekedToken::ArrayStart)
            }
            b'{' => {
                self.consume();
                Ok(PeekedToken::ObjectStart)
            }
            b'"' => {
                self.consume();
                Ok(PeekedToken::DoubleQuoted)
            }
            b'\'' => {
                self.require_lenient(SyntaxErrorKind::MalformedJson)?;
                self.consume();
                Ok(PeekedToken::SingleQuoted)
            }
            b']' => match scope {
                Scope::EmptyArray => {
                    self.consume();
                    Ok(PeekedToken::ArrayEnd)
                }
                // `]` directly after an element separator
                Scope::NonemptyArray => {
                    self.require_lenient(SyntaxErrorKind::TrailingCommaNotEnabled)?;
                    self.consume();
                    Ok(PeekedToken::ArrayEnd)
                }
                _ => Err(self.syntax_error(SyntaxErrorKind::ExpectedValue)),
            },
            b',' | b';' => {
                // An empty array slot is read as `null`; the separator is
                // left in place and consumed by the next peek
                if matches!(scope, Scope::EmptyArray | Scope::NonemptyArray) {
                    self.require_lenient(SyntaxErrorKind::ExpectedValue)?;
                    Ok(PeekedToken::Null)
                } else {
                    Err(self.syntax_error(SyntaxErrorKind::ExpectedValue))
                }
            }
            _ => {
                if let Some(t) = self.peek_keyword()? {
                    return Ok(t);
                }
                if let Some(t) = self.peek_number()? {
                    return Ok(t);
                }
                if !is_literal_byte(b) {
                    return Err(self.syntax_error(SyntaxErrorKind::ExpectedValue));
                }
                self.require_lenient(SyntaxErrorKind::MalformedJson)?;
                Ok(PeekedToken::Unquoted)
            }
        }
    }

    fn clear_peeked(&mut self) {
        self.peeked = None;
    }

    /// Called when a value has been fully consumed, to update the path of
    /// the enclosing array
    fn on_value_end(&mut self) {
        if matches!(
            self.stack.top(),
            Scope::EmptyArray | Scope::NonemptyArray
        ) {
            self.stack.increment_path_index();
        }
    }

    fn push_scope(&mut self, scope: Scope) -> Result<(), ReaderError> {
        if let Some(max) = self.settings.max_nesting_depth {
            // The stack also holds the document frame
            if self.stack.len() - 1 >= max as usize {
                return Err(self.syntax_error(SyntaxErrorKind::MaxDepthExceeded));
            }
        }
        self.stack.push(scope);
        Ok(())
    }

    /// Consumes a peeked number literal and returns its text
    fn take_number_literal(&mut self) -> Result<String, ReaderError> {
        let bytes = &self.buf[self.buf_pos..self.buf_pos + self.peeked_number_len];
        let literal = match std::str::from_utf8(bytes) {
            Ok(s) => s.to_owned(),
            // Number literals only consist of ASCII bytes
            Err(_) => unreachable!("number literal is not ASCII"),
        };
        self.consume_bytes(self.peeked_number_len);
        Ok(literal)
    }

    /// Consumes the remainder of the peeked value and returns its text;
    /// only valid for string and number tokens
    fn take_value_text(&mut self, p: PeekedToken) -> Result<String, ReaderError> {
        let text = match p {
            PeekedToken::DoubleQuoted => self.read_quoted(b'"')?,
            PeekedToken::SingleQuoted => self.read_quoted(b'\'')?,
            PeekedToken::Unquoted => self.read_unquoted()?,
            PeekedToken::Number => self.take_number_literal()?,
            PeekedToken::Long => self.peeked_long.to_string(),
            PeekedToken::BufferedString | PeekedToken::BufferedNumber => {
                match self.peeked_str.take() {
                    Some(s) => s,
                    None => unreachable!("buffered value is missing"),
                }
            }
            _ => unreachable!("not a text value: {p}"),
        };
        self.clear_peeked();
        Ok(text)
    }

    /// Reads a number as an integer type, using the fast path value where
    /// possible and strict integer parsing otherwise
    ///
    /// Literals with a fraction or exponent are rejected instead of being
    /// truncated or rounded.
    fn next_int<T: FromStr + TryFrom<i64>>(&mut self) -> Result<T, ReaderError> {
        self.check_not_closed();
        let p = self.peek_internal()?;
        match p {
            PeekedToken::Long => {
                let value = self.peeked_long;
                match T::try_from(value) {
                    Ok(v) => {
                        self.clear_peeked();
                        self.on_value_end();
                        Ok(v)
                    }
                    Err(_) => Err(self.malformed_number(value.to_string())),
                }
            }
            PeekedToken::Number
            | PeekedToken::DoubleQuoted
            | PeekedToken::SingleQuoted
            | PeekedToken::Unquoted
            | PeekedToken::BufferedString
            | PeekedToken::BufferedNumber => {
                let text = self.take_value_text(p)?;
                match text.parse::<T>() {
                    Ok(v) => {
                        self.on_value_end();
                        Ok(v)
                    }
                    Err(_) => {
                        // Keep the value so that the caller can retry, e.g.
                        // with next_f64 or next_string
                        let e = self.malformed_number(text.clone());
                        self.peeked = Some(buffered_token(p));
                        self.peeked_str = Some(text);
                        Err(e)
                    }
                }
            }
            _ => Err(self.unexpected_token(Expected::Number, p)),
        }
    }
}

fn map_token(p: PeekedToken) -> JsonToken {
    match p {
        PeekedToken::ObjectStart => JsonToken::BeginObject,
        PeekedToken::ObjectEnd => JsonToken::EndObject,
        PeekedToken::ArrayStart => JsonToken::BeginArray,
        PeekedToken::ArrayEnd => JsonToken::EndArray,
        PeekedToken::True | PeekedToken::False => JsonToken::Boolean,
        PeekedToken::Null => JsonToken::Null,
        PeekedToken::DoubleQuoted
        | PeekedToken::SingleQuoted
        | PeekedToken::Unquoted
        | PeekedToken::BufferedString => JsonToken::String,
        PeekedToken::DoubleQuotedName
        | PeekedToken::SingleQuotedName
        | PeekedToken::UnquotedName => JsonToken::Name,
        PeekedToken::Long | PeekedToken::Number | PeekedToken::BufferedNumber => {
            JsonToken::Number
        }
        PeekedToken::Eof => JsonToken::EndOfDocument,
    }
}

/// Buffered variant matching the token class of the value being retained
/// after a failed conversion
fn buffered_token(p: PeekedToken) -> PeekedToken {
    match p {
        PeekedToken::Number | PeekedToken::Long | PeekedToken::BufferedNumber => {
            PeekedToken::BufferedNumber
        }
        _ => PeekedToken::BufferedString,
    }
}

impl<R: Read> JsonReader for JsonStreamReader<R> {
    fn peek(&mut self) -> Result<JsonToken, ReaderError> {
        self.check_not_closed();
        Ok(map_token(self.peek_internal()?))
    }

    fn begin_object(&mut self) -> Result<(), ReaderError> {
        self.check_not_closed();
        let p = self.peek_internal()?;
        if p == PeekedToken::ObjectStart {
            self.push_scope(Scope::EmptyObject)?;
            self.clear_peeked();
            Ok(())
        } else {
            Err(self.unexpected_token(Expected::ObjectStart, p))
        }
    }

    fn end_object(&mut self) -> Result<(), ReaderError> {
        self.check_not_closed();
        let p = self.peek_internal()?;
        if p == PeekedToken::ObjectEnd {
            self.clear_peeked();
            self.stack.pop();
            self.on_value_end();
            Ok(())
        } else {
            Err(self.unexpected_token(Expected::ObjectEnd, p))
        }
    }

    fn begin_array(&mut self) -> Result<(), ReaderError> {
        self.check_not_closed();
        let p = self.peek_internal()?;
        if p == PeekedToken::ArrayStart {
            self.push_scope(Scope::EmptyArray)?;
            self.clear_peeked();
            Ok(())
        } else {
            Err(self.unexpected_token(Expected::ArrayStart, p))
        }
    }

    fn end_array(&mut self) -> Result<(), ReaderError> {
        self.check_not_closed();
        let p = self.peek_internal()?;
        if p == PeekedToken::ArrayEnd {
            self.clear_peeked();
            self.stack.pop();
            self.on_value_end();
            Ok(())
        } else {
            Err(self.unexpected_token(Expected::ArrayEnd, p))
        }
    }

    fn has_next(&mut self) -> Result<bool, ReaderError> {
        self.check_not_closed();
        let p = self.peek_internal()?;
        Ok(!matches!(
            p,
            PeekedToken::ArrayEnd | PeekedToken::ObjectEnd | PeekedToken::Eof
        ))
    }

    fn next_name(&mut self) -> Result<String, ReaderError> {
        self.check_not_closed();
        let p = self.peek_internal()?;
        let name = match p {
            PeekedToken::DoubleQuotedName => self.read_quoted(b'"')?,
            PeekedToken::SingleQuotedName => self.read_quoted(b'\'')?,
            PeekedToken::UnquotedName => self.read_unquoted()?,
            _ => return Err(self.unexpected_token(Expected::Name, p)),
        };
        self.clear_peeked();
        self.stack.replace_top(Scope::DanglingName);
        self.stack.set_path_name(&name);
        Ok(name)
    }

    fn next_string(&mut self) -> Result<String, ReaderError> {
        self.check_not_closed();
        let p = self.peek_internal()?;
        match p {
            PeekedToken::DoubleQuoted
            | PeekedToken::SingleQuoted
            | PeekedToken::Unquoted
            | PeekedToken::BufferedString
            | PeekedToken::BufferedNumber
            | PeekedToken::Long
            | PeekedToken::Number => {
                let text = self.take_value_text(p)?;
                self.on_value_end();
                Ok(text)
            }
            _ => Err(self.unexpected_token(Expected::String, p)),
        }
    }

    fn next_number_as_string(&mut self) -> Result<String, ReaderError> {
        self.check_not_closed();
        let p = self.peek_internal()?;
        match p {
            PeekedToken::Long | PeekedToken::Number | PeekedToken::BufferedNumber => {
                let text = self.take_value_text(p)?;
                self.on_value_end();
                Ok(text)
            }
            _ => Err(self.unexpected_token(Expected::Number, p)),
        }
    }

    fn next_i64(&mut self) -> Result<i64, ReaderError> {
        self.next_int()
    }

    fn next_i32(&mut self) -> Result<i32, ReaderError> {
        self.next_int()
    }

    fn next_f64(&mut self) -> Result<f64, ReaderError> {
        self.check_not_closed();
        let p = self.peek_internal()?;
        match p {
            PeekedToken::Long => {
                let value = self.peeked_long;
                self.clear_peeked();
                self.on_value_end();
                Ok(value as f64)
            }
            PeekedToken::Number
            | PeekedToken::DoubleQuoted
            | PeekedToken::SingleQuoted
            | PeekedToken::Unquoted
            | PeekedToken::BufferedString
            | PeekedToken::BufferedNumber => {
                let text = self.take_value_text(p)?;
                let restore = |reader: &mut Self, text: String| {
                    let e = reader.malformed_number(text.clone());
                    reader.peeked = Some(buffered_token(p));
                    reader.peeked_str = Some(text);
                    e
                };
                match text.parse::<f64>() {
                    Ok(value) => {
                        if !self.settings.lenient && !value.is_finite() {
                            return Err(restore(self, text));
                        }
                        self.on_value_end();
                        Ok(value)
                    }
                    Err(_) => Err(restore(self, text)),
                }
            }
            _ => Err(self.unexpected_token(Expected::Number, p)),
        }
    }

    fn next_bool(&mut self) -> Result<bool, ReaderError> {
        self.check_not_closed();
        let p = self.peek_internal()?;
        let value = match p {
            PeekedToken::True => true,
            PeekedToken::False => false,
            _ => return Err(self.unexpected_token(Expected::Boolean, p)),
        };
        self.clear_peeked();
        self.on_value_end();
        Ok(value)
    }

    fn next_null(&mut self) -> Result<(), ReaderError> {
        self.check_not_closed();
        let p = self.peek_internal()?;
        if p == PeekedToken::Null {
            self.clear_peeked();
            self.on_value_end();
            Ok(())
        } else {
            Err(self.unexpected_token(Expected::Null, p))
        }
    }

    fn skip_value(&mut self) -> Result<(), ReaderError> {
        self.check_not_closed();
        let mut depth = 0_u64;
        loop {
            let p = self.peek_internal()?;
            match p {
                PeekedToken::ArrayEnd | PeekedToken::ObjectEnd | PeekedToken::Eof
                    if depth == 0 =>
                {
                    return Err(self.unexpected_token(Expected::Value, p));
                }
                PeekedToken::ArrayStart => {
                    self.push_scope(Scope::EmptyArray)?;
                    self.clear_peeked();
                    depth += 1;
                    continue;
                }
                PeekedToken::ObjectStart => {
                    self.push_scope(Scope::EmptyObject)?;
                    self.clear_peeked();
                    depth += 1;
                    continue;
                }
                PeekedToken::ArrayEnd | PeekedToken::ObjectEnd => {
                    self.clear_peeked();
                    self.stack.pop();
                    self.on_value_end();
                    depth -= 1;
                }
                PeekedToken::DoubleQuotedName
                | PeekedToken::SingleQuotedName
                | PeekedToken::UnquotedName => {
                    match p {
                        PeekedToken::DoubleQuotedName => self.skip_quoted(b'"')?,
                        PeekedToken::SingleQuotedName => self.skip_quoted(b'\'')?,
                        _ => self.skip_unquoted()?,
                    }
                    self.clear_peeked();
                    self.stack.replace_top(Scope::DanglingName);
                    // The skipped name is not retained for the path
                    self.stack.set_path_name("null");
                    // A skipped name leaves the reader before the member
                    // value; within a larger skip the loop continues
                    if depth == 0 {
                        return Ok(());
                    }
                    continue;
                }
                PeekedToken::DoubleQuoted => {
                    self.clear_peeked();
                    self.skip_quoted(b'"')?;
                    self.on_value_end();
                }
                PeekedToken::SingleQuoted => {
                    self.clear_peeked();
                    self.skip_quoted(b'\'')?;
                    self.on_value_end();
                }
                PeekedToken::Unquoted => {
                    self.clear_peeked();
                    self.skip_unquoted()?;
                    self.on_value_end();
                }
                PeekedToken::Number => {
                    let len = self.peeked_number_len;
                    self.consume_bytes(len);
                    self.clear_peeked();
                    self.on_value_end();
                }
                PeekedToken::Long
                | PeekedToken::True
                | PeekedToken::False
                | PeekedToken::Null => {
                    self.clear_peeked();
                    self.on_value_end();
                }
                PeekedToken::BufferedString | PeekedToken::BufferedNumber => {
                    self.peeked_str = None;
                    self.clear_peeked();
                    self.on_value_end();
                }
                // Inside a container do_peek reports IncompleteDocument
                // instead of yielding Eof
                PeekedToken::Eof => unreachable!("unexpected peeked token: {p:?}"),
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
            line_pos: Some(LinePosition {
                line: self.line + 1,
                column: self.doc_pos() - self.line_start_pos + 1,
            }),
        }
    }

    fn close(&mut self) {
        self.peeked = None;
        self.peeked_str = None;
        self.stack.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_reader(json: &str) -> JsonStreamReader<&[u8]> {
        JsonStreamReader::new(json.as_bytes())
    }

    fn new_lenient_reader(json: &str) -> JsonStreamReader<&[u8]> {
        JsonStreamReader::new_custom(
            json.as_bytes(),
            ReaderSettings {
                lenient: true,
                ..Default::default()
            },
        )
    }

    /// Asserts that the result is a syntax error of the given kind at the
    /// given 1-based line and column
    fn assert_syntax_error<T: std::fmt::Debug>(
        result: Result<T, ReaderError>,
        kind: SyntaxErrorKind,
        line: u64,
        column: u64,
    ) {
        match result {
            Err(ReaderError::SyntaxError(e)) => {
                assert_eq!(kind, e.kind);
                assert_eq!(
                    Some(LinePosition { line, column }),
                    e.location.line_pos,
                    "unexpected location for {kind}"
                );
            }
            r => panic!("expected {kind} syntax error, got: {r:?}"),
        }
    }

    fn assert_unexpected_token<T: std::fmt::Debug>(
        result: Result<T, ReaderError>,
        expected: Expected,
        actual: JsonToken,
    ) {
        match result {
            Err(ReaderError::UnexpectedToken {
                expected: e,
                actual: a,
                ..
            }) => {
                assert_eq!(expected, e);
                assert_eq!(actual, a);
            }
            r => panic!("expected UnexpectedToken error, got: {r:?}"),
        }
    }

    fn assert_malformed_number<T: std::fmt::Debug>(result: Result<T, ReaderError>, literal: &str) {
        match result {
            Err(ReaderError::MalformedNumber { literal: l, .. }) => assert_eq!(literal, l),
            r => panic!("expected MalformedNumber error, got: {r:?}"),
        }
    }

    #[test]
    fn document_events() -> Result<(), ReaderError> {
        let mut reader = new_reader(r#"{"a": [1, -2.5, "s", true, null], "b": {}}"#);
        reader.begin_object()?;
        assert_eq!("a", reader.next_name()?);
        reader.begin_array()?;
        assert_eq!(JsonToken::Number, reader.peek()?);
        assert_eq!(1, reader.next_i64()?);
        assert_eq!(-2.5, reader.next_f64()?);
        assert_eq!("s", reader.next_string()?);
        assert_eq!(true, reader.next_bool()?);
        reader.next_null()?;
        assert_eq!(false, reader.has_next()?);
        reader.end_array()?;
        assert_eq!("b", reader.next_name()?);
        reader.begin_object()?;
        reader.end_object()?;
        reader.end_object()?;
        assert_eq!(JsonToken::EndOfDocument, reader.peek()?);
        Ok(())
    }

    #[test]
    fn peek_is_idempotent() -> Result<(), ReaderError> {
        let mut reader = new_reader("[true]");
        reader.begin_array()?;
        assert_eq!(JsonToken::Boolean, reader.peek()?);
        assert_eq!(JsonToken::Boolean, reader.peek()?);
        assert_eq!(true, reader.next_bool()?);
        Ok(())
    }

    #[test]
    fn empty_document() -> Result<(), ReaderError> {
        let mut reader = new_reader("  ");
        assert_eq!(JsonToken::EndOfDocument, reader.peek()?);
        assert_unexpected_token(
            reader.next_bool(),
            Expected::Boolean,
            JsonToken::EndOfDocument,
        );
        Ok(())
    }

    #[test]
    fn bom_is_skipped() -> Result<(), ReaderError> {
        let mut reader = JsonStreamReader::new(b"\xEF\xBB\xBF[1]".as_slice());
        reader.begin_array()?;
        assert_eq!(1, reader.next_i64()?);
        reader.end_array()?;
        Ok(())
    }

    #[test]
    fn strings_with_escapes() -> Result<(), ReaderError> {
        let mut reader = new_reader(
            r#"["Aä€", "😀", "a\nb", "\"\\\/", "a\
b"]"#,
        );
        reader.begin_array()?;
        assert_eq!("Aä€", reader.next_string()?);
        assert_eq!("😀", reader.next_string()?);
        assert_eq!("a\nb", reader.next_string()?);
        assert_eq!("\"\\/", reader.next_string()?);
        // Escaped line terminator continues the string on the next line
        assert_eq!("a\nb", reader.next_string()?);
        reader.end_array()?;
        Ok(())
    }

    #[test]
    fn string_with_raw_line_terminator() -> Result<(), ReaderError> {
        let mut reader = new_reader("[\"a\nb\", ?]");
        reader.begin_array()?;
        assert_eq!("a\nb", reader.next_string()?);
        // Line counting continues past the raw terminator
        assert_syntax_error(reader.peek(), SyntaxErrorKind::MalformedJson, 2, 5);
        Ok(())
    }

    #[test]
    fn string_with_escape_at_buffer_boundary() -> Result<(), ReaderError> {
        let prefix = "x".repeat(READER_BUF_SIZE - 2);
        let json = format!("\"{prefix}\\n{prefix}\"");
        let mut reader = new_reader(&json);
        assert_eq!(format!("{prefix}\n{prefix}"), reader.next_string()?);
        Ok(())
    }

    #[test]
    fn string_with_raw_multibyte_chars() -> Result<(), ReaderError> {
        let mut reader = new_reader("\"ä€😀\"");
        assert_eq!("ä€😀", reader.next_string()?);
        Ok(())
    }

    #[test]
    fn invalid_escapes() {
        assert_syntax_error(
            new_reader(r#""\x""#).next_string(),
            SyntaxErrorKind::UnknownEscapeSequence,
            1,
            4,
        );
        assert_syntax_error(
            new_reader(r#""\u00G0""#).next_string(),
            SyntaxErrorKind::MalformedEscapeSequence,
            1,
            6,
        );
        assert_syntax_error(
            new_reader(r#""\ud83d""#).next_string(),
            SyntaxErrorKind::UnpairedSurrogateEscapeSequence,
            1,
            8,
        );
        assert_syntax_error(
            new_reader(r#""\ud83dA""#).next_string(),
            SyntaxErrorKind::UnpairedSurrogateEscapeSequence,
            1,
            8,
        );
        assert_syntax_error(
            new_reader(r#""\ud83d\u0041""#).next_string(),
            SyntaxErrorKind::UnpairedSurrogateEscapeSequence,
            1,
            14,
        );
        assert_syntax_error(
            new_reader(r#""\"#).next_string(),
            SyntaxErrorKind::UnterminatedEscapeSequence,
            1,
            3,
        );
    }

    #[test]
    fn unterminated_string() {
        assert_syntax_error(
            new_reader("\"abc").next_string(),
            SyntaxErrorKind::UnterminatedString,
            1,
            5,
        );
    }

    #[test]
    fn long_fast_path_boundaries() -> Result<(), ReaderError> {
        let mut reader = new_reader("[-9223372036854775808, 9223372036854775807]");
        reader.begin_array()?;
        assert_eq!(i64::MIN, reader.next_i64()?);
        assert_eq!(i64::MAX, reader.next_i64()?);
        reader.end_array()?;
        Ok(())
    }

    #[test]
    fn long_overflow_falls_back_to_f64() -> Result<(), ReaderError> {
        // One past i64::MAX does not fit the fast path
        let mut reader = new_reader("9223372036854775808");
        assert_eq!(9223372036854775808_f64, reader.next_f64()?);

        let mut reader = new_reader("9223372036854775808");
        assert_malformed_number(reader.next_i64(), "9223372036854775808");
        Ok(())
    }

    #[test]
    fn non_integral_rejected_by_integer_readers() -> Result<(), ReaderError> {
        let mut reader = new_reader("3.5");
        assert_malformed_number(reader.next_i64(), "3.5");
        // The value is retained and can be read differently
        assert_eq!(3.5, reader.next_f64()?);

        // Integral value with fraction digits is rejected as well
        let mut reader = new_reader("3.0");
        assert_malformed_number(reader.next_i64(), "3.0");

        let mut reader = new_reader("30e0");
        assert_malformed_number(reader.next_i32(), "30e0");
        Ok(())
    }

    #[test]
    fn failed_conversion_keeps_token_class() -> Result<(), ReaderError> {
        let mut reader = new_reader(r#"[3.5, "x"]"#);
        reader.begin_array()?;
        assert_malformed_number(reader.next_i64(), "3.5");
        // The retained value still reports as a number
        assert_eq!(JsonToken::Number, reader.peek()?);
        assert_eq!("3.5", reader.next_number_as_string()?);
        assert_malformed_number(reader.next_f64(), "x");
        assert_eq!(JsonToken::String, reader.peek()?);
        assert_eq!("x", reader.next_string()?);
        reader.end_array()?;
        Ok(())
    }

    #[test]
    fn i32_range_is_checked() -> Result<(), ReaderError> {
        let mut reader = new_reader("[2147483647, 2147483648]");
        reader.begin_array()?;
        assert_eq!(i32::MAX, reader.next_i32()?);
        assert_malformed_number(reader.next_i32(), "2147483648");
        // Value is still readable as i64
        assert_eq!(2147483648, reader.next_i64()?);
        reader.end_array()?;
        Ok(())
    }

    #[test]
    fn number_coercion_from_string() -> Result<(), ReaderError> {
        let mut reader = new_reader(r#"["12", "1.5", "x"]"#);
        reader.begin_array()?;
        assert_eq!(12, reader.next_i64()?);
        assert_eq!(1.5, reader.next_f64()?);
        assert_malformed_number(reader.next_f64(), "x");
        // After a failed conversion the value can still be read as string
        assert_eq!("x", reader.next_string()?);
        reader.end_array()?;
        Ok(())
    }

    #[test]
    fn number_as_string_keeps_literal() -> Result<(), ReaderError> {
        let mut reader = new_reader("[1e2, 123456789012345678901234567890]");
        reader.begin_array()?;
        assert_eq!("1e2", reader.next_number_as_string()?);
        assert_eq!(
            "123456789012345678901234567890",
            reader.next_number_as_string()?
        );
        reader.end_array()?;
        Ok(())
    }

    #[test]
    fn string_reads_number_literal() -> Result<(), ReaderError> {
        let mut reader = new_reader("[1, 2.5]");
        reader.begin_array()?;
        assert_eq!("1", reader.next_string()?);
        assert_eq!("2.5", reader.next_string()?);
        reader.end_array()?;
        Ok(())
    }

    #[test]
    fn malformed_numbers_are_not_numbers() {
        // Leading zeros and similar malformed literals are not number
        // tokens; strict parsing rejects them as malformed
        for json in ["01", "-01", "1.", ".5", "1e", "+1", "-", "Nan", "Infinity"] {
            assert_syntax_error(
                new_reader(json).peek(),
                SyntaxErrorKind::MalformedJson,
                1,
                1,
            );
        }
    }

    #[test]
    fn strict_rejects_nonfinite_f64() -> Result<(), ReaderError> {
        let mut reader = new_reader("1e999");
        assert_malformed_number(reader.next_f64(), "1e999");

        let mut reader = new_lenient_reader("1e999");
        assert_eq!(f64::INFINITY, reader.next_f64()?);
        Ok(())
    }

    #[test]
    fn lenient_nan_and_infinity() -> Result<(), ReaderError> {
        let mut reader = new_lenient_reader("[NaN, Infinity, -Infinity]");
        reader.begin_array()?;
        assert!(reader.next_f64()?.is_nan());
        assert_eq!(f64::INFINITY, reader.next_f64()?);
        assert_eq!(f64::NEG_INFINITY, reader.next_f64()?);
        reader.end_array()?;
        Ok(())
    }

    #[test]
    fn lenient_grammar_extensions() -> Result<(), ReaderError> {
        let json = r#"
            // leading comment
            {
                a: 1; /* block
                         comment */
                'b' = 2,
                "c" => [1,, 3,]  # hash comment
            }
        "#;
        let mut reader = new_lenient_reader(json);
        reader.begin_object()?;
        assert_eq!("a", reader.next_name()?);
        assert_eq!(1, reader.next_i64()?);
        assert_eq!("b", reader.next_name()?);
        assert_eq!(2, reader.next_i64()?);
        assert_eq!("c", reader.next_name()?);
        reader.begin_array()?;
        assert_eq!(1, reader.next_i64()?);
        // Empty slot is read as null
        reader.next_null()?;
        assert_eq!(3, reader.next_i64()?);
        // Trailing comma ends the array
        reader.end_array()?;
        reader.end_object()?;
        Ok(())
    }

    #[test]
    fn lenient_object_with_trailing_comma() -> Result<(), ReaderError> {
        let json = "{a:1,'b':2,}";
        let mut reader = new_lenient_reader(json);
        reader.begin_object()?;
        assert_eq!("a", reader.next_name()?);
        assert_eq!(1, reader.next_i64()?);
        assert_eq!("b", reader.next_name()?);
        assert_eq!(2, reader.next_i64()?);
        reader.end_object()?;
        assert_eq!(JsonToken::EndOfDocument, reader.peek()?);

        // Strict parsing rejects the unquoted name
        let mut reader = new_reader(json);
        reader.begin_object()?;
        assert_syntax_error(reader.next_name(), SyntaxErrorKind::MalformedJson, 1, 2);
        Ok(())
    }

    #[test]
    fn strict_rejects_trailing_commas() -> Result<(), ReaderError> {
        let mut reader = new_reader("[1,]");
        reader.begin_array()?;
        assert_eq!(1, reader.next_i64()?);
        assert_syntax_error(
            reader.peek(),
            SyntaxErrorKind::TrailingCommaNotEnabled,
            1,
            4,
        );

        let mut reader = new_reader(r#"{"a":1,}"#);
        reader.begin_object()?;
        assert_eq!("a", reader.next_name()?);
        assert_eq!(1, reader.next_i64()?);
        assert_syntax_error(
            reader.peek(),
            SyntaxErrorKind::TrailingCommaNotEnabled,
            1,
            8,
        );
        Ok(())
    }

    #[test]
    fn lenient_trailing_comma_does_not_add_null() -> Result<(), ReaderError> {
        let mut reader = new_lenient_reader("[1,]");
        reader.begin_array()?;
        assert_eq!(1, reader.next_i64()?);
        assert_eq!(false, reader.has_next()?);
        reader.end_array()?;
        Ok(())
    }

    #[test]
    fn lenient_single_quotes_and_unquoted() -> Result<(), ReaderError> {
        let mut reader = new_lenient_reader("['a', b, True, NULL]");
        reader.begin_array()?;
        assert_eq!("a", reader.next_string()?);
        assert_eq!(JsonToken::String, reader.peek()?);
        assert_eq!("b", reader.next_string()?);
        // Keywords are matched case-insensitively
        assert_eq!(true, reader.next_bool()?);
        reader.next_null()?;
        reader.end_array()?;
        Ok(())
    }

    #[test]
    fn strict_rejects_lenient_constructs() {
        assert_syntax_error(
            new_reader("'a'").next_string(),
            SyntaxErrorKind::MalformedJson,
            1,
            1,
        );
        assert_syntax_error(
            new_reader("// c\n1").next_i64(),
            SyntaxErrorKind::CommentsNotEnabled,
            1,
            1,
        );
        assert_syntax_error(
            new_reader("# c\n1").next_i64(),
            SyntaxErrorKind::CommentsNotEnabled,
            1,
            1,
        );
        assert_syntax_error(
            new_reader("True").next_bool(),
            SyntaxErrorKind::MalformedJson,
            1,
            1,
        );

        let mut reader = new_reader("[1;2]");
        assert_eq!(Ok(()), reader.begin_array().map_err(|e| e.to_string()));
        assert_eq!(Ok(1), reader.next_i64().map_err(|e| e.to_string()));
        assert_syntax_error(reader.peek(), SyntaxErrorKind::MalformedJson, 1, 3);

        let mut reader = new_reader("{\"a\"=1}");
        assert_eq!(Ok(()), reader.begin_object().map_err(|e| e.to_string()));
        assert_eq!(
            Ok("a".to_owned()),
            reader.next_name().map_err(|e| e.to_string())
        );
        assert_syntax_error(reader.peek(), SyntaxErrorKind::MalformedJson, 1, 5);
    }

    #[test]
    fn lenient_multiple_top_level_values() -> Result<(), ReaderError> {
        let mut reader = new_lenient_reader("true [] 1");
        assert_eq!(true, reader.next_bool()?);
        assert_eq!(true, reader.has_next()?);
        reader.begin_array()?;
        reader.end_array()?;
        assert_eq!(1, reader.next_i64()?);
        assert_eq!(false, reader.has_next()?);
        assert_eq!(JsonToken::EndOfDocument, reader.peek()?);
        Ok(())
    }

    #[test]
    fn strict_rejects_multiple_top_level_values() -> Result<(), ReaderError> {
        let mut reader = new_reader("1 2");
        assert_eq!(1, reader.next_i64()?);
        assert_syntax_error(
            reader.peek(),
            SyntaxErrorKind::MultipleTopLevelValuesNotEnabled,
            1,
            3,
        );
        Ok(())
    }

    #[test]
    fn lenient_non_execute_prefix() -> Result<(), ReaderError> {
        let mut reader = new_lenient_reader(")]}'\n[1]");
        reader.begin_array()?;
        assert_eq!(1, reader.next_i64()?);
        reader.end_array()?;
        Ok(())
    }

    #[test]
    fn error_location_includes_path() -> Result<(), ReaderError> {
        let mut reader = new_reader(r#"{"a":[1,2,x]}"#);
        reader.begin_object()?;
        assert_eq!("a", reader.next_name()?);
        reader.begin_array()?;
        assert_eq!(1, reader.next_i64()?);
        assert_eq!(2, reader.next_i64()?);
        match reader.peek() {
            Err(ReaderError::SyntaxError(e)) => {
                assert_eq!(SyntaxErrorKind::MalformedJson, e.kind);
                assert_eq!(Some("$.a[2]".to_owned()), e.location.path);
                assert_eq!(
                    Some(LinePosition {
                        line: 1,
                        column: 11
                    }),
                    e.location.line_pos
                );
            }
            r => panic!("expected syntax error, got: {r:?}"),
        }
        Ok(())
    }

    #[test]
    fn error_location_counts_lines() {
        let mut reader = new_reader("[\n  true,\n  ?\n]");
        assert_eq!(Ok(()), reader.begin_array().map_err(|e| e.to_string()));
        assert_eq!(Ok(true), reader.next_bool().map_err(|e| e.to_string()));
        // '?' could start an unquoted literal, which only lenient mode allows
        assert_syntax_error(reader.peek(), SyntaxErrorKind::MalformedJson, 3, 3);
    }

    #[test]
    fn incomplete_documents() {
        let mut reader = new_reader("[1,");
        assert_eq!(Ok(()), reader.begin_array().map_err(|e| e.to_string()));
        assert_eq!(Ok(1), reader.next_i64().map_err(|e| e.to_string()));
        assert_syntax_error(reader.peek(), SyntaxErrorKind::IncompleteDocument, 1, 4);

        let mut reader = new_reader(r#"{"a""#);
        assert_eq!(Ok(()), reader.begin_object().map_err(|e| e.to_string()));
        assert_eq!(
            Ok("a".to_owned()),
            reader.next_name().map_err(|e| e.to_string())
        );
        assert_syntax_error(reader.peek(), SyntaxErrorKind::IncompleteDocument, 1, 5);
    }

    #[test]
    fn missing_separators() {
        let mut reader = new_reader("[1 2]");
        assert_eq!(Ok(()), reader.begin_array().map_err(|e| e.to_string()));
        assert_eq!(Ok(1), reader.next_i64().map_err(|e| e.to_string()));
        assert_syntax_error(reader.peek(), SyntaxErrorKind::ExpectedCommaOrEnd, 1, 4);

        let mut reader = new_reader(r#"{"a" 1}"#);
        assert_eq!(Ok(()), reader.begin_object().map_err(|e| e.to_string()));
        assert_eq!(
            Ok("a".to_owned()),
            reader.next_name().map_err(|e| e.to_string())
        );
        assert_syntax_error(reader.peek(), SyntaxErrorKind::ExpectedColon, 1, 6);
    }

    #[test]
    fn unexpected_token_keeps_reader_position() -> Result<(), ReaderError> {
        let mut reader = new_reader("[true]");
        reader.begin_array()?;
        assert_unexpected_token(reader.next_i64(), Expected::Number, JsonToken::Boolean);
        // The reader is still positioned before the boolean
        assert_eq!(true, reader.next_bool()?);
        reader.end_array()?;
        Ok(())
    }

    #[test]
    fn skip_value_skips_nested() -> Result<(), ReaderError> {
        let mut reader = new_reader(r#"{"a": {"x": [1, {"y": 2}]}, "b": 3}"#);
        reader.begin_object()?;
        assert_eq!("a", reader.next_name()?);
        reader.skip_value()?;
        assert_eq!("b", reader.next_name()?);
        assert_eq!(3, reader.next_i64()?);
        reader.end_object()?;
        Ok(())
    }

    #[test]
    fn skip_value_stops_at_incomplete_document() {
        let mut reader = new_reader("[[1, 2");
        assert_syntax_error(
            reader.skip_value(),
            SyntaxErrorKind::IncompleteDocument,
            1,
            7,
        );
    }

    #[test]
    fn skip_value_skips_name_only() -> Result<(), ReaderError> {
        let mut reader = new_reader(r#"{"a": 1}"#);
        reader.begin_object()?;
        assert_eq!(JsonToken::Name, reader.peek()?);
        reader.skip_value()?;
        // Skipped name records "null" in the path
        assert_eq!("$.null", reader.path());
        assert_eq!(1, reader.next_i64()?);
        reader.end_object()?;
        Ok(())
    }

    #[test]
    fn max_nesting_depth() -> Result<(), ReaderError> {
        let json = "[".repeat(200);
        let mut reader = JsonStreamReader::new_custom(
            json.as_bytes(),
            ReaderSettings {
                max_nesting_depth: Some(3),
                ..Default::default()
            },
        );
        reader.begin_array()?;
        reader.begin_array()?;
        reader.begin_array()?;
        assert_syntax_error(reader.begin_array(), SyntaxErrorKind::MaxDepthExceeded, 1, 5);

        // No limit
        let mut reader = JsonStreamReader::new_custom(
            json.as_bytes(),
            ReaderSettings {
                max_nesting_depth: None,
                ..Default::default()
            },
        );
        for _ in 0..200 {
            reader.begin_array()?;
        }
        Ok(())
    }

    #[test]
    fn large_document_refills_buffer() -> Result<(), ReaderError> {
        // Exceeds the internal buffer multiple times
        let big_string = "x".repeat(10 * READER_BUF_SIZE);
        let json = format!(r#"["{big_string}", 1]"#);
        let mut reader = new_reader(&json);
        reader.begin_array()?;
        assert_eq!(big_string, reader.next_string()?);
        assert_eq!(1, reader.next_i64()?);
        reader.end_array()?;
        Ok(())
    }

    #[test]
    #[should_panic(expected = "Incorrect reader usage: reader is closed")]
    fn closed_reader_panics() {
        let mut reader = new_reader("[]");
        reader.close();
        let _ = reader.peek();
    }
}
