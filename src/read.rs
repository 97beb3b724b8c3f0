//! Streaming JSON reading.
//!
//! This module provides the pull-side of the token protocol: [`JsonReader`]
//! turns raw JSON text into a sequence of typed tokens without knowing
//! anything about target types. It is the only place in the crate that
//! touches raw characters on the input side.
//!
//! ## Overview
//!
//! - **Single-pass scanning**: a buffered character cursor with no unbounded
//!   look-ahead; the only buffered token is an object member name peeked by
//!   the metadata path
//! - **Number classification**: literals are scanned sign/digits/fraction/
//!   exponent in one pass and classified as integer vs. float; integers
//!   accumulate directly into `i64`, overflowing into `BigInt`
//! - **Escape decoding**: `\uXXXX` (including surrogate pairs) and the
//!   standard control escapes, decoded into a scratch buffer reused across
//!   values
//! - **Error reporting**: every syntax error carries the line and column of
//!   the offending token
//!
//! ## Usage
//!
//! ```rust
//! use jsonbind::{JsonReader, TokenKind};
//!
//! let mut reader = JsonReader::new(r#"{"a": [1, true]}"#);
//! assert_eq!(reader.next().unwrap(), TokenKind::BeginObject);
//! reader.begin_object().unwrap();
//!
//! assert_eq!(reader.next().unwrap(), TokenKind::BeginArray);
//! assert_eq!(reader.name().unwrap(), "a");
//! reader.begin_array().unwrap();
//! reader.next().unwrap();
//! assert_eq!(reader.value_as_i64().unwrap(), 1);
//! reader.next().unwrap();
//! assert!(reader.value_as_bool().unwrap());
//! reader.end_array().unwrap();
//!
//! reader.end_object().unwrap();
//! ```
//!
//! Byte input should go through [`decode_document`] first, which performs
//! the JSON encoding detection (BOM sniffing, then the null-byte-pattern
//! heuristic among UTF-8/16/32) before any character reading begins.

use crate::token::{Scope, TokenKind};
use crate::{Error, Result};
use indexmap::IndexMap;
use num_bigint::BigInt;
use std::borrow::Cow;

/// Default reserved-property prefix for metadata members.
pub const DEFAULT_METADATA_PREFIX: char = '@';

/// A scanned number literal, preserving its integer vs. float
/// classification and `i64` overflow into [`BigInt`].
#[derive(Clone, Debug, PartialEq)]
pub enum JsonNumber {
    /// Integer literal fitting `i64`
    Int(i64),
    /// Integer literal wider than `i64`
    Big(BigInt),
    /// Floating-point literal
    Float(f64),
}

use JsonNumber as Number;

/// The value the cursor is currently positioned on.
#[derive(Clone, Debug)]
enum Pending {
    /// Not positioned on a value; call `next()` first
    None,
    /// `null` literal, already consumed from the input
    Null,
    /// Boolean literal, already consumed
    Bool(bool),
    /// Number literal, already consumed; the raw text is kept for string
    /// coercion
    Num(Number, String),
    /// Positioned at the opening quote of a string
    Str,
    /// Positioned at `[` or `{`
    Container,
}

struct Frame {
    scope: Scope,
    count: usize,
}

/// The streaming JSON pull reader.
///
/// A reader is confined to one logical call stack for the duration of one
/// document; it carries mutable cursor, buffer and container-stack state and
/// is not thread-safe. After a structural error it is left in an unspecified
/// state and must not be reused.
pub struct JsonReader<'de> {
    input: &'de str,
    position: usize,
    line: usize,
    column: usize,
    stack: Vec<Frame>,
    scratch: String,
    pending: Pending,
    current_name: Option<String>,
    /// Name parsed ahead of time while gathering metadata
    stashed_name: Option<String>,
    metadata: IndexMap<String, String>,
    metadata_prefix: char,
}

impl<'de> JsonReader<'de> {
    /// Creates a reader over a complete JSON document (or several
    /// concatenated documents; call [`next`](Self::next) again after a
    /// finished root value to read the following one).
    pub fn new(input: &'de str) -> Self {
        JsonReader {
            input,
            position: 0,
            line: 1,
            column: 1,
            stack: vec![Frame {
                scope: Scope::Empty,
                count: 0,
            }],
            scratch: String::new(),
            pending: Pending::None,
            current_name: None,
            stashed_name: None,
            metadata: IndexMap::new(),
            metadata_prefix: DEFAULT_METADATA_PREFIX,
        }
    }

    /// Sets the reserved-property prefix used by the metadata path.
    #[must_use]
    pub fn with_metadata_prefix(mut self, prefix: char) -> Self {
        self.metadata_prefix = prefix;
        self
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.input[self.position..].chars().next()?;
        self.position += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch == ' ' || ch == '\t' || ch == '\n' || ch == '\r' {
                self.next_char();
            } else {
                break;
            }
        }
    }

    fn at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn syntax(&self, msg: impl Into<String>) -> Error {
        Error::syntax(self.line, self.column, msg)
    }

    fn incomplete(&self, expected: &str) -> Error {
        Error::incomplete(self.line, self.column, expected)
    }

    fn coercion(&self, expected: &str, found: &str) -> Error {
        Error::coercion(self.line, self.column, expected, found)
    }

    fn expect_char(&mut self, expected: char) -> Result<()> {
        self.skip_whitespace();
        match self.peek_char() {
            Some(ch) if ch == expected => {
                self.next_char();
                Ok(())
            }
            Some(ch) => Err(self.syntax(format!("expected '{expected}', found '{ch}'"))),
            None => Err(self.incomplete(&format!("'{expected}'"))),
        }
    }

    fn top(&self) -> &Frame {
        self.stack.last().expect("scope stack never empties")
    }

    fn top_mut(&mut self) -> &mut Frame {
        self.stack.last_mut().expect("scope stack never empties")
    }

    /// Advances to the next array element or object member and returns the
    /// kind of the discovered value.
    ///
    /// Inside an object this also consumes the member name, available via
    /// [`name`](Self::name) until the next advance. At the top level, a
    /// clean end of input yields [`TokenKind::Eof`].
    pub fn next(&mut self) -> Result<TokenKind> {
        self.current_name = None;
        self.skip_whitespace();
        match self.top().scope {
            Scope::Empty => {
                if self.at_end() {
                    self.pending = Pending::None;
                    return Ok(TokenKind::Eof);
                }
                self.classify_value()
            }
            Scope::Array => {
                if self.top().count > 0 {
                    self.expect_char(',')?;
                    self.skip_whitespace();
                }
                if self.peek_char() == Some(']') {
                    return Err(self.syntax("expected array element, found ']'"));
                }
                self.top_mut().count += 1;
                self.classify_value()
            }
            Scope::Object => {
                let name = match self.stashed_name.take() {
                    Some(name) => name,
                    None => {
                        if self.top().count > 0 {
                            self.expect_char(',')?;
                            self.skip_whitespace();
                        }
                        if self.peek_char() == Some('}') {
                            return Err(self.syntax("expected member name, found '}'"));
                        }
                        if self.peek_char() != Some('"') {
                            return Err(self.syntax("expected member name"));
                        }
                        self.parse_string_value()?
                    }
                };
                self.expect_char(':')?;
                self.skip_whitespace();
                self.top_mut().count += 1;
                let kind = self.classify_value()?;
                self.current_name = Some(name);
                Ok(kind)
            }
            Scope::ObjectMetadata => Err(self.syntax(
                "metadata was read for this object; call begin_object before reading members",
            )),
        }
    }

    /// Returns the name of the member last advanced to by
    /// [`next`](Self::next). Only valid inside an object.
    pub fn name(&self) -> Result<&str> {
        self.current_name
            .as_deref()
            .ok_or_else(|| self.syntax("no member name at the current position"))
    }

    /// Returns the kind of the value the reader is currently positioned on,
    /// or `None` when no value is pending.
    pub fn value_kind(&self) -> Option<TokenKind> {
        match &self.pending {
            Pending::None => None,
            Pending::Null => Some(TokenKind::Null),
            Pending::Bool(_) => Some(TokenKind::Boolean),
            Pending::Num(Number::Float(_), _) => Some(TokenKind::Float),
            Pending::Num(_, _) => Some(TokenKind::Integer),
            Pending::Str => Some(TokenKind::String),
            Pending::Container => {
                if self.peek_char() == Some('[') {
                    Some(TokenKind::BeginArray)
                } else {
                    Some(TokenKind::BeginObject)
                }
            }
        }
    }

    /// Returns `true` while the currently open array or object has more
    /// elements/members, or while more concatenated documents follow at the
    /// top level.
    pub fn has_next(&mut self) -> Result<bool> {
        if self.stashed_name.is_some() {
            return Ok(true);
        }
        self.skip_whitespace();
        match self.top().scope {
            Scope::Empty => Ok(!self.at_end()),
            Scope::Array => match self.peek_char() {
                Some(']') => Ok(false),
                Some(_) => Ok(true),
                None => Err(self.incomplete("']' or array element")),
            },
            Scope::Object | Scope::ObjectMetadata => match self.peek_char() {
                Some('}') => Ok(false),
                Some(_) => Ok(true),
                None => Err(self.incomplete("'}' or member name")),
            },
        }
    }

    /// Enters the array the reader is positioned on.
    pub fn begin_array(&mut self) -> Result<()> {
        match self.pending {
            Pending::Container if self.peek_char() == Some('[') => {
                self.next_char();
                self.stack.push(Frame {
                    scope: Scope::Array,
                    count: 0,
                });
                self.pending = Pending::None;
                Ok(())
            }
            _ => {
                let found = self
                    .value_kind()
                    .map(TokenKind::describe)
                    .unwrap_or("no value");
                Err(self.syntax(format!("expected array, found {found}")))
            }
        }
    }

    /// Leaves the current array. Fails if the current open frame is not an
    /// array or the array has unread elements.
    pub fn end_array(&mut self) -> Result<()> {
        if self.top().scope != Scope::Array {
            return Err(self.syntax("end_array called but the current scope is not an array"));
        }
        self.expect_char(']')?;
        self.stack.pop();
        Ok(())
    }

    /// Enters the object the reader is positioned on.
    ///
    /// If metadata was already consumed for this object via
    /// [`metadata`](Self::metadata), this switches to normal member reading
    /// without consuming input and without re-reading those members.
    pub fn begin_object(&mut self) -> Result<()> {
        if self.top().scope == Scope::ObjectMetadata {
            self.top_mut().scope = Scope::Object;
            return Ok(());
        }
        match self.pending {
            Pending::Container if self.peek_char() == Some('{') => {
                self.next_char();
                self.stack.push(Frame {
                    scope: Scope::Object,
                    count: 0,
                });
                self.pending = Pending::None;
                Ok(())
            }
            _ => {
                let found = self
                    .value_kind()
                    .map(TokenKind::describe)
                    .unwrap_or("no value");
                Err(self.syntax(format!("expected object, found {found}")))
            }
        }
    }

    /// Leaves the current object. Fails if the current open frame is not an
    /// object or the object has unread members.
    pub fn end_object(&mut self) -> Result<()> {
        if self.top().scope != Scope::Object {
            return Err(self.syntax("end_object called but the current scope is not an object"));
        }
        if self.stashed_name.is_some() {
            return Err(self.syntax("end_object called with an unread member"));
        }
        self.expect_char('}')?;
        self.stack.pop();
        self.current_name = None;
        Ok(())
    }

    /// Reads the reserved metadata member `key` of the object the reader is
    /// positioned on.
    ///
    /// Metadata members are prefix-marked pseudo-properties written before
    /// any ordinary member. The first call consumes the object head up to
    /// the first ordinary member; further calls (and a later
    /// [`begin_object`](Self::begin_object)) reuse the gathered values
    /// without re-reading input. `key` is given without the prefix.
    pub fn metadata(&mut self, key: &str) -> Result<Option<&str>> {
        if self.top().scope != Scope::ObjectMetadata {
            self.gather_metadata()?;
        }
        Ok(self.metadata.get(key).map(String::as_str))
    }

    fn gather_metadata(&mut self) -> Result<()> {
        match self.pending {
            Pending::Container if self.peek_char() == Some('{') => {}
            _ => {
                let found = self
                    .value_kind()
                    .map(TokenKind::describe)
                    .unwrap_or("no value");
                return Err(self.syntax(format!("expected object, found {found}")));
            }
        }
        self.next_char();
        self.pending = Pending::None;
        self.stack.push(Frame {
            scope: Scope::ObjectMetadata,
            count: 0,
        });
        self.metadata.clear();
        loop {
            self.skip_whitespace();
            match self.peek_char() {
                Some('}') => break,
                Some('"') => {}
                Some(ch) => return Err(self.syntax(format!("expected member name, found '{ch}'"))),
                None => return Err(self.incomplete("'}' or member name")),
            }
            let name = self.parse_string_value()?;
            if let Some(stripped) = name.strip_prefix(self.metadata_prefix) {
                let key = stripped.to_string();
                self.expect_char(':')?;
                self.skip_whitespace();
                self.classify_value()?;
                let value = self.value_as_string()?;
                self.metadata.insert(key, value);
                self.top_mut().count += 1;
                self.skip_whitespace();
                if self.peek_char() == Some(',') {
                    self.next_char();
                } else {
                    break;
                }
            } else {
                // First ordinary member; stash its already-parsed name for
                // the next() after begin_object.
                self.stashed_name = Some(name);
                break;
            }
        }
        Ok(())
    }

    /// Reads the current scalar as a string, coercing numbers and booleans
    /// to their literal text.
    pub fn value_as_string(&mut self) -> Result<String> {
        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::Str => self.parse_string_value(),
            Pending::Num(_, raw) => Ok(raw),
            Pending::Bool(b) => Ok(if b { "true" } else { "false" }.to_string()),
            Pending::Null => Err(self.coercion("string", "null")),
            Pending::Container => Err(self.coercion("string", "a structural type")),
            Pending::None => Err(self.syntax("no value to read; call next() first")),
        }
    }

    /// Reads the current scalar as an `i64`, coercing numeric strings.
    pub fn value_as_i64(&mut self) -> Result<i64> {
        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::Num(Number::Int(v), _) => Ok(v),
            Pending::Num(Number::Big(_), raw) => {
                Err(self.coercion("64-bit integer", &format!("number {raw}")))
            }
            Pending::Num(Number::Float(_), raw) => {
                Err(self.coercion("integer", &format!("float {raw}")))
            }
            Pending::Str => {
                let s = self.parse_string_value()?;
                s.parse::<i64>()
                    .map_err(|_| self.coercion("integer", &format!("string \"{s}\"")))
            }
            Pending::Bool(_) => Err(self.coercion("integer", "boolean")),
            Pending::Null => Err(self.coercion("integer", "null")),
            Pending::Container => Err(self.coercion("integer", "a structural type")),
            Pending::None => Err(self.syntax("no value to read; call next() first")),
        }
    }

    /// Reads the current scalar as an `f64`, coercing integers and numeric
    /// strings.
    pub fn value_as_f64(&mut self) -> Result<f64> {
        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::Num(Number::Float(v), _) => Ok(v),
            Pending::Num(Number::Int(v), _) => Ok(v as f64),
            Pending::Num(Number::Big(_), raw) => raw
                .parse::<f64>()
                .map_err(|_| self.coercion("float", &format!("number {raw}"))),
            Pending::Str => {
                let s = self.parse_string_value()?;
                s.parse::<f64>()
                    .map_err(|_| self.coercion("float", &format!("string \"{s}\"")))
            }
            Pending::Bool(_) => Err(self.coercion("float", "boolean")),
            Pending::Null => Err(self.coercion("float", "null")),
            Pending::Container => Err(self.coercion("float", "a structural type")),
            Pending::None => Err(self.syntax("no value to read; call next() first")),
        }
    }

    /// Reads the current scalar as a `bool`, coercing the strings `"true"`
    /// and `"false"`.
    pub fn value_as_bool(&mut self) -> Result<bool> {
        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::Bool(b) => Ok(b),
            Pending::Str => {
                let s = self.parse_string_value()?;
                match s.as_str() {
                    "true" => Ok(true),
                    "false" => Ok(false),
                    _ => Err(self.coercion("boolean", &format!("string \"{s}\""))),
                }
            }
            Pending::Num(_, raw) => Err(self.coercion("boolean", &format!("number {raw}"))),
            Pending::Null => Err(self.coercion("boolean", "null")),
            Pending::Container => Err(self.coercion("boolean", "a structural type")),
            Pending::None => Err(self.syntax("no value to read; call next() first")),
        }
    }

    /// Reads the current scalar as a [`BigInt`], accepting any integer
    /// literal and numeric strings.
    pub fn value_as_big_int(&mut self) -> Result<BigInt> {
        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::Num(Number::Int(v), _) => Ok(BigInt::from(v)),
            Pending::Num(Number::Big(v), _) => Ok(v),
            Pending::Num(Number::Float(_), raw) => {
                Err(self.coercion("integer", &format!("float {raw}")))
            }
            Pending::Str => {
                let s = self.parse_string_value()?;
                s.parse::<BigInt>()
                    .map_err(|_| self.coercion("integer", &format!("string \"{s}\"")))
            }
            Pending::Bool(_) => Err(self.coercion("integer", "boolean")),
            Pending::Null => Err(self.coercion("integer", "null")),
            Pending::Container => Err(self.coercion("integer", "a structural type")),
            Pending::None => Err(self.syntax("no value to read; call next() first")),
        }
    }

    /// Reads the current number literal with its scanned classification,
    /// coercing numeric strings.
    pub fn value_as_number(&mut self) -> Result<JsonNumber> {
        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::Num(num, _) => Ok(num),
            Pending::Str => {
                let s = self.parse_string_value()?;
                if let Ok(v) = s.parse::<i64>() {
                    return Ok(JsonNumber::Int(v));
                }
                if let Ok(v) = s.parse::<BigInt>() {
                    return Ok(JsonNumber::Big(v));
                }
                s.parse::<f64>()
                    .map(JsonNumber::Float)
                    .map_err(|_| self.coercion("number", &format!("string \"{s}\"")))
            }
            Pending::Bool(_) => Err(self.coercion("number", "boolean")),
            Pending::Null => Err(self.coercion("number", "null")),
            Pending::Container => Err(self.coercion("number", "a structural type")),
            Pending::None => Err(self.syntax("no value to read; call next() first")),
        }
    }

    /// The current line and column, for error reporting in converters that
    /// post-process scalar values.
    #[must_use]
    pub fn location(&self) -> (usize, usize) {
        (self.line, self.column)
    }

    /// Consumes the current `null` value.
    pub fn value_as_null(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::Null => Ok(()),
            other => {
                self.pending = other;
                let found = self
                    .value_kind()
                    .map(TokenKind::describe)
                    .unwrap_or("no value");
                Err(self.syntax(format!("expected null, found {found}")))
            }
        }
    }

    /// Recursively discards the current value, balancing any containers it
    /// opens.
    pub fn skip_value(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::Null | Pending::Bool(_) | Pending::Num(_, _) => Ok(()),
            Pending::Str => {
                self.parse_string_value()?;
                Ok(())
            }
            Pending::Container => self.skip_container(),
            Pending::None => Err(self.syntax("no value to skip; call next() first")),
        }
    }

    fn skip_container(&mut self) -> Result<()> {
        let mut depth = 0usize;
        loop {
            match self.next_char() {
                Some('[') | Some('{') => depth += 1,
                Some(']') | Some('}') => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some('"') => self.skip_string_raw()?,
                Some(_) => {}
                None => return Err(self.incomplete("matching container end")),
            }
        }
    }

    fn skip_string_raw(&mut self) -> Result<()> {
        loop {
            match self.next_char() {
                Some('"') => return Ok(()),
                Some('\\') => {
                    self.next_char();
                }
                Some(_) => {}
                None => return Err(self.incomplete("closing '\"'")),
            }
        }
    }

    /// Classifies the upcoming value. Literals and numbers are consumed
    /// eagerly; strings and containers stay at their opening character.
    fn classify_value(&mut self) -> Result<TokenKind> {
        match self.peek_char() {
            Some('{') | Some('[') => {
                self.pending = Pending::Container;
                Ok(if self.peek_char() == Some('[') {
                    TokenKind::BeginArray
                } else {
                    TokenKind::BeginObject
                })
            }
            Some('"') => {
                self.pending = Pending::Str;
                Ok(TokenKind::String)
            }
            Some('t') => {
                self.expect_keyword("true")?;
                self.pending = Pending::Bool(true);
                Ok(TokenKind::Boolean)
            }
            Some('f') => {
                self.expect_keyword("false")?;
                self.pending = Pending::Bool(false);
                Ok(TokenKind::Boolean)
            }
            Some('n') => {
                self.expect_keyword("null")?;
                self.pending = Pending::Null;
                Ok(TokenKind::Null)
            }
            Some(ch) if ch == '-' || ch.is_ascii_digit() => {
                let (num, raw) = self.scan_number()?;
                let kind = match num {
                    Number::Float(_) => TokenKind::Float,
                    _ => TokenKind::Integer,
                };
                self.pending = Pending::Num(num, raw);
                Ok(kind)
            }
            Some(ch) => Err(self.syntax(format!("unexpected character '{ch}'"))),
            None => Err(self.incomplete("a value")),
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        for expected in keyword.chars() {
            match self.next_char() {
                Some(ch) if ch == expected => {}
                Some(_) | None => {
                    return Err(self.syntax(format!("invalid literal, expected '{keyword}'")))
                }
            }
        }
        Ok(())
    }

    /// Scans one number literal character by character, classifying it as
    /// integer or float. Integer digits accumulate into `i64` directly,
    /// overflowing into a `BigInt` parsed from the already-scanned slice.
    fn scan_number(&mut self) -> Result<(Number, String)> {
        let start = self.position;
        let mut negative = false;
        if self.peek_char() == Some('-') {
            negative = true;
            self.next_char();
        }
        // Integer part; a leading zero must stand alone.
        let mut acc: Option<i64> = Some(0);
        let mut digits = 0usize;
        if self.peek_char() == Some('0') {
            self.next_char();
            digits = 1;
            if matches!(self.peek_char(), Some(ch) if ch.is_ascii_digit()) {
                return Err(self.syntax("leading zeros are not allowed"));
            }
        } else {
            while let Some(ch) = self.peek_char() {
                if let Some(d) = ch.to_digit(10) {
                    self.next_char();
                    digits += 1;
                    acc = acc
                        .and_then(|a| a.checked_mul(10))
                        .and_then(|a| a.checked_sub(d as i64));
                } else {
                    break;
                }
            }
        }
        if digits == 0 {
            return Err(self.syntax("expected digits in number literal"));
        }
        let mut is_float = false;
        if self.peek_char() == Some('.') {
            is_float = true;
            self.next_char();
            let mut frac = 0usize;
            while matches!(self.peek_char(), Some(ch) if ch.is_ascii_digit()) {
                self.next_char();
                frac += 1;
            }
            if frac == 0 {
                return Err(self.syntax("expected digits after decimal point"));
            }
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            is_float = true;
            self.next_char();
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                self.next_char();
            }
            let mut exp = 0usize;
            while matches!(self.peek_char(), Some(ch) if ch.is_ascii_digit()) {
                self.next_char();
                exp += 1;
            }
            if exp == 0 {
                return Err(self.syntax("expected digits in exponent"));
            }
        }
        let raw = &self.input[start..self.position];
        let num = if is_float {
            let v = raw
                .parse::<f64>()
                .map_err(|_| self.syntax("invalid number literal"))?;
            Number::Float(v)
        } else {
            // Digits were accumulated negated so i64::MIN round-trips.
            match acc {
                Some(neg) if negative => Number::Int(neg),
                Some(neg) => match neg.checked_neg() {
                    Some(v) => Number::Int(v),
                    None => Number::Big(
                        raw.parse::<BigInt>()
                            .map_err(|_| self.syntax("invalid number literal"))?,
                    ),
                },
                None => Number::Big(
                    raw.parse::<BigInt>()
                        .map_err(|_| self.syntax("invalid number literal"))?,
                ),
            }
        };
        Ok((num, raw.to_string()))
    }

    /// Parses the string the cursor is positioned at (opening quote not yet
    /// consumed), decoding escapes into the reusable scratch buffer.
    fn parse_string_value(&mut self) -> Result<String> {
        if self.peek_char() != Some('"') {
            return Err(self.syntax("expected '\"'"));
        }
        self.next_char();
        // Fast path: no escapes, return the borrowed slice directly.
        let start = self.position;
        loop {
            match self.peek_char() {
                Some('"') => {
                    let s = self.input[start..self.position].to_string();
                    self.next_char();
                    return Ok(s);
                }
                Some('\\') => break,
                Some(ch) if (ch as u32) < 0x20 => {
                    return Err(self.syntax("unescaped control character in string"))
                }
                Some(_) => {
                    self.next_char();
                }
                None => return Err(self.incomplete("closing '\"'")),
            }
        }
        self.scratch.clear();
        self.scratch.push_str(&self.input[start..self.position]);
        loop {
            match self.next_char() {
                Some('"') => return Ok(self.scratch.clone()),
                Some('\\') => {
                    let decoded = self.parse_escape()?;
                    self.scratch.push(decoded);
                }
                Some(ch) if (ch as u32) < 0x20 => {
                    return Err(self.syntax("unescaped control character in string"))
                }
                Some(ch) => self.scratch.push(ch),
                None => return Err(self.incomplete("closing '\"'")),
            }
        }
    }

    fn parse_escape(&mut self) -> Result<char> {
        match self.next_char() {
            Some('"') => Ok('"'),
            Some('\\') => Ok('\\'),
            Some('/') => Ok('/'),
            Some('n') => Ok('\n'),
            Some('r') => Ok('\r'),
            Some('t') => Ok('\t'),
            Some('b') => Ok('\u{0008}'),
            Some('f') => Ok('\u{000C}'),
            Some('u') => {
                let high = self.parse_hex4()?;
                if (0xD800..0xDC00).contains(&high) {
                    // High surrogate; a low surrogate escape must follow.
                    if self.next_char() != Some('\\') || self.next_char() != Some('u') {
                        return Err(self.syntax("unpaired surrogate in \\u escape"));
                    }
                    let low = self.parse_hex4()?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(self.syntax("invalid low surrogate in \\u escape"));
                    }
                    let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    char::from_u32(code).ok_or_else(|| self.syntax("invalid surrogate pair"))
                } else {
                    char::from_u32(high)
                        .ok_or_else(|| self.syntax("invalid unicode code point in \\u escape"))
                }
            }
            Some(ch) => Err(self.syntax(format!("invalid escape '\\{ch}'"))),
            None => Err(self.incomplete("escape sequence")),
        }
    }

    fn parse_hex4(&mut self) -> Result<u32> {
        let mut value = 0u32;
        for _ in 0..4 {
            match self.next_char().and_then(|ch| ch.to_digit(16)) {
                Some(d) => value = value * 16 + d,
                None => {
                    return Err(self.syntax("invalid unicode escape (expected 4 hex digits)"))
                }
            }
        }
        Ok(value)
    }
}

/// Detected document encoding, per the JSON RFC heuristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
}

/// Decodes raw document bytes to text.
///
/// Performs the JSON-mandated encoding detection before any character
/// reading: BOM sniffing first, then the null-byte-pattern heuristic across
/// UTF-8/UTF-16LE/UTF-16BE/UTF-32LE/UTF-32BE. Empty and BOM-only inputs
/// decode to the empty document ("no data") rather than erroring.
///
/// # Examples
///
/// ```rust
/// use jsonbind::decode_document;
///
/// assert_eq!(decode_document(b"[1]").unwrap(), "[1]");
/// // UTF-16LE without a BOM
/// assert_eq!(decode_document(b"1\x000\x00").unwrap(), "10");
/// // BOM-only input is "no data", not an error
/// assert_eq!(decode_document(b"\xEF\xBB\xBF").unwrap(), "");
/// ```
pub fn decode_document(bytes: &[u8]) -> Result<Cow<'_, str>> {
    let (encoding, offset) = detect_encoding(bytes);
    let body = &bytes[offset..];
    match encoding {
        Encoding::Utf8 => std::str::from_utf8(body)
            .map(Cow::Borrowed)
            .map_err(|_| Error::syntax(1, 1, "invalid UTF-8 in document")),
        Encoding::Utf16Le | Encoding::Utf16Be => {
            if body.len() % 2 != 0 {
                return Err(Error::syntax(1, 1, "truncated UTF-16 document"));
            }
            let units: Vec<u16> = body
                .chunks_exact(2)
                .map(|pair| {
                    if encoding == Encoding::Utf16Le {
                        u16::from_le_bytes([pair[0], pair[1]])
                    } else {
                        u16::from_be_bytes([pair[0], pair[1]])
                    }
                })
                .collect();
            String::from_utf16(&units)
                .map(Cow::Owned)
                .map_err(|_| Error::syntax(1, 1, "invalid UTF-16 in document"))
        }
        Encoding::Utf32Le | Encoding::Utf32Be => {
            if body.len() % 4 != 0 {
                return Err(Error::syntax(1, 1, "truncated UTF-32 document"));
            }
            let mut out = String::with_capacity(body.len() / 4);
            for quad in body.chunks_exact(4) {
                let code = if encoding == Encoding::Utf32Le {
                    u32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]])
                } else {
                    u32::from_be_bytes([quad[0], quad[1], quad[2], quad[3]])
                };
                let ch = char::from_u32(code)
                    .ok_or_else(|| Error::syntax(1, 1, "invalid UTF-32 in document"))?;
                out.push(ch);
            }
            Ok(Cow::Owned(out))
        }
    }
}

/// BOM sniffing, then byte-pattern sniffing. JSON text starts with two ASCII
/// characters, so the position of null bytes among the first four identifies
/// the encoding.
fn detect_encoding(bytes: &[u8]) -> (Encoding, usize) {
    match bytes {
        [0xEF, 0xBB, 0xBF, ..] => return (Encoding::Utf8, 3),
        [0xFF, 0xFE, 0x00, 0x00, ..] => return (Encoding::Utf32Le, 4),
        [0x00, 0x00, 0xFE, 0xFF, ..] => return (Encoding::Utf32Be, 4),
        [0xFF, 0xFE, ..] => return (Encoding::Utf16Le, 2),
        [0xFE, 0xFF, ..] => return (Encoding::Utf16Be, 2),
        _ => {}
    }
    if bytes.len() >= 4 {
        match (bytes[0] == 0, bytes[1] == 0, bytes[2] == 0, bytes[3] == 0) {
            (true, true, true, false) => return (Encoding::Utf32Be, 0),
            (false, true, true, true) => return (Encoding::Utf32Le, 0),
            (true, false, true, false) => return (Encoding::Utf16Be, 0),
            (false, true, false, true) => return (Encoding::Utf16Le, 0),
            _ => {}
        }
    } else if bytes.len() >= 2 {
        match (bytes[0] == 0, bytes[1] == 0) {
            (true, false) => return (Encoding::Utf16Be, 0),
            (false, true) => return (Encoding::Utf16Le, 0),
            _ => {}
        }
    }
    (Encoding::Utf8, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        let mut r = JsonReader::new("42");
        assert_eq!(r.next().unwrap(), TokenKind::Integer);
        assert_eq!(r.value_as_i64().unwrap(), 42);

        let mut r = JsonReader::new("-3.5e2");
        assert_eq!(r.next().unwrap(), TokenKind::Float);
        assert_eq!(r.value_as_f64().unwrap(), -350.0);

        let mut r = JsonReader::new("\"hi\"");
        assert_eq!(r.next().unwrap(), TokenKind::String);
        assert_eq!(r.value_as_string().unwrap(), "hi");

        let mut r = JsonReader::new("true");
        assert_eq!(r.next().unwrap(), TokenKind::Boolean);
        assert!(r.value_as_bool().unwrap());

        let mut r = JsonReader::new("null");
        assert_eq!(r.next().unwrap(), TokenKind::Null);
        r.value_as_null().unwrap();
    }

    #[test]
    fn test_i64_extremes_round_trip() {
        let mut r = JsonReader::new("-9223372036854775808");
        assert_eq!(r.next().unwrap(), TokenKind::Integer);
        assert_eq!(r.value_as_i64().unwrap(), i64::MIN);

        let mut r = JsonReader::new("9223372036854775807");
        r.next().unwrap();
        assert_eq!(r.value_as_i64().unwrap(), i64::MAX);
    }

    #[test]
    fn test_big_integer_overflow() {
        let mut r = JsonReader::new("123456789012345678901234567890");
        assert_eq!(r.next().unwrap(), TokenKind::Integer);
        let big = r.value_as_big_int().unwrap();
        assert_eq!(big.to_string(), "123456789012345678901234567890");
    }

    #[test]
    fn test_object_members() {
        let mut r = JsonReader::new(r#"{"a": 1, "b": "x"}"#);
        r.next().unwrap();
        r.begin_object().unwrap();
        assert!(r.has_next().unwrap());
        assert_eq!(r.next().unwrap(), TokenKind::Integer);
        assert_eq!(r.name().unwrap(), "a");
        assert_eq!(r.value_as_i64().unwrap(), 1);
        assert_eq!(r.next().unwrap(), TokenKind::String);
        assert_eq!(r.name().unwrap(), "b");
        assert_eq!(r.value_as_string().unwrap(), "x");
        assert!(!r.has_next().unwrap());
        r.end_object().unwrap();
    }

    #[test]
    fn test_container_kind_mismatch() {
        let mut r = JsonReader::new(r#"{"a": 1}"#);
        r.next().unwrap();
        r.begin_object().unwrap();
        let err = r.end_array().unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }));
    }

    #[test]
    fn test_premature_end_is_incomplete() {
        let mut r = JsonReader::new("[1, 2");
        r.next().unwrap();
        r.begin_array().unwrap();
        r.next().unwrap();
        r.value_as_i64().unwrap();
        r.next().unwrap();
        r.value_as_i64().unwrap();
        let err = r.has_next().unwrap_err();
        assert!(matches!(err, Error::Incomplete { .. }));
    }

    #[test]
    fn test_escapes_and_surrogates() {
        let mut r = JsonReader::new(r#""a\nbé😀""#);
        r.next().unwrap();
        assert_eq!(r.value_as_string().unwrap(), "a\nb\u{e9}\u{1F600}");
    }

    #[test]
    fn test_skip_value_balances_containers() {
        let mut r = JsonReader::new(r#"{"a": {"deep": [1, {"x": "]"}]}, "b": 2}"#);
        r.next().unwrap();
        r.begin_object().unwrap();
        r.next().unwrap();
        assert_eq!(r.name().unwrap(), "a");
        r.skip_value().unwrap();
        r.next().unwrap();
        assert_eq!(r.name().unwrap(), "b");
        assert_eq!(r.value_as_i64().unwrap(), 2);
        r.end_object().unwrap();
    }

    #[test]
    fn test_metadata_then_begin_object() {
        let mut r = JsonReader::new(r#"{"@class": "circle", "@v": "2", "radius": 4}"#);
        r.next().unwrap();
        assert_eq!(r.metadata("class").unwrap(), Some("circle"));
        assert_eq!(r.metadata("v").unwrap(), Some("2"));
        assert_eq!(r.metadata("missing").unwrap(), None);
        r.begin_object().unwrap();
        // The ordinary member is not re-read and not lost.
        r.next().unwrap();
        assert_eq!(r.name().unwrap(), "radius");
        assert_eq!(r.value_as_i64().unwrap(), 4);
        r.end_object().unwrap();
    }

    #[test]
    fn test_metadata_on_metadata_only_object() {
        let mut r = JsonReader::new(r#"{"@class": "circle"}"#);
        r.next().unwrap();
        assert_eq!(r.metadata("class").unwrap(), Some("circle"));
        r.begin_object().unwrap();
        assert!(!r.has_next().unwrap());
        r.end_object().unwrap();
    }

    #[test]
    fn test_line_and_column_in_errors() {
        let mut r = JsonReader::new("{\n  \"a\": @\n}");
        r.next().unwrap();
        r.begin_object().unwrap();
        match r.next().unwrap_err() {
            Error::Syntax { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_concatenated_documents() {
        let mut r = JsonReader::new("1 2");
        r.next().unwrap();
        assert_eq!(r.value_as_i64().unwrap(), 1);
        assert!(r.has_next().unwrap());
        r.next().unwrap();
        assert_eq!(r.value_as_i64().unwrap(), 2);
        assert_eq!(r.next().unwrap(), TokenKind::Eof);
    }

    #[test]
    fn test_string_number_coercions() {
        let mut r = JsonReader::new(r#""17""#);
        r.next().unwrap();
        assert_eq!(r.value_as_i64().unwrap(), 17);

        let mut r = JsonReader::new("17");
        r.next().unwrap();
        assert_eq!(r.value_as_string().unwrap(), "17");

        let mut r = JsonReader::new(r#""abc""#);
        r.next().unwrap();
        assert!(matches!(
            r.value_as_i64().unwrap_err(),
            Error::Coercion { .. }
        ));
    }

    #[test]
    fn test_encoding_detection() {
        assert_eq!(decode_document(b"").unwrap(), "");
        assert_eq!(decode_document(b"\xEF\xBB\xBF").unwrap(), "");
        assert_eq!(decode_document(b"\xEF\xBB\xBF[1]").unwrap(), "[1]");
        // UTF-16 with and without BOM
        assert_eq!(decode_document(b"\xFF\xFE1\x000\x00").unwrap(), "10");
        assert_eq!(decode_document(b"\x001\x000").unwrap(), "10");
        // UTF-32
        assert_eq!(
            decode_document(b"\x00\x00\x00\x31\x00\x00\x00\x30").unwrap(),
            "10"
        );
        assert_eq!(
            decode_document(b"\x31\x00\x00\x00\x30\x00\x00\x00").unwrap(),
            "10"
        );
    }

    #[test]
    fn test_leading_zero_rejected() {
        let mut r = JsonReader::new("01");
        assert!(r.next().is_err());
    }
}
