//! Streaming JSON writing.
//!
//! This module provides the push-side of the token protocol: [`JsonWriter`]
//! emits a JSON document through mirrored `begin`/`end`/`name`/`value`
//! calls, checking container structure on every call. It is the only place
//! in the crate that produces raw characters on the output side.
//!
//! ## Overview
//!
//! - **Buffered output**: characters accumulate in an internal buffer that
//!   is flushed to the sink when it would overflow and on
//!   [`finish`](JsonWriter::finish)
//! - **Structural checking**: writing a value without a pending name inside
//!   an object, a name inside an array, a mismatched end call, or a second
//!   root value raises a structural error
//! - **Pending metadata**: [`begin_next_object_metadata`](JsonWriter::begin_next_object_metadata)
//!   lets several collaborating converters contribute metadata pairs before
//!   any of them begins the object; the first `begin_object` flushes them as
//!   the object's first, prefix-marked members
//! - **Escaping modes**: standard JSON escaping, plus an HTML-safe mode
//!   (`< > & = '` escaped as `\uXXXX`) and a null-skipping mode (a pending
//!   name followed by a null writes nothing at all)
//!
//! ## Usage
//!
//! ```rust
//! use jsonbind::JsonWriter;
//!
//! let mut out = Vec::new();
//! let mut writer = JsonWriter::new(&mut out);
//! writer.begin_object().unwrap();
//! writer.name("a").unwrap();
//! writer.begin_array().unwrap();
//! writer.int_value(1).unwrap();
//! writer.bool_value(true).unwrap();
//! writer.end_array().unwrap();
//! writer.end_object().unwrap();
//! writer.finish().unwrap();
//! assert_eq!(out, br#"{"a":[1,true]}"#);
//! ```

use crate::read::DEFAULT_METADATA_PREFIX;
use crate::token::Scope;
use crate::{Error, Result};
use num_bigint::BigInt;
use std::io;

/// Buffer size above which output is flushed to the sink.
const FLUSH_THRESHOLD: usize = 1024;

struct Frame {
    scope: Scope,
    count: usize,
    /// How many of `count` are reserved metadata members.
    metadata_count: usize,
}

/// The streaming JSON push writer.
///
/// A writer is confined to one logical call stack for the duration of one
/// document; it carries mutable buffer and container-stack state and is not
/// thread-safe. After a structural error it must not be reused.
pub struct JsonWriter<'a> {
    sink: &'a mut dyn io::Write,
    buf: String,
    stack: Vec<Frame>,
    pending_name: Option<String>,
    /// `Some` while collecting metadata for the next `begin_object`
    pending_metadata: Option<Vec<(String, String)>>,
    root_written: bool,
    html_safe: bool,
    skip_null: bool,
    metadata_prefix: char,
}

impl<'a> JsonWriter<'a> {
    /// Creates a writer over the given byte sink.
    pub fn new(sink: &'a mut dyn io::Write) -> Self {
        JsonWriter {
            sink,
            buf: String::with_capacity(256),
            stack: vec![Frame {
                scope: Scope::Empty,
                count: 0,
                metadata_count: 0,
            }],
            pending_name: None,
            pending_metadata: None,
            root_written: false,
            html_safe: false,
            skip_null: false,
            metadata_prefix: DEFAULT_METADATA_PREFIX,
        }
    }

    /// Enables HTML-safe string escaping (`< > & = '` become `\uXXXX`).
    #[must_use]
    pub fn with_html_safe(mut self, enabled: bool) -> Self {
        self.html_safe = enabled;
        self
    }

    /// Enables null skipping: a pending member name followed by a null
    /// value writes neither.
    #[must_use]
    pub fn with_skip_null(mut self, enabled: bool) -> Self {
        self.skip_null = enabled;
        self
    }

    /// Sets the reserved-property prefix used for metadata members.
    #[must_use]
    pub fn with_metadata_prefix(mut self, prefix: char) -> Self {
        self.metadata_prefix = prefix;
        self
    }

    fn top(&self) -> &Frame {
        self.stack.last().expect("scope stack never empties")
    }

    fn maybe_flush(&mut self) -> Result<()> {
        if self.buf.len() >= FLUSH_THRESHOLD {
            self.sink.write_all(self.buf.as_bytes())?;
            self.buf.clear();
        }
        Ok(())
    }

    /// Writes the separator/name lead-in for the next value in the current
    /// scope, enforcing the structural contract.
    fn before_value(&mut self) -> Result<()> {
        match self.top().scope {
            Scope::Empty => {
                if self.pending_name.is_some() {
                    return Err(Error::structure("member name written outside an object"));
                }
                if self.root_written {
                    return Err(Error::structure("a second root value was written"));
                }
                self.root_written = true;
            }
            Scope::Array => {
                if self.pending_name.is_some() {
                    return Err(Error::structure("member name written inside an array"));
                }
                if self.top().count > 0 {
                    self.buf.push(',');
                }
            }
            Scope::Object | Scope::ObjectMetadata => {
                let name = self
                    .pending_name
                    .take()
                    .ok_or_else(|| Error::structure("value written without a member name"))?;
                if self.top().count > 0 {
                    self.buf.push(',');
                }
                self.push_string(&name);
                self.buf.push(':');
            }
        }
        self.stack.last_mut().expect("scope stack never empties").count += 1;
        self.maybe_flush()
    }

    /// Queues the name of the next object member.
    pub fn name(&mut self, name: &str) -> Result<()> {
        if !matches!(self.top().scope, Scope::Object | Scope::ObjectMetadata) {
            return Err(Error::structure("member name written outside an object"));
        }
        if self.pending_name.is_some() {
            return Err(Error::structure("two member names written in a row"));
        }
        self.pending_name = Some(name.to_string());
        Ok(())
    }

    /// Opens an array value.
    pub fn begin_array(&mut self) -> Result<()> {
        self.before_value()?;
        self.buf.push('[');
        self.stack.push(Frame {
            scope: Scope::Array,
            count: 0,
            metadata_count: 0,
        });
        Ok(())
    }

    /// Closes the current array. Fails if the current open frame is not an
    /// array.
    pub fn end_array(&mut self) -> Result<()> {
        if self.top().scope != Scope::Array {
            return Err(Error::structure(
                "end_array called but the current scope is not an array",
            ));
        }
        self.stack.pop();
        self.buf.push(']');
        self.maybe_flush()
    }

    /// Opens an object value, flushing any pending metadata pairs as the
    /// object's first members.
    pub fn begin_object(&mut self) -> Result<()> {
        self.before_value()?;
        self.buf.push('{');
        self.stack.push(Frame {
            scope: Scope::Object,
            count: 0,
            metadata_count: 0,
        });
        if let Some(pairs) = self.pending_metadata.take() {
            // Nested converters may each queue the same key; the first
            // (outermost) contribution wins.
            let mut written: Vec<&str> = Vec::with_capacity(pairs.len());
            for (key, value) in &pairs {
                if written.contains(&key.as_str()) {
                    continue;
                }
                written.push(key);
                self.write_metadata_member(key, value)?;
            }
        }
        Ok(())
    }

    /// Closes the current object. Fails if the current open frame is not an
    /// object or a member name is pending.
    pub fn end_object(&mut self) -> Result<()> {
        if !matches!(self.top().scope, Scope::Object | Scope::ObjectMetadata) {
            return Err(Error::structure(
                "end_object called but the current scope is not an object",
            ));
        }
        if self.pending_name.is_some() {
            return Err(Error::structure("end_object called with a dangling name"));
        }
        self.stack.pop();
        self.buf.push('}');
        self.maybe_flush()
    }

    /// Starts collecting metadata for the next object.
    ///
    /// Until the next [`begin_object`](Self::begin_object), calls to
    /// [`metadata`](Self::metadata) are queued instead of written, so
    /// several collaborating converters can each contribute pairs to the
    /// same object head without knowing about each other.
    pub fn begin_next_object_metadata(&mut self) {
        if self.pending_metadata.is_none() {
            self.pending_metadata = Some(Vec::new());
        }
    }

    /// Writes a reserved metadata member (`key` given without the prefix).
    ///
    /// In pending mode the pair is queued for the next `begin_object`;
    /// otherwise it must be called right after `begin_object`, before any
    /// ordinary member.
    pub fn metadata(&mut self, key: &str, value: &str) -> Result<()> {
        if let Some(pairs) = self.pending_metadata.as_mut() {
            pairs.push((key.to_string(), value.to_string()));
            return Ok(());
        }
        if !matches!(self.top().scope, Scope::Object | Scope::ObjectMetadata) {
            return Err(Error::structure("metadata written outside an object"));
        }
        self.write_metadata_member(key, value)
    }

    fn write_metadata_member(&mut self, key: &str, value: &str) -> Result<()> {
        // Earlier metadata members count too, so compare against the
        // frame's metadata tally rather than zero.
        if self.pending_name.is_some() || self.top().count > self.top().metadata_count {
            return Err(Error::structure(
                "metadata must be written before ordinary members",
            ));
        }
        let name = format!("{}{}", self.metadata_prefix, key);
        self.name(&name)?;
        self.string_value(value)?;
        self.stack
            .last_mut()
            .expect("scope stack never empties")
            .metadata_count += 1;
        Ok(())
    }

    /// Writes a string value.
    pub fn string_value(&mut self, value: &str) -> Result<()> {
        self.before_value()?;
        self.push_string(value);
        self.maybe_flush()
    }

    /// Writes an integer value.
    pub fn int_value(&mut self, value: i64) -> Result<()> {
        self.before_value()?;
        self.buf.push_str(&value.to_string());
        self.maybe_flush()
    }

    /// Writes an arbitrary-precision integer value.
    pub fn big_int_value(&mut self, value: &BigInt) -> Result<()> {
        self.before_value()?;
        self.buf.push_str(&value.to_string());
        self.maybe_flush()
    }

    /// Writes a floating-point value. Non-finite values are not valid JSON
    /// and raise a structural error.
    pub fn float_value(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(Error::structure(
                "non-finite float values cannot be written as JSON",
            ));
        }
        self.before_value()?;
        // `Display` never uses exponent form; extreme magnitudes would
        // expand to hundreds of digits that lossy parsers reparse with
        // rounding error.
        let abs = value.abs();
        let mut text = if abs != 0.0 && !(1e-5..1e17).contains(&abs) {
            format!("{value:e}")
        } else {
            value.to_string()
        };
        if !text.contains('.') && !text.contains('e') && !text.contains('E') {
            text.push_str(".0");
        }
        self.buf.push_str(&text);
        self.maybe_flush()
    }

    /// Writes a boolean value.
    pub fn bool_value(&mut self, value: bool) -> Result<()> {
        self.before_value()?;
        self.buf.push_str(if value { "true" } else { "false" });
        self.maybe_flush()
    }

    /// Writes a `null` value.
    ///
    /// With null skipping enabled and a member name pending, both the name
    /// and the value are omitted entirely.
    pub fn null_value(&mut self) -> Result<()> {
        if self.skip_null
            && matches!(self.top().scope, Scope::Object | Scope::ObjectMetadata)
            && self.pending_name.is_some()
        {
            self.pending_name = None;
            return Ok(());
        }
        self.before_value()?;
        self.buf.push_str("null");
        self.maybe_flush()
    }

    /// Completes the document: verifies all containers are closed and a
    /// root value was written, then flushes the buffer and the sink.
    pub fn finish(&mut self) -> Result<()> {
        if self.stack.len() > 1 {
            return Err(Error::structure("finish called with open containers"));
        }
        if !self.root_written {
            return Err(Error::structure("finish called before any value"));
        }
        self.flush()
    }

    /// Flushes the internal buffer and the sink.
    pub fn flush(&mut self) -> Result<()> {
        if !self.buf.is_empty() {
            self.sink.write_all(self.buf.as_bytes())?;
            self.buf.clear();
        }
        self.sink.flush()?;
        Ok(())
    }

    fn push_string(&mut self, s: &str) {
        self.buf.push('"');
        for ch in s.chars() {
            match ch {
                '"' => self.buf.push_str("\\\""),
                '\\' => self.buf.push_str("\\\\"),
                '\n' => self.buf.push_str("\\n"),
                '\r' => self.buf.push_str("\\r"),
                '\t' => self.buf.push_str("\\t"),
                '\u{0008}' => self.buf.push_str("\\b"),
                '\u{000C}' => self.buf.push_str("\\f"),
                '<' | '>' | '&' | '=' | '\'' if self.html_safe => {
                    self.buf.push_str(&format!("\\u{:04x}", ch as u32));
                }
                ch if (ch as u32) < 0x20 => {
                    self.buf.push_str(&format!("\\u{:04x}", ch as u32));
                }
                ch => self.buf.push(ch),
            }
        }
        self.buf.push('"');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(write: impl FnOnce(&mut JsonWriter<'_>) -> Result<()>) -> String {
        let mut out = Vec::new();
        let mut writer = JsonWriter::new(&mut out);
        write(&mut writer).unwrap();
        writer.finish().unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_nested_document() {
        let json = capture(|w| {
            w.begin_object()?;
            w.name("a")?;
            w.int_value(1)?;
            w.name("b")?;
            w.begin_array()?;
            w.int_value(1)?;
            w.int_value(2)?;
            w.int_value(3)?;
            w.end_array()?;
            w.end_object()
        });
        assert_eq!(json, r#"{"a":1,"b":[1,2,3]}"#);
    }

    #[test]
    fn test_value_without_name_is_structural_error() {
        let mut out = Vec::new();
        let mut w = JsonWriter::new(&mut out);
        w.begin_object().unwrap();
        assert!(matches!(
            w.int_value(1).unwrap_err(),
            Error::Structure(_)
        ));
    }

    #[test]
    fn test_name_inside_array_is_structural_error() {
        let mut out = Vec::new();
        let mut w = JsonWriter::new(&mut out);
        w.begin_array().unwrap();
        assert!(matches!(w.name("a").unwrap_err(), Error::Structure(_)));
    }

    #[test]
    fn test_mismatched_end() {
        let mut out = Vec::new();
        let mut w = JsonWriter::new(&mut out);
        w.begin_array().unwrap();
        assert!(matches!(w.end_object().unwrap_err(), Error::Structure(_)));
    }

    #[test]
    fn test_finish_with_open_container() {
        let mut out = Vec::new();
        let mut w = JsonWriter::new(&mut out);
        w.begin_array().unwrap();
        assert!(matches!(w.finish().unwrap_err(), Error::Structure(_)));
    }

    #[test]
    fn test_pending_metadata_ordering() {
        let json = capture(|w| {
            w.begin_next_object_metadata();
            w.metadata("class", "circle")?;
            w.metadata("v", "2")?;
            w.begin_object()?;
            w.name("radius")?;
            w.int_value(4)?;
            w.end_object()
        });
        assert_eq!(json, r#"{"@class":"circle","@v":"2","radius":4}"#);
    }

    #[test]
    fn test_pending_metadata_first_contribution_wins() {
        let json = capture(|w| {
            w.begin_next_object_metadata();
            w.metadata("class", "circle")?;
            w.metadata("class", "shape")?;
            w.begin_object()?;
            w.end_object()
        });
        assert_eq!(json, r#"{"@class":"circle"}"#);
    }

    #[test]
    fn test_metadata_members_after_begin_object() {
        let json = capture(|w| {
            w.begin_object()?;
            w.metadata("class", "circle")?;
            w.metadata("v", "2")?;
            w.name("radius")?;
            w.int_value(4)?;
            w.end_object()
        });
        assert_eq!(json, r#"{"@class":"circle","@v":"2","radius":4}"#);
    }

    #[test]
    fn test_metadata_after_ordinary_member_rejected() {
        let mut out = Vec::new();
        let mut w = JsonWriter::new(&mut out);
        w.begin_object().unwrap();
        w.name("a").unwrap();
        w.int_value(1).unwrap();
        assert!(matches!(
            w.metadata("class", "x").unwrap_err(),
            Error::Structure(_)
        ));
    }

    #[test]
    fn test_skip_null_omits_member() {
        let mut out = Vec::new();
        let mut w = JsonWriter::new(&mut out).with_skip_null(true);
        w.begin_object().unwrap();
        w.name("a").unwrap();
        w.null_value().unwrap();
        w.name("b").unwrap();
        w.int_value(2).unwrap();
        w.end_object().unwrap();
        w.finish().unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), r#"{"b":2}"#);
    }

    #[test]
    fn test_html_safe_escaping() {
        let mut out = Vec::new();
        let mut w = JsonWriter::new(&mut out).with_html_safe(true);
        w.string_value("<a href='x'>&=</a>").unwrap();
        w.finish().unwrap();
        let json = String::from_utf8(out).unwrap();
        assert!(!json.contains('<'));
        assert!(!json.contains('&'));
        assert!(json.contains("\\u003c"));
    }

    #[test]
    fn test_float_formatting() {
        let json = capture(|w| w.float_value(2.0));
        assert_eq!(json, "2.0");
        let mut out = Vec::new();
        let mut w = JsonWriter::new(&mut out);
        assert!(w.float_value(f64::NAN).is_err());
    }

    #[test]
    fn test_extreme_float_magnitudes_use_exponent_form() {
        let json = capture(|w| w.float_value(1.7314922164549756e-193));
        assert_eq!(json, "1.7314922164549756e-193");
        let json = capture(|w| w.float_value(1e30));
        assert_eq!(json, "1e30");
        let json = capture(|w| w.float_value(0.0));
        assert_eq!(json, "0.0");
        let json = capture(|w| w.float_value(-2.5e-6));
        assert_eq!(json, "-2.5e-6");
    }

    #[test]
    fn test_large_document_is_flushed_incrementally() {
        let mut out = Vec::new();
        {
            let mut w = JsonWriter::new(&mut out);
            w.begin_array().unwrap();
            for i in 0..1000 {
                w.int_value(i).unwrap();
            }
            w.end_array().unwrap();
            w.finish().unwrap();
        }
        let json = String::from_utf8(out).unwrap();
        assert!(json.starts_with("[0,1,"));
        assert!(json.ends_with(",999]"));
    }
}
