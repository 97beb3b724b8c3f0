//! Shared token and container-state definitions for the streaming protocol.
//!
//! The reader and writer each hold a stack of [`Scope`] frames describing the
//! containers currently open. Every `begin_array`/`begin_object` pushes
//! exactly one frame; every `end_array`/`end_object` pops one and must match
//! the frame kind, otherwise the stream is malformed.

/// The kind of the value a [`JsonReader`](crate::JsonReader) is currently
/// positioned on, as reported by `next()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// `null`
    Null,
    /// `true` or `false`
    Boolean,
    /// An integer literal (no fraction, no exponent)
    Integer,
    /// A floating-point literal
    Float,
    /// A string literal
    String,
    /// `[` — enter with `begin_array`
    BeginArray,
    /// `{` — enter with `begin_object`
    BeginObject,
    /// Clean end of the document ("no data")
    Eof,
}

impl TokenKind {
    /// Human-readable description used in error messages.
    pub(crate) fn describe(self) -> &'static str {
        match self {
            TokenKind::Null => "null",
            TokenKind::Boolean => "boolean",
            TokenKind::Integer => "integer",
            TokenKind::Float => "float",
            TokenKind::String => "string",
            TokenKind::BeginArray => "array",
            TokenKind::BeginObject => "object",
            TokenKind::Eof => "end of input",
        }
    }
}

/// One frame of the container stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Scope {
    /// Top level, before or after the root value
    Empty,
    /// Inside `[ ... ]`
    Array,
    /// Inside `{ ... }`, past the metadata head
    Object,
    /// Inside `{ ... }` entered through the metadata-read path; the next
    /// `begin_object` switches to `Object` without consuming input
    ObjectMetadata,
}
