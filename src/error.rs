//! Error types for JSON data binding.
//!
//! This module defines one crate-wide [`Error`] enum covering the four error
//! families the engine can produce:
//!
//! - **Stream syntax errors**: malformed token sequences or premature end of
//!   input, with line/column information. Fatal to the current reader/writer.
//! - **Coercion errors**: a scalar could not be converted to the requested
//!   primitive type (e.g. `"abc"` read as a number).
//! - **Resolution errors**: no converter could be produced for a requested
//!   type, or a type alias is unknown. These indicate configuration gaps and
//!   are discoverable without any data.
//! - **Binding errors**: an object property with no matching target property
//!   in strict mode, or a value that cannot populate its target slot.
//!
//! None of these are retried internally. A reader or writer that raised a
//! syntax error is left in an unspecified state and must not be reused.
//!
//! ## Examples
//!
//! ```rust
//! use jsonbind::{from_str, Error};
//!
//! let result: Result<i64, Error> = from_str("[1,");
//! assert!(result.is_err());
//! ```

use std::fmt;
use thiserror::Error;

/// Represents all possible errors that can occur during JSON binding.
///
/// Parsing errors carry the line and column of the offending token.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// IO error during reading or writing
    #[error("IO error: {0}")]
    Io(String),

    /// Malformed token sequence in the input stream
    #[error("Syntax error at line {line}, column {col}: {msg}")]
    Syntax { line: usize, col: usize, msg: String },

    /// End of input while a container was still open
    #[error("Incomplete document at line {line}, column {col}: expected {expected}")]
    Incomplete {
        line: usize,
        col: usize,
        expected: String,
    },

    /// Structural misuse of the writer (value without a name inside an
    /// object, mismatched end call, second root value)
    #[error("Invalid write: {0}")]
    Structure(String),

    /// A scalar value could not be coerced to the requested type
    #[error("Cannot convert {found} to {expected} at line {line}, column {col}")]
    Coercion {
        line: usize,
        col: usize,
        expected: String,
        found: String,
    },

    /// No converter could be resolved for the requested type
    #[error("No converter available for type {0}")]
    NoConverter(String),

    /// A type-metadata alias did not name any registered type
    #[error("Unknown type alias '{0}'")]
    UnknownAlias(String),

    /// An object property had no matching target property (strict mode)
    #[error("Unexpected property '{name}' for type {ty}")]
    UnexpectedProperty { name: String, ty: String },

    /// A dynamic value could not populate its statically typed target
    #[error("Cannot bind {found} into {expected}")]
    Bind { expected: String, found: String },

    /// Custom error
    #[error("Error: {0}")]
    Custom(String),
}

impl Error {
    /// Creates a stream syntax error with line and column information.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use jsonbind::Error;
    ///
    /// let err = Error::syntax(10, 5, "unexpected token");
    /// assert!(err.to_string().contains("line 10"));
    /// ```
    pub fn syntax(line: usize, col: usize, msg: impl Into<String>) -> Self {
        Error::Syntax {
            line,
            col,
            msg: msg.into(),
        }
    }

    /// Creates an incomplete-document error (end of input inside an open
    /// container, or a missing root value).
    pub fn incomplete(line: usize, col: usize, expected: impl Into<String>) -> Self {
        Error::Incomplete {
            line,
            col,
            expected: expected.into(),
        }
    }

    /// Creates a writer structural-misuse error.
    pub fn structure(msg: impl Into<String>) -> Self {
        Error::Structure(msg.into())
    }

    /// Creates a coercion error for a scalar that cannot become the
    /// requested type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use jsonbind::Error;
    ///
    /// let err = Error::coercion(5, 10, "number", "string \"abc\"");
    /// assert!(err.to_string().contains("number"));
    /// ```
    pub fn coercion(line: usize, col: usize, expected: &str, found: &str) -> Self {
        Error::Coercion {
            line,
            col,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Creates a resolution error naming the type no converter exists for.
    pub fn no_converter(ty: impl fmt::Display) -> Self {
        Error::NoConverter(ty.to_string())
    }

    /// Creates a resolution error for a type-metadata alias that names no
    /// registered type.
    pub fn unknown_alias(alias: &str) -> Self {
        Error::UnknownAlias(alias.to_string())
    }

    /// Creates an unexpected-property error (strict mode only).
    pub fn unexpected_property(name: &str, ty: impl fmt::Display) -> Self {
        Error::UnexpectedProperty {
            name: name.to_string(),
            ty: ty.to_string(),
        }
    }

    /// Creates a binding error for a dynamic value that cannot populate the
    /// requested static type.
    pub fn bind(expected: &str, found: &str) -> Self {
        Error::Bind {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Creates a custom error with a display message.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use jsonbind::Error;
    ///
    /// let err = Error::custom("something went wrong");
    /// assert!(err.to_string().contains("something went wrong"));
    /// ```
    pub fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }

    /// Creates an I/O error for read/write failures on the character
    /// source or sink.
    pub fn io(msg: &str) -> Self {
        Error::Io(msg.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
