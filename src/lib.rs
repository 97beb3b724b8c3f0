//! # jsonbind
//!
//! A JSON data-binding engine: a streaming token-level reader/writer pair
//! underneath a cached type-to-converter resolution layer.
//!
//! ## What is data binding?
//!
//! Instead of one monolithic (de)serializer, the crate resolves a
//! [`Converter`] per declared type through a chain of factories, caches it,
//! and drives it over a streaming token protocol. That split is what makes
//! the interesting features cheap: polymorphism via an `@class` metadata
//! member, per-property converter overrides, view overlays that reshape a
//! type without touching it, and safe resolution of self-referential types.
//!
//! ## Key Features
//!
//! - **Streaming core**: pull reader and push writer with full structural
//!   checking, precise line/column errors and Unicode encoding detection
//! - **Cached resolution**: one converter per type per engine lifetime,
//!   with a construction guard so recursive types terminate
//! - **Polymorphism**: `@class` metadata written ahead of ordinary members
//!   and honored on read, with registerable aliases
//! - **Per-property overrides**: contextual factories keyed on
//!   declaration-site attributes (custom date formats ship built in)
//! - **Views**: alternate models per type, switched by one engine option
//! - **No unsafe code**: written entirely in safe Rust
//!
//! ## Quick Start
//!
//! ```rust
//! use jsonbind::{bind_class, Engine};
//!
//! #[derive(Clone, Default, PartialEq, Debug)]
//! struct User {
//!     id: i64,
//!     name: String,
//!     active: bool,
//! }
//!
//! bind_class!(User {
//!     id: i64,
//!     name: String,
//!     active: bool,
//! });
//!
//! let engine = Engine::builder().register::<User>().build();
//!
//! let user = User { id: 123, name: "Alice".to_string(), active: true };
//! let json = engine.to_string(&user).unwrap();
//! assert_eq!(json, r#"{"id":123,"name":"Alice","active":true}"#);
//!
//! let back: User = engine.from_str(&json).unwrap();
//! assert_eq!(back, user);
//! ```
//!
//! ### Untyped values
//!
//! Types the engine already knows (scalars, `Vec`, string-keyed maps,
//! [`Dynamic`]) need no registration; the free functions use a shared
//! default engine:
//!
//! ```rust
//! use jsonbind::{from_str, to_string, Dynamic};
//!
//! let numbers: Vec<i64> = from_str("[1,2,3]").unwrap();
//! assert_eq!(to_string(&numbers).unwrap(), "[1,2,3]");
//!
//! let anything: Dynamic = from_str(r#"{"a":1,"b":[true,null]}"#).unwrap();
//! assert!(!anything.is_null());
//! ```
//!
//! ### Polymorphism
//!
//! ```rust
//! use jsonbind::{bind_class, ClassModel, Engine, EngineOptions};
//!
//! #[derive(Clone, Copy, Default)]
//! struct Shape;
//!
//! #[derive(Clone, Default, PartialEq, Debug)]
//! struct Circle {
//!     radius: f64,
//! }
//!
//! bind_class!(Circle extends Shape { radius: f64 });
//!
//! let engine = Engine::builder()
//!     .register_model(ClassModel::abstract_class::<Shape>())
//!     .register::<Circle>()
//!     .alias::<Circle>("circle")
//!     .with_options(EngineOptions::default().with_class_metadata(true))
//!     .build();
//!
//! let json = engine.to_string(&Circle { radius: 2.0 }).unwrap();
//! assert_eq!(json, r#"{"@class":"circle","radius":2.0}"#);
//! ```
//!
//! ## Streaming layer
//!
//! The token protocol is usable on its own; see [`JsonReader`] and
//! [`JsonWriter`].
//!
//! ## Safety Guarantees
//!
//! - No `unsafe` code blocks
//! - Proper error propagation with `Result` types
//! - Precise line/column information on parse errors

pub mod context;
pub mod convert;
pub mod dynamic;
pub mod engine;
pub mod error;
pub mod factory;
pub mod macros;
pub mod model;
pub mod options;
pub mod read;
pub mod token;
pub mod ty;
pub mod write;

pub use context::{
    ContextualFactory, DateFormatFactory, ResolutionContext, ATTR_DATE_FORMAT, ATTR_DATE_UNIT,
};
pub use convert::{Converter, NullConverter};
pub use dynamic::{Bind, Dynamic, Null, ObjectMap, Sequence};
pub use engine::{Engine, EngineBuilder, ResolveCtx};
pub use error::{Error, Result};
pub use factory::{ClassFactory, Factory, MapFactory, ScalarFactory, SeqFactory};
pub use model::{ClassBinding, ClassModel, FieldAttrs, FieldModel, Introspector};
pub use options::EngineOptions;
pub use read::{decode_document, JsonNumber, JsonReader, DEFAULT_METADATA_PREFIX};
pub use token::TokenKind;
pub use ty::{ClassId, TypeHierarchy, TypeRef};
pub use write::JsonWriter;

use std::io;
use std::sync::OnceLock;

fn default_engine() -> &'static Engine {
    static ENGINE: OnceLock<Engine> = OnceLock::new();
    ENGINE.get_or_init(Engine::default)
}

/// Serialize any `T: Bind` to a JSON string using a shared default engine.
///
/// Registered application types need their own [`Engine`]; this covers the
/// built-in types (scalars, sequences, maps, [`Dynamic`]).
///
/// # Examples
///
/// ```rust
/// use jsonbind::to_string;
///
/// assert_eq!(to_string(&vec![1i64, 2, 3]).unwrap(), "[1,2,3]");
/// ```
///
/// # Errors
///
/// Returns an error if no converter exists for `T` or a value cannot be
/// written (e.g. a non-finite float).
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_string<T: Bind>(value: &T) -> Result<String> {
    default_engine().to_string(value)
}

/// Serialize any `T: Bind` to a writer using a shared default engine.
///
/// # Errors
///
/// Returns an error if serialization fails or writing to the sink fails.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_writer<T: Bind>(sink: &mut dyn io::Write, value: &T) -> Result<()> {
    default_engine().to_writer(value, sink)
}

/// Deserialize an instance of type `T` from a string of JSON text using a
/// shared default engine.
///
/// # Examples
///
/// ```rust
/// use jsonbind::from_str;
///
/// let numbers: Vec<i64> = from_str("[1,2,3]").unwrap();
/// assert_eq!(numbers, vec![1, 2, 3]);
/// ```
///
/// # Errors
///
/// Returns an error if the input is not valid JSON or cannot be bound to
/// type `T`. Parse errors include line and column information.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_str<T: Bind>(json: &str) -> Result<T> {
    default_engine().from_str(json)
}

/// Deserialize an instance of type `T` from bytes of JSON text, detecting
/// the document's Unicode encoding first.
///
/// # Examples
///
/// ```rust
/// use jsonbind::from_slice;
///
/// let n: i64 = from_slice(b"42").unwrap();
/// assert_eq!(n, 42);
/// ```
///
/// # Errors
///
/// Returns an error if the bytes are not valid text in a detectable
/// encoding, not valid JSON, or cannot be bound to type `T`.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_slice<T: Bind>(bytes: &[u8]) -> Result<T> {
    default_engine().from_slice(bytes)
}

/// Deserialize an instance of type `T` from an I/O stream of JSON.
///
/// # Errors
///
/// Returns an error if reading fails, the input is not valid JSON, or the
/// data cannot be bound to type `T`.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_reader<T: Bind>(source: &mut dyn io::Read) -> Result<T> {
    default_engine().from_reader(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn test_scalar_round_trips() {
        assert_eq!(to_string(&42i64).unwrap(), "42");
        assert_eq!(from_str::<i64>("42").unwrap(), 42);
        assert_eq!(to_string(&true).unwrap(), "true");
        assert_eq!(to_string(&"hi".to_string()).unwrap(), "\"hi\"");
        assert_eq!(from_str::<f64>("2.5").unwrap(), 2.5);
    }

    #[test]
    fn test_container_round_trips() {
        let numbers = vec![1i64, 2, 3];
        let json = to_string(&numbers).unwrap();
        assert_eq!(json, "[1,2,3]");
        assert_eq!(from_str::<Vec<i64>>(&json).unwrap(), numbers);

        let mut map = IndexMap::new();
        map.insert("a".to_string(), 1i64);
        map.insert("b".to_string(), 2i64);
        let json = to_string(&map).unwrap();
        assert_eq!(json, r#"{"a":1,"b":2}"#);
        assert_eq!(from_str::<IndexMap<String, i64>>(&json).unwrap(), map);
    }

    #[test]
    fn test_dynamic_preserves_document_shape() {
        let json = r#"{"a":1,"b":[1,2,3]}"#;
        let value: Dynamic = from_str(json).unwrap();
        let back = to_string(&value).unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn test_optional_binding() {
        assert_eq!(from_str::<Option<i64>>("null").unwrap(), None);
        assert_eq!(from_str::<Option<i64>>("5").unwrap(), Some(5));
        assert_eq!(to_string(&None::<i64>).unwrap(), "null");
    }

    #[test]
    fn test_from_slice_detects_encoding() {
        // "42" as UTF-16LE without a BOM.
        let utf16le = [b'4', 0, b'2', 0];
        assert_eq!(from_slice::<i64>(&utf16le).unwrap(), 42);
    }

    #[test]
    fn test_from_reader() {
        let mut source = std::io::Cursor::new(b"[1,2]".to_vec());
        let numbers: Vec<i64> = from_reader(&mut source).unwrap();
        assert_eq!(numbers, vec![1, 2]);
    }
}
