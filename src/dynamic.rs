//! Dynamic values and the static-type bridge.
//!
//! Converters operate on [`Dynamic`], a clonable type-erased value carrying
//! its own runtime type tag. The [`Bind`] trait bridges concrete Rust types
//! in and out of that representation and names their [`TypeRef`], which is
//! what application code hands to the engine.
//!
//! ## Core Types
//!
//! - [`Dynamic`]: a clonable box over any value, with `null` as an explicit
//!   marker ([`Null`]) rather than an `Option` at the converter boundary
//! - [`Sequence`] / [`ObjectMap`]: the element-erased container shapes the
//!   built-in converters produce and consume
//! - [`Bind`]: `TypeRef` + `to_dynamic`/`from_dynamic` for a concrete type
//!
//! ## Examples
//!
//! ```rust
//! use jsonbind::{Bind, Dynamic, TypeRef};
//!
//! let value = 42i64.to_dynamic();
//! assert_eq!(i64::from_dynamic(value).unwrap(), 42);
//!
//! assert_eq!(Vec::<String>::type_ref(), TypeRef::seq(TypeRef::Str));
//! assert!(Dynamic::null().is_null());
//! ```

use crate::{Error, Result, TypeRef};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use num_bigint::BigInt;
use std::any::{type_name, Any, TypeId};
use std::fmt;

/// Object-safe clone-plus-`Any` bound backing [`Dynamic`].
trait AnyValue: Any {
    fn clone_boxed(&self) -> Box<dyn AnyValue>;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn value_type_name(&self) -> &'static str;
}

impl<T: Any + Clone> AnyValue for T {
    fn clone_boxed(&self) -> Box<dyn AnyValue> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn value_type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// Explicit null marker carried inside a [`Dynamic`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Null;

/// Element-erased sequence value.
#[derive(Clone, Default)]
pub struct Sequence(pub Vec<Dynamic>);

/// Element-erased string-keyed object value. Uses an ordered map so member
/// order survives a round trip.
#[derive(Clone, Default)]
pub struct ObjectMap(pub IndexMap<String, Dynamic>);

/// A clonable, type-erased value with a runtime type tag.
///
/// This is the only value shape converters see; statically typed
/// application values enter and leave through [`Bind`].
pub struct Dynamic(Box<dyn AnyValue>);

impl Dynamic {
    /// Wraps a concrete value.
    #[must_use]
    pub fn new<T: Any + Clone>(value: T) -> Self {
        Dynamic(Box::new(value))
    }

    /// The explicit null value.
    #[must_use]
    pub fn null() -> Self {
        Dynamic::new(Null)
    }

    /// Whether this value is the null marker.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.is::<Null>()
    }

    /// Whether the contained value is a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.0.as_any().is::<T>()
    }

    /// The runtime type tag of the contained value.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.0.as_any().type_id()
    }

    /// The canonical name of the contained value's type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.0.value_type_name()
    }

    /// Borrows the contained value as a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Unwraps the contained value as a `T`, or fails with a binding error
    /// naming both types.
    pub fn downcast<T: Any>(self) -> Result<T> {
        let found = self.type_name();
        match self.0.into_any().downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(_) => Err(Error::bind(type_name::<T>(), found)),
        }
    }
}

impl Clone for Dynamic {
    fn clone(&self) -> Self {
        Dynamic(self.0.clone_boxed())
    }
}

impl Default for Dynamic {
    fn default() -> Self {
        Dynamic::null()
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dynamic({})", self.type_name())
    }
}

/// Maps a concrete Rust type to its [`TypeRef`] and moves values across the
/// dynamic boundary.
///
/// Implemented for the scalar family, `Vec<T>`, `IndexMap<String, T>`,
/// `Option<T>` and [`Dynamic`] itself; structured application types get an
/// implementation from the [`bind_class!`](crate::bind_class) macro.
pub trait Bind: Any + Clone {
    /// The normalized type descriptor for `Self`.
    fn type_ref() -> TypeRef;

    /// Converts a borrowed value into its dynamic representation.
    fn to_dynamic(&self) -> Dynamic;

    /// Rebuilds a typed value from its dynamic representation.
    fn from_dynamic(value: Dynamic) -> Result<Self>;
}

impl Bind for bool {
    fn type_ref() -> TypeRef {
        TypeRef::Bool
    }

    fn to_dynamic(&self) -> Dynamic {
        Dynamic::new(*self)
    }

    fn from_dynamic(value: Dynamic) -> Result<Self> {
        value.downcast::<bool>()
    }
}

impl Bind for i64 {
    fn type_ref() -> TypeRef {
        TypeRef::Int
    }

    fn to_dynamic(&self) -> Dynamic {
        Dynamic::new(*self)
    }

    fn from_dynamic(value: Dynamic) -> Result<Self> {
        value.downcast::<i64>()
    }
}

/// Narrower integers normalize through `i64`; converting back checks range.
macro_rules! bind_int {
    ($($int:ty),*) => {
        $(
            impl Bind for $int {
                fn type_ref() -> TypeRef {
                    TypeRef::Int
                }

                fn to_dynamic(&self) -> Dynamic {
                    Dynamic::new(*self as i64)
                }

                fn from_dynamic(value: Dynamic) -> Result<Self> {
                    let wide = value.downcast::<i64>()?;
                    <$int>::try_from(wide)
                        .map_err(|_| Error::bind(type_name::<$int>(), "out-of-range integer"))
                }
            }
        )*
    };
}

bind_int!(i8, i16, i32, u8, u16, u32);

impl Bind for f64 {
    fn type_ref() -> TypeRef {
        TypeRef::Float
    }

    fn to_dynamic(&self) -> Dynamic {
        Dynamic::new(*self)
    }

    fn from_dynamic(value: Dynamic) -> Result<Self> {
        value.downcast::<f64>()
    }
}

impl Bind for f32 {
    fn type_ref() -> TypeRef {
        TypeRef::Float
    }

    fn to_dynamic(&self) -> Dynamic {
        Dynamic::new(f64::from(*self))
    }

    fn from_dynamic(value: Dynamic) -> Result<Self> {
        Ok(value.downcast::<f64>()? as f32)
    }
}

impl Bind for String {
    fn type_ref() -> TypeRef {
        TypeRef::Str
    }

    fn to_dynamic(&self) -> Dynamic {
        Dynamic::new(self.clone())
    }

    fn from_dynamic(value: Dynamic) -> Result<Self> {
        value.downcast::<String>()
    }
}

impl Bind for BigInt {
    fn type_ref() -> TypeRef {
        TypeRef::BigInt
    }

    fn to_dynamic(&self) -> Dynamic {
        Dynamic::new(self.clone())
    }

    fn from_dynamic(value: Dynamic) -> Result<Self> {
        value.downcast::<BigInt>()
    }
}

impl Bind for DateTime<Utc> {
    fn type_ref() -> TypeRef {
        TypeRef::Date
    }

    fn to_dynamic(&self) -> Dynamic {
        Dynamic::new(*self)
    }

    fn from_dynamic(value: Dynamic) -> Result<Self> {
        value.downcast::<DateTime<Utc>>()
    }
}

impl<T: Bind> Bind for Vec<T> {
    fn type_ref() -> TypeRef {
        TypeRef::seq(T::type_ref())
    }

    fn to_dynamic(&self) -> Dynamic {
        Dynamic::new(Sequence(self.iter().map(Bind::to_dynamic).collect()))
    }

    fn from_dynamic(value: Dynamic) -> Result<Self> {
        let seq = value.downcast::<Sequence>()?;
        seq.0.into_iter().map(T::from_dynamic).collect()
    }
}

impl<T: Bind> Bind for IndexMap<String, T> {
    fn type_ref() -> TypeRef {
        TypeRef::map(T::type_ref())
    }

    fn to_dynamic(&self) -> Dynamic {
        Dynamic::new(ObjectMap(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_dynamic()))
                .collect(),
        ))
    }

    fn from_dynamic(value: Dynamic) -> Result<Self> {
        let map = value.downcast::<ObjectMap>()?;
        map.0
            .into_iter()
            .map(|(k, v)| Ok((k, T::from_dynamic(v)?)))
            .collect()
    }
}

/// Boxing is invisible on the wire; recursive types use it for indirection.
impl<T: Bind> Bind for Box<T> {
    fn type_ref() -> TypeRef {
        T::type_ref()
    }

    fn to_dynamic(&self) -> Dynamic {
        T::to_dynamic(self)
    }

    fn from_dynamic(value: Dynamic) -> Result<Self> {
        T::from_dynamic(value).map(Box::new)
    }
}

impl<T: Bind> Bind for Option<T> {
    fn type_ref() -> TypeRef {
        TypeRef::optional(T::type_ref())
    }

    fn to_dynamic(&self) -> Dynamic {
        match self {
            Some(inner) => inner.to_dynamic(),
            None => Dynamic::null(),
        }
    }

    fn from_dynamic(value: Dynamic) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_dynamic(value).map(Some)
        }
    }
}

impl Bind for Dynamic {
    fn type_ref() -> TypeRef {
        TypeRef::Dynamic
    }

    fn to_dynamic(&self) -> Dynamic {
        self.clone()
    }

    fn from_dynamic(value: Dynamic) -> Result<Self> {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_round_trip() {
        assert_eq!(i64::from_dynamic(7i64.to_dynamic()).unwrap(), 7);
        assert_eq!(i32::from_dynamic(7i32.to_dynamic()).unwrap(), 7);
        assert!(bool::from_dynamic(true.to_dynamic()).unwrap());
        assert_eq!(
            String::from_dynamic("x".to_string().to_dynamic()).unwrap(),
            "x"
        );
    }

    #[test]
    fn test_narrow_integer_range_check() {
        let wide = 300i64.to_dynamic();
        assert!(matches!(u8::from_dynamic(wide).unwrap_err(), Error::Bind { .. }));
    }

    #[test]
    fn test_option_null_boundary() {
        assert!(Option::<i64>::from_dynamic(Dynamic::null())
            .unwrap()
            .is_none());
        assert_eq!(
            Option::<i64>::from_dynamic(5i64.to_dynamic()).unwrap(),
            Some(5)
        );
        assert!(None::<i64>.to_dynamic().is_null());
    }

    #[test]
    fn test_containers() {
        let v = vec![1i64, 2, 3];
        let back = Vec::<i64>::from_dynamic(v.to_dynamic()).unwrap();
        assert_eq!(back, v);

        let mut m = IndexMap::new();
        m.insert("a".to_string(), 1i64);
        let back = IndexMap::<String, i64>::from_dynamic(m.to_dynamic()).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_downcast_mismatch_names_types() {
        let err = String::from_dynamic(1i64.to_dynamic()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("i64"));
    }
}
