//! Type descriptors and matching.
//!
//! This module defines [`TypeRef`], the normalized description of a
//! (possibly generic) binding type, and the two queries the rest of the
//! engine asks of it: *is candidate type A usable where declared type B is
//! expected* ([`TypeRef::matches`]) and *what is the Nth type argument of
//! this container type* ([`TypeRef::type_arg`]).
//!
//! `TypeRef`s are immutable and structural: building and hashing one is
//! cheap, so they serve directly as converter-cache keys without a separate
//! interning table.
//!
//! ## Examples
//!
//! ```rust
//! use jsonbind::TypeRef;
//!
//! let ints = TypeRef::seq(TypeRef::Int);
//! assert_eq!(ints.type_arg(0), Some(TypeRef::Int));
//! assert!(TypeRef::Dynamic.matches(&ints, false, &()));
//! assert!(!TypeRef::Int.matches(&TypeRef::Str, false, &()));
//! ```

use std::any::{type_name, Any, TypeId};
use std::fmt;

/// Identity of a registered structured (record-like) type: the runtime type
/// tag plus the canonical type name. Hashing and equality use the tag only.
#[derive(Clone, Copy, Debug)]
pub struct ClassId {
    id: TypeId,
    name: &'static str,
}

impl ClassId {
    /// The identity of the Rust type `T`.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        ClassId {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// The runtime type tag.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// The canonical type name, used as the default polymorphism alias.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ClassId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClassId {}

impl std::hash::Hash for ClassId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Answers supertype queries for registered classes during matching.
///
/// Implemented by the engine's model registry; the unit type `()` is a
/// hierarchy with no edges, usable when only structural matching is needed.
pub trait TypeHierarchy {
    /// The direct supertype of `class`, if one is registered.
    fn supertype(&self, class: ClassId) -> Option<ClassId>;
}

impl TypeHierarchy for () {
    fn supertype(&self, _class: ClassId) -> Option<ClassId> {
        None
    }
}

/// A normalized, possibly-generic type descriptor.
///
/// `TypeRef` is the unit of converter resolution and caching: every
/// converter the engine produces is keyed by exactly one `TypeRef`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// `bool`
    Bool,
    /// 64-bit signed integer (the normal form of the integer family)
    Int,
    /// 64-bit float (the normal form of the float family)
    Float,
    /// UTF-8 string
    Str,
    /// Arbitrary-precision integer
    BigInt,
    /// Calendar timestamp (`chrono::DateTime<Utc>`)
    Date,
    /// The top type: any JSON value, materialized dynamically
    Dynamic,
    /// Homogeneous sequence; behaves as a one-argument container
    Seq(Box<TypeRef>),
    /// String-keyed map with homogeneous values
    Map(Box<TypeRef>),
    /// Nullable slot; `null` stays `null` instead of defaulting
    Optional(Box<TypeRef>),
    /// A registered structured type
    Class(ClassId),
    /// A structured type applied to explicit type arguments
    Parameterized {
        raw: ClassId,
        args: Vec<TypeRef>,
    },
    /// An unknown type bounded from above; resolves to its bound in
    /// required position and to [`TypeRef::Dynamic`] in produced position
    Wildcard {
        upper: Option<Box<TypeRef>>,
    },
}

impl TypeRef {
    /// A sequence of `element`.
    #[must_use]
    pub fn seq(element: TypeRef) -> Self {
        TypeRef::Seq(Box::new(element))
    }

    /// A string-keyed map of `value`.
    #[must_use]
    pub fn map(value: TypeRef) -> Self {
        TypeRef::Map(Box::new(value))
    }

    /// A nullable slot of `inner`.
    #[must_use]
    pub fn optional(inner: TypeRef) -> Self {
        TypeRef::Optional(Box::new(inner))
    }

    /// A wildcard bounded above by `upper`.
    #[must_use]
    pub fn wildcard(upper: Option<TypeRef>) -> Self {
        TypeRef::Wildcard {
            upper: upper.map(Box::new),
        }
    }

    /// Whether this slot is nullable (a `null` token stays `null` rather
    /// than defaulting to the primitive zero value).
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        matches!(
            self,
            TypeRef::Optional(_)
                | TypeRef::Dynamic
                | TypeRef::Class(_)
                | TypeRef::Parameterized { .. }
                | TypeRef::Seq(_)
                | TypeRef::Map(_)
                | TypeRef::Str
                | TypeRef::BigInt
                | TypeRef::Date
                | TypeRef::Wildcard { .. }
        )
    }

    /// The class identity behind this reference, looking through
    /// `Optional` and parameterization.
    #[must_use]
    pub fn class_id(&self) -> Option<ClassId> {
        match self {
            TypeRef::Class(id) => Some(*id),
            TypeRef::Parameterized { raw, .. } => Some(*raw),
            TypeRef::Optional(inner) => inner.class_id(),
            _ => None,
        }
    }

    /// Expands this reference as a *required* type: wildcards resolve to
    /// their upper bound (or [`TypeRef::Dynamic`] when unbounded).
    #[must_use]
    pub fn expand_required(&self) -> TypeRef {
        match self {
            TypeRef::Wildcard { upper } => upper
                .as_deref()
                .map(TypeRef::expand_required)
                .unwrap_or(TypeRef::Dynamic),
            other => other.clone(),
        }
    }

    /// Expands this reference as a *produced* type: wildcards resolve to
    /// [`TypeRef::Dynamic`].
    #[must_use]
    pub fn expand_produced(&self) -> TypeRef {
        match self {
            TypeRef::Wildcard { .. } => TypeRef::Dynamic,
            other => other.clone(),
        }
    }

    /// The `n`th type argument of this container type, expanded for use as
    /// a required type. Sequences, maps and optionals are one-argument
    /// containers (a map's value slot is argument 0).
    #[must_use]
    pub fn type_arg(&self, n: usize) -> Option<TypeRef> {
        match self {
            TypeRef::Seq(elem) if n == 0 => Some(elem.expand_required()),
            TypeRef::Map(value) if n == 0 => Some(value.expand_required()),
            TypeRef::Optional(inner) if n == 0 => Some(inner.expand_required()),
            TypeRef::Parameterized { args, .. } => args.get(n).map(TypeRef::expand_required),
            _ => None,
        }
    }

    /// Whether a value of type `candidate` is usable where `self` is the
    /// declared type.
    ///
    /// With `strict` set, generic arguments must match exactly; otherwise
    /// matching is covariant in container elements and walks the registered
    /// class hierarchy through `hierarchy`.
    #[must_use]
    pub fn matches(&self, candidate: &TypeRef, strict: bool, hierarchy: &dyn TypeHierarchy) -> bool {
        match (self, candidate) {
            (TypeRef::Dynamic, _) => true,
            (TypeRef::Wildcard { upper }, c) => match upper {
                Some(bound) => bound.matches(c, strict, hierarchy),
                None => true,
            },
            (required, TypeRef::Wildcard { upper }) => match upper {
                Some(bound) => required.matches(bound, strict, hierarchy),
                None => !strict,
            },
            (TypeRef::Optional(a), TypeRef::Optional(b)) => b.matches_into(a, strict, hierarchy),
            (TypeRef::Optional(a), b) => b.matches_into(a, strict, hierarchy),
            (TypeRef::Seq(a), TypeRef::Seq(b)) => b.matches_into(a, strict, hierarchy),
            (TypeRef::Map(a), TypeRef::Map(b)) => b.matches_into(a, strict, hierarchy),
            (TypeRef::Class(a), c) => match c.class_id() {
                Some(candidate_id) => {
                    if *a == candidate_id {
                        return true;
                    }
                    if strict {
                        return false;
                    }
                    // Walk the candidate's supertype chain.
                    let mut cursor = hierarchy.supertype(candidate_id);
                    while let Some(id) = cursor {
                        if id == *a {
                            return true;
                        }
                        cursor = hierarchy.supertype(id);
                    }
                    false
                }
                None => false,
            },
            (
                TypeRef::Parameterized { raw: a, args: a_args },
                TypeRef::Parameterized { raw: b, args: b_args },
            ) => {
                TypeRef::Class(*a).matches(&TypeRef::Class(*b), strict, hierarchy)
                    && a_args.len() == b_args.len()
                    && a_args
                        .iter()
                        .zip(b_args)
                        .all(|(x, y)| y.matches_into(x, strict, hierarchy))
            }
            (a, b) => a == b,
        }
    }

    /// Helper flipping the direction for element positions: candidate
    /// element `self` must satisfy required element `required`.
    fn matches_into(&self, required: &TypeRef, strict: bool, hierarchy: &dyn TypeHierarchy) -> bool {
        if strict {
            required == self
                || matches!(required, TypeRef::Wildcard { .. })
                    && required.matches(self, strict, hierarchy)
        } else {
            required.matches(self, strict, hierarchy)
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Bool => f.write_str("bool"),
            TypeRef::Int => f.write_str("int"),
            TypeRef::Float => f.write_str("float"),
            TypeRef::Str => f.write_str("string"),
            TypeRef::BigInt => f.write_str("bigint"),
            TypeRef::Date => f.write_str("date"),
            TypeRef::Dynamic => f.write_str("dynamic"),
            TypeRef::Seq(elem) => write!(f, "seq<{elem}>"),
            TypeRef::Map(value) => write!(f, "map<string, {value}>"),
            TypeRef::Optional(inner) => write!(f, "optional<{inner}>"),
            TypeRef::Class(id) => write!(f, "{id}"),
            TypeRef::Parameterized { raw, args } => {
                write!(f, "{raw}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(">")
            }
            TypeRef::Wildcard { upper: Some(bound) } => write!(f, "? extends {bound}"),
            TypeRef::Wildcard { upper: None } => f.write_str("?"),
        }
    }
}
