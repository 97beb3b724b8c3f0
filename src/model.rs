//! The object-model introspector contract.
//!
//! The resolution engine does not hard-code any application type: structured
//! types are described by a [`ClassModel`] — an ordered table of
//! [`FieldModel`] descriptors plus a constructor binding — supplied by an
//! [`Introspector`]. How models are produced is pluggable; this crate ships
//! explicit registration, with the [`bind_class!`](crate::bind_class) macro
//! generating models (and [`Bind`](crate::Bind) implementations) for plain
//! structs.
//!
//! A field descriptor carries both its wire name and its original
//! declaration-site name, its declared [`TypeRef`], and an open attribute
//! table — the channel contextual factories read per-field customization
//! from (e.g. a date format pattern).

use crate::dynamic::Dynamic;
use crate::ty::{ClassId, TypeRef};
use crate::Result;
use indexmap::IndexMap;
use std::any::Any;
use std::sync::Arc;

/// Read accessor: extracts one field of a structured value as a dynamic
/// value.
pub type Getter = fn(&Dynamic) -> Result<Dynamic>;

/// Constructor binding: builds an instance from one slot per field, in
/// declaration order. A `None` slot means the property was absent from the
/// document and the field keeps its default.
pub type Constructor = fn(Vec<Option<Dynamic>>) -> Result<Dynamic>;

/// Open per-field attribute table, in declaration order.
#[derive(Clone, Debug, Default)]
pub struct FieldAttrs(IndexMap<String, String>);

impl FieldAttrs {
    /// Looks up an attribute by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether any attributes are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn insert(&mut self, key: &str, value: &str) {
        self.0.insert(key.to_string(), value.to_string());
    }
}

/// Descriptor for one property of a structured type.
#[derive(Clone)]
pub struct FieldModel {
    name: String,
    original_name: String,
    ty: TypeRef,
    attrs: FieldAttrs,
    getter: Getter,
}

impl FieldModel {
    /// Creates a field descriptor. The wire name starts equal to the
    /// declaration-site name; use [`with_wire_name`](Self::with_wire_name)
    /// to rename.
    pub fn new(name: &str, ty: TypeRef, getter: Getter) -> Self {
        FieldModel {
            name: name.to_string(),
            original_name: name.to_string(),
            ty,
            attrs: FieldAttrs::default(),
            getter,
        }
    }

    /// Renames the property on the wire, keeping the original name
    /// available to contextual factories.
    #[must_use]
    pub fn with_wire_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Overrides the declared type (e.g. a field stored as
    /// [`Dynamic`](crate::Dynamic) declaring an abstract base class).
    #[must_use]
    pub fn with_declared_type(mut self, ty: TypeRef) -> Self {
        self.ty = ty;
        self
    }

    /// Adds a declaration-site attribute.
    #[must_use]
    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.insert(key, value);
        self
    }

    /// The effective (wire) property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declaration-site name, before any rename.
    #[must_use]
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// The declared type of the property.
    #[must_use]
    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    /// The declaration-site attributes.
    #[must_use]
    pub fn attrs(&self) -> &FieldAttrs {
        &self.attrs
    }

    /// The read accessor.
    #[must_use]
    pub fn getter(&self) -> Getter {
        self.getter
    }
}

/// Descriptor table for one structured type.
#[derive(Clone)]
pub struct ClassModel {
    id: ClassId,
    supertype: Option<ClassId>,
    is_abstract: bool,
    fields: Vec<FieldModel>,
    construct: Option<Constructor>,
}

impl ClassModel {
    /// Creates an empty model for the concrete type `T`.
    #[must_use]
    pub fn new<T: Any>() -> Self {
        ClassModel {
            id: ClassId::of::<T>(),
            supertype: None,
            is_abstract: false,
            fields: Vec::new(),
            construct: None,
        }
    }

    /// Creates a model for an abstract base type `T`: it has no fields and
    /// cannot be constructed; values are dispatched to a registered subtype
    /// by runtime type tag or type metadata.
    #[must_use]
    pub fn abstract_class<T: Any>() -> Self {
        ClassModel {
            id: ClassId::of::<T>(),
            supertype: None,
            is_abstract: true,
            fields: Vec::new(),
            construct: None,
        }
    }

    /// Declares `S` as the direct supertype of this type.
    #[must_use]
    pub fn with_supertype<S: Any>(mut self) -> Self {
        self.supertype = Some(ClassId::of::<S>());
        self
    }

    /// Appends a field descriptor; order is declaration order and defines
    /// both wire order and constructor slot order.
    #[must_use]
    pub fn with_field(mut self, field: FieldModel) -> Self {
        self.fields.push(field);
        self
    }

    /// Sets the constructor binding.
    #[must_use]
    pub fn with_constructor(mut self, construct: Constructor) -> Self {
        self.construct = Some(construct);
        self
    }

    /// The described type's identity.
    #[must_use]
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// The direct supertype, if declared.
    #[must_use]
    pub fn supertype(&self) -> Option<ClassId> {
        self.supertype
    }

    /// Whether the type is abstract.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// The ordered field descriptors.
    #[must_use]
    pub fn fields(&self) -> &[FieldModel] {
        &self.fields
    }

    /// The constructor binding, if one was set.
    #[must_use]
    pub fn constructor(&self) -> Option<Constructor> {
        self.construct
    }
}

/// A type with a macro- or hand-written [`ClassModel`]; what
/// [`EngineBuilder::register`](crate::EngineBuilder::register) consumes.
pub trait ClassBinding: crate::Bind {
    /// The descriptor table for `Self`.
    fn class_model() -> ClassModel;
}

/// Supplies the resolution engine with models for structured types it does
/// not otherwise know how to build.
///
/// Property discovery is deliberately unspecified: explicit registration,
/// code generation and convention-based scanning are all legitimate
/// implementations behind this interface.
pub trait Introspector: Send + Sync {
    /// The model for `class`, or `None` if this introspector does not know
    /// the type.
    fn describe(&self, class: ClassId) -> Option<Arc<ClassModel>>;
}
