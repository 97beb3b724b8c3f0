//! Converter factories: the base-resolution stage of the factory chain.
//!
//! A [`Factory`] maps a [`TypeRef`] to a converter or declines, letting the
//! next factory in the engine's ordered list try. Factories are stateless
//! (or hold only their own configuration) and never cache — caching happens
//! once per top-level request in the resolution engine.
//!
//! The built-in list covers scalars, sequences, maps and the dynamic top
//! type, and falls back to [`ClassFactory`], which asks the engine's
//! introspector for a [`ClassModel`](crate::ClassModel) and builds a
//! model-driven converter from it.

use crate::convert::{
    BigIntConverter, BoolConverter, Converter, DateConverter, DynamicConverter, FloatConverter,
    IntConverter, MapConverter, NullConverter, SeqConverter, StringConverter,
};
use crate::context::ResolutionContext;
use crate::dynamic::Dynamic;
use crate::engine::{Engine, ResolveCtx};
use crate::model::ClassModel;
use crate::read::JsonReader;
use crate::write::JsonWriter;
use crate::{Error, Result, TypeRef};
use std::collections::HashMap;
use std::sync::Arc;

/// Produces a converter for a requested type, or declines.
///
/// `Ok(None)` means "I don't handle this type, ask the next factory"; it is
/// never an error by itself. `ctx` must be threaded into any recursive
/// [`Engine::resolve`](crate::Engine) calls so the circular-reference guard
/// can see them.
pub trait Factory: Send + Sync {
    /// Creates a converter for `ty`, or declines with `Ok(None)`.
    fn create(
        &self,
        ty: &TypeRef,
        engine: &Engine,
        ctx: &mut ResolveCtx,
    ) -> Result<Option<Arc<dyn Converter>>>;
}

/// Built-in factory for scalar types and the dynamic top type.
pub struct ScalarFactory;

impl Factory for ScalarFactory {
    fn create(
        &self,
        ty: &TypeRef,
        _engine: &Engine,
        _ctx: &mut ResolveCtx,
    ) -> Result<Option<Arc<dyn Converter>>> {
        Ok(match ty {
            TypeRef::Bool => Some(Arc::new(BoolConverter)),
            TypeRef::Int => Some(Arc::new(IntConverter)),
            TypeRef::Float => Some(Arc::new(FloatConverter)),
            TypeRef::Str => Some(Arc::new(StringConverter)),
            TypeRef::BigInt => Some(Arc::new(BigIntConverter)),
            TypeRef::Date => Some(Arc::new(DateConverter)),
            TypeRef::Dynamic => Some(Arc::new(DynamicConverter)),
            _ => None,
        })
    }
}

/// Built-in factory for homogeneous sequences.
pub struct SeqFactory;

impl Factory for SeqFactory {
    fn create(
        &self,
        ty: &TypeRef,
        engine: &Engine,
        ctx: &mut ResolveCtx,
    ) -> Result<Option<Arc<dyn Converter>>> {
        match ty {
            TypeRef::Seq(element) => {
                let element = engine.resolve(&element.expand_required(), ctx)?;
                Ok(Some(Arc::new(SeqConverter::new(element))))
            }
            _ => Ok(None),
        }
    }
}

/// Built-in factory for string-keyed maps.
pub struct MapFactory;

impl Factory for MapFactory {
    fn create(
        &self,
        ty: &TypeRef,
        engine: &Engine,
        ctx: &mut ResolveCtx,
    ) -> Result<Option<Arc<dyn Converter>>> {
        match ty {
            TypeRef::Map(value) => {
                let value = engine.resolve(&value.expand_required(), ctx)?;
                Ok(Some(Arc::new(MapConverter::new(value))))
            }
            _ => Ok(None),
        }
    }
}

/// Fallback factory for structured types: consults the engine's
/// introspector and builds a model-driven converter.
pub struct ClassFactory;

impl Factory for ClassFactory {
    fn create(
        &self,
        ty: &TypeRef,
        engine: &Engine,
        ctx: &mut ResolveCtx,
    ) -> Result<Option<Arc<dyn Converter>>> {
        let id = match ty.class_id() {
            Some(id) => id,
            None => return Ok(None),
        };
        let model = match engine.model_for(id) {
            Some(model) => model,
            None => return Ok(None),
        };
        Ok(Some(Arc::new(ClassConverter::build(model, engine, ctx)?)))
    }
}

struct BoundField {
    name: String,
    getter: crate::model::Getter,
    converter: Arc<dyn Converter>,
}

/// Terminal converter for a structured type, driven by its
/// [`ClassModel`]: fields are written in declaration order and read by
/// wire name into constructor slots.
///
/// Per-field converters are resolved once at build time — contextual
/// factories first, then ordinary type-level resolution.
pub struct ClassConverter {
    model: Arc<ClassModel>,
    fields: Vec<BoundField>,
    by_name: HashMap<String, usize>,
}

impl ClassConverter {
    fn build(model: Arc<ClassModel>, engine: &Engine, ctx: &mut ResolveCtx) -> Result<Self> {
        let mut fields = Vec::with_capacity(model.fields().len());
        let mut by_name = HashMap::with_capacity(model.fields().len());
        for (slot, field) in model.fields().iter().enumerate() {
            let context = ResolutionContext::new(model.id(), field);
            let converter = match engine.contextual_converter(&context)? {
                // A contextual converter bypasses the type cache, so it is
                // not yet null-wrapped.
                Some(converter) if converter.handles_null() => converter,
                Some(converter) => {
                    Arc::new(NullConverter::new(converter, field.ty().clone())) as Arc<dyn Converter>
                }
                None => engine.resolve(field.ty(), ctx)?,
            };
            by_name.insert(field.name().to_string(), slot);
            fields.push(BoundField {
                name: field.name().to_string(),
                getter: field.getter(),
                converter,
            });
        }
        Ok(ClassConverter {
            model,
            fields,
            by_name,
        })
    }
}

impl Converter for ClassConverter {
    fn serialize(
        &self,
        value: &Dynamic,
        writer: &mut JsonWriter<'_>,
        engine: &Engine,
    ) -> Result<()> {
        if self.model.is_abstract() {
            // Dispatch on the value's runtime type tag.
            return match engine.runtime_type_of(value) {
                Some(actual) if actual.class_id() != Some(self.model.id()) => engine
                    .converter_for(&actual)?
                    .serialize(value, writer, engine),
                _ => Err(Error::no_converter(format!(
                    "abstract type {} (value of unregistered type {})",
                    self.model.id(),
                    value.type_name()
                ))),
            };
        }
        writer.begin_object()?;
        for field in &self.fields {
            writer.name(&field.name)?;
            let field_value = (field.getter)(value)?;
            field.converter.serialize(&field_value, writer, engine)?;
        }
        writer.end_object()
    }

    fn deserialize(&self, reader: &mut JsonReader<'_>, engine: &Engine) -> Result<Dynamic> {
        if self.model.is_abstract() {
            return Err(Error::no_converter(format!(
                "abstract type {} (no type metadata named a concrete subtype)",
                self.model.id()
            )));
        }
        let construct = self
            .model
            .constructor()
            .ok_or_else(|| Error::no_converter(format!("{} (not constructible)", self.model.id())))?;
        reader.begin_object()?;
        let mut slots: Vec<Option<Dynamic>> = vec![None; self.fields.len()];
        while reader.has_next()? {
            reader.next()?;
            let name = reader.name()?.to_string();
            match self.by_name.get(&name) {
                Some(&slot) => {
                    slots[slot] = Some(self.fields[slot].converter.deserialize(reader, engine)?);
                }
                None => {
                    if engine.options().fail_on_unknown_properties {
                        return Err(Error::unexpected_property(&name, self.model.id()));
                    }
                    reader.skip_value()?;
                }
            }
        }
        reader.end_object()?;
        construct(slots)
    }
}
