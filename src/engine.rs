//! The converter resolution engine.
//!
//! An [`Engine`] is the long-lived entry point of the crate: it owns the
//! options, the model registry, the factory chain and the converter cache,
//! and offers the typed serialization API on top of them.
//!
//! ## Resolution
//!
//! A converter request for a [`TypeRef`] goes through, in order:
//!
//! 1. the converter cache (one converter per type per engine lifetime)
//! 2. the construction guard: if the same type is already being built on
//!    this call stack, a placeholder proxy is returned and patched once the
//!    real converter exists, so self-referential types terminate
//! 3. the factory chain: user factories first, then the built-ins
//! 4. decoration: runtime-type substitution, type metadata and null
//!    handling wrap the base converter, outermost last
//!
//! The finished converter is cached and shared; resolution cost is paid
//! once per type, not per document.
//!
//! ## Usage
//!
//! ```rust
//! use jsonbind::{bind_class, Engine};
//!
//! #[derive(Clone, Default, PartialEq, Debug)]
//! struct Point {
//!     x: i64,
//!     y: i64,
//! }
//!
//! bind_class!(Point { x: i64, y: i64 });
//!
//! let engine = Engine::builder().register::<Point>().build();
//! let json = engine.to_string(&Point { x: 3, y: 4 }).unwrap();
//! let back: Point = engine.from_str(&json).unwrap();
//! assert_eq!(back, Point { x: 3, y: 4 });
//! ```

use crate::context::{ContextualFactory, DateFormatFactory, ResolutionContext};
use crate::convert::{Converter, NullConverter, ProxyConverter};
use crate::dynamic::{Bind, Dynamic, ObjectMap, Sequence};
use crate::factory::{ClassFactory, Factory, MapFactory, ScalarFactory, SeqFactory};
use crate::model::{ClassBinding, ClassModel, Introspector};
use crate::options::EngineOptions;
use crate::read::{decode_document, JsonReader};
use crate::token::TokenKind;
use crate::ty::{ClassId, TypeHierarchy, TypeRef};
use crate::write::JsonWriter;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, PoisonError, RwLock};

/// Per-call-stack construction guard: tracks types whose converters are
/// currently being built so self-referential resolution terminates.
///
/// One context lives for one top-level resolution request; factories thread
/// it through recursive [`Engine::resolve`] calls.
#[derive(Default)]
pub struct ResolveCtx {
    in_progress: HashMap<TypeRef, Arc<ProxyConverter>>,
}

/// Registered models, aliases and view overlays.
struct ModelRegistry {
    models: HashMap<TypeId, Arc<ClassModel>>,
    aliases: HashMap<String, ClassId>,
    alias_names: HashMap<TypeId, String>,
    views: HashMap<(String, TypeId), Arc<ClassModel>>,
}

impl TypeHierarchy for ModelRegistry {
    fn supertype(&self, class: ClassId) -> Option<ClassId> {
        self.models
            .get(&class.type_id())
            .and_then(|model| model.supertype())
    }
}

impl Introspector for ModelRegistry {
    fn describe(&self, class: ClassId) -> Option<Arc<ClassModel>> {
        self.models.get(&class.type_id()).cloned()
    }
}

/// The resolution engine and typed serialization entry point.
///
/// Engines are immutable once built, `Send + Sync`, and meant to be created
/// once and shared; the converter cache makes repeated use of the same
/// types cheap.
pub struct Engine {
    options: EngineOptions,
    registry: ModelRegistry,
    introspectors: Vec<Arc<dyn Introspector>>,
    factories: Vec<Arc<dyn Factory>>,
    contextual: Vec<Arc<dyn ContextualFactory>>,
    cache: RwLock<HashMap<TypeRef, Arc<dyn Converter>>>,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::builder().build()
    }
}

impl Engine {
    /// Starts building an engine.
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// The engine's options.
    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// The registered class hierarchy, for type-matching queries.
    #[must_use]
    pub fn hierarchy(&self) -> &dyn TypeHierarchy {
        &self.registry
    }

    /// The model for `class` under the engine's active view, if any is
    /// registered.
    #[must_use]
    pub fn model_for(&self, class: ClassId) -> Option<Arc<ClassModel>> {
        if let Some(view) = self.options.active_view.as_deref() {
            if let Some(model) = self
                .registry
                .views
                .get(&(view.to_string(), class.type_id()))
            {
                return Some(model.clone());
            }
        }
        if let Some(model) = self.registry.describe(class) {
            return Some(model);
        }
        self.introspectors
            .iter()
            .find_map(|introspector| introspector.describe(class))
    }

    /// The converter for `ty`, from the cache or freshly resolved.
    pub fn converter_for(&self, ty: &TypeRef) -> Result<Arc<dyn Converter>> {
        let mut ctx = ResolveCtx::default();
        self.resolve(ty, &mut ctx)
    }

    /// Resolves a converter within an ongoing resolution request.
    ///
    /// Factories must call this (not [`converter_for`](Self::converter_for))
    /// for nested types, so the construction guard sees the whole call
    /// stack.
    pub fn resolve(&self, ty: &TypeRef, ctx: &mut ResolveCtx) -> Result<Arc<dyn Converter>> {
        let ty = ty.expand_required();
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(hit) = cache.get(&ty) {
                return Ok(hit.clone());
            }
        }
        if let Some(proxy) = ctx.in_progress.get(&ty) {
            return Ok(proxy.clone());
        }
        let proxy = Arc::new(ProxyConverter::new());
        ctx.in_progress.insert(ty.clone(), proxy.clone());
        let built = self.build_converter(&ty, ctx);
        ctx.in_progress.remove(&ty);
        let converter = built?;
        proxy.fill(converter.clone());
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ty, converter.clone());
        Ok(converter)
    }

    fn build_converter(&self, ty: &TypeRef, ctx: &mut ResolveCtx) -> Result<Arc<dyn Converter>> {
        // A nullable slot resolves its inner type and keeps null as null,
        // overriding the inner type's own null policy.
        if let TypeRef::Optional(inner) = ty {
            let inner = self.resolve(inner, ctx)?;
            return Ok(Arc::new(NullConverter::new(inner, ty.clone())));
        }
        let mut base = None;
        for factory in &self.factories {
            if let Some(converter) = factory.create(ty, self, ctx)? {
                base = Some(converter);
                break;
            }
        }
        let mut converter = base.ok_or_else(|| Error::no_converter(ty.to_string()))?;
        if self.options.use_runtime_type && ty.class_id().is_some() {
            converter = Arc::new(RuntimeTypeConverter {
                declared: ty.clone(),
                inner: converter,
            });
        }
        if self.options.class_metadata {
            if let Some(declared) = ty.class_id() {
                converter = Arc::new(ClassMetadataConverter {
                    declared,
                    inner: converter,
                });
            }
        }
        if !converter.handles_null() {
            converter = Arc::new(NullConverter::new(converter, ty.clone()));
        }
        Ok(converter)
    }

    /// The first contextual converter any registered contextual factory
    /// offers for this declaration site.
    pub fn contextual_converter(
        &self,
        context: &ResolutionContext<'_>,
    ) -> Result<Option<Arc<dyn Converter>>> {
        for factory in &self.contextual {
            if let Some(converter) = factory.create(context, self)? {
                return Ok(Some(converter));
            }
        }
        Ok(None)
    }

    /// The type descriptor matching a dynamic value's runtime tag: the
    /// built-in scalar and container shapes, then registered classes.
    /// Null has no runtime type.
    #[must_use]
    pub fn runtime_type_of(&self, value: &Dynamic) -> Option<TypeRef> {
        if value.is_null() {
            return None;
        }
        let id = value.type_id();
        if id == TypeId::of::<bool>() {
            return Some(TypeRef::Bool);
        }
        if id == TypeId::of::<i64>() {
            return Some(TypeRef::Int);
        }
        if id == TypeId::of::<f64>() {
            return Some(TypeRef::Float);
        }
        if id == TypeId::of::<String>() {
            return Some(TypeRef::Str);
        }
        if id == TypeId::of::<BigInt>() {
            return Some(TypeRef::BigInt);
        }
        if id == TypeId::of::<DateTime<Utc>>() {
            return Some(TypeRef::Date);
        }
        if id == TypeId::of::<Sequence>() {
            return Some(TypeRef::seq(TypeRef::Dynamic));
        }
        if id == TypeId::of::<ObjectMap>() {
            return Some(TypeRef::map(TypeRef::Dynamic));
        }
        self.registry
            .models
            .get(&id)
            .map(|model| TypeRef::Class(model.id()))
    }

    /// The polymorphism alias for a registered class: the explicit alias if
    /// one was registered, the canonical type name otherwise.
    #[must_use]
    pub fn alias_for(&self, class: ClassId) -> String {
        self.registry
            .alias_names
            .get(&class.type_id())
            .cloned()
            .unwrap_or_else(|| class.name().to_string())
    }

    /// The class a polymorphism alias names: explicit aliases first, then
    /// canonical type names of registered classes.
    pub fn class_for_alias(&self, alias: &str) -> Result<ClassId> {
        if let Some(class) = self.registry.aliases.get(alias) {
            return Ok(*class);
        }
        self.registry
            .models
            .values()
            .map(|model| model.id())
            .find(|id| id.name() == alias)
            .ok_or_else(|| Error::unknown_alias(alias))
    }

    /// Serializes a typed value to a JSON string.
    pub fn to_string<T: Bind>(&self, value: &T) -> Result<String> {
        let mut out = Vec::new();
        self.to_writer(value, &mut out)?;
        String::from_utf8(out).map_err(|_| Error::custom("writer produced invalid UTF-8"))
    }

    /// Serializes a typed value to a byte sink.
    pub fn to_writer<T: Bind>(&self, value: &T, sink: &mut dyn io::Write) -> Result<()> {
        self.serialize_dynamic(&value.to_dynamic(), &T::type_ref(), sink)
    }

    /// Serializes a dynamic value under an explicitly declared type.
    pub fn serialize_dynamic(
        &self,
        value: &Dynamic,
        ty: &TypeRef,
        sink: &mut dyn io::Write,
    ) -> Result<()> {
        let converter = self.converter_for(ty)?;
        let mut writer = JsonWriter::new(sink)
            .with_html_safe(self.options.html_safe)
            .with_skip_null(self.options.skip_null)
            .with_metadata_prefix(self.options.metadata_prefix);
        converter.serialize(value, &mut writer, self)?;
        writer.finish()
    }

    /// Deserializes a typed value from a JSON string.
    pub fn from_str<T: Bind>(&self, json: &str) -> Result<T> {
        T::from_dynamic(self.deserialize_dynamic(json, &T::type_ref())?)
    }

    /// Deserializes a typed value from raw bytes, detecting the document's
    /// Unicode encoding first.
    pub fn from_slice<T: Bind>(&self, bytes: &[u8]) -> Result<T> {
        let text = decode_document(bytes)?;
        self.from_str(&text)
    }

    /// Deserializes a typed value from a byte source.
    pub fn from_reader<T: Bind>(&self, source: &mut dyn io::Read) -> Result<T> {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes)?;
        self.from_slice(&bytes)
    }

    /// Deserializes a dynamic value under an explicitly declared type. An
    /// empty document yields null.
    pub fn deserialize_dynamic(&self, json: &str, ty: &TypeRef) -> Result<Dynamic> {
        let converter = self.converter_for(ty)?;
        let mut reader = JsonReader::new(json).with_metadata_prefix(self.options.metadata_prefix);
        if reader.next()? == TokenKind::Eof {
            return Ok(Dynamic::null());
        }
        converter.deserialize(&mut reader, self)
    }
}

/// Decorating converter substituting a value's runtime type for its
/// declared type on serialization, when the runtime type is a registered
/// subtype. The read side is untouched.
struct RuntimeTypeConverter {
    declared: TypeRef,
    inner: Arc<dyn Converter>,
}

impl Converter for RuntimeTypeConverter {
    fn serialize(
        &self,
        value: &Dynamic,
        writer: &mut JsonWriter<'_>,
        engine: &Engine,
    ) -> Result<()> {
        if let Some(actual) = engine.runtime_type_of(value) {
            if actual != self.declared
                && self
                    .declared
                    .matches(&actual, engine.options().strict_generics, engine.hierarchy())
            {
                return engine
                    .converter_for(&actual)?
                    .serialize(value, writer, engine);
            }
        }
        self.inner.serialize(value, writer, engine)
    }

    fn deserialize(&self, reader: &mut JsonReader<'_>, engine: &Engine) -> Result<Dynamic> {
        self.inner.deserialize(reader, engine)
    }
}

/// Decorating converter for the `@class` polymorphism metadata member.
///
/// On write it queues the value's alias as pending metadata; on read it
/// consumes the object head and, if the named class differs from the
/// declared one, re-dispatches to that class's converter. Non-object values
/// pass through untouched.
struct ClassMetadataConverter {
    declared: ClassId,
    inner: Arc<dyn Converter>,
}

impl Converter for ClassMetadataConverter {
    fn serialize(
        &self,
        value: &Dynamic,
        writer: &mut JsonWriter<'_>,
        engine: &Engine,
    ) -> Result<()> {
        let class = engine
            .runtime_type_of(value)
            .and_then(|ty| ty.class_id())
            .unwrap_or(self.declared);
        writer.begin_next_object_metadata();
        writer.metadata("class", &engine.alias_for(class))?;
        self.inner.serialize(value, writer, engine)
    }

    fn deserialize(&self, reader: &mut JsonReader<'_>, engine: &Engine) -> Result<Dynamic> {
        if reader.value_kind() == Some(TokenKind::BeginObject) {
            if let Some(alias) = reader.metadata("class")?.map(str::to_string) {
                let target = engine.class_for_alias(&alias)?;
                if target != self.declared {
                    return engine
                        .converter_for(&TypeRef::Class(target))?
                        .deserialize(reader, engine);
                }
            }
        }
        self.inner.deserialize(reader, engine)
    }
}

/// Builds an [`Engine`]: registrations, factories and options.
pub struct EngineBuilder {
    options: EngineOptions,
    models: HashMap<TypeId, Arc<ClassModel>>,
    aliases: HashMap<String, ClassId>,
    alias_names: HashMap<TypeId, String>,
    views: HashMap<(String, TypeId), Arc<ClassModel>>,
    introspectors: Vec<Arc<dyn Introspector>>,
    factories: Vec<Arc<dyn Factory>>,
    contextual: Vec<Arc<dyn ContextualFactory>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        EngineBuilder::new()
    }
}

impl EngineBuilder {
    #[must_use]
    pub fn new() -> Self {
        EngineBuilder {
            options: EngineOptions::default(),
            models: HashMap::new(),
            aliases: HashMap::new(),
            alias_names: HashMap::new(),
            views: HashMap::new(),
            introspectors: Vec::new(),
            factories: Vec::new(),
            contextual: Vec::new(),
        }
    }

    /// Replaces the options.
    #[must_use]
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Registers a structured type by its generated (or hand-written)
    /// model.
    #[must_use]
    pub fn register<T: ClassBinding>(self) -> Self {
        self.register_model(T::class_model())
    }

    /// Registers an explicit model, e.g. an abstract base built with
    /// [`ClassModel::abstract_class`].
    #[must_use]
    pub fn register_model(mut self, model: ClassModel) -> Self {
        self.models
            .insert(model.id().type_id(), Arc::new(model));
        self
    }

    /// Registers a polymorphism alias for `T`, replacing its canonical type
    /// name on the wire.
    #[must_use]
    pub fn alias<T: Any>(mut self, name: &str) -> Self {
        let class = ClassId::of::<T>();
        self.aliases.insert(name.to_string(), class);
        self.alias_names.insert(class.type_id(), name.to_string());
        self
    }

    /// Registers an alternate model for `T` under a named view. The model
    /// is used instead of the primary one while that view is active.
    #[must_use]
    pub fn view<T: Any>(mut self, view: &str, model: ClassModel) -> Self {
        self.views
            .insert((view.to_string(), TypeId::of::<T>()), Arc::new(model));
        self
    }

    /// Adds an introspector consulted after explicit registrations.
    #[must_use]
    pub fn with_introspector(mut self, introspector: Arc<dyn Introspector>) -> Self {
        self.introspectors.push(introspector);
        self
    }

    /// Adds a factory, tried before the built-in ones.
    #[must_use]
    pub fn with_factory(mut self, factory: Arc<dyn Factory>) -> Self {
        self.factories.push(factory);
        self
    }

    /// Adds a contextual factory, tried before the built-in ones.
    #[must_use]
    pub fn with_contextual(mut self, factory: Arc<dyn ContextualFactory>) -> Self {
        self.contextual.push(factory);
        self
    }

    /// Finishes the engine.
    #[must_use]
    pub fn build(self) -> Engine {
        let mut factories = self.factories;
        factories.push(Arc::new(ScalarFactory));
        factories.push(Arc::new(SeqFactory));
        factories.push(Arc::new(MapFactory));
        factories.push(Arc::new(ClassFactory));
        let mut contextual = self.contextual;
        contextual.push(Arc::new(DateFormatFactory));
        Engine {
            options: self.options,
            registry: ModelRegistry {
                models: self.models,
                aliases: self.aliases,
                alias_names: self.alias_names,
                views: self.views,
            },
            introspectors: self.introspectors,
            factories,
            contextual,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind_class;

    #[derive(Clone, Default, PartialEq, Debug)]
    struct Point {
        x: i64,
        y: i64,
    }

    bind_class!(Point { x: i64, y: i64 });

    #[derive(Clone, Default, PartialEq, Debug)]
    struct Node {
        label: String,
        children: Vec<Node>,
    }

    bind_class!(Node {
        label: String,
        children: Vec<Node>,
    });

    #[test]
    fn test_struct_round_trip() {
        let engine = Engine::builder().register::<Point>().build();
        let json = engine.to_string(&Point { x: 1, y: 2 }).unwrap();
        assert_eq!(json, r#"{"x":1,"y":2}"#);
        let back: Point = engine.from_str(&json).unwrap();
        assert_eq!(back, Point { x: 1, y: 2 });
    }

    #[test]
    fn test_resolution_is_cached_and_idempotent() {
        let engine = Engine::builder().register::<Point>().build();
        let first = engine.converter_for(&Point::type_ref()).unwrap();
        let second = engine.converter_for(&Point::type_ref()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_self_referential_type_resolves() {
        let engine = Engine::builder().register::<Node>().build();
        let tree = Node {
            label: "root".to_string(),
            children: vec![
                Node {
                    label: "left".to_string(),
                    children: vec![Node {
                        label: "leaf".to_string(),
                        children: vec![],
                    }],
                },
                Node {
                    label: "right".to_string(),
                    children: vec![],
                },
            ],
        };
        let json = engine.to_string(&tree).unwrap();
        let back: Node = engine.from_str(&json).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn test_missing_property_keeps_default() {
        let engine = Engine::builder().register::<Point>().build();
        let back: Point = engine.from_str(r#"{"y":9}"#).unwrap();
        assert_eq!(back, Point { x: 0, y: 9 });
    }

    #[test]
    fn test_unknown_property_skipped_by_default() {
        let engine = Engine::builder().register::<Point>().build();
        let back: Point = engine
            .from_str(r#"{"x":1,"extra":{"deep":[1,2]},"y":2}"#)
            .unwrap();
        assert_eq!(back, Point { x: 1, y: 2 });
    }

    #[test]
    fn test_unknown_property_fails_in_strict_mode() {
        let engine = Engine::builder()
            .register::<Point>()
            .with_options(EngineOptions::default().with_fail_on_unknown_properties(true))
            .build();
        let err = engine.from_str::<Point>(r#"{"x":1,"z":3}"#).unwrap_err();
        assert!(matches!(err, Error::UnexpectedProperty { .. }));
    }

    #[test]
    fn test_failed_resolution_leaves_engine_usable() {
        struct Unregistered;
        let engine = Engine::builder().register::<Point>().build();
        let err = engine
            .converter_for(&TypeRef::Class(ClassId::of::<Unregistered>()))
            .unwrap_err();
        assert!(matches!(err, Error::NoConverter(_)));
        // The failure left no half-built state behind.
        let json = engine.to_string(&Point { x: 5, y: 6 }).unwrap();
        assert_eq!(json, r#"{"x":5,"y":6}"#);
    }

    #[test]
    fn test_empty_document_is_null() {
        let engine = Engine::default();
        let value = engine
            .deserialize_dynamic("", &TypeRef::Dynamic)
            .unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn test_unknown_alias_is_an_error() {
        let engine = Engine::builder()
            .register::<Point>()
            .with_options(EngineOptions::default().with_class_metadata(true))
            .build();
        let err = engine
            .from_str::<Point>(r#"{"@class":"nope","x":1}"#)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownAlias(_)));
    }
}
