//! Converters: the serialize/deserialize unit for one resolved type.
//!
//! A [`Converter`] is a pure function between dynamic values and the token
//! protocol; it holds no engine-global state beyond what was injected at
//! construction. Converters come in two shapes:
//!
//! - **terminal**: fully implement behavior themselves (the scalar and
//!   container converters in this module)
//! - **decorating**: wrap exactly one inner converter and add one
//!   cross-cutting behavior ([`NullConverter`] here; the polymorphism and
//!   runtime-type wrappers live with the engine)
//!
//! ## Contract
//!
//! `deserialize` is called with the reader already advanced onto a value
//! (`next()` was called by the enclosing context); `serialize` is called
//! with the writer ready for a value (any member name already queued).
//! Null handling is not a converter's job unless it opts in via
//! [`Converter::handles_null`]: the resolution engine wraps everything else
//! in [`NullConverter`], so exactly one place decides what `null` means.

use crate::dynamic::{Dynamic, ObjectMap, Sequence};
use crate::engine::Engine;
use crate::read::{JsonNumber, JsonReader};
use crate::token::TokenKind;
use crate::write::JsonWriter;
use crate::{Error, Result, TypeRef};
use chrono::{DateTime, SecondsFormat, Utc};
use num_bigint::BigInt;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// The serialize/deserialize unit for one resolved type.
///
/// Instances are immutable after construction, shared behind `Arc`, and
/// cached by the engine per [`TypeRef`] for the engine's lifetime.
pub trait Converter: Send + Sync {
    /// Writes `value` to the token stream.
    fn serialize(&self, value: &Dynamic, writer: &mut JsonWriter<'_>, engine: &Engine)
        -> Result<()>;

    /// Reads one value from the token stream.
    fn deserialize(&self, reader: &mut JsonReader<'_>, engine: &Engine) -> Result<Dynamic>;

    /// Whether this converter handles `null` itself. When `false` the
    /// engine wraps it in [`NullConverter`].
    fn handles_null(&self) -> bool {
        false
    }
}

impl fmt::Debug for dyn Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Converter { .. }")
    }
}

/// Terminal converter for `bool`.
pub struct BoolConverter;

impl Converter for BoolConverter {
    fn serialize(
        &self,
        value: &Dynamic,
        writer: &mut JsonWriter<'_>,
        _engine: &Engine,
    ) -> Result<()> {
        let v = value
            .downcast_ref::<bool>()
            .ok_or_else(|| Error::bind("bool", value.type_name()))?;
        writer.bool_value(*v)
    }

    fn deserialize(&self, reader: &mut JsonReader<'_>, _engine: &Engine) -> Result<Dynamic> {
        Ok(Dynamic::new(reader.value_as_bool()?))
    }
}

/// Terminal converter for 64-bit integers.
pub struct IntConverter;

impl Converter for IntConverter {
    fn serialize(
        &self,
        value: &Dynamic,
        writer: &mut JsonWriter<'_>,
        _engine: &Engine,
    ) -> Result<()> {
        let v = value
            .downcast_ref::<i64>()
            .ok_or_else(|| Error::bind("i64", value.type_name()))?;
        writer.int_value(*v)
    }

    fn deserialize(&self, reader: &mut JsonReader<'_>, _engine: &Engine) -> Result<Dynamic> {
        Ok(Dynamic::new(reader.value_as_i64()?))
    }
}

/// Terminal converter for 64-bit floats.
pub struct FloatConverter;

impl Converter for FloatConverter {
    fn serialize(
        &self,
        value: &Dynamic,
        writer: &mut JsonWriter<'_>,
        _engine: &Engine,
    ) -> Result<()> {
        let v = value
            .downcast_ref::<f64>()
            .ok_or_else(|| Error::bind("f64", value.type_name()))?;
        writer.float_value(*v)
    }

    fn deserialize(&self, reader: &mut JsonReader<'_>, _engine: &Engine) -> Result<Dynamic> {
        Ok(Dynamic::new(reader.value_as_f64()?))
    }
}

/// Terminal converter for strings.
pub struct StringConverter;

impl Converter for StringConverter {
    fn serialize(
        &self,
        value: &Dynamic,
        writer: &mut JsonWriter<'_>,
        _engine: &Engine,
    ) -> Result<()> {
        let v = value
            .downcast_ref::<String>()
            .ok_or_else(|| Error::bind("String", value.type_name()))?;
        writer.string_value(v)
    }

    fn deserialize(&self, reader: &mut JsonReader<'_>, _engine: &Engine) -> Result<Dynamic> {
        Ok(Dynamic::new(reader.value_as_string()?))
    }
}

/// Terminal converter for arbitrary-precision integers.
pub struct BigIntConverter;

impl Converter for BigIntConverter {
    fn serialize(
        &self,
        value: &Dynamic,
        writer: &mut JsonWriter<'_>,
        _engine: &Engine,
    ) -> Result<()> {
        let v = value
            .downcast_ref::<BigInt>()
            .ok_or_else(|| Error::bind("BigInt", value.type_name()))?;
        writer.big_int_value(v)
    }

    fn deserialize(&self, reader: &mut JsonReader<'_>, _engine: &Engine) -> Result<Dynamic> {
        Ok(Dynamic::new(reader.value_as_big_int()?))
    }
}

/// Terminal converter for timestamps, encoded as RFC 3339 text.
///
/// Per-field representations (custom patterns, numeric units) come from the
/// contextual date-format factory instead.
pub struct DateConverter;

impl Converter for DateConverter {
    fn serialize(
        &self,
        value: &Dynamic,
        writer: &mut JsonWriter<'_>,
        _engine: &Engine,
    ) -> Result<()> {
        let v = value
            .downcast_ref::<DateTime<Utc>>()
            .ok_or_else(|| Error::bind("DateTime<Utc>", value.type_name()))?;
        writer.string_value(&v.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    fn deserialize(&self, reader: &mut JsonReader<'_>, _engine: &Engine) -> Result<Dynamic> {
        let text = reader.value_as_string()?;
        let (line, col) = reader.location();
        let parsed = DateTime::parse_from_rfc3339(&text)
            .map_err(|_| Error::coercion(line, col, "RFC 3339 date", &format!("\"{text}\"")))?;
        Ok(Dynamic::new(parsed.with_timezone(&Utc)))
    }
}

/// Terminal converter for homogeneous sequences.
pub struct SeqConverter {
    element: Arc<dyn Converter>,
}

impl SeqConverter {
    pub fn new(element: Arc<dyn Converter>) -> Self {
        SeqConverter { element }
    }
}

impl Converter for SeqConverter {
    fn serialize(
        &self,
        value: &Dynamic,
        writer: &mut JsonWriter<'_>,
        engine: &Engine,
    ) -> Result<()> {
        let seq = value
            .downcast_ref::<Sequence>()
            .ok_or_else(|| Error::bind("sequence", value.type_name()))?;
        writer.begin_array()?;
        for element in &seq.0 {
            self.element.serialize(element, writer, engine)?;
        }
        writer.end_array()
    }

    fn deserialize(&self, reader: &mut JsonReader<'_>, engine: &Engine) -> Result<Dynamic> {
        reader.begin_array()?;
        let mut elements = Vec::new();
        while reader.has_next()? {
            reader.next()?;
            elements.push(self.element.deserialize(reader, engine)?);
        }
        reader.end_array()?;
        Ok(Dynamic::new(Sequence(elements)))
    }
}

/// Terminal converter for string-keyed maps with homogeneous values.
pub struct MapConverter {
    value: Arc<dyn Converter>,
}

impl MapConverter {
    pub fn new(value: Arc<dyn Converter>) -> Self {
        MapConverter { value }
    }
}

impl Converter for MapConverter {
    fn serialize(
        &self,
        value: &Dynamic,
        writer: &mut JsonWriter<'_>,
        engine: &Engine,
    ) -> Result<()> {
        let map = value
            .downcast_ref::<ObjectMap>()
            .ok_or_else(|| Error::bind("object map", value.type_name()))?;
        writer.begin_object()?;
        for (key, entry) in &map.0 {
            writer.name(key)?;
            self.value.serialize(entry, writer, engine)?;
        }
        writer.end_object()
    }

    fn deserialize(&self, reader: &mut JsonReader<'_>, engine: &Engine) -> Result<Dynamic> {
        reader.begin_object()?;
        let mut map = ObjectMap::default();
        while reader.has_next()? {
            reader.next()?;
            let key = reader.name()?.to_string();
            map.0.insert(key, self.value.deserialize(reader, engine)?);
        }
        reader.end_object()?;
        Ok(Dynamic::new(map))
    }
}

/// Terminal converter for the top type: reads any JSON value into its
/// dynamic shape and writes dynamic values by their runtime type tag.
pub struct DynamicConverter;

impl Converter for DynamicConverter {
    fn serialize(
        &self,
        value: &Dynamic,
        writer: &mut JsonWriter<'_>,
        engine: &Engine,
    ) -> Result<()> {
        if value.is_null() {
            return writer.null_value();
        }
        if let Some(v) = value.downcast_ref::<bool>() {
            return writer.bool_value(*v);
        }
        if let Some(v) = value.downcast_ref::<i64>() {
            return writer.int_value(*v);
        }
        if let Some(v) = value.downcast_ref::<f64>() {
            return writer.float_value(*v);
        }
        if let Some(v) = value.downcast_ref::<String>() {
            return writer.string_value(v);
        }
        if let Some(v) = value.downcast_ref::<BigInt>() {
            return writer.big_int_value(v);
        }
        if value.is::<DateTime<Utc>>() {
            return DateConverter.serialize(value, writer, engine);
        }
        if let Some(seq) = value.downcast_ref::<Sequence>() {
            writer.begin_array()?;
            for element in &seq.0 {
                self.serialize(element, writer, engine)?;
            }
            return writer.end_array();
        }
        if let Some(map) = value.downcast_ref::<ObjectMap>() {
            writer.begin_object()?;
            for (key, entry) in &map.0 {
                writer.name(key)?;
                self.serialize(entry, writer, engine)?;
            }
            return writer.end_object();
        }
        // Registered structured value behind a dynamic slot.
        match engine.runtime_type_of(value) {
            Some(ty) => engine.converter_for(&ty)?.serialize(value, writer, engine),
            None => Err(Error::no_converter(value.type_name())),
        }
    }

    fn deserialize(&self, reader: &mut JsonReader<'_>, engine: &Engine) -> Result<Dynamic> {
        let kind = reader
            .value_kind()
            .ok_or_else(|| Error::custom("no value to read; call next() first"))?;
        match kind {
            TokenKind::Null => {
                reader.value_as_null()?;
                Ok(Dynamic::null())
            }
            TokenKind::Boolean => Ok(Dynamic::new(reader.value_as_bool()?)),
            TokenKind::Integer | TokenKind::Float => Ok(match reader.value_as_number()? {
                JsonNumber::Int(v) => Dynamic::new(v),
                JsonNumber::Big(v) => Dynamic::new(v),
                JsonNumber::Float(v) => Dynamic::new(v),
            }),
            TokenKind::String => Ok(Dynamic::new(reader.value_as_string()?)),
            TokenKind::BeginArray => {
                reader.begin_array()?;
                let mut elements = Vec::new();
                while reader.has_next()? {
                    reader.next()?;
                    elements.push(self.deserialize(reader, engine)?);
                }
                reader.end_array()?;
                Ok(Dynamic::new(Sequence(elements)))
            }
            TokenKind::BeginObject => {
                if engine.options().class_metadata {
                    if let Some(alias) = reader.metadata("class")?.map(str::to_string) {
                        let target = engine.class_for_alias(&alias)?;
                        return engine
                            .converter_for(&crate::TypeRef::Class(target))?
                            .deserialize(reader, engine);
                    }
                }
                reader.begin_object()?;
                let mut map = ObjectMap::default();
                while reader.has_next()? {
                    reader.next()?;
                    let key = reader.name()?.to_string();
                    map.0.insert(key, self.deserialize(reader, engine)?);
                }
                reader.end_object()?;
                Ok(Dynamic::new(map))
            }
            TokenKind::Eof => Ok(Dynamic::null()),
        }
    }

    fn handles_null(&self) -> bool {
        true
    }
}

/// Decorating converter owning all null handling.
///
/// On write, a null value becomes a single `null_value` call (which the
/// writer may turn into an omitted member in skip-null mode). On read, a
/// null token short-circuits without invoking the inner converter: nullable
/// slots yield the null marker, primitive slots yield their zero value.
pub struct NullConverter {
    inner: Arc<dyn Converter>,
    declared: TypeRef,
}

impl NullConverter {
    pub fn new(inner: Arc<dyn Converter>, declared: TypeRef) -> Self {
        NullConverter { inner, declared }
    }

    fn null_result(&self) -> Dynamic {
        match self.declared {
            TypeRef::Int => Dynamic::new(0i64),
            TypeRef::Float => Dynamic::new(0.0f64),
            TypeRef::Bool => Dynamic::new(false),
            _ => Dynamic::null(),
        }
    }
}

impl Converter for NullConverter {
    fn serialize(
        &self,
        value: &Dynamic,
        writer: &mut JsonWriter<'_>,
        engine: &Engine,
    ) -> Result<()> {
        if value.is_null() {
            writer.null_value()
        } else {
            self.inner.serialize(value, writer, engine)
        }
    }

    fn deserialize(&self, reader: &mut JsonReader<'_>, engine: &Engine) -> Result<Dynamic> {
        if reader.value_kind() == Some(TokenKind::Null) {
            reader.value_as_null()?;
            Ok(self.null_result())
        } else {
            self.inner.deserialize(reader, engine)
        }
    }

    fn handles_null(&self) -> bool {
        true
    }
}

/// Placeholder converter registered in the construction-guard registry
/// while a self-referential type's converter is being built; patched to the
/// finished converter once construction completes.
pub(crate) struct ProxyConverter {
    inner: OnceLock<Arc<dyn Converter>>,
}

impl ProxyConverter {
    pub(crate) fn new() -> Self {
        ProxyConverter {
            inner: OnceLock::new(),
        }
    }

    pub(crate) fn fill(&self, converter: Arc<dyn Converter>) {
        // A second fill can only happen if the same type is resolved twice
        // on one call stack, which the guard registry prevents.
        let _ = self.inner.set(converter);
    }

    fn get(&self) -> Result<&Arc<dyn Converter>> {
        self.inner
            .get()
            .ok_or_else(|| Error::custom("converter used before its construction completed"))
    }
}

impl Converter for ProxyConverter {
    fn serialize(
        &self,
        value: &Dynamic,
        writer: &mut JsonWriter<'_>,
        engine: &Engine,
    ) -> Result<()> {
        self.get()?.serialize(value, writer, engine)
    }

    fn deserialize(&self, reader: &mut JsonReader<'_>, engine: &Engine) -> Result<Dynamic> {
        self.get()?.deserialize(reader, engine)
    }

    fn handles_null(&self) -> bool {
        // The finished converter is always null-wrapped already.
        true
    }
}
