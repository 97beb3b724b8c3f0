//! Contextual (per-property) converter resolution.
//!
//! When one property of a structured type needs a different converter than
//! its type's default — the classic case being a single date field encoded
//! with a different pattern or unit than every other date in the graph —
//! the engine offers the property's [`ResolutionContext`] to each
//! registered [`ContextualFactory`] in order. The first factory that
//! recognizes a relevant attribute wins; its converter is used for that
//! declaration site only and never enters the type-level cache. If none
//! applies, the property falls through to ordinary type-level resolution.

use crate::convert::Converter;
use crate::dynamic::Dynamic;
use crate::engine::Engine;
use crate::model::FieldModel;
use crate::read::JsonReader;
use crate::ty::{ClassId, TypeRef};
use crate::write::JsonWriter;
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::sync::Arc;

/// Per-declaration-site metadata handed to contextual factories.
pub struct ResolutionContext<'a> {
    declaring: ClassId,
    field: &'a FieldModel,
}

impl<'a> ResolutionContext<'a> {
    pub(crate) fn new(declaring: ClassId, field: &'a FieldModel) -> Self {
        ResolutionContext { declaring, field }
    }

    /// The type declaring the property.
    #[must_use]
    pub fn declaring(&self) -> ClassId {
        self.declaring
    }

    /// The property descriptor, including its original name and
    /// declaration-site attributes.
    #[must_use]
    pub fn field(&self) -> &FieldModel {
        self.field
    }
}

/// A per-property converter override.
///
/// Returning `Ok(None)` means "no relevant attribute here, ask the next
/// factory"; the property then resolves through the normal type-level path.
pub trait ContextualFactory: Send + Sync {
    /// Produces a converter for this specific declaration site, if this
    /// factory recognizes one of its attributes.
    fn create(
        &self,
        context: &ResolutionContext<'_>,
        engine: &Engine,
    ) -> Result<Option<Arc<dyn Converter>>>;
}

/// Attribute key for a chrono format pattern on a date field.
pub const ATTR_DATE_FORMAT: &str = "format";

/// Attribute key for a numeric date encoding (`millis` or `seconds`).
pub const ATTR_DATE_UNIT: &str = "unit";

/// Built-in contextual factory for per-field date representations.
///
/// Recognizes, on fields declared as [`TypeRef::Date`]:
///
/// - `format = "<chrono pattern>"`: the field is encoded as text in that
///   pattern instead of RFC 3339
/// - `unit = "millis" | "seconds"`: the field is encoded as an integer
///   timestamp in that unit
pub struct DateFormatFactory;

impl ContextualFactory for DateFormatFactory {
    fn create(
        &self,
        context: &ResolutionContext<'_>,
        _engine: &Engine,
    ) -> Result<Option<Arc<dyn Converter>>> {
        if context.field().ty().expand_required() != TypeRef::Date {
            return Ok(None);
        }
        if let Some(unit) = context.field().attrs().get(ATTR_DATE_UNIT) {
            let unit = match unit {
                "millis" => DateUnit::Millis,
                "seconds" => DateUnit::Seconds,
                other => {
                    return Err(Error::custom(format!(
                        "unsupported date unit '{other}' on field '{}'",
                        context.field().original_name()
                    )))
                }
            };
            return Ok(Some(Arc::new(UnitDateConverter { unit })));
        }
        if let Some(pattern) = context.field().attrs().get(ATTR_DATE_FORMAT) {
            return Ok(Some(Arc::new(PatternDateConverter {
                pattern: pattern.to_string(),
            })));
        }
        Ok(None)
    }
}

/// Encodes a date field as text in a custom chrono pattern.
struct PatternDateConverter {
    pattern: String,
}

impl Converter for PatternDateConverter {
    fn serialize(
        &self,
        value: &Dynamic,
        writer: &mut JsonWriter<'_>,
        _engine: &Engine,
    ) -> Result<()> {
        let v = value
            .downcast_ref::<DateTime<Utc>>()
            .ok_or_else(|| Error::bind("DateTime<Utc>", value.type_name()))?;
        writer.string_value(&v.format(&self.pattern).to_string())
    }

    fn deserialize(&self, reader: &mut JsonReader<'_>, _engine: &Engine) -> Result<Dynamic> {
        let text = reader.value_as_string()?;
        let (line, col) = reader.location();
        // Datetime patterns first, then date-only patterns at midnight.
        if let Ok(dt) = DateTime::parse_from_str(&text, &self.pattern) {
            return Ok(Dynamic::new(dt.with_timezone(&Utc)));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(&text, &self.pattern) {
            return Ok(Dynamic::new(naive.and_utc()));
        }
        if let Ok(date) = NaiveDate::parse_from_str(&text, &self.pattern) {
            let naive = date
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| Error::coercion(line, col, "date", &format!("\"{text}\"")))?;
            return Ok(Dynamic::new(naive.and_utc()));
        }
        Err(Error::coercion(
            line,
            col,
            &format!("date matching pattern '{}'", self.pattern),
            &format!("\"{text}\""),
        ))
    }
}

#[derive(Clone, Copy)]
enum DateUnit {
    Millis,
    Seconds,
}

/// Encodes a date field as an integer timestamp.
struct UnitDateConverter {
    unit: DateUnit,
}

impl Converter for UnitDateConverter {
    fn serialize(
        &self,
        value: &Dynamic,
        writer: &mut JsonWriter<'_>,
        _engine: &Engine,
    ) -> Result<()> {
        let v = value
            .downcast_ref::<DateTime<Utc>>()
            .ok_or_else(|| Error::bind("DateTime<Utc>", value.type_name()))?;
        let stamp = match self.unit {
            DateUnit::Millis => v.timestamp_millis(),
            DateUnit::Seconds => v.timestamp(),
        };
        writer.int_value(stamp)
    }

    fn deserialize(&self, reader: &mut JsonReader<'_>, _engine: &Engine) -> Result<Dynamic> {
        let stamp = reader.value_as_i64()?;
        let (line, col) = reader.location();
        let parsed = match self.unit {
            DateUnit::Millis => Utc.timestamp_millis_opt(stamp).single(),
            DateUnit::Seconds => Utc.timestamp_opt(stamp, 0).single(),
        };
        parsed.map(Dynamic::new).ok_or_else(|| {
            Error::coercion(line, col, "timestamp", &stamp.to_string())
        })
    }
}
