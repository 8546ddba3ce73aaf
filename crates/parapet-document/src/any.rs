//! Untyped values: defaults, examples, enum members, and extensions.
//!
//! Values keep the shape the tokenizer produced until a schema hint narrows
//! them with [`coerce`]. Narrowing is best-effort: a value that does not fit
//! the hinted type is kept as-is and a warning is recorded.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use indexmap::IndexMap;
use serde_yaml::Value;

use crate::context::Diagnostic;
use crate::model::{Schema, SchemaType};
use crate::tree::escape_segment;
use crate::writer::SpecWriter;

/// Typed scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    Byte(Vec<u8>),
    Binary(Vec<u8>),
    Password(String),
}

impl Primitive {
    pub fn type_name(&self) -> &'static str {
        match self {
            Primitive::Integer(_) => "integer",
            Primitive::Long(_) => "long",
            Primitive::Float(_) => "float",
            Primitive::Double(_) => "double",
            Primitive::String(_) => "string",
            Primitive::Boolean(_) => "boolean",
            Primitive::Date(_) => "date",
            Primitive::DateTime(_) => "date-time",
            Primitive::Byte(_) => "byte",
            Primitive::Binary(_) => "binary",
            Primitive::Password(_) => "password",
        }
    }

    /// Scalar text as it appeared, or would appear, in the document.
    fn text(&self) -> String {
        match self {
            Primitive::Integer(v) => v.to_string(),
            Primitive::Long(v) => v.to_string(),
            Primitive::Float(v) => v.to_string(),
            Primitive::Double(v) => v.to_string(),
            Primitive::String(v) | Primitive::Password(v) => v.clone(),
            Primitive::Boolean(v) => v.to_string(),
            Primitive::Date(v) => v.format("%Y-%m-%d").to_string(),
            Primitive::DateTime(v) => v.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Primitive::Byte(v) => STANDARD.encode(v),
            Primitive::Binary(v) => String::from_utf8_lossy(v).into_owned(),
        }
    }

    pub fn write(&self, writer: &mut dyn SpecWriter) {
        match self {
            Primitive::Integer(v) => writer.write_i64(i64::from(*v)),
            Primitive::Long(v) => writer.write_i64(*v),
            // Shortest decimal text, so re-reading as f64 and narrowing gives the same bits.
            Primitive::Float(v) => writer.write_f64(v.to_string().parse().unwrap_or(f64::from(*v))),
            Primitive::Double(v) => writer.write_f64(*v),
            Primitive::Boolean(v) => writer.write_bool(*v),
            other => writer.write_string(&other.text()),
        }
    }
}

/// Untyped JSON-like value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AnyValue {
    #[default]
    Null,
    Primitive(Primitive),
    Array(Vec<AnyValue>),
    Object(IndexMap<String, AnyValue>),
}

impl AnyValue {
    pub fn string(value: impl Into<String>) -> Self {
        AnyValue::Primitive(Primitive::String(value.into()))
    }

    pub fn integer(value: i32) -> Self {
        AnyValue::Primitive(Primitive::Integer(value))
    }

    /// Map a tokenized node without any type hint.
    pub fn from_yaml(value: &Value) -> Self {
        match value {
            Value::Null => AnyValue::Null,
            Value::Bool(b) => AnyValue::Primitive(Primitive::Boolean(*b)),
            Value::Number(n) => {
                let primitive = match n.as_i64() {
                    Some(i) => i32::try_from(i)
                        .map(Primitive::Integer)
                        .unwrap_or(Primitive::Long(i)),
                    None => Primitive::Double(n.as_f64().unwrap_or(f64::NAN)),
                };
                AnyValue::Primitive(primitive)
            }
            Value::String(s) => AnyValue::string(s.as_str()),
            Value::Sequence(items) => AnyValue::Array(items.iter().map(Self::from_yaml).collect()),
            Value::Mapping(mapping) => AnyValue::Object(
                mapping
                    .iter()
                    .map(|(k, v)| {
                        let key = match k {
                            Value::String(s) => s.clone(),
                            other => match AnyValue::from_yaml(other) {
                                AnyValue::Primitive(p) => p.text(),
                                _ => String::new(),
                            },
                        };
                        (key, Self::from_yaml(v))
                    })
                    .collect(),
            ),
            Value::Tagged(tagged) => Self::from_yaml(&tagged.value),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AnyValue::Null)
    }

    pub fn as_primitive(&self) -> Option<&Primitive> {
        match self {
            AnyValue::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[AnyValue]> {
        match self {
            AnyValue::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, AnyValue>> {
        match self {
            AnyValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn write(&self, writer: &mut dyn SpecWriter) {
        match self {
            AnyValue::Null => writer.write_null(),
            AnyValue::Primitive(p) => p.write(writer),
            AnyValue::Array(items) => {
                writer.write_start_array();
                for item in items {
                    item.write(writer);
                }
                writer.write_end_array();
            }
            AnyValue::Object(map) => {
                writer.write_start_object();
                for (key, value) in map {
                    writer.write_property_name(key);
                    value.write(writer);
                }
                writer.write_end_object();
            }
        }
    }
}

impl From<Primitive> for AnyValue {
    fn from(value: Primitive) -> Self {
        AnyValue::Primitive(value)
    }
}

/// Narrow `value` to the type implied by `hint`.
///
/// Only primitives change. Arrays follow the hint's inline `items`, objects
/// its inline `properties`. Values that do not fit are returned unchanged and
/// a warning is added at `pointer`.
pub fn coerce(
    value: AnyValue,
    hint: Option<&Schema>,
    pointer: &str,
    diagnostic: &mut Diagnostic,
) -> AnyValue {
    let Some(schema) = hint else {
        return value;
    };
    match value {
        AnyValue::Primitive(primitive) => match narrow(primitive, schema) {
            Ok(narrowed) => AnyValue::Primitive(narrowed),
            Err(original) => {
                diagnostic.warning(
                    pointer,
                    format!(
                        "cannot read {} '{}' as {}",
                        original.type_name(),
                        original.text(),
                        target_name(schema)
                    ),
                );
                AnyValue::Primitive(original)
            }
        },
        AnyValue::Array(items) => {
            let item_hint = schema.items.as_ref().and_then(|slot| slot.as_inline());
            AnyValue::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| coerce(item, item_hint, &format!("{}/{}", pointer, i), diagnostic))
                    .collect(),
            )
        }
        AnyValue::Object(map) => AnyValue::Object(
            map.into_iter()
                .map(|(key, item)| {
                    let item_hint = schema.properties.get(&key).and_then(|slot| slot.as_inline());
                    let item_pointer = format!("{}/{}", pointer, escape_segment(&key));
                    let item = coerce(item, item_hint, &item_pointer, diagnostic);
                    (key, item)
                })
                .collect(),
        ),
        AnyValue::Null => AnyValue::Null,
    }
}

fn target_name(schema: &Schema) -> String {
    match (schema.schema_type, schema.format.as_deref()) {
        (Some(t), Some(format)) => format!("{} ({})", t.display_name(), format),
        (Some(t), None) => t.display_name().to_string(),
        (None, Some(format)) => format.to_string(),
        (None, None) => "untyped".to_string(),
    }
}

/// `Err` hands back the original primitive.
fn narrow(primitive: Primitive, schema: &Schema) -> Result<Primitive, Primitive> {
    let format = schema.format.as_deref();
    match schema.schema_type {
        Some(SchemaType::Integer) => to_integer(primitive, format == Some("int64")),
        Some(SchemaType::Number) => match format {
            Some("float") => to_float(primitive),
            Some("double") => to_double(primitive),
            _ => match primitive {
                Primitive::String(_) => to_double(primitive),
                other => Ok(other),
            },
        },
        Some(SchemaType::Boolean) => match primitive {
            Primitive::Boolean(_) => Ok(primitive),
            Primitive::String(s) => match s.parse() {
                Ok(b) => Ok(Primitive::Boolean(b)),
                Err(_) => Err(Primitive::String(s)),
            },
            other => Err(other),
        },
        Some(SchemaType::String) => to_string_format(primitive, format),
        _ => Ok(primitive),
    }
}

fn to_integer(primitive: Primitive, long: bool) -> Result<Primitive, Primitive> {
    let parsed: Option<i64> = match &primitive {
        Primitive::Integer(v) => Some(i64::from(*v)),
        Primitive::Long(v) => Some(*v),
        Primitive::Double(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => Some(*v as i64),
        Primitive::Float(v) if v.fract() == 0.0 && v.abs() < 1.6e7 => Some(*v as i64),
        Primitive::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    let Some(value) = parsed else {
        return Err(primitive);
    };
    if long {
        return Ok(Primitive::Long(value));
    }
    Ok(i32::try_from(value)
        .map(Primitive::Integer)
        .unwrap_or(Primitive::Long(value)))
}

fn to_double(primitive: Primitive) -> Result<Primitive, Primitive> {
    match primitive {
        Primitive::Integer(v) => Ok(Primitive::Double(f64::from(v))),
        Primitive::Long(v) => Ok(Primitive::Double(v as f64)),
        Primitive::Float(v) => Ok(Primitive::Double(f64::from(v))),
        Primitive::Double(_) => Ok(primitive),
        Primitive::String(s) => match s.trim().parse() {
            Ok(v) => Ok(Primitive::Double(v)),
            Err(_) => Err(Primitive::String(s)),
        },
        other => Err(other),
    }
}

fn to_float(primitive: Primitive) -> Result<Primitive, Primitive> {
    let original = primitive.clone();
    match to_double(primitive) {
        Ok(Primitive::Double(v)) if v.is_finite() && v.abs() <= f64::from(f32::MAX) => {
            Ok(Primitive::Float(v as f32))
        }
        Ok(Primitive::Double(v)) if !v.is_finite() => Ok(Primitive::Float(v as f32)),
        _ => Err(original),
    }
}

fn to_string_format(primitive: Primitive, format: Option<&str>) -> Result<Primitive, Primitive> {
    let text = match primitive {
        Primitive::String(text) => text,
        Primitive::Integer(_)
        | Primitive::Long(_)
        | Primitive::Double(_)
        | Primitive::Float(_)
        | Primitive::Boolean(_)
            if format.is_none() =>
        {
            return Ok(Primitive::String(primitive.text()));
        }
        other => return Ok(other),
    };
    match format {
        Some("date") => NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .map(Primitive::Date)
            .map_err(|_| Primitive::String(text)),
        Some("date-time") => DateTime::parse_from_rfc3339(&text)
            .map(Primitive::DateTime)
            .map_err(|_| Primitive::String(text)),
        Some("byte") => STANDARD
            .decode(text.as_bytes())
            .map(Primitive::Byte)
            .map_err(|_| Primitive::String(text)),
        Some("binary") => Ok(Primitive::Binary(text.into_bytes())),
        Some("password") => Ok(Primitive::Password(text)),
        _ => Ok(Primitive::String(text)),
    }
}
