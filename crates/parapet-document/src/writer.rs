//! Output boundary: an event-style writer and a `serde_yaml::Value` builder.
//!
//! The built value is rendered as YAML or JSON. YAML keeps `.inf` and `.nan`;
//! JSON has no spelling for them, so rendering such a value fails.

use serde_yaml::{Mapping, Number, Value};

use crate::error::WriteError;

/// Event sink the serializer writes through.
pub trait SpecWriter {
    fn write_start_object(&mut self);
    fn write_end_object(&mut self);
    fn write_start_array(&mut self);
    fn write_end_array(&mut self);
    fn write_property_name(&mut self, name: &str);
    fn write_null(&mut self);
    fn write_bool(&mut self, value: bool);
    fn write_i64(&mut self, value: i64);
    fn write_u64(&mut self, value: u64);
    fn write_f64(&mut self, value: f64);
    fn write_string(&mut self, value: &str);
    /// Pre-encoded JSON text, inserted as-is.
    fn write_raw(&mut self, raw: &str);
}

/// Text format of rendered output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl OutputFormat {
    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn render(self, value: &Value) -> Result<String, WriteError> {
        match self {
            OutputFormat::Json => {
                if let Some(number) = non_finite(value) {
                    return Err(WriteError::NonFinite(number));
                }
                Ok(serde_json::to_string_pretty(value)?)
            }
            OutputFormat::Yaml => Ok(serde_yaml::to_string(value)?),
        }
    }
}

/// First NaN or infinity in `value`, depth-first.
fn non_finite(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| !f.is_finite()),
        Value::Sequence(items) => items.iter().find_map(non_finite),
        Value::Mapping(mapping) => mapping.iter().find_map(|(_, v)| non_finite(v)),
        Value::Tagged(tagged) => non_finite(&tagged.value),
        Value::Null | Value::Bool(_) | Value::String(_) => None,
    }
}

enum Frame {
    Object { map: Mapping, key: Option<String> },
    Array(Vec<Value>),
}

/// Builds an ordered `serde_yaml::Value` from writer events.
#[derive(Default)]
pub struct ValueWriter {
    stack: Vec<Frame>,
    root: Option<Value>,
}

impl ValueWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The finished value; `Null` if nothing was written.
    pub fn finish(mut self) -> Value {
        while !self.stack.is_empty() {
            self.close();
        }
        self.root.unwrap_or(Value::Null)
    }

    fn push_value(&mut self, value: Value) {
        match self.stack.last_mut() {
            None => self.root = Some(value),
            Some(Frame::Array(items)) => items.push(value),
            Some(Frame::Object { map, key }) => match key.take() {
                Some(key) => {
                    map.insert(Value::String(key), value);
                }
                None => tracing::warn!("value written without a property name; dropped"),
            },
        }
    }

    fn close(&mut self) {
        let value = match self.stack.pop() {
            Some(Frame::Object { map, .. }) => Value::Mapping(map),
            Some(Frame::Array(items)) => Value::Sequence(items),
            None => return,
        };
        self.push_value(value);
    }
}

impl SpecWriter for ValueWriter {
    fn write_start_object(&mut self) {
        self.stack.push(Frame::Object {
            map: Mapping::new(),
            key: None,
        });
    }

    fn write_end_object(&mut self) {
        self.close();
    }

    fn write_start_array(&mut self) {
        self.stack.push(Frame::Array(Vec::new()));
    }

    fn write_end_array(&mut self) {
        self.close();
    }

    fn write_property_name(&mut self, name: &str) {
        if let Some(Frame::Object { key, .. }) = self.stack.last_mut() {
            *key = Some(name.to_string());
        }
    }

    fn write_null(&mut self) {
        self.push_value(Value::Null);
    }

    fn write_bool(&mut self, value: bool) {
        self.push_value(Value::Bool(value));
    }

    fn write_i64(&mut self, value: i64) {
        self.push_value(Value::Number(Number::from(value)));
    }

    fn write_u64(&mut self, value: u64) {
        self.push_value(Value::Number(Number::from(value)));
    }

    fn write_f64(&mut self, value: f64) {
        self.push_value(Value::Number(Number::from(value)));
    }

    fn write_string(&mut self, value: &str) {
        self.push_value(Value::String(value.to_string()));
    }

    fn write_raw(&mut self, raw: &str) {
        let value = serde_json::from_str::<Value>(raw)
            .unwrap_or_else(|_| Value::String(raw.to_string()));
        self.push_value(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_values_in_order() {
        let mut w = ValueWriter::new();
        w.write_start_object();
        w.write_property_name("zeta");
        w.write_i64(1);
        w.write_property_name("alpha");
        w.write_start_array();
        w.write_bool(true);
        w.write_null();
        w.write_raw(r#"{"raw": [1]}"#);
        w.write_end_array();
        w.write_end_object();

        let value = w.finish();
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"zeta":1,"alpha":[true,null,{"raw":[1]}]}"#
        );
    }

    #[test]
    fn renders_yaml_and_json() {
        let value: Value = serde_yaml::from_str("asyncapi: 2.6.0").unwrap();
        assert!(OutputFormat::Yaml
            .render(&value)
            .unwrap()
            .starts_with("asyncapi:"));
        assert!(OutputFormat::Json.render(&value).unwrap().contains("\"asyncapi\""));
    }

    #[test]
    fn infinities_render_as_yaml_but_not_json() {
        let mut w = ValueWriter::new();
        w.write_start_object();
        w.write_property_name("limit");
        w.write_f64(f64::INFINITY);
        w.write_property_name("size");
        w.write_u64(u64::MAX);
        w.write_end_object();
        let value = w.finish();

        let yaml = OutputFormat::Yaml.render(&value).unwrap();
        assert!(yaml.contains("limit: .inf"), "{yaml}");
        assert!(yaml.contains("size: 18446744073709551615"), "{yaml}");

        let err = OutputFormat::Json.render(&value).unwrap_err();
        assert!(matches!(err, WriteError::NonFinite(v) if v == f64::INFINITY));
    }

    #[test]
    fn output_format_parse() {
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("yml"), Some(OutputFormat::Yaml));
        assert_eq!(OutputFormat::parse("toml"), None);
    }
}
