//! Typed payload values.
//!
//! MQTT payloads arrive as text. A [`ValueType`] describes how that text is
//! turned into the JSON value held by a twin property:
//!
//! | name          | conversion                                            |
//! |---------------|-------------------------------------------------------|
//! | `int`         | trimmed text as a signed 64-bit integer               |
//! | `double`      | trimmed text as a finite float (`float` is an alias)  |
//! | `boolean`     | `true` (any case) is true, anything else is false     |
//! | `string`      | payload unchanged                                     |
//! | `json-array`  | JSON array, elements coerced by the field type        |
//! | `json-object` | JSON object                                           |

use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Type of a property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    /// Signed integer
    Int,
    /// Floating point number
    Double,
    /// Boolean flag
    Boolean,
    /// Plain text
    String,
    /// JSON array whose elements are coerced to `field_type`, if any
    JsonArray {
        /// Element type; `None` keeps elements unchanged
        field_type: Option<Box<ValueType>>,
    },
    /// JSON object
    JsonObject,
}

impl ValueType {
    /// Resolve a type from its configuration name.
    ///
    /// `field_type` is only consulted for `json-array`. An unrecognised field
    /// type leaves array elements unchanged.
    ///
    /// # Errors
    ///
    /// Returns error if `name` is not a known type.
    pub fn from_name(name: &str, field_type: Option<&str>) -> Result<Self, PayloadError> {
        match name {
            "json-array" => Ok(Self::JsonArray {
                field_type: field_type
                    .and_then(|f| f.parse::<Self>().ok())
                    .map(Box::new),
            }),
            other => other.parse(),
        }
    }

    /// Configuration name of this type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::JsonArray { .. } => "json-array",
            Self::JsonObject => "json-object",
        }
    }

    /// Zero value of this type, used when no initial value is configured.
    #[must_use]
    pub fn default_value(&self) -> Value {
        match self {
            Self::Int => Value::from(0),
            Self::Double => Value::from(0.0),
            Self::Boolean => Value::Bool(false),
            Self::String => Value::String(String::new()),
            Self::JsonArray { .. } => Value::Array(Vec::new()),
            Self::JsonObject => Value::Object(serde_json::Map::new()),
        }
    }

    /// Convert an MQTT payload into a value of this type.
    ///
    /// # Errors
    ///
    /// Returns error if the payload does not fit the type.
    pub fn parse_payload(&self, payload: &str) -> Result<Value, PayloadError> {
        match self {
            Self::Int => payload
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| PayloadError::InvalidInt(payload.to_string())),
            Self::Double => payload
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| PayloadError::InvalidDouble(payload.to_string())),
            Self::Boolean => Ok(Value::Bool(payload.trim().eq_ignore_ascii_case("true"))),
            Self::String => Ok(Value::String(payload.to_string())),
            Self::JsonArray { .. } | Self::JsonObject => {
                let parsed: Value = serde_json::from_str(payload)
                    .map_err(|e| PayloadError::InvalidJson(e.to_string()))?;
                self.coerce(&parsed)
            }
        }
    }

    /// Convert an already-parsed JSON value into a value of this type.
    ///
    /// Scalars are converted through their textual form, so `"25"` coerces
    /// to the integer `25`. A JSON string holding an array or object is parsed
    /// for the structured types.
    ///
    /// # Errors
    ///
    /// Returns error if the value does not fit the type.
    pub fn coerce(&self, value: &Value) -> Result<Value, PayloadError> {
        match self {
            Self::Int | Self::Double | Self::Boolean | Self::String => {
                self.parse_payload(&text_of(value))
            }
            Self::JsonArray { field_type } => {
                let items = match value {
                    Value::Array(items) => items,
                    Value::String(text) => return self.parse_payload(text),
                    other => return Err(PayloadError::NotAnArray(other.to_string())),
                };
                let Some(field_type) = field_type else {
                    return Ok(Value::Array(items.clone()));
                };
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| {
                        field_type
                            .coerce(item)
                            .map_err(|source| PayloadError::Element {
                                index,
                                source: Box::new(source),
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            Self::JsonObject => match value {
                Value::Object(_) => Ok(value.clone()),
                Value::String(text) => self.parse_payload(text),
                other => Err(PayloadError::NotAnObject(other.to_string())),
            },
        }
    }
}

impl FromStr for ValueType {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int" => Ok(Self::Int),
            "double" | "float" => Ok(Self::Double),
            "boolean" => Ok(Self::Boolean),
            "string" => Ok(Self::String),
            "json-array" => Ok(Self::JsonArray { field_type: None }),
            "json-object" => Ok(Self::JsonObject),
            other => Err(PayloadError::UnknownType(other.to_string())),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JsonArray {
                field_type: Some(field_type),
            } => write!(f, "json-array<{field_type}>"),
            other => f.write_str(other.name()),
        }
    }
}

/// Textual form of a JSON value: string content, or JSON text otherwise.
#[must_use]
pub fn text_of(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Errors converting payloads into typed values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PayloadError {
    /// Unknown type name
    #[error("unknown value type: {0}")]
    UnknownType(String),
    /// Payload is not an integer
    #[error("invalid int payload: {0:?}")]
    InvalidInt(String),
    /// Payload is not a finite number
    #[error("invalid double payload: {0:?}")]
    InvalidDouble(String),
    /// Payload is not valid JSON
    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),
    /// Value is not a JSON array
    #[error("expected JSON array, got {0}")]
    NotAnArray(String),
    /// Value is not a JSON object
    #[error("expected JSON object, got {0}")]
    NotAnObject(String),
    /// An array element could not be coerced
    #[error("array element {index}: {source}")]
    Element {
        /// Index of the failing element
        index: usize,
        /// Underlying failure
        source: Box<PayloadError>,
    },
    /// Payload is not UTF-8 text
    #[error("payload is not valid UTF-8")]
    NotUtf8,
    /// Failure reported by a custom conversion
    #[error("{0}")]
    Custom(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_payloads() {
        assert_eq!(ValueType::Int.parse_payload(" 42 ").unwrap(), json!(42));
        assert_eq!(ValueType::Double.parse_payload("21.5").unwrap(), json!(21.5));
        assert_eq!(
            ValueType::String.parse_payload(" raw ").unwrap(),
            json!(" raw ")
        );
        assert!(matches!(
            ValueType::Int.parse_payload("4.2"),
            Err(PayloadError::InvalidInt(_))
        ));
        assert!(matches!(
            ValueType::Double.parse_payload("NaN"),
            Err(PayloadError::InvalidDouble(_))
        ));
    }

    #[test]
    fn boolean_is_lenient() {
        assert_eq!(ValueType::Boolean.parse_payload("TRUE").unwrap(), json!(true));
        assert_eq!(ValueType::Boolean.parse_payload("yes").unwrap(), json!(false));
    }

    #[test]
    fn float_is_alias_for_double() {
        assert_eq!("float".parse::<ValueType>().unwrap(), ValueType::Double);
        assert!(matches!(
            "decimal".parse::<ValueType>(),
            Err(PayloadError::UnknownType(_))
        ));
    }

    #[test]
    fn json_array_coerces_elements() {
        let ty = ValueType::from_name("json-array", Some("int")).unwrap();
        assert_eq!(ty.parse_payload(r#"[1, "2", 3]"#).unwrap(), json!([1, 2, 3]));

        let err = ty.parse_payload(r#"[1, "two"]"#).unwrap_err();
        assert!(matches!(err, PayloadError::Element { index: 1, .. }));
    }

    #[test]
    fn json_array_unknown_field_type_passes_through() {
        let ty = ValueType::from_name("json-array", Some("matrix")).unwrap();
        assert_eq!(ty, ValueType::JsonArray { field_type: None });
        assert_eq!(
            ty.parse_payload(r#"[{"a": 1}, true]"#).unwrap(),
            json!([{"a": 1}, true])
        );
    }

    #[test]
    fn json_object_rejects_other_shapes() {
        assert_eq!(
            ValueType::JsonObject.parse_payload(r#"{"x": 1}"#).unwrap(),
            json!({"x": 1})
        );
        assert!(matches!(
            ValueType::JsonObject.parse_payload("[1]"),
            Err(PayloadError::NotAnObject(_))
        ));
        assert!(matches!(
            ValueType::JsonObject.parse_payload("{"),
            Err(PayloadError::InvalidJson(_))
        ));
    }

    #[test]
    fn coerce_configured_values() {
        assert_eq!(ValueType::Int.coerce(&json!(7)).unwrap(), json!(7));
        assert_eq!(ValueType::Double.coerce(&json!(7)).unwrap(), json!(7.0));
        assert_eq!(ValueType::String.coerce(&json!("on")).unwrap(), json!("on"));
        assert_eq!(ValueType::String.coerce(&json!(12)).unwrap(), json!("12"));
        assert_eq!(
            ValueType::JsonObject.coerce(&json!(r#"{"k": "v"}"#)).unwrap(),
            json!({"k": "v"})
        );
    }

    #[test]
    fn default_values_fit_their_type() {
        for name in ["int", "double", "boolean", "string", "json-array", "json-object"] {
            let ty: ValueType = name.parse().unwrap();
            let zero = ty.default_value();
            assert_eq!(ty.coerce(&zero).unwrap(), zero, "{name}");
        }
    }

    #[test]
    fn display_includes_field_type() {
        let ty = ValueType::from_name("json-array", Some("double")).unwrap();
        assert_eq!(ty.to_string(), "json-array<double>");
        assert_eq!(ValueType::JsonObject.to_string(), "json-object");
    }
}
