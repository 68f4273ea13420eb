//! Explicit schema descriptions and a stateless structural validator.
//!
//! Schemas are plain data: a list of named fields, each with a primitive type
//! and a required flag. `validate` checks a JSON object against a schema and
//! reports the first failing constraint. This is a structural/type check, not
//! deep semantic validation — nested object internals are the concern of the
//! typed models in `typed::models`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Primitive types
// =============================================================================

/// Primitive JSON type for a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl PrimitiveType {
    /// Parse a JSON-Schema `type` string. Unknown types are rejected
    /// (conservative: a type we cannot check is a type we do not accept).
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            _ => None,
        }
    }

    /// Check a JSON value against this type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

/// Human-readable type name of a JSON value, for violation messages.
pub fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Schema description
// =============================================================================

/// A single named field in an object schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub ty: PrimitiveType,
    pub required: bool,
}

impl FieldSpec {
    pub fn required(name: &str, ty: PrimitiveType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            required: true,
        }
    }

    pub fn optional(name: &str, ty: PrimitiveType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            required: false,
        }
    }
}

/// Schema for a JSON object: the complete set of permitted fields.
///
/// Properties outside this set are violations — the validator rejects
/// unknown keys rather than ignoring them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSchema {
    pub fields: Vec<FieldSpec>,
}

impl ObjectSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Convert a wire-level JSON Schema object (`properties` + `required`)
    /// into an explicit schema description.
    ///
    /// Properties with a missing or unrecognized `type` are rejected.
    pub fn from_json_schema(schema: &Value) -> Result<Self, String> {
        let obj = schema
            .as_object()
            .ok_or_else(|| "input schema must be a JSON object".to_string())?;

        let required: Vec<&str> = obj
            .get("required")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut fields = Vec::new();
        if let Some(props) = obj.get("properties").and_then(Value::as_object) {
            for (name, prop) in props {
                let ty_name = prop
                    .get("type")
                    .and_then(Value::as_str)
                    .ok_or_else(|| format!("property '{name}' has no type"))?;
                let ty = PrimitiveType::from_wire(ty_name)
                    .ok_or_else(|| format!("property '{name}' has unsupported type '{ty_name}'"))?;
                fields.push(FieldSpec {
                    name: name.clone(),
                    ty,
                    required: required.contains(&name.as_str()),
                });
            }
        }

        Ok(Self { fields })
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Validate a JSON value against an object schema.
///
/// Returns `Err` with the first failing constraint, checked in order:
/// value is an object, required fields present, no unknown fields,
/// present fields type-match.
pub fn validate(schema: &ObjectSchema, value: &Value) -> Result<(), String> {
    let map = value
        .as_object()
        .ok_or_else(|| format!("expected object, got {}", value_type_name(value)))?;

    for field in &schema.fields {
        if field.required && !map.contains_key(&field.name) {
            return Err(format!("missing required field '{}'", field.name));
        }
    }

    for (key, val) in map {
        match schema.field(key) {
            None => return Err(format!("unknown field '{key}'")),
            Some(field) => {
                if !field.ty.matches(val) {
                    return Err(format!(
                        "field '{}' expected {}, got {}",
                        key,
                        field.ty.display_name(),
                        value_type_name(val)
                    ));
                }
            }
        }
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn search_schema() -> ObjectSchema {
        ObjectSchema::new(vec![
            FieldSpec::required("query", PrimitiveType::String),
            FieldSpec::optional("top_k", PrimitiveType::Integer),
        ])
    }

    #[test]
    fn test_valid_object() {
        let schema = search_schema();
        assert!(validate(&schema, &json!({"query": "pii", "top_k": 3})).is_ok());
        assert!(validate(&schema, &json!({"query": "pii"})).is_ok());
    }

    #[test]
    fn test_missing_required() {
        let err = validate(&search_schema(), &json!({"top_k": 3})).unwrap_err();
        assert!(err.contains("missing required field 'query'"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = validate(&search_schema(), &json!({"query": "x", "bogus": 1})).unwrap_err();
        assert!(err.contains("unknown field 'bogus'"));
    }

    #[test]
    fn test_type_mismatch() {
        let err = validate(&search_schema(), &json!({"query": 42})).unwrap_err();
        assert!(err.contains("expected string, got number"));
    }

    #[test]
    fn test_boolean_is_not_integer() {
        let err = validate(&search_schema(), &json!({"query": "x", "top_k": true})).unwrap_err();
        assert!(err.contains("expected integer, got boolean"));
    }

    #[test]
    fn test_non_object_rejected() {
        let err = validate(&search_schema(), &json!([1, 2])).unwrap_err();
        assert!(err.contains("expected object, got array"));
    }

    #[test]
    fn test_first_violation_reported() {
        // Missing required is checked before unknown keys.
        let err = validate(&search_schema(), &json!({"bogus": 1})).unwrap_err();
        assert!(err.contains("missing required field 'query'"));
    }

    #[test]
    fn test_from_json_schema() {
        let wire = json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "top_k": {"type": "integer"}
            },
            "required": ["query"]
        });
        let schema = ObjectSchema::from_json_schema(&wire).unwrap();
        assert_eq!(schema.fields.len(), 2);
        let query = schema.field("query").unwrap();
        assert!(query.required);
        assert_eq!(query.ty, PrimitiveType::String);
        let top_k = schema.field("top_k").unwrap();
        assert!(!top_k.required);
    }

    #[test]
    fn test_from_json_schema_unknown_type_rejected() {
        let wire = json!({
            "properties": {"blob": {"type": "binary"}}
        });
        assert!(ObjectSchema::from_json_schema(&wire).is_err());
    }

    #[test]
    fn test_from_json_schema_empty_properties() {
        let schema = ObjectSchema::from_json_schema(&json!({"type": "object"})).unwrap();
        assert!(schema.fields.is_empty());
        // An empty schema permits only the empty object.
        assert!(validate(&schema, &json!({})).is_ok());
        assert!(validate(&schema, &json!({"x": 1})).is_err());
    }
}
