//! Argument schemas for tools
//!
//! A schema maps parameter names to primitive JSON types. It is used twice:
//! to validate arguments before a handler runs, and to render the JSON-Schema
//! object sent to the model.
//!
//! Schemas parsed from a remote JSON-Schema keep that document and render it
//! unchanged. Parameters with richer types (arrays, objects, unions) are only
//! checked for presence.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Primitive parameter types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    /// Any JSON value; only presence is checked
    Any,
}

impl ParamType {
    /// JSON-Schema type name
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Any => "any",
        }
    }

    /// Parse a JSON-Schema type name
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(ParamType::String),
            "integer" => Some(ParamType::Integer),
            "number" => Some(ParamType::Number),
            "boolean" => Some(ParamType::Boolean),
            _ => None,
        }
    }

    /// Whether `value` has this type
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Any => true,
        }
    }
}

/// Declaration of a single parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub kind: ParamType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Mapping of parameter name to declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArgumentSchema {
    params: BTreeMap<String, ParamSpec>,
    /// JSON-Schema this was parsed from, sent to the model as-is
    #[serde(skip)]
    source: Option<Value>,
}

impl ArgumentSchema {
    /// Create an empty schema (tool takes no arguments)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required parameter
    pub fn required(self, name: impl Into<String>, kind: ParamType) -> Self {
        self.param(name, kind, true, None)
    }

    /// Add an optional parameter
    pub fn optional(self, name: impl Into<String>, kind: ParamType) -> Self {
        self.param(name, kind, false, None)
    }

    /// Add a parameter with a description
    pub fn param(
        mut self,
        name: impl Into<String>,
        kind: ParamType,
        required: bool,
        description: Option<&str>,
    ) -> Self {
        self.source = None;
        self.params.insert(
            name.into(),
            ParamSpec {
                kind,
                required,
                description: description.map(str::to_string),
            },
        );
        self
    }

    /// Build a schema from a JSON-Schema object
    ///
    /// Primitive property types are validated. Anything else (arrays, objects,
    /// type unions such as `["string", "null"]`) becomes `ParamType::Any`,
    /// so required ones are still enforced by presence.
    pub fn from_json_schema(schema: &Value) -> Self {
        let required: Vec<&str> = schema
            .get("required")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        let mut result = Self::new();
        if let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) {
            for (name, prop) in properties {
                let kind = prop
                    .get("type")
                    .and_then(|t| t.as_str())
                    .and_then(ParamType::parse)
                    .unwrap_or_else(|| {
                        tracing::debug!(
                            "[ArgumentSchema] Parameter '{}' has a non-primitive type, checking presence only",
                            name
                        );
                        ParamType::Any
                    });
                let description = prop.get("description").and_then(|d| d.as_str());
                result = result.param(
                    name.clone(),
                    kind,
                    required.contains(&name.as_str()),
                    description,
                );
            }
        }
        result.source = Some(schema.clone());
        result
    }

    /// Iterate over declared parameters
    pub fn params(&self) -> impl Iterator<Item = (&str, &ParamSpec)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Validate arguments, returning a human-readable reason on mismatch
    ///
    /// Undeclared extra arguments are accepted.
    pub fn validate(&self, arguments: &Value) -> Result<(), String> {
        let empty = Map::new();
        let object = match arguments {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => return Err(format!("arguments must be an object, got {}", type_name(other))),
        };

        for (name, spec) in &self.params {
            match object.get(name) {
                Some(Value::Null) if spec.kind == ParamType::Any => {}
                None | Some(Value::Null) if spec.required => {
                    return Err(format!("missing required parameter '{}'", name));
                }
                None | Some(Value::Null) => {}
                Some(value) if !spec.kind.matches(value) => {
                    return Err(format!(
                        "parameter '{}' must be {}, got {}",
                        name,
                        spec.kind.as_str(),
                        type_name(value)
                    ));
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    /// Render as a JSON-Schema object
    pub fn to_json_schema(&self) -> Value {
        if let Some(source) = &self.source {
            return source.clone();
        }

        let mut properties = Map::new();
        let mut required = Vec::new();

        for (name, spec) in &self.params {
            let mut prop = match spec.kind {
                ParamType::Any => json!({}),
                kind => json!({ "type": kind.as_str() }),
            };
            if let Some(description) = &spec.description {
                prop["description"] = Value::String(description.clone());
            }
            properties.insert(name.clone(), prop);
            if spec.required {
                required.push(Value::String(name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
