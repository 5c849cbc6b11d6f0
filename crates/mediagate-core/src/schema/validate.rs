//! Payload validation against a translated schema.
//!
//! Validation never stops at the first problem: every violation in the
//! payload is collected so callers can fix them in one round trip.

use super::{NodeKind, SchemaNode, join_path};
use crate::error::FieldViolation;
use crate::sanitization::truncate_on_char_boundary;
use serde_json::{Map, Value};

/// Longest caller-supplied value or key repeated back in a violation
const MAX_ECHOED_LENGTH: usize = 64;

impl SchemaNode {
    /// Validate a raw payload and return it with defaults filled in.
    ///
    /// A `null` payload is treated as an empty object. An explicit `null` on
    /// an optional property is treated as absent.
    pub fn validate(&self, value: &Value) -> Result<Value, Vec<FieldViolation>> {
        let empty = Value::Object(Map::new());
        let value = match (&self.kind, value) {
            (NodeKind::Object { .. }, Value::Null) => &empty,
            _ => value,
        };
        self.validate_at(value, "")
    }

    pub(crate) fn validate_at(
        &self,
        value: &Value,
        path: &str,
    ) -> Result<Value, Vec<FieldViolation>> {
        let mut violations = Vec::new();
        let normalized = self.check(value, path, &mut violations);
        if violations.is_empty() {
            Ok(normalized)
        } else {
            Err(violations)
        }
    }

    fn check(&self, value: &Value, path: &str, out: &mut Vec<FieldViolation>) -> Value {
        match &self.kind {
            NodeKind::String => {
                if !value.is_string() {
                    out.push(mismatch(path, "string", value));
                }
            }
            NodeKind::Integer => {
                if !(value.is_i64() || value.is_u64()) {
                    out.push(mismatch(path, "integer", value));
                } else {
                    self.check_minimum(value, path, out);
                }
            }
            NodeKind::Number => {
                if !value.is_number() {
                    out.push(mismatch(path, "number", value));
                } else {
                    self.check_minimum(value, path, out);
                }
            }
            NodeKind::Boolean => {
                if !value.is_boolean() {
                    out.push(mismatch(path, "boolean", value));
                }
            }
            NodeKind::Enum { values } => match value.as_str() {
                Some(s) if values.iter().any(|v| v == s) => {}
                Some(s) => out.push(FieldViolation::new(
                    path,
                    format!(
                        "`{}` is not one of: {}",
                        truncate_on_char_boundary(s, MAX_ECHOED_LENGTH),
                        values.join(", ")
                    ),
                )),
                None => out.push(mismatch(path, "string", value)),
            },
            NodeKind::Array { items } => match value.as_array() {
                Some(elements) => {
                    let checked = elements
                        .iter()
                        .enumerate()
                        .map(|(i, element)| items.check(element, &format!("{path}[{i}]"), out))
                        .collect();
                    return Value::Array(checked);
                }
                None => out.push(mismatch(path, "array", value)),
            },
            NodeKind::Object {
                properties,
                required,
            } => match value.as_object() {
                Some(input) => return check_object(properties, required, input, path, out),
                None => out.push(mismatch(path, "object", value)),
            },
        }
        value.clone()
    }

    fn check_minimum(&self, value: &Value, path: &str, out: &mut Vec<FieldViolation>) {
        let Some(minimum) = self.minimum else {
            return;
        };
        // u64 values past i64::MAX fall through to the f64 comparison
        let below = match value.as_i64() {
            Some(n) => n < minimum,
            None => value.as_f64().is_some_and(|n| n < minimum as f64),
        };
        if below {
            out.push(FieldViolation::new(path, format!("must be at least {minimum}")));
        }
    }
}

fn check_object(
    properties: &std::collections::BTreeMap<String, SchemaNode>,
    required: &[String],
    input: &Map<String, Value>,
    path: &str,
    out: &mut Vec<FieldViolation>,
) -> Value {
    let mut normalized = Map::new();

    for (name, node) in properties {
        let field_path = join_path(path, name);
        match input.get(name) {
            Some(value) if !value.is_null() => {
                normalized.insert(name.clone(), node.check(value, &field_path, out));
            }
            _ => {
                if let Some(default) = &node.default {
                    normalized.insert(name.clone(), default.clone());
                } else if required.iter().any(|r| r == name) {
                    out.push(FieldViolation::new(field_path, "missing required field"));
                }
            }
        }
    }

    for key in input.keys() {
        if !properties.contains_key(key) {
            let key = truncate_on_char_boundary(key, MAX_ECHOED_LENGTH);
            out.push(FieldViolation::new(join_path(path, &key), "unknown field"));
        }
    }

    Value::Object(normalized)
}

fn mismatch(path: &str, expected: &str, found: &Value) -> FieldViolation {
    FieldViolation::new(
        path,
        format!("expected {expected}, found {}", json_type_name(found)),
    )
}

fn json_type_name(value: &Value) -> &'static str {
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
