use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Translated, introspectable argument schema
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: NodeKind,
    pub description: Option<String>,
    pub default: Option<Value>,
    pub minimum: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    String,
    Integer,
    Number,
    Boolean,
    Enum {
        values: Vec<String>,
    },
    Array {
        items: Box<SchemaNode>,
    },
    Object {
        properties: BTreeMap<String, SchemaNode>,
        /// Sorted names of required properties
        required: Vec<String>,
    },
}

impl SchemaNode {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            description: None,
            default: None,
            minimum: None,
        }
    }

    /// Required property names of an object node, empty for anything else
    pub fn required(&self) -> &[String] {
        match &self.kind {
            NodeKind::Object { required, .. } => required,
            _ => &[],
        }
    }

    /// Child node of an object by property name
    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        match &self.kind {
            NodeKind::Object { properties, .. } => properties.get(name),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            NodeKind::String | NodeKind::Enum { .. } => "string",
            NodeKind::Integer => "integer",
            NodeKind::Number => "number",
            NodeKind::Boolean => "boolean",
            NodeKind::Array { .. } => "array",
            NodeKind::Object { .. } => "object",
        }
    }

    /// Render as a JSON Schema document.
    ///
    /// Objects are closed (`additionalProperties: false`) to match the
    /// validator, which rejects unknown fields.
    pub fn to_json_schema(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".into(), json!(self.type_name()));

        match &self.kind {
            NodeKind::Enum { values } => {
                out.insert("enum".into(), json!(values));
            }
            NodeKind::Array { items } => {
                out.insert("items".into(), items.to_json_schema());
            }
            NodeKind::Object {
                properties,
                required,
            } => {
                let props: Map<String, Value> = properties
                    .iter()
                    .map(|(name, node)| (name.clone(), node.to_json_schema()))
                    .collect();
                out.insert("properties".into(), Value::Object(props));
                out.insert("required".into(), json!(required));
                out.insert("additionalProperties".into(), json!(false));
            }
            NodeKind::String | NodeKind::Integer | NodeKind::Number | NodeKind::Boolean => {}
        }

        if let Some(description) = &self.description {
            out.insert("description".into(), json!(description));
        }
        if let Some(default) = &self.default {
            out.insert("default".into(), default.clone());
        }
        if let Some(minimum) = self.minimum {
            out.insert("minimum".into(), json!(minimum));
        }

        Value::Object(out)
    }
}
