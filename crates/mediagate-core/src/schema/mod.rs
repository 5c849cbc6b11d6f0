//! Argument schemas
//!
//! Tools declare their arguments as an [`ArgType`] tree. At registration the
//! [`SchemaTranslator`] turns that tree into a [`SchemaNode`], which is both
//! the introspectable description published to callers and the validator the
//! dispatcher runs against raw payloads.

mod node;
mod translate;
mod validate;

pub use node::{NodeKind, SchemaNode};
pub use translate::SchemaTranslator;

use serde_json::Value;
use thiserror::Error;

/// Declared argument shape
#[derive(Debug, Clone, PartialEq)]
pub enum ArgType {
    String,
    Integer,
    Number,
    Boolean,
    /// Closed set of string values
    Enum(Vec<String>),
    Array(Box<ArgType>),
    Object(Vec<Field>),
    /// Any one of several shapes. Rejected at registration.
    Union(Vec<ArgType>),
}

impl ArgType {
    pub fn object(fields: impl IntoIterator<Item = Field>) -> Self {
        ArgType::Object(fields.into_iter().collect())
    }

    pub fn array(items: ArgType) -> Self {
        ArgType::Array(Box::new(items))
    }

    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ArgType::Enum(values.into_iter().map(Into::into).collect())
    }

    /// Short name used in error messages
    pub fn shape_name(&self) -> &'static str {
        match self {
            ArgType::String => "string",
            ArgType::Integer => "integer",
            ArgType::Number => "number",
            ArgType::Boolean => "boolean",
            ArgType::Enum(_) => "enum",
            ArgType::Array(_) => "array",
            ArgType::Object(_) => "object",
            ArgType::Union(_) => "union",
        }
    }
}

/// One named property of an object
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: ArgType,
    pub optional: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
    /// Inclusive lower bound, integer and number fields only
    pub minimum: Option<i64>,
}

impl Field {
    pub fn required(name: impl Into<String>, ty: ArgType) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
            default: None,
            description: None,
            minimum: None,
        }
    }

    pub fn optional(name: impl Into<String>, ty: ArgType) -> Self {
        Self {
            optional: true,
            ..Self::required(name, ty)
        }
    }

    /// Attach a default. A defaulted field is never required.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Reject values below `minimum`. Published as JSON Schema `minimum`.
    pub fn at_least(mut self, minimum: i64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether callers must supply this field
    pub fn is_required(&self) -> bool {
        !self.optional && self.default.is_none()
    }
}

/// Schema translation failures. Always fatal at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("tool arguments must be an object, found {found}")]
    RootNotObject { found: &'static str },

    #[error("unsupported {shape} shape at `{path}`")]
    Unsupported { path: String, shape: &'static str },

    #[error("enum at `{path}` has no values")]
    EmptyEnum { path: String },

    #[error("enum at `{path}` lists `{value}` more than once")]
    DuplicateEnumValue { path: String, value: String },

    #[error("object at `{path}` declares field `{field}` more than once")]
    DuplicateField { path: String, field: String },

    #[error("object at `{path}` has a field with an empty name")]
    EmptyFieldName { path: String },

    #[error("lower bound at `{path}` needs a numeric field, found {shape}")]
    BoundOnNonNumeric { path: String, shape: &'static str },

    #[error("default for `{path}` does not match its type: {reason}")]
    InvalidDefault { path: String, reason: String },
}

/// Dotted path of a property below `parent`
pub(crate) fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

/// Display form of a path, `<root>` for the empty path
pub(crate) fn display_path(path: &str) -> &str {
    if path.is_empty() { "<root>" } else { path }
}
