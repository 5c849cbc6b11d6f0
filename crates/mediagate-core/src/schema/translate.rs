use super::{ArgType, Field, NodeKind, SchemaError, SchemaNode, display_path, join_path};
use std::collections::{BTreeMap, BTreeSet};

/// Depth-first translator from declared [`ArgType`]s to [`SchemaNode`]s
pub struct SchemaTranslator;

impl SchemaTranslator {
    /// Translate a tool's argument declaration.
    ///
    /// The root must be an object. Any unsupported shape anywhere in the tree
    /// fails the whole translation; nothing is silently dropped.
    ///
    /// ```rust
    /// use mediagate_core::schema::{ArgType, Field, SchemaTranslator};
    ///
    /// let args = ArgType::object([
    ///     Field::required("prompt", ArgType::String),
    ///     Field::optional("seed", ArgType::Integer),
    ///     Field::required("count", ArgType::Integer).with_default(1),
    /// ]);
    /// let node = SchemaTranslator::translate(&args).unwrap();
    /// assert_eq!(node.required(), ["prompt".to_string()]);
    /// ```
    pub fn translate(root: &ArgType) -> Result<SchemaNode, SchemaError> {
        match root {
            ArgType::Object(_) => Self::node(root, ""),
            other => Err(SchemaError::RootNotObject {
                found: other.shape_name(),
            }),
        }
    }

    fn node(ty: &ArgType, path: &str) -> Result<SchemaNode, SchemaError> {
        let kind = match ty {
            ArgType::String => NodeKind::String,
            ArgType::Integer => NodeKind::Integer,
            ArgType::Number => NodeKind::Number,
            ArgType::Boolean => NodeKind::Boolean,
            ArgType::Enum(values) => {
                if values.is_empty() {
                    return Err(SchemaError::EmptyEnum {
                        path: display_path(path).to_string(),
                    });
                }
                let mut seen = BTreeSet::new();
                for value in values {
                    if !seen.insert(value.as_str()) {
                        return Err(SchemaError::DuplicateEnumValue {
                            path: display_path(path).to_string(),
                            value: value.clone(),
                        });
                    }
                }
                NodeKind::Enum {
                    values: values.clone(),
                }
            }
            ArgType::Array(items) => NodeKind::Array {
                items: Box::new(Self::node(items, &format!("{path}[]"))?),
            },
            ArgType::Object(fields) => Self::object(fields, path)?,
            ArgType::Union(_) => {
                return Err(SchemaError::Unsupported {
                    path: display_path(path).to_string(),
                    shape: ty.shape_name(),
                });
            }
        };
        Ok(SchemaNode::new(kind))
    }

    fn object(fields: &[Field], path: &str) -> Result<NodeKind, SchemaError> {
        let mut properties = BTreeMap::new();
        let mut required = Vec::new();

        for field in fields {
            if field.name.is_empty() {
                return Err(SchemaError::EmptyFieldName {
                    path: display_path(path).to_string(),
                });
            }
            if properties.contains_key(&field.name) {
                return Err(SchemaError::DuplicateField {
                    path: display_path(path).to_string(),
                    field: field.name.clone(),
                });
            }

            let field_path = join_path(path, &field.name);
            let mut child = Self::node(&field.ty, &field_path)?;

            if let Some(minimum) = field.minimum {
                if !matches!(child.kind, NodeKind::Integer | NodeKind::Number) {
                    return Err(SchemaError::BoundOnNonNumeric {
                        path: field_path,
                        shape: field.ty.shape_name(),
                    });
                }
                child.minimum = Some(minimum);
            }

            if let Some(default) = &field.default {
                child.validate_at(default, &field_path).map_err(|violations| {
                    SchemaError::InvalidDefault {
                        path: field_path.clone(),
                        reason: violations
                            .iter()
                            .map(|v| v.message.as_str())
                            .collect::<Vec<_>>()
                            .join("; "),
                    }
                })?;
                child.default = Some(default.clone());
            }
            child.description = field.description.clone();

            if field.is_required() {
                required.push(field.name.clone());
            }
            properties.insert(field.name.clone(), child);
        }

        required.sort();
        Ok(NodeKind::Object {
            properties,
            required,
        })
    }
}
