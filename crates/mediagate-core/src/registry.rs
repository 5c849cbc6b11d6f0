//! Module Registry
//!
//! Built once at startup from the enabled modules and frozen afterwards. The
//! frozen [`ModuleRegistry`] is shared behind an `Arc` and read without locks.
//! Every namespace, name and schema problem is caught by
//! [`RegistryBuilder::register`], so nothing about routing can fail lazily at
//! dispatch time.

use crate::identifiers::{NameValidationError, NameValidator};
use crate::schema::{SchemaError, SchemaTranslator};
use crate::tool::{Module, ToolDescriptor, ToolInfo};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Registration failures. All of them are fatal configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("module `{module}` has invalid prefix `{prefix}`: {source}")]
    InvalidPrefix {
        module: String,
        prefix: String,
        source: NameValidationError,
    },

    #[error("module `{0}` is already registered")]
    DuplicateModule(String),

    #[error("prefix `{prefix}` of module `{module}` overlaps prefix `{other_prefix}` of module `{other}`")]
    PrefixOverlap {
        module: String,
        prefix: String,
        other: String,
        other_prefix: String,
    },

    #[error("module `{0}` declares no tools")]
    EmptyModule(String),

    #[error("invalid tool name `{tool}`: {source}")]
    InvalidToolName {
        tool: String,
        source: NameValidationError,
    },

    #[error("tool `{tool}` is outside the `{prefix}` namespace of module `{module}`")]
    OutsideNamespace {
        tool: String,
        module: String,
        prefix: String,
    },

    #[error("tool `{tool}` is already registered by module `{module}`")]
    DuplicateTool { tool: String, module: String },

    #[error("tool `{tool}` has no handler")]
    MissingHandler { tool: String },

    #[error("invalid schema for tool `{tool}`: {source}")]
    Schema { tool: String, source: SchemaError },
}

/// Registered module summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub prefix: String,
    pub tools: Vec<String>,
}

/// Outcome of a name lookup
#[derive(Debug)]
pub enum Resolution<'a> {
    Found(&'a Arc<ToolDescriptor>),
    /// The name is inside `module`'s namespace but no such tool exists
    UnknownTool { module: &'a str },
    /// No namespace matches the name
    UnknownNamespace,
}

/// Collects modules and validates them before freezing
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    modules: Vec<ModuleInfo>,
    tools: BTreeMap<String, Arc<ToolDescriptor>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one module.
    ///
    /// Everything is checked before anything is inserted: on error the
    /// builder is left exactly as it was.
    pub fn register(&mut self, module: Module) -> Result<(), RegistryError> {
        let Module {
            name,
            prefix,
            tools,
        } = module;

        NameValidator::validate_prefix(&prefix).map_err(|source| RegistryError::InvalidPrefix {
            module: name.clone(),
            prefix: prefix.clone(),
            source,
        })?;

        if self.modules.iter().any(|m| m.name == name) {
            return Err(RegistryError::DuplicateModule(name));
        }

        if let Some(other) = self
            .modules
            .iter()
            .find(|m| m.prefix.starts_with(&prefix) || prefix.starts_with(&m.prefix))
        {
            return Err(RegistryError::PrefixOverlap {
                module: name,
                prefix,
                other: other.name.clone(),
                other_prefix: other.prefix.clone(),
            });
        }

        if tools.is_empty() {
            return Err(RegistryError::EmptyModule(name));
        }

        let mut seen = BTreeSet::new();
        let mut descriptors = Vec::with_capacity(tools.len());
        for spec in tools {
            NameValidator::validate_tool_name(&spec.name).map_err(|source| {
                RegistryError::InvalidToolName {
                    tool: spec.name.clone(),
                    source,
                }
            })?;

            if !spec.name.starts_with(&prefix) || spec.name.len() == prefix.len() {
                return Err(RegistryError::OutsideNamespace {
                    tool: spec.name,
                    module: name,
                    prefix,
                });
            }

            if let Some(existing) = self.tools.get(&spec.name) {
                return Err(RegistryError::DuplicateTool {
                    tool: spec.name,
                    module: existing.module.clone(),
                });
            }
            if !seen.insert(spec.name.clone()) {
                return Err(RegistryError::DuplicateTool {
                    tool: spec.name,
                    module: name,
                });
            }

            let schema =
                SchemaTranslator::translate(&spec.args).map_err(|source| RegistryError::Schema {
                    tool: spec.name.clone(),
                    source,
                })?;
            descriptors.push(ToolDescriptor::from_spec(&name, spec, schema)?);
        }

        info!(
            module = %name,
            prefix = %prefix,
            tools = descriptors.len(),
            "Registered module"
        );

        self.modules.push(ModuleInfo {
            name,
            prefix,
            tools: seen.into_iter().collect(),
        });
        for descriptor in descriptors {
            self.tools
                .insert(descriptor.name.clone(), Arc::new(descriptor));
        }
        Ok(())
    }

    /// Chaining form of [`register`](Self::register)
    pub fn with_module(mut self, module: Module) -> Result<Self, RegistryError> {
        self.register(module)?;
        Ok(self)
    }

    /// Freeze the registry
    pub fn build(self) -> ModuleRegistry {
        let mut namespaces = self.modules;
        namespaces.sort_by(|a, b| {
            b.prefix
                .len()
                .cmp(&a.prefix.len())
                .then_with(|| a.prefix.cmp(&b.prefix))
        });
        ModuleRegistry {
            namespaces,
            tools: self.tools,
        }
    }
}

/// Immutable tool index
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    /// Longest prefix first
    namespaces: Vec<ModuleInfo>,
    tools: BTreeMap<String, Arc<ToolDescriptor>>,
}

impl ModuleRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Longest-prefix namespace match, then exact tool lookup
    pub fn resolve(&self, name: &str) -> Resolution<'_> {
        let Some(namespace) = self
            .namespaces
            .iter()
            .find(|ns| name.starts_with(ns.prefix.as_str()))
        else {
            return Resolution::UnknownNamespace;
        };

        match self.tools.get(name) {
            Some(descriptor) if descriptor.module == namespace.name => {
                Resolution::Found(descriptor)
            }
            _ => Resolution::UnknownTool {
                module: &namespace.name,
            },
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ToolDescriptor>> {
        self.tools.get(name)
    }

    /// Discovery listing, sorted by tool name
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools.values().map(|d| d.info()).collect()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<ToolDescriptor>> {
        self.tools.values()
    }

    /// Registered modules, sorted by name
    pub fn modules(&self) -> Vec<&ModuleInfo> {
        let mut modules: Vec<&ModuleInfo> = self.namespaces.iter().collect();
        modules.sort_by(|a, b| a.name.cmp(&b.name));
        modules
    }

    pub fn module_count(&self) -> usize {
        self.namespaces.len()
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
