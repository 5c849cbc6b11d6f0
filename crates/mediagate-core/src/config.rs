//! Gateway configuration
//!
//! Sources, later ones winning: built-in defaults, an optional TOML file,
//! `MEDIAGATE_*` environment variables, then whatever the CLI overrides.
//! [`GatewayConfig::validate`] runs last; an invalid configuration is fatal
//! at startup.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `MEDIAGATE_TRANSPORT` | `stdio` |
//! | `MEDIAGATE_HTTP_ADDR` | `127.0.0.1:8787` |
//! | `MEDIAGATE_INVOCATION_DEADLINE` | `120s` |
//! | `MEDIAGATE_MODULE_<NAME>_ENABLED` | `true` |
//! | `MEDIAGATE_POLL_<CLASS>_INTERVAL` | `2s` image, `10s` video |
//! | `MEDIAGATE_POLL_<CLASS>_MAX_WAIT` | `90s` image, `600s` video |
//! | `MEDIAGATE_LOG_FORMAT` | `json` |
//! | `MEDIAGATE_LOG_FILTER` | `info` |

use crate::dispatcher::{DEFAULT_INVOCATION_DEADLINE, DispatchConfig};
use crate::jobs::{OperationClass, PollPolicy};
use mediagate_observability::{LogFormat, LoggingConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const ENV_PREFIX: &str = "MEDIAGATE_";

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid environment variable '{key}': {message}")]
    InvalidEnvVar { key: String, message: String },

    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Which transport binding to start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportSelection {
    #[default]
    Stdio,
    Http,
}

impl FromStr for TransportSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(TransportSelection::Stdio),
            "http" => Ok(TransportSelection::Http),
            other => Err(format!("unknown transport `{other}` (expected `stdio` or `http`)")),
        }
    }
}

impl fmt::Display for TransportSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportSelection::Stdio => f.write_str("stdio"),
            TransportSelection::Http => f.write_str("http"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    pub kind: TransportSelection,
    pub http_addr: SocketAddr,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportSelection::Stdio,
            http_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModuleSettings {
    pub enabled: bool,
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollingConfig {
    pub image: PollPolicy,
    pub video: PollPolicy,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            image: PollPolicy::default_for(OperationClass::Image),
            video: PollPolicy::default_for(OperationClass::Video),
        }
    }
}

impl PollingConfig {
    pub fn policy(&self, class: OperationClass) -> PollPolicy {
        match class {
            OperationClass::Image => self.image,
            OperationClass::Video => self.video,
        }
    }

    fn policy_mut(&mut self, class: OperationClass) -> &mut PollPolicy {
        match class {
            OperationClass::Image => &mut self.image,
            OperationClass::Video => &mut self.video,
        }
    }
}

/// Complete gateway configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    pub transport: TransportConfig,
    #[serde(with = "crate::duration::human")]
    pub invocation_deadline: Duration,
    /// Per-module settings keyed by module name; absent modules are enabled
    pub modules: BTreeMap<String, ModuleSettings>,
    pub polling: PollingConfig,
    pub logging: LoggingConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            invocation_deadline: DEFAULT_INVOCATION_DEADLINE,
            modules: BTreeMap::new(),
            polling: PollingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Defaults, then `path` if given, then the process environment.
    /// The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_from(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Apply `MEDIAGATE_*` overrides from `vars`. Unrelated variables are
    /// ignored; a malformed value for a known variable is an error.
    pub fn apply_env_from<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "TRANSPORT" => {
                    self.transport.kind = value
                        .parse()
                        .map_err(|message| invalid(&key, message))?;
                }
                "HTTP_ADDR" => {
                    self.transport.http_addr = value
                        .trim()
                        .parse()
                        .map_err(|e| invalid(&key, format!("invalid socket address: {e}")))?;
                }
                "INVOCATION_DEADLINE" => {
                    self.invocation_deadline = parse_duration(&key, &value)?;
                }
                "LOG_FORMAT" => {
                    self.logging.format = value
                        .parse::<LogFormat>()
                        .map_err(|e| invalid(&key, e.to_string()))?;
                }
                "LOG_FILTER" => self.logging.filter = value,
                other => {
                    if let Some(module) = other
                        .strip_prefix("MODULE_")
                        .and_then(|rest| rest.strip_suffix("_ENABLED"))
                    {
                        let enabled = parse_bool(&key, &value)?;
                        self.modules
                            .entry(module.to_ascii_lowercase())
                            .or_default()
                            .enabled = enabled;
                    } else if let Some(rest) = other.strip_prefix("POLL_") {
                        self.apply_poll_env(&key, rest, &value)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_poll_env(&mut self, key: &str, rest: &str, value: &str) -> Result<(), ConfigError> {
        let (class, setting) = if let Some(setting) = rest.strip_prefix("IMAGE_") {
            (OperationClass::Image, setting)
        } else if let Some(setting) = rest.strip_prefix("VIDEO_") {
            (OperationClass::Video, setting)
        } else {
            return Err(invalid(key, "unknown operation class (expected IMAGE or VIDEO)"));
        };

        let policy = self.polling.policy_mut(class);
        match setting {
            "INTERVAL" => policy.interval = parse_duration(key, value)?,
            "MAX_WAIT" => policy.max_wait = parse_duration(key, value)?,
            _ => return Err(invalid(key, "unknown poll setting (expected INTERVAL or MAX_WAIT)")),
        }
        Ok(())
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.invocation_deadline.is_zero() {
            return Err(ConfigError::ValidationError(
                "invocation_deadline must be greater than 0".to_string(),
            ));
        }

        for class in [OperationClass::Image, OperationClass::Video] {
            let policy = self.polling.policy(class);
            if policy.interval.is_zero() {
                return Err(ConfigError::ValidationError(format!(
                    "polling.{}.interval must be greater than 0",
                    class.as_str()
                )));
            }
            if policy.max_wait < policy.interval {
                return Err(ConfigError::ValidationError(format!(
                    "polling.{}.max_wait ({}) must be at least the poll interval ({})",
                    class.as_str(),
                    humantime::format_duration(policy.max_wait),
                    humantime::format_duration(policy.interval),
                )));
            }
        }

        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "logging.filter cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether the named module should be registered
    pub fn module_enabled(&self, name: &str) -> bool {
        self.modules.get(name).is_none_or(|m| m.enabled)
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            default_deadline: self.invocation_deadline,
        }
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidEnvVar {
        key: key.to_string(),
        message: message.into(),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(
            key,
            format!("invalid boolean value '{value}', expected true/false/1/0/yes/no/on/off"),
        )),
    }
}

fn parse_duration(key: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim())
        .map_err(|e| invalid(key, format!("invalid duration '{value}': {e}")))
}
