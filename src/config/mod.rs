// src/config/mod.rs

//! Layered configuration
//!
//! Layers are merged lowest priority first:
//! - Configuration files (YAML, JSON, TOML, picked by extension)
//! - Environment variables (`CATALOG_ADMIN_` prefix, `__` between nesting levels)
//! - In-memory JSON values
//!
//! A missing backend base address is a valid state, reported by the listing
//! view as "unconfigured".

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tokio::sync::RwLock;

use crate::catalog::message::ClearPolicy;
use crate::error::{Error, ErrorKind, Result};

pub const DEFAULT_ENV_PREFIX: &str = "CATALOG_ADMIN";

const ENV_NESTING_SEPARATOR: &str = "__";

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub key: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation error for '{}': {}", self.key, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ConfigSource {
    File { path: PathBuf, format: ConfigFormat },
    Environment { prefix: String },
    Memory { data: Value },
}

#[derive(Debug, Clone)]
pub struct ConfigLayer {
    pub name: String,
    pub source: ConfigSource,
    pub priority: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSettings,
    pub logging: LoggingConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub version: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "Catalog Admin".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Backend access and orchestration timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Backend base address; `None` means unconfigured
    pub base_url: Option<String>,
    /// Per-request transport timeout
    pub request_timeout_ms: u64,
    /// How long the listing retry loop keeps attempting
    pub list_deadline_ms: u64,
    /// Lifetime of an ephemeral error message
    pub message_ttl_ms: u64,
    pub clear_policy: ClearPolicy,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_ms: 10_000,
            list_deadline_ms: 20_000,
            message_ttl_ms: 4_000,
            clear_policy: ClearPolicy::default(),
        }
    }
}

impl ApiConfig {
    /// Base address with surrounding whitespace removed and exactly one
    /// trailing slash, or `None` when absent or blank
    pub fn normalized_base_url(&self) -> Option<String> {
        let raw = self.base_url.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }

        let mut base = raw.trim_end_matches('/').to_string();
        base.push('/');
        Some(base)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }

    pub fn list_deadline(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.list_deadline_ms)
    }

    pub fn message_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.message_ttl_ms)
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if let Some(base) = self.normalized_base_url() {
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                errors.push(ValidationError {
                    key: "api.base_url".to_string(),
                    message: format!("'{}' is not an http(s) address", base),
                });
            }
        }
        if self.list_deadline_ms == 0 {
            errors.push(ValidationError {
                key: "api.list_deadline_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.message_ttl_ms == 0 {
            errors.push(ValidationError {
                key: "api.message_ttl_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        errors
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub console: ConsoleLogConfig,
    pub file: Option<FileLogConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            console: ConsoleLogConfig::default(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleLogConfig {
    pub enabled: bool,
    pub colored: bool,
}

impl Default for ConsoleLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            colored: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileLogConfig {
    pub path: PathBuf,
}

impl Default for FileLogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./logs/catalog-admin.log"),
        }
    }
}

pub struct ConfigManager {
    layers: Vec<ConfigLayer>,
    merged_config: Arc<RwLock<Value>>,
}

impl fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigManager")
            .field("layers", &self.layers.len())
            .finish()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            merged_config: Arc::new(RwLock::new(Value::Object(Map::new()))),
        }
    }

    /// File layer at priority 0 plus the default environment layer on top
    pub fn with_config_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut manager = Self::new();
        manager.add_file_layer("file", config_path, 0)?;
        manager.add_env_layer("environment", DEFAULT_ENV_PREFIX, 1000);
        Ok(manager)
    }

    pub fn add_file_layer<P: AsRef<Path>>(
        &mut self,
        name: impl Into<String>,
        path: P,
        priority: u32,
    ) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        let format = ConfigFormat::from_extension(&path).ok_or_else(|| {
            Error::config(format!(
                "Unsupported configuration file format: {}",
                path.display()
            ))
        })?;

        self.push_layer(ConfigLayer {
            name: name.into(),
            source: ConfigSource::File { path, format },
            priority,
        });
        Ok(())
    }

    pub fn add_env_layer(&mut self, name: impl Into<String>, prefix: impl Into<String>, priority: u32) {
        self.push_layer(ConfigLayer {
            name: name.into(),
            source: ConfigSource::Environment {
                prefix: prefix.into(),
            },
            priority,
        });
    }

    pub fn add_memory_layer(&mut self, name: impl Into<String>, data: Value, priority: u32) {
        self.push_layer(ConfigLayer {
            name: name.into(),
            source: ConfigSource::Memory { data },
            priority,
        });
    }

    fn push_layer(&mut self, layer: ConfigLayer) {
        self.layers.push(layer);
        self.layers.sort_by_key(|l| l.priority);
    }

    /// Reads every layer and replaces the merged view
    pub async fn load(&self) -> Result<()> {
        let mut merged = Value::Object(Map::new());

        for layer in &self.layers {
            let layer_config = self.load_layer_config(layer)?;
            tracing::debug!(layer = %layer.name, priority = layer.priority, "Merging config layer");
            merge_values(&mut merged, layer_config);
        }

        *self.merged_config.write().await = merged;
        Ok(())
    }

    pub async fn get<T>(&self, key: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let config = self.merged_config.read().await;
        let value = get_nested_value(&config, key).ok_or_else(|| {
            Error::new(
                ErrorKind::Configuration {
                    key: Some(key.to_string()),
                    validation_errors: vec![format!("Configuration key '{}' not found", key)],
                },
                "Configuration key not found",
            )
        })?;

        serde_json::from_value(value).map_err(|e| {
            Error::new(
                ErrorKind::Configuration {
                    key: Some(key.to_string()),
                    validation_errors: vec![format!("Failed to deserialize config value: {}", e)],
                },
                format!("Failed to deserialize config value: {}", e),
            )
        })
    }

    /// Typed view of the merged layers; missing sections take their defaults
    pub async fn get_config(&self) -> Result<AppConfig> {
        let config = self.merged_config.read().await;
        serde_json::from_value(config.clone())
            .map_err(|e| Error::config(format!("Failed to deserialize configuration: {}", e)))
    }

    pub async fn validate(&self) -> Result<Vec<ValidationError>> {
        let config = self.get_config().await?;
        Ok(config.api.validate())
    }

    pub async fn debug_config(&self) -> Value {
        self.merged_config.read().await.clone()
    }

    fn load_layer_config(&self, layer: &ConfigLayer) -> Result<Value> {
        match &layer.source {
            ConfigSource::File { path, format } => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| Error::config(format!("Failed to read config file: {}", e)))?;

                match format {
                    ConfigFormat::Json => serde_json::from_str(&content)
                        .map_err(|e| Error::config(format!("Failed to parse JSON config: {}", e))),
                    ConfigFormat::Yaml => serde_yaml::from_str(&content)
                        .map_err(|e| Error::config(format!("Failed to parse YAML config: {}", e))),
                    ConfigFormat::Toml => toml::from_str(&content)
                        .map_err(|e| Error::config(format!("Failed to parse TOML config: {}", e))),
                }
            }
            ConfigSource::Environment { prefix } => {
                let mut env_config = Map::new();

                for (key, value) in std::env::vars() {
                    let Some(rest) = key.strip_prefix(prefix.as_str()) else {
                        continue;
                    };
                    let config_key = rest.trim_start_matches('_').to_lowercase();
                    if config_key.is_empty() {
                        continue;
                    }
                    let nested_keys: Vec<&str> = config_key.split(ENV_NESTING_SEPARATOR).collect();
                    set_nested_env_value(&mut env_config, &nested_keys, value);
                }

                Ok(Value::Object(env_config))
            }
            ConfigSource::Memory { data } => Ok(data.clone()),
        }
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, source_value) in source_map {
                match target_map.get_mut(&key) {
                    Some(target_value) => merge_values(target_value, source_value),
                    None => {
                        target_map.insert(key, source_value);
                    }
                }
            }
        }
        (target, source) => {
            *target = source;
        }
    }
}

fn get_nested_value(config: &Value, key: &str) -> Option<Value> {
    let mut current = config;
    for k in key.split('.') {
        current = current.get(k)?;
    }
    Some(current.clone())
}

fn set_nested_env_value(config: &mut Map<String, Value>, keys: &[&str], value: String) {
    let Some((first, rest)) = keys.split_first() else {
        return;
    };

    if rest.is_empty() {
        config.insert(first.to_string(), parse_env_value(value));
        return;
    }

    let entry = config
        .entry(first.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(nested_map) = entry {
        set_nested_env_value(nested_map, rest, value);
    }
}

fn parse_env_value(value: String) -> Value {
    if let Ok(bool_val) = value.parse::<bool>() {
        Value::Bool(bool_val)
    } else if let Ok(int_val) = value.parse::<i64>() {
        Value::Number(Number::from(int_val))
    } else if let Some(float_val) = value.parse::<f64>().ok().and_then(Number::from_f64) {
        Value::Number(float_val)
    } else {
        Value::String(value)
    }
}
