//! Configuration management for jvm-rebuild
//!
//! Settings are loaded once from environment variables with sensible defaults and
//! passed by `Arc` into the controller and every reconciler.
//!
//! # Environment Variables
//!
//! - `JVM_REBUILD_NAMESPACE`: Namespace reconciled by the controller - default: "default"
//! - `JVM_REBUILD_RECONCILE_TIMEOUT`: Bound on one evaluation in seconds - default: "300"
//! - `JVM_REBUILD_POLL_INTERVAL`: Seconds between controller passes - default: "5"
//! - `JVM_REBUILD_FILTER_NAME`: Name of the membership filter blob - default: "jvm-build-service-filter"
//! - `JVM_REBUILD_STORE`: Path of the file-backed store - default: data dir + "jvm-rebuild/store.json"
//! - `JVM_REBUILD_BUILDER_IMAGES`: Comma-separated builder names (e.g. "jdk11,jdk17")
//! - `JVM_REBUILD_BUILDER_IMAGE_<NAME>`: Image of builder `<name>`, upper-cased with `-` as `_`
//! - `JVM_REBUILD_LOG_LEVEL`: Logging level - default: "info"
//!
//! # Example
//!
//! ```no_run
//! use jvm_rebuild::ServiceConfig;
//!
//! let config = ServiceConfig::default();
//! config.validate().expect("Invalid configuration");
//! println!("{}", config);
//! ```

use crate::recipe::{builder_image_key, parse_system_config, BuilderImage, SYSTEM_BUILDER_IMAGES};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 300;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const MAX_INTERVAL_SECS: u64 = 3600;

/// Well-known name of the membership filter blob
pub const DEFAULT_FILTER_NAME: &str = "jvm-build-service-filter";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Namespace whose records are reconciled
    pub namespace: String,

    /// Timeout applied to each evaluation of a single record
    pub reconcile_timeout_secs: u64,

    /// Delay between controller passes in watch mode
    pub poll_interval_secs: u64,

    /// Name of the binary blob holding the membership filter
    pub filter_name: String,

    /// Location of the file-backed store used by the CLI
    pub store_path: PathBuf,

    /// Builder images seeding the recipe catalog
    pub builder_images: Vec<BuilderImage>,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let namespace = env::var("JVM_REBUILD_NAMESPACE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        let reconcile_timeout_secs = env::var("JVM_REBUILD_RECONCILE_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RECONCILE_TIMEOUT_SECS);

        let poll_interval_secs = env::var("JVM_REBUILD_POLL_INTERVAL")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);

        let filter_name = env::var("JVM_REBUILD_FILTER_NAME")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER_NAME.to_string());

        let store_path = env::var("JVM_REBUILD_STORE")
            .ok()
            .map(PathBuf::from)
            .unwrap_or_else(default_store_path);

        let builder_images = parse_system_config(&builder_images_from_env());

        let log_level = env::var("JVM_REBUILD_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        Self {
            namespace,
            reconcile_timeout_secs,
            poll_interval_secs,
            filter_name,
            store_path,
            builder_images,
            log_level,
        }
    }
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(env::temp_dir)
        .join("jvm-rebuild")
        .join("store.json")
}

fn builder_env_key(name: &str) -> String {
    format!(
        "JVM_REBUILD_BUILDER_IMAGE_{}",
        name.to_uppercase().replace(['-', '.'], "_")
    )
}

/// Translate the builder env vars into the flat system config shape
fn builder_images_from_env() -> HashMap<String, String> {
    let mut config = HashMap::new();
    let Ok(names) = env::var("JVM_REBUILD_BUILDER_IMAGES") else {
        return config;
    };

    for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if let Ok(image) = env::var(builder_env_key(name)) {
            config.insert(builder_image_key(name), image);
        }
    }
    config.insert(SYSTEM_BUILDER_IMAGES.to_string(), names);
    config
}

impl ServiceConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any value is out of range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Namespace must not be empty".to_string(),
            ));
        }

        if self.reconcile_timeout_secs == 0 || self.reconcile_timeout_secs > MAX_INTERVAL_SECS {
            return Err(ConfigError::ValidationFailed(format!(
                "Reconcile timeout must be between 1 and {} seconds",
                MAX_INTERVAL_SECS
            )));
        }

        if self.poll_interval_secs == 0 || self.poll_interval_secs > MAX_INTERVAL_SECS {
            return Err(ConfigError::ValidationFailed(format!(
                "Poll interval must be between 1 and {} seconds",
                MAX_INTERVAL_SECS
            )));
        }

        if self.filter_name.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Filter name must not be empty".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    pub fn to_display_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("namespace".to_string(), self.namespace.clone());
        map.insert(
            "reconcile_timeout_secs".to_string(),
            self.reconcile_timeout_secs.to_string(),
        );
        map.insert(
            "poll_interval_secs".to_string(),
            self.poll_interval_secs.to_string(),
        );
        map.insert("filter_name".to_string(), self.filter_name.clone());
        map.insert(
            "store_path".to_string(),
            self.store_path.display().to_string(),
        );
        map.insert(
            "builder_images".to_string(),
            self.builder_images
                .iter()
                .map(|b| b.name.as_str())
                .collect::<Vec<_>>()
                .join(","),
        );
        map.insert("log_level".to_string(), self.log_level.clone());
        map
    }
}

impl fmt::Display for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "jvm-rebuild Configuration:")?;
        writeln!(f, "  Namespace: {}", self.namespace)?;
        writeln!(f, "  Reconcile Timeout: {}s", self.reconcile_timeout_secs)?;
        writeln!(f, "  Poll Interval: {}s", self.poll_interval_secs)?;
        writeln!(f, "  Filter Name: {}", self.filter_name)?;
        writeln!(f, "  Store: {}", self.store_path.display())?;
        for builder in &self.builder_images {
            writeln!(f, "  Builder {}: {}", builder.name, builder.image)?;
        }
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}
