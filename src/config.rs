use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Log output written by the server binary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::Config(format!("unknown log format: {}", other))),
        }
    }
}

/// Connection and container settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store address (e.g., "127.0.0.1:6379")
    pub addr: String,
    /// Prefix for every key name; empty means no prefix
    pub namespace: String,
    /// Whether containers keep an identity cache of handed-out keys
    pub track_objects: bool,
    /// Timeout for establishing the TCP connection, in milliseconds
    pub connect_timeout_ms: u64,
    /// Default tracing filter when RUST_LOG is unset
    pub log_filter: String,
    /// Text or JSON log lines
    pub log_format: LogFormat,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            addr: "127.0.0.1:6379".to_string(),
            namespace: String::new(),
            track_objects: true,
            connect_timeout_ms: 5000,
            log_filter: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl StoreConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        StoreConfig {
            addr: addr.into(),
            ..Self::default()
        }
    }

    /// Parse from TOML; missing fields take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Defaults overridden by `REDIS_OBJECTS_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env(|name| std::env::var(name).ok())
    }

    fn apply_env<F>(mut self, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = var("REDIS_OBJECTS_ADDR") {
            self.addr = addr;
        }
        if let Some(ns) = var("REDIS_OBJECTS_NAMESPACE") {
            self.namespace = ns;
        }
        if let Some(track) = var("REDIS_OBJECTS_TRACK") {
            self.track_objects = match track.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(Error::Config(format!("REDIS_OBJECTS_TRACK: not a boolean: {}", other)))
                }
            };
        }
        if let Some(ms) = var("REDIS_OBJECTS_CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms = ms
                .parse()
                .map_err(|_| Error::Config(format!("REDIS_OBJECTS_CONNECT_TIMEOUT_MS: not a number: {}", ms)))?;
        }
        if let Some(filter) = var("REDIS_OBJECTS_LOG") {
            self.log_filter = filter;
        }
        if let Some(format) = var("REDIS_OBJECTS_LOG_FORMAT") {
            self.log_format = format.parse()?;
        }
        Ok(self)
    }

    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Turn the identity cache on or off
    pub fn with_tracking(mut self, track: bool) -> Self {
        self.track_objects = track;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Get connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = StoreConfig::from_toml_str("namespace = \"shop\"\ntrack_objects = false\n").unwrap();
        assert_eq!(config.namespace, "shop");
        assert!(!config.track_objects);
        assert_eq!(config.addr, "127.0.0.1:6379");
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.log_format, LogFormat::Text);

        let config = StoreConfig::from_toml_str("log_format = \"json\"\n").unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            StoreConfig::from_toml_str("connect_timeout_ms = \"soon\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("REDIS_OBJECTS_ADDR", "10.0.0.1:7000"),
            ("REDIS_OBJECTS_TRACK", "off"),
            ("REDIS_OBJECTS_CONNECT_TIMEOUT_MS", "250"),
            ("REDIS_OBJECTS_LOG_FORMAT", "JSON"),
        ]
        .into_iter()
        .collect();
        let config = StoreConfig::default()
            .apply_env(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.addr, "10.0.0.1:7000");
        assert!(!config.track_objects);
        assert_eq!(config.connect_timeout_ms, 250);
        assert_eq!(config.namespace, "");
        assert_eq!(config.log_format, LogFormat::Json);

        let bad: HashMap<&str, &str> = [("REDIS_OBJECTS_TRACK", "maybe")].into_iter().collect();
        assert!(StoreConfig::default()
            .apply_env(|name| bad.get(name).map(|v| v.to_string()))
            .is_err());
        let bad: HashMap<&str, &str> = [("REDIS_OBJECTS_LOG_FORMAT", "xml")].into_iter().collect();
        assert!(matches!(
            StoreConfig::default().apply_env(|name| bad.get(name).map(|v| v.to_string())),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_builders() {
        let config = StoreConfig::new("localhost:1")
            .with_namespace("ns")
            .with_tracking(false)
            .with_connect_timeout(Duration::from_millis(10))
            .with_log_filter("debug");
        assert_eq!(config.addr, "localhost:1");
        assert_eq!(config.connect_timeout_ms, 10);
        assert_eq!(config.log_filter, "debug");
    }
}
