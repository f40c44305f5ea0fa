//! # Beam Configuration
//!
//! Configuration is a flat string key/value store, populated from defaults
//! and then from the environment. Environment keys use the `BEAM__` prefix;
//! the remainder is lowercased and `__` becomes `.`:
//!
//! ```bash
//! export BEAM__HTTP__PORT=8080        # http.port
//! export BEAM__BURN__GRACE_SECS=30    # burn.grace_secs
//! ```
//!
//! ```rust
//! use beam_core::config::{BeamConfig, ConfigMap};
//!
//! let mut map = ConfigMap::new();
//! map.set("codes.digits", "6");
//!
//! let config = BeamConfig::from_map(&map);
//! assert_eq!(config.code_digits, 6);
//! assert_eq!(config.http_port, 3000);
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_PREFIX: &str = "BEAM__";

#[derive(Debug, Clone, Default)]
pub struct ConfigMap {
    values: HashMap<String, String>,
}

impl ConfigMap {
    /// Create an empty config store.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Load every `BEAM__*` variable from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Load prefixed variables from any `(key, value)` source.
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map = Self::new();
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let normalized = stripped.to_lowercase().replace("__", "."); // BEAM__HTTP__PORT → http.port
                map.set(normalized, value);
            }
        }
        map
    }

    /// Set a configuration key to a string value.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    /// Get a configuration value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Parse `key`, falling back to `default` when absent or malformed.
    pub fn get_or<T>(&self, key: &str, default: T) -> T
    where
        T: FromStr + std::fmt::Display,
    {
        match self.get(key) {
            None => default,
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => v,
                Err(_) => {
                    tracing::warn!(key, value = raw, default = %default, "invalid config value, using default");
                    default
                }
            },
        }
    }
}

/// Typed settings for the whole process.
#[derive(Debug, Clone)]
pub struct BeamConfig {
    pub http_host: String,
    pub http_port: u16,
    pub upload_dir: PathBuf,
    pub database_path: PathBuf,
    pub static_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub code_digits: u32,
    pub code_max_attempts: u32,
    pub burn_grace: Duration,
    pub sweep_interval: Duration,
}

impl Default for BeamConfig {
    fn default() -> Self {
        Self {
            http_host: "0.0.0.0".to_string(),
            http_port: 3000,
            upload_dir: PathBuf::from("./uploads"),
            database_path: PathBuf::from("./data/beam.db"),
            static_dir: PathBuf::from("./public"),
            max_upload_bytes: 2 * 1024 * 1024 * 1024, // 2GB
            code_digits: 4,
            code_max_attempts: 32,
            burn_grace: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl BeamConfig {
    pub fn from_env() -> Self {
        Self::from_map(&ConfigMap::from_env())
    }

    pub fn from_map(map: &ConfigMap) -> Self {
        let d = Self::default();

        let path_or = |key: &str, default: PathBuf| {
            map.get(key)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default)
        };

        Self {
            http_host: map.get_or("http.host", d.http_host),
            http_port: map.get_or("http.port", d.http_port),
            upload_dir: path_or("storage.upload_dir", d.upload_dir),
            database_path: path_or("storage.database", d.database_path),
            static_dir: path_or("static.dir", d.static_dir),
            max_upload_bytes: map.get_or("upload.max_bytes", d.max_upload_bytes),
            code_digits: map.get_or("codes.digits", d.code_digits).clamp(1, 9),
            code_max_attempts: map.get_or("codes.max_attempts", d.code_max_attempts).max(1),
            burn_grace: Duration::from_secs(map.get_or("burn.grace_secs", d.burn_grace.as_secs())),
            sweep_interval: Duration::from_secs(
                map.get_or("sweep.interval_secs", d.sweep_interval.as_secs()).max(1),
            ),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn env_keys_are_normalized() {
        let map = ConfigMap::from_vars(vars(&[
            ("BEAM__HTTP__PORT", "8080"),
            ("BEAM__BURN__GRACE_SECS", "30"),
            ("PATH", "/usr/bin"),
        ]));

        assert_eq!(map.get("http.port"), Some("8080"));
        assert_eq!(map.get("burn.grace_secs"), Some("30"));
        assert!(!map.has("path"));
    }

    #[test]
    fn defaults_match_the_classic_deployment() {
        let config = BeamConfig::from_map(&ConfigMap::new());

        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.code_digits, 4);
        assert_eq!(config.burn_grace, Duration::from_secs(10));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.max_upload_bytes, 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn malformed_values_fall_back_to_defaults() {
        let map = ConfigMap::from_vars(vars(&[
            ("BEAM__HTTP__PORT", "not-a-port"),
            ("BEAM__CODES__DIGITS", "42"),
            ("BEAM__SWEEP__INTERVAL_SECS", "0"),
        ]));
        let config = BeamConfig::from_map(&map);

        assert_eq!(config.http_port, 3000);
        assert_eq!(config.code_digits, 9);
        assert_eq!(config.sweep_interval, Duration::from_secs(1));
    }

    #[test]
    fn paths_are_overridable() {
        let map = ConfigMap::from_vars(vars(&[
            ("BEAM__STORAGE__UPLOAD_DIR", "/srv/beam/blobs"),
            ("BEAM__STORAGE__DATABASE", ""),
        ]));
        let config = BeamConfig::from_map(&map);

        assert_eq!(config.upload_dir, PathBuf::from("/srv/beam/blobs"));
        assert_eq!(config.database_path, PathBuf::from("./data/beam.db"));
    }
}
