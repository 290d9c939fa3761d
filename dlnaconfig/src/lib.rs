//! # DLNAKit Configuration Module
//!
//! This module provides configuration management for DLNAKit, including:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Type-safe getters and setters for configuration values
//!
//! ## Usage
//!
//! ```no_run
//! use dlnaconfig::get_config;
//!
//! let config = get_config()?;
//! let port = config.get_http_port();
//! let timeout = config.get_subscription_timeout_sec();
//! config.set_http_port(9000)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use dlnautils::guess_local_ip;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde_yaml::{Mapping, Number, Value};
use std::{env, fs, net::Ipv4Addr, path::Path, sync::Arc};
use tracing::{info, warn};
use uuid::Uuid;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("dlnakit.yaml");

lazy_static! {
    static ref CONFIG: Mutex<Option<Arc<Config>>> = Mutex::new(None);
}

const ENV_CONFIG_DIR: &str = "DLNAKIT_CONFIG";
const ENV_PREFIX: &str = "DLNAKIT_CONFIG__";

// Default values for configuration
const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;
const DEFAULT_MAX_AGE: u64 = 1800;
const DEFAULT_ALIVE_REPEAT_MS: u64 = 900_000;
const DEFAULT_UDP_QUEUE_CAPACITY: u64 = 64;
const DEFAULT_BYE_REPEAT_MS: u64 = 800;
const DEFAULT_BYE_DURATION_MS: u64 = 2000;
const DEFAULT_SUBSCRIPTION_TIMEOUT_SEC: u64 = 1800;
const DEFAULT_NOTIFY_TIMEOUT_MS: u64 = 6000;
const DEFAULT_LOOP_DELAY_MS: u64 = 8;
const DEFAULT_XML_CHUNK_SIZE: u64 = 256;

/// Macro to generate getter/setter for unsigned values with default
macro_rules! impl_u64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> u64 {
            self.get_u64($path, $default)
        }

        pub fn $setter(&self, value: u64) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> bool {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => b,
                _ => $default,
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Configuration manager for DLNAKit
///
/// The configuration is a YAML tree. Keys are case-insensitive (stored
/// lower-cased); every setter persists the whole tree to `config.yaml`.
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        // 1. Try provided directory
        if !directory.is_empty() {
            return directory.to_string();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var=ENV_CONFIG_DIR, path=%env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Try current directory
        if Path::new(".dlnakit").exists() {
            return ".dlnakit".to_string();
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(".dlnakit");
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        ".dlnakit".to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        // Test write permission
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `DLNAKIT_CONFIG` environment variable
    /// 3. `.dlnakit` in the current directory
    /// 4. `.dlnakit` in the user's home directory
    ///
    /// The directory is created if it doesn't exist.
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir_path = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&dir_path))?;
        Ok(dir_path)
    }

    /// Loads the configuration from the specified directory
    ///
    /// 1. Loads the default embedded configuration
    /// 2. Merges it with `config.yaml` if present
    /// 3. Applies `DLNAKIT_CONFIG__A__B=value` environment overrides
    /// 4. Saves the merged configuration
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir=%config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        if let Ok(data) = fs::read(&path) {
            info!(config_file=%path, "Loaded config file");
            let external_value: Value = serde_yaml::from_slice(&data)?;
            merge_yaml(&mut default_value, &Self::lower_keys_value(external_value));
        } else {
            info!(config_file=%path, "Config file not found, using default embedded config");
        }

        let mut config_value = Self::lower_keys_value(default_value);
        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    pub fn config_directory(&self) -> &str {
        &self.config_dir
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let yaml = serde_yaml::to_string(&*self.data.lock())?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["host", "http_port"]`)
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.data.lock();
            Self::set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Null = data {
            *data = Value::Mapping(Mapping::new());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data.lock();
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                if let Some(next) = map.get(&Value::String(key.to_lowercase())) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn get_u64(&self, path: &[&str], default: u64) -> u64 {
        match self.get_value(path) {
            Ok(Value::Number(n)) => match n.as_u64() {
                Some(v) => v,
                None => {
                    warn!("{} is not an unsigned number, using default {}", path.join("."), default);
                    default
                }
            },
            Ok(Value::String(s)) => s.trim().parse().unwrap_or_else(|_| {
                warn!("Invalid value '{}' for {}, using default {}", s, path.join("."), default);
                default
            }),
            Ok(_) => {
                warn!("{} is not a number, using default {}", path.join("."), default);
                default
            }
            Err(err) => {
                warn!("Failed to get {}: {}, using default {}", path.join("."), err, default);
                default
            }
        }
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                if let Err(e) = Self::set_value_internal(config, &key_path, yaml_value) {
                    warn!("Ignoring environment override {}: {}", key, e);
                }
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    let new_key = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    new_map.insert(new_key, Self::lower_keys_value(v));
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    /// Gets the HTTP port from configuration (default 8080)
    pub fn get_http_port(&self) -> u16 {
        let port = self.get_u64(&["host", "http_port"], DEFAULT_HTTP_PORT as u64);
        u16::try_from(port).unwrap_or_else(|_| {
            warn!("HTTP port {} out of range, using default {}", port, DEFAULT_HTTP_PORT);
            DEFAULT_HTTP_PORT
        })
    }

    pub fn set_http_port(&self, port: u16) -> Result<()> {
        self.set_value(&["host", "http_port"], Value::Number(Number::from(port)))
    }

    /// Gets the base URL announced in SSDP `LOCATION` headers
    ///
    /// Returns the configured URL, or `http://<local ip>:<http port>` when empty.
    pub fn get_base_url(&self) -> String {
        match self.get_value(&["host", "base_url"]) {
            Ok(Value::String(s)) if !s.is_empty() => s.trim_end_matches('/').to_string(),
            _ => format!("http://{}:{}", guess_local_ip(), self.get_http_port()),
        }
    }

    pub fn set_base_url(&self, url: String) -> Result<()> {
        self.set_value(&["host", "base_url"], Value::String(url))
    }

    /// Netmask used to filter discovery requests, `None` when disabled
    pub fn get_discovery_netmask(&self) -> Option<Ipv4Addr> {
        match self.get_value(&["ssdp", "discovery_netmask"]) {
            Ok(Value::String(s)) if !s.trim().is_empty() => match s.trim().parse() {
                Ok(mask) => Some(mask),
                Err(_) => {
                    warn!("Invalid discovery netmask '{}', subnet filter disabled", s);
                    None
                }
            },
            _ => None,
        }
    }

    /// Gets the UDN (Unique Device Name) for a device, generating one if it doesn't exist
    ///
    /// The returned value never carries the `uuid:` prefix.
    pub fn get_device_udn(&self, devtype: &str, name: &str) -> Result<String> {
        let path = &["devices", devtype, name, "udn"];
        match self.get_value(path) {
            Ok(Value::String(udn)) if !udn.trim().is_empty() => {
                let udn_str = udn.trim();
                Ok(udn_str.strip_prefix("uuid:").unwrap_or(udn_str).to_string())
            }
            _ => {
                let new_udn = Uuid::new_v4().to_string();
                self.set_value(path, Value::String(new_udn.clone()))?;
                Ok(new_udn)
            }
        }
    }

    pub fn set_device_udn(&self, devtype: &str, name: &str, udn: String) -> Result<()> {
        let udn_str = udn.trim();
        let sanitized = udn_str.strip_prefix("uuid:").unwrap_or(udn_str).to_string();
        self.set_value(&["devices", devtype, name, "udn"], Value::String(sanitized))
    }

    /// Friendly name of a device, `default` when not configured
    pub fn get_device_friendly_name(&self, devtype: &str, name: &str, default: &str) -> String {
        match self.get_value(&["devices", devtype, name, "friendly_name"]) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            _ => default.to_string(),
        }
    }

    impl_u64_config!(get_max_age, set_max_age, &["ssdp", "max_age"], DEFAULT_MAX_AGE);

    impl_u64_config!(
        get_alive_repeat_ms,
        set_alive_repeat_ms,
        &["ssdp", "alive_repeat_ms"],
        DEFAULT_ALIVE_REPEAT_MS
    );

    impl_u64_config!(
        get_udp_queue_capacity,
        set_udp_queue_capacity,
        &["ssdp", "udp_queue_capacity"],
        DEFAULT_UDP_QUEUE_CAPACITY
    );

    impl_u64_config!(
        get_bye_repeat_ms,
        set_bye_repeat_ms,
        &["ssdp", "bye_repeat_ms"],
        DEFAULT_BYE_REPEAT_MS
    );

    impl_u64_config!(
        get_bye_duration_ms,
        set_bye_duration_ms,
        &["ssdp", "bye_duration_ms"],
        DEFAULT_BYE_DURATION_MS
    );

    impl_u64_config!(
        get_subscription_timeout_sec,
        set_subscription_timeout_sec,
        &["gena", "subscription_timeout_sec"],
        DEFAULT_SUBSCRIPTION_TIMEOUT_SEC
    );

    impl_u64_config!(
        get_notify_timeout_ms,
        set_notify_timeout_ms,
        &["gena", "notify_timeout_ms"],
        DEFAULT_NOTIFY_TIMEOUT_MS
    );

    impl_u64_config!(
        get_loop_delay_ms,
        set_loop_delay_ms,
        &["engine", "loop_delay_ms"],
        DEFAULT_LOOP_DELAY_MS
    );

    impl_u64_config!(
        get_xml_chunk_size,
        set_xml_chunk_size,
        &["engine", "xml_chunk_size"],
        DEFAULT_XML_CHUNK_SIZE
    );

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    /// Récupère le niveau de log minimum depuis la configuration
    pub fn get_log_min_level(&self) -> String {
        match self.get_value(&["host", "logger", "min_level"]) {
            Ok(Value::String(s)) => s,
            _ => DEFAULT_LOG_MIN_LEVEL.to_string(),
        }
    }

    /// Définit le niveau de log minimum dans la configuration
    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(&["host", "logger", "min_level"], Value::String(level))
    }
}

/// Returns the global configuration instance
///
/// The configuration is loaded from the default location on first access.
pub fn get_config() -> Result<Arc<Config>> {
    let mut guard = CONFIG.lock();
    if let Some(config) = guard.as_ref() {
        return Ok(config.clone());
    }
    let config = Arc::new(Config::load_config("")?);
    *guard = Some(config.clone());
    Ok(config)
}

/// Loads the global configuration from an explicit directory
///
/// Replaces any previously loaded instance.
pub fn init_config(directory: &str) -> Result<Arc<Config>> {
    let config = Arc::new(Config::load_config(directory)?);
    *CONFIG.lock() = Some(config.clone());
    Ok(config)
}

/// Merges external YAML configuration into default configuration
///
/// - For mappings, keys from `external` are merged recursively into `default`
/// - For scalars and sequences, external values replace default values
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_defaults() {
        let (_dir, config) = temp_config();
        assert_eq!(config.get_http_port(), 8080);
        assert_eq!(config.get_max_age(), 1800);
        assert_eq!(config.get_subscription_timeout_sec(), 1800);
        assert_eq!(config.get_loop_delay_ms(), 8);
        assert_eq!(config.get_xml_chunk_size(), 256);
        assert_eq!(config.get_discovery_netmask(), None);
        assert!(config.get_log_enable_console());
    }

    #[test]
    fn test_set_value_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();
        {
            let config = Config::load_config(path).unwrap();
            config.set_http_port(9000).unwrap();
            config.set_value(&["SSDP", "Discovery_Netmask"], Value::String("255.255.255.0".into())).unwrap();
        }
        let config = Config::load_config(path).unwrap();
        assert_eq!(config.get_http_port(), 9000);
        assert_eq!(
            config.get_discovery_netmask(),
            Some(Ipv4Addr::new(255, 255, 255, 0))
        );
    }

    #[test]
    fn test_invalid_values_fall_back_to_default() {
        let (_dir, config) = temp_config();
        config
            .set_value(&["engine", "loop_delay_ms"], Value::String("soon".into()))
            .unwrap();
        assert_eq!(config.get_loop_delay_ms(), 8);
        config
            .set_value(&["host", "http_port"], Value::Number(Number::from(70000)))
            .unwrap();
        assert_eq!(config.get_http_port(), 8080);
    }

    #[test]
    fn test_device_udn_is_generated_once() {
        let (_dir, config) = temp_config();
        let first = config.get_device_udn("mediarenderer", "main").unwrap();
        let second = config.get_device_udn("mediarenderer", "main").unwrap();
        assert_eq!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());

        config
            .set_device_udn("mediarenderer", "main", "uuid:abc".to_string())
            .unwrap();
        assert_eq!(config.get_device_udn("mediarenderer", "main").unwrap(), "abc");
    }

    #[test]
    fn test_env_override() {
        env::set_var("DLNAKIT_CONFIG__GENA__NOTIFY_TIMEOUT_MS", "1234");
        let (_dir, config) = temp_config();
        env::remove_var("DLNAKIT_CONFIG__GENA__NOTIFY_TIMEOUT_MS");
        assert_eq!(config.get_notify_timeout_ms(), 1234);
    }

    #[test]
    fn test_base_url_configured() {
        let (_dir, config) = temp_config();
        config.set_base_url("http://192.168.1.5:8080/".into()).unwrap();
        assert_eq!(config.get_base_url(), "http://192.168.1.5:8080");
    }

    #[test]
    fn test_merge_yaml() {
        let mut default: Value = serde_yaml::from_str("a: {b: 1, c: 2}").unwrap();
        let external: Value = serde_yaml::from_str("a: {c: 3, d: 4}").unwrap();
        merge_yaml(&mut default, &external);
        assert_eq!(
            Config::get_value_internal(&default, &["a", "b"]).unwrap(),
            Value::Number(1.into())
        );
        assert_eq!(
            Config::get_value_internal(&default, &["a", "c"]).unwrap(),
            Value::Number(3.into())
        );
        assert_eq!(
            Config::get_value_internal(&default, &["a", "d"]).unwrap(),
            Value::Number(4.into())
        );
    }
}
