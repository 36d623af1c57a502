//! # RTHK Radio configuration
//!
//! This crate provides configuration management for the RTHK Radio service:
//! - Loading configuration from a YAML file
//! - Merging with the embedded default configuration
//! - Environment variable overrides
//! - Typed getters and setters for the host and logger settings
//! - Process-wide shared access through [`get_config`]
//!
//! Source-specific settings (stream cache TTLs, user agent, ...) are added by
//! extension traits living in the crates that own them.
//!
//! ## Usage
//!
//! ```no_run
//! use rthkconfig::get_config;
//!
//! let config = get_config();
//! let port = config.get_http_port();
//! config.set_http_port(9000)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, bail, Context, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::{info, warn};

const DEFAULT_CONFIG: &str = include_str!("rthkradio.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load RTHK Radio configuration"));
}

const ENV_CONFIG_DIR: &str = "RTHKRADIO_CONFIG";
const ENV_PREFIX: &str = "RTHKRADIO_CONFIG__";
const DEFAULT_CONFIG_DIR: &str = ".rthkradio";

const DEFAULT_HTTP_PORT: u16 = 3001;
const DEFAULT_BASE_URL: &str = "localhost";
const DEFAULT_LOG_BUFFER_CAPACITY: usize = 1000;
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

/// Configuration manager for the RTHK Radio service
///
/// The whole configuration tree is kept as a YAML value behind a mutex and
/// written back to `config.yaml` on every change.
///
/// # Examples
///
/// ```no_run
/// use rthkconfig::Config;
///
/// let config = Config::load_config("/tmp/rthkradio")?;
/// println!("HTTP port: {}", config.get_http_port());
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: PathBuf,
    data: Mutex<Value>,
}

impl Config {
    /// Picks the first usable configuration directory
    ///
    /// An explicit `directory` wins, then `RTHKRADIO_CONFIG`, then an existing
    /// `.rthkradio` in the working directory or in the home directory. When
    /// none exists, `.rthkradio` in the working directory is created.
    fn locate_config_dir(directory: &str) -> PathBuf {
        if !directory.is_empty() {
            return PathBuf::from(directory);
        }

        if let Ok(from_env) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %from_env, "Config directory taken from environment");
            return PathBuf::from(from_env);
        }

        let local = PathBuf::from(DEFAULT_CONFIG_DIR);
        let in_home = home_dir().map(|home| home.join(DEFAULT_CONFIG_DIR));

        std::iter::once(local.clone())
            .chain(in_home)
            .find(|candidate| candidate.is_dir())
            .unwrap_or(local)
    }

    /// Creates `dir` when missing and probes that it can be written
    fn ensure_writable_dir(dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create config directory {}", dir.display()))?;

        if !dir.is_dir() {
            bail!("{} exists but is not a directory", dir.display());
        }

        let probe = dir.join(".rthkradio-probe");
        fs::write(&probe, b"")
            .with_context(|| format!("config directory {} is not writable", dir.display()))?;
        fs::remove_file(&probe)?;
        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `RTHKRADIO_CONFIG` environment variable
    /// 3. `.rthkradio` in the current directory
    /// 4. `.rthkradio` in the user's home directory
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir = Self::locate_config_dir(directory);
        Self::ensure_writable_dir(&dir)?;
        Ok(dir.to_string_lossy().into_owned())
    }

    /// Loads the configuration from the specified directory
    ///
    /// The embedded defaults are overlaid with `config.yaml` (if present),
    /// keys are lower-cased, environment overrides are applied and the result
    /// is saved back.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        let path = Path::new(&config_dir).join("config.yaml");
        info!(config_dir = %config_dir, "Using config directory");

        let mut tree = normalize_keys(serde_yaml::from_str(DEFAULT_CONFIG)?);

        match fs::read_to_string(&path) {
            Ok(text) => {
                info!(config_file = %path.display(), "Loaded config file");
                let user: Value = serde_yaml::from_str(&text)
                    .with_context(|| format!("invalid YAML in {}", path.display()))?;
                overlay(&mut tree, normalize_keys(user));
            }
            Err(_) => {
                info!(config_file = %path.display(), "No config file yet, starting from defaults");
            }
        }

        for (var, keys, value) in env_overrides(env::vars()) {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            if let Err(e) = insert_at(&mut tree, &keys, value) {
                warn!(env_var = %var, "Ignoring environment override: {}", e);
            }
        }

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(tree),
        };
        config.save()?;
        Ok(config)
    }

    /// Directory holding `config.yaml`
    pub fn directory(&self) -> &str {
        &self.config_dir
    }

    fn lock(&self) -> Result<MutexGuard<'_, Value>> {
        self.data
            .lock()
            .map_err(|_| anyhow!("configuration lock poisoned"))
    }

    /// Saves the current configuration to `config.yaml`
    pub fn save(&self) -> Result<()> {
        let yaml = serde_yaml::to_string(&*self.lock()?)?;
        fs::write(&self.path, yaml)
            .with_context(|| format!("cannot write {}", self.path.display()))
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// * `path` - keys from the root (e.g. `&["host", "http_port"]`)
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        insert_at(&mut *self.lock()?, path, value)?;
        self.save()
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path does not exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.lock()?;
        lookup(&data, path).cloned()
    }

    fn get_usize_or(&self, path: &[&str], default: usize) -> usize {
        self.get_value(path)
            .ok()
            .and_then(|v| v.as_u64())
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(default)
    }

    fn get_bool_or(&self, path: &[&str], default: bool) -> bool {
        self.get_value(path)
            .ok()
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    fn get_string_or(&self, path: &[&str], default: &str) -> String {
        match self.get_value(path) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            _ => default.to_string(),
        }
    }

    /// Gets the host name advertised by the HTTP server
    pub fn get_base_url(&self) -> String {
        self.get_string_or(&["host", "base_url"], DEFAULT_BASE_URL)
    }

    /// Sets the host name advertised by the HTTP server
    pub fn set_base_url(&self, base_url: &str) -> Result<()> {
        self.set_value(&["host", "base_url"], Value::String(base_url.to_string()))
    }

    /// Gets the HTTP port, falling back to 3001 when unset or invalid
    pub fn get_http_port(&self) -> u16 {
        let raw = match self.get_value(&["host", "http_port"]) {
            Ok(raw) => raw,
            Err(_) => return DEFAULT_HTTP_PORT,
        };

        let port = match &raw {
            Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            Value::String(s) => s.trim().parse::<u16>().ok(),
            _ => None,
        };

        port.unwrap_or_else(|| {
            warn!(value = ?raw, default = DEFAULT_HTTP_PORT, "host.http_port is not a valid port");
            DEFAULT_HTTP_PORT
        })
    }

    /// Sets the HTTP port
    pub fn set_http_port(&self, port: u16) -> Result<()> {
        self.set_value(&["host", "http_port"], Value::Number(Number::from(port)))
    }

    /// Number of log entries kept in memory for the SSE log endpoint
    pub fn get_log_cache_size(&self) -> Result<usize> {
        Ok(self.get_usize_or(
            &["host", "logger", "buffer_capacity"],
            DEFAULT_LOG_BUFFER_CAPACITY,
        ))
    }

    pub fn set_log_cache_size(&self, size: usize) -> Result<()> {
        self.set_value(
            &["host", "logger", "buffer_capacity"],
            Value::Number(Number::from(size as u64)),
        )
    }

    pub fn get_log_enable_console(&self) -> Result<bool> {
        Ok(self.get_bool_or(
            &["host", "logger", "enable_console"],
            DEFAULT_LOG_ENABLE_CONSOLE,
        ))
    }

    pub fn set_log_enable_console(&self, enabled: bool) -> Result<()> {
        self.set_value(&["host", "logger", "enable_console"], Value::Bool(enabled))
    }

    /// Minimum log level (`ERROR`, `WARN`, `INFO`, `DEBUG` or `TRACE`)
    pub fn get_log_min_level(&self) -> Result<String> {
        Ok(self.get_string_or(&["host", "logger", "min_level"], DEFAULT_LOG_MIN_LEVEL))
    }

    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(&["host", "logger", "min_level"], Value::String(level))
    }
}

/// Returns the process-wide configuration, loaded on first access
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Walks `path` from `root`, lower-casing each key
fn lookup<'a>(root: &'a Value, path: &[&str]) -> Result<&'a Value> {
    let mut node = root;
    for (depth, key) in path.iter().enumerate() {
        let map = node
            .as_mapping()
            .ok_or_else(|| anyhow!("Path {} is not a mapping", path[..depth].join(".")))?;
        node = map
            .get(key.to_lowercase())
            .ok_or_else(|| anyhow!("Path {} does not exist", path[..=depth].join(".")))?;
    }
    Ok(node)
}

/// Stores `value` at `path`, creating intermediate mappings
fn insert_at(root: &mut Value, path: &[&str], value: Value) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut node = root;
    for (depth, key) in parents.iter().enumerate() {
        let map = node
            .as_mapping_mut()
            .ok_or_else(|| anyhow!("Path {} is not a mapping", path[..depth].join(".")))?;
        node = map
            .entry(Value::String(key.to_lowercase()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
    }

    node.as_mapping_mut()
        .ok_or_else(|| anyhow!("Path {} is not a mapping", parents.join(".")))?
        .insert(Value::String(last.to_lowercase()), value);
    Ok(())
}

/// Collects `RTHKRADIO_CONFIG__A__B=value` variables as (`var`, `[a, b]`, value)
///
/// Values are parsed as YAML scalars, so `42` and `true` keep their type.
fn env_overrides(
    vars: impl IntoIterator<Item = (String, String)>,
) -> Vec<(String, Vec<String>, Value)> {
    vars.into_iter()
        .filter_map(|(var, raw)| {
            let path = var
                .strip_prefix(ENV_PREFIX)?
                .split("__")
                .map(str::to_lowercase)
                .collect::<Vec<_>>();
            let value = serde_yaml::from_str::<Value>(&raw).unwrap_or(Value::String(raw));
            Some((var, path, value))
        })
        .collect()
}

/// Lower-cases every string key, recursively
fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| {
                    let k = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    (k, normalize_keys(v))
                })
                .collect(),
        ),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

/// Applies `user` on top of `base`
///
/// Mappings are combined key by key; any other user value replaces the base.
fn overlay(base: &mut Value, user: Value) {
    match (base, user) {
        (Value::Mapping(base_map), Value::Mapping(user_map)) => {
            for (key, value) in user_map {
                match base_map.get_mut(&key) {
                    Some(slot) => overlay(slot, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
