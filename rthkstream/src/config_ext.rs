//! RTHK settings stored in rthkconfig
//!
//! All values live under `sources.rthk`:
//!
//! ```yaml
//! sources:
//!   rthk:
//!     enabled: true
//!     stream_cache_ttl_secs: 1800
//!     fallback_ttl_secs: 360
//!     request_timeout_secs: 10
//!     user_agent: "Mozilla/5.0 ..."
//! ```
//!
//! Getters write their default back when the key is missing or malformed.
//!
//! ```no_run
//! use rthkconfig::get_config;
//! use rthkstream::RthkConfigExt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = get_config();
//! let settings = config.get_rthk_settings()?;
//! println!("stream URLs cached for {:?}", settings.cache_policy().ttl);
//! # Ok(())
//! # }
//! ```

use crate::cache::{fallback_share, CachePolicy};
use crate::fetcher::{DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use anyhow::Result;
use rthkconfig::Config;
use serde_yaml::Value;
use std::time::Duration;

/// Default lifetime of a scraped stream URL (30 minutes)
pub const DEFAULT_STREAM_CACHE_TTL_SECS: u64 = 30 * 60;

const SECTION: [&str; 2] = ["sources", "rthk"];

/// Resolver settings read from the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RthkSettings {
    pub enabled: bool,
    pub stream_cache_ttl: Duration,
    pub fallback_ttl: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl RthkSettings {
    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            ttl: self.stream_cache_ttl,
            fallback_ttl: self.fallback_ttl,
        }
    }
}

impl Default for RthkSettings {
    fn default() -> Self {
        let policy = CachePolicy::default();
        Self {
            enabled: true,
            stream_cache_ttl: policy.ttl,
            fallback_ttl: policy.fallback_ttl,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Extension of `rthkconfig::Config` for the RTHK source
pub trait RthkConfigExt {
    /// Whether the RTHK routes are mounted (default: true)
    fn get_rthk_enabled(&self) -> Result<bool>;
    fn set_rthk_enabled(&self, enabled: bool) -> Result<()>;

    /// Validity of a scraped stream URL, in seconds (default: 1800)
    fn get_rthk_stream_cache_ttl(&self) -> Result<u64>;
    fn set_rthk_stream_cache_ttl(&self, ttl_secs: u64) -> Result<()>;

    /// Validity of a fallback stream URL, in seconds
    ///
    /// Defaults to 20% of the stream cache TTL (360 with the default TTL).
    fn get_rthk_fallback_ttl(&self) -> Result<u64>;
    fn set_rthk_fallback_ttl(&self, ttl_secs: u64) -> Result<()>;

    /// Timeout for source page requests, in seconds (default: 10)
    fn get_rthk_request_timeout(&self) -> Result<u64>;
    fn set_rthk_request_timeout(&self, timeout_secs: u64) -> Result<()>;

    /// User-Agent sent to source pages and proxied hosts
    fn get_rthk_user_agent(&self) -> Result<String>;
    fn set_rthk_user_agent(&self, user_agent: &str) -> Result<()>;

    /// All of the above in one struct
    fn get_rthk_settings(&self) -> Result<RthkSettings> {
        Ok(RthkSettings {
            enabled: self.get_rthk_enabled()?,
            stream_cache_ttl: Duration::from_secs(self.get_rthk_stream_cache_ttl()?),
            fallback_ttl: Duration::from_secs(self.get_rthk_fallback_ttl()?),
            request_timeout: Duration::from_secs(self.get_rthk_request_timeout()?),
            user_agent: self.get_rthk_user_agent()?,
        })
    }
}

fn key(name: &str) -> [&str; 3] {
    [SECTION[0], SECTION[1], name]
}

fn get_u64_or_default(config: &Config, name: &str, default: u64) -> Result<u64> {
    match config.get_value(&key(name)) {
        Ok(Value::Number(n)) if n.is_u64() => Ok(n.as_u64().unwrap_or(default)),
        _ => {
            config.set_value(&key(name), Value::Number(default.into()))?;
            Ok(default)
        }
    }
}

fn set_u64(config: &Config, name: &str, value: u64) -> Result<()> {
    config.set_value(&key(name), Value::Number(value.into()))
}

impl RthkConfigExt for Config {
    fn get_rthk_enabled(&self) -> Result<bool> {
        match self.get_value(&key("enabled")) {
            Ok(Value::Bool(b)) => Ok(b),
            _ => {
                self.set_rthk_enabled(true)?;
                Ok(true)
            }
        }
    }

    fn set_rthk_enabled(&self, enabled: bool) -> Result<()> {
        self.set_value(&key("enabled"), Value::Bool(enabled))
    }

    fn get_rthk_stream_cache_ttl(&self) -> Result<u64> {
        get_u64_or_default(self, "stream_cache_ttl_secs", DEFAULT_STREAM_CACHE_TTL_SECS)
    }

    fn set_rthk_stream_cache_ttl(&self, ttl_secs: u64) -> Result<()> {
        set_u64(self, "stream_cache_ttl_secs", ttl_secs)
    }

    fn get_rthk_fallback_ttl(&self) -> Result<u64> {
        let ttl = Duration::from_secs(self.get_rthk_stream_cache_ttl()?);
        let default = fallback_share(ttl).as_secs();
        get_u64_or_default(self, "fallback_ttl_secs", default)
    }

    fn set_rthk_fallback_ttl(&self, ttl_secs: u64) -> Result<()> {
        set_u64(self, "fallback_ttl_secs", ttl_secs)
    }

    fn get_rthk_request_timeout(&self) -> Result<u64> {
        get_u64_or_default(self, "request_timeout_secs", DEFAULT_REQUEST_TIMEOUT_SECS)
    }

    fn set_rthk_request_timeout(&self, timeout_secs: u64) -> Result<()> {
        set_u64(self, "request_timeout_secs", timeout_secs)
    }

    fn get_rthk_user_agent(&self) -> Result<String> {
        match self.get_value(&key("user_agent")) {
            Ok(Value::String(ua)) if !ua.trim().is_empty() => Ok(ua),
            _ => {
                self.set_rthk_user_agent(DEFAULT_USER_AGENT)?;
                Ok(DEFAULT_USER_AGENT.to_string())
            }
        }
    }

    fn set_rthk_user_agent(&self, user_agent: &str) -> Result<()> {
        self.set_value(&key("user_agent"), Value::String(user_agent.to_string()))
    }
}
