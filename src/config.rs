//! Config file loading, XDG path resolution, and range validation.
//!
//! Mirrors the teacher's habit of hand-resolving XDG-style env vars with a
//! `$HOME` fallback rather than pulling in a dedicated crate for it.

use std::env;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::PrismisError;

fn home_dir() -> PathBuf {
    env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("/"))
}

pub fn config_dir() -> PathBuf {
    env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("prismis")
}

pub fn data_dir() -> PathBuf {
    env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
        .join("prismis")
}

pub fn state_dir() -> PathBuf {
    env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
        .join("prismis")
}

pub fn db_path() -> PathBuf {
    data_dir().join("prismis.db")
}

pub fn pid_path() -> PathBuf {
    state_dir().join("daemon.pid")
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    daemon: RawDaemon,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    remote: RawRemote,
    #[serde(default)]
    context: String,
}

#[derive(Debug, Deserialize, Default)]
struct RawDaemon {
    fetch_interval: Option<i64>,
    max_items_per_feed: Option<i64>,
    max_days_lookback: Option<i64>,
    worker_pool: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
struct RawLlm {
    provider: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawRemote {
    url: Option<String>,
    key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub fetch_interval_minutes: u64,
    pub max_items_per_feed: u32,
    pub max_days_lookback: i64,
    pub worker_pool: usize,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
}

/// Parsed but unused by the core; the out-of-scope CLI reads this for
/// routing its commands to a remote daemon.
#[derive(Debug, Clone, Default)]
pub struct RemoteConfig {
    pub url: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub daemon: DaemonConfig,
    pub llm: LlmConfig,
    pub remote: RemoteConfig,
    pub context: String,
}

/// Dereference `env:VAR` values against the process environment. Fails
/// fast if the referenced variable is missing.
fn resolve_api_key(raw: Option<String>) -> Result<Option<String>, PrismisError> {
    match raw {
        None => Ok(None),
        Some(value) => match value.strip_prefix("env:") {
            Some(var) => env::var(var)
                .map(Some)
                .map_err(|_| PrismisError::Config(format!("environment variable {var} is not set"))),
            None => Ok(Some(value)),
        },
    }
}

impl Config {
    /// Load and validate `$XDG_CONFIG_HOME/prismis/config.toml`. Re-read
    /// every cycle by the scheduler so interval/context edits propagate
    /// without a daemon restart.
    pub fn load() -> Result<Self, PrismisError> {
        let path = config_dir().join("config.toml");
        let text = std::fs::read_to_string(&path)
            .map_err(|e| PrismisError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, PrismisError> {
        let raw: RawConfig = toml::from_str(text)
            .map_err(|e| PrismisError::Config(format!("invalid config.toml: {e}")))?;

        let max_items_per_feed = raw.daemon.max_items_per_feed.unwrap_or(50);
        if !(1..=100).contains(&max_items_per_feed) {
            return Err(PrismisError::Config(
                "max_items must be between 1 and 100".to_string(),
            ));
        }

        let fetch_interval = raw.daemon.fetch_interval.unwrap_or(30);
        if fetch_interval < 1 {
            return Err(PrismisError::Config(
                "fetch_interval must be at least 1 minute".to_string(),
            ));
        }

        let max_days_lookback = raw.daemon.max_days_lookback.unwrap_or(7);
        if max_days_lookback < 1 {
            return Err(PrismisError::Config(
                "max_days_lookback must be at least 1".to_string(),
            ));
        }

        let worker_pool = raw.daemon.worker_pool.unwrap_or(4);
        if worker_pool < 1 {
            return Err(PrismisError::Config("worker_pool must be at least 1".to_string()));
        }

        let api_key = resolve_api_key(raw.llm.api_key)?;

        Ok(Config {
            daemon: DaemonConfig {
                fetch_interval_minutes: fetch_interval as u64,
                max_items_per_feed: max_items_per_feed as u32,
                max_days_lookback,
                worker_pool: worker_pool as usize,
            },
            llm: LlmConfig {
                provider: raw.llm.provider.unwrap_or_else(|| "openai".to_string()),
                model: raw.llm.model.unwrap_or_else(|| "gpt-4.1-mini".to_string()),
                api_key,
            },
            remote: RemoteConfig {
                url: raw.remote.url,
                key: raw.remote.key,
            },
            context: raw.context,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_tables_absent() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.daemon.fetch_interval_minutes, 30);
        assert_eq!(cfg.daemon.max_items_per_feed, 50);
        assert_eq!(cfg.daemon.max_days_lookback, 7);
        assert_eq!(cfg.daemon.worker_pool, 4);
    }

    #[test]
    fn rejects_max_items_over_100() {
        let toml = "[daemon]\nmax_items_per_feed = 101\n";
        let err = Config::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("max_items must be between 1 and 100"));
    }

    #[test]
    fn accepts_max_items_at_100() {
        let toml = "[daemon]\nmax_items_per_feed = 100\n";
        assert!(Config::from_toml_str(toml).is_ok());
    }

    #[test]
    fn resolves_env_prefixed_api_key() {
        unsafe { env::set_var("PRISMIS_TEST_KEY", "secret-value") };
        let toml = "[llm]\napi_key = \"env:PRISMIS_TEST_KEY\"\n";
        let cfg = Config::from_toml_str(toml).unwrap();
        assert_eq!(cfg.llm.api_key.as_deref(), Some("secret-value"));
        unsafe { env::remove_var("PRISMIS_TEST_KEY") };
    }

    #[test]
    fn missing_env_var_fails_fast() {
        let toml = "[llm]\napi_key = \"env:PRISMIS_DOES_NOT_EXIST\"\n";
        assert!(Config::from_toml_str(toml).is_err());
    }
}
