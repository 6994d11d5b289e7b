//! Runtime settings.
//!
//! Defaults are tuned for municipal code-library hosts; every path and
//! credential can be overridden from the environment:
//!
//! - `ZONEATLAS_HOME`: base directory (default `~/.zoneatlas`)
//! - `ZONEATLAS_CACHE_DIR`: document cache directory
//! - `ZONEATLAS_DB`: SQLite sink path
//! - `ZONEATLAS_REGISTRY`: jurisdiction registry JSON (default: built-in)
//! - `ZONEATLAS_RENDER_ENDPOINT` / `ZONEATLAS_RENDER_KEY`: hosted render service
//! - `ZONEATLAS_CHROMIUM_PATH`: Chromium binary for the browser provider
//! - `ZONEATLAS_MIN_LENGTH`, `ZONEATLAS_CONCURRENCY`, `ZONEATLAS_CACHE_TTL_SECS`:
//!   numeric overrides; unparsable values are ignored with a warning

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use zoneatlas::{JurisdictionRegistry, DEFAULT_MIN_LENGTH};

/// Cached documents stay fresh for a week.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Pause between failed ladder attempts.
pub const DEFAULT_INTER_ATTEMPT_DELAY: Duration = Duration::from_secs(3);

/// Minimum spacing between requests to the same provider.
pub const DEFAULT_PROVIDER_DELAY: Duration = Duration::from_secs(1);

/// Jurisdictions acquired at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Multiplier applied once to the next rendered attempt after a failure.
pub const DEFAULT_ESCALATION_FACTOR: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub home: PathBuf,
    pub cache_dir: PathBuf,
    pub db_path: PathBuf,
    pub review_log: PathBuf,
    pub registry_path: Option<PathBuf>,
    pub cache_ttl: Duration,
    pub inter_attempt_delay: Duration,
    pub provider_delay: Duration,
    pub concurrency: usize,
    pub escalation_factor: f64,
    /// Validator length floor used when a strategy sets none.
    pub min_length: usize,
    pub render_endpoint: Option<String>,
    pub render_key: Option<String>,
    pub chromium_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let home = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".zoneatlas");
        Self::with_home(home)
    }
}

impl RuntimeConfig {
    /// Defaults rooted at `home`.
    pub fn with_home(home: PathBuf) -> Self {
        Self {
            cache_dir: home.join("cache"),
            db_path: home.join("zoneatlas.db"),
            review_log: home.join("review.jsonl"),
            home,
            registry_path: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            inter_attempt_delay: DEFAULT_INTER_ATTEMPT_DELAY,
            provider_delay: DEFAULT_PROVIDER_DELAY,
            concurrency: DEFAULT_CONCURRENCY,
            escalation_factor: DEFAULT_ESCALATION_FACTOR,
            min_length: DEFAULT_MIN_LENGTH,
            render_endpoint: None,
            render_key: None,
            chromium_path: None,
        }
    }

    /// Defaults overlaid with `ZONEATLAS_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = match env_path("ZONEATLAS_HOME") {
            Some(home) => Self::with_home(home),
            None => Self::default(),
        };
        if let Some(dir) = env_path("ZONEATLAS_CACHE_DIR") {
            config.cache_dir = dir;
        }
        if let Some(db) = env_path("ZONEATLAS_DB") {
            config.db_path = db;
        }
        config.registry_path = env_path("ZONEATLAS_REGISTRY");
        config.render_endpoint = env_string("ZONEATLAS_RENDER_ENDPOINT");
        config.render_key = env_string("ZONEATLAS_RENDER_KEY");
        config.chromium_path = env_path("ZONEATLAS_CHROMIUM_PATH");
        if let Some(n) = env_parse::<usize>("ZONEATLAS_MIN_LENGTH") {
            config.min_length = n;
        }
        if let Some(n) = env_parse::<usize>("ZONEATLAS_CONCURRENCY") {
            config.concurrency = n.max(1);
        }
        if let Some(secs) = env_parse::<u64>("ZONEATLAS_CACHE_TTL_SECS") {
            config.cache_ttl = Duration::from_secs(secs);
        }
        config
    }

    /// Load the jurisdiction registry: the configured file, or the built-in table.
    pub fn load_registry(&self) -> Result<JurisdictionRegistry> {
        match &self.registry_path {
            Some(path) => JurisdictionRegistry::from_file(path)
                .with_context(|| format!("failed to load registry: {}", path.display())),
            None => JurisdictionRegistry::builtin().context("built-in registry is invalid"),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_string(key).map(PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_home_layout() {
        let config = RuntimeConfig::with_home(PathBuf::from("/data/za"));
        assert_eq!(config.cache_dir, PathBuf::from("/data/za/cache"));
        assert_eq!(config.db_path, PathBuf::from("/data/za/zoneatlas.db"));
        assert_eq!(config.cache_ttl, DEFAULT_CACHE_TTL);
        assert_eq!(config.min_length, DEFAULT_MIN_LENGTH);
        assert!(config.render_key.is_none());
    }

    #[test]
    fn test_load_builtin_and_file_registry() {
        let config = RuntimeConfig::with_home(PathBuf::from("/tmp/za"));
        assert!(config.load_registry().unwrap().get("orange-county-fl").is_some());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(
            &path,
            r#"{"jurisdictions": [{"id": "town", "name": "Town", "strategies": [{"kind": "stale_cache"}]}]}"#,
        )
        .unwrap();
        let mut config = RuntimeConfig::with_home(dir.path().to_path_buf());
        config.registry_path = Some(path);
        let registry = config.load_registry().unwrap();
        assert_eq!(registry.len(), 1);

        config.registry_path = Some(dir.path().join("missing.json"));
        assert!(config.load_registry().is_err());
    }

    #[test]
    fn test_env_parse_ignores_garbage() {
        std::env::set_var("ZONEATLAS_TEST_PARSE_OK", " 42 ");
        std::env::set_var("ZONEATLAS_TEST_PARSE_BAD", "lots");
        assert_eq!(env_parse::<usize>("ZONEATLAS_TEST_PARSE_OK"), Some(42));
        assert_eq!(env_parse::<usize>("ZONEATLAS_TEST_PARSE_BAD"), None);
        assert_eq!(env_parse::<usize>("ZONEATLAS_TEST_PARSE_UNSET"), None);
    }
}
