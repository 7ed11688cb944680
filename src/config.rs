use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Weekday;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

// =============================================================================
// Time-related constants
// =============================================================================

/// Default freshness window of a cached resolution in seconds (1 hour)
pub const DEFAULT_CACHE_EXPIRATION_SECS: u64 = 60 * 60;

/// Smallest freshness window a caller may request in seconds (15 minutes)
pub const MIN_CACHE_EXPIRATION_SECS: u64 = 15 * 60;

/// Delay between attempts on the same listing page in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Timeout for a single listing request in milliseconds (30 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

// =============================================================================
// Storage constants
// =============================================================================

/// Attempts per listing page before the enumeration is abandoned
pub const DEFAULT_MAX_PAGE_ATTEMPTS: u32 = 10;

/// Blob service endpoint, `{account}` is replaced by the storage account
pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://{account}.blob.core.windows.net";

pub const DEFAULT_STORAGE_ACCOUNT: &str = "bcartifacts";

/// EULA-gated account holding pre-release builds
pub const DEFAULT_INSIDER_ACCOUNT: &str = "bcinsider";

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "ARTIFACT_RESOLVER_CONFIG";

const APP_DIR: &str = "artifact-resolver";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Resolver configuration structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolverConfig {
    pub storage: StorageConfig,
    pub listing: ListingConfig,
    pub cache: CacheConfig,
    pub calendar: CalendarConfig,
    /// Extra or overriding entries for the sandbox country alias table
    pub country_aliases: HashMap<String, String>,
}

/// Blob store location
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageConfig {
    pub endpoint: String,
    pub default_account: String,
    pub insider_account: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_STORAGE_ENDPOINT.to_string(),
            default_account: DEFAULT_STORAGE_ACCOUNT.to_string(),
            insider_account: DEFAULT_INSIDER_ACCOUNT.to_string(),
        }
    }
}

/// Listing retry behavior
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ListingConfig {
    pub max_page_attempts: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_ms: u64,
}

impl ListingConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            max_page_attempts: DEFAULT_MAX_PAGE_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

/// Cache-related configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Freshness window used when a request does not specify one
    pub default_expiration_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_expiration_secs: DEFAULT_CACHE_EXPIRATION_SECS,
        }
    }
}

/// Calendar used by the periodic strategies
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CalendarConfig {
    pub week_start: Weekday,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            week_start: Weekday::Sun,
        }
    }
}

impl ResolverConfig {
    /// Load the config file at `path`, using defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.storage.endpoint.contains("{account}") {
            return Err(ConfigError::Invalid(format!(
                "storage.endpoint '{}' must contain {{account}}",
                self.storage.endpoint
            )));
        }
        if self.listing.max_page_attempts == 0 {
            return Err(ConfigError::Invalid(
                "listing.maxPageAttempts must be at least 1".to_string(),
            ));
        }
        if self.cache.default_expiration_secs < MIN_CACHE_EXPIRATION_SECS {
            return Err(ConfigError::Invalid(format!(
                "cache.defaultExpirationSecs must be at least {}",
                MIN_CACHE_EXPIRATION_SECS
            )));
        }
        Ok(())
    }
}

/// Returns the path to the config file.
/// Uses $ARTIFACT_RESOLVER_CONFIG if set, otherwise
/// $XDG_CONFIG_HOME/artifact-resolver/config.json,
/// falling back to ~/.config/artifact-resolver/config.json.
pub fn config_path() -> PathBuf {
    config_path_with_env(
        std::env::var(CONFIG_PATH_ENV).ok(),
        std::env::var("XDG_CONFIG_HOME").ok(),
        dirs::home_dir(),
    )
}

/// Returns the path to the data directory used for log files.
pub fn data_dir() -> PathBuf {
    app_dir_with_env(
        std::env::var("XDG_DATA_HOME").ok(),
        dirs::home_dir(),
        ".local/share",
    )
}

fn config_path_with_env(
    explicit: Option<String>,
    xdg_config_home: Option<String>,
    home_dir: Option<PathBuf>,
) -> PathBuf {
    if let Some(path) = explicit.filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    app_dir_with_env(xdg_config_home, home_dir, ".config").join("config.json")
}

fn app_dir_with_env(
    xdg_home: Option<String>,
    home_dir: Option<PathBuf>,
    fallback: &str,
) -> PathBuf {
    let base = xdg_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(fallback)))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn resolver_config_from_partial_object_uses_defaults_for_missing_fields() {
        let result = serde_json::from_value::<ResolverConfig>(json!({
            "cache": {
                "defaultExpirationSecs": 7200
            }
        }))
        .unwrap();

        assert_eq!(result.cache.default_expiration_secs, 7200);
        assert_eq!(result.storage, StorageConfig::default());
        assert_eq!(result.listing, ListingConfig::default());
        assert_eq!(result.calendar.week_start, Weekday::Sun);
    }

    #[test]
    fn resolver_config_from_full_object_parses_all_fields() {
        let result = serde_json::from_value::<ResolverConfig>(json!({
            "storage": {
                "endpoint": "http://localhost:10000/{account}",
                "defaultAccount": "artifacts",
                "insiderAccount": "insider"
            },
            "listing": {
                "maxPageAttempts": 3,
                "retryDelayMs": 0,
                "requestTimeoutMs": 1000
            },
            "cache": { "defaultExpirationSecs": 900 },
            "calendar": { "weekStart": "Mon" },
            "countryAliases": { "xx": "w1" }
        }))
        .unwrap();

        assert_eq!(
            result,
            ResolverConfig {
                storage: StorageConfig {
                    endpoint: "http://localhost:10000/{account}".to_string(),
                    default_account: "artifacts".to_string(),
                    insider_account: "insider".to_string(),
                },
                listing: ListingConfig {
                    max_page_attempts: 3,
                    retry_delay_ms: 0,
                    request_timeout_ms: 1000,
                },
                cache: CacheConfig {
                    default_expiration_secs: 900
                },
                calendar: CalendarConfig {
                    week_start: Weekday::Mon
                },
                country_aliases: HashMap::from([("xx".to_string(), "w1".to_string())]),
            }
        );
    }

    #[test]
    fn load_returns_defaults_when_file_is_missing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.json");
        let config = ResolverConfig::load(&path).unwrap();
        assert_eq!(config, ResolverConfig::default());
    }

    #[test]
    fn load_rejects_expiration_below_minimum() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{"cache": {"defaultExpirationSecs": 60}}"#).unwrap();

        let result = ResolverConfig::load(&path);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        match ResolverConfig::load(&path) {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn validate_rejects_endpoint_without_account_placeholder() {
        let mut config = ResolverConfig::default();
        config.storage.endpoint = "https://example.com".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn config_path_with_env_prefers_explicit_path() {
        let path = config_path_with_env(
            Some("/etc/resolver.json".to_string()),
            Some("/tmp/config".to_string()),
            Some(PathBuf::from("/home/user")),
        );
        assert_eq!(path, PathBuf::from("/etc/resolver.json"));
    }

    #[test]
    fn config_path_with_env_uses_xdg_config_home_when_set() {
        let path = config_path_with_env(
            None,
            Some("/tmp/config".to_string()),
            Some(PathBuf::from("/home/user")),
        );
        assert_eq!(
            path,
            PathBuf::from("/tmp/config/artifact-resolver/config.json")
        );
    }

    #[test]
    fn config_path_with_env_falls_back_to_home_config() {
        let path = config_path_with_env(None, None, Some(PathBuf::from("/home/user")));
        assert_eq!(
            path,
            PathBuf::from("/home/user/.config/artifact-resolver/config.json")
        );
    }

    #[test]
    fn app_dir_with_env_falls_back_to_current_dir_when_no_dirs_available() {
        let path = app_dir_with_env(None, None, ".local/share");
        assert_eq!(path, PathBuf::from("./artifact-resolver"));
    }

    #[test]
    #[serial]
    fn config_path_reads_override_from_environment() {
        // SAFETY: serialized with other env-mutating tests
        unsafe { std::env::set_var(CONFIG_PATH_ENV, "/srv/resolver/config.json") };
        let path = config_path();
        unsafe { std::env::remove_var(CONFIG_PATH_ENV) };

        assert_eq!(path, PathBuf::from("/srv/resolver/config.json"));
    }
}
