//! Configuration loading.
//!
//! Configuration comes from an optional TOML file, then environment
//! variables override individual fields. File resolution order:
//! 1. explicit path (CLI `--config`), which must exist
//! 2. `~/.copilot-gateway/config.toml`
//! 3. built-in defaults
//!
//! ```toml
//! debug = false
//!
//! [models]
//! ttl_secs = 600
//! refresh_timeout_secs = 30
//! url = "https://api.githubcopilot.com/models"
//! cache_path = "/var/cache/copilot-gateway/models.json"
//!
//! [http]
//! proxy = "http://proxy.internal:3128"
//! timeout_secs = 30
//! ```
//!
//! Environment overrides:
//!
//! | Variable                              | Field                          |
//! |---------------------------------------|--------------------------------|
//! | `COPILOT_MODELS_TTL_SECS`             | `models.ttl_secs`              |
//! | `COPILOT_MODELS_REFRESH_TIMEOUT_SECS` | `models.refresh_timeout_secs`  |
//! | `COPILOT_MODELS_URL`                  | `models.url`                   |
//! | `COPILOT_MODELS_CACHE_PATH`           | `models.cache_path`            |
//! | `COPILOT_OAUTH_TOKEN`                 | `auth.oauth_token`             |
//! | `COPILOT_TOKEN`                       | `auth.api_token`               |
//! | `DEBUG`                               | `debug`                        |
//! | `HTTPS_PROXY` … `all_proxy`           | `http.proxy`                   |

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::http::{self, HttpConfig};
use crate::models::{DEFAULT_MODELS_URL, ModelsCacheConfig};
use crate::{GatewayError, Result};

/// Gateway configuration.
#[derive(Clone, Default, Deserialize)]
pub struct Config {
    /// Verbose logging.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub models: ModelsSection,
    #[serde(default)]
    pub http: HttpSection,
    #[serde(default)]
    pub auth: AuthSection,
}

/// Models cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsSection {
    /// Seconds before the cached list goes stale (default: 600).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Deadline for a single refresh, in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub refresh_timeout_secs: u64,
    /// Upstream models endpoint.
    #[serde(default = "default_models_url")]
    pub url: String,
    /// Snapshot file for save/restore across restarts.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

impl Default for ModelsSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            refresh_timeout_secs: default_timeout_secs(),
            url: default_models_url(),
            cache_path: None,
        }
    }
}

/// Outbound HTTP settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpSection {
    #[serde(default)]
    pub proxy: Option<String>,
    /// Overall request timeout in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Credentials.
#[derive(Clone, Deserialize)]
pub struct AuthSection {
    /// GitHub Copilot OAuth token; discovered from `apps.json` when absent.
    #[serde(default)]
    pub oauth_token: Option<String>,
    /// Token local clients present to the gateway. Random when unset.
    #[serde(default = "generate_api_token")]
    pub api_token: String,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            oauth_token: None,
            api_token: generate_api_token(),
        }
    }
}

impl fmt::Debug for AuthSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSection")
            .field("oauth_token", &self.oauth_token.as_ref().map(|_| "<redacted>"))
            .field("api_token", &"<redacted>")
            .finish()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("debug", &self.debug)
            .field("models", &self.models)
            .field("http", &self.http)
            .field("auth", &self.auth)
            .finish()
    }
}

fn default_ttl_secs() -> u64 {
    600
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_models_url() -> String {
    DEFAULT_MODELS_URL.to_string()
}

/// 64 hex characters of randomness.
pub fn generate_api_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

impl Config {
    /// Load configuration from the standard locations, then apply the
    /// process environment.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML config file. Environment variables are not applied.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            GatewayError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            GatewayError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(GatewayError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        Ok(dirs::home_dir()
            .map(|home| home.join(".copilot-gateway").join("config.toml"))
            .filter(|p| p.exists()))
    }

    /// Override fields from environment variables read through `lookup`.
    ///
    /// Unparsable numbers and booleans are ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_env(&lookup, "COPILOT_MODELS_TTL_SECS") {
            self.models.ttl_secs = v;
        }
        if let Some(v) = parse_env(&lookup, "COPILOT_MODELS_REFRESH_TIMEOUT_SECS") {
            self.models.refresh_timeout_secs = v;
        }
        if let Some(url) = lookup("COPILOT_MODELS_URL").filter(|v| !v.is_empty()) {
            self.models.url = url;
        }
        if let Some(path) = lookup("COPILOT_MODELS_CACHE_PATH").filter(|v| !v.is_empty()) {
            self.models.cache_path = Some(PathBuf::from(path));
        }
        if let Some(token) = lookup("COPILOT_OAUTH_TOKEN").filter(|v| !v.is_empty()) {
            self.auth.oauth_token = Some(token);
        }
        if let Some(token) = lookup("COPILOT_TOKEN") {
            self.auth.api_token = token;
        }
        if let Some(debug) = lookup("DEBUG").and_then(|raw| parse_bool("DEBUG", &raw)) {
            self.debug = debug;
        }
        if let Some(proxy) = http::proxy_from_lookup(&lookup) {
            self.http.proxy = Some(proxy);
        }
    }

    /// Transport settings derived from this config.
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            proxy: self.http.proxy.clone(),
            timeout: Duration::from_secs(self.http.timeout_secs),
            ..HttpConfig::default()
        }
    }

    /// Models cache settings derived from this config.
    pub fn models_cache_config(&self) -> ModelsCacheConfig {
        ModelsCacheConfig::new()
            .ttl(Duration::from_secs(self.models.ttl_secs))
            .refresh_timeout(Duration::from_secs(self.models.refresh_timeout_secs))
            .endpoint(self.models.url.clone())
    }
}

fn parse_env<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(key, value = %raw, error = %e, "ignoring invalid environment value");
            None
        }
    }
}

/// Boolean in any of the spellings `1`, `t`, `T`, `TRUE`, `true`, `True`
/// and their false counterparts. Anything else warns and yields `None`.
fn parse_bool(key: &str, raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => {
            warn!(key, value = %raw, "ignoring invalid boolean environment value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert!(!config.debug);
        assert_eq!(config.models.ttl_secs, 600);
        assert_eq!(config.models.refresh_timeout_secs, 30);
        assert_eq!(config.models.url, "https://api.githubcopilot.com/models");
        assert!(config.models.cache_path.is_none());
        assert!(config.http.proxy.is_none());
        assert_eq!(config.http.timeout_secs, 30);
        assert!(config.auth.oauth_token.is_none());
    }

    #[test]
    fn generated_api_token_is_64_hex_chars() {
        let token = generate_api_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_api_token());
    }

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [models]
            ttl_secs = 60
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.models.ttl_secs, 60);
        // Defaults preserved
        assert_eq!(config.models.refresh_timeout_secs, 30);
        assert_eq!(config.auth.api_token.len(), 64);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            debug = true

            [models]
            ttl_secs = 120
            refresh_timeout_secs = 5
            url = "http://localhost:9000/models"
            cache_path = "/tmp/models.json"

            [http]
            proxy = "http://proxy:3128"
            timeout_secs = 10

            [auth]
            oauth_token = "gho_file"
            api_token = "local-token"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.debug);
        assert_eq!(config.models.url, "http://localhost:9000/models");
        assert_eq!(config.models.cache_path, Some(PathBuf::from("/tmp/models.json")));
        assert_eq!(config.http.proxy.as_deref(), Some("http://proxy:3128"));
        assert_eq!(config.http.timeout_secs, 10);
        assert_eq!(config.auth.oauth_token.as_deref(), Some("gho_file"));
        assert_eq!(config.auth.api_token, "local-token");

        let cache = config.models_cache_config();
        assert_eq!(cache.ttl, Duration::from_secs(120));
        assert_eq!(cache.refresh_timeout, Duration::from_secs(5));
        assert_eq!(cache.endpoint, "http://localhost:9000/models");

        let http = config.http_config();
        assert_eq!(http.timeout, Duration::from_secs(10));
        assert_eq!(http.proxy.as_deref(), Some("http://proxy:3128"));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config::default();
        config.apply_env(lookup_from(&[
            ("COPILOT_MODELS_TTL_SECS", "30"),
            ("COPILOT_MODELS_URL", "http://mock/models"),
            ("COPILOT_MODELS_CACHE_PATH", "/data/models.json"),
            ("COPILOT_OAUTH_TOKEN", "gho_env"),
            ("COPILOT_TOKEN", "client-secret"),
            ("DEBUG", "true"),
            ("https_proxy", "http://secure-proxy:443"),
        ]));

        assert_eq!(config.models.ttl_secs, 30);
        assert_eq!(config.models.url, "http://mock/models");
        assert_eq!(
            config.models.cache_path,
            Some(PathBuf::from("/data/models.json"))
        );
        assert_eq!(config.auth.oauth_token.as_deref(), Some("gho_env"));
        assert_eq!(config.auth.api_token, "client-secret");
        assert!(config.debug);
        assert_eq!(config.http.proxy.as_deref(), Some("http://secure-proxy:443"));
    }

    #[test]
    fn invalid_env_values_keep_defaults() {
        let mut config = Config::default();
        config.apply_env(lookup_from(&[
            ("COPILOT_MODELS_TTL_SECS", "ten minutes"),
            ("DEBUG", "maybe"),
        ]));
        assert_eq!(config.models.ttl_secs, 600);
        assert!(!config.debug);
    }

    #[test]
    fn debug_accepts_common_boolean_spellings() {
        let cases = [
            ("1", true),
            ("T", true),
            ("True", true),
            ("FALSE", false),
            ("0", false),
        ];
        for (raw, expected) in cases {
            let mut config = Config::default();
            config.debug = !expected;
            config.apply_env(lookup_from(&[("DEBUG", raw)]));
            assert_eq!(config.debug, expected, "DEBUG={raw}");
        }
    }

    #[test]
    fn parse_bool_rejects_other_spellings() {
        assert_eq!(parse_bool("DEBUG", "yes"), None);
        assert_eq!(parse_bool("DEBUG", "tRuE"), None);
        assert_eq!(parse_bool("DEBUG", ""), None);
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let mut config = Config::default();
        config.auth.oauth_token = Some("gho_secret".to_string());
        config.auth.api_token = "api_secret".to_string();
        let printed = format!("{config:?}");
        assert!(!printed.contains("gho_secret"));
        assert!(!printed.contains("api_secret"));
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Config file not found"));
    }

    #[test]
    fn load_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[models]\nrefresh_timeout_secs = 7\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.models.refresh_timeout_secs, 7);
    }

    #[test]
    fn malformed_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[models\nttl_secs = ").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
    }
}
