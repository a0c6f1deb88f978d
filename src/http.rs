//! Outbound HTTP client construction.
//!
//! Every upstream request goes through one shared [`reqwest::Client`] built
//! here: rustls with TLS 1.2 as the floor, a bounded idle pool, a fixed
//! overall timeout, and an explicit proxy taken from the standard proxy
//! environment variables.
//!
//! The client is always passed in explicitly; there is no process-wide
//! fallback client.

use std::time::Duration;

use reqwest::Client;
use tracing::info;

use crate::{GatewayError, Result};

/// Proxy variables in precedence order: HTTPS-specific, HTTP-specific, catch-all.
pub const PROXY_ENV_VARS: &[&str] = &[
    "HTTPS_PROXY",
    "https_proxy",
    "HTTP_PROXY",
    "http_proxy",
    "ALL_PROXY",
    "all_proxy",
];

/// Transport settings for [`build_client()`].
///
/// ```rust
/// # use copilot_gateway::http::HttpConfig;
/// # use std::time::Duration;
/// let config = HttpConfig::new()
///     .proxy("http://proxy.internal:3128")
///     .timeout(Duration::from_secs(10));
/// assert_eq!(config.max_idle_per_host, 10);
/// ```
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Proxy URL for all schemes. `None` disables proxying entirely.
    pub proxy: Option<String>,
    /// Overall request timeout. Default: 30s.
    pub timeout: Duration,
    /// Maximum idle connections kept per host. Default: 10.
    pub max_idle_per_host: usize,
    /// How long an idle connection is kept. Default: 90s.
    pub idle_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout: Duration::from_secs(30),
            max_idle_per_host: 10,
            idle_timeout: Duration::from_secs(90),
        }
    }
}

impl HttpConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route all requests through `url`.
    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy = Some(url.into());
        self
    }

    /// Set the overall request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// First non-empty proxy URL among [`PROXY_ENV_VARS`], read through `lookup`.
pub fn proxy_from_lookup<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    PROXY_ENV_VARS
        .iter()
        .filter_map(|var| lookup(var))
        .find(|v| !v.is_empty())
}

/// Build the shared HTTP client.
///
/// Fails with [`GatewayError::Configuration`] on an unparsable proxy URL.
pub fn build_client(config: &HttpConfig) -> Result<Client> {
    let mut builder = Client::builder()
        .use_rustls_tls()
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .pool_max_idle_per_host(config.max_idle_per_host)
        .pool_idle_timeout(config.idle_timeout)
        .timeout(config.timeout);

    match config.proxy.as_deref() {
        Some(url) => {
            let proxy = reqwest::Proxy::all(url).map_err(|e| {
                GatewayError::Configuration(format!("invalid proxy URL {url:?}: {e}"))
            })?;
            info!(proxy = url, "using HTTP proxy");
            builder = builder.proxy(proxy);
        }
        None => builder = builder.no_proxy(),
    }

    builder
        .build()
        .map_err(|e| GatewayError::Configuration(format!("failed to build HTTP client: {e}")))
}
