//! Credential supply for upstream requests.
//!
//! The models cache never acquires or rotates credentials itself; it asks a
//! [`TokenProvider`] for a bearer token before every refresh. This module
//! ships the trait, a fixed-token implementation, and discovery of the
//! GitHub Copilot OAuth token that editors leave on disk.
//!
//! # OAuth token discovery
//!
//! [`discover_oauth_token()`] checks, in order:
//! 1. an explicit token (usually `COPILOT_OAUTH_TOKEN`, see [`Config`](crate::Config))
//! 2. `%LOCALAPPDATA%/github-copilot/apps.json` on Windows,
//!    `~/.config/github-copilot/apps.json` elsewhere
//!
//! A missing or unreadable `apps.json` is "not found", never an error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{GatewayError, Result};

/// Supplies the bearer credential for upstream requests.
///
/// Implementations may refresh or rotate tokens internally; callers treat
/// the returned value as opaque and never cache it.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a token valid for the next request.
    async fn token(&self) -> Result<String>;
}

/// A provider that always returns the same token.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<String> {
        if self.token.is_empty() {
            return Err(GatewayError::Auth("token is empty".to_string()));
        }
        Ok(self.token.clone())
    }
}

/// One entry of the editor's `apps.json`, keyed by `<host>:<app id>`.
///
/// Only the token is read; `user` and `githubAppId` are ignored.
#[derive(Debug, Deserialize)]
struct AppEntry {
    #[serde(default)]
    oauth_token: Option<String>,
}

/// Resolve the Copilot OAuth token: `explicit` first, then `apps.json`.
///
/// Empty strings count as absent.
pub fn discover_oauth_token(explicit: Option<&str>) -> Option<String> {
    if let Some(token) = explicit.filter(|t| !t.is_empty()) {
        return Some(token.to_string());
    }
    let path = default_apps_path()?;
    let token = read_apps_token(&path);
    if token.is_none() {
        warn!("Copilot OAuth token not found in environment or apps.json");
    }
    token
}

/// Platform-specific location of `apps.json`, if determinable.
pub fn default_apps_path() -> Option<PathBuf> {
    if cfg!(windows) {
        std::env::var_os("LOCALAPPDATA")
            .filter(|v| !v.is_empty())
            .map(|dir| PathBuf::from(dir).join("github-copilot").join("apps.json"))
    } else {
        dirs::home_dir().map(|home| {
            home.join(".config")
                .join("github-copilot")
                .join("apps.json")
        })
    }
}

/// Read the first non-empty `oauth_token` from an `apps.json` file.
///
/// Returns `None` on a missing, unreadable or malformed file.
pub fn read_apps_token(path: &Path) -> Option<String> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read apps.json");
            return None;
        }
    };
    let apps: HashMap<String, AppEntry> = match serde_json::from_str(&content) {
        Ok(apps) => apps,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt apps.json");
            return None;
        }
    };
    // HashMap order is arbitrary; sort keys so the choice is stable.
    let mut keys: Vec<&String> = apps.keys().collect();
    keys.sort();
    let token = keys
        .into_iter()
        .filter_map(|k| apps[k].oauth_token.as_deref())
        .find(|t| !t.is_empty())
        .map(str::to_string);
    if token.is_some() {
        debug!(path = %path.display(), "found Copilot OAuth token in apps.json");
    }
    token
}
