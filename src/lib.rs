//! copilot-gateway - local gateway to GitHub Copilot's model listing
//!
//! The core of this crate is [`ModelsCache`], a stale-while-revalidate cache
//! for the Copilot `/models` endpoint: reads are served from memory, stale
//! data is returned immediately while a detached refresh runs, and failed
//! refreshes never discard the last good listing. Around it sit the pieces
//! needed to talk to Copilot: credential discovery ([`auth`]), a
//! proxy-aware HTTP client ([`http`]) and layered configuration
//! ([`config`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use copilot_gateway::auth::{StaticTokenProvider, discover_oauth_token};
//! use copilot_gateway::{Config, ModelsCache, http};
//!
//! #[tokio::main]
//! async fn main() -> copilot_gateway::Result<()> {
//!     let config = Config::load(None)?;
//!     let client = http::build_client(&config.http_config())?;
//!     let token = discover_oauth_token(config.auth.oauth_token.as_deref()).unwrap_or_default();
//!
//!     let cache = ModelsCache::new(
//!         config.models_cache_config(),
//!         Arc::new(StaticTokenProvider::new(token)),
//!         client,
//!     )
//!     .await?;
//!
//!     let models = cache.models().await?;
//!     println!("{}", String::from_utf8_lossy(models.as_bytes()));
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod telemetry;

// Re-export main types at crate root
pub use auth::{StaticTokenProvider, TokenProvider};
pub use config::Config;
pub use error::{GatewayError, Result};
pub use models::{CacheStatus, ModelsBlob, ModelsCache, ModelsCacheConfig};

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
