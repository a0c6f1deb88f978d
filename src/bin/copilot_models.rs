//! copilot-models - inspect the GitHub Copilot model listing.
//!
//! Builds the same proxy-aware client and models cache the gateway uses,
//! performs the initial fetch, and prints or snapshots the result.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use copilot_gateway::auth::{StaticTokenProvider, discover_oauth_token};
use copilot_gateway::{Config, GatewayError, ModelsBlob, ModelsCache, http};

/// Copilot models CLI
#[derive(Parser)]
#[command(name = "copilot-models")]
#[command(version = copilot_gateway::PKG_VERSION)]
#[command(about = "Fetch and inspect the GitHub Copilot model listing")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at info level (RUST_LOG overrides).
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List model ids
    List,

    /// Print the raw models JSON, or save it as a snapshot
    Dump {
        /// Write the snapshot here instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the resolved configuration (secrets redacted)
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    let default_level = if args.verbose || config.debug {
        "info"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Config => println!("{config:#?}"),
        Command::List => {
            let (_, models) = connect(&config).await?;
            for id in models.model_ids() {
                println!("{id}");
            }
        }
        Command::Dump { output } => {
            let (cache, models) = connect(&config).await?;
            match output {
                Some(path) => {
                    cache.save_to_file(&path).await?;
                    println!("saved {} bytes to {}", models.len(), path.display());
                }
                None => {
                    println!("{}", String::from_utf8_lossy(models.as_bytes()));
                    if let Some(ref path) = config.models.cache_path {
                        cache.save_to_file(path).await?;
                        info!(path = %path.display(), "updated models snapshot");
                    }
                }
            }
        }
    }

    Ok(())
}

/// Build the client and cache from configuration and read the listing once.
///
/// Falls back to the configured snapshot when the initial fetch fails.
async fn connect(config: &Config) -> copilot_gateway::Result<(ModelsCache, ModelsBlob)> {
    let token = discover_oauth_token(config.auth.oauth_token.as_deref()).ok_or_else(|| {
        GatewayError::Auth(
            "no Copilot OAuth token: set COPILOT_OAUTH_TOKEN or sign in to Copilot in an editor"
                .to_string(),
        )
    })?;
    let client = http::build_client(&config.http_config())?;
    let tokens = Arc::new(StaticTokenProvider::new(token));

    let fetched =
        ModelsCache::new(config.models_cache_config(), tokens.clone(), client.clone()).await;
    let cache = match fetched {
        Ok(cache) => cache,
        Err(e) => {
            let Some(path) = config.models.cache_path.as_deref() else {
                return Err(e);
            };
            let cache = ModelsCache::empty(config.models_cache_config(), tokens, client);
            if let Err(load_err) = cache.load_from_file(path).await {
                warn!(path = %path.display(), error = %load_err, "models snapshot unusable");
                return Err(e);
            }
            warn!(
                error = %e.root(),
                path = %path.display(),
                "upstream unavailable, using models snapshot"
            );
            cache
        }
    };
    let models = cache.models().await?;
    Ok((cache, models))
}
