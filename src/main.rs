use crate::cli::args::Args;
use crate::config::WordraceConfig;
use dotenvy::dotenv;
use tracing::{error, warn};
use tracing_subscriber::filter::EnvFilter;

mod cli;
mod config;

/// Entry point of the application.
///
/// Loads `.env` and the config file, initializes logging, parses the command
/// line arguments and runs the relay.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from the `.env` file.
    dotenv().ok();

    let loaded = WordraceConfig::load();
    let cfg = loaded
        .as_ref()
        .cloned()
        .unwrap_or_default()
        .with_overrides(|key| std::env::var(key).ok());

    // `RUST_LOG` wins over the configured level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.rust_log));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = &loaded {
        warn!("Could not load config file, using defaults: {e}");
    }

    let args = Args::new();
    if let Err(e) = args.run(&cfg).await {
        error!("{e:#}");
        return Err(e);
    }

    Ok(())
}
