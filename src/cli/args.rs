use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing::debug;
use wordrace::relay::{appstate::AppState, server};

use crate::config::WordraceConfig;

#[derive(Parser, Debug)]
#[command(version = env!("CARGO_PKG_VERSION"), about = "Keep multiplayer vocabulary quiz rooms in sync")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the room relay. This is also what runs without a subcommand
    Serve {
        /// Port to run the relay on
        #[arg(short, long)]
        port: Option<u16>,
        /// The listen address to run the relay on
        #[arg(short, long)]
        listen_address: Option<String>,
        /// Seconds an empty room is kept so a reloading player can rejoin
        #[arg(short, long)]
        grace_secs: Option<u64>,
    },
}

impl Default for Args {
    fn default() -> Self {
        Self::new()
    }
}

impl Args {
    pub fn new() -> Self {
        Self::parse()
    }

    pub async fn run(&self, cfg: &WordraceConfig) -> anyhow::Result<()> {
        debug!("args: {:#?}", self);
        let (port, listen_address, grace_secs) = match &self.command {
            Some(Commands::Serve {
                port,
                listen_address,
                grace_secs,
            }) => (*port, listen_address.clone(), *grace_secs),
            None => (None, None, None),
        };

        let port = port.unwrap_or(cfg.app_port);
        let address = listen_address.unwrap_or_else(|| cfg.app_host.clone());
        let grace_period = grace_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| cfg.room_grace_period());
        debug!(
            environment = %cfg.app_environment,
            grace_secs = grace_period.as_secs(),
            "starting relay"
        );

        server::start_ws(port, &address, AppState::with_grace_period(grace_period)).await
    }
}
