//! c2wasm-api: HTTP front for the c2wasm build pipelines.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod routes;
mod server;
mod state;

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
  let config = Config::parse();

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
  tracing_subscriber::fmt().with_env_filter(filter).init();

  server::run(config).await
}
