//! Server setup and lifecycle management

use anyhow::{Context, Result};
use c2wasm_lib::Toolchain;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::routes::create_router;
use crate::state::AppState;

/// Bind and serve until interrupted.
pub async fn run(config: Config) -> Result<()> {
  let toolchain = Toolchain::from_env();
  info!(
    compiler = %toolchain.compiler.display(),
    optimizer = %toolchain.optimizer.display(),
    bytecode_compiler = %toolchain.bytecode_compiler.display(),
    "toolchain resolved"
  );

  let work_dir = config.work_dir();
  tokio::fs::create_dir_all(&work_dir)
    .await
    .with_context(|| format!("Failed to create work dir {}", work_dir.display()))?;

  let app = create_router(AppState::new(toolchain, work_dir));

  let addr = config.listen_addr();
  let listener = TcpListener::bind(addr)
    .await
    .with_context(|| format!("Failed to bind {}", addr))?;
  info!(%addr, "c2wasm-api listening");

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

  info!("c2wasm-api shut down");
  Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(err) = tokio::signal::ctrl_c().await {
      error!(error = %err, "failed to install Ctrl+C handler");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut signal) => {
        signal.recv().await;
      }
      Err(err) => {
        error!(error = %err, "failed to install SIGTERM handler");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => info!("received Ctrl+C, shutting down"),
    _ = terminate => info!("received SIGTERM, shutting down"),
  }
}
