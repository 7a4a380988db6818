//! Service configuration.

use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

/// c2wasm build service
#[derive(Debug, Parser)]
#[command(name = "c2wasm-api")]
#[command(author, version, about, long_about = None)]
pub struct Config {
  /// Address to listen on
  #[arg(long, env = "HOST", default_value_t = IpAddr::V6(Ipv6Addr::UNSPECIFIED))]
  pub host: IpAddr,

  /// Port to listen on
  #[arg(long, env = "PORT", default_value_t = 9000)]
  pub port: u16,

  /// Directory build workspaces are created in (default: system temp dir)
  #[arg(long, env = "C2WASM_WORK_DIR")]
  pub work_dir: Option<PathBuf>,

  /// Log filter used when RUST_LOG is unset
  #[arg(long, env = "C2WASM_LOG", default_value = "info")]
  pub log_level: String,
}

impl Config {
  pub fn listen_addr(&self) -> SocketAddr {
    SocketAddr::new(self.host, self.port)
  }

  pub fn work_dir(&self) -> PathBuf {
    self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
  }
}
