//! Application state for API handlers

use std::path::PathBuf;
use std::sync::Arc;

use c2wasm_lib::Toolchain;
use c2wasm_lib::consts::BUILD_PREFIX;
use uuid::Uuid;

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
  pub toolchain: Arc<Toolchain>,
  /// Parent directory of every build workspace
  pub work_dir: Arc<PathBuf>,
}

impl AppState {
  pub fn new(toolchain: Toolchain, work_dir: PathBuf) -> Self {
    Self {
      toolchain: Arc::new(toolchain),
      work_dir: Arc::new(work_dir),
    }
  }

  /// A base path no other build has used.
  pub fn next_base(&self) -> PathBuf {
    self.work_dir.join(format!("{}{}", BUILD_PREFIX, Uuid::new_v4()))
  }
}
