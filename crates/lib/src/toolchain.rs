//! Locations of the external tools a build drives.
//!
//! Every path can be overridden from the environment; the defaults match the
//! layout of the service's container image.

use std::path::{Path, PathBuf};

/// The external toolchain used by the pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
  /// C cross-compiler driver (also performs the link).
  pub compiler: PathBuf,
  /// WASI sysroot passed to the compiler.
  pub sysroot: PathBuf,
  /// Include directory used when a request supplies no headers.
  pub default_include_dir: PathBuf,
  /// WebAssembly optimizer.
  pub optimizer: PathBuf,
  /// Binary cleanup utility run when a request asks for stripping.
  pub cleaner: PathBuf,
  /// Verification utility every native artifact must pass.
  pub guard_checker: PathBuf,
  /// JavaScript bytecode compiler.
  pub bytecode_compiler: PathBuf,
}

impl Toolchain {
  /// Layout of a WASI SDK rooted at `sdk_dir`, with the remaining tools
  /// looked up on `PATH`.
  pub fn from_sdk_dir(sdk_dir: &Path, include_dir: &Path) -> Self {
    Self {
      compiler: sdk_dir.join("bin").join("clang"),
      sysroot: sdk_dir.join("share").join("wasi-sysroot"),
      default_include_dir: include_dir.to_path_buf(),
      optimizer: PathBuf::from("wasm-opt"),
      cleaner: PathBuf::from("hook-cleaner"),
      guard_checker: PathBuf::from("guard_checker"),
      bytecode_compiler: PathBuf::from("qjsc"),
    }
  }

  /// Resolve the toolchain from the environment.
  ///
  /// - `WASI_SDK_DIR` (default `./clang/wasi-sdk`)
  /// - `C2WASM_INCLUDE_DIR` (default `./clang/includes`)
  /// - `WASM_OPT`, `HOOK_CLEANER`, `GUARD_CHECKER`, `QJSC` override single tools
  pub fn from_env() -> Self {
    let sdk_dir = env_path("WASI_SDK_DIR").unwrap_or_else(|| PathBuf::from("clang").join("wasi-sdk"));
    let include_dir = env_path("C2WASM_INCLUDE_DIR").unwrap_or_else(|| PathBuf::from("clang").join("includes"));

    let mut toolchain = Self::from_sdk_dir(&sdk_dir, &include_dir);
    if let Some(path) = env_path("WASM_OPT") {
      toolchain.optimizer = path;
    }
    if let Some(path) = env_path("HOOK_CLEANER") {
      toolchain.cleaner = path;
    }
    if let Some(path) = env_path("GUARD_CHECKER") {
      toolchain.guard_checker = path;
    }
    if let Some(path) = env_path("QJSC") {
      toolchain.bytecode_compiler = path;
    }
    toolchain
  }
}

fn env_path(var: &str) -> Option<PathBuf> {
  std::env::var_os(var).filter(|v| !v.is_empty()).map(PathBuf::from)
}
