mod build;
mod build_js;
mod headers;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use c2wasm_lib::BuildResult;
use serde::Serialize;

use crate::client::decode_output;
use crate::output::{OutputFormat, print_built, print_failed, print_json};

pub use build::cmd_build;
pub use build_js::cmd_build_js;
pub use headers::cmd_headers;

/// What happened to one submitted source.
#[derive(Debug, Serialize)]
pub struct BuildReport {
  pub source: String,
  pub success: bool,
  pub message: String,
  /// The artifact on success, the failure log otherwise.
  pub path: PathBuf,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub size: Option<u64>,
  #[serde(skip)]
  pub console: String,
  #[serde(skip)]
  pub elapsed: Duration,
}

/// Write a build result to `out_dir`: `<stem>.<extension>` on success,
/// `<stem>.log` holding every failed task's console output otherwise.
pub fn save_result(
  out_dir: &Path,
  source: &str,
  stem: &str,
  extension: &str,
  result: &BuildResult,
  compressed: bool,
  elapsed: Duration,
) -> Result<BuildReport> {
  if result.success {
    let bytes = decode_output(&result.output, compressed)?;
    let path = out_dir.join(format!("{}.{}", stem, extension));
    std::fs::write(&path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    return Ok(BuildReport {
      source: source.to_string(),
      success: true,
      message: result.message.clone(),
      path,
      size: Some(bytes.len() as u64),
      console: String::new(),
      elapsed,
    });
  }

  let console = result.failure_log();
  let path = out_dir.join(format!("{}.log", stem));
  std::fs::write(&path, &console).with_context(|| format!("Failed to write {}", path.display()))?;
  Ok(BuildReport {
    source: source.to_string(),
    success: false,
    message: result.message.clone(),
    path,
    size: None,
    console,
    elapsed,
  })
}

/// Print reports and return how many builds failed.
pub fn print_reports(reports: &[BuildReport], format: OutputFormat) -> Result<usize> {
  let failed = reports.iter().filter(|report| !report.success).count();

  if format.is_json() {
    print_json(&reports)?;
    return Ok(failed);
  }

  for report in reports {
    if report.success {
      print_built(&report.path, report.size.unwrap_or_default(), report.elapsed);
    } else {
      print_failed(&report.source, &report.message, &report.path, &report.console);
    }
  }
  Ok(failed)
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
  if dir.exists() && !dir.is_dir() {
    anyhow::bail!("Output path must be a directory: {}", dir.display());
  }
  std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use c2wasm_lib::TaskRecord;
  use tempfile::TempDir;

  #[test]
  fn success_writes_artifact() {
    let temp = TempDir::new().unwrap();
    let result = BuildResult::succeeded("AGFzbQ==".to_string(), vec![]);

    let report = save_result(temp.path(), "a.c", "a", "wasm", &result, false, Duration::ZERO).unwrap();

    assert!(report.success);
    assert_eq!(report.size, Some(4));
    assert_eq!(std::fs::read(temp.path().join("a.wasm")).unwrap(), b"\0asm");
  }

  #[test]
  fn failure_writes_failed_consoles_only() {
    let temp = TempDir::new().unwrap();
    let result = BuildResult::failed(
      "Optimization error",
      vec![
        TaskRecord::new("Compile+Link", true, "clang ok"),
        TaskRecord::new("Optimize (pass 1)", false, "bad section"),
      ],
    );

    let report = save_result(temp.path(), "a.c", "a", "wasm", &result, true, Duration::ZERO).unwrap();

    assert!(!report.success);
    assert_eq!(report.path, temp.path().join("a.log"));
    assert_eq!(std::fs::read_to_string(temp.path().join("a.log")).unwrap(), "bad section");
    assert!(!temp.path().join("a.wasm").exists());
  }

  #[test]
  fn ensure_dir_rejects_files() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("out");
    std::fs::write(&file, "").unwrap();

    assert!(ensure_dir(&file).is_err());
    assert!(ensure_dir(&temp.path().join("new/nested")).is_ok());
  }
}
