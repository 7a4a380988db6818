//! Implementation of the `c2wasm build` command.
//!
//! Submits each C file as its own native build, all concurrently, with the
//! headers from `--headers` attached to every request.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use c2wasm_lib::{BuildRequest, HeaderFile, OutputKind};
use tokio::task::JoinSet;
use tracing::info;

use super::{BuildReport, ensure_dir, print_reports, save_result};
use crate::client::Client;
use crate::output::{OutputFormat, print_note};
use crate::sources::{C_OPTIONS, collect_c_files, collect_headers, file_name, file_stem, read_source};

/// Execute the build command.
///
/// Writes `<out_dir>/<stem>.wasm` for every successful build and
/// `<out_dir>/<stem>.log` for every failed one. Fails if any build failed.
pub fn cmd_build(
  client: &Client,
  in_path: &Path,
  out_dir: &Path,
  headers: Option<&Path>,
  format: OutputFormat,
) -> Result<()> {
  let files = collect_c_files(in_path)?;
  let headers = match headers {
    Some(dir) => collect_headers(dir)?,
    None => Vec::new(),
  };
  ensure_dir(out_dir)?;

  if !format.is_json() {
    print_note(&format!(
      "Building {} file(s) with {} header(s) on {}",
      files.len(),
      headers.len(),
      client.host()
    ));
  }

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let reports = rt.block_on(build_all(client, files, headers, out_dir))?;

  let failed = print_reports(&reports, format)?;
  if failed > 0 {
    bail!("{} of {} build(s) failed", failed, reports.len());
  }
  Ok(())
}

async fn build_all(
  client: &Client,
  files: Vec<PathBuf>,
  headers: Vec<HeaderFile>,
  out_dir: &Path,
) -> Result<Vec<BuildReport>> {
  let mut set = JoinSet::new();
  for (index, path) in files.into_iter().enumerate() {
    let client = client.clone();
    let headers = headers.clone();
    let out_dir = out_dir.to_path_buf();
    set.spawn(async move { (index, build_one(&client, &path, headers, &out_dir).await) });
  }

  let mut reports = Vec::new();
  while let Some(joined) = set.join_next().await {
    let (index, report) = joined.context("Build task panicked")?;
    reports.push((index, report?));
  }
  reports.sort_by_key(|(index, _)| *index);
  Ok(reports.into_iter().map(|(_, report)| report).collect())
}

async fn build_one(client: &Client, path: &Path, headers: Vec<HeaderFile>, out_dir: &Path) -> Result<BuildReport> {
  let source = read_source(path, "c", Some(C_OPTIONS))?;
  let name = file_name(path)?;
  let stem = file_stem(path)?;

  let mut request = BuildRequest::new(OutputKind::Wasm, vec![source]);
  request.headers = (!headers.is_empty()).then_some(headers);
  request.compress = Some(true);
  request.strip = Some(true);

  let started = Instant::now();
  let result = client
    .build(&request)
    .await
    .with_context(|| format!("Failed to build {}", path.display()))?;
  info!(file = %name, success = result.success, "build finished");

  save_result(out_dir, &name, &stem, "wasm", &result, true, started.elapsed())
}
