//! Implementation of the `c2wasm build-js` command.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use c2wasm_lib::{BuildRequest, OutputKind, SourceFile};
use tracing::debug;

use super::{ensure_dir, print_reports, save_result};
use crate::client::Client;
use crate::output::OutputFormat;
use crate::sources::{bundle_typescript, clean_bundle, file_stem, read_source};

/// Execute the build-js command.
///
/// `.js` files are submitted as they are. `.ts` files are bundled with
/// esbuild first, and the bundle cleaned of module syntax after its export
/// list is checked. Writes `<out_dir>/<stem>.bc`, or `<stem>.log` on failure.
pub fn cmd_build_js(client: &Client, file: &Path, out_dir: &Path, format: OutputFormat) -> Result<()> {
  if file.is_dir() {
    bail!("build-js builds single files only: {} is a directory", file.display());
  }
  let extension = file.extension().and_then(|ext| ext.to_str()).unwrap_or_default();
  if !matches!(extension, "js" | "ts") {
    bail!("Invalid file type: {} must be a .js or .ts file", file.display());
  }
  ensure_dir(out_dir)?;

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(async {
    let source = if extension == "ts" {
      bundled_source(file).await?
    } else {
      read_source(file, "js", None)?
    };

    let mut request = BuildRequest::new(OutputKind::Bytecode, vec![source]);
    request.compress = Some(true);

    let started = Instant::now();
    let result = client
      .build(&request)
      .await
      .with_context(|| format!("Failed to build {}", file.display()))?;

    let stem = file_stem(file)?;
    save_result(
      out_dir,
      &file.display().to_string(),
      &stem,
      "bc",
      &result,
      true,
      started.elapsed(),
    )
  })?;

  if print_reports(std::slice::from_ref(&report), format)? > 0 {
    bail!("Build of {} failed: {}", file.display(), report.message);
  }
  Ok(())
}

/// Bundle a TypeScript entry point and clean the bundle into a JS source.
async fn bundled_source(file: &Path) -> Result<SourceFile> {
  let dist = tempfile::Builder::new()
    .prefix("c2wasm-dist")
    .tempdir()
    .context("Failed to create bundle directory")?;
  let bundle = bundle_typescript(file, dist.path()).await?;
  debug!(bundle = %bundle.display(), "bundled");

  let code = tokio::fs::read_to_string(&bundle)
    .await
    .with_context(|| format!("Failed to read {}", bundle.display()))?;
  let cleaned = clean_bundle(&code).with_context(|| format!("Bundle of {} is not a hook module", file.display()))?;

  Ok(SourceFile {
    language: "js".to_string(),
    name: format!("{}.js", file_stem(file)?),
    options: None,
    content: cleaned,
  })
}
