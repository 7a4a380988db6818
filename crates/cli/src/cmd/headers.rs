//! Implementation of the `c2wasm headers` command.

use std::path::Path;

use anyhow::{Context, Result};
use c2wasm_lib::validate::is_safe_filename;
use serde::Serialize;

use super::ensure_dir;
use crate::client::Client;
use crate::output::{OutputFormat, format_bytes, print_json, print_stat, print_skipped, print_success};

#[derive(Debug, Serialize)]
struct WrittenHeader {
  name: String,
  size: u64,
}

/// Fetch the service's default headers and write each to `<out_dir>/<stem>.h`.
pub fn cmd_headers(client: &Client, out_dir: &Path, format: OutputFormat) -> Result<()> {
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let headers = rt.block_on(client.header_files())?;
  ensure_dir(out_dir)?;

  let mut written = Vec::new();
  for (stem, content) in &headers {
    let name = format!("{}.h", stem);
    if !is_safe_filename(&name) {
      print_skipped(&format!("Skipping header with unsafe name {:?}", name));
      continue;
    }
    let path = out_dir.join(&name);
    std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    written.push(WrittenHeader {
      name,
      size: content.len() as u64,
    });
  }

  if format.is_json() {
    return print_json(&written);
  }

  print_success(&format!("Wrote {} header(s) to {}", written.len(), out_dir.display()));
  for header in &written {
    print_stat(&header.name, &format_bytes(header.size));
  }
  Ok(())
}
