//! HTTP client for the c2wasm build service.

use std::collections::BTreeMap;
use std::io::Read;

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use c2wasm_lib::{BuildRequest, BuildResult, OutputKind};
use flate2::read::ZlibDecoder;
use serde::Deserialize;
use tracing::debug;

/// Error body the service sends with 4xx/5xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
  error: String,
}

#[derive(Debug, Clone)]
pub struct Client {
  http: reqwest::Client,
  host: String,
}

impl Client {
  pub fn new(host: &str) -> Self {
    Self {
      http: reqwest::Client::new(),
      host: host.trim_end_matches('/').to_string(),
    }
  }

  pub fn host(&self) -> &str {
    &self.host
  }

  /// Submit `request` to the build route for its output kind.
  ///
  /// A failed build is still `Ok`; only transport and service errors are `Err`.
  pub async fn build(&self, request: &BuildRequest) -> Result<BuildResult> {
    let route = match request.output_kind {
      OutputKind::Wasm => "/build",
      OutputKind::Bytecode => "/build/bytecode",
    };
    let url = format!("{}{}", self.host, route);
    debug!(%url, files = request.files.len(), "submitting build");

    let response = self
      .http
      .post(&url)
      .json(request)
      .send()
      .await
      .with_context(|| format!("Failed to reach {}", url))?;

    let status = response.status();
    if !status.is_success() {
      let detail = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
      };
      bail!("Build service rejected the request ({}): {}", status.as_u16(), detail);
    }

    response
      .json()
      .await
      .with_context(|| format!("Invalid build result from {}", url))
  }

  /// The service's default headers, keyed by stem.
  pub async fn header_files(&self) -> Result<BTreeMap<String, String>> {
    let url = format!("{}/header-files", self.host);
    let response = self
      .http
      .get(&url)
      .send()
      .await
      .with_context(|| format!("Failed to reach {}", url))?;

    if !response.status().is_success() {
      bail!("Failed to fetch headers: HTTP {}", response.status());
    }

    response
      .json()
      .await
      .with_context(|| format!("Invalid header list from {}", url))
  }
}

/// Decode a build result's `output` back into the artifact bytes.
pub fn decode_output(output: &str, compressed: bool) -> Result<Vec<u8>> {
  let bytes = STANDARD.decode(output.trim()).context("Build output is not valid base64")?;
  if !compressed {
    return Ok(bytes);
  }

  let mut inflated = Vec::new();
  ZlibDecoder::new(bytes.as_slice())
    .read_to_end(&mut inflated)
    .context("Failed to inflate build output")?;
  Ok(inflated)
}
