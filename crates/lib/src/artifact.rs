//! Artifact packaging.
//!
//! Native artifacts are read as bytes. Bytecode artifacts are C source text
//! with the bytecode embedded as an array literal, decoded by a strict parser:
//!
//! ```c
//! const uint8_t qjsc_hook[4] = {
//!  0x43, 0x02, 0x0a, 0xff,
//! };
//! ```
//!
//! Either way the bytes are then optionally zlib-compressed and base64-encoded.

use std::io::Write;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::write::ZlibEncoder;

use crate::pipeline::types::BuildError;

pub async fn read_artifact(path: &Path) -> Result<Vec<u8>, BuildError> {
  tokio::fs::read(path).await.map_err(|source| BuildError::ReadArtifact {
    path: path.to_path_buf(),
    source,
  })
}

/// Compress `bytes` if requested, then base64-encode them for transport.
pub fn encode(bytes: &[u8], compress: bool) -> Result<String, BuildError> {
  if !compress {
    return Ok(STANDARD.encode(bytes));
  }

  let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
  encoder.write_all(bytes).map_err(BuildError::Compress)?;
  let compressed = encoder.finish().map_err(BuildError::Compress)?;
  Ok(STANDARD.encode(compressed))
}

/// Decode the byte array literal embedded in generated C source.
///
/// Returns an empty vector when the text holds no well-formed array: no
/// brace-delimited block, an empty block, a token that is not `0x` followed
/// by one or two hex digits, a declared `[N]` length that disagrees with
/// the number of tokens, or a further block after the first. Callers must treat an empty result as a failure.
pub fn extract_bytecode(text: &str) -> Vec<u8> {
  parse_byte_array(text).unwrap_or_default()
}

fn parse_byte_array(text: &str) -> Option<Vec<u8>> {
  let open = text.find('{')?;
  let body_and_rest = &text[open + 1..];
  let close = body_and_rest.find('}')?;
  let body = &body_and_rest[..close];
  // One source compiles to one array; a second block means bytes would be lost.
  if body.contains('{') || body_and_rest[close + 1..].contains('{') {
    return None;
  }

  let mut bytes = Vec::new();
  let mut tokens = body.split(',').map(str::trim).peekable();
  while let Some(token) = tokens.next() {
    if token.is_empty() {
      // Only a single trailing comma after at least one byte.
      if tokens.peek().is_none() && !bytes.is_empty() {
        break;
      }
      return None;
    }
    bytes.push(parse_hex_byte(token)?);
  }

  if bytes.is_empty() {
    return None;
  }

  match declared_length(&text[..open]) {
    Some(declared) if declared != bytes.len() => None,
    _ => Some(bytes),
  }
}

fn parse_hex_byte(token: &str) -> Option<u8> {
  let digits = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X"))?;
  if !(1..=2).contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
    return None;
  }
  u8::from_str_radix(digits, 16).ok()
}

/// The `N` of a declaration ending in `[N] =`, if the text right before the
/// opening brace has that shape.
fn declared_length(head: &str) -> Option<usize> {
  let head = head.trim_end().strip_suffix('=')?.trim_end();
  let head = head.strip_suffix(']')?;
  let start = head.rfind('[')?;
  head[start + 1..].trim().parse().ok()
}
