//! Build request types.
//!
//! These are the immutable inputs to a build, deserialized straight from the
//! JSON body clients send. Field names follow the wire format; the aliases
//! accept the older `output` / `link_options` spellings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The artifact a build produces, and therefore which pipeline runs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputKind {
  /// Native WebAssembly binary from C sources.
  #[serde(rename = "wasm")]
  Wasm,
  /// Bytecode from JavaScript sources.
  #[serde(rename = "bc")]
  Bytecode,
}

impl OutputKind {
  pub fn as_str(self) -> &'static str {
    match self {
      OutputKind::Wasm => "wasm",
      OutputKind::Bytecode => "bc",
    }
  }

  /// Extension of the artifact file written next to the workspace root.
  pub fn artifact_extension(self) -> &'static str {
    self.as_str()
  }
}

impl fmt::Display for OutputKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A source file submitted for compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
  /// Language tag supplied by the client (`c`, `js`, `ts`, ...). Informational only.
  #[serde(rename = "type")]
  pub language: String,
  pub name: String,
  /// Free-form compiler options. Only allow-listed flags ever reach a tool.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options: Option<String>,
  #[serde(rename = "src")]
  pub content: String,
}

/// A header file made available on the include path of the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderFile {
  #[serde(rename = "type")]
  pub language: String,
  pub name: String,
  #[serde(rename = "src")]
  pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
  #[serde(rename = "outputKind", alias = "output")]
  pub output_kind: OutputKind,
  pub files: Vec<SourceFile>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub headers: Option<Vec<HeaderFile>>,
  #[serde(
    default,
    rename = "linkOptions",
    alias = "link_options",
    skip_serializing_if = "Option::is_none"
  )]
  pub link_options: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub compress: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub strip: Option<bool>,
}

impl BuildRequest {
  /// A request for `kind` with the given sources and no extras.
  pub fn new(output_kind: OutputKind, files: Vec<SourceFile>) -> Self {
    Self {
      output_kind,
      files,
      headers: None,
      link_options: None,
      compress: None,
      strip: None,
    }
  }

  pub fn compress(&self) -> bool {
    self.compress.unwrap_or(false)
  }

  pub fn strip(&self) -> bool {
    self.strip.unwrap_or(false)
  }
}
