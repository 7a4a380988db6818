//! Request validation.
//!
//! Every check here runs before a workspace exists, so a rejected request
//! never touches the filesystem.

use thiserror::Error;

use crate::request::{BuildRequest, HeaderFile, OutputKind, SourceFile};

/// Longest accepted filename extension.
const MAX_EXTENSION_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("Invalid output type {0}")]
  InvalidOutputKind(OutputKind),

  #[error("No source files")]
  NoSourceFiles,

  #[error("Invalid filename {0}")]
  InvalidFilename(String),

  #[error("Per-file compilation options not supported")]
  PerFileOptions,

  #[error("Source file {0} is empty")]
  EmptySource(String),

  #[error("Header file {0} is empty")]
  EmptyHeader(String),
}

/// A request that passed validation, borrowing from the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBuild<'a> {
  pub sources: Vec<&'a SourceFile>,
  pub headers: Vec<&'a HeaderFile>,
  /// The single options string shared by every source (empty when none given).
  pub options: &'a str,
}

/// Validate `request` for the pipeline that produces `expected`.
///
/// Files are checked in request order, each for name, then options, then
/// content; headers are checked afterwards. The first failure wins.
pub fn validate_request(request: &BuildRequest, expected: OutputKind) -> Result<ValidatedBuild<'_>, ValidationError> {
  if request.output_kind != expected {
    return Err(ValidationError::InvalidOutputKind(request.output_kind));
  }

  if request.files.is_empty() {
    return Err(ValidationError::NoSourceFiles);
  }

  let mut options: Option<&str> = None;
  for file in &request.files {
    if !is_safe_filename(&file.name) {
      return Err(ValidationError::InvalidFilename(file.name.clone()));
    }

    match (options, file.options.as_deref().filter(|o| !o.is_empty())) {
      (None, current) => options = current,
      (Some(recorded), Some(current)) if recorded != current => {
        return Err(ValidationError::PerFileOptions);
      }
      _ => {}
    }

    if file.content.is_empty() {
      return Err(ValidationError::EmptySource(file.name.clone()));
    }
  }

  let headers = request.headers.as_deref().unwrap_or_default();
  for header in headers {
    if !is_safe_filename(&header.name) {
      return Err(ValidationError::InvalidFilename(header.name.clone()));
    }
    if header.content.is_empty() {
      return Err(ValidationError::EmptyHeader(header.name.clone()));
    }
  }

  Ok(ValidatedBuild {
    sources: request.files.iter().collect(),
    headers: headers.iter().collect(),
    options: options.unwrap_or_default(),
  })
}

/// Whether `name` is a bare `stem.ext` filename that is safe to join onto a
/// workspace directory.
///
/// The stem is one or more ASCII letters, digits, `_` or `-`; the extension
/// is one to four ASCII letters or digits. No path segment may be `.` or `..`.
pub fn is_safe_filename(name: &str) -> bool {
  if name.split(['/', '\\']).any(|segment| segment == "." || segment == "..") {
    return false;
  }

  let Some((stem, extension)) = name.split_once('.') else {
    return false;
  };

  let stem_ok = !stem.is_empty()
    && stem
      .bytes()
      .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
  let extension_ok = (1..=MAX_EXTENSION_LEN).contains(&extension.len())
    && extension.bytes().all(|b| b.is_ascii_alphanumeric());

  stem_ok && extension_ok
}
