//! Types for build results.
//!
//! This module defines the task records, the final build result returned to
//! clients, and the error type for faults that are not part of a build's
//! outcome.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::workspace::WorkspaceError;

/// Message of every successful build.
pub const SUCCESS_MESSAGE: &str = "Success";

/// Message when a bytecode compiler's output holds no decodable byte array.
pub const EXTRACTION_ERROR_MESSAGE: &str = "Bytecode extraction error";

/// Faults outside the build's own outcome.
///
/// Validation and stage failures are reported through [`BuildResult`]; these
/// errors mean the service itself could not carry out the build.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Workspace(#[from] WorkspaceError),

  #[error("failed to open stage log {path}: {source}")]
  StageLog {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read artifact {path}: {source}")]
  ReadArtifact {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to compress artifact: {0}")]
  Compress(#[source] io::Error),
}

/// The record of one attempted stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
  pub name: String,
  #[serde(default)]
  pub success: bool,
  /// Captured tool output, or the launch/exit error when the tool printed nothing.
  #[serde(rename = "console", default)]
  pub console_output: String,
}

impl TaskRecord {
  pub fn new(name: impl Into<String>, success: bool, console_output: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      success,
      console_output: console_output.into(),
    }
  }
}

/// The outcome of one build, as returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
  pub success: bool,
  pub message: String,
  /// Base64 of the (optionally compressed) artifact; empty unless successful.
  #[serde(default)]
  pub output: String,
  /// One record per attempted stage, in order.
  #[serde(default)]
  pub tasks: Vec<TaskRecord>,
}

impl BuildResult {
  pub fn succeeded(output: String, tasks: Vec<TaskRecord>) -> Self {
    Self {
      success: true,
      message: SUCCESS_MESSAGE.to_string(),
      output,
      tasks,
    }
  }

  pub fn failed(message: impl Into<String>, tasks: Vec<TaskRecord>) -> Self {
    Self {
      success: false,
      message: message.into(),
      output: String::new(),
      tasks,
    }
  }

  /// Console output of every failed task, joined by newlines.
  pub fn failure_log(&self) -> String {
    self
      .tasks
      .iter()
      .filter(|task| !task.success)
      .map(|task| task.console_output.as_str())
      .collect::<Vec<_>>()
      .join("\n")
  }

  pub fn task_names(&self) -> Vec<&str> {
    self.tasks.iter().map(|task| task.name.as_str()).collect()
  }
}
