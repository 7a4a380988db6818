//! Running one external tool.
//!
//! The tool is spawned directly from an argument vector (never through a
//! shell) in the workspace root, with stdout and stderr both appended to a
//! single log file. The log is read back once the process has exited and its
//! handle is closed.

use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::{debug, info};

use crate::pipeline::types::{BuildError, TaskRecord};

/// A program and its discrete arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub program: PathBuf,
  pub args: Vec<OsString>,
}

impl Invocation {
  pub fn new(program: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
    }
  }

  pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }
}

/// What must hold after the tool ran for the stage to count as successful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Postcondition {
  /// The file exists, whatever the exit status.
  FileExists(PathBuf),
  /// The process started and exited successfully.
  ExitSuccess,
}

/// Run `invocation` in `cwd`, logging to `log_path`, and judge it by `postcondition`.
///
/// Launch failures and unsuccessful exits are not errors: they produce a
/// failed [`TaskRecord`] whose console output falls back to a description of
/// the failure when the tool printed nothing. Only failing to create or read
/// the log file is an error.
pub async fn run_tool(
  name: &str,
  invocation: &Invocation,
  cwd: &Path,
  log_path: &Path,
  postcondition: &Postcondition,
) -> Result<TaskRecord, BuildError> {
  info!(stage = %name, program = %invocation.program.display(), "running stage");
  debug!(args = ?invocation.args, cwd = %cwd.display(), "spawning tool");

  let status = {
    let stdout = File::create(log_path).map_err(|source| log_error(log_path, source))?;
    let stderr = stdout.try_clone().map_err(|source| log_error(log_path, source))?;

    let mut command = Command::new(&invocation.program);
    command
      .args(&invocation.args)
      .current_dir(cwd)
      .stdin(Stdio::null())
      .stdout(Stdio::from(stdout))
      .stderr(Stdio::from(stderr))
      .kill_on_drop(true);

    command.status().await
    // `command` drops here, closing the parent's copies of the log handle.
  };

  let fallback = match &status {
    Ok(status) if status.success() => None,
    Ok(status) => Some(describe_exit(&invocation.program, *status)),
    Err(err) => Some(format!("failed to launch {}: {}", invocation.program.display(), err)),
  };

  let log = tokio::fs::read(log_path)
    .await
    .map_err(|source| log_error(log_path, source))?;
  let log = String::from_utf8_lossy(&log).into_owned();

  let success = match postcondition {
    Postcondition::FileExists(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
    Postcondition::ExitSuccess => matches!(&status, Ok(status) if status.success()),
  };

  let console_output = if log.is_empty() {
    fallback.unwrap_or_default()
  } else {
    log
  };

  info!(stage = %name, success, "stage finished");
  if !success {
    debug!(stage = %name, console = %console_output, "stage output");
  }

  Ok(TaskRecord::new(name, success, console_output))
}

fn describe_exit(program: &Path, status: ExitStatus) -> String {
  match status.code() {
    Some(code) => format!("{} exited with status {}", program.display(), code),
    None => format!("{} terminated by signal", program.display()),
  }
}

fn log_error(path: &Path, source: std::io::Error) -> BuildError {
  BuildError::StageLog {
    path: path.to_path_buf(),
    source,
  }
}
