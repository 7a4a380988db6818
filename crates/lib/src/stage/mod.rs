//! Pipeline stages.
//!
//! A [`Stage`] knows its label, the message reported when it fails, how to
//! build its tool invocation from the workspace and toolchain, and which
//! post-condition decides its success.

pub mod runner;

use std::path::PathBuf;

use tracing::warn;

use crate::consts::UNOPTIMIZED_NAME;
use crate::options::{compiler_args, linker_args, optimizer_args};
use crate::pipeline::types::{BuildError, TaskRecord};
use crate::request::OutputKind;
use crate::toolchain::Toolchain;
use crate::workspace::Workspace;

pub use runner::{Invocation, Postcondition, run_tool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  /// Compile and link all sources into the artifact.
  CompileLink,
  /// Optimize the artifact in place. Runs twice per native build.
  Optimize { pass: u8 },
  /// Remove non-essential sections from the artifact.
  Strip,
  /// Verify the artifact before it is released.
  GuardCheck,
  /// Compile JavaScript sources to C source embedding the bytecode.
  CompileBytecode,
}

/// Everything a stage needs to build its invocation.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
  pub workspace: &'a Workspace,
  pub toolchain: &'a Toolchain,
  /// The validated, shared compiler options string.
  pub options: &'a str,
  pub link_options: &'a str,
}

impl Stage {
  /// The ordered stage list for `kind`.
  pub fn plan(kind: OutputKind, strip: bool) -> Vec<Stage> {
    match kind {
      OutputKind::Wasm => {
        let mut stages = vec![Stage::CompileLink, Stage::Optimize { pass: 1 }];
        if strip {
          stages.push(Stage::Strip);
        }
        stages.push(Stage::Optimize { pass: 2 });
        stages.push(Stage::GuardCheck);
        stages
      }
      OutputKind::Bytecode => vec![Stage::CompileBytecode],
    }
  }

  pub fn name(self) -> String {
    match self {
      Stage::CompileLink => "Compile+Link".to_string(),
      Stage::Optimize { pass } => format!("Optimize (pass {pass})"),
      Stage::Strip => "Strip".to_string(),
      Stage::GuardCheck => "Guard check".to_string(),
      Stage::CompileBytecode => "Compile bytecode".to_string(),
    }
  }

  /// The build result message when this stage fails.
  pub fn failure_message(self) -> &'static str {
    match self {
      Stage::CompileLink | Stage::CompileBytecode => "Build error",
      Stage::Optimize { .. } => "Optimization error",
      Stage::Strip => "Post-build error",
      Stage::GuardCheck => "Guard checking error",
    }
  }

  fn log_file(self) -> String {
    match self {
      Stage::CompileLink => "compile.log".to_string(),
      Stage::Optimize { pass } => format!("opt{pass}.log"),
      Stage::Strip => "strip.log".to_string(),
      Stage::GuardCheck => "guard.log".to_string(),
      Stage::CompileBytecode => "bytecode.log".to_string(),
    }
  }

  /// The tool invocation and its success criterion.
  pub fn invocation(self, ctx: &StageContext<'_>) -> (Invocation, Postcondition) {
    let toolchain = ctx.toolchain;
    let artifact = ctx.workspace.artifact_path();

    match self {
      Stage::CompileLink => {
        let include_dir = if ctx.workspace.has_headers() {
          ctx.workspace.header_dir()
        } else {
          toolchain.default_include_dir.as_path()
        };
        let invocation = Invocation::new(&toolchain.compiler)
          .args(compiler_args(ctx.options, &toolchain.sysroot, include_dir))
          .args(linker_args(ctx.link_options))
          .args(ctx.workspace.source_paths())
          .arg("-o")
          .arg(artifact);
        (invocation, Postcondition::FileExists(artifact.to_path_buf()))
      }
      Stage::Optimize { .. } => {
        let invocation = Invocation::new(&toolchain.optimizer)
          .args(optimizer_args())
          .arg("-o")
          .arg(artifact)
          .arg(unoptimized_path(ctx.workspace));
        (invocation, Postcondition::ExitSuccess)
      }
      Stage::Strip => (
        Invocation::new(&toolchain.cleaner).arg(artifact),
        Postcondition::ExitSuccess,
      ),
      Stage::GuardCheck => (
        Invocation::new(&toolchain.guard_checker).arg(artifact),
        Postcondition::ExitSuccess,
      ),
      Stage::CompileBytecode => {
        let invocation = Invocation::new(&toolchain.bytecode_compiler)
          .arg("-c")
          .arg("-o")
          .arg(artifact)
          .args(ctx.workspace.source_paths());
        (invocation, Postcondition::FileExists(artifact.to_path_buf()))
      }
    }
  }

  /// Run the stage, producing its task record.
  pub async fn run(self, ctx: &StageContext<'_>) -> Result<TaskRecord, BuildError> {
    let name = self.name();

    if let Stage::Optimize { .. } = self {
      // The optimizer reads the moved-aside file and writes the artifact path anew.
      let from = ctx.workspace.artifact_path();
      let to = unoptimized_path(ctx.workspace);
      if let Err(err) = tokio::fs::rename(from, &to).await {
        warn!(stage = %name, error = %err, "could not move artifact aside");
        return Ok(TaskRecord::new(
          name,
          false,
          format!("failed to move {} aside: {}", from.display(), err),
        ));
      }
    }

    let (invocation, postcondition) = self.invocation(ctx);
    let log_path = ctx.workspace.scratch_dir().join(self.log_file());
    run_tool(&name, &invocation, ctx.workspace.root(), &log_path, &postcondition).await
  }
}

fn unoptimized_path(workspace: &Workspace) -> PathBuf {
  workspace.scratch_dir().join(UNOPTIMIZED_NAME)
}
