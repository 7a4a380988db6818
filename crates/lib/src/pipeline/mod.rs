//! The build pipeline.
//!
//! A build is driven as a small state machine:
//!
//! ```text
//! validate ──ok──▶ Staging(0) ──ok──▶ … ──▶ Staging(n) ──▶ Packaging ──▶ Done(success)
//!     │                 │                       │              │
//!     └─────────────────┴───────── fail ────────┴──────────────┴──▶ Done(failure)
//! ```
//!
//! The workspace is acquired once validation passes and released by
//! [`run_build`] after the machine stops, whatever state it stopped in and
//! whether or not it stopped with an error.

pub mod types;

use std::path::Path;

use tracing::{error, info};

use crate::artifact::{encode, extract_bytecode, read_artifact};
use crate::request::{BuildRequest, OutputKind};
use crate::stage::{Stage, StageContext};
use crate::toolchain::Toolchain;
use crate::validate::validate_request;
use crate::workspace::Workspace;

pub use types::{BuildError, BuildResult, EXTRACTION_ERROR_MESSAGE, SUCCESS_MESSAGE, TaskRecord};

#[derive(Debug)]
enum State {
  Staging(usize),
  Packaging,
  Done(Outcome),
}

#[derive(Debug)]
enum Outcome {
  /// Transport-encoded artifact.
  Success(String),
  /// Failure message.
  Failure(String),
}

/// Build `request` with the pipeline for `kind`, in a workspace derived from `base`.
///
/// Validation and stage failures are reported in the returned
/// [`BuildResult`]. An `Err` means an unexpected fault such as an I/O error
/// outside any tool. In every case the workspace no longer exists when this
/// returns.
pub async fn run_build(
  request: &BuildRequest,
  kind: OutputKind,
  base: &Path,
  toolchain: &Toolchain,
) -> Result<BuildResult, BuildError> {
  info!(kind = %kind, base = %base.display(), files = request.files.len(), "starting build");

  let mut build = Build {
    request,
    kind,
    base,
    toolchain,
    options: "",
    stages: Vec::new(),
    tasks: Vec::new(),
  };

  let mut slot = None;
  let outcome = build.drive(&mut slot).await;

  if let Some(workspace) = slot.take()
    && let Err(err) = workspace.destroy().await
  {
    error!(base = %base.display(), error = %err, "failed to remove workspace");
  }

  let result = match outcome? {
    Outcome::Success(output) => BuildResult::succeeded(output, build.tasks),
    Outcome::Failure(message) => BuildResult::failed(message, build.tasks),
  };

  info!(success = result.success, message = %result.message, "build finished");
  Ok(result)
}

struct Build<'a> {
  request: &'a BuildRequest,
  kind: OutputKind,
  base: &'a Path,
  toolchain: &'a Toolchain,
  options: &'a str,
  stages: Vec<Stage>,
  tasks: Vec<TaskRecord>,
}

impl<'a> Build<'a> {
  async fn drive(&mut self, slot: &mut Option<Workspace>) -> Result<Outcome, BuildError> {
    let workspace = match self.validate(slot).await? {
      Ok(workspace) => workspace,
      Err(rejected) => return Ok(rejected),
    };

    let mut state = State::Staging(0);
    loop {
      state = match state {
        State::Staging(index) => self.stage(workspace, index).await?,
        State::Packaging => self.package(workspace).await?,
        State::Done(outcome) => return Ok(outcome),
      };
    }
  }

  /// Validate, then materialize the workspace into `slot`.
  async fn validate<'w>(
    &mut self,
    slot: &'w mut Option<Workspace>,
  ) -> Result<Result<&'w Workspace, Outcome>, BuildError> {
    let validated = match validate_request(self.request, self.kind) {
      Ok(validated) => validated,
      Err(err) => {
        info!(reason = %err, "request rejected");
        return Ok(Err(Outcome::Failure(err.to_string())));
      }
    };

    let workspace = slot.insert(Workspace::create(self.base, self.kind).await?);
    for source in &validated.sources {
      workspace.write_source(&source.name, &source.content).await?;
    }
    for header in &validated.headers {
      workspace.write_header(&header.name, &header.content).await?;
    }

    self.options = validated.options;
    self.stages = Stage::plan(self.kind, self.request.strip());
    Ok(Ok(workspace))
  }

  async fn stage(&mut self, workspace: &Workspace, index: usize) -> Result<State, BuildError> {
    let Some(&stage) = self.stages.get(index) else {
      return Ok(State::Packaging);
    };

    let ctx = StageContext {
      workspace,
      toolchain: self.toolchain,
      options: self.options,
      link_options: self.request.link_options.as_deref().unwrap_or_default(),
    };
    let record = stage.run(&ctx).await?;
    let success = record.success;
    self.tasks.push(record);

    if success {
      Ok(State::Staging(index + 1))
    } else {
      Ok(State::Done(Outcome::Failure(stage.failure_message().to_string())))
    }
  }

  async fn package(&self, workspace: &Workspace) -> Result<State, BuildError> {
    let raw = read_artifact(workspace.artifact_path()).await?;
    let bytes = match self.kind {
      OutputKind::Wasm => raw,
      OutputKind::Bytecode => {
        let bytes = extract_bytecode(&String::from_utf8_lossy(&raw));
        if bytes.is_empty() {
          info!("bytecode compiler output held no byte array");
          return Ok(State::Done(Outcome::Failure(EXTRACTION_ERROR_MESSAGE.to_string())));
        }
        bytes
      }
    };

    let output = encode(&bytes, self.request.compress())?;
    Ok(State::Done(Outcome::Success(output)))
  }
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use crate::request::{HeaderFile, SourceFile};
  use crate::util::testutil::{FakeToolchain, failing_script, write_script};
  use base64::Engine;
  use base64::engine::general_purpose::STANDARD;
  use serial_test::serial;
  use tempfile::TempDir;

  const MAIN_C: &str = "int main(){return 0;}";

  fn c_source(name: &str, content: &str) -> SourceFile {
    SourceFile {
      language: "c".to_string(),
      name: name.to_string(),
      options: Some("-O3".to_string()),
      content: content.to_string(),
    }
  }

  fn js_source(name: &str, content: &str) -> SourceFile {
    SourceFile {
      language: "js".to_string(),
      name: name.to_string(),
      options: None,
      content: content.to_string(),
    }
  }

  struct Fixture {
    temp: TempDir,
    fake: FakeToolchain,
  }

  impl Fixture {
    fn new() -> Self {
      let temp = TempDir::new().unwrap();
      let fake = FakeToolchain::install(&temp.path().join("tools")).unwrap();
      Self { temp, fake }
    }

    fn base(&self, name: &str) -> std::path::PathBuf {
      self.temp.path().join(name)
    }

    fn assert_clean(&self, name: &str) {
      let leftovers: Vec<_> = std::fs::read_dir(self.temp.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|entry| entry.starts_with(name))
        .collect();
      assert!(leftovers.is_empty(), "workspace leftovers: {leftovers:?}");
    }
  }

  #[tokio::test]
  #[serial]
  async fn native_build_succeeds() {
    let fixture = Fixture::new();
    let request = BuildRequest::new(OutputKind::Wasm, vec![c_source("a.c", MAIN_C)]);

    let result = run_build(&request, OutputKind::Wasm, &fixture.base("build_ok"), &fixture.fake.toolchain)
      .await
      .unwrap();

    assert!(result.success, "{result:?}");
    assert_eq!(result.message, "Success");
    assert_eq!(
      result.task_names(),
      vec!["Compile+Link", "Optimize (pass 1)", "Optimize (pass 2)", "Guard check"]
    );
    assert!(result.tasks.iter().all(|task| task.success));
    assert_eq!(STANDARD.decode(&result.output).unwrap(), FakeToolchain::WASM_BYTES);
    fixture.assert_clean("build_ok");
  }

  #[tokio::test]
  #[serial]
  async fn strip_adds_a_stage() {
    let fixture = Fixture::new();
    let mut request = BuildRequest::new(OutputKind::Wasm, vec![c_source("a.c", MAIN_C)]);
    request.strip = Some(true);

    let result = run_build(&request, OutputKind::Wasm, &fixture.base("build_strip"), &fixture.fake.toolchain)
      .await
      .unwrap();

    assert!(result.success);
    assert_eq!(result.task_names()[2], "Strip");
    assert_eq!(result.tasks.len(), 5);
    fixture.assert_clean("build_strip");
  }

  #[tokio::test]
  #[serial]
  async fn compile_failure_short_circuits() {
    let fixture = Fixture::new();
    let request = BuildRequest::new(
      OutputKind::Wasm,
      vec![c_source("a.c", MAIN_C), c_source("b.c", "#error nope")],
    );

    let result = run_build(&request, OutputKind::Wasm, &fixture.base("build_err"), &fixture.fake.toolchain)
      .await
      .unwrap();

    assert!(!result.success);
    assert_eq!(result.message, "Build error");
    assert_eq!(result.task_names(), vec!["Compile+Link"]);
    assert!(!result.tasks[0].success);
    assert!(result.tasks[0].console_output.contains("forced failure"));
    assert_eq!(result.output, "");
    fixture.assert_clean("build_err");
  }

  #[tokio::test]
  #[serial]
  async fn optimizer_failure_reported() {
    let fixture = Fixture::new();
    write_script(&fixture.fake.toolchain.optimizer, &failing_script("wasm-opt: invalid section")).unwrap();
    let request = BuildRequest::new(OutputKind::Wasm, vec![c_source("a.c", MAIN_C)]);

    let result = run_build(&request, OutputKind::Wasm, &fixture.base("build_opt"), &fixture.fake.toolchain)
      .await
      .unwrap();

    assert_eq!(result.message, "Optimization error");
    assert_eq!(result.task_names(), vec!["Compile+Link", "Optimize (pass 1)"]);
    assert!(result.tasks[1].console_output.contains("invalid section"));
    fixture.assert_clean("build_opt");
  }

  #[tokio::test]
  #[serial]
  async fn cleaner_failure_reported() {
    let fixture = Fixture::new();
    write_script(&fixture.fake.toolchain.cleaner, &failing_script("cleaner: cannot parse")).unwrap();
    let mut request = BuildRequest::new(OutputKind::Wasm, vec![c_source("a.c", MAIN_C)]);
    request.strip = Some(true);

    let result = run_build(&request, OutputKind::Wasm, &fixture.base("build_cln"), &fixture.fake.toolchain)
      .await
      .unwrap();

    assert_eq!(result.message, "Post-build error");
    assert_eq!(result.task_names().last(), Some(&"Strip"));
    fixture.assert_clean("build_cln");
  }

  #[tokio::test]
  #[serial]
  async fn guard_failure_reported() {
    let fixture = Fixture::new();
    write_script(&fixture.fake.toolchain.guard_checker, &failing_script("guard: loop without _g")).unwrap();
    let request = BuildRequest::new(OutputKind::Wasm, vec![c_source("a.c", MAIN_C)]);

    let result = run_build(&request, OutputKind::Wasm, &fixture.base("build_grd"), &fixture.fake.toolchain)
      .await
      .unwrap();

    assert!(!result.success);
    assert_eq!(result.message, "Guard checking error");
    assert_eq!(result.tasks.len(), 4);
    assert!(result.tasks[3].console_output.contains("loop without _g"));
    fixture.assert_clean("build_grd");
  }

  #[tokio::test]
  #[serial]
  async fn validation_failure_creates_no_workspace() {
    let fixture = Fixture::new();
    let request = BuildRequest::new(OutputKind::Wasm, vec![c_source("../evil.c", "x")]);

    let result = run_build(&request, OutputKind::Wasm, &fixture.base("build_val"), &fixture.fake.toolchain)
      .await
      .unwrap();

    assert!(!result.success);
    assert_eq!(result.message, "Invalid filename ../evil.c");
    assert!(result.tasks.is_empty());
    assert!(!fixture.temp.path().join("evil.c").exists());
    fixture.assert_clean("build_val");
  }

  #[tokio::test]
  #[serial]
  async fn empty_file_list_rejected() {
    let fixture = Fixture::new();
    let request = BuildRequest::new(OutputKind::Wasm, vec![]);

    let result = run_build(&request, OutputKind::Wasm, &fixture.base("build_none"), &fixture.fake.toolchain)
      .await
      .unwrap();

    assert_eq!(result.message, "No source files");
    assert!(result.tasks.is_empty());
    fixture.assert_clean("build_none");
  }

  #[tokio::test]
  #[serial]
  async fn headers_reach_the_compiler() {
    let fixture = Fixture::new();
    let mut request = BuildRequest::new(OutputKind::Wasm, vec![c_source("a.c", MAIN_C)]);
    request.headers = Some(vec![HeaderFile {
      language: "h".to_string(),
      name: "hookapi.h".to_string(),
      content: "#define X 1".to_string(),
    }]);

    let result = run_build(&request, OutputKind::Wasm, &fixture.base("build_hdr"), &fixture.fake.toolchain)
      .await
      .unwrap();

    assert!(result.success);
    // The fake compiler echoes its arguments.
    let console = &result.tasks[0].console_output;
    assert!(console.contains("build_hdr.d/headers"), "{console}");
    assert!(console.contains("-O3"));
    fixture.assert_clean("build_hdr");
  }

  #[tokio::test]
  #[serial]
  async fn compressed_output_inflates() {
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    let fixture = Fixture::new();
    let mut request = BuildRequest::new(OutputKind::Wasm, vec![c_source("a.c", MAIN_C)]);
    request.compress = Some(true);

    let result = run_build(&request, OutputKind::Wasm, &fixture.base("build_z"), &fixture.fake.toolchain)
      .await
      .unwrap();

    let compressed = STANDARD.decode(&result.output).unwrap();
    let mut inflated = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
      .read_to_end(&mut inflated)
      .unwrap();
    assert_eq!(inflated, FakeToolchain::WASM_BYTES);
  }

  #[tokio::test]
  #[serial]
  async fn identical_requests_give_identical_results() {
    let fixture = Fixture::new();
    let request = BuildRequest::new(OutputKind::Wasm, vec![c_source("a.c", MAIN_C)]);

    let first = run_build(&request, OutputKind::Wasm, &fixture.base("build_i1"), &fixture.fake.toolchain)
      .await
      .unwrap();
    let second = run_build(&request, OutputKind::Wasm, &fixture.base("build_i2"), &fixture.fake.toolchain)
      .await
      .unwrap();

    assert_eq!(first.success, second.success);
    assert_eq!(first.message, second.message);
    let flags = |r: &BuildResult| r.tasks.iter().map(|t| (t.name.clone(), t.success)).collect::<Vec<_>>();
    assert_eq!(flags(&first), flags(&second));
  }

  #[tokio::test]
  #[serial]
  async fn bytecode_build_decodes_array() {
    let fixture = Fixture::new();
    let request = BuildRequest::new(OutputKind::Bytecode, vec![js_source("hook.js", "function Hook() {}")]);

    let result = run_build(&request, OutputKind::Bytecode, &fixture.base("build_bc"), &fixture.fake.toolchain)
      .await
      .unwrap();

    assert!(result.success, "{result:?}");
    assert_eq!(result.task_names(), vec!["Compile bytecode"]);
    assert_eq!(STANDARD.decode(&result.output).unwrap(), FakeToolchain::BYTECODE_BYTES);
    fixture.assert_clean("build_bc");
  }

  #[tokio::test]
  #[serial]
  async fn bytecode_without_array_is_a_failure() {
    let fixture = Fixture::new();
    write_script(
      &fixture.fake.toolchain.bytecode_compiler,
      r#"#!/bin/sh
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  prev="$arg"
done
echo "/* no array here */" > "$out"
"#,
    )
    .unwrap();
    let request = BuildRequest::new(OutputKind::Bytecode, vec![js_source("hook.js", "1")]);

    let result = run_build(&request, OutputKind::Bytecode, &fixture.base("build_nobc"), &fixture.fake.toolchain)
      .await
      .unwrap();

    assert!(!result.success);
    assert_eq!(result.message, EXTRACTION_ERROR_MESSAGE);
    assert_eq!(result.output, "");
    assert_eq!(result.tasks.len(), 1);
    assert!(result.tasks[0].success);
    fixture.assert_clean("build_nobc");
  }

  #[tokio::test]
  #[serial]
  async fn bytecode_from_several_sources_is_a_failure() {
    let fixture = Fixture::new();
    write_script(
      &fixture.fake.toolchain.bytecode_compiler,
      r#"#!/bin/sh
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  prev="$arg"
done
: > "$out"
for arg in "$@"; do
  case "$arg" in
    *.js) echo "const uint8_t qjsc_part[1] = { 0x01, };" >> "$out" ;;
  esac
done
"#,
    )
    .unwrap();
    let request = BuildRequest::new(
      OutputKind::Bytecode,
      vec![js_source("hook.js", "function Hook() {}"), js_source("util.js", "1")],
    );

    let result = run_build(&request, OutputKind::Bytecode, &fixture.base("build_two"), &fixture.fake.toolchain)
      .await
      .unwrap();

    assert!(!result.success);
    assert_eq!(result.message, EXTRACTION_ERROR_MESSAGE);
    assert_eq!(result.output, "");
    fixture.assert_clean("build_two");
  }

  #[tokio::test]
  #[serial]
  async fn fault_after_staging_still_destroys_workspace() {
    let fixture = Fixture::new();
    write_script(&fixture.fake.toolchain.guard_checker, "#!/bin/sh\nrm \"$1\"\n").unwrap();
    let request = BuildRequest::new(OutputKind::Wasm, vec![c_source("a.c", MAIN_C)]);

    let result = run_build(&request, OutputKind::Wasm, &fixture.base("build_gone"), &fixture.fake.toolchain).await;

    assert!(matches!(result, Err(BuildError::ReadArtifact { .. })), "{result:?}");
    fixture.assert_clean("build_gone");
  }

  #[tokio::test]
  #[serial]
  async fn sources_named_like_stage_logs_are_untouched() {
    let fixture = Fixture::new();
    write_script(
      &fixture.fake.toolchain.compiler,
      r#"#!/bin/sh
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  prev="$arg"
done
cat compile.log
printf '\000asm\001\000\000\000' > "$out"
"#,
    )
    .unwrap();
    let request = BuildRequest::new(
      OutputKind::Wasm,
      vec![c_source("a.c", MAIN_C), c_source("compile.log", "kept as written")],
    );

    let result = run_build(&request, OutputKind::Wasm, &fixture.base("build_log"), &fixture.fake.toolchain)
      .await
      .unwrap();

    assert!(result.success, "{result:?}");
    assert!(result.tasks[0].console_output.contains("kept as written"));
    fixture.assert_clean("build_log");
  }

  #[tokio::test]
  #[serial]
  async fn bytecode_route_rejects_wasm_requests() {
    let fixture = Fixture::new();
    let request = BuildRequest::new(OutputKind::Wasm, vec![c_source("a.c", MAIN_C)]);

    let result = run_build(&request, OutputKind::Bytecode, &fixture.base("build_kind"), &fixture.fake.toolchain)
      .await
      .unwrap();

    assert_eq!(result.message, "Invalid output type wasm");
    fixture.assert_clean("build_kind");
  }

  #[tokio::test]
  #[serial]
  async fn concurrent_builds_are_isolated() {
    let fixture = Fixture::new();
    let toolchain = &fixture.fake.toolchain;
    let ok = BuildRequest::new(OutputKind::Wasm, vec![c_source("a.c", MAIN_C)]);
    let bad = BuildRequest::new(OutputKind::Wasm, vec![c_source("a.c", "#error broken")]);

    let bases: Vec<_> = (0..6).map(|i| fixture.base(&format!("build_c{i}"))).collect();
    let results = futures_join(&bases, |i| if i % 2 == 0 { &ok } else { &bad }, toolchain).await;

    for (i, result) in results.iter().enumerate() {
      assert_eq!(result.success, i % 2 == 0, "build {i}: {result:?}");
    }
    fixture.assert_clean("build_c");
  }

  async fn futures_join<'a>(
    bases: &'a [std::path::PathBuf],
    pick: impl Fn(usize) -> &'a BuildRequest,
    toolchain: &'a Toolchain,
  ) -> Vec<BuildResult> {
    let mut set = tokio::task::JoinSet::new();
    for (i, base) in bases.iter().enumerate() {
      let request = pick(i).clone();
      let base = base.clone();
      let toolchain = toolchain.clone();
      set.spawn(async move {
        let result = run_build(&request, OutputKind::Wasm, &base, &toolchain).await.unwrap();
        (i, result)
      });
    }

    let mut results = Vec::new();
    while let Some(joined) = set.join_next().await {
      results.push(joined.unwrap());
    }
    results.sort_by_key(|(i, _)| *i);
    results.into_iter().map(|(_, result)| result).collect()
  }
}
