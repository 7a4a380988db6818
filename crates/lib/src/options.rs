//! Option sanitization.
//!
//! User-supplied option strings are only ever *searched*. For each known flag
//! found in the input, the flag's own constant token is pushed onto the
//! argument vector, so no byte of user text reaches a tool's command line.

use std::path::Path;

/// Optimization levels forwarded to the compiler.
const OPTIMIZATION_FLAGS: &[&str] = &["-O1", "-O2", "-O3", "-Os", "-Oz"];

/// Code generation flags forwarded to the compiler verbatim.
const CODEGEN_FLAGS: &[&str] = &["-ffast-math", "-fno-inline"];

/// Language standards, matched case-insensitively.
const STANDARD_FLAGS: &[&str] = &["-std=c99", "-std=c89"];

/// Linker flags a request may opt into, with the token passed through the driver.
const LINKER_FLAGS: &[(&str, &str)] = &[("--import-memory", "-Wl,--import-memory"), ("-g", "-Wl,-g")];

/// Linker flags applied to every native build.
const LINKER_DEFAULTS: &[&str] = &[
  "--no-standard-libraries",
  "-nostartfiles",
  "-Wl,--allow-undefined,--no-entry,--export-all",
];

/// Optimizer flags for every optimization pass. Not influenced by the request.
pub const OPTIMIZER_FLAGS: &[&str] = &["-O4"];

/// Compiler arguments for a native build.
///
/// The fixed base flags come first, followed by every allow-listed flag that
/// occurs in `options`.
pub fn compiler_args(options: &str, sysroot: &Path, include_dir: &Path) -> Vec<String> {
  let mut args = vec![
    format!("--sysroot={}", sysroot.display()),
    "-xc".to_string(),
    format!("-I{}", include_dir.display()),
    "-fdiagnostics-print-source-range-info".to_string(),
    "-Werror=implicit-function-declaration".to_string(),
  ];

  args.extend(
    OPTIMIZATION_FLAGS
      .iter()
      .chain(CODEGEN_FLAGS)
      .filter(|flag| options.contains(*flag))
      .map(|flag| flag.to_string()),
  );

  let lowered = options.to_ascii_lowercase();
  args.extend(
    STANDARD_FLAGS
      .iter()
      .filter(|flag| lowered.contains(*flag))
      .map(|flag| flag.to_string()),
  );

  args
}

/// Linker arguments for a native build: the defaults plus any allow-listed
/// flag present in `link_options`.
pub fn linker_args(link_options: &str) -> Vec<String> {
  let mut args: Vec<String> = LINKER_DEFAULTS.iter().map(|flag| flag.to_string()).collect();
  args.extend(
    LINKER_FLAGS
      .iter()
      .filter(|(needle, _)| link_options.contains(needle))
      .map(|(_, token)| token.to_string()),
  );
  args
}

pub fn optimizer_args() -> Vec<String> {
  OPTIMIZER_FLAGS.iter().map(|flag| flag.to_string()).collect()
}
