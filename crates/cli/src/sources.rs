//! Collecting and preparing sources for submission.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use c2wasm_lib::{HeaderFile, SourceFile};
use regex::Regex;
use tokio::process::Command;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Directory names never descended into when collecting sources.
const IGNORED: [&str; 5] = ["node_modules", ".git", ".vscode", ".idea", ".DS_Store"];

/// Options sent with every C source.
pub const C_OPTIONS: &str = "-O3";

fn is_ignored(entry: &DirEntry) -> bool {
  entry.depth() > 0
    && entry.file_type().is_dir()
    && IGNORED.iter().any(|name| entry.file_name() == *name)
}

fn has_extension(path: &Path, extension: &str) -> bool {
  path.extension().is_some_and(|ext| ext == extension)
}

/// Every file ending in `.<extension>` below `dir`, sorted by path.
fn walk(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
  let mut files = Vec::new();
  for entry in WalkDir::new(dir).into_iter().filter_entry(|entry| !is_ignored(entry)) {
    let entry = entry.with_context(|| format!("Failed to read {}", dir.display()))?;
    if entry.file_type().is_file() && has_extension(entry.path(), extension) {
      files.push(entry.into_path());
    }
  }
  files.sort();
  Ok(files)
}

/// The C files to build: `in_path` itself, or every `.c` file below it.
pub fn collect_c_files(in_path: &Path) -> Result<Vec<PathBuf>> {
  if in_path.is_dir() {
    let files = walk(in_path, "c")?;
    if files.is_empty() {
      bail!("No .c files found in {}", in_path.display());
    }
    return Ok(files);
  }

  if !in_path.exists() {
    bail!("Input not found: {}", in_path.display());
  }
  if !has_extension(in_path, "c") {
    bail!("Invalid file type: {} must be a .c file", in_path.display());
  }
  Ok(vec![in_path.to_path_buf()])
}

/// Every `.h` file below `dir`, named by file name.
pub fn collect_headers(dir: &Path) -> Result<Vec<HeaderFile>> {
  walk(dir, "h")?
    .into_iter()
    .map(|path| {
      let content = std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
      Ok(HeaderFile {
        language: "h".to_string(),
        name: file_name(&path)?,
        content,
      })
    })
    .collect()
}

/// Read `path` as a source file of `language`.
pub fn read_source(path: &Path, language: &str, options: Option<&str>) -> Result<SourceFile> {
  let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
  Ok(SourceFile {
    language: language.to_string(),
    name: file_name(path)?,
    options: options.map(str::to_string),
    content,
  })
}

pub fn file_name(path: &Path) -> Result<String> {
  path
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .with_context(|| format!("{} has no file name", path.display()))
}

pub fn file_stem(path: &Path) -> Result<String> {
  path
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .with_context(|| format!("{} has no file name", path.display()))
}

/// Bundle a TypeScript entry point to a single ES module with `esbuild`.
///
/// The program is taken from `ESBUILD` if set, else looked up on `PATH`.
pub async fn bundle_typescript(entry: &Path, out_dir: &Path) -> Result<PathBuf> {
  let program = std::env::var_os("ESBUILD").unwrap_or_else(|| "esbuild".into());
  let outfile = out_dir.join(format!("{}.js", file_stem(entry)?));

  debug!(entry = %entry.display(), outfile = %outfile.display(), "bundling");
  let output = Command::new(&program)
    .arg(entry)
    .arg("--bundle")
    .arg("--format=esm")
    .arg(format!("--outfile={}", outfile.display()))
    .output()
    .await
    .with_context(|| format!("Failed to run {}", program.to_string_lossy()))?;

  if !output.status.success() {
    bail!(
      "esbuild failed for {}:\n{}",
      entry.display(),
      String::from_utf8_lossy(&output.stderr).trim()
    );
  }
  Ok(outfile)
}

/// Check an export list names `Hook` and nothing besides `Hook` and `Callback`.
pub fn validate_exports(list: &str) -> Result<()> {
  let names: Vec<&str> = list.split(',').map(str::trim).filter(|name| !name.is_empty()).collect();
  if !names.contains(&"Hook") {
    bail!("Invalid export: Hook is required");
  }
  if !names.iter().all(|name| matches!(*name, "Hook" | "Callback")) {
    bail!("Invalid export: Only Hook and Callback are allowed");
  }
  Ok(())
}

/// Whole-line `import ...;` statements.
static IMPORT_LINE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?m)^\s*import\s+.*?;\s*$").expect("import pattern is valid"));

/// `export { ... };` statements; the list may span lines.
static EXPORT_LIST: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?m)^\s*export\s*\{([^}]*)\};?\s*$").expect("export pattern is valid"));

/// Whole-line `//` comments.
static LINE_COMMENT: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?m)^\s*//.*$").expect("comment pattern is valid"));

/// Clean a bundle for the bytecode compiler.
///
/// The first export list is validated; then import lines, export statements
/// and whole-line `//` comments are removed, and the result trimmed.
pub fn clean_bundle(code: &str) -> Result<String> {
  let names = EXPORT_LIST
    .captures(code)
    .and_then(|captures| captures.get(1))
    .context("Invalid export: No export found")?;
  validate_exports(names.as_str())?;

  let cleaned = IMPORT_LINE.replace_all(code, "");
  let cleaned = EXPORT_LIST.replace_all(&cleaned, "");
  let cleaned = LINE_COMMENT.replace_all(&cleaned, "");
  Ok(cleaned.trim().to_string())
}
