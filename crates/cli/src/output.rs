//! Terminal and JSON reporting for builds and fetched headers.
//!
//! Status lines go to stdout, failures and skips to stderr. Colors are only
//! used when the stream supports them.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const BUILT: &str = "✓";
  pub const FAILED: &str = "✗";
  pub const SKIPPED: &str = "⚠";
  pub const NOTE: &str = "•";
}

/// Indent under a failure line.
const CONSOLE_INDENT: &str = "    ";

pub fn format_bytes(bytes: u64) -> String {
  const KB: u64 = 1024;
  const MB: u64 = KB * 1024;

  if bytes >= MB {
    format!("{:.1} MB", bytes as f64 / MB as f64)
  } else if bytes >= KB {
    format!("{:.1} KB", bytes as f64 / KB as f64)
  } else {
    format!("{} B", bytes)
  }
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    format!("{}m {}s", secs / 60, secs % 60)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

/// Tool output with every line indented, blank lines dropped.
pub fn indent_console(text: &str) -> Vec<String> {
  text
    .lines()
    .filter(|line| !line.trim().is_empty())
    .map(|line| format!("{CONSOLE_INDENT}{line}"))
    .collect()
}

/// `✓ Built out/hook.wasm (1.2 KB, 340ms)`
pub fn print_built(artifact: &Path, size: u64, elapsed: Duration) {
  print_success(&format!(
    "Built {} ({}, {})",
    artifact.display(),
    format_bytes(size),
    format_duration(elapsed)
  ));
}

/// The failure line for `source`, then the failed tasks' output beneath it.
pub fn print_failed(source: &str, message: &str, log: &Path, console: &str) {
  eprintln!(
    "{} {}",
    symbols::FAILED.if_supports_color(Stream::Stderr, |s| s.red()),
    format!("{}: {} (log: {})", source, message, log.display()).if_supports_color(Stream::Stderr, |s| s.red())
  );
  for line in indent_console(console) {
    eprintln!("{}", line.if_supports_color(Stream::Stderr, |s| s.dimmed()));
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::BUILT.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_skipped(message: &str) {
  eprintln!(
    "{} {}",
    symbols::SKIPPED.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_note(message: &str) {
  println!(
    "{} {}",
    symbols::NOTE.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
