//! Server-side default headers.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use tracing::debug;

/// Every `<stem>.h` file directly inside `dir`, keyed by stem.
///
/// Names with more than one dot, an empty stem, or another extension are
/// skipped, as are subdirectories. The extension match ignores case.
pub async fn default_headers(dir: &Path) -> io::Result<BTreeMap<String, String>> {
  let mut headers = BTreeMap::new();
  let mut entries = tokio::fs::read_dir(dir).await?;

  while let Some(entry) = entries.next_entry().await? {
    if !entry.file_type().await?.is_file() {
      continue;
    }

    let file_name = entry.file_name();
    let Some(stem) = header_stem(&file_name.to_string_lossy()).map(str::to_string) else {
      continue;
    };

    let content = tokio::fs::read(entry.path()).await?;
    headers.insert(stem, String::from_utf8_lossy(&content).into_owned());
  }

  debug!(dir = %dir.display(), count = headers.len(), "loaded default headers");
  Ok(headers)
}

fn header_stem(file_name: &str) -> Option<&str> {
  let (stem, extension) = file_name.split_once('.')?;
  if stem.is_empty() || extension.contains('.') || !extension.eq_ignore_ascii_case("h") {
    return None;
  }
  Some(stem)
}
