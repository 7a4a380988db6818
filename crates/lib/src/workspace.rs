//! Per-build sandbox workspaces.
//!
//! A workspace is a fresh directory derived from a caller-supplied base path.
//! Sources are written to its root, headers to a `headers/` subdirectory and
//! stage logs to a `stage/` subdirectory, both of which always exist. The
//! artifact lands next to the root at `<base>.<ext>`. Everything is removed by [`Workspace::destroy`]; a workspace
//! dropped without being destroyed removes itself synchronously.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

use crate::consts::{HEADER_DIR_NAME, SCRATCH_DIR_NAME, WORKSPACE_SUFFIX};
use crate::request::OutputKind;
use crate::validate::is_safe_filename;

#[derive(Debug, Error)]
pub enum WorkspaceError {
  #[error("failed to create workspace {path}: {source}")]
  Create {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("refusing to write unsafe filename {0:?}")]
  UnsafeName(String),

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to remove {path}: {source}")]
  Remove {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug)]
pub struct Workspace {
  root: PathBuf,
  header_dir: PathBuf,
  scratch_dir: PathBuf,
  artifact: PathBuf,
  sources: Vec<PathBuf>,
  headers_written: bool,
  destroyed: bool,
}

impl Workspace {
  /// Create the workspace for `base`.
  ///
  /// Fails if the root already exists: a base path names exactly one build.
  pub async fn create(base: &Path, kind: OutputKind) -> Result<Self, WorkspaceError> {
    let root = with_suffix(base, WORKSPACE_SUFFIX);
    let artifact = with_suffix(base, &format!(".{}", kind.artifact_extension()));

    fs::create_dir(&root).await.map_err(|source| WorkspaceError::Create {
      path: root.clone(),
      source,
    })?;

    // From here on the guard owns the root, so a failure below still cleans up.
    let workspace = Self {
      header_dir: root.join(HEADER_DIR_NAME),
      scratch_dir: root.join(SCRATCH_DIR_NAME),
      root,
      artifact,
      sources: Vec::new(),
      headers_written: false,
      destroyed: false,
    };

    for dir in [&workspace.header_dir, &workspace.scratch_dir] {
      fs::create_dir(dir).await.map_err(|source| WorkspaceError::Create {
        path: dir.clone(),
        source,
      })?;
    }

    debug!(root = %workspace.root.display(), "workspace created");
    Ok(workspace)
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn header_dir(&self) -> &Path {
    &self.header_dir
  }

  /// Stage logs and intermediate files. Never shares a path with a source.
  pub fn scratch_dir(&self) -> &Path {
    &self.scratch_dir
  }

  /// Where the final artifact is produced. Outside [`Workspace::root`].
  pub fn artifact_path(&self) -> &Path {
    &self.artifact
  }

  /// Paths of all written sources, in the order they were written.
  pub fn source_paths(&self) -> &[PathBuf] {
    &self.sources
  }

  /// Whether any header file has been written.
  pub fn has_headers(&self) -> bool {
    self.headers_written
  }

  pub async fn write_source(&mut self, name: &str, content: &str) -> Result<PathBuf, WorkspaceError> {
    let path = write_file(&self.root, name, content).await?;
    self.sources.push(path.clone());
    Ok(path)
  }

  pub async fn write_header(&mut self, name: &str, content: &str) -> Result<PathBuf, WorkspaceError> {
    let path = write_file(&self.header_dir, name, content).await?;
    self.headers_written = true;
    Ok(path)
  }

  /// Remove the workspace root with everything below it, and the artifact.
  pub async fn destroy(mut self) -> Result<(), WorkspaceError> {
    self.destroyed = true;

    let root = remove_ignoring_missing(fs::remove_dir_all(&self.root).await, &self.root);
    let artifact = remove_ignoring_missing(fs::remove_file(&self.artifact).await, &self.artifact);
    root.and(artifact)?;

    debug!(root = %self.root.display(), "workspace destroyed");
    Ok(())
  }
}

impl Drop for Workspace {
  fn drop(&mut self) {
    if self.destroyed {
      return;
    }

    warn!(root = %self.root.display(), "workspace dropped without destroy, removing");
    let root = remove_ignoring_missing(std::fs::remove_dir_all(&self.root), &self.root);
    let artifact = remove_ignoring_missing(std::fs::remove_file(&self.artifact), &self.artifact);
    for err in [root.err(), artifact.err()].into_iter().flatten() {
      warn!(error = %err, "workspace cleanup failed");
    }
  }
}

async fn write_file(dir: &Path, name: &str, content: &str) -> Result<PathBuf, WorkspaceError> {
  if !is_safe_filename(name) {
    return Err(WorkspaceError::UnsafeName(name.to_string()));
  }

  let path = dir.join(name);
  fs::write(&path, content).await.map_err(|source| WorkspaceError::Write {
    path: path.clone(),
    source,
  })?;
  Ok(path)
}

fn remove_ignoring_missing(result: io::Result<()>, path: &Path) -> Result<(), WorkspaceError> {
  match result {
    Err(source) if source.kind() != io::ErrorKind::NotFound => Err(WorkspaceError::Remove {
      path: path.to_path_buf(),
      source,
    }),
    _ => Ok(()),
  }
}

/// `base` with `suffix` appended to its final component (not an extension swap).
fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
  let mut path = base.as_os_str().to_os_string();
  path.push(suffix);
  PathBuf::from(path)
}
