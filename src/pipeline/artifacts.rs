use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary files and directories owned by one pipeline run.
///
/// Everything tracked here is deleted by [`TempArtifacts::cleanup`] or, failing
/// that, when the guard is dropped. Deletion happens at most once per item.
#[derive(Debug, Default)]
pub struct TempArtifacts {
    files: Vec<PathBuf>,
    dirs: Vec<TempDir>,
}

impl TempArtifacts {
    pub fn track_file(&mut self, path: PathBuf) {
        if !self.files.contains(&path) {
            self.files.push(path);
        }
    }

    pub fn track_dir(&mut self, dir: TempDir) {
        self.dirs.push(dir);
    }

    /// Create a tracked scratch directory under `root`
    pub fn scratch_dir(&mut self, root: &Path, prefix: &str) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix(prefix).tempdir_in(root)?;
        let path = dir.path().to_path_buf();
        self.dirs.push(dir);
        Ok(path)
    }

    /// Delete one tracked file now instead of at cleanup
    pub fn release(&mut self, path: &Path) {
        if let Some(index) = self.files.iter().position(|tracked| tracked == path) {
            let path = self.files.remove(index);
            remove_quietly(&path);
        }
    }

    pub fn len(&self) -> usize {
        self.files.len() + self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete everything still tracked; returns how many items were handled
    pub fn cleanup(&mut self) -> usize {
        let handled = self.len();

        for path in self.files.drain(..) {
            remove_quietly(&path);
        }

        for dir in self.dirs.drain(..) {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::warn!("Failed to remove temporary directory {}: {}", path.display(), e);
            }
        }

        handled
    }
}

impl Drop for TempArtifacts {
    fn drop(&mut self) {
        if !self.is_empty() {
            self.cleanup();
        }
    }
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed temporary file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove temporary file {}: {}", path.display(), e),
    }
}
