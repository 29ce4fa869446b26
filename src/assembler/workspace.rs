//! Scoped per-attempt workspace
//!
//! The directory lives exactly as long as the [`Workspace`] value. Dropping it removes
//! the directory on every path out of an attempt: success, error, or a cancelled future.

use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

const PREFIX: &str = "getmethatdawg-";

#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    /// Creates a fresh directory under the system temp dir
    pub fn create() -> io::Result<Self> {
        Self::create_in(std::env::temp_dir())
    }

    pub fn create_in(parent: impl AsRef<Path>) -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(PREFIX).tempdir_in(parent)?;
        let path = dir.path().to_path_buf();
        debug!(path = %path.display(), "Created attempt workspace");
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Writes a regular file (mode 0644)
    pub fn write(&self, name: &str, contents: &str) -> io::Result<PathBuf> {
        write_with_mode(&self.join(name), contents, 0o644)
    }

    /// Writes an owner-only executable (mode 0700)
    pub fn write_private_executable(&self, name: &str, contents: &str) -> io::Result<PathBuf> {
        write_with_mode(&self.join(name), contents, 0o700)
    }

    /// Removes the directory now, reporting failures instead of logging them
    pub fn close(mut self) -> io::Result<()> {
        match self.dir.take() {
            Some(dir) => {
                debug!(path = %self.path.display(), "Removing attempt workspace");
                dir.close()
            }
            None => Ok(()),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            debug!(path = %self.path.display(), "Removing attempt workspace");
            if let Err(e) = dir.close() {
                warn!(path = %self.path.display(), error = %e, "Failed to remove attempt workspace");
            }
        }
    }
}

/// Creates or truncates `path` with the given mode, so the file is never readable
/// by others even briefly
pub fn write_with_mode(path: &Path, contents: &str, mode: u32) -> io::Result<PathBuf> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn test_drop_removes_directory() {
        let parent = TempDir::new().unwrap();
        let workspace = Workspace::create_in(parent.path()).unwrap();
        let path = workspace.path().to_path_buf();
        workspace.write("a.txt", "hello").unwrap();
        assert!(path.join("a.txt").is_file());

        drop(workspace);
        assert!(!path.exists());
    }

    #[test]
    fn test_close_removes_directory() {
        let parent = TempDir::new().unwrap();
        let workspace = Workspace::create_in(parent.path()).unwrap();
        let path = workspace.path().to_path_buf();
        workspace.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_private_executable_mode() {
        let parent = TempDir::new().unwrap();
        let workspace = Workspace::create_in(parent.path()).unwrap();
        let script = workspace
            .write_private_executable("run.sh", "#!/bin/sh\n")
            .unwrap();
        let mode = fs::metadata(&script).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700);
    }

    #[test]
    fn test_name_prefix() {
        let parent = TempDir::new().unwrap();
        let workspace = Workspace::create_in(parent.path()).unwrap();
        let name = workspace.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("getmethatdawg-"));
    }
}
