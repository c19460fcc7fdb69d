use crate::error::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Write a file only if it does not already exist. Returns true if written.
pub fn write_if_missing(path: &Path, data: &[u8]) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    atomic_write(path, data)?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Filesystem backend
// ---------------------------------------------------------------------------

/// Where the project file and scaffolded output live.
///
/// Relative paths are resolved against the backend's root.
pub trait Filesystem: std::fmt::Debug + Send {
    fn root(&self) -> &Path;

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root().join(path)
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        Ok(std::fs::read_to_string(self.resolve(path))?)
    }

    fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        atomic_write(&self.resolve(path), data)
    }
}

/// The real filesystem, rooted at a project directory.
#[derive(Debug, Clone)]
pub struct OsFilesystem {
    root: PathBuf,
}

impl OsFilesystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Filesystem for OsFilesystem {
    fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("PROJECT");
        atomic_write(&path, b"version: \"3\"\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "version: \"3\"\n");
    }

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("api/v1/captain_types.go");
        atomic_write(&path, b"package v1\n").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn write_if_missing_keeps_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Makefile");
        assert!(write_if_missing(&path, b"first").unwrap());
        assert!(!write_if_missing(&path, b"second").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first");
    }

    #[test]
    fn os_filesystem_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        let fs = OsFilesystem::new(dir.path());
        fs.write(Path::new("PROJECT"), b"x").unwrap();
        assert!(fs.exists(Path::new("PROJECT")));
        assert!(dir.path().join("PROJECT").exists());
        assert_eq!(fs.read_to_string(Path::new("PROJECT")).unwrap(), "x");
    }
}
