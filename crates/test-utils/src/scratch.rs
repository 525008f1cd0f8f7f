//! Scratch directories for tests that write day files.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary directory removed when dropped.
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Full contents of a file in the directory.
    pub fn read(&self, name: &str) -> Vec<u8> {
        std::fs::read(self.join(name)).expect("Failed to read scratch file")
    }

    /// Sorted file names in the directory.
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.path())
            .expect("Failed to list scratch dir")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

impl Default for ScratchDir {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_dir_lists_files() {
        let scratch = ScratchDir::new();
        std::fs::write(scratch.join("b.nd"), b"b").unwrap();
        std::fs::write(scratch.join("a.nd"), b"a").unwrap();
        assert_eq!(scratch.file_names(), vec!["a.nd", "b.nd"]);
        assert_eq!(scratch.read("a.nd"), b"a");
    }
}
