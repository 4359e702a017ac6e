//! In-memory filesystem for tests and dry runs.

use super::{FileSystem, is_under};
use crate::error::{Error, ErrorKind, Result};
use crate::fragment::{BlockLocation, SourceFile};
use std::collections::BTreeMap;

/// A fixed set of files with their layout metadata.
///
/// Paths can be marked as failing to simulate an unavailable storage node;
/// any request touching them returns an `Io` error.
///
/// ```
/// use directio::fs::{FileSystem, InMemoryFileSystem};
///
/// let fs = InMemoryFileSystem::new()
///     .with_file("in/a.csv", 10)
///     .with_file("in/b.csv", 20)
///     .with_file("other/c.csv", 5);
/// assert_eq!(fs.list_files("in")?.len(), 2);
/// # Ok::<(), directio::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryFileSystem {
    files: BTreeMap<String, SourceFile>,
    failures: BTreeMap<String, String>,
}

impl InMemoryFileSystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a file with no boundaries and no block hints.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, length: u64) -> Self {
        self.insert(SourceFile::new(path, length));
        self
    }

    #[must_use]
    pub fn with_source(mut self, file: SourceFile) -> Self {
        self.insert(file);
        self
    }

    /// Make every request for `path` fail with `message`.
    #[must_use]
    pub fn with_failure(mut self, path: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.insert(path.into(), message.into());
        self
    }

    pub fn insert(&mut self, file: SourceFile) {
        self.files.insert(file.path.clone(), file);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn check(&self, path: &str) -> Result<()> {
        match self.failures.get(path) {
            Some(message) => Err(Error::new(ErrorKind::Io, message.clone()).with_subject(path)),
            None => Ok(()),
        }
    }

    fn file(&self, path: &str) -> Result<&SourceFile> {
        self.check(path)?;
        self.files.get(path).ok_or_else(|| {
            Error::new(ErrorKind::Io, "file not found").with_subject(path)
        })
    }
}

impl FileSystem for InMemoryFileSystem {
    fn list_files(&self, prefix: &str) -> Result<Vec<SourceFile>> {
        let mut out = Vec::new();
        for (path, file) in &self.files {
            if is_under(path, prefix) {
                self.check(path)?;
                out.push(SourceFile::new(path.clone(), file.length));
            }
        }
        Ok(out)
    }

    fn stat_boundaries(&self, path: &str) -> Result<Vec<u64>> {
        Ok(self.file(path)?.boundaries.clone())
    }

    fn block_locations(&self, path: &str) -> Result<Vec<BlockLocation>> {
        Ok(self.file(path)?.blocks.clone())
    }
}
