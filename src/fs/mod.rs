//! Filesystem collaborators.
//!
//! The planners never touch storage directly. They ask a [`FileSystem`] for
//! the files under a prefix, for format-specific split boundaries, and for
//! block placement. Failures come back as [`ErrorKind::Io`] errors and are
//! never retried here.
//!
//! [`ErrorKind::Io`]: crate::ErrorKind::Io

mod local;
mod memory;

pub use local::LocalFileSystem;
pub use memory::InMemoryFileSystem;

use crate::error::Result;
use crate::fragment::{BlockLocation, SourceFile};

/// Storage the planners read layout metadata from.
///
/// Paths are `/`-separated. A file is *under* a prefix when its path equals
/// the prefix or continues it after a `/`; the empty prefix covers every file.
pub trait FileSystem: Send + Sync {
    /// Files at or below `prefix`, sorted by path. Only `path` and `length`
    /// need to be filled in.
    fn list_files(&self, prefix: &str) -> Result<Vec<SourceFile>>;

    /// Internal split points of `path`; empty if the file has none.
    fn stat_boundaries(&self, path: &str) -> Result<Vec<u64>>;

    fn block_locations(&self, path: &str) -> Result<Vec<BlockLocation>>;

    /// `file` completed with its boundaries and block locations.
    fn describe(&self, file: SourceFile) -> Result<SourceFile> {
        let boundaries = self.stat_boundaries(&file.path)?;
        let blocks = self.block_locations(&file.path)?;
        Ok(file.with_boundaries(boundaries).with_blocks(blocks))
    }
}

/// Whether `path` lies at or below `prefix`, comparing whole segments.
pub fn is_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::is_under;

    #[test]
    fn prefix_is_segment_wise() {
        assert!(is_under("a/b/c.csv", "a/b"));
        assert!(is_under("a/b", "a/b"));
        assert!(is_under("a/b/c.csv", "a/b/"));
        assert!(!is_under("a/bb/c.csv", "a/b"));
        assert!(is_under("a/b/c.csv", ""));
        assert!(is_under("/data/x", "/"));
        assert!(is_under("/data/x", "/data"));
    }
}
