//! Local-disk filesystem rooted at a directory.
//!
//! Paths handed to and returned from [`LocalFileSystem`] are relative to its
//! root and use `/` as separator. With the `io-parquet` feature, `.parquet`
//! files report the byte offset of every row group as a split boundary.

use super::FileSystem;
use crate::error::{Error, Result};
use crate::fragment::{BlockLocation, SourceFile};
use anyhow::Context;
use glob::{Pattern, glob};
use std::path::{Path, PathBuf};

const LOCAL_HOST: &str = "localhost";

#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let relative = path.trim_start_matches('/');
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }

    fn relative(&self, path: &Path) -> anyhow::Result<String> {
        let rel = path
            .strip_prefix(&self.root)
            .with_context(|| format!("{} is outside {}", path.display(), self.root.display()))?;
        Ok(rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"))
    }

    fn list(&self, prefix: &str) -> anyhow::Result<Vec<SourceFile>> {
        let base = self.resolve(prefix);
        if base.is_file() {
            let length = std::fs::metadata(&base)
                .with_context(|| format!("stat {}", base.display()))?
                .len();
            return Ok(vec![SourceFile::new(self.relative(&base)?, length)]);
        }
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let pattern = format!("{}/**/*", Pattern::escape(&base.to_string_lossy()));
        let entries = glob(&pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;
        let mut out = Vec::new();
        for entry in entries {
            let path =
                entry.with_context(|| format!("error reading entry under {}", base.display()))?;
            if !path.is_file() {
                continue;
            }
            let length = std::fs::metadata(&path)
                .with_context(|| format!("stat {}", path.display()))?
                .len();
            out.push(SourceFile::new(self.relative(&path)?, length));
        }
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }

    fn boundaries(&self, path: &str) -> anyhow::Result<Vec<u64>> {
        let full = self.resolve(path);
        if path.ends_with(".parquet") {
            return row_group_offsets(&full);
        }
        std::fs::metadata(&full).with_context(|| format!("stat {}", full.display()))?;
        Ok(Vec::new())
    }

    fn length(&self, path: &str) -> anyhow::Result<u64> {
        let full = self.resolve(path);
        Ok(std::fs::metadata(&full)
            .with_context(|| format!("stat {}", full.display()))?
            .len())
    }
}

impl FileSystem for LocalFileSystem {
    fn list_files(&self, prefix: &str) -> Result<Vec<SourceFile>> {
        self.list(prefix).map_err(|e| Error::io(&e).with_subject(prefix))
    }

    fn stat_boundaries(&self, path: &str) -> Result<Vec<u64>> {
        self.boundaries(path).map_err(|e| Error::io(&e).with_subject(path))
    }

    /// The whole file as one block on the local host.
    fn block_locations(&self, path: &str) -> Result<Vec<BlockLocation>> {
        let length = self
            .length(path)
            .map_err(|e| Error::io(&e).with_subject(path))?;
        if length == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![BlockLocation::new(0, length, [LOCAL_HOST])])
    }
}

/// Start offsets of every row group after the first.
#[cfg(feature = "io-parquet")]
fn row_group_offsets(path: &Path) -> anyhow::Result<Vec<u64>> {
    use parquet::file::reader::{FileReader, SerializedFileReader};
    use std::fs::File;

    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = SerializedFileReader::new(f).context("open SerializedFileReader")?;
    let meta = reader.metadata();

    let mut offsets: Vec<u64> = meta
        .row_groups()
        .iter()
        .filter_map(|rg| rg.columns().iter().map(|c| c.byte_range().0).min())
        .skip(1)
        .collect();
    offsets.sort_unstable();
    offsets.dedup();
    Ok(offsets)
}

#[cfg(not(feature = "io-parquet"))]
fn row_group_offsets(path: &Path) -> anyhow::Result<Vec<u64>> {
    std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    Ok(Vec::new())
}
