//! Splitting source files into byte-range fragments.
//!
//! Each [`Fragment`] is a contiguous `[start, end)` range of one file that a
//! worker can read on its own. Formats with internal structure (columnar
//! stripes, row groups) declare split boundaries and fragments only ever
//! start or end on them; formats without boundaries can be cut anywhere.
//!
//! # Policy
//!
//! - `preferred <= 0`: the whole file is one fragment (non-splittable format).
//! - With boundaries, spans between them are accumulated until they reach
//!   `preferred` bytes.
//! - Without boundaries, a file that reports blocks is cut along them (see
//!   [`BlockPolicy`]); any other file is cut every `preferred` bytes.
//! - A trailing fragment shorter than `minimum` is merged into its
//!   predecessor instead of being emitted on its own.
//! - A zero-length file yields exactly one `[0, 0)` fragment.
//! - Locality hints are the union of hosts of every block overlapping the
//!   fragment, in first-seen order.

use crate::error::{Error, ErrorKind, Result};
use crate::format::DataFormat;
use crate::profile::DataSourceProfile;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

/// A physical block of a file and the hosts that store it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockLocation {
    pub start: u64,
    pub end: u64,
    pub hosts: Vec<String>,
}

impl BlockLocation {
    pub fn new<S: Into<String>>(start: u64, end: u64, hosts: impl IntoIterator<Item = S>) -> Self {
        Self {
            start,
            end,
            hosts: hosts.into_iter().map(Into::into).collect(),
        }
    }

    fn overlaps(&self, start: u64, end: u64) -> bool {
        self.start < end && start < self.end
    }
}

/// How storage blocks shape fragments of files without declared boundaries.
///
/// With `split`, a block longer than the preferred size is cut into
/// preferred-size pieces. With `combine`, runs of adjacent whole blocks are
/// merged while the result stays within the preferred size. Pieces of a
/// split block are never combined with neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPolicy {
    pub split: bool,
    pub combine: bool,
}

impl Default for BlockPolicy {
    fn default() -> Self {
        Self {
            split: true,
            combine: true,
        }
    }
}

/// Layout metadata of one input file, as reported by the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub length: u64,
    /// Internal split points; empty means "splittable anywhere".
    #[serde(default)]
    pub boundaries: Vec<u64>,
    #[serde(default)]
    pub blocks: Vec<BlockLocation>,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, length: u64) -> Self {
        Self {
            path: path.into(),
            length,
            boundaries: Vec::new(),
            blocks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_boundaries(mut self, boundaries: Vec<u64>) -> Self {
        self.boundaries = boundaries;
        self
    }

    #[must_use]
    pub fn with_blocks(mut self, blocks: Vec<BlockLocation>) -> Self {
        self.blocks = blocks;
        self
    }

    /// Check boundaries and blocks against the file length.
    ///
    /// # Errors
    /// `InvalidBoundaries` when boundaries are not strictly increasing or
    /// exceed the length, or when a block range is inverted or out of range.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| {
            Err(Error::new(ErrorKind::InvalidBoundaries, msg).with_subject(self.path.clone()))
        };
        for pair in self.boundaries.windows(2) {
            if pair[0] >= pair[1] {
                return invalid(format!(
                    "boundaries must be strictly increasing ({} >= {})",
                    pair[0], pair[1]
                ));
            }
        }
        if let Some(&last) = self.boundaries.last()
            && last > self.length
        {
            return invalid(format!(
                "boundary {last} exceeds file length {}",
                self.length
            ));
        }
        for block in &self.blocks {
            if block.start > block.end || block.end > self.length {
                return invalid(format!(
                    "block [{}, {}) is outside [0, {})",
                    block.start, block.end, self.length
                ));
            }
        }
        Ok(())
    }
}

/// A contiguous byte range of one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub path: String,
    pub start: u64,
    pub end: u64,
    /// Names of hosts holding (part of) this range.
    pub hosts: Vec<String>,
}

impl Fragment {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Zero-length fragments carry no records; they are not errors.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Compute the fragments of `file` with the default [`BlockPolicy`].
///
/// # Errors
/// `InvalidBoundaries` if the file's layout metadata is inconsistent.
pub fn plan(file: &SourceFile, preferred_bytes: i64, minimum_bytes: i64) -> Result<Vec<Fragment>> {
    plan_with_blocks(file, preferred_bytes, minimum_bytes, BlockPolicy::default())
}

/// Compute the fragments of `file`, cutting along its blocks as `blocks`
/// directs.
///
/// # Errors
/// `InvalidBoundaries` if the file's layout metadata is inconsistent.
pub fn plan_with_blocks(
    file: &SourceFile,
    preferred_bytes: i64,
    minimum_bytes: i64,
    blocks: BlockPolicy,
) -> Result<Vec<Fragment>> {
    file.validate()?;
    let length = file.length;
    let ranges = if length == 0 || preferred_bytes <= 0 {
        vec![(0, length)]
    } else if file.boundaries.is_empty() && !file.blocks.is_empty() {
        block_ranges(file, preferred_bytes.unsigned_abs(), minimum_bytes, blocks)
    } else {
        split_ranges(file, preferred_bytes.unsigned_abs(), minimum_bytes)
    };
    let fragments: Vec<Fragment> = ranges
        .into_iter()
        .map(|(start, end)| Fragment {
            path: file.path.clone(),
            start,
            end,
            hosts: hosts_for(file, start, end),
        })
        .collect();
    for f in &fragments {
        trace!(
            "Fragment found (path={}, offset={}, size={}, owners={:?})",
            f.path,
            f.start,
            f.len(),
            f.hosts
        );
    }
    Ok(fragments)
}

fn split_ranges(file: &SourceFile, preferred: u64, minimum: i64) -> Vec<(u64, u64)> {
    let length = file.length;
    let mut ranges: Vec<(u64, u64)> = Vec::new();
    let mut start = 0;
    if file.boundaries.is_empty() {
        while length - start > preferred {
            ranges.push((start, start + preferred));
            start += preferred;
        }
    } else {
        for &b in file.boundaries.iter().filter(|&&b| b > 0 && b < length) {
            if b - start >= preferred {
                ranges.push((start, b));
                start = b;
            }
        }
    }
    if start < length {
        ranges.push((start, length));
    }
    merge_short_tail(&mut ranges, minimum);
    ranges
}

fn merge_short_tail(ranges: &mut Vec<(u64, u64)>, minimum: i64) {
    if minimum > 0
        && ranges.len() >= 2
        && let Some(&(tail_start, tail_end)) = ranges.last()
        && tail_end - tail_start < minimum.unsigned_abs()
    {
        ranges.pop();
        if let Some(prev) = ranges.last_mut() {
            prev.1 = tail_end;
        }
    }
}

/// Block extents in file order, overlaps clipped and gaps filled, so they
/// tile `[0, length)`.
fn block_extents(file: &SourceFile) -> Vec<(u64, u64)> {
    let mut blocks: Vec<(u64, u64)> = file.blocks.iter().map(|b| (b.start, b.end)).collect();
    blocks.sort_unstable();
    let mut extents = Vec::with_capacity(blocks.len());
    let mut cursor = 0;
    for (start, end) in blocks {
        let start = start.max(cursor);
        if end <= start {
            continue;
        }
        if start > cursor {
            extents.push((cursor, start));
        }
        extents.push((start, end));
        cursor = end;
    }
    if cursor < file.length {
        extents.push((cursor, file.length));
    }
    extents
}

fn block_ranges(
    file: &SourceFile,
    preferred: u64,
    minimum: i64,
    policy: BlockPolicy,
) -> Vec<(u64, u64)> {
    // (start, end, whole block)
    let mut pieces: Vec<(u64, u64, bool)> = Vec::new();
    for (start, end) in block_extents(file) {
        if !policy.split || end - start <= preferred {
            pieces.push((start, end, true));
            continue;
        }
        let mut cut: Vec<(u64, u64)> = Vec::new();
        let mut at = start;
        while end - at > preferred {
            cut.push((at, at + preferred));
            at += preferred;
        }
        cut.push((at, end));
        merge_short_tail(&mut cut, minimum);
        pieces.extend(cut.into_iter().map(|(s, e)| (s, e, false)));
    }
    let mut ranges: Vec<(u64, u64)> = Vec::with_capacity(pieces.len());
    let mut open_run = false;
    for (start, end, whole) in pieces {
        if policy.combine
            && whole
            && open_run
            && let Some(last) = ranges.last_mut()
            && end - last.0 <= preferred
        {
            last.1 = end;
            continue;
        }
        ranges.push((start, end));
        open_run = whole;
    }
    merge_short_tail(&mut ranges, minimum);
    ranges
}

fn hosts_for(file: &SourceFile, start: u64, end: u64) -> Vec<String> {
    let mut hosts: Vec<String> = Vec::new();
    for block in file.blocks.iter().filter(|b| b.overlaps(start, end)) {
        for host in &block.hosts {
            if !hosts.contains(host) {
                hosts.push(host.clone());
            }
        }
    }
    hosts
}

/// Outcome of planning one file inside [`FragmentPlanner::plan_all`].
#[derive(Debug, Clone)]
pub struct FilePlan {
    pub path: String,
    pub outcome: Result<Vec<Fragment>>,
}

/// Per-file results of planning a file set, in input order.
#[derive(Debug, Clone, Default)]
pub struct PlanReport {
    pub files: Vec<FilePlan>,
}

impl PlanReport {
    /// Fragments of every file that planned successfully.
    pub fn fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.files
            .iter()
            .filter_map(|f| f.outcome.as_ref().ok())
            .flatten()
    }

    pub fn failures(&self) -> impl Iterator<Item = &Error> {
        self.files.iter().filter_map(|f| f.outcome.as_ref().err())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// All fragments, or the first per-file failure.
    pub fn into_fragments(self) -> Result<Vec<Fragment>> {
        let mut out = Vec::new();
        for file in self.files {
            out.extend(file.outcome?);
        }
        Ok(out)
    }
}

/// Fragment sizing bound to one format and data-source profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentPlanner {
    preferred_bytes: i64,
    minimum_bytes: i64,
    blocks: BlockPolicy,
}

impl FragmentPlanner {
    pub fn new(preferred_bytes: i64, minimum_bytes: i64) -> Self {
        Self {
            preferred_bytes,
            minimum_bytes,
            blocks: BlockPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_block_policy(mut self, blocks: BlockPolicy) -> Self {
        self.blocks = blocks;
        self
    }

    /// Planner that never splits files.
    pub fn whole_files() -> Self {
        Self::new(-1, -1)
    }

    /// Combine the profile limits with the format's hints.
    pub fn for_format(profile: &DataSourceProfile, format: &dyn DataFormat) -> Self {
        Self::new(
            profile.preferred_fragment_size_for(format),
            profile.minimum_fragment_size_for(format),
        )
        .with_block_policy(profile.block_policy())
    }

    pub fn preferred_bytes(&self) -> i64 {
        self.preferred_bytes
    }

    pub fn minimum_bytes(&self) -> i64 {
        self.minimum_bytes
    }

    pub fn block_policy(&self) -> BlockPolicy {
        self.blocks
    }

    pub fn plan(&self, file: &SourceFile) -> Result<Vec<Fragment>> {
        plan_with_blocks(file, self.preferred_bytes, self.minimum_bytes, self.blocks)
    }

    /// Plan every file; a failing file does not stop the others.
    pub fn plan_all(&self, files: &[SourceFile]) -> PlanReport {
        #[cfg(feature = "parallel-planning")]
        let plans: Vec<FilePlan> = {
            use rayon::prelude::*;
            files.par_iter().map(|f| self.plan_one(f)).collect()
        };
        #[cfg(not(feature = "parallel-planning"))]
        let plans: Vec<FilePlan> = files.iter().map(|f| self.plan_one(f)).collect();

        let report = PlanReport { files: plans };
        debug!(
            "Planned {} file(s) into {} fragment(s), {} failure(s)",
            files.len(),
            report.fragments().count(),
            report.failures().count()
        );
        report
    }

    fn plan_one(&self, file: &SourceFile) -> FilePlan {
        FilePlan {
            path: file.path.clone(),
            outcome: self.plan(file),
        }
    }
}
