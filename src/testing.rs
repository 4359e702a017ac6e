//! Testing utilities for Direct I/O planning.
//!
//! Helpers for writing idiomatic tests against this crate:
//!
//! - **Fixtures**: a sample sales schema, records and an in-memory filesystem
//! - **Assertions**: structural checks on fragments, groups and orderings
//!
//! # Quick Start
//!
//! ```
//! use directio::fragment::FragmentPlanner;
//! use directio::fs::FileSystem;
//! use directio::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let fs = sample_filesystem();
//! let files = fs.list_files("warehouse/sales")?;
//! let planner = FragmentPlanner::new(64, 16);
//! for file in &files {
//!     let file = fs.describe(file.clone())?;
//!     assert_fragments_cover(&file, &planner.plan(&file)?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;
