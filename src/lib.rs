//! # directio
//!
//! A **planning engine** for batch jobs whose inputs and outputs are
//! collections of files addressed by path patterns. It prepares descriptions
//! (fragments, output groups, orderings) for an external execution layer and
//! rejects unsafe job layouts before any record is processed.
//!
//! ## Key Features
//!
//! - **Path patterns** - literals, `*`, trailing `**`, `${variable}`, `{field}`, `{field:format}` and `[lo..hi]` placeholders
//! - **Input fragmentation** - byte-range splits that respect format boundaries or storage blocks, with locality hints
//! - **Output partitioning** - route records by placeholder values into per-location groups
//! - **Multi-key ordering** - stable, schema-checked sort specifications
//! - **Layout validation** - detect input/output and output/output path overlap up front
//! - **Pluggable formats** - an explicit registry of format drivers
//! - **Parallel planning** - files and groups are planned with Rayon
//!
//! ## Quick Start
//!
//! ```
//! use directio::descriptor::{InputDescriptor, JobIoDescriptor, OutputDescriptor};
//! use directio::format::FormatRegistry;
//! use directio::profile::DataSourceProfile;
//! use directio::testing::{sample_filesystem, sample_sales_records, sample_sales_schema};
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let job = JobIoDescriptor::new(sample_sales_schema())
//!     .input(InputDescriptor::new("sales", "warehouse/sales/*.csv", "csv"))
//!     .output(
//!         OutputDescriptor::new("by_region", "reports/{region}/part-*", "csv")
//!             .order(["-amount", "+id"]),
//!     );
//! let job = job.validate(&FormatRegistry::with_defaults())?;
//!
//! // Split the input files
//! let plans = job.plan_inputs(&sample_filesystem(), &DataSourceProfile::default())?;
//! assert_eq!(plans[0].files.len(), 2);
//!
//! // Route and sort the output records
//! let output = &job.outputs()[0].partitioner;
//! let groups = output.route(sample_sales_records())?;
//! for group in output.finalize_all(groups) {
//!     println!("{}: {} record(s)", group.location, group.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`pattern`] - Path pattern parsing, matching and rendering
//! - [`variables`] - `${name}` substitution from job arguments
//! - [`fragment`] - Input file fragmentation
//! - [`order`] - Order specifications and record comparison
//! - [`partition`] - Output grouping and finalization
//! - [`placeholder`] - Format arguments of output placeholders
//! - [`location`] / [`layout`] - Containment and layout validation
//! - [`descriptor`] - Job declarations tying everything together
//! - [`format`] / [`profile`] - Format drivers and fragment sizing
//! - [`fs`] - Filesystem collaborators
//! - [`testing`] - Fixtures and assertions for tests

pub mod descriptor;
pub mod error;
pub mod format;
pub mod fragment;
pub mod fs;
pub mod layout;
pub mod location;
pub mod order;
pub mod partition;
pub mod pattern;
pub mod placeholder;
pub mod profile;
pub mod record;
pub mod testing;
pub mod variables;

// General re-exports
pub use descriptor::{InputDescriptor, JobIoDescriptor, OutputDescriptor, ValidatedJob};
pub use error::{Diagnostics, Error, ErrorKind, Result};
pub use format::{DataFormat, FormatRegistry};
pub use fragment::{Fragment, FragmentPlanner, SourceFile};
pub use fs::{FileSystem, InMemoryFileSystem, LocalFileSystem};
pub use layout::{LayoutValidator, ValidationVerdict};
pub use location::Location;
pub use order::{Direction, OrderKey, OrderSpec};
pub use partition::{OutputGroup, OutputPartitioner};
pub use pattern::{PathPattern, Segment};
pub use placeholder::PlaceholderFormat;
pub use profile::DataSourceProfile;
pub use record::{FieldType, Record, Schema, Value};
pub use variables::VariableResolver;
