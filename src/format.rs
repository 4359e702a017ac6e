//! Format drivers and their registry.
//!
//! A [`DataFormat`] tells the planners how a file format may be split and how
//! a record field is written into an output path. Drivers are looked up by
//! identifier through an explicit [`FormatRegistry`].

use crate::error::{Error, ErrorKind, Result};
use crate::record::{Record, Schema, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

const MIB: i64 = 1024 * 1024;

/// Capabilities the planners need from a file format.
pub trait DataFormat: Send + Sync {
    /// Identifier used in job declarations (e.g. `"csv"`).
    fn name(&self) -> &str;

    /// Preferred fragment size in bytes; `<= 0` defers to the profile.
    fn preferred_fragment_bytes(&self) -> i64 {
        -1
    }

    /// Minimum fragment size in bytes; `<= 0` makes the format non-splittable.
    fn minimum_fragment_bytes(&self) -> i64;

    /// Canonical text of `field` used in output paths.
    fn stringify(&self, record: &Record, field: &str) -> Result<String> {
        match record.get(field) {
            Value::Null => Err(Error::new(
                ErrorKind::UnresolvedPlaceholder,
                format!("field \"{field}\" is null and cannot name an output location"),
            )),
            value => Ok(value.to_string()),
        }
    }

    /// Whether records of `schema` can be written by this format.
    fn supports(&self, _schema: &Schema) -> bool {
        true
    }
}

impl fmt::Debug for dyn DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataFormat({})", self.name())
    }
}

/// Line-oriented text formats that can be split at any byte.
#[derive(Debug, Clone)]
pub struct TextFormat {
    name: String,
}

impl TextFormat {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl DataFormat for TextFormat {
    fn name(&self) -> &str {
        &self.name
    }

    fn minimum_fragment_bytes(&self) -> i64 {
        i64::MAX
    }
}

/// Columnar formats split only at stripe/row-group boundaries.
#[derive(Debug, Clone)]
pub struct ColumnarFormat {
    name: String,
    preferred: i64,
}

impl ColumnarFormat {
    pub fn new(name: impl Into<String>, preferred: i64) -> Self {
        Self {
            name: name.into(),
            preferred,
        }
    }
}

impl DataFormat for ColumnarFormat {
    fn name(&self) -> &str {
        &self.name
    }

    fn preferred_fragment_bytes(&self) -> i64 {
        self.preferred
    }

    fn minimum_fragment_bytes(&self) -> i64 {
        i64::MAX
    }

    fn supports(&self, schema: &Schema) -> bool {
        !schema.fields().is_empty()
    }
}

/// Opaque files that must be read whole.
#[derive(Debug, Clone, Default)]
pub struct WholeFileFormat;

impl DataFormat for WholeFileFormat {
    fn name(&self) -> &str {
        "binary"
    }

    fn minimum_fragment_bytes(&self) -> i64 {
        -1
    }
}

/// Format drivers by identifier.
#[derive(Clone, Default)]
pub struct FormatRegistry {
    formats: BTreeMap<String, Arc<dyn DataFormat>>,
}

impl FormatRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `csv`, `jsonl`, `parquet`, `orc` and
    /// `binary` drivers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(TextFormat::new("csv"));
        registry.register(TextFormat::new("jsonl"));
        registry.register(ColumnarFormat::new("parquet", 128 * MIB));
        registry.register(ColumnarFormat::new("orc", 256 * MIB));
        registry.register(WholeFileFormat);
        registry
    }

    /// Register `format`, replacing any driver with the same name.
    pub fn register<F: DataFormat + 'static>(&mut self, format: F) {
        self.formats
            .insert(format.name().to_string(), Arc::new(format));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DataFormat>> {
        self.formats.get(name).cloned()
    }

    /// Look up `name`, failing with `ConfigurationError` if unknown.
    pub fn require(&self, name: &str) -> Result<Arc<dyn DataFormat>> {
        self.get(name).ok_or_else(|| {
            Error::new(
                ErrorKind::ConfigurationError,
                format!(
                    "unknown data format \"{name}\" (known: {})",
                    self.names().collect::<Vec<_>>().join(", ")
                ),
            )
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.formats.keys().map(String::as_str)
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.formats.keys()).finish()
    }
}
