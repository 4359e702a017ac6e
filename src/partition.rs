//! Routing output records into per-location groups.
//!
//! The group key of a record is the set of values of the output pattern's
//! placeholders: `{field}` values as stringified by the format driver,
//! `{field:format}` values rendered by their [`PlaceholderFormat`], and one
//! random draw per `[lower..upper]`. Records with the same key land in the
//! same [`OutputGroup`]. Two different keys never share a location; routing
//! fails when they would.

use crate::error::{Error, ErrorKind, Result};
use crate::format::DataFormat;
use crate::location::Location;
use crate::order::OrderSpec;
use crate::pattern::{PathPattern, Segment};
use crate::placeholder::PlaceholderFormat;
use crate::record::{Record, Schema};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Placeholder values of `record` for every `{field}` placeholder of
/// `pattern`, keyed by field name.
///
/// # Errors
/// `UnresolvedPlaceholder` if a referenced field is missing or null;
/// `ConfigurationError` if the pattern has `{field:format}` placeholders,
/// which need the field types an [`OutputPartitioner`] carries.
pub fn group_key_of(
    pattern: &PathPattern,
    record: &Record,
    format: &dyn DataFormat,
) -> Result<BTreeMap<String, String>> {
    field_values(pattern, record, format, &BTreeMap::new())
}

fn field_values(
    pattern: &PathPattern,
    record: &Record,
    format: &dyn DataFormat,
    formatters: &BTreeMap<String, PlaceholderFormat>,
) -> Result<BTreeMap<String, String>> {
    let mut key = BTreeMap::new();
    for segment in pattern.segments() {
        let value = match segment {
            Segment::GroupPlaceholder(field) => format.stringify(record, field)?,
            Segment::FormattedPlaceholder { field, .. } => {
                let name = segment.placeholder_key().unwrap_or_default();
                let formatter = formatters.get(&name).ok_or_else(|| {
                    Error::new(
                        ErrorKind::ConfigurationError,
                        format!("placeholder {{{name}}} needs the type of field \"{field}\""),
                    )
                })?;
                formatter.apply(record, field)?
            }
            _ => continue,
        };
        key.insert(segment.placeholder_key().unwrap_or_default(), value);
    }
    Ok(key)
}

/// All records destined for one resolved location.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputGroup {
    pub location: Location,
    /// Placeholder values every record of the group shares.
    pub key: BTreeMap<String, String>,
    pub records: Vec<Record>,
}

impl OutputGroup {
    pub fn new(location: Location, key: BTreeMap<String, String>) -> Self {
        Self {
            location,
            key,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Sort a group's records for writing. Records equal on every order key
/// keep the order in which they were routed.
pub fn finalize(group: OutputGroup, order: &OrderSpec) -> Vec<Record> {
    let mut records = group.records;
    order.sort(&mut records);
    records
}

/// Finalize every group; groups are independent and are sorted in parallel.
/// The result keeps the groups in location order.
pub fn finalize_all(
    groups: BTreeMap<Location, OutputGroup>,
    order: &OrderSpec,
) -> Vec<OutputGroup> {
    let mut groups: Vec<OutputGroup> = groups.into_values().collect();
    #[cfg(feature = "parallel-planning")]
    {
        use rayon::prelude::*;
        groups
            .par_iter_mut()
            .for_each(|g| order.sort(&mut g.records));
    }
    #[cfg(not(feature = "parallel-planning"))]
    {
        for g in &mut groups {
            order.sort(&mut g.records);
        }
    }
    groups
}

/// Routes records of one output declaration.
#[derive(Clone)]
pub struct OutputPartitioner {
    pattern: PathPattern,
    order: OrderSpec,
    format: Arc<dyn DataFormat>,
    formatters: BTreeMap<String, PlaceholderFormat>,
    seed: Option<u64>,
}

impl OutputPartitioner {
    /// Partitioner for a pattern without `{field:format}` placeholders.
    ///
    /// # Errors
    /// `MalformedOutputPattern` unless `pattern` is a prefix pattern;
    /// `ConfigurationError` if a placeholder has a format argument.
    pub fn new(pattern: PathPattern, order: OrderSpec, format: Arc<dyn DataFormat>) -> Result<Self> {
        Self::with_schema(pattern, order, format, &Schema::new())
    }

    /// Partitioner whose `{field:format}` placeholders are compiled for the
    /// field types of `schema`.
    ///
    /// # Errors
    /// `MalformedOutputPattern` unless `pattern` is a prefix pattern;
    /// `ConfigurationError` if a formatted field is unknown or its argument
    /// does not suit the field type.
    pub fn with_schema(
        pattern: PathPattern,
        order: OrderSpec,
        format: Arc<dyn DataFormat>,
        schema: &Schema,
    ) -> Result<Self> {
        if !pattern.is_prefix_pattern() {
            return Err(Error::new(
                ErrorKind::MalformedOutputPattern,
                format!("output pattern \"{pattern}\" must end with a wildcard"),
            ));
        }
        let mut formatters = BTreeMap::new();
        for segment in pattern.segments() {
            if let Segment::FormattedPlaceholder { field, format: argument } = segment {
                let ty = schema.type_of(field).ok_or_else(|| {
                    Error::new(
                        ErrorKind::ConfigurationError,
                        format!("placeholder {{{field}:{argument}}} needs the type of field \"{field}\""),
                    )
                })?;
                formatters.insert(
                    segment.placeholder_key().unwrap_or_default(),
                    PlaceholderFormat::compile(ty, argument)?,
                );
            }
        }
        Ok(Self {
            pattern,
            order,
            format,
            formatters,
            seed: None,
        })
    }

    /// Draw `[lower..upper]` values from a generator seeded with `seed`, so
    /// every routing run picks the same numbers.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn order(&self) -> &OrderSpec {
        &self.order
    }

    pub fn format(&self) -> &dyn DataFormat {
        self.format.as_ref()
    }

    /// Field placeholder values of `record`, keyed by placeholder text.
    pub fn group_key_of(&self, record: &Record) -> Result<BTreeMap<String, String>> {
        field_values(&self.pattern, record, self.format.as_ref(), &self.formatters)
    }

    /// Resolved location `record` belongs to. Random numbers are drawn anew
    /// on each call unless a seed is set.
    pub fn location_of(&self, record: &Record) -> Result<Location> {
        let mut rng = self.random_source();
        let binding = self.binding_of(record, rng.as_mut())?;
        Ok(Location::from_pattern(&self.pattern.bind(&binding)?))
    }

    fn random_source(&self) -> Option<StdRng> {
        if !self.pattern.has_random_numbers() {
            return None;
        }
        Some(match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        })
    }

    fn binding_of(
        &self,
        record: &Record,
        rng: Option<&mut StdRng>,
    ) -> Result<BTreeMap<String, String>> {
        let mut binding = self.group_key_of(record)?;
        if let Some(rng) = rng {
            for segment in self.pattern.segments() {
                if let &Segment::RandomNumber { lower, upper } = segment {
                    let value: u32 = rng.random_range(lower..=upper);
                    binding.insert(segment.placeholder_key().unwrap_or_default(), value.to_string());
                }
            }
        }
        Ok(binding)
    }

    /// Hand each record to `sink` together with its location, without
    /// buffering. Stops at the first error from routing or from `sink`.
    /// Returns the number of records routed.
    ///
    /// # Errors
    /// `LayoutConflict` if records with different placeholder values
    /// render to the same location.
    pub fn route_each<I, F>(&self, records: I, mut sink: F) -> Result<usize>
    where
        I: IntoIterator<Item = Record>,
        F: FnMut(&Location, Record) -> Result<()>,
    {
        self.route_with_keys(records, |location, _, record| sink(location, record))
    }

    fn route_with_keys<I, F>(&self, records: I, mut sink: F) -> Result<usize>
    where
        I: IntoIterator<Item = Record>,
        F: FnMut(&Location, &BTreeMap<String, String>, Record) -> Result<()>,
    {
        let mut rng = self.random_source();
        let mut bound: BTreeMap<Location, BTreeMap<String, String>> = BTreeMap::new();
        let mut routed = 0;
        for record in records {
            let binding = self.binding_of(&record, rng.as_mut())?;
            let location = Location::from_pattern(&self.pattern.bind(&binding)?);
            match bound.get(&location) {
                Some(existing) if *existing != binding => {
                    return Err(Error::new(
                        ErrorKind::LayoutConflict,
                        format!(
                            "placeholder values {existing:?} and {binding:?} of \"{}\" both render to this location",
                            self.pattern
                        ),
                    )
                    .with_subject(location.path()));
                }
                Some(_) => {}
                None => {
                    bound.insert(location.clone(), binding.clone());
                }
            }
            sink(&location, &binding, record)?;
            routed += 1;
        }
        Ok(routed)
    }

    /// Buffer every record into its group.
    ///
    /// # Errors
    /// As [`OutputPartitioner::route_each`].
    pub fn route<I>(&self, records: I) -> Result<BTreeMap<Location, OutputGroup>>
    where
        I: IntoIterator<Item = Record>,
    {
        let mut groups: BTreeMap<Location, OutputGroup> = BTreeMap::new();
        let routed = self.route_with_keys(records, |location, key, record| {
            groups
                .entry(location.clone())
                .or_insert_with(|| OutputGroup::new(location.clone(), key.clone()))
                .records
                .push(record);
            Ok(())
        })?;
        debug!(
            "Routed {routed} record(s) of \"{}\" into {} group(s)",
            self.pattern,
            groups.len()
        );
        Ok(groups)
    }

    /// Sort one group with this output's order.
    pub fn finalize(&self, group: OutputGroup) -> Vec<Record> {
        finalize(group, &self.order)
    }

    /// Sort every group with this output's order.
    pub fn finalize_all(&self, groups: BTreeMap<Location, OutputGroup>) -> Vec<OutputGroup> {
        finalize_all(groups, &self.order)
    }
}

impl fmt::Debug for OutputPartitioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputPartitioner")
            .field("pattern", &self.pattern.to_string())
            .field("order", &self.order.to_string())
            .field("format", &self.format.name())
            .field("seed", &self.seed)
            .finish()
    }
}
