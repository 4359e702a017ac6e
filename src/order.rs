//! Multi-key record ordering for output groups.
//!
//! An [`OrderSpec`] is parsed from tokens such as `["+region", "-amount"]`
//! and then checked once against the record [`Schema`]; comparing records
//! afterwards can no longer fail.
//!
//! Accepted token forms (surrounding whitespace is ignored):
//!
//! - `name` or `+name`: ascending
//! - `-name`: descending
//! - `name ASC` or `name DESC`: case-insensitive keyword forms

use crate::error::{Error, ErrorKind, Result};
use crate::record::{Record, Schema};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

static ORDER_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:(?P<plain>\w+)|\+\s*(?P<asc>\w+)|-\s*(?P<desc>\w+)|(?P<kasc>\w+)\s+(?i:asc)|(?P<kdesc>\w+)\s+(?i:desc))\s*$",
    )
    .expect("order token regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderKey {
    pub property: String,
    pub direction: Direction,
}

impl OrderKey {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Descending,
        }
    }

    /// Parse a single order token.
    pub fn parse(token: &str) -> Result<Self> {
        let caps = ORDER_TOKEN.captures(token).ok_or_else(|| {
            Error::new(
                ErrorKind::MalformedOrderToken,
                format!("invalid order token {token:?}"),
            )
        })?;
        let (name, direction) = [
            ("plain", Direction::Ascending),
            ("asc", Direction::Ascending),
            ("desc", Direction::Descending),
            ("kasc", Direction::Ascending),
            ("kdesc", Direction::Descending),
        ]
        .into_iter()
        .find_map(|(group, dir)| caps.name(group).map(|m| (m.as_str(), dir)))
        .ok_or_else(|| {
            Error::new(
                ErrorKind::MalformedOrderToken,
                format!("invalid order token {token:?}"),
            )
        })?;
        Ok(Self {
            property: name.to_string(),
            direction,
        })
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Ascending => write!(f, "+{}", self.property),
            Direction::Descending => write!(f, "-{}", self.property),
        }
    }
}

/// Ordered list of [`OrderKey`]s. Empty means "any order".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct OrderSpec {
    keys: Vec<OrderKey>,
}

impl OrderSpec {
    pub fn new(keys: Vec<OrderKey>) -> Self {
        Self { keys }
    }

    /// Parse order tokens without looking at a schema.
    ///
    /// # Errors
    /// `MalformedOrderToken` for the first token that does not parse.
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Result<Self> {
        let keys = tokens
            .iter()
            .map(|t| OrderKey::parse(t.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { keys })
    }

    /// Parse `tokens` and check them against `schema`.
    pub fn compile<S: AsRef<str>>(tokens: &[S], schema: &Schema) -> Result<Self> {
        let spec = Self::parse(tokens)?;
        spec.check(schema)?;
        Ok(spec)
    }

    /// Verify every key names an orderable schema field, at most once.
    ///
    /// # Errors
    /// `ConfigurationError` for an unknown, duplicated or non-orderable key.
    pub fn check(&self, schema: &Schema) -> Result<()> {
        let mut seen = BTreeSet::new();
        for key in &self.keys {
            let ty = schema.type_of(&key.property).ok_or_else(|| {
                Error::new(
                    ErrorKind::ConfigurationError,
                    format!("order key \"{}\" is not a field of the record", key.property),
                )
            })?;
            if !ty.is_orderable() {
                return Err(Error::new(
                    ErrorKind::ConfigurationError,
                    format!(
                        "order key \"{}\" has type {ty}, which cannot be ordered",
                        key.property
                    ),
                ));
            }
            if !seen.insert(key.property.as_str()) {
                return Err(Error::new(
                    ErrorKind::ConfigurationError,
                    format!("order key \"{}\" is listed more than once", key.property),
                ));
            }
        }
        Ok(())
    }

    pub fn keys(&self) -> &[OrderKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Lexicographic comparison over the keys, first key dominant.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        for key in &self.keys {
            let ordering = a.get(&key.property).cmp(b.get(&key.property));
            if ordering != Ordering::Equal {
                return key.direction.apply(ordering);
            }
        }
        Ordering::Equal
    }

    /// Stable sort; records equal on every key keep their arrival order.
    pub fn sort(&self, records: &mut [Record]) {
        if self.keys.is_empty() {
            return;
        }
        records.sort_by(|a, b| self.compare(a, b));
    }
}

impl fmt::Display for OrderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.keys.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}
