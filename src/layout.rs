//! Static overlap analysis of a job's declared inputs and outputs.
//!
//! The validator runs once per job, before any data is touched, and reports
//! every layout problem in a single [`ValidationVerdict`]:
//!
//! 1. Two outputs conflict when one's containment path is an ancestor of, or
//!    identical to, the other's. Declaring the same output twice conflicts.
//! 2. An output that is an ancestor of (or identical to) an input conflicts.
//!    An input that is an ancestor of an output is fine.
//! 3. A prefix output needs a directory above its generated files, a purely
//!    alphanumeric name before the wildcard, and no wildcard except at the end.
//!
//! ```
//! use directio::layout::validate;
//!
//! let verdict = validate(&["conflict/input.txt"], &["conflict-*"])?;
//! assert!(!verdict.is_ok());
//! # Ok::<(), directio::Error>(())
//! ```

use crate::error::{Error, ErrorKind, Result};
use crate::location::{Location, Relation};
use crate::pattern::{PathPattern, Segment};
use log::debug;
use std::fmt;

/// Why a declaration (or a pair of them) was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictReason {
    /// Rule 1.
    OutputOverlapsOutput,
    /// Rule 2.
    OutputContainsInput,
    /// Rule 3: generated files would land directly under the root.
    OutputAtRoot,
    /// Rule 3: the name before the wildcard is not alphanumeric.
    InvalidOutputName,
    /// Rule 3: a wildcard appears before the final position.
    MalformedOutputPattern,
}

impl ConflictReason {
    pub fn code(self) -> &'static str {
        match self {
            Self::OutputOverlapsOutput => "output-overlaps-output",
            Self::OutputContainsInput => "output-contains-input",
            Self::OutputAtRoot => "output-at-root",
            Self::InvalidOutputName => "invalid-output-name",
            Self::MalformedOutputPattern => "malformed-output-pattern",
        }
    }

    /// Error kind a violation of this reason converts into.
    pub fn error_kind(self) -> ErrorKind {
        match self {
            Self::MalformedOutputPattern => ErrorKind::MalformedOutputPattern,
            _ => ErrorKind::LayoutConflict,
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A declared input or output as seen by the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub location: Location,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == self.location.path() {
            write!(f, "\"{}\"", self.name)
        } else {
            write!(f, "{} (\"{}\")", self.name, self.location)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub reason: ConflictReason,
    pub first: Endpoint,
    /// The other half of a conflicting pair; `None` for single-output rules.
    pub second: Option<Endpoint>,
    pub message: String,
}

impl Violation {
    pub fn to_error(&self) -> Error {
        Error::new(self.reason.error_kind(), self.message.clone())
            .with_subject(self.first.name.clone())
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.reason, self.message)
    }
}

/// Result of one validation pass. Empty means the layout is safe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationVerdict {
    violations: Vec<Violation>,
}

impl ValidationVerdict {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// True if some violation has `reason`.
    pub fn has(&self, reason: ConflictReason) -> bool {
        self.violations.iter().any(|v| v.reason == reason)
    }

    /// One error per violation, each with its own kind.
    pub fn into_errors(self) -> Vec<Error> {
        self.violations.iter().map(Violation::to_error).collect()
    }

    /// Collapse the verdict into a single `LayoutConflict` error.
    pub fn into_result(self) -> Result<()> {
        if self.is_ok() {
            return Ok(());
        }
        let lines: Vec<String> = self.violations.iter().map(ToString::to_string).collect();
        Err(Error::new(
            ErrorKind::LayoutConflict,
            format!(
                "{} layout violation(s): {}",
                lines.len(),
                lines.join("; ")
            ),
        ))
    }
}

/// Collects declarations, then checks them all at once.
///
/// `check` consumes the validator, so a collected set is validated exactly
/// once and a verdict never changes after it is produced.
#[derive(Debug, Clone, Default)]
pub struct LayoutValidator {
    inputs: Vec<Endpoint>,
    outputs: Vec<Endpoint>,
}

impl LayoutValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_input(&mut self, name: impl Into<String>, location: Location) {
        let name = name.into();
        debug!("Layout input {name}: {location}");
        self.inputs.push(Endpoint { name, location });
    }

    pub fn add_output(&mut self, name: impl Into<String>, location: Location) {
        let name = name.into();
        debug!("Layout output {name}: {location}");
        self.outputs.push(Endpoint { name, location });
    }

    pub fn check(self) -> ValidationVerdict {
        let mut violations = Vec::new();

        for output in &self.outputs {
            check_output_shape(output, &mut violations);
        }

        for (i, a) in self.outputs.iter().enumerate() {
            for b in &self.outputs[i + 1..] {
                let overlap = match a.location.relation(&b.location) {
                    Relation::Same => Some("is the same location as"),
                    Relation::Ancestor => Some("contains"),
                    Relation::Descendant => Some("is contained in"),
                    Relation::Disjoint => None,
                };
                if let Some(verb) = overlap {
                    violations.push(Violation {
                        reason: ConflictReason::OutputOverlapsOutput,
                        first: a.clone(),
                        second: Some(b.clone()),
                        message: format!("output {a} {verb} output {b}"),
                    });
                }
            }
        }

        for output in &self.outputs {
            for input in &self.inputs {
                if output.location.contains(&input.location) {
                    violations.push(Violation {
                        reason: ConflictReason::OutputContainsInput,
                        first: output.clone(),
                        second: Some(input.clone()),
                        message: format!("output {output} would overwrite input {input}"),
                    });
                }
            }
        }

        debug!(
            "Layout checked: {} input(s), {} output(s), {} violation(s)",
            self.inputs.len(),
            self.outputs.len(),
            violations.len()
        );
        ValidationVerdict { violations }
    }
}

fn check_output_shape(output: &Endpoint, violations: &mut Vec<Violation>) {
    let mut reject = |reason, message: String| {
        violations.push(Violation {
            reason,
            first: output.clone(),
            second: None,
            message,
        });
    };

    let segments = output.location.path_segments();
    let Some((last, dirs)) = segments.split_last() else {
        reject(
            ConflictReason::OutputAtRoot,
            format!("output {output} has no path"),
        );
        return;
    };

    let misplaced = dirs.iter().flatten().any(is_wildcard)
        || last
            .split_last()
            .is_some_and(|(_, head)| head.iter().any(is_wildcard));
    if misplaced {
        reject(
            ConflictReason::MalformedOutputPattern,
            format!("output {output} has a wildcard before its final position"),
        );
        return;
    }

    if !output.location.is_prefix() {
        return;
    }

    if dirs.is_empty() {
        reject(
            ConflictReason::OutputAtRoot,
            format!("output {output} must name a directory above its generated files"),
        );
    }

    let name = match last.as_slice() {
        [Segment::MultiWildcard] | [Segment::SingleWildcard] => Some(""),
        [Segment::Literal(name), Segment::SingleWildcard] => {
            Some(name.strip_suffix('-').unwrap_or(name))
        }
        _ => None,
    };
    match name {
        Some(name) if name.chars().all(|c| c.is_ascii_alphanumeric()) => {}
        _ => reject(
            ConflictReason::InvalidOutputName,
            format!("output {output} must use only alphanumeric characters before the wildcard"),
        ),
    }
}

fn is_wildcard(segment: &Segment) -> bool {
    matches!(segment, Segment::SingleWildcard | Segment::MultiWildcard)
}

/// Validate plain path strings, each declaration named by its own path.
///
/// # Errors
/// `MalformedPattern` when a path does not parse.
pub fn validate<S: AsRef<str>>(inputs: &[S], outputs: &[S]) -> Result<ValidationVerdict> {
    let mut validator = LayoutValidator::new();
    for path in inputs {
        let path = path.as_ref();
        validator.add_input(path, Location::from_pattern(&PathPattern::input(path)?));
    }
    for path in outputs {
        let path = path.as_ref();
        validator.add_output(path, Location::parse(path)?);
    }
    Ok(validator.check())
}
