//! Error taxonomy for planning-time failures.
//!
//! Every error produced by this crate is a *planning-time* error: it is raised
//! before any fragment is read or any output byte is written, and none of them
//! are retried. Aggregating operations (job validation, layout validation)
//! return a [`Diagnostics`] list instead of stopping at the first problem.

use std::error::Error as StdError;
use std::fmt;

/// Category of a planning error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A path pattern could not be parsed.
    MalformedPattern,
    /// A `${name}` variable has no value in the variable table.
    UndefinedVariable,
    /// A `{field}` placeholder has no value while rendering.
    UnresolvedPlaceholder,
    /// An output pattern is not a usable prefix pattern.
    MalformedOutputPattern,
    /// A source file declared broken split boundaries or block ranges.
    InvalidBoundaries,
    /// An order token could not be parsed.
    MalformedOrderToken,
    /// Order keys, placeholders or formats do not fit the declared schema.
    ConfigurationError,
    /// Declared inputs and outputs overlap.
    LayoutConflict,
    /// A mandatory input resolved to no files.
    NoMatchingInput,
    /// The filesystem collaborator failed.
    Io,
}

impl ErrorKind {
    /// Stable reason code used in reports.
    pub fn code(self) -> &'static str {
        match self {
            Self::MalformedPattern => "malformed-pattern",
            Self::UndefinedVariable => "undefined-variable",
            Self::UnresolvedPlaceholder => "unresolved-placeholder",
            Self::MalformedOutputPattern => "malformed-output-pattern",
            Self::InvalidBoundaries => "invalid-boundaries",
            Self::MalformedOrderToken => "malformed-order-token",
            Self::ConfigurationError => "configuration-error",
            Self::LayoutConflict => "layout-conflict",
            Self::NoMatchingInput => "no-matching-input",
            Self::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A planning error with its category and the declaration it concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    /// Name of the input/output/file the error is about, if known.
    pub subject: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            subject: None,
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn malformed_pattern(pattern: &str, detail: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::MalformedPattern,
            format!("invalid path pattern \"{pattern}\": {detail}"),
        )
    }

    pub fn io(err: &anyhow::Error) -> Self {
        Self::new(ErrorKind::Io, format!("{err:#}"))
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subject {
            Some(subject) => write!(f, "[{}] {}: {}", self.kind, subject, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

impl StdError for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Every problem found by one aggregated validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    errors: Vec<Error>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: Error) {
        self.errors.push(error);
    }

    /// Record the error of `result`, if any, and hand back its value.
    pub fn capture<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// True if at least one error of `kind` was recorded.
    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }

    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Extend<Error> for Diagnostics {
    fn extend<I: IntoIterator<Item = Error>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

impl IntoIterator for Diagnostics {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} problem(s) found", self.errors.len())?;
        for e in &self.errors {
            write!(f, "\n  - {e}")?;
        }
        Ok(())
    }
}

impl StdError for Diagnostics {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_subject() {
        let e = Error::new(ErrorKind::UndefinedVariable, "variable \"date\" is not defined")
            .with_subject("in1");
        assert_eq!(
            e.to_string(),
            "[undefined-variable] in1: variable \"date\" is not defined"
        );
    }

    #[test]
    fn diagnostics_capture_keeps_values_and_errors() {
        let mut d = Diagnostics::new();
        assert_eq!(d.capture(Ok::<_, Error>(3)), Some(3));
        assert_eq!(
            d.capture::<u32>(Err(Error::new(ErrorKind::Io, "boom"))),
            None
        );
        assert_eq!(d.len(), 1);
        assert!(d.contains(ErrorKind::Io));
        assert!(d.into_result().is_err());
    }
}
