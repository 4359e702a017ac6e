//! `${name}` substitution from job arguments.
//!
//! Variables are resolved while the job is validated, so a missing argument
//! is reported before planning starts instead of leaking an unexpanded
//! `${name}` into a file listing.

use crate::error::{Error, ErrorKind, Result};
use std::collections::{BTreeMap, HashMap};

/// Characters allowed in a variable name.
pub fn is_variable_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// A fragment of a raw string split around its variables.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece<'a> {
    Text(&'a str),
    Var(&'a str),
}

fn split_pieces(pattern: &str) -> Result<Vec<Piece<'_>>> {
    let mut pieces = Vec::new();
    let mut rest = pattern;
    while let Some(pos) = rest.find("${") {
        if pos > 0 {
            pieces.push(Piece::Text(&rest[..pos]));
        }
        let offset = pattern.len() - rest.len() + pos;
        let after = &rest[pos + 2..];
        let Some(end) = after.find('}') else {
            return Err(Error::malformed_pattern(
                pattern,
                format!("unterminated variable at offset {offset}"),
            ));
        };
        let name = &after[..end];
        if name.is_empty() {
            return Err(Error::malformed_pattern(pattern, "empty variable name"));
        }
        if let Some(c) = name.chars().find(|&c| !is_variable_name_char(c)) {
            return Err(Error::malformed_pattern(
                pattern,
                format!("invalid character {c:?} in variable name (offset {offset})"),
            ));
        }
        pieces.push(Piece::Var(name));
        rest = &after[end + 1..];
    }
    if !rest.is_empty() {
        pieces.push(Piece::Text(rest));
    }
    Ok(pieces)
}

/// Substitute every variable `lookup` knows. Returns the text and the names
/// it did not know, each once, in first-seen order.
fn substitute<'p, 'v>(
    pattern: &'p str,
    lookup: impl Fn(&str) -> Option<&'v str>,
) -> Result<(String, Vec<&'p str>)> {
    let mut out = String::with_capacity(pattern.len());
    let mut missing: Vec<&str> = Vec::new();
    for piece in split_pieces(pattern)? {
        match piece {
            Piece::Text(t) => out.push_str(t),
            Piece::Var(name) => match lookup(name) {
                Some(v) => out.push_str(v),
                None if !missing.contains(&name) => missing.push(name),
                None => {}
            },
        }
    }
    Ok((out, missing))
}

/// Replace every `${name}` in `pattern` with its value from `variables`.
///
/// A `$` that is not followed by `{` is kept as is.
///
/// # Errors
/// `UndefinedVariable` for the first name missing from `variables`,
/// `MalformedPattern` for an unterminated `${` or an invalid name.
pub fn resolve<S: std::hash::BuildHasher>(
    pattern: &str,
    variables: &HashMap<String, String, S>,
) -> Result<String> {
    first_missing(pattern, substitute(pattern, |name| variables.get(name).map(String::as_str))?)
}

fn first_missing(pattern: &str, (out, missing): (String, Vec<&str>)) -> Result<String> {
    match missing.first() {
        Some(name) => Err(undefined(name, pattern)),
        None => Ok(out),
    }
}

/// Names of all variables referenced by `pattern`, in first-seen order.
pub fn referenced_variables(pattern: &str) -> Result<Vec<String>> {
    let (_, names) = substitute(pattern, |_| None)?;
    Ok(names.into_iter().map(str::to_string).collect())
}

fn undefined(name: &str, pattern: &str) -> Error {
    Error::new(
        ErrorKind::UndefinedVariable,
        format!("variable \"{name}\" is not defined (pattern \"{pattern}\")"),
    )
}

/// A reusable variable table, typically the batch arguments of one job run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableResolver {
    variables: BTreeMap<String, String>,
}

impl VariableResolver {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// Overlay `other` on top of this table; `other` wins on collisions.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut variables = self.variables.clone();
        variables.extend(other.variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { variables }
    }

    /// Resolve `pattern`, failing on the first undefined variable.
    pub fn resolve(&self, pattern: &str) -> Result<String> {
        first_missing(pattern, substitute(pattern, |name| self.get(name))?)
    }

    /// Resolve `pattern`, reporting every undefined variable at once.
    pub fn resolve_all(&self, pattern: &str) -> std::result::Result<String, Vec<Error>> {
        let (out, missing) = substitute(pattern, |name| self.get(name)).map_err(|e| vec![e])?;
        if missing.is_empty() {
            Ok(out)
        } else {
            Err(missing.into_iter().map(|name| undefined(name, pattern)).collect())
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariableResolver {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            variables: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
