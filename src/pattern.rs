//! Path patterns for Direct I/O inputs and outputs.
//!
//! A pattern is a `/`-separated path made of literal text, wildcards,
//! `${variable}` references and, in output patterns only, `{field}` grouping
//! placeholders:
//!
//! | Syntax       | Meaning                                                  |
//! |--------------|----------------------------------------------------------|
//! | `text`       | literal, matched byte-for-byte                           |
//! | `*`          | non-empty run of characters inside one path segment      |
//! | `**`         | zero or more trailing segments (final segment only)      |
//! | `${name}`    | job argument, substituted before matching                |
//! | `{field}`    | record field value (output patterns only)                |
//! | `{field:fmt}`| field value rendered with a format argument (output only) |
//! | `[lo..hi]`   | random number in `lo..=hi` (output only)                 |
//!
//! The characters `\ ? # | [ ] }` and control characters are reserved
//! outside of the constructs above. Two placeholders must be separated by
//! literal text, otherwise different values could render to the same path.
//!
//! # Examples
//!
//! ```
//! use directio::pattern::PathPattern;
//!
//! let p = PathPattern::input("logs/2024-*/events.csv")?;
//! assert!(p.matches("logs/2024-01/events.csv"));
//! assert!(!p.matches("logs/2024-01/x/events.csv"));
//!
//! let out = PathPattern::output("sales/{region}/part-*")?;
//! assert!(out.is_prefix_pattern());
//! # Ok::<(), directio::Error>(())
//! ```

use crate::error::{Error, ErrorKind, Result};
use crate::variables::{VariableResolver, is_variable_name_char};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

/// One element of a [`PathPattern`].
///
/// Literal text may span several path segments; separators are kept inside
/// the literal so the pattern can be rendered back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Literal(String),
    /// `*`: a non-empty run inside one path segment.
    SingleWildcard,
    /// `**`: any number of trailing segments.
    MultiWildcard,
    /// `${name}`
    Variable(String),
    /// `{field}`
    GroupPlaceholder(String),
    /// `{field:format}`
    FormattedPlaceholder { field: String, format: String },
    /// `[lower..upper]`
    RandomNumber { lower: u32, upper: u32 },
}

impl Segment {
    fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// Whether this element is replaced by a value when the pattern is bound.
    pub fn is_placeholder(&self) -> bool {
        matches!(
            self,
            Self::GroupPlaceholder(_) | Self::FormattedPlaceholder { .. } | Self::RandomNumber { .. }
        )
    }

    /// Record field read by this placeholder.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::GroupPlaceholder(field) | Self::FormattedPlaceholder { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Key under which [`PathPattern::bind`] looks up the value of this
    /// placeholder: the text between the delimiters.
    pub fn placeholder_key(&self) -> Option<String> {
        match self {
            Self::GroupPlaceholder(field) => Some(field.clone()),
            Self::FormattedPlaceholder { field, format } => Some(format!("{field}:{format}")),
            Self::RandomNumber { lower, upper } => Some(format!("{lower}..{upper}")),
            _ => None,
        }
    }
}

/// A parsed, immutable path pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

const RESERVED: &[char] = &['\\', '?', '#', '|', '[', ']', '}'];

static RANDOM_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\.{2,3}(\d+)$").expect("random range regex is valid")
});

fn is_field_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl PathPattern {
    /// Parse `pattern`.
    ///
    /// `allow_group_placeholders` must be `false` for input patterns.
    ///
    /// # Errors
    /// `MalformedPattern` if the pattern is empty, contains `**` anywhere but
    /// as the final segment, contains an unterminated `${`/`{`, uses a
    /// placeholder where none are allowed, or uses a reserved character.
    pub fn parse(pattern: &str, allow_group_placeholders: bool) -> Result<Self> {
        if pattern.trim_matches('/').is_empty() {
            return Err(Error::malformed_pattern(pattern, "pattern is empty"));
        }
        let chars: Vec<(usize, char)> = pattern.char_indices().collect();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut i = 0;
        while i < chars.len() {
            let (offset, c) = chars[i];
            match c {
                '/' => {
                    if !literal.ends_with('/') {
                        literal.push('/');
                    }
                    i += 1;
                }
                '*' => {
                    if chars.get(i + 1).is_some_and(|&(_, n)| n == '*') {
                        let at_segment_start = i == 0 || chars[i - 1].1 == '/';
                        let rest = &pattern[offset + 2..];
                        let whole_segment = rest.is_empty() || rest.starts_with('/');
                        if !at_segment_start || !whole_segment {
                            return Err(Error::malformed_pattern(
                                pattern,
                                format!("\"**\" must form a whole segment (offset {offset})"),
                            ));
                        }
                        if !rest.trim_start_matches('/').is_empty() {
                            return Err(Error::malformed_pattern(
                                pattern,
                                "\"**\" may only appear as the final segment",
                            ));
                        }
                        flush(&mut literal, &mut segments);
                        segments.push(Segment::MultiWildcard);
                        break;
                    }
                    flush(&mut literal, &mut segments);
                    segments.push(Segment::SingleWildcard);
                    i += 1;
                }
                '$' if chars.get(i + 1).is_some_and(|&(_, n)| n == '{') => {
                    let (name, next) = read_variable(pattern, &chars, i + 2)?;
                    flush(&mut literal, &mut segments);
                    segments.push(Segment::Variable(name));
                    i = next;
                }
                '{' | '[' if !allow_group_placeholders => {
                    return Err(Error::malformed_pattern(
                        pattern,
                        format!("group placeholder is not allowed here (offset {offset})"),
                    ));
                }
                '{' => {
                    let (placeholder, next) = read_placeholder(pattern, &chars, i + 1)?;
                    push_placeholder(pattern, offset, placeholder, &mut literal, &mut segments)?;
                    i = next;
                }
                '[' => {
                    let (random, next) = read_random_number(pattern, &chars, i + 1)?;
                    push_placeholder(pattern, offset, random, &mut literal, &mut segments)?;
                    i = next;
                }
                c if c.is_control() || RESERVED.contains(&c) => {
                    return Err(Error::malformed_pattern(
                        pattern,
                        format!("invalid character {c:?} (offset {offset})"),
                    ));
                }
                c => {
                    literal.push(c);
                    i += 1;
                }
            }
        }
        if literal.len() > 1 && literal.ends_with('/') {
            literal.pop();
        }
        flush(&mut literal, &mut segments);
        Ok(Self { segments })
    }

    /// Parse an input pattern (no group placeholders).
    pub fn input(pattern: &str) -> Result<Self> {
        Self::parse(pattern, false)
    }

    /// Parse an output pattern (group placeholders allowed).
    pub fn output(pattern: &str) -> Result<Self> {
        Self::parse(pattern, true)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether `candidate` is a path described by this pattern.
    ///
    /// Unresolved variables never match; resolve them first with
    /// [`PathPattern::resolve`].
    pub fn matches(&self, candidate: &str) -> bool {
        match_from(&self.segments, candidate.as_bytes())
    }

    /// True iff the final path segment ends with a wildcard, so the pattern
    /// denotes "every file generated under this location".
    pub fn is_prefix_pattern(&self) -> bool {
        matches!(
            self.segments.last(),
            Some(Segment::SingleWildcard | Segment::MultiWildcard)
        )
    }

    /// Substitute every placeholder with its value from `group_values`,
    /// keyed by [`Segment::placeholder_key`].
    ///
    /// Wildcards are written back verbatim, so the result still names the
    /// location prefix an output group writes under.
    ///
    /// # Errors
    /// `UnresolvedPlaceholder` if a key is absent from `group_values`, if a
    /// value is empty or holds `/` or a control character, or if values make
    /// a path component `.` or `..`; `UndefinedVariable` if the pattern still
    /// holds variables.
    pub fn render(&self, group_values: &BTreeMap<String, String>) -> Result<String> {
        Ok(self.bind(group_values)?.to_string())
    }

    /// Like [`PathPattern::render`], but keeps the result as a pattern whose
    /// placeholders became literals.
    pub fn bind(&self, group_values: &BTreeMap<String, String>) -> Result<Self> {
        let mut segments = Vec::with_capacity(self.segments.len());
        let mut literal = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(l) => literal.push_str(l),
                Segment::Variable(name) => {
                    return Err(Error::new(
                        ErrorKind::UndefinedVariable,
                        format!("variable \"{name}\" was not resolved in \"{self}\""),
                    ));
                }
                Segment::SingleWildcard | Segment::MultiWildcard => {
                    flush(&mut literal, &mut segments);
                    segments.push(segment.clone());
                }
                placeholder => {
                    let key = placeholder.placeholder_key().unwrap_or_default();
                    let value = group_values.get(&key).ok_or_else(|| {
                        Error::new(
                            ErrorKind::UnresolvedPlaceholder,
                            format!("no value for placeholder \"{key}\" in \"{self}\""),
                        )
                    })?;
                    if value.is_empty() || value.contains('/') || value.contains(char::is_control) {
                        return Err(Error::new(
                            ErrorKind::UnresolvedPlaceholder,
                            format!("value {value:?} cannot be used for placeholder \"{key}\""),
                        ));
                    }
                    literal.push_str(value);
                }
            }
        }
        flush(&mut literal, &mut segments);
        let bound = Self { segments };
        self.reject_relative_components(&bound)?;
        Ok(bound)
    }

    /// Placeholder values must not turn a path component into `.` or `..`,
    /// which would move the location out of the directory it was declared in.
    fn reject_relative_components(&self, bound: &Self) -> Result<()> {
        let template = self.to_string();
        let rendered = bound.to_string();
        for (declared, actual) in template.split('/').zip(rendered.split('/')) {
            if matches!(actual, "." | "..") && declared != actual {
                return Err(Error::new(
                    ErrorKind::UnresolvedPlaceholder,
                    format!("placeholder values turn \"{declared}\" into the relative component \"{actual}\""),
                ));
            }
        }
        Ok(())
    }

    /// Replace every variable with its value from `variables`.
    pub fn resolve(&self, variables: &VariableResolver) -> Result<Self> {
        let mut segments = Vec::with_capacity(self.segments.len());
        let mut literal = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(l) => literal.push_str(l),
                Segment::Variable(name) => match variables.get(name) {
                    Some(v) => literal.push_str(v),
                    None => {
                        return Err(Error::new(
                            ErrorKind::UndefinedVariable,
                            format!("variable \"{name}\" is not defined (pattern \"{self}\")"),
                        ));
                    }
                },
                other => {
                    flush(&mut literal, &mut segments);
                    segments.push(other.clone());
                }
            }
        }
        flush(&mut literal, &mut segments);
        Ok(Self { segments })
    }

    /// Field names read by placeholders, without duplicates.
    pub fn group_fields(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.segments
            .iter()
            .filter_map(Segment::field)
            .filter(|f| seen.insert(*f))
            .collect()
    }

    /// Names of all variables still present, without duplicates.
    pub fn variables(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Variable(v) if seen.insert(v.as_str()) => Some(v.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn has_group_placeholders(&self) -> bool {
        self.segments.iter().any(Segment::is_placeholder)
    }

    pub fn has_random_numbers(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::RandomNumber { .. }))
    }

    /// Whether the pattern is plain literal text.
    pub fn is_literal(&self) -> bool {
        self.segments.iter().all(Segment::is_literal)
    }

    /// The deepest directory that contains every path the pattern can match.
    ///
    /// For a fully literal pattern this is the path itself. Returns `""` when
    /// the pattern starts with a non-literal element.
    pub fn base_path(&self) -> String {
        let Some(Segment::Literal(head)) = self.segments.first() else {
            return String::new();
        };
        if self.segments.len() == 1 {
            return head.clone();
        }
        match head.rfind('/') {
            Some(0) => "/".to_string(),
            Some(pos) => head[..pos].to_string(),
            None => String::new(),
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(l) => f.write_str(l)?,
                Segment::SingleWildcard => f.write_str("*")?,
                Segment::MultiWildcard => f.write_str("**")?,
                Segment::Variable(v) => write!(f, "${{{v}}}")?,
                Segment::GroupPlaceholder(g) => write!(f, "{{{g}}}")?,
                Segment::FormattedPlaceholder { field, format } => {
                    write!(f, "{{{field}:{format}}}")?;
                }
                Segment::RandomNumber { lower, upper } => write!(f, "[{lower}..{upper}]")?,
            }
        }
        Ok(())
    }
}

fn flush(literal: &mut String, segments: &mut Vec<Segment>) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(literal)));
    }
}

/// Push a placeholder unless it directly follows another one.
fn push_placeholder(
    pattern: &str,
    offset: usize,
    placeholder: Segment,
    literal: &mut String,
    segments: &mut Vec<Segment>,
) -> Result<()> {
    if literal.is_empty() && segments.last().is_some_and(Segment::is_placeholder) {
        return Err(Error::malformed_pattern(
            pattern,
            format!("placeholders must be separated by literal text (offset {offset})"),
        ));
    }
    flush(literal, segments);
    segments.push(placeholder);
    Ok(())
}

/// Read up to the closing `close` from `start`, stopping early at `stop`.
/// Returns the text, the delimiter found and the index after it.
fn read_until(
    pattern: &str,
    chars: &[(usize, char)],
    start: usize,
    close: char,
    stop: Option<char>,
    what: &str,
) -> Result<(String, char, usize)> {
    let mut text = String::new();
    let mut i = start;
    loop {
        let Some(&(_, c)) = chars.get(i) else {
            return Err(Error::malformed_pattern(pattern, format!("unterminated {what}")));
        };
        if c == close || Some(c) == stop {
            return Ok((text, c, i + 1));
        }
        text.push(c);
        i += 1;
    }
}

fn check_name(pattern: &str, name: &str, what: &str, valid: fn(char) -> bool) -> Result<()> {
    if name.is_empty() {
        return Err(Error::malformed_pattern(pattern, format!("empty {what} name")));
    }
    if let Some(c) = name.chars().find(|&c| !valid(c)) {
        return Err(Error::malformed_pattern(
            pattern,
            format!("invalid character {c:?} in {what} name \"{name}\""),
        ));
    }
    Ok(())
}

/// `name}` after `${`.
fn read_variable(pattern: &str, chars: &[(usize, char)], start: usize) -> Result<(String, usize)> {
    let (name, _, next) = read_until(pattern, chars, start, '}', None, "variable")?;
    check_name(pattern, &name, "variable", is_variable_name_char)?;
    Ok((name, next))
}

/// `field}` or `field:format}` after `{`.
fn read_placeholder(
    pattern: &str,
    chars: &[(usize, char)],
    start: usize,
) -> Result<(Segment, usize)> {
    let (field, delimiter, next) =
        read_until(pattern, chars, start, '}', Some(':'), "placeholder")?;
    check_name(pattern, &field, "placeholder", is_field_char)?;
    if delimiter == '}' {
        return Ok((Segment::GroupPlaceholder(field), next));
    }
    let (format, _, next) = read_until(pattern, chars, next, '}', None, "placeholder")?;
    if format.is_empty() || format.contains(|c: char| c == '/' || c == '{' || c.is_control()) {
        return Err(Error::malformed_pattern(
            pattern,
            format!("invalid format argument {format:?} for placeholder {{{field}}}"),
        ));
    }
    Ok((Segment::FormattedPlaceholder { field, format }, next))
}

/// `lower..upper]` after `[`.
fn read_random_number(
    pattern: &str,
    chars: &[(usize, char)],
    start: usize,
) -> Result<(Segment, usize)> {
    let (range, _, next) = read_until(pattern, chars, start, ']', None, "random number")?;
    let invalid = || {
        Error::malformed_pattern(
            pattern,
            format!("random number must be \"[lower..upper]\" with lower < upper, got [{range}]"),
        )
    };
    let captures = RANDOM_RANGE.captures(&range).ok_or_else(invalid)?;
    let lower: u32 = captures[1].parse().map_err(|_| invalid())?;
    let upper: u32 = captures[2].parse().map_err(|_| invalid())?;
    if lower >= upper {
        return Err(invalid());
    }
    Ok((Segment::RandomNumber { lower, upper }, next))
}

fn match_from(segments: &[Segment], cand: &[u8]) -> bool {
    let Some((head, tail)) = segments.split_first() else {
        return cand.is_empty();
    };
    match head {
        Segment::Literal(l) => {
            let l = l.as_bytes();
            if cand.starts_with(l) {
                return match_from(tail, &cand[l.len()..]);
            }
            // `dir/**` also matches `dir` itself.
            matches!(tail, [Segment::MultiWildcard])
                && l.len() > 1
                && l.ends_with(b"/")
                && cand == &l[..l.len() - 1]
        }
        Segment::SingleWildcard
        | Segment::GroupPlaceholder(_)
        | Segment::FormattedPlaceholder { .. }
        | Segment::RandomNumber { .. } => {
            let limit = cand.iter().position(|&b| b == b'/').unwrap_or(cand.len());
            (1..=limit).any(|end| match_from(tail, &cand[end..]))
        }
        Segment::MultiWildcard => true,
        Segment::Variable(_) => false,
    }
}
