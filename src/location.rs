//! Resolved locations and their segment-wise containment relation.
//!
//! A [`Location`] wraps a path or path pattern and derives the directory path
//! that everything it can denote lives under (its *containment path*).
//! Containment is decided by comparing whole path segments, never raw string
//! prefixes: `a` is not an ancestor of `aa`.
//!
//! | Location              | Containment path   |
//! |-----------------------|--------------------|
//! | `input/input.txt`     | `input/input.txt`  |
//! | `conflict/a-*`        | `conflict/a`       |
//! | `path/conflict/-*`    | `path/conflict`    |
//! | `sales/{region}/p-*`  | `sales`            |
//! | `logs/**`             | `logs`             |

use crate::error::Result;
use crate::pattern::{PathPattern, Segment};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// How two locations relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Same,
    Ancestor,
    Descendant,
    Disjoint,
}

#[derive(Debug, Clone)]
pub struct Location {
    text: String,
    pattern: PathPattern,
    absolute: bool,
    path_segments: Vec<Vec<Segment>>,
    containment: Vec<String>,
}

impl Location {
    /// Parse `path` as an output-style pattern and derive its containment.
    pub fn parse(path: &str) -> Result<Self> {
        Ok(Self::from_pattern(&PathPattern::output(path)?))
    }

    pub fn from_pattern(pattern: &PathPattern) -> Self {
        let (absolute, path_segments) = split_path_segments(pattern);
        let containment = containment_of(&path_segments);
        Self {
            text: pattern.to_string(),
            pattern: pattern.clone(),
            absolute,
            path_segments,
            containment,
        }
    }

    pub fn path(&self) -> &str {
        &self.text
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Whether this location names a set of generated files.
    pub fn is_prefix(&self) -> bool {
        self.pattern.is_prefix_pattern()
    }

    /// Path segments of the pattern; a `**` is a segment of its own.
    pub fn path_segments(&self) -> &[Vec<Segment>] {
        &self.path_segments
    }

    pub fn containment_path(&self) -> &[String] {
        &self.containment
    }

    /// Containment path as a `/`-joined string.
    pub fn containment_string(&self) -> String {
        let joined = self.containment.join("/");
        if self.absolute {
            format!("/{joined}")
        } else {
            joined
        }
    }

    /// Parent of the containment path, or `None` at the root.
    pub fn parent_path(&self) -> Option<&[String]> {
        self.containment
            .split_last()
            .map(|(_, parent)| parent)
    }

    pub fn relation(&self, other: &Self) -> Relation {
        if self.absolute != other.absolute {
            return Relation::Disjoint;
        }
        let (a, b) = (&self.containment, &other.containment);
        if a == b {
            Relation::Same
        } else if b.starts_with(a) {
            Relation::Ancestor
        } else if a.starts_with(b) {
            Relation::Descendant
        } else {
            Relation::Disjoint
        }
    }

    /// True if `other` lives at or below this location.
    pub fn contains(&self, other: &Self) -> bool {
        matches!(self.relation(other), Relation::Same | Relation::Ancestor)
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Location {}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text.cmp(&other.text)
    }
}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn split_path_segments(pattern: &PathPattern) -> (bool, Vec<Vec<Segment>>) {
    let mut absolute = false;
    let mut out: Vec<Vec<Segment>> = vec![Vec::new()];
    for (i, segment) in pattern.segments().iter().enumerate() {
        match segment {
            Segment::Literal(l) => {
                let mut text = l.as_str();
                if i == 0
                    && let Some(rest) = text.strip_prefix('/')
                {
                    absolute = true;
                    text = rest;
                }
                let mut parts = text.split('/');
                if let Some(head) = parts.next()
                    && !head.is_empty()
                    && let Some(current) = out.last_mut()
                {
                    current.push(Segment::Literal(head.to_string()));
                }
                for part in parts {
                    let mut next = Vec::new();
                    if !part.is_empty() {
                        next.push(Segment::Literal(part.to_string()));
                    }
                    out.push(next);
                }
            }
            other => {
                if let Some(current) = out.last_mut() {
                    current.push(other.clone());
                }
            }
        }
    }
    out.retain(|s| !s.is_empty());
    (absolute, out)
}

fn containment_of(path_segments: &[Vec<Segment>]) -> Vec<String> {
    let mut out = Vec::new();
    let last = path_segments.len().saturating_sub(1);
    for (i, elements) in path_segments.iter().enumerate() {
        match elements.as_slice() {
            [Segment::Literal(name)] => out.push(name.clone()),
            [Segment::Literal(name), Segment::SingleWildcard] if i == last => {
                let name = name.strip_suffix('-').unwrap_or(name);
                if !name.is_empty() {
                    out.push(name.to_string());
                }
                break;
            }
            _ => break,
        }
    }
    out
}
