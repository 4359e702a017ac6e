//! Data-source profile: fragment sizing configuration.
//!
//! A profile can be built in code, deserialized from JSON, or read from a
//! flat `key=value` property map (`fragment.min`, `fragment.pref`,
//! `block.split`, `block.combine`).
//!
//! ```
//! use directio::profile::DataSourceProfile;
//!
//! let p: DataSourceProfile = serde_json::from_str(r#"{"minimum_fragment_size": 1024}"#)?;
//! assert_eq!(p.minimum_fragment_size, 1024);
//! assert_eq!(p.preferred_fragment_size, 64 * 1024 * 1024);
//! # Ok::<(), serde_json::Error>(())
//! ```

use crate::format::DataFormat;
use crate::fragment::BlockPolicy;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const DEFAULT_MINIMUM_FRAGMENT_SIZE: i64 = 16 * 1024 * 1024;
pub const DEFAULT_PREFERRED_FRAGMENT_SIZE: i64 = 64 * 1024 * 1024;

pub const KEY_MINIMUM_FRAGMENT: &str = "fragment.min";
pub const KEY_PREFERRED_FRAGMENT: &str = "fragment.pref";
pub const KEY_SPLIT_BLOCKS: &str = "block.split";
pub const KEY_COMBINE_BLOCKS: &str = "block.combine";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSourceProfile {
    /// `<= 0` disables fragmentation for every format.
    pub minimum_fragment_size: i64,
    pub preferred_fragment_size: i64,
    /// Cut storage blocks longer than the preferred size.
    pub split_blocks: bool,
    /// Merge adjacent small storage blocks up to the preferred size.
    pub combine_blocks: bool,
}

impl Default for DataSourceProfile {
    fn default() -> Self {
        Self {
            minimum_fragment_size: DEFAULT_MINIMUM_FRAGMENT_SIZE,
            preferred_fragment_size: DEFAULT_PREFERRED_FRAGMENT_SIZE,
            split_blocks: true,
            combine_blocks: true,
        }
    }
}

impl DataSourceProfile {
    /// Read a profile from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse profile {}", path.display()))
    }

    /// Build a profile from properties; absent keys keep their defaults.
    ///
    /// # Errors
    /// Returns an error if a present size is not an integer or a present
    /// block flag is not `true` or `false`.
    pub fn from_properties<S: std::hash::BuildHasher>(
        props: &HashMap<String, String, S>,
    ) -> Result<Self> {
        let mut profile = Self::default();
        if let Some(v) = props.get(KEY_MINIMUM_FRAGMENT) {
            profile.minimum_fragment_size = parse_size(KEY_MINIMUM_FRAGMENT, v)?;
        }
        if let Some(v) = props.get(KEY_PREFERRED_FRAGMENT) {
            profile.preferred_fragment_size = parse_size(KEY_PREFERRED_FRAGMENT, v)?.max(1);
        }
        if let Some(v) = props.get(KEY_SPLIT_BLOCKS) {
            profile.split_blocks = parse_flag(KEY_SPLIT_BLOCKS, v)?;
        }
        if let Some(v) = props.get(KEY_COMBINE_BLOCKS) {
            profile.combine_blocks = parse_flag(KEY_COMBINE_BLOCKS, v)?;
        }
        Ok(profile)
    }

    pub fn block_policy(&self) -> BlockPolicy {
        BlockPolicy {
            split: self.split_blocks,
            combine: self.combine_blocks,
        }
    }

    /// Effective minimum fragment size for `format`, or `-1` when the
    /// format must not be split.
    pub fn minimum_fragment_size_for(&self, format: &dyn DataFormat) -> i64 {
        let min = format.minimum_fragment_bytes().min(self.minimum_fragment_size);
        if min <= 0 { -1 } else { min }
    }

    /// Effective preferred fragment size for `format`, never below the
    /// minimum; `-1` when the format must not be split.
    pub fn preferred_fragment_size_for(&self, format: &dyn DataFormat) -> i64 {
        let min = self.minimum_fragment_size_for(format);
        if min <= 0 {
            return -1;
        }
        let pref = format.preferred_fragment_bytes();
        if pref > 0 {
            pref.max(min)
        } else {
            self.preferred_fragment_size.max(min)
        }
    }
}

fn parse_size(key: &str, value: &str) -> Result<i64> {
    let value = value.trim();
    match value.parse::<i64>() {
        Ok(n) => Ok(n),
        Err(_) => bail!("invalid value for {key}: {value:?} (expected an integer byte count)"),
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        bail!("invalid value for {key}: {value:?} (expected true or false)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{ColumnarFormat, TextFormat, WholeFileFormat};

    #[test]
    fn text_formats_follow_profile() {
        let p = DataSourceProfile::default();
        let csv = TextFormat::new("csv");
        assert_eq!(p.minimum_fragment_size_for(&csv), DEFAULT_MINIMUM_FRAGMENT_SIZE);
        assert_eq!(p.preferred_fragment_size_for(&csv), DEFAULT_PREFERRED_FRAGMENT_SIZE);
    }

    #[test]
    fn format_preference_wins_but_not_below_minimum() {
        let p = DataSourceProfile {
            minimum_fragment_size: 1000,
            preferred_fragment_size: 5000,
            ..DataSourceProfile::default()
        };
        assert_eq!(p.preferred_fragment_size_for(&ColumnarFormat::new("orc", 200)), 1000);
        assert_eq!(p.preferred_fragment_size_for(&ColumnarFormat::new("orc", 9000)), 9000);
    }

    #[test]
    fn non_splittable_formats_disable_fragments() {
        let p = DataSourceProfile::default();
        assert_eq!(p.minimum_fragment_size_for(&WholeFileFormat), -1);
        assert_eq!(p.preferred_fragment_size_for(&WholeFileFormat), -1);
    }

    #[test]
    fn properties_override_defaults() {
        let mut props = HashMap::new();
        props.insert(KEY_MINIMUM_FRAGMENT.to_string(), " 10 ".to_string());
        let p = DataSourceProfile::from_properties(&props).unwrap();
        assert_eq!(p.minimum_fragment_size, 10);
        assert_eq!(p.preferred_fragment_size, DEFAULT_PREFERRED_FRAGMENT_SIZE);

        props.insert(KEY_PREFERRED_FRAGMENT.to_string(), "lots".to_string());
        assert!(DataSourceProfile::from_properties(&props).is_err());
    }

    #[test]
    fn block_flags_from_properties() {
        let mut props = HashMap::new();
        props.insert(KEY_COMBINE_BLOCKS.to_string(), "FALSE".to_string());
        let p = DataSourceProfile::from_properties(&props).unwrap();
        assert_eq!(
            p.block_policy(),
            BlockPolicy {
                split: true,
                combine: false
            }
        );

        props.insert(KEY_SPLIT_BLOCKS.to_string(), "yes".to_string());
        assert!(DataSourceProfile::from_properties(&props).is_err());
    }
}
