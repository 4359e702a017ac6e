//! Format arguments of `{field:format}` output placeholders.
//!
//! The argument depends on the field type:
//!
//! | Field type | Argument      | Example value | Rendered     |
//! |------------|---------------|---------------|--------------|
//! | `date`     | date pattern  | `19_723`      | `2024-01-01` |
//! | `datetime` | date pattern  | epoch millis  | `2024-01-01-09` |
//! | `int`      | `0000`        | `7`           | `0007`       |
//! | `float`    | `00.00`       | `3.5`         | `03.50`      |
//!
//! Date patterns use the letters `y M d D E H h m s S a`; text in single
//! quotes is copied as is (`''` is a quote). Date fields accept only the
//! date letters `y M d D E`.

use crate::error::{Error, ErrorKind, Result};
use crate::record::{FieldType, Record, Value};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

/// `NaiveDate::from_num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

static NUMBER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#*(0+)(?:\.(0+))?$").expect("number pattern regex is valid")
});

/// A compiled format argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderFormat {
    /// Epoch days rendered with a `strftime` pattern.
    Date(String),
    /// Epoch milliseconds (UTC) rendered with a `strftime` pattern.
    DateTime(String),
    /// Integer padded with zeros to `width` digits.
    Integer { width: usize },
    /// Float with `scale` fraction digits, padded to `width` integer digits.
    Decimal { width: usize, scale: usize },
}

impl PlaceholderFormat {
    /// Compile `argument` for a field of type `ty`.
    ///
    /// # Errors
    /// `ConfigurationError` if the type takes no argument or the argument
    /// is not valid for it.
    pub fn compile(ty: FieldType, argument: &str) -> Result<Self> {
        let invalid = |detail: String| {
            Error::new(
                ErrorKind::ConfigurationError,
                format!("invalid format argument \"{argument}\" for a {ty} field: {detail}"),
            )
        };
        match ty {
            FieldType::Date => Ok(Self::Date(strftime(argument, true).map_err(invalid)?)),
            FieldType::DateTime => Ok(Self::DateTime(strftime(argument, false).map_err(invalid)?)),
            FieldType::Int | FieldType::Float => {
                let captures = NUMBER_PATTERN
                    .captures(argument)
                    .ok_or_else(|| invalid("expected digits such as \"0000\" or \"0.00\"".into()))?;
                let width = captures[1].len();
                match (ty, captures.get(2)) {
                    (FieldType::Int, None) => Ok(Self::Integer { width }),
                    (FieldType::Int, Some(_)) => Err(invalid("integers have no fraction".into())),
                    (_, scale) => Ok(Self::Decimal {
                        width,
                        scale: scale.map_or(0, |m| m.as_str().len()),
                    }),
                }
            }
            FieldType::Boolean | FieldType::Text | FieldType::Bytes => {
                Err(invalid("this type takes no format argument".into()))
            }
        }
    }

    /// Render `field` of `record`.
    ///
    /// # Errors
    /// `UnresolvedPlaceholder` if the value is null, out of range, or not of
    /// the kind the format was compiled for.
    pub fn apply(&self, record: &Record, field: &str) -> Result<String> {
        let value = record.get(field);
        let unusable = |detail: &str| {
            Error::new(
                ErrorKind::UnresolvedPlaceholder,
                format!("field \"{field}\" value {value} cannot be formatted: {detail}"),
            )
        };
        match (self, value) {
            (_, Value::Null) => Err(unusable("value is null")),
            (Self::Date(pattern), Value::Int(days)) => {
                let date = i32::try_from(UNIX_EPOCH_DAYS_FROM_CE + days)
                    .ok()
                    .and_then(NaiveDate::from_num_days_from_ce_opt)
                    .ok_or_else(|| unusable("date out of range"))?;
                Ok(date.format(pattern).to_string())
            }
            (Self::DateTime(pattern), Value::Int(millis)) => {
                let at = DateTime::from_timestamp_millis(*millis)
                    .ok_or_else(|| unusable("timestamp out of range"))?;
                Ok(at.naive_utc().format(pattern).to_string())
            }
            (&Self::Integer { width }, Value::Int(n)) => Ok(format!("{n:0width$}")),
            (&Self::Decimal { width, scale }, Value::Float(x)) => {
                let total = width + scale + usize::from(scale > 0);
                Ok(format!("{:0total$.scale$}", x.0))
            }
            _ => Err(unusable("wrong value kind")),
        }
    }
}

/// Translate a date pattern into `strftime` syntax.
fn strftime(pattern: &str, date_only: bool) -> std::result::Result<String, String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            let Some(close) = chars[i + 1..].iter().position(|&q| q == '\'') else {
                return Err("unterminated quote".into());
            };
            for &q in &chars[i + 1..i + 1 + close] {
                push_literal(&mut out, q);
            }
            i += close + 2;
            continue;
        }
        if !c.is_ascii_alphabetic() {
            push_literal(&mut out, c);
            i += 1;
            continue;
        }
        let run = chars[i..].iter().take_while(|&&n| n == c).count();
        let spec = match (c, run) {
            ('y', 2) => "%y",
            ('y', _) => "%Y",
            ('M', 1) => "%-m",
            ('M', 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', 1) => "%-d",
            ('d', _) => "%d",
            ('D', _) => "%j",
            ('E', 1..=3) => "%a",
            ('E', _) => "%A",
            ('H', 1) if !date_only => "%-H",
            ('H', _) if !date_only => "%H",
            ('h', 1) if !date_only => "%-I",
            ('h', _) if !date_only => "%I",
            ('m', 1) if !date_only => "%-M",
            ('m', _) if !date_only => "%M",
            ('s', 1) if !date_only => "%-S",
            ('s', _) if !date_only => "%S",
            ('S', 3) if !date_only => "%3f",
            ('a', _) if !date_only => "%p",
            _ => return Err(format!("unsupported pattern letters \"{}\"", c.to_string().repeat(run))),
        };
        out.push_str(spec);
        i += run;
    }
    if StrftimeItems::new(&out).any(|item| matches!(item, Item::Error)) {
        return Err("pattern cannot be rendered".into());
    }
    Ok(out)
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_date_patterns() {
        assert_eq!(strftime("yyyy-MM-dd", true).unwrap(), "%Y-%m-%d");
        assert_eq!(strftime("yy'h'M", true).unwrap(), "%yh%-m");
        assert_eq!(strftime("HH:mm:ss.SSS", false).unwrap(), "%H:%M:%S.%3f");
        assert_eq!(strftime("100%", true).unwrap(), "100%%");
        assert!(strftime("HH", true).is_err());
        assert!(strftime("yyyy'x", true).is_err());
        assert!(strftime("QQ", false).is_err());
    }

    #[test]
    fn renders_dates_from_epoch_days() -> Result<()> {
        let format = PlaceholderFormat::compile(FieldType::Date, "yyyy-MM-dd")?;
        let record = Record::new().with("day", 19_723);
        assert_eq!(format.apply(&record, "day")?, "2024-01-01");
        Ok(())
    }

    #[test]
    fn numbers_are_padded() -> Result<()> {
        let int = PlaceholderFormat::compile(FieldType::Int, "0000")?;
        assert_eq!(int.apply(&Record::new().with("n", 7), "n")?, "0007");
        let float = PlaceholderFormat::compile(FieldType::Float, "00.00")?;
        assert_eq!(float.apply(&Record::new().with("x", 3.5), "x")?, "03.50");
        assert!(PlaceholderFormat::compile(FieldType::Int, "0.0").is_err());
        assert!(PlaceholderFormat::compile(FieldType::Text, "0").is_err());
        Ok(())
    }
}
