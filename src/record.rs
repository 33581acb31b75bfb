use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FormatError;

/// Maximal number of characters in the text part of a record
pub const MAX_TEXT_CHARS: usize = 1024;

/// Separates the numeric key from the text in a line
pub const DELIMITER: char = '.';

/// A single numbered line, `"<key>. <text>"`.
///
/// Records are ordered by text first, compared ignoring case, and then by key. Equality on the
/// other hand is exact, so two records may compare as [Ordering::Equal] without being equal, for
/// example `"1. Apple"` and `"1. apple"`.
///
/// # Examples
/// ```
/// use std::cmp::Ordering;
/// use heavy_file_sort::record::Record;
///
/// let banana = Record::parse("5. Banana").unwrap();
/// let lower = Record::parse("2. banana").unwrap();
/// assert_eq!(lower.compare(&banana), Ordering::Less);
/// assert_eq!(banana.to_string(), "5. Banana");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    key: i64,
    text: String,
}

impl Record {
    /// Create a record from its parts. The text is trimmed and validated the same way [Record::parse]
    /// validates it.
    pub fn new(key: i64, text: &str) -> Result<Record, FormatError> {
        let text = Self::validate_text(text.trim(), || format!("{key}{DELIMITER} {text}"))?;
        Ok(Record { key, text: text.to_string() })
    }

    /// Parse a line of the form `"<key>. <text>"`.
    ///
    /// The key may be surrounded by blanks and carry a sign. The text is everything after the
    /// first delimiter, trimmed, and must hold between 1 and [MAX_TEXT_CHARS] characters.
    pub fn parse(line: &str) -> Result<Record, FormatError> {
        let (key, text) = line
            .split_once(DELIMITER)
            .ok_or_else(|| FormatError::MissingDelimiter { line: line.to_string() })?;
        let key = i64::from_str(key.trim())
            .map_err(|_| FormatError::InvalidKey { line: line.to_string() })?;
        let text = Self::validate_text(text.trim(), || line.to_string())?;
        Ok(Record { key, text: text.to_string() })
    }

    fn validate_text<'a, F>(text: &'a str, line: F) -> Result<&'a str, FormatError>
    where
        F: Fn() -> String,
    {
        if text.is_empty() {
            return Err(FormatError::EmptyText { line: line() });
        }
        // byte length bounds the char count from above
        if text.len() > MAX_TEXT_CHARS {
            let length = text.chars().count();
            if length > MAX_TEXT_CHARS {
                return Err(FormatError::TextTooLong { line: line(), length, max: MAX_TEXT_CHARS });
            }
        }
        Ok(text)
    }

    pub fn key(&self) -> i64 {
        self.key
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Compare text ignoring case, then key ascending.
    pub fn compare(&self, other: &Record) -> Ordering {
        compare_text(&self.text, &other.text).then_with(|| self.key.cmp(&other.key))
    }
}

/// Ordinal comparison of upper-cased characters.
pub(crate) fn compare_text(a: &str, b: &str) -> Ordering {
    if a.is_ascii() && b.is_ascii() {
        a.bytes()
            .map(|c| c.to_ascii_uppercase())
            .cmp(b.bytes().map(|c| c.to_ascii_uppercase()))
    } else {
        a.chars().map(fold_case).cmp(b.chars().map(fold_case))
    }
}

/// Simple case mapping: a character whose upper case spans several characters, like 'ß' or 'ﬁ',
/// is kept as it is.
fn fold_case(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}

/// Text of a raw line without its terminator and a trailing '\r'.
pub(crate) fn line_text(line: &[u8], endl: u8) -> Result<&str, FormatError> {
    let line = line.strip_suffix(&[endl]).unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    std::str::from_utf8(line)
        .map_err(|_| FormatError::InvalidUtf8 { line: String::from_utf8_lossy(line).into_owned() })
}

impl Display for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{} {}", self.key, DELIMITER, self.text)
    }
}

impl FromStr for Record {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Record::parse(s)
    }
}
