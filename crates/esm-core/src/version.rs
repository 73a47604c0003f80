//! Ordering of dot-delimited numeric version tags (`1`, `1.0.3`, `2.10`).
//!
//! Components compare as integers, left to right. When one tag runs out of
//! components while the other still has some, the *shorter* tag sorts after
//! the longer one, so `"1"` is greater than `"1.0"`. Existing ledgers were
//! ordered this way, and changing it would reorder histories that mix tag
//! lengths.

use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;
use thiserror::Error;

static VERSION_RE: OnceLock<Regex> = OnceLock::new();

fn version_re() -> &'static Regex {
    VERSION_RE.get_or_init(|| Regex::new(r"^[0-9]+(\.[0-9]+)*$").unwrap())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version '{0}': must be dot-separated numbers like 1.0.0")]
pub struct VersionFormatError(pub String);

pub fn is_valid(version: &str) -> bool {
    version_re().is_match(version)
}

pub fn validate(version: &str) -> Result<(), VersionFormatError> {
    if is_valid(version) {
        Ok(())
    } else {
        Err(VersionFormatError(version.to_string()))
    }
}

/// Compare two version tags. Fails if either is malformed.
pub fn compare(a: &str, b: &str) -> Result<Ordering, VersionFormatError> {
    validate(a)?;
    validate(b)?;
    Ok(compare_unchecked(a, b))
}

/// Sort `items` ascending by the version tag `key` returns.
///
/// Every key is validated before anything moves, so on error the slice is
/// left untouched.
pub fn sort_by_version<T, F>(items: &mut [T], key: F) -> Result<(), VersionFormatError>
where
    F: Fn(&T) -> &str,
{
    for item in items.iter() {
        validate(key(item))?;
    }
    items.sort_by(|x, y| compare_unchecked(key(x), key(y)));
    Ok(())
}

fn compare_unchecked(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            // exhausted side wins
            (None, Some(_)) => return Ordering::Greater,
            (Some(_), None) => return Ordering::Less,
            (Some(x), Some(y)) => match compare_numeric(x, y) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}

/// Integer comparison of two digit strings of any length.
fn compare_numeric(x: &str, y: &str) -> Ordering {
    let x = x.trim_start_matches('0');
    let y = y.trim_start_matches('0');
    x.len().cmp(&y.len()).then_with(|| x.cmp(y))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
