//! Version ordering and candidate selection
//!
//! Versions are dot separated lists of non-negative integers. A missing
//! version sorts after every concrete one ("latest").

use crate::error::{LibraryError, LibraryResult};
use std::cmp::Ordering;

/// Compare two optional versions.
///
/// Shorter versions are padded with zeros, so `1.2` equals `1.2.0`.
pub fn compare_versions(left: Option<&str>, right: Option<&str>) -> LibraryResult<Ordering> {
    let (left, right) = match (left, right) {
        (None, None) => return Ok(Ordering::Equal),
        (Some(_), None) => return Ok(Ordering::Less),
        (None, Some(_)) => return Ok(Ordering::Greater),
        (Some(l), Some(r)) => (parse_segments(l)?, parse_segments(r)?),
    };

    let length = left.len().max(right.len());
    for i in 0..length {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return Ok(other),
        }
    }
    Ok(Ordering::Equal)
}

fn parse_segments(version: &str) -> LibraryResult<Vec<u64>> {
    version
        .split('.')
        .map(|segment| {
            segment
                .trim()
                .parse::<u64>()
                .map_err(|_| LibraryError::InvalidVersion(version.to_string()))
        })
        .collect()
}

/// Pick the best candidate among resources sharing one name.
///
/// With a requested version only an exact match is returned; the highest
/// version is still tracked but never substituted. Without a requested version
/// the highest version wins. An empty input yields `None`.
pub fn select_from_list<T, I, F>(
    candidates: I,
    requested: Option<&str>,
    version_of: F,
) -> LibraryResult<Option<T>>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> Option<&str>,
{
    let mut exact: Option<T> = None;
    let mut max: Option<T> = None;

    for candidate in candidates {
        let version = version_of(&candidate);
        let is_exact = exact.is_none() && requested.is_some() && version == requested;

        let is_new_max = match &max {
            None => true,
            Some(current) => compare_versions(version_of(current), version)? == Ordering::Less,
        };

        if is_exact {
            exact = Some(candidate);
        } else if is_new_max {
            max = Some(candidate);
        }
    }

    match requested {
        Some(version) => {
            if exact.is_none() {
                tracing::debug!(version, "No candidate matches the requested version");
            }
            Ok(exact)
        }
        None => Ok(max),
    }
}
