//! Versioned identifiers and canonical URL helpers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a CQL library or a model (namespace + name + optional version).
///
/// Equality and hashing cover all three parts exactly. An absent version is its
/// own key and never acts as a wildcard for a concrete version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionedIdentifier {
    /// Namespace URI of the library, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Library or model name
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl VersionedIdentifier {
    /// Create an identifier without a namespace.
    #[must_use]
    pub fn new(id: impl Into<String>, version: Option<&str>) -> Self {
        Self {
            system: None,
            id: id.into(),
            version: version.map(str::to_string),
        }
    }

    /// Set the namespace of the identifier.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl fmt::Display for VersionedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(system) = &self.system {
            write!(f, "{system}.")?;
        }
        match &self.version {
            Some(version) => write!(f, "{}-{}", self.id, version),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Logical id referenced by a canonical URL.
///
/// `http://example.org/fhir/Library/Common|1.0.0` yields `Common`.
pub fn canonical_id(canonical: &str) -> &str {
    let tail = match canonical.rfind('/') {
        Some(idx) => &canonical[idx + 1..],
        None => canonical,
    };
    tail.split('|').next().unwrap_or(tail)
}

/// Resource type segment of a canonical URL (`Library` for the example above).
///
/// Returns `None` when the canonical has no path separator.
pub fn canonical_resource_name(canonical: &str) -> Option<&str> {
    let idx = canonical.rfind('/')?;
    let head = &canonical[..idx];
    Some(match head.rfind('/') {
        Some(start) => &head[start + 1..],
        None => head,
    })
}

/// Splits `url|version` into its parts.
pub fn split_canonical(canonical: &str) -> (&str, Option<&str>) {
    match canonical.split_once('|') {
        Some((url, version)) if !version.is_empty() => (url, Some(version)),
        Some((url, _)) => (url, None),
        None => (canonical, None),
    }
}
