//! Compiler diagnostics reported while translating CQL

use crate::identifier::VersionedIdentifier;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Source range a diagnostic points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locator {
    #[serde(default)]
    pub library: Option<VersionedIdentifier>,
    pub start_line: u32,
    pub start_char: u32,
    pub end_line: u32,
    pub end_char: u32,
}

/// A message produced by the compiler for one library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CqlDiagnostic {
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub locator: Option<Locator>,
}

impl CqlDiagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            locator: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            locator: None,
        }
    }

    pub fn with_locator(mut self, locator: Locator) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for CqlDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.locator {
            None => write!(f, "[n/a]{}", self.message),
            Some(locator) => {
                if let Some(library) = &locator.library {
                    write!(f, "{library}")?;
                }
                write!(
                    f,
                    "[{}:{}, {}:{}]{}",
                    locator.start_line,
                    locator.start_char,
                    locator.end_line,
                    locator.end_char,
                    self.message
                )
            }
        }
    }
}

/// Render diagnostics as a bracketed, comma separated list.
pub fn errors_to_string<'a>(diagnostics: impl IntoIterator<Item = &'a CqlDiagnostic>) -> String {
    let rendered: Vec<String> = diagnostics.into_iter().map(ToString::to_string).collect();
    format!("[{}]", rendered.join(", "))
}
