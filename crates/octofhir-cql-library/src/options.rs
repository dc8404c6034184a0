//! Translator (CQL-to-ELM compiler) options

use crate::error::{LibraryError, LibraryResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A single named compiler flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TranslatorOption {
    EnableDateRangeOptimization,
    EnableAnnotations,
    EnableLocators,
    EnableResultTypes,
    EnableDetailedErrors,
    DisableListTraversal,
    DisableListDemotion,
    DisableListPromotion,
    EnableIntervalDemotion,
    EnableIntervalPromotion,
    DisableMethodInvocation,
    RequireFromKeyword,
    DisableDefaultModelInfoLoad,
}

impl TranslatorOption {
    pub const ALL: [TranslatorOption; 13] = [
        Self::EnableDateRangeOptimization,
        Self::EnableAnnotations,
        Self::EnableLocators,
        Self::EnableResultTypes,
        Self::EnableDetailedErrors,
        Self::DisableListTraversal,
        Self::DisableListDemotion,
        Self::DisableListPromotion,
        Self::EnableIntervalDemotion,
        Self::EnableIntervalPromotion,
        Self::DisableMethodInvocation,
        Self::RequireFromKeyword,
        Self::DisableDefaultModelInfoLoad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnableDateRangeOptimization => "EnableDateRangeOptimization",
            Self::EnableAnnotations => "EnableAnnotations",
            Self::EnableLocators => "EnableLocators",
            Self::EnableResultTypes => "EnableResultTypes",
            Self::EnableDetailedErrors => "EnableDetailedErrors",
            Self::DisableListTraversal => "DisableListTraversal",
            Self::DisableListDemotion => "DisableListDemotion",
            Self::DisableListPromotion => "DisableListPromotion",
            Self::EnableIntervalDemotion => "EnableIntervalDemotion",
            Self::EnableIntervalPromotion => "EnableIntervalPromotion",
            Self::DisableMethodInvocation => "DisableMethodInvocation",
            Self::RequireFromKeyword => "RequireFromKeyword",
            Self::DisableDefaultModelInfoLoad => "DisableDefaultModelInfoLoad",
        }
    }
}

impl fmt::Display for TranslatorOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TranslatorOption {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|option| option.as_str() == s)
            .ok_or_else(|| LibraryError::InvalidOption(s.to_string()))
    }
}

/// The set of options a library was (or should be) compiled with.
///
/// This set is the fingerprint recorded inside compiled libraries, so equality
/// is plain set equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranslatorOptions {
    options: BTreeSet<TranslatorOption>,
}

impl TranslatorOptions {
    pub fn new(options: impl IntoIterator<Item = TranslatorOption>) -> Self {
        Self {
            options: options.into_iter().collect(),
        }
    }

    /// Options the compiler applies when nothing else is configured.
    pub fn default_options() -> Self {
        Self::new([
            TranslatorOption::EnableAnnotations,
            TranslatorOption::EnableLocators,
            TranslatorOption::DisableListDemotion,
            TranslatorOption::DisableListPromotion,
        ])
    }

    /// Parse a comma delimited list such as `EnableAnnotations, EnableLocators`.
    pub fn parse(value: &str) -> LibraryResult<Self> {
        value
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(TranslatorOption::from_str)
            .collect::<LibraryResult<BTreeSet<_>>>()
            .map(|options| Self { options })
    }

    /// Parse a list of option names, as found in configuration files.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> LibraryResult<Self> {
        names
            .iter()
            .map(|name| TranslatorOption::from_str(name.as_ref().trim()))
            .collect::<LibraryResult<BTreeSet<_>>>()
            .map(|options| Self { options })
    }

    pub fn contains(&self, option: TranslatorOption) -> bool {
        self.options.contains(&option)
    }

    pub fn with(mut self, option: TranslatorOption) -> Self {
        self.options.insert(option);
        self
    }

    pub fn without(mut self, option: TranslatorOption) -> Self {
        self.options.remove(&option);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = TranslatorOption> + '_ {
        self.options.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

impl fmt::Display for TranslatorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for option in &self.options {
            if !first {
                f.write_str(",")?;
            }
            f.write_str(option.as_str())?;
            first = false;
        }
        Ok(())
    }
}

impl FromIterator<TranslatorOption> for TranslatorOptions {
    fn from_iter<T: IntoIterator<Item = TranslatorOption>>(iter: T) -> Self {
        Self::new(iter)
    }
}
