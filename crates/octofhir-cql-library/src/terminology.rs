//! Terminology access with cached value set expansions

use crate::cache::{CacheStats, SingleFlightCache};
use crate::error::{LibraryError, LibraryResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A coded value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Code {
    pub code: String,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
}

impl Code {
    pub fn new(code: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            system: Some(system.into()),
            version: None,
            display: None,
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }
}

/// Reference to a value set. Only `id` identifies cached expansions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueSetInfo {
    pub id: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub code_systems: Vec<CodeSystemInfo>,
}

impl ValueSetInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: None,
            code_systems: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSystemInfo {
    pub id: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Upstream terminology source.
#[async_trait]
pub trait TerminologyProvider: Send + Sync {
    /// Codes of the value set; `None` when the source cannot expand it.
    async fn expand(&self, value_set: &ValueSetInfo) -> LibraryResult<Option<Vec<Code>>>;

    async fn lookup(&self, code: &Code, code_system: &CodeSystemInfo) -> LibraryResult<Option<Code>>;

    /// Equivalence rule used for membership tests. Matches code and system.
    fn equivalent(&self, left: &Code, right: &Code) -> bool {
        left.code == right.code && left.system == right.system
    }

    async fn in_value_set(&self, code: &Code, value_set: &ValueSetInfo) -> LibraryResult<bool> {
        Ok(self
            .expand(value_set)
            .await?
            .is_some_and(|codes| codes.iter().any(|candidate| self.equivalent(code, candidate))))
    }
}

/// Expansions by bare value set id.
pub type TerminologyCache = SingleFlightCache<String, Arc<Vec<Code>>>;

/// Caches expansions of the wrapped provider; lookups pass through.
pub struct CacheAwareTerminologyProvider {
    inner: Arc<dyn TerminologyProvider>,
    cache: Arc<TerminologyCache>,
}

impl CacheAwareTerminologyProvider {
    pub fn new(inner: Arc<dyn TerminologyProvider>, cache: Arc<TerminologyCache>) -> Self {
        Self { inner, cache }
    }

    /// Expansion through the cache. A `None` expansion is not stored.
    pub async fn expand_cached(&self, value_set: &ValueSetInfo) -> LibraryResult<Option<Arc<Vec<Code>>>> {
        if value_set.id.trim().is_empty() {
            return Err(LibraryError::terminology("value set reference has no id"));
        }

        let result = self
            .cache
            .get_or_try_insert_with(
                &value_set.id,
                |_| true,
                || async {
                    tracing::debug!(value_set = %value_set.id, "Expanding value set");
                    match self.inner.expand(value_set).await? {
                        Some(codes) => Ok(Arc::new(codes)),
                        None => Err(ExpandOutcome::Unavailable),
                    }
                },
            )
            .await;

        match result {
            Ok(codes) => Ok(Some(codes)),
            Err(ExpandOutcome::Unavailable) => Ok(None),
            Err(ExpandOutcome::Failed(e)) => Err(e),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

enum ExpandOutcome {
    Unavailable,
    Failed(LibraryError),
}

impl From<LibraryError> for ExpandOutcome {
    fn from(e: LibraryError) -> Self {
        Self::Failed(e)
    }
}

#[async_trait]
impl TerminologyProvider for CacheAwareTerminologyProvider {
    async fn expand(&self, value_set: &ValueSetInfo) -> LibraryResult<Option<Vec<Code>>> {
        Ok(self
            .expand_cached(value_set)
            .await?
            .map(|codes| codes.as_ref().clone()))
    }

    async fn lookup(&self, code: &Code, code_system: &CodeSystemInfo) -> LibraryResult<Option<Code>> {
        self.inner.lookup(code, code_system).await
    }

    fn equivalent(&self, left: &Code, right: &Code) -> bool {
        self.inner.equivalent(left, right)
    }

    async fn in_value_set(&self, code: &Code, value_set: &ValueSetInfo) -> LibraryResult<bool> {
        let Some(codes) = self.expand_cached(value_set).await? else {
            return Ok(false);
        };
        Ok(codes.iter().any(|candidate| self.inner.equivalent(code, candidate)))
    }
}
