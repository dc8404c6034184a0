//! Two-tier model cache
//!
//! Compiled models are shared process-wide through a [`GlobalModelCache`]
//! keyed by exact identifier. Each compilation session owns a
//! [`ModelManager`] whose local tier binds every model name to a single
//! version for the lifetime of the session.

use crate::cache::SingleFlightCache;
use crate::error::{LibraryError, LibraryResult};
use crate::identifier::VersionedIdentifier;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the built-in system model.
pub const SYSTEM_MODEL: &str = "System";

/// Model metadata as published in a model info document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub target_qualifier: Option<String>,
    #[serde(default)]
    pub type_info: Vec<Value>,
}

impl ModelInfo {
    pub fn new(name: impl Into<String>, version: Option<&str>) -> Self {
        Self {
            name: name.into(),
            version: version.map(str::to_string),
            url: None,
            target_qualifier: None,
            type_info: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// The built-in `System` type model
    System,
    Standard,
}

/// A model ready for use by the compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledModel {
    pub info: ModelInfo,
    pub kind: ModelKind,
}

impl CompiledModel {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn version(&self) -> Option<&str> {
        self.info.version.as_deref()
    }

    pub fn is_system(&self) -> bool {
        self.kind == ModelKind::System
    }
}

/// Resolves model metadata for a model name and version.
#[async_trait]
pub trait ModelInfoProvider: Send + Sync {
    /// `Ok(None)` when the provider does not know the model.
    async fn load_model_info(&self, identifier: &VersionedIdentifier)
    -> LibraryResult<Option<ModelInfo>>;
}

/// Model infos registered up front (embedded system and FHIR model infos).
#[derive(Default)]
pub struct InMemoryModelInfoProvider {
    models: DashMap<(String, Option<String>), ModelInfo>,
}

impl InMemoryModelInfoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, info: ModelInfo) {
        self.models
            .insert((info.name.clone(), info.version.clone()), info);
    }

    pub fn with_model(self, info: ModelInfo) -> Self {
        self.insert(info);
        self
    }
}

#[async_trait]
impl ModelInfoProvider for InMemoryModelInfoProvider {
    async fn load_model_info(
        &self,
        identifier: &VersionedIdentifier,
    ) -> LibraryResult<Option<ModelInfo>> {
        let key = (identifier.id.clone(), identifier.version.clone());
        if let Some(info) = self.models.get(&key) {
            return Ok(Some(info.value().clone()));
        }
        // Unversioned requests take any registered version of the model
        if identifier.version.is_none() {
            return Ok(self
                .models
                .iter()
                .find(|entry| entry.key().0 == identifier.id)
                .map(|entry| entry.value().clone()));
        }
        Ok(None)
    }
}

/// Process-wide models by exact identifier. Never evicted.
pub type GlobalModelCache = SingleFlightCache<VersionedIdentifier, Arc<CompiledModel>>;

/// Per-session model resolution.
///
/// Not meant to be shared between concurrent compilations; wrap it in a lock
/// when a session is reachable from several tasks.
pub struct ModelManager {
    provider: Arc<dyn ModelInfoProvider>,
    global_cache: Arc<GlobalModelCache>,
    local_cache: HashMap<String, Arc<CompiledModel>>,
}

impl ModelManager {
    pub fn new(provider: Arc<dyn ModelInfoProvider>, global_cache: Arc<GlobalModelCache>) -> Self {
        Self {
            provider,
            global_cache,
            local_cache: HashMap::new(),
        }
    }

    /// Resolve the model for `identifier`, binding its name in this session.
    ///
    /// Once a name is bound, an unversioned request returns the bound model and
    /// a request for any other concrete version fails with `VersionConflict`.
    pub async fn resolve_model(
        &mut self,
        identifier: &VersionedIdentifier,
    ) -> LibraryResult<Arc<CompiledModel>> {
        if let Some(model) = self.local_cache.get(&identifier.id) {
            if let Some(requested) = identifier.version() {
                if model.version() != Some(requested) {
                    return Err(LibraryError::version_conflict(
                        &identifier.id,
                        requested,
                        model.version(),
                    ));
                }
            }
            return Ok(model.clone());
        }

        if self.global_cache.contains_key(identifier) {
            tracing::debug!(model = %identifier, "Model found in global cache");
        }

        let provider = self.provider.clone();
        let model = self
            .global_cache
            .get_or_try_insert_with(identifier, |_| true, || build_model(provider, identifier))
            .await?;

        self.local_cache.insert(identifier.id.clone(), model.clone());
        Ok(model)
    }

    /// Models bound in this session, by name.
    pub fn loaded_models(&self) -> &HashMap<String, Arc<CompiledModel>> {
        &self.local_cache
    }

    pub fn global_cache(&self) -> &Arc<GlobalModelCache> {
        &self.global_cache
    }
}

async fn build_model(
    provider: Arc<dyn ModelInfoProvider>,
    identifier: &VersionedIdentifier,
) -> LibraryResult<Arc<CompiledModel>> {
    tracing::debug!(model = %identifier, "Building model");

    let info = provider
        .load_model_info(identifier)
        .await?
        .ok_or_else(|| LibraryError::model_not_found(&identifier.id, identifier.version()))?;

    let kind = if identifier.id == SYSTEM_MODEL {
        ModelKind::System
    } else {
        ModelKind::Standard
    };

    Ok(Arc::new(CompiledModel { info, kind }))
}
