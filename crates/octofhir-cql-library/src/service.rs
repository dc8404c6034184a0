//! Library service
//!
//! Owns the process-wide caches and wires loaders and terminology providers
//! around them.

use crate::cache::{CacheStats, LibraryCache};
use crate::compiler::CqlCompiler;
use crate::config::{CqlLibraryConfig, loader};
use crate::content::{
    ContentResolutionChain, FhirLibraryContentProvider, InMemoryContentProvider, LibraryContentKind,
};
use crate::elm::CompiledLibrary;
use crate::error::{LibraryError, LibraryResult};
use crate::identifier::{VersionedIdentifier, canonical_id};
use crate::loader::{CacheAwareLibraryLoader, LibraryLoader, TranslatingLibraryLoader};
use crate::model_manager::{GlobalModelCache, ModelInfoProvider, ModelManager};
use crate::observability;
use crate::options::TranslatorOptions;
use crate::resource::{LibraryResolutionProvider, LibraryResource};
use crate::terminology::{CacheAwareTerminologyProvider, TerminologyCache, TerminologyProvider};
use serde_json::Value;
use std::sync::Arc;

/// Loader handed out by [`LibraryService::create_library_loader`].
pub type ServiceLibraryLoader = CacheAwareLibraryLoader<Arc<TranslatingLibraryLoader>>;

/// Sizes and hit counts of the shared caches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceCacheStats {
    pub models: CacheStats,
    pub libraries: CacheStats,
    pub terminology: CacheStats,
}

pub struct LibraryService {
    config: CqlLibraryConfig,
    translator_options: TranslatorOptions,
    model_info: Arc<dyn ModelInfoProvider>,
    /// Helper libraries (FHIRHelpers and the like) consulted after the store
    embedded: Arc<InMemoryContentProvider>,
    model_cache: Arc<GlobalModelCache>,
    library_cache: Arc<LibraryCache>,
    terminology_cache: Arc<TerminologyCache>,
}

impl LibraryService {
    pub fn new(config: CqlLibraryConfig, model_info: Arc<dyn ModelInfoProvider>) -> LibraryResult<Self> {
        config.validate()?;
        let translator_options = config.translator.translator_options()?;

        Ok(Self {
            config,
            translator_options,
            model_info,
            embedded: Arc::new(InMemoryContentProvider::new("embedded")),
            model_cache: Arc::new(GlobalModelCache::new()),
            library_cache: Arc::new(LibraryCache::new()),
            terminology_cache: Arc::new(TerminologyCache::new()),
        })
    }

    /// Build from a TOML file plus `OCTOFHIR_CQL__*` environment overrides and
    /// apply its logging level.
    pub fn from_config_file(path: Option<&str>, model_info: Arc<dyn ModelInfoProvider>) -> LibraryResult<Self> {
        let config = loader::load_config(path)?;
        observability::init_tracing(&config.logging);
        Self::new(config, model_info)
    }

    /// Register helper library content served when the store has none.
    pub fn with_embedded_library(
        self,
        identifier: VersionedIdentifier,
        kind: LibraryContentKind,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        self.embedded.insert(identifier, kind, content);
        self
    }

    pub fn embedded_content(&self) -> &Arc<InMemoryContentProvider> {
        &self.embedded
    }

    pub fn config(&self) -> &CqlLibraryConfig {
        &self.config
    }

    pub fn translator_options(&self) -> &TranslatorOptions {
        &self.translator_options
    }

    /// A cached loader reading library content from `Library` resources, then
    /// from the embedded helper libraries.
    ///
    /// Each loader gets its own model session; compiled models and libraries
    /// are shared with every other loader of this service.
    pub fn create_library_loader(
        &self,
        resolution_provider: Arc<dyn LibraryResolutionProvider>,
        compiler: Arc<dyn CqlCompiler>,
    ) -> ServiceLibraryLoader {
        let content = ContentResolutionChain::new()
            .with_provider(Arc::new(FhirLibraryContentProvider::new(
                resolution_provider,
                self.config.content.clone(),
            )))
            .with_provider(self.embedded.clone());
        self.create_library_loader_with_content(content, compiler)
    }

    /// Like [`create_library_loader`](Self::create_library_loader) over a
    /// caller assembled provider chain.
    pub fn create_library_loader_with_content(
        &self,
        content: ContentResolutionChain,
        compiler: Arc<dyn CqlCompiler>,
    ) -> ServiceLibraryLoader {
        let models = ModelManager::new(self.model_info.clone(), self.model_cache.clone());
        let translating =
            TranslatingLibraryLoader::new(compiler, content, models, self.translator_options.clone());
        CacheAwareLibraryLoader::new(Arc::new(translating), self.library_cache.clone())
    }

    pub fn create_terminology_provider(
        &self,
        inner: Arc<dyn TerminologyProvider>,
    ) -> CacheAwareTerminologyProvider {
        CacheAwareTerminologyProvider::new(inner, self.terminology_cache.clone())
    }

    /// Load the library described by the `Library` resource with this id.
    pub async fn resolve_library_by_id(
        &self,
        loader: &dyn LibraryLoader,
        repository: &dyn LibraryResolutionProvider,
        id: &str,
    ) -> LibraryResult<Arc<CompiledLibrary>> {
        let resource = repository
            .resolve_library_by_id(id)
            .await?
            .ok_or_else(|| LibraryError::not_found(format!("Library/{id}")))?;
        load_resource(loader, &resource, || format!("Library/{id}")).await
    }

    /// Load the first library referenced by a PlanDefinition.
    pub async fn resolve_primary_library(
        &self,
        loader: &dyn LibraryLoader,
        repository: &dyn LibraryResolutionProvider,
        plan_definition: &Value,
    ) -> LibraryResult<Arc<CompiledLibrary>> {
        let plan_id = plan_definition
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let unresolved = || LibraryError::not_found(format!("primary library of PlanDefinition/{plan_id}"));

        let canonical = plan_definition
            .get("library")
            .and_then(Value::as_array)
            .and_then(|libraries| libraries.first())
            .and_then(Value::as_str)
            .ok_or_else(unresolved)?;

        let resource = match repository.resolve_library_by_canonical_url(canonical).await? {
            Some(resource) => resource,
            None => repository
                .resolve_library_by_id(canonical_id(canonical))
                .await?
                .ok_or_else(unresolved)?,
        };
        tracing::debug!(plan_definition = plan_id, canonical, "Resolved primary library");

        load_resource(loader, &resource, || format!("PlanDefinition/{plan_id}")).await
    }

    /// Compile CQL text in the loader's session. The result is not cached.
    pub async fn compile_text(
        &self,
        loader: &ServiceLibraryLoader,
        cql: &str,
    ) -> LibraryResult<CompiledLibrary> {
        loader.inner().translate_text(cql).await
    }

    pub fn cache_stats(&self) -> ServiceCacheStats {
        ServiceCacheStats {
            models: self.model_cache.stats(),
            libraries: self.library_cache.stats(),
            terminology: self.terminology_cache.stats(),
        }
    }

    pub fn clear_library_cache(&self) {
        tracing::info!(entries = self.library_cache.len(), "Clearing library cache");
        self.library_cache.clear();
    }

    pub fn clear_terminology_cache(&self) {
        tracing::info!(entries = self.terminology_cache.len(), "Clearing terminology cache");
        self.terminology_cache.clear();
    }

    /// Library and terminology caches. Compiled models are kept.
    pub fn clear_cache(&self) {
        self.clear_library_cache();
        self.clear_terminology_cache();
    }

    pub fn library_cache(&self) -> &Arc<LibraryCache> {
        &self.library_cache
    }

    pub fn model_cache(&self) -> &Arc<GlobalModelCache> {
        &self.model_cache
    }
}

async fn load_resource(
    loader: &dyn LibraryLoader,
    resource: &LibraryResource,
    describe: impl Fn() -> String,
) -> LibraryResult<Arc<CompiledLibrary>> {
    let name = resource
        .name
        .as_deref()
        .ok_or_else(|| LibraryError::not_found(format!("{} (Library resource has no name)", describe())))?;
    loader
        .load(&VersionedIdentifier::new(name, resource.version.as_deref()))
        .await
}
