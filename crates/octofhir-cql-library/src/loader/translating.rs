use super::LibraryLoader;
use crate::compiler::{CompilationContext, CqlCompiler, library_from_output};
use crate::content::{ContentResolutionChain, LibraryContentKind, LibrarySourceLoader};
use crate::elm::CompiledLibrary;
use crate::error::{LibraryError, LibraryResult};
use crate::fingerprint;
use crate::identifier::VersionedIdentifier;
use crate::model_manager::ModelManager;
use crate::options::TranslatorOptions;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Loads precompiled ELM when it was built with the configured options and
/// compiles CQL source otherwise.
pub struct TranslatingLibraryLoader {
    compiler: Arc<dyn CqlCompiler>,
    content: ContentResolutionChain,
    sources: LibrarySourceLoader,
    /// One compilation session; the compiler gets exclusive access per call
    models: Mutex<ModelManager>,
    options: ArcSwap<TranslatorOptions>,
}

impl TranslatingLibraryLoader {
    pub fn new(
        compiler: Arc<dyn CqlCompiler>,
        content: ContentResolutionChain,
        models: ModelManager,
        options: TranslatorOptions,
    ) -> Self {
        Self {
            compiler,
            sources: LibrarySourceLoader::new(content.clone()),
            content,
            models: Mutex::new(models),
            options: ArcSwap::from_pointee(options),
        }
    }

    /// Replace the option set used for fingerprint checks and compilation.
    pub fn set_translator_options(&self, options: TranslatorOptions) {
        tracing::info!(options = %options, "Translator options changed");
        self.options.store(Arc::new(options));
    }

    pub fn content(&self) -> &ContentResolutionChain {
        &self.content
    }

    /// First precompiled library that parses, trying compact ELM before
    /// verbose ELM.
    async fn precompiled(&self, identifier: &VersionedIdentifier) -> Option<CompiledLibrary> {
        for kind in LibraryContentKind::PRECOMPILED {
            let Some(bytes) = self.content.resolve(identifier, kind).await else {
                continue;
            };
            match CompiledLibrary::read(&bytes, kind) {
                Ok(library) => return Some(library),
                Err(e) => {
                    tracing::debug!(library = %identifier, %kind, error = %e, "Skipping unreadable precompiled library");
                }
            }
        }
        None
    }

    /// Compile the library from source through the compiler.
    pub async fn translate(&self, identifier: &VersionedIdentifier) -> LibraryResult<CompiledLibrary> {
        let options = self.options.load_full();
        tracing::debug!(library = %identifier, options = %options, "Translating library");

        let mut models = self.models.lock().await;
        let output = self
            .compiler
            .resolve_library(
                identifier,
                CompilationContext {
                    options: &options,
                    models: &mut *models,
                    sources: &self.sources,
                },
            )
            .await
            .map_err(|e| {
                LibraryError::translation(identifier, format!("Unable to translate library {identifier}: {e:#}"))
            })?;
        drop(models);

        library_from_output(identifier, output)
    }

    /// Compile ad hoc CQL text in this loader's session.
    pub async fn translate_text(&self, text: &str) -> LibraryResult<CompiledLibrary> {
        let options = self.options.load_full();
        let mut models = self.models.lock().await;
        let output = self
            .compiler
            .compile_from_text(
                text,
                CompilationContext {
                    options: &options,
                    models: &mut *models,
                    sources: &self.sources,
                },
            )
            .await
            .map_err(|e| LibraryError::translation("<text>", format!("Unable to translate library: {e:#}")))?;
        drop(models);

        library_from_output(&"<text>", output)
    }
}

#[async_trait]
impl LibraryLoader for TranslatingLibraryLoader {
    async fn load(&self, identifier: &VersionedIdentifier) -> LibraryResult<Arc<CompiledLibrary>> {
        if let Some(library) = self.precompiled(identifier).await {
            let options = self.options.load_full();
            if fingerprint::matches(&library, &options) {
                tracing::debug!(library = %identifier, "Using precompiled library");
                return Ok(Arc::new(library));
            }
            tracing::debug!(library = %identifier, "Precompiled library options differ, recompiling");
        }

        self.translate(identifier).await.map(Arc::new)
    }

    fn translator_options(&self) -> TranslatorOptions {
        self.options.load().as_ref().clone()
    }
}
