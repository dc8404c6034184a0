use super::LibraryLoader;
use crate::cache::LibraryCache;
use crate::elm::CompiledLibrary;
use crate::error::LibraryResult;
use crate::fingerprint;
use crate::identifier::VersionedIdentifier;
use crate::options::TranslatorOptions;
use async_trait::async_trait;
use std::sync::Arc;

/// Serves libraries from a shared cache, delegating on a miss or when the
/// cached library was built with different options.
pub struct CacheAwareLibraryLoader<L> {
    inner: L,
    cache: Arc<LibraryCache>,
}

impl<L: LibraryLoader> CacheAwareLibraryLoader<L> {
    pub fn new(inner: L, cache: Arc<LibraryCache>) -> Self {
        Self { inner, cache }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    pub fn library_cache(&self) -> &Arc<LibraryCache> {
        &self.cache
    }
}

#[async_trait]
impl<L: LibraryLoader> LibraryLoader for CacheAwareLibraryLoader<L> {
    async fn load(&self, identifier: &VersionedIdentifier) -> LibraryResult<Arc<CompiledLibrary>> {
        let options = self.inner.translator_options();
        self.cache
            .get_or_try_insert_with(
                identifier,
                |library| fingerprint::matches(library, &options),
                || async {
                    tracing::debug!(library = %identifier, "Library cache miss");
                    self.inner.load(identifier).await
                },
            )
            .await
    }

    fn translator_options(&self) -> TranslatorOptions {
        self.inner.translator_options()
    }
}
