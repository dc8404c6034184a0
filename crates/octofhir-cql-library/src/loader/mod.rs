//! Library loaders
//!
//! [`TranslatingLibraryLoader`] turns an identifier into a compiled library,
//! reusing precompiled content when its recorded options match and compiling
//! from source otherwise. [`CacheAwareLibraryLoader`] decorates any loader with
//! a shared [`LibraryCache`](crate::cache::LibraryCache).

mod cache_aware;
mod translating;

pub use cache_aware::CacheAwareLibraryLoader;
pub use translating::TranslatingLibraryLoader;

use crate::elm::CompiledLibrary;
use crate::error::LibraryResult;
use crate::identifier::VersionedIdentifier;
use crate::options::TranslatorOptions;
use async_trait::async_trait;
use std::sync::Arc;

/// Resolves compiled libraries by identifier.
#[async_trait]
pub trait LibraryLoader: Send + Sync {
    /// Fails with `NotFound` when nothing can be produced for the identifier.
    async fn load(&self, identifier: &VersionedIdentifier) -> LibraryResult<Arc<CompiledLibrary>>;

    /// The option set libraries returned by this loader are built with.
    fn translator_options(&self) -> TranslatorOptions;
}

#[async_trait]
impl<L: LibraryLoader + ?Sized> LibraryLoader for Arc<L> {
    async fn load(&self, identifier: &VersionedIdentifier) -> LibraryResult<Arc<CompiledLibrary>> {
        (**self).load(identifier).await
    }

    fn translator_options(&self) -> TranslatorOptions {
        (**self).translator_options()
    }
}
