//! Library content providers and the ordered resolution chain

mod fhir;
mod memory;

pub use fhir::FhirLibraryContentProvider;
pub use memory::InMemoryContentProvider;

use crate::error::{LibraryError, LibraryResult};
use crate::identifier::VersionedIdentifier;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The forms in which library content can be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LibraryContentKind {
    /// Compact precompiled ELM (JSON)
    ElmJson,
    /// Verbose precompiled ELM (XML)
    ElmXml,
    /// CQL source text
    Cql,
}

impl LibraryContentKind {
    /// Precompiled kinds in the order they are tried.
    pub const PRECOMPILED: [LibraryContentKind; 2] = [Self::ElmJson, Self::ElmXml];
}

impl fmt::Display for LibraryContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ElmJson => "elm+json",
            Self::ElmXml => "elm+xml",
            Self::Cql => "cql",
        })
    }
}

/// A source of raw library content.
///
/// `Ok(None)` means the provider has no content of that kind for the
/// identifier; errors are reserved for providers that could not answer.
#[async_trait]
pub trait LibraryContentProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn library_content(
        &self,
        identifier: &VersionedIdentifier,
        kind: LibraryContentKind,
    ) -> LibraryResult<Option<Vec<u8>>>;
}

/// Providers queried in registration order; the first hit wins.
#[derive(Clone, Default)]
pub struct ContentResolutionChain {
    providers: Vec<Arc<dyn LibraryContentProvider>>,
}

impl ContentResolutionChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn LibraryContentProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn register(&mut self, provider: Arc<dyn LibraryContentProvider>) {
        self.providers.push(provider);
    }

    pub fn clear(&mut self) {
        self.providers.clear();
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Content of exactly `kind` from the first provider that has it.
    ///
    /// A failing provider is logged and skipped. No other kind is consulted.
    pub async fn resolve(
        &self,
        identifier: &VersionedIdentifier,
        kind: LibraryContentKind,
    ) -> Option<Vec<u8>> {
        for provider in &self.providers {
            match provider.library_content(identifier, kind).await {
                Ok(Some(content)) => {
                    tracing::debug!(
                        library = %identifier,
                        %kind,
                        provider = provider.name(),
                        "Library content resolved"
                    );
                    return Some(content);
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(
                        library = %identifier,
                        %kind,
                        provider = provider.name(),
                        error = %e,
                        "Library content provider failed, trying next"
                    );
                }
            }
        }
        None
    }
}

/// CQL source access for the compiler.
#[derive(Clone)]
pub struct LibrarySourceLoader {
    chain: ContentResolutionChain,
}

impl LibrarySourceLoader {
    pub fn new(chain: ContentResolutionChain) -> Self {
        Self { chain }
    }

    /// CQL text for the identifier; `NotFound` when no provider has source.
    pub async fn library_source(&self, identifier: &VersionedIdentifier) -> LibraryResult<String> {
        let bytes = self
            .chain
            .resolve(identifier, LibraryContentKind::Cql)
            .await
            .ok_or_else(|| LibraryError::not_found(identifier))?;

        String::from_utf8(bytes).map_err(|e| {
            LibraryError::provider(
                "source",
                format!("CQL source for {identifier} is not valid UTF-8: {e}"),
            )
        })
    }
}
