//! Fixed in-memory library content

use super::{LibraryContentKind, LibraryContentProvider};
use crate::error::LibraryResult;
use crate::identifier::VersionedIdentifier;
use async_trait::async_trait;
use dashmap::DashMap;

/// Serves content registered up front, e.g. embedded helper libraries.
#[derive(Default)]
pub struct InMemoryContentProvider {
    name: String,
    content: DashMap<(VersionedIdentifier, LibraryContentKind), Vec<u8>>,
}

impl InMemoryContentProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: DashMap::new(),
        }
    }

    pub fn insert(
        &self,
        identifier: VersionedIdentifier,
        kind: LibraryContentKind,
        content: impl Into<Vec<u8>>,
    ) {
        self.content.insert((identifier, kind), content.into());
    }

    pub fn with_content(
        self,
        identifier: VersionedIdentifier,
        kind: LibraryContentKind,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        self.insert(identifier, kind, content);
        self
    }
}

#[async_trait]
impl LibraryContentProvider for InMemoryContentProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn library_content(
        &self,
        identifier: &VersionedIdentifier,
        kind: LibraryContentKind,
    ) -> LibraryResult<Option<Vec<u8>>> {
        Ok(self
            .content
            .get(&(identifier.clone(), kind))
            .map(|entry| entry.value().clone()))
    }
}
