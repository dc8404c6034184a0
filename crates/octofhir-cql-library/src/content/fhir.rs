//! Content extracted from FHIR `Library` resource attachments

use super::{LibraryContentKind, LibraryContentProvider};
use crate::config::ContentConfig;
use crate::error::{LibraryError, LibraryResult};
use crate::identifier::VersionedIdentifier;
use crate::resource::LibraryResolutionProvider;
use async_trait::async_trait;
use std::sync::Arc;

/// Looks libraries up by name and version and serves the attachment whose
/// content type matches the requested kind.
pub struct FhirLibraryContentProvider {
    resolver: Arc<dyn LibraryResolutionProvider>,
    content: ContentConfig,
}

impl FhirLibraryContentProvider {
    pub fn new(resolver: Arc<dyn LibraryResolutionProvider>, content: ContentConfig) -> Self {
        Self { resolver, content }
    }
}

#[async_trait]
impl LibraryContentProvider for FhirLibraryContentProvider {
    fn name(&self) -> &str {
        "fhir-library"
    }

    async fn library_content(
        &self,
        identifier: &VersionedIdentifier,
        kind: LibraryContentKind,
    ) -> LibraryResult<Option<Vec<u8>>> {
        tracing::debug!(library = %identifier, %kind, "Fetching library content");

        let library = self
            .resolver
            .resolve_library_by_name(&identifier.id, identifier.version())
            .await
            .map_err(|e| LibraryError::provider(self.name(), e))?;

        let Some(library) = library else {
            return Ok(None);
        };

        match library.attachment_for(self.content.content_types(kind)) {
            Some(attachment) => attachment.decoded_data(),
            None => Ok(None),
        }
    }
}
