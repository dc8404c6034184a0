//! FHIR `Library` resources and the resolvers that supply them

use crate::error::{LibraryError, LibraryResult};
use crate::identifier::split_canonical;
use crate::version::select_from_list;
use async_trait::async_trait;
use base64::Engine;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn library_resource_type() -> String {
    "Library".to_string()
}

/// The parts of a FHIR `Library` resource this crate reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryResource {
    #[serde(default = "library_resource_type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Attachment>,
}

/// `Library.content` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Base64 encoded payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Attachment {
    pub fn new(content_type: impl Into<String>, content: &[u8]) -> Self {
        Self {
            content_type: Some(content_type.into()),
            data: Some(base64::engine::general_purpose::STANDARD.encode(content)),
            url: None,
        }
    }

    /// Decoded payload, `None` when the attachment carries no inline data.
    pub fn decoded_data(&self) -> LibraryResult<Option<Vec<u8>>> {
        let Some(data) = &self.data else {
            return Ok(None);
        };
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map(Some)
            .map_err(|e| {
                LibraryError::provider("attachment", format!("Failed to decode base64 content: {e}"))
            })
    }
}

impl LibraryResource {
    pub fn new(name: impl Into<String>, version: Option<&str>) -> Self {
        Self {
            resource_type: library_resource_type(),
            id: None,
            url: None,
            name: Some(name.into()),
            version: version.map(str::to_string),
            content: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_attachment(mut self, content_type: &str, content: &[u8]) -> Self {
        self.content.push(Attachment::new(content_type, content));
        self
    }

    pub fn from_json(value: Value) -> LibraryResult<Self> {
        let resource: Self = serde_json::from_value(value)?;
        if resource.resource_type != "Library" {
            return Err(LibraryError::provider(
                "resource",
                format!("expected a Library resource, got {}", resource.resource_type),
            ));
        }
        Ok(resource)
    }

    /// First attachment whose content type is one of `content_types`.
    pub fn attachment_for(&self, content_types: &[String]) -> Option<&Attachment> {
        self.content.iter().find(|attachment| {
            attachment
                .content_type
                .as_deref()
                .is_some_and(|ct| content_types.iter().any(|wanted| wanted == ct))
        })
    }
}

/// Supplies `Library` resources from a resource store.
#[async_trait]
pub trait LibraryResolutionProvider: Send + Sync {
    async fn resolve_library_by_id(&self, id: &str) -> LibraryResult<Option<LibraryResource>>;

    /// Same-named libraries narrowed to the requested version, or the latest
    /// one when no version is given.
    async fn resolve_library_by_name(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> LibraryResult<Option<LibraryResource>>;

    /// Accepts `url` or `url|version`.
    async fn resolve_library_by_canonical_url(
        &self,
        url: &str,
    ) -> LibraryResult<Option<LibraryResource>>;

    async fn update(&self, library: LibraryResource) -> LibraryResult<()>;
}

/// Library resources held in memory, keyed by resource id.
#[derive(Default)]
pub struct InMemoryLibraryRepository {
    libraries: DashMap<String, LibraryResource>,
}

impl InMemoryLibraryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    /// Matching resources ordered by id.
    fn matching(&self, predicate: impl Fn(&LibraryResource) -> bool) -> Vec<LibraryResource> {
        let mut candidates: Vec<LibraryResource> = self
            .libraries
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        candidates
    }
}

#[async_trait]
impl LibraryResolutionProvider for InMemoryLibraryRepository {
    async fn resolve_library_by_id(&self, id: &str) -> LibraryResult<Option<LibraryResource>> {
        Ok(self.libraries.get(id).map(|entry| entry.value().clone()))
    }

    async fn resolve_library_by_name(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> LibraryResult<Option<LibraryResource>> {
        let candidates = self.matching(|library| library.name.as_deref() == Some(name));
        select_from_list(candidates, version, |library| library.version.as_deref())
    }

    async fn resolve_library_by_canonical_url(
        &self,
        url: &str,
    ) -> LibraryResult<Option<LibraryResource>> {
        let (url, version) = split_canonical(url);
        let candidates = self.matching(|library| library.url.as_deref() == Some(url));
        select_from_list(candidates, version, |library| library.version.as_deref())
    }

    async fn update(&self, library: LibraryResource) -> LibraryResult<()> {
        let id = library
            .id
            .clone()
            .ok_or_else(|| LibraryError::provider("memory", "Library resource has no id"))?;
        tracing::debug!(id = %id, name = ?library.name, "Storing library resource");
        self.libraries.insert(id, library);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn repository() -> InMemoryLibraryRepository {
        let repo = InMemoryLibraryRepository::new();
        for (id, version) in [("common-1", "1.0"), ("common-2", "2.0"), ("common-15", "1.5")] {
            repo.update(
                LibraryResource::new("Common", Some(version))
                    .with_id(id)
                    .with_url("http://example.org/Library/Common"),
            )
            .await
            .unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn test_resolve_by_name_exact_version() {
        let repo = repository().await;
        let library = repo.resolve_library_by_name("Common", Some("1.5")).await.unwrap();
        assert_eq!(library.and_then(|l| l.id), Some("common-15".to_string()));
    }

    #[tokio::test]
    async fn test_resolve_by_name_unknown_version_is_none() {
        let repo = repository().await;
        let library = repo.resolve_library_by_name("Common", Some("3.0")).await.unwrap();
        assert!(library.is_none());
    }

    #[tokio::test]
    async fn test_resolve_by_name_latest() {
        let repo = repository().await;
        let library = repo.resolve_library_by_name("Common", None).await.unwrap();
        assert_eq!(library.and_then(|l| l.version), Some("2.0".to_string()));
    }

    #[tokio::test]
    async fn test_resolve_by_canonical_url() {
        let repo = repository().await;
        let pinned = repo
            .resolve_library_by_canonical_url("http://example.org/Library/Common|1.0")
            .await
            .unwrap();
        assert_eq!(pinned.and_then(|l| l.id), Some("common-1".to_string()));

        let latest = repo
            .resolve_library_by_canonical_url("http://example.org/Library/Common")
            .await
            .unwrap();
        assert_eq!(latest.and_then(|l| l.version), Some("2.0".to_string()));
    }

    #[tokio::test]
    async fn test_duplicate_versions_resolve_by_lowest_id() {
        let repo = InMemoryLibraryRepository::new();
        for id in ["common-z", "common-m", "common-a", "common-q"] {
            repo.update(LibraryResource::new("Dup", Some("1.0")).with_id(id))
                .await
                .unwrap();
        }

        for _ in 0..5 {
            let library = repo.resolve_library_by_name("Dup", Some("1.0")).await.unwrap();
            assert_eq!(library.and_then(|l| l.id), Some("common-a".to_string()));
        }
    }

    #[tokio::test]
    async fn test_update_requires_id() {
        let repo = InMemoryLibraryRepository::new();
        let result = repo.update(LibraryResource::new("NoId", None)).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_attachment_round_trip_and_lookup() {
        let resource = LibraryResource::from_json(json!({
            "resourceType": "Library",
            "id": "example",
            "name": "Example",
            "content": [
                { "contentType": "application/elm+json", "data": "e30=" },
                { "contentType": "text/cql", "data": "bGlicmFyeSBFeGFtcGxl" }
            ]
        }))
        .unwrap();

        let cql = resource.attachment_for(&["text/cql".to_string()]).unwrap();
        assert_eq!(cql.decoded_data().unwrap(), Some(b"library Example".to_vec()));
        assert!(resource.attachment_for(&["application/elm+xml".to_string()]).is_none());
    }

    #[test]
    fn test_from_json_rejects_other_resource_types() {
        let result = LibraryResource::from_json(json!({ "resourceType": "Patient", "id": "p" }));
        assert!(result.is_err());
    }
}
