use std::sync::Arc;

use crate::models::artifact::{Artifact, ArtifactKind, Blob};
use crate::traits::object_url::ObjectUrlRegistry;

/// A reference URL that is revoked when dropped.
pub struct ObjectUrl {
    url: String,
    registry: Arc<dyn ObjectUrlRegistry>,
}

impl ObjectUrl {
    pub fn create(registry: Arc<dyn ObjectUrlRegistry>, blob: &Blob) -> Self {
        let url = registry.create(blob);
        Self { url, registry }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        self.registry.revoke(&self.url);
    }
}

struct Published {
    blob: Blob,
    url: ObjectUrl,
    file_name: String,
    checksum: String,
}

/// Holds at most one published artifact of one kind.
///
/// The slot owns the artifact's reference URL: overwriting or clearing the
/// slot revokes the old URL before any new one is issued.
pub struct ArtifactSlot {
    kind: ArtifactKind,
    registry: Arc<dyn ObjectUrlRegistry>,
    current: Option<Published>,
}

impl ArtifactSlot {
    pub fn new(kind: ArtifactKind, registry: Arc<dyn ObjectUrlRegistry>) -> Self {
        Self {
            kind,
            registry,
            current: None,
        }
    }

    pub fn publish(&mut self, blob: Blob, file_name: String) -> Artifact {
        self.clear();
        let url = ObjectUrl::create(Arc::clone(&self.registry), &blob);
        let checksum = blob.checksum();
        let published = Published {
            blob,
            url,
            file_name,
            checksum,
        };
        let artifact = Self::view(self.kind, &published);
        self.current = Some(published);
        artifact
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn artifact(&self) -> Option<Artifact> {
        self.current.as_ref().map(|p| Self::view(self.kind, p))
    }

    pub fn blob(&self) -> Option<&Blob> {
        self.current.as_ref().map(|p| &p.blob)
    }

    pub fn url(&self) -> Option<&str> {
        self.current.as_ref().map(|p| p.url.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    fn view(kind: ArtifactKind, published: &Published) -> Artifact {
        Artifact {
            kind,
            blob: published.blob.clone(),
            url: published.url.as_str().to_string(),
            file_name: published.file_name.clone(),
            checksum: published.checksum.clone(),
        }
    }
}
