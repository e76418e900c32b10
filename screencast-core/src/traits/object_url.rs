use crate::models::artifact::Blob;

/// Issues and revokes transient reference URLs for in-memory blobs.
pub trait ObjectUrlRegistry: Send + Sync {
    fn create(&self, blob: &Blob) -> String;

    fn revoke(&self, url: &str);
}
