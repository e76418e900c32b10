use std::collections::HashSet;

use parking_lot::Mutex;

use crate::models::artifact::Blob;
use crate::traits::object_url::ObjectUrlRegistry;

/// Reference URL registry for hosts without a native blob URL facility.
///
/// Issues `blob:<origin>/<uuid>` URLs and tracks which are still live.
pub struct InMemoryUrlRegistry {
    origin: String,
    live: Mutex<HashSet<String>>,
}

impl InMemoryUrlRegistry {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            live: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_live(&self, url: &str) -> bool {
        self.live.lock().contains(url)
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }
}

impl Default for InMemoryUrlRegistry {
    fn default() -> Self {
        Self::new("local")
    }
}

impl ObjectUrlRegistry for InMemoryUrlRegistry {
    fn create(&self, blob: &Blob) -> String {
        let url = format!("blob:{}/{}", self.origin, uuid::Uuid::new_v4());
        log::debug!("issued {} for {} bytes of {}", url, blob.len(), blob.content_type());
        self.live.lock().insert(url.clone());
        url
    }

    fn revoke(&self, url: &str) {
        if !self.live.lock().remove(url) {
            log::warn!("revoke of unknown url {}", url);
        }
    }
}
