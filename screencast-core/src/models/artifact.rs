use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Immutable in-memory byte buffer with a content type.
///
/// Clones share the same allocation, so handing a blob to the transcode
/// pipeline or to a delegate never copies the recording.
#[derive(Clone, PartialEq, Eq)]
pub struct Blob {
    data: Arc<[u8]>,
    content_type: String,
}

impl Blob {
    pub fn new(data: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            data: Arc::from(data.into()),
            content_type: content_type.into(),
        }
    }

    /// Concatenate flushed chunks into a single container blob.
    pub fn from_chunks<I, B>(chunks: I, content_type: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut data = Vec::new();
        for chunk in chunks {
            data.extend_from_slice(chunk.as_ref());
        }
        Self::new(data, content_type)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// SHA-256 hex digest of the contents.
    pub fn checksum(&self) -> String {
        let digest = Sha256::digest(self.bytes());
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("len", &self.data.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// The two artifact slots a session can publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// The container assembled from the capture engine's flushed chunks.
    Raw,
    /// The transcoded, widely playable container.
    Converted,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Raw => "webm",
            Self::Converted => "mp4",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Raw => "video/webm",
            Self::Converted => "video/mp4",
        }
    }
}

/// A published, downloadable recording artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub blob: Blob,
    pub url: String,
    pub file_name: String,
    pub checksum: String,
}
