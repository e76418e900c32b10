use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use screencast_core::{AssetSource, Blob, EngineError, LoadableAsset};

/// Serves engine assets from a directory on disk.
///
/// Asset paths are URL-style (`/ffmpeg/core/ffmpeg-core.wasm`) and resolve
/// under `root`. Paths that would escape the root are treated as missing.
#[derive(Debug, Clone)]
pub struct FsAssetSource {
    root: PathBuf,
}

impl FsAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative.as_os_str().is_empty() {
            return None;
        }
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(resolved)
    }
}

impl AssetSource for FsAssetSource {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_some_and(|p| p.is_file())
    }

    fn fetch(&self, path: &str, content_type: &str) -> Result<LoadableAsset, EngineError> {
        let file = self
            .resolve(path)
            .ok_or_else(|| EngineError::AssetMissing(path.to_string()))?;

        let data = fs::read(&file).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => EngineError::AssetMissing(path.to_string()),
            _ => EngineError::AssetRead {
                path: path.to_string(),
                reason: e.to_string(),
            },
        })?;
        log::debug!("fetched {} ({} bytes) from {}", path, data.len(), file.display());

        Ok(LoadableAsset {
            path: path.to_string(),
            blob: Blob::new(data, content_type),
        })
    }
}
