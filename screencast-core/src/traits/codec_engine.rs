use crate::models::artifact::Blob;
use crate::models::engine::EngineMode;
use crate::models::error::EngineError;

/// The static files an engine build is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Script,
    Payload,
    /// Multi-threaded build only.
    Worker,
}

impl AssetKind {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Script | Self::Worker => "text/javascript",
            Self::Payload => "application/wasm",
        }
    }
}

/// An asset fetched into memory and ready to hand to an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadableAsset {
    pub path: String,
    pub blob: Blob,
}

/// Everything an engine build is initialized with.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineAssets {
    pub script: LoadableAsset,
    pub payload: LoadableAsset,
    pub worker: Option<LoadableAsset>,
}

/// Locates and fetches engine assets by path.
pub trait AssetSource: Send + Sync {
    fn exists(&self, path: &str) -> bool;

    fn fetch(&self, path: &str, content_type: &str) -> Result<LoadableAsset, EngineError>;
}

/// A loaded codec engine with a private virtual file namespace.
pub trait CodecEngine: Send {
    fn write_file(&mut self, name: &str, data: &[u8]) -> Result<(), EngineError>;

    /// Run one transcode. `on_progress` receives raw engine ratios; they are
    /// not guaranteed to be in range or ordered.
    fn exec(&mut self, args: &[String], on_progress: &mut dyn FnMut(f64)) -> Result<(), EngineError>;

    fn read_file(&mut self, name: &str) -> Result<Vec<u8>, EngineError>;

    fn delete_file(&mut self, name: &str) -> Result<(), EngineError>;
}

/// Initializes an engine build from its fetched assets.
pub trait CodecEngineFactory: Send + Sync {
    fn initialize(&self, mode: EngineMode, assets: EngineAssets) -> Result<Box<dyn CodecEngine>, EngineError>;
}
