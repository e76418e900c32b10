use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The user-facing error vocabulary of a recording session.
///
/// Only these three kinds reach the UI; the detailed [`RecorderError`] or
/// [`EngineError`] behind them is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderErrorKind {
    /// Capture capability missing. Fatal until the host is restarted.
    Unsupported,
    /// Device acquisition or capture engine failure. Retry with `start_recording`.
    StartFailed,
    /// Transcode failure. The raw recording stays downloadable.
    ConversionFailed,
}

/// Errors that can occur while acquiring devices or driving a recording.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecorderError {
    #[error("screen capture is not supported")]
    Unsupported,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("device not available: {0}")]
    DeviceNotAvailable(String),

    #[error("audio mixing failed: {0}")]
    AudioMixing(String),

    #[error("capture engine error: {0}")]
    CaptureEngine(String),

    #[error("configuration failed: {0}")]
    Configuration(String),

    #[error("conversion failed: {0}")]
    Conversion(#[from] EngineError),
}

impl RecorderError {
    pub fn kind(&self) -> RecorderErrorKind {
        match self {
            Self::Unsupported => RecorderErrorKind::Unsupported,
            Self::Conversion(_) => RecorderErrorKind::ConversionFailed,
            Self::PermissionDenied(_)
            | Self::DeviceNotAvailable(_)
            | Self::AudioMixing(_)
            | Self::CaptureEngine(_)
            | Self::Configuration(_) => RecorderErrorKind::StartFailed,
        }
    }
}

/// Errors raised by the codec engine loader and the transcode pipeline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("asset not found: {0}")]
    AssetMissing(String),

    #[error("failed to read asset {path}: {reason}")]
    AssetRead { path: String, reason: String },

    #[error("engine initialization failed: {0}")]
    Initialization(String),

    #[error("engine execution failed: {0}")]
    Exec(String),

    #[error("virtual file error: {0}")]
    Namespace(String),

    #[error("a conversion is already running")]
    Busy,

    #[error("all engine builds failed (preferred: {preferred}; fallback: {fallback})")]
    AllBuildsFailed {
        preferred: Box<EngineError>,
        fallback: Box<EngineError>,
    },
}
