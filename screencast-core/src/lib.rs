//! # screencast-core
//!
//! Platform-agnostic screen recording core.
//!
//! Owns the recording session state machine, display/microphone stream mixing,
//! the pausable capture timer, and the transcode pipeline with its
//! dual-build codec engine loader. Hosts plug in concrete media APIs through
//! the `MediaPlatform` trait and concrete codec engines through
//! `CodecEngineFactory` + `AssetSource`.
//!
//! ## Architecture
//!
//! ```text
//! screencast-core (this crate)
//! ├── traits/       ← MediaPlatform, CaptureEngine, CodecEngine, AssetSource, RecorderDelegate, ...
//! ├── models/       ← RecordingStatus, RecorderError, EngineError, Blob, Artifact, configuration
//! ├── processing/   ← StreamMixer, CaptureTimer
//! ├── session/      ← RecordingSession (state machine orchestrator)
//! ├── transcode/    ← CodecEngineLoader, TranscodePipeline
//! └── storage/      ← ArtifactSlot, ObjectUrl, InMemoryUrlRegistry, filenames
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;
pub mod transcode;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types at crate root for convenience.
pub use models::artifact::{Artifact, ArtifactKind, Blob};
pub use models::config::{RecorderConfiguration, TranscodeConfiguration};
pub use models::engine::{ConversionSource, EngineMode};
pub use models::error::{EngineError, RecorderError, RecorderErrorKind};
pub use models::state::{RecordingStatus, SessionSnapshot};
pub use models::stream::MediaStream;
pub use processing::capture_timer::CaptureTimer;
pub use processing::stream_mixer::{MixedStream, StreamMixer};
pub use session::controller::{ConvertOutcome, RecordingSession};
pub use storage::url_registry::InMemoryUrlRegistry;
pub use traits::capture_engine::{CaptureEngine, CaptureEngineState, CaptureEvent, CaptureEventSink};
pub use traits::clock::{Clock, SystemClock};
pub use traits::codec_engine::{AssetKind, AssetSource, CodecEngine, CodecEngineFactory, EngineAssets, LoadableAsset};
pub use traits::delegate::RecorderDelegate;
pub use traits::media_platform::{
    AudioMixContext, DisplayCaptureRequest, MediaPlatform, MediaTrack, PlatformCapabilities, TrackKind,
};
pub use traits::object_url::ObjectUrlRegistry;
pub use transcode::loader::{CodecEngineLoader, LoadedEngine};
pub use transcode::pipeline::{ConversionResult, TranscodePipeline};
