use std::sync::Arc;

use crate::models::error::RecorderError;
use crate::models::stream::MediaStream;
use crate::traits::capture_engine::CaptureEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Invoked once when a track ends from outside the session, e.g. the user
/// stops sharing from the OS or browser chrome.
pub type TrackEndedCallback = Box<dyn FnOnce() + Send + 'static>;

/// A single live media track (one video surface or one audio source).
pub trait MediaTrack: Send + Sync {
    fn id(&self) -> String;

    fn kind(&self) -> TrackKind;

    /// Stop the track and release its device. Does not fire the ended callback.
    fn stop(&self);

    /// Register the observer for externally ended tracks.
    fn on_ended(&self, callback: TrackEndedCallback);
}

/// Which capture capabilities the host exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformCapabilities {
    pub display_capture: bool,
    pub capture_engine: bool,
}

impl PlatformCapabilities {
    pub fn is_supported(&self) -> bool {
        self.display_capture && self.capture_engine
    }
}

/// Constraints for the display capture prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayCaptureRequest {
    pub video: bool,
    pub audio: bool,
}

/// Audio-processing context used to fold several audio sources into one track.
///
/// Contexts may start suspended and must be resumed before use. A context
/// that is never closed leaks an OS audio device handle.
pub trait AudioMixContext: Send {
    fn resume(&mut self) -> Result<(), RecorderError>;

    /// Create the mixing destination and return its single output track.
    fn create_destination(&mut self) -> Result<Arc<dyn MediaTrack>, RecorderError>;

    /// Route the audio of `stream` into the destination.
    fn connect_source(&mut self, stream: &MediaStream) -> Result<(), RecorderError>;

    fn close(&mut self);
}

/// Host media APIs consumed by a recording session.
///
/// Acquisition methods block on the user's permission prompt.
pub trait MediaPlatform: Send + Sync {
    fn capabilities(&self) -> PlatformCapabilities;

    fn request_display_media(&self, request: &DisplayCaptureRequest) -> Result<MediaStream, RecorderError>;

    fn request_microphone(&self) -> Result<MediaStream, RecorderError>;

    fn create_audio_context(&self) -> Result<Box<dyn AudioMixContext>, RecorderError>;

    fn is_encoding_supported(&self, mime_type: &str) -> bool;

    /// Build a capture engine over `stream`. `None` lets the engine choose its
    /// default container encoding.
    fn create_capture_engine(
        &self,
        stream: MediaStream,
        mime_type: Option<&str>,
    ) -> Result<Box<dyn CaptureEngine>, RecorderError>;
}
