use std::sync::Arc;
use std::time::Duration;

use crate::models::error::RecorderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEngineState {
    Inactive,
    Recording,
    Paused,
}

/// Events a capture engine reports back to its session.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// A flushed slice of container data.
    Chunk(Vec<u8>),
    Paused,
    Resumed,
    /// Capture fully stopped; no further chunks follow.
    Stopped,
    Errored(String),
}

/// Receives capture engine events. May be invoked from any thread, including
/// synchronously from inside `pause`/`resume`/`stop`.
pub type CaptureEventSink = Arc<dyn Fn(CaptureEvent) + Send + Sync + 'static>;

/// The component that encodes a mixed stream into container chunks.
pub trait CaptureEngine: Send {
    fn state(&self) -> CaptureEngineState;

    /// Encoding actually in use.
    fn mime_type(&self) -> Option<String>;

    /// Begin capture, flushing a chunk every `flush_interval`.
    fn start(&mut self, flush_interval: Duration, events: CaptureEventSink) -> Result<(), RecorderError>;

    fn pause(&mut self);

    fn resume(&mut self);

    /// Request a stop. Completion is reported through `CaptureEvent::Stopped`.
    fn stop(&mut self);
}
