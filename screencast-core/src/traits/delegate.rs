use crate::models::artifact::Artifact;
use crate::models::error::RecorderErrorKind;
use crate::models::state::RecordingStatus;

/// Event delegate for recording session notifications.
///
/// Methods are called from whichever thread drove the change (the caller's
/// thread, the capture engine's event thread, or the timer thread). No session
/// lock is held during the call, so implementations may read the session or
/// call its control methods, e.g. `reset_recording` from `on_status_changed`.
pub trait RecorderDelegate: Send + Sync {
    fn on_status_changed(&self, status: RecordingStatus);

    /// Called every timer period while recording.
    fn on_elapsed_updated(&self, elapsed_ms: u64);

    fn on_error(&self, kind: RecorderErrorKind);

    /// Called once the raw container is assembled and published.
    fn on_recording_finished(&self, artifact: &Artifact);

    fn on_conversion_progress(&self, ratio: f64);
}
