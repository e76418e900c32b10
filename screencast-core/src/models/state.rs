use serde::{Deserialize, Serialize};

use super::engine::ConversionSource;
use super::error::RecorderErrorKind;

/// Recording session state machine.
///
/// State transitions:
/// ```text
/// idle/ready/error → recording ↔ paused
///                        ↓         ↓
///                   (engine stopped) → ready → converting → ready
///
/// any acquisition or engine failure → error
/// reset from anywhere → idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    #[default]
    Idle,
    Recording,
    Paused,
    Converting,
    Ready,
    Error,
}

impl RecordingStatus {
    /// Whether a new recording may begin from this status.
    pub fn can_start(self) -> bool {
        matches!(self, Self::Idle | Self::Ready | Self::Error)
    }

    /// Whether capture devices are held in this status.
    pub fn is_capturing(self) -> bool {
        matches!(self, Self::Recording | Self::Paused)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Converting => "converting",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a UI layer reads from a session, captured at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: RecordingStatus,
    pub error_kind: Option<RecorderErrorKind>,
    pub elapsed_ms: u64,
    pub conversion_progress: Option<f64>,
    pub conversion_source: Option<ConversionSource>,
    pub raw_url: Option<String>,
    pub converted_url: Option<String>,
    pub download_url: Option<String>,
    pub download_name: String,
}

impl SessionSnapshot {
    pub fn is_recording(&self) -> bool {
        self.status == RecordingStatus::Recording
    }

    pub fn is_paused(&self) -> bool {
        self.status == RecordingStatus::Paused
    }

    pub fn is_converting(&self) -> bool {
        self.status == RecordingStatus::Converting
    }

    pub fn is_ready(&self) -> bool {
        self.status == RecordingStatus::Ready
    }

    pub fn has_raw(&self) -> bool {
        self.raw_url.is_some()
    }

    pub fn has_converted(&self) -> bool {
        self.converted_url.is_some()
    }
}
