use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::engine::EngineMode;
use super::error::RecorderError;
use crate::traits::codec_engine::AssetKind;

/// Container encodings in order of preference. The first one the platform
/// supports is used; if none is, the capture engine picks its own default.
pub const DEFAULT_MIME_PREFERENCES: [&str; 5] = [
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm;codecs=vp9",
    "video/webm;codecs=vp8",
    "video/webm",
];

/// Configuration for a recording session.
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderConfiguration {
    /// Ordered container encoding preferences.
    pub mime_preferences: Vec<String>,

    /// How often the capture engine flushes a data chunk (default: 1000 ms).
    pub flush_interval: Duration,

    /// Capture timer recompute period (default: 250 ms).
    pub timer_period: Duration,

    /// Ask for the display's own audio alongside its video (default: true).
    pub capture_display_audio: bool,

    /// Leading part of the download filename (default: "recording").
    pub filename_prefix: String,
}

impl RecorderConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.flush_interval.is_zero() {
            return Err("flush interval must be positive".into());
        }
        if self.timer_period.is_zero() {
            return Err("timer period must be positive".into());
        }
        if self.filename_prefix.is_empty() {
            return Err("filename prefix must not be empty".into());
        }
        if self.filename_prefix.contains(['/', '\\']) {
            return Err(format!("filename prefix contains a path separator: {}", self.filename_prefix));
        }
        Ok(())
    }

    /// First preferred encoding the platform reports as supported.
    pub fn select_container_encoding(&self, is_supported: impl Fn(&str) -> bool) -> Option<&str> {
        self.mime_preferences
            .iter()
            .map(String::as_str)
            .find(|mime| is_supported(mime))
    }
}

impl Default for RecorderConfiguration {
    fn default() -> Self {
        Self {
            mime_preferences: DEFAULT_MIME_PREFERENCES.iter().map(|m| m.to_string()).collect(),
            flush_interval: Duration::from_millis(1000),
            timer_period: Duration::from_millis(250),
            capture_display_audio: true,
            filename_prefix: "recording".into(),
        }
    }
}

/// Configuration for codec engine resolution and the transcode argument profile.
///
/// Deserializable from JSON; every field is optional and falls back to its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TranscodeConfiguration {
    /// Base path the engine builds are served under (default: "/").
    pub asset_base: String,

    /// Sub-path of the single-threaded build (default: "ffmpeg/core").
    pub single_threaded_path: String,

    /// Sub-path of the multi-threaded build (default: "ffmpeg/core-mt").
    pub multi_threaded_path: String,

    pub script_file: String,
    pub payload_file: String,
    pub worker_file: String,

    /// Whether the host can give the engine shared-memory parallelism.
    /// Decides which build is attempted first.
    pub cross_origin_isolated: bool,

    pub video_codec: String,
    pub audio_codec: String,
    pub movflags: String,

    /// Engine label recorded with each conversion.
    pub engine_label: String,
}

impl TranscodeConfiguration {
    pub fn from_json(json: &str) -> Result<Self, RecorderError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RecorderError::Configuration(format!("invalid transcode configuration: {}", e)))?;
        config.validate().map_err(RecorderError::Configuration)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("scriptFile", &self.script_file),
            ("payloadFile", &self.payload_file),
            ("workerFile", &self.worker_file),
            ("videoCodec", &self.video_codec),
            ("audioCodec", &self.audio_codec),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(format!("{} must not be empty", name));
            }
        }
        Ok(())
    }

    /// Asset base, always ending in `/`.
    pub fn asset_base_url(&self) -> String {
        if self.asset_base.ends_with('/') {
            self.asset_base.clone()
        } else {
            format!("{}/", self.asset_base)
        }
    }

    /// Directory path of one engine build.
    pub fn build_base(&self, mode: EngineMode) -> String {
        let sub_path = match mode {
            EngineMode::Single => &self.single_threaded_path,
            EngineMode::Multi => &self.multi_threaded_path,
        };
        format!("{}{}", self.asset_base_url(), sub_path.trim_matches('/'))
    }

    /// Full path of one asset of one build.
    pub fn asset_path(&self, mode: EngineMode, kind: AssetKind) -> String {
        let file = match kind {
            AssetKind::Script => &self.script_file,
            AssetKind::Payload => &self.payload_file,
            AssetKind::Worker => &self.worker_file,
        };
        format!("{}/{}", self.build_base(mode), file)
    }

    /// Assets a build needs, in load order.
    pub fn required_assets(&self, mode: EngineMode) -> Vec<AssetKind> {
        let mut kinds = vec![AssetKind::Script, AssetKind::Payload];
        if mode.needs_worker() {
            kinds.push(AssetKind::Worker);
        }
        kinds
    }

    /// Build preference: multi-threaded first only in an isolated host.
    pub fn preferred_mode(&self) -> EngineMode {
        if self.cross_origin_isolated {
            EngineMode::Multi
        } else {
            EngineMode::Single
        }
    }

    /// The fixed transcode argument profile: re-encode video and audio with
    /// widely compatible codecs and move container metadata to the front.
    pub fn transcode_args(&self, input: &str, output: &str) -> Vec<String> {
        let mut args = vec![
            "-i".to_string(),
            input.to_string(),
            "-c:v".to_string(),
            self.video_codec.clone(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
        ];
        if !self.movflags.is_empty() {
            args.push("-movflags".to_string());
            args.push(self.movflags.clone());
        }
        args.push(output.to_string());
        args
    }
}

impl Default for TranscodeConfiguration {
    fn default() -> Self {
        Self {
            asset_base: "/".into(),
            single_threaded_path: "ffmpeg/core".into(),
            multi_threaded_path: "ffmpeg/core-mt".into(),
            script_file: "ffmpeg-core.js".into(),
            payload_file: "ffmpeg-core.wasm".into(),
            worker_file: "ffmpeg-core.worker.js".into(),
            cross_origin_isolated: false,
            video_codec: "libx264".into(),
            audio_codec: "aac".into(),
            movflags: "faststart".into(),
            engine_label: "ffmpeg-wasm".into(),
        }
    }
}
