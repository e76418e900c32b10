use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::devices::DeviceHandles;
use crate::models::artifact::{Artifact, ArtifactKind, Blob};
use crate::models::config::RecorderConfiguration;
use crate::models::engine::ConversionSource;
use crate::models::error::{RecorderError, RecorderErrorKind};
use crate::models::state::{RecordingStatus, SessionSnapshot};
use crate::models::stream::MediaStream;
use crate::processing::capture_timer::CaptureTimer;
use crate::processing::stream_mixer::StreamMixer;
use crate::storage::artifact_slot::ArtifactSlot;
use crate::storage::filename::{download_name, filename_base};
use crate::traits::capture_engine::{CaptureEngine, CaptureEngineState, CaptureEvent, CaptureEventSink};
use crate::traits::clock::{Clock, SystemClock};
use crate::traits::delegate::RecorderDelegate;
use crate::traits::media_platform::{DisplayCaptureRequest, MediaPlatform};
use crate::traits::object_url::ObjectUrlRegistry;
use crate::transcode::pipeline::TranscodePipeline;

/// What a `convert_to_mp4` call did.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvertOutcome {
    /// No raw recording, or a conversion was already running.
    Skipped,
    Completed(Artifact),
    /// The raw recording is still available.
    Failed(RecorderError),
    /// The session was reset while converting; the result was dropped.
    Discarded,
}

type SharedDelegate = Arc<RwLock<Option<Arc<dyn RecorderDelegate>>>>;

/// Internal mutable session state, protected by `parking_lot::Mutex`.
struct SessionState {
    status: RecordingStatus,
    error_kind: Option<RecorderErrorKind>,
    /// Bumped on every start and reset. Engine events and track observers
    /// carry the generation they were registered under.
    generation: u64,
    acquiring: bool,
    devices: DeviceHandles,
    chunks: Vec<Vec<u8>>,
    container_type: String,
    filename_base: String,
    raw: ArtifactSlot,
    converted: ArtifactSlot,
    conversion_progress: Option<f64>,
    conversion_source: Option<ConversionSource>,
}

impl SessionState {
    fn new(urls: Arc<dyn ObjectUrlRegistry>, filename_prefix: &str) -> Self {
        Self {
            status: RecordingStatus::Idle,
            error_kind: None,
            generation: 0,
            acquiring: false,
            devices: DeviceHandles::default(),
            chunks: Vec::new(),
            container_type: ArtifactKind::Raw.content_type().to_string(),
            filename_base: filename_prefix.to_string(),
            raw: ArtifactSlot::new(ArtifactKind::Raw, Arc::clone(&urls)),
            converted: ArtifactSlot::new(ArtifactKind::Converted, urls),
            conversion_progress: None,
            conversion_source: None,
        }
    }

    fn clear_artifacts(&mut self) {
        self.chunks.clear();
        self.converted.clear();
        self.raw.clear();
        self.conversion_progress = None;
        self.conversion_source = None;
    }

    fn download_name(&self) -> String {
        let kind = if self.converted.is_empty() {
            ArtifactKind::Raw
        } else {
            ArtifactKind::Converted
        };
        download_name(&self.filename_base, kind)
    }
}

struct SessionInner {
    config: RecorderConfiguration,
    platform: Arc<dyn MediaPlatform>,
    mixer: StreamMixer,
    pipeline: Arc<TranscodePipeline>,
    clock: Arc<dyn Clock>,
    timer: CaptureTimer,
    state: Mutex<SessionState>,
    engine: Mutex<Option<Box<dyn CaptureEngine>>>,
    delegate: SharedDelegate,
}

/// Screen recording session controller.
///
/// Owns the capture devices, the capture timer and the chunk buffer, and
/// drives the status state machine from user requests and capture engine
/// events:
/// ```text
/// start_recording ─→ [display prompt] → [mic prompt] → mix → capture engine
///                                                            │ chunks
/// stop_recording ──→ engine.stop() ··· Stopped event → release devices → raw artifact
/// convert_to_mp4 ──→ TranscodePipeline → converted artifact
/// ```
///
/// Blocking calls (permission prompts, conversion) run on the caller's
/// thread; every other method stays responsive meanwhile.
pub struct RecordingSession {
    inner: Arc<SessionInner>,
}

impl RecordingSession {
    pub fn new(
        config: RecorderConfiguration,
        platform: Arc<dyn MediaPlatform>,
        pipeline: Arc<TranscodePipeline>,
        urls: Arc<dyn ObjectUrlRegistry>,
    ) -> Result<Self, RecorderError> {
        Self::with_clock(config, platform, pipeline, urls, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: RecorderConfiguration,
        platform: Arc<dyn MediaPlatform>,
        pipeline: Arc<TranscodePipeline>,
        urls: Arc<dyn ObjectUrlRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RecorderError> {
        config.validate().map_err(RecorderError::Configuration)?;

        let delegate: SharedDelegate = Arc::new(RwLock::new(None));
        let tick_delegate = Arc::clone(&delegate);
        let timer = CaptureTimer::new(Arc::clone(&clock), config.timer_period).with_tick_callback(Arc::new(
            move |elapsed_ms| {
                let delegate = tick_delegate.read().clone();
                if let Some(delegate) = delegate {
                    delegate.on_elapsed_updated(elapsed_ms);
                }
            },
        ));

        let state = SessionState::new(urls, &config.filename_prefix);
        let inner = SessionInner {
            mixer: StreamMixer::new(Arc::clone(&platform)),
            config,
            platform,
            pipeline,
            clock,
            timer,
            state: Mutex::new(state),
            engine: Mutex::new(None),
            delegate,
        };

        Ok(Self { inner: Arc::new(inner) })
    }

    pub fn set_delegate(&self, delegate: Arc<dyn RecorderDelegate>) {
        *self.inner.delegate.write() = Some(delegate);
    }

    // --- Observable state ---

    pub fn status(&self) -> RecordingStatus {
        self.inner.state.lock().status
    }

    pub fn error_kind(&self) -> Option<RecorderErrorKind> {
        self.inner.state.lock().error_kind
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.inner.timer.sample()
    }

    pub fn conversion_progress(&self) -> Option<f64> {
        self.inner.state.lock().conversion_progress
    }

    pub fn conversion_source(&self) -> Option<ConversionSource> {
        self.inner.state.lock().conversion_source.clone()
    }

    pub fn raw_artifact(&self) -> Option<Artifact> {
        self.inner.state.lock().raw.artifact()
    }

    pub fn converted_artifact(&self) -> Option<Artifact> {
        self.inner.state.lock().converted.artifact()
    }

    /// The converted artifact if there is one, else the raw one.
    pub fn downloadable_artifact(&self) -> Option<Artifact> {
        let s = self.inner.state.lock();
        s.converted.artifact().or_else(|| s.raw.artifact())
    }

    pub fn download_url(&self) -> Option<String> {
        let s = self.inner.state.lock();
        s.converted.url().or_else(|| s.raw.url()).map(str::to_owned)
    }

    pub fn download_name(&self) -> String {
        self.inner.state.lock().download_name()
    }

    pub fn is_recording(&self) -> bool {
        self.status() == RecordingStatus::Recording
    }

    pub fn is_paused(&self) -> bool {
        self.status() == RecordingStatus::Paused
    }

    pub fn is_converting(&self) -> bool {
        self.status() == RecordingStatus::Converting
    }

    pub fn is_ready(&self) -> bool {
        self.status() == RecordingStatus::Ready
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let elapsed_ms = self.inner.timer.sample();
        let s = self.inner.state.lock();
        let raw_url = s.raw.url().map(str::to_owned);
        let converted_url = s.converted.url().map(str::to_owned);
        SessionSnapshot {
            status: s.status,
            error_kind: s.error_kind,
            elapsed_ms,
            conversion_progress: s.conversion_progress,
            conversion_source: s.conversion_source.clone(),
            download_url: converted_url.clone().or_else(|| raw_url.clone()),
            download_name: s.download_name(),
            raw_url,
            converted_url,
        }
    }

    // --- Commands ---

    /// Begin a new recording. Ignored while recording, paused, converting or
    /// already acquiring devices. Blocks on the permission prompts.
    pub fn start_recording(&self) {
        let inner = &self.inner;
        let generation = {
            let mut s = inner.state.lock();
            if !s.status.can_start() || s.acquiring {
                log::debug!("start ignored while {}", s.status);
                return;
            }

            s.clear_artifacts();
            if !inner.platform.capabilities().is_supported() {
                s.status = RecordingStatus::Error;
                s.error_kind = Some(RecorderErrorKind::Unsupported);
                drop(s);
                log::warn!("screen capture is not supported on this platform");
                inner.publish_error(RecorderErrorKind::Unsupported);
                return;
            }

            s.error_kind = None;
            s.filename_base = filename_base(&inner.config.filename_prefix, inner.clock.local_time());
            s.generation += 1;
            s.acquiring = true;
            s.generation
        };

        let outcome = inner.begin_capture(generation);

        let mut s = inner.state.lock();
        s.acquiring = false;
        if let Err(e) = outcome {
            if s.generation != generation {
                return;
            }
            let kind = e.kind();
            s.status = RecordingStatus::Error;
            s.error_kind = Some(kind);
            drop(s);
            log::error!("failed to start recording: {}", e);
            inner.publish_error(kind);
        }
    }

    /// Pause capture. Only acts while the capture engine is recording.
    pub fn pause_recording(&self) {
        let paused = self
            .inner
            .with_engine(|engine| {
                let recording = engine.state() == CaptureEngineState::Recording;
                if recording {
                    engine.pause();
                }
                recording
            })
            .unwrap_or(false);
        if paused {
            self.inner.timer.pause();
        }
    }

    /// Resume capture. Only acts while the capture engine is paused.
    pub fn resume_recording(&self) {
        let resumed = self
            .inner
            .with_engine(|engine| {
                let paused = engine.state() == CaptureEngineState::Paused;
                if paused {
                    engine.resume();
                }
                paused
            })
            .unwrap_or(false);
        if resumed {
            self.inner.timer.resume();
        }
    }

    /// Request a stop. The session reaches `ready` once the engine reports
    /// that capture has fully stopped.
    pub fn stop_recording(&self) {
        self.inner.request_stop();
    }

    /// Transcode the raw recording. No-op without a raw recording or while a
    /// conversion is already running. Blocks until the conversion settles.
    pub fn convert_to_mp4(&self) -> ConvertOutcome {
        let inner = &self.inner;
        let (generation, source) = {
            let mut s = inner.state.lock();
            let Some(source) = s.raw.blob().cloned() else {
                return ConvertOutcome::Skipped;
            };
            if s.status == RecordingStatus::Converting {
                return ConvertOutcome::Skipped;
            }
            s.status = RecordingStatus::Converting;
            s.error_kind = None;
            s.conversion_progress = Some(0.0);
            (s.generation, source)
        };
        inner.publish_status(RecordingStatus::Converting);

        let delegate = inner.delegate();
        let result = inner.pipeline.convert(&source, |ratio| {
            {
                let mut s = inner.state.lock();
                if s.generation == generation {
                    s.conversion_progress = Some(ratio);
                }
            }
            if let Some(ref delegate) = delegate {
                delegate.on_conversion_progress(ratio);
            }
        });

        let mut s = inner.state.lock();
        if s.generation != generation {
            log::info!("session reset during conversion, discarding result");
            return ConvertOutcome::Discarded;
        }
        s.conversion_progress = None;
        s.status = RecordingStatus::Ready;

        match result {
            Ok(converted) => {
                let name = download_name(&s.filename_base, ArtifactKind::Converted);
                let artifact = s.converted.publish(converted.blob, name);
                s.conversion_source = Some(ConversionSource {
                    engine: converted.engine,
                    core_mode: converted.mode,
                });
                drop(s);
                inner.publish_status(RecordingStatus::Ready);
                ConvertOutcome::Completed(artifact)
            }
            Err(e) => {
                s.error_kind = Some(RecorderErrorKind::ConversionFailed);
                drop(s);
                log::error!("conversion failed, raw recording kept: {}", e);
                inner.publish_status(RecordingStatus::Ready);
                inner.publish_error(RecorderErrorKind::ConversionFailed);
                ConvertOutcome::Failed(RecorderError::Conversion(e))
            }
        }
    }

    /// Return to `idle` from any state, releasing devices and artifacts.
    ///
    /// A conversion in flight runs to completion but its result is dropped.
    pub fn reset_recording(&self) {
        let inner = &self.inner;
        let devices = {
            let mut s = inner.state.lock();
            s.generation += 1;
            s.clear_artifacts();
            s.error_kind = None;
            s.status = RecordingStatus::Idle;
            std::mem::take(&mut s.devices)
        };

        // Events from this engine now carry a stale generation and are ignored.
        let engine = inner.engine.lock().take();
        if let Some(mut engine) = engine {
            if engine.state() != CaptureEngineState::Inactive {
                engine.stop();
            }
        }

        inner.timer.reset();
        drop(devices);
        log::info!("recording session reset");
        inner.publish_status(RecordingStatus::Idle);
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.reset_recording();
    }
}

impl SessionInner {
    fn delegate(&self) -> Option<Arc<dyn RecorderDelegate>> {
        self.delegate.read().clone()
    }

    fn publish_status(&self, status: RecordingStatus) {
        log::info!("recording status → {}", status);
        if let Some(delegate) = self.delegate() {
            delegate.on_status_changed(status);
        }
    }

    fn publish_error(&self, kind: RecorderErrorKind) {
        if let Some(delegate) = self.delegate() {
            if kind != RecorderErrorKind::ConversionFailed {
                delegate.on_status_changed(RecordingStatus::Error);
            }
            delegate.on_error(kind);
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.lock().generation == generation
    }

    /// Acquire devices, build the capture engine and start it.
    fn begin_capture(self: &Arc<Self>, generation: u64) -> Result<(), RecorderError> {
        let mut devices = DeviceHandles::default();
        let mixed = self.acquire(&mut devices)?;

        if !self.is_current(generation) {
            log::info!("session reset during device acquisition, releasing devices");
            return Ok(());
        }

        let mime = self
            .config
            .select_container_encoding(|m| self.platform.is_encoding_supported(m))
            .map(str::to_owned);
        match mime {
            Some(ref m) => log::info!("recording with container encoding {}", m),
            None => log::warn!("no preferred container encoding is supported, using the engine default"),
        }

        let display_video = devices
            .display
            .as_ref()
            .map(MediaStream::video_tracks)
            .unwrap_or_default();

        let mut engine = self.platform.create_capture_engine(mixed, mime.as_deref())?;
        let container_type = engine
            .mime_type()
            .or(mime)
            .map(|m| m.split(';').next().unwrap_or_default().trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| ArtifactKind::Raw.content_type().to_string());

        {
            let mut s = self.state.lock();
            if s.generation != generation {
                return Ok(());
            }
            s.devices = devices;
            s.chunks.clear();
            s.container_type = container_type;
            s.status = RecordingStatus::Recording;
        }
        self.timer.start();
        self.publish_status(RecordingStatus::Recording);

        if let Err(e) = engine.start(self.config.flush_interval, self.event_sink(generation)) {
            self.abort_capture(generation);
            return Err(e);
        }
        {
            let mut slot = self.engine.lock();
            if !self.is_current(generation) {
                drop(slot);
                engine.stop();
                return Ok(());
            }
            *slot = Some(engine);
        }

        for track in display_video {
            let weak: Weak<SessionInner> = Arc::downgrade(self);
            track.on_ended(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_track_ended(generation);
                }
            }));
        }

        Ok(())
    }

    /// Both permission prompts, then the mixer. Whatever was acquired is
    /// recorded in `devices` so a failure part-way releases it.
    fn acquire(&self, devices: &mut DeviceHandles) -> Result<MediaStream, RecorderError> {
        let request = DisplayCaptureRequest {
            video: true,
            audio: self.config.capture_display_audio,
        };
        let display = self.platform.request_display_media(&request)?;
        devices.display = Some(display.clone());

        let microphone = self.platform.request_microphone()?;
        devices.microphone = Some(microphone.clone());

        let mixed = self.mixer.mix(&display, &microphone)?;
        devices.audio_context = mixed.audio_context;
        devices.mixed = Some(mixed.stream.clone());
        Ok(mixed.stream)
    }

    fn abort_capture(&self, generation: u64) {
        let devices = {
            let mut s = self.state.lock();
            if s.generation != generation {
                return;
            }
            std::mem::take(&mut s.devices)
        };
        self.timer.stop();
        drop(devices);
    }

    fn event_sink(self: &Arc<Self>, generation: u64) -> CaptureEventSink {
        let weak: Weak<SessionInner> = Arc::downgrade(self);
        Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_capture_event(generation, event);
            }
        })
    }

    fn handle_capture_event(&self, generation: u64, event: CaptureEvent) {
        match event {
            CaptureEvent::Chunk(data) => {
                if data.is_empty() {
                    return;
                }
                let mut s = self.state.lock();
                if s.generation == generation && s.status.is_capturing() {
                    s.chunks.push(data);
                }
            }
            CaptureEvent::Paused => {
                self.transition(generation, RecordingStatus::Recording, RecordingStatus::Paused);
            }
            CaptureEvent::Resumed => {
                self.transition(generation, RecordingStatus::Paused, RecordingStatus::Recording);
            }
            CaptureEvent::Stopped => self.finalize_recording(generation),
            CaptureEvent::Errored(message) => self.fail_capture(generation, &message),
        }
    }

    fn transition(&self, generation: u64, from: RecordingStatus, to: RecordingStatus) {
        {
            let mut s = self.state.lock();
            if s.generation != generation || s.status != from {
                return;
            }
            s.status = to;
        }
        self.publish_status(to);
    }

    /// Capture has fully stopped: release devices first, then assemble the
    /// flushed chunks into the raw artifact.
    fn finalize_recording(&self, generation: u64) {
        let (devices, chunks) = {
            let mut s = self.state.lock();
            if s.generation != generation || !s.status.is_capturing() {
                log::debug!("ignoring stop event from a previous recording");
                return;
            }
            (std::mem::take(&mut s.devices), std::mem::take(&mut s.chunks))
        };
        self.timer.stop();
        drop(devices);

        let artifact = {
            let mut s = self.state.lock();
            if s.generation != generation {
                return;
            }
            if chunks.is_empty() {
                log::warn!("recording stopped before any data was flushed");
            }
            let blob = Blob::from_chunks(&chunks, s.container_type.clone());
            let name = download_name(&s.filename_base, ArtifactKind::Raw);
            let artifact = s.raw.publish(blob, name);
            s.status = RecordingStatus::Ready;
            artifact
        };

        log::info!(
            "recording finished: {} chunk(s), {} bytes, {} ms",
            chunks.len(),
            artifact.blob.len(),
            self.timer.elapsed_ms()
        );
        self.publish_status(RecordingStatus::Ready);
        if let Some(delegate) = self.delegate() {
            delegate.on_recording_finished(&artifact);
        }
    }

    fn fail_capture(&self, generation: u64, message: &str) {
        let devices = {
            let mut s = self.state.lock();
            if s.generation != generation || !s.status.is_capturing() {
                return;
            }
            s.status = RecordingStatus::Error;
            s.error_kind = Some(RecorderErrorKind::StartFailed);
            s.chunks.clear();
            std::mem::take(&mut s.devices)
        };
        log::error!("capture engine error: {}", message);
        self.timer.stop();
        drop(devices);
        self.publish_error(RecorderErrorKind::StartFailed);
    }

    fn handle_track_ended(&self, generation: u64) {
        if !self.is_current(generation) {
            return;
        }
        log::info!("display capture ended externally, stopping recording");
        self.request_stop();
    }

    fn request_stop(&self) {
        self.with_engine(|engine| {
            if engine.state() != CaptureEngineState::Inactive {
                engine.stop();
            }
        });
    }

    /// Run `f` on the current capture engine with the slot unlocked. Engines
    /// may emit events synchronously, and those reach the delegate, which is
    /// free to call back into the session.
    ///
    /// The engine goes back into the slot only if no reset or new recording
    /// replaced it meanwhile; otherwise it is stopped and dropped.
    fn with_engine<R>(&self, f: impl FnOnce(&mut dyn CaptureEngine) -> R) -> Option<R> {
        let generation = self.state.lock().generation;
        let mut engine = self.engine.lock().take()?;
        let result = f(&mut *engine);

        let mut slot = self.engine.lock();
        if slot.is_none() && self.is_current(generation) {
            *slot = Some(engine);
        } else {
            drop(slot);
            if engine.state() != CaptureEngineState::Inactive {
                engine.stop();
            }
        }
        Some(result)
    }
}
