//! In-crate fakes for the platform, capture engine and codec engine seams.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, TimeZone};
use parking_lot::{Condvar, Mutex};

use crate::models::artifact::{Artifact, Blob};
use crate::models::config::TranscodeConfiguration;
use crate::models::engine::EngineMode;
use crate::models::error::{EngineError, RecorderError, RecorderErrorKind};
use crate::models::state::RecordingStatus;
use crate::models::stream::MediaStream;
use crate::traits::capture_engine::{CaptureEngine, CaptureEngineState, CaptureEvent, CaptureEventSink};
use crate::traits::clock::Clock;
use crate::traits::codec_engine::{AssetSource, CodecEngine, CodecEngineFactory, EngineAssets, LoadableAsset};
use crate::traits::delegate::RecorderDelegate;
use crate::traits::media_platform::{
    AudioMixContext, DisplayCaptureRequest, MediaPlatform, MediaTrack, PlatformCapabilities, TrackEndedCallback,
    TrackKind,
};

// --- Clock ---

/// Clock that only moves when told to.
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        })
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }

    fn local_time(&self) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap()
    }
}

// --- Tracks and audio contexts ---

pub struct FakeTrack {
    id: String,
    kind: TrackKind,
    stopped: Mutex<bool>,
    on_ended: Mutex<Option<TrackEndedCallback>>,
}

impl FakeTrack {
    pub fn new(id: &str, kind: TrackKind) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            kind,
            stopped: Mutex::new(false),
            on_ended: Mutex::new(None),
        })
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock()
    }

    pub fn has_ended_observer(&self) -> bool {
        self.on_ended.lock().is_some()
    }

    /// Simulate the user ending the share from outside the session.
    pub fn end(&self) {
        *self.stopped.lock() = true;
        let callback = self.on_ended.lock().take();
        if let Some(callback) = callback {
            callback();
        }
    }
}

impl MediaTrack for FakeTrack {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn stop(&self) {
        *self.stopped.lock() = true;
    }

    fn on_ended(&self, callback: TrackEndedCallback) {
        *self.on_ended.lock() = Some(callback);
    }
}

#[derive(Default)]
struct AudioContextState {
    resumed: bool,
    connected: usize,
    closed: bool,
    fail_resume: bool,
}

/// Observer side of a `FakeAudioContext`.
#[derive(Clone)]
pub struct AudioContextHandle(Arc<Mutex<AudioContextState>>);

impl AudioContextHandle {
    pub fn was_resumed(&self) -> bool {
        self.0.lock().resumed
    }

    pub fn connected_sources(&self) -> usize {
        self.0.lock().connected
    }

    pub fn is_closed(&self) -> bool {
        self.0.lock().closed
    }
}

struct FakeAudioContext(Arc<Mutex<AudioContextState>>);

impl AudioMixContext for FakeAudioContext {
    fn resume(&mut self) -> Result<(), RecorderError> {
        let mut s = self.0.lock();
        if s.fail_resume {
            return Err(RecorderError::AudioMixing("context could not be resumed".into()));
        }
        s.resumed = true;
        Ok(())
    }

    fn create_destination(&mut self) -> Result<Arc<dyn MediaTrack>, RecorderError> {
        Ok(FakeTrack::new("mix-destination", TrackKind::Audio))
    }

    fn connect_source(&mut self, _stream: &MediaStream) -> Result<(), RecorderError> {
        self.0.lock().connected += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.0.lock().closed = true;
    }
}

// --- Capture engine ---

struct CaptureEngineShared {
    state: CaptureEngineState,
    sink: Option<CaptureEventSink>,
    mime_type: Option<String>,
    flush_interval: Option<Duration>,
    fail_start: bool,
    defer_stop: bool,
}

/// Drives a `FakeCaptureEngine` from the test side.
#[derive(Clone)]
pub struct CaptureEngineHandle(Arc<Mutex<CaptureEngineShared>>);

impl CaptureEngineHandle {
    pub fn state(&self) -> CaptureEngineState {
        self.0.lock().state
    }

    pub fn mime_type(&self) -> Option<String> {
        self.0.lock().mime_type.clone()
    }

    pub fn flush_interval(&self) -> Option<Duration> {
        self.0.lock().flush_interval
    }

    pub fn emit_chunk(&self, data: &[u8]) {
        self.emit(CaptureEvent::Chunk(data.to_vec()));
    }

    /// Report a runtime engine failure.
    pub fn fail(&self, message: &str) {
        self.0.lock().state = CaptureEngineState::Inactive;
        self.emit(CaptureEvent::Errored(message.to_string()));
    }

    /// Deliver the `Stopped` event held back by a deferred stop.
    pub fn complete_stop(&self) {
        self.emit(CaptureEvent::Stopped);
    }

    fn emit(&self, event: CaptureEvent) {
        let sink = self.0.lock().sink.clone();
        if let Some(sink) = sink {
            sink(event);
        }
    }
}

struct FakeCaptureEngine(CaptureEngineHandle);

impl FakeCaptureEngine {
    fn transition(&mut self, from: CaptureEngineState, to: CaptureEngineState, event: CaptureEvent) {
        {
            let mut s = (self.0).0.lock();
            if s.state != from {
                return;
            }
            s.state = to;
        }
        self.0.emit(event);
    }
}

impl CaptureEngine for FakeCaptureEngine {
    fn state(&self) -> CaptureEngineState {
        self.0.state()
    }

    fn mime_type(&self) -> Option<String> {
        self.0.mime_type()
    }

    fn start(&mut self, flush_interval: Duration, events: CaptureEventSink) -> Result<(), RecorderError> {
        let mut s = (self.0).0.lock();
        if s.fail_start {
            return Err(RecorderError::CaptureEngine("encoder refused to start".into()));
        }
        s.state = CaptureEngineState::Recording;
        s.flush_interval = Some(flush_interval);
        s.sink = Some(events);
        Ok(())
    }

    fn pause(&mut self) {
        self.transition(CaptureEngineState::Recording, CaptureEngineState::Paused, CaptureEvent::Paused);
    }

    fn resume(&mut self) {
        self.transition(CaptureEngineState::Paused, CaptureEngineState::Recording, CaptureEvent::Resumed);
    }

    fn stop(&mut self) {
        let deferred = {
            let mut s = (self.0).0.lock();
            if s.state == CaptureEngineState::Inactive {
                return;
            }
            s.state = CaptureEngineState::Inactive;
            s.defer_stop
        };
        if !deferred {
            self.0.emit(CaptureEvent::Stopped);
        }
    }
}

// --- Platform ---

struct PlatformState {
    capabilities: PlatformCapabilities,
    deny_display: bool,
    deny_microphone: bool,
    system_audio: bool,
    fail_audio_resume: bool,
    fail_engine_start: bool,
    defer_stop: bool,
    supported_mimes: Vec<String>,
    display_requests: Vec<DisplayCaptureRequest>,
    microphone_requests: usize,
    display_tracks: Vec<Arc<FakeTrack>>,
    microphone_tracks: Vec<Arc<FakeTrack>>,
    audio_contexts: Vec<AudioContextHandle>,
    engines: Vec<CaptureEngineHandle>,
}

/// Scriptable `MediaPlatform`. Each display prompt yields a fresh `screen`
/// video track plus a `system` audio track when audio is requested.
pub struct FakePlatform {
    state: Mutex<PlatformState>,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PlatformState {
                capabilities: PlatformCapabilities {
                    display_capture: true,
                    capture_engine: true,
                },
                deny_display: false,
                deny_microphone: false,
                system_audio: true,
                fail_audio_resume: false,
                fail_engine_start: false,
                defer_stop: false,
                supported_mimes: vec!["video/webm;codecs=vp9,opus".into(), "video/webm".into()],
                display_requests: Vec::new(),
                microphone_requests: 0,
                display_tracks: Vec::new(),
                microphone_tracks: Vec::new(),
                audio_contexts: Vec::new(),
                engines: Vec::new(),
            }),
        })
    }

    pub fn set_capabilities(&self, capabilities: PlatformCapabilities) {
        self.state.lock().capabilities = capabilities;
    }

    pub fn deny_display(&self) {
        self.state.lock().deny_display = true;
    }

    pub fn grant_display(&self) {
        self.state.lock().deny_display = false;
    }

    pub fn deny_microphone(&self) {
        self.state.lock().deny_microphone = true;
    }

    pub fn without_system_audio(&self) {
        self.state.lock().system_audio = false;
    }

    pub fn fail_audio_resume(&self) {
        self.state.lock().fail_audio_resume = true;
    }

    pub fn fail_engine_start(&self) {
        self.state.lock().fail_engine_start = true;
    }

    /// Engines created from now on report `Stopped` only on `complete_stop`.
    pub fn defer_engine_stop(&self) {
        self.state.lock().defer_stop = true;
    }

    pub fn set_supported_mimes(&self, mimes: &[&str]) {
        self.state.lock().supported_mimes = mimes.iter().map(|m| m.to_string()).collect();
    }

    pub fn display_requests(&self) -> Vec<DisplayCaptureRequest> {
        self.state.lock().display_requests.clone()
    }

    pub fn microphone_requests(&self) -> usize {
        self.state.lock().microphone_requests
    }

    pub fn display_tracks(&self) -> Vec<Arc<FakeTrack>> {
        self.state.lock().display_tracks.clone()
    }

    pub fn microphone_tracks(&self) -> Vec<Arc<FakeTrack>> {
        self.state.lock().microphone_tracks.clone()
    }

    pub fn audio_contexts_created(&self) -> usize {
        self.state.lock().audio_contexts.len()
    }

    pub fn last_audio_context(&self) -> Option<AudioContextHandle> {
        self.state.lock().audio_contexts.last().cloned()
    }

    pub fn engines_created(&self) -> usize {
        self.state.lock().engines.len()
    }

    pub fn last_engine(&self) -> Option<CaptureEngineHandle> {
        self.state.lock().engines.last().cloned()
    }
}

impl MediaPlatform for FakePlatform {
    fn capabilities(&self) -> PlatformCapabilities {
        self.state.lock().capabilities
    }

    fn request_display_media(&self, request: &DisplayCaptureRequest) -> Result<MediaStream, RecorderError> {
        let mut s = self.state.lock();
        s.display_requests.push(*request);
        if s.deny_display {
            return Err(RecorderError::PermissionDenied("display capture dismissed".into()));
        }
        let mut tracks = vec![FakeTrack::new("screen", TrackKind::Video)];
        if request.audio && s.system_audio {
            tracks.push(FakeTrack::new("system", TrackKind::Audio));
        }
        s.display_tracks.extend(tracks.iter().cloned());
        Ok(MediaStream::from_tracks(
            tracks.into_iter().map(|t| t as Arc<dyn MediaTrack>).collect(),
        ))
    }

    fn request_microphone(&self) -> Result<MediaStream, RecorderError> {
        let mut s = self.state.lock();
        s.microphone_requests += 1;
        if s.deny_microphone {
            return Err(RecorderError::PermissionDenied("microphone blocked".into()));
        }
        let track = FakeTrack::new("mic", TrackKind::Audio);
        s.microphone_tracks.push(Arc::clone(&track));
        Ok(MediaStream::from_tracks(vec![track as Arc<dyn MediaTrack>]))
    }

    fn create_audio_context(&self) -> Result<Box<dyn AudioMixContext>, RecorderError> {
        let mut s = self.state.lock();
        let shared = Arc::new(Mutex::new(AudioContextState {
            fail_resume: s.fail_audio_resume,
            ..Default::default()
        }));
        s.audio_contexts.push(AudioContextHandle(Arc::clone(&shared)));
        Ok(Box::new(FakeAudioContext(shared)))
    }

    fn is_encoding_supported(&self, mime_type: &str) -> bool {
        self.state.lock().supported_mimes.iter().any(|m| m == mime_type)
    }

    fn create_capture_engine(
        &self,
        _stream: MediaStream,
        mime_type: Option<&str>,
    ) -> Result<Box<dyn CaptureEngine>, RecorderError> {
        let mut s = self.state.lock();
        let handle = CaptureEngineHandle(Arc::new(Mutex::new(CaptureEngineShared {
            state: CaptureEngineState::Inactive,
            sink: None,
            mime_type: mime_type.map(str::to_owned),
            flush_interval: None,
            fail_start: s.fail_engine_start,
            defer_stop: s.defer_stop,
        })));
        s.engines.push(handle.clone());
        Ok(Box::new(FakeCaptureEngine(handle)))
    }
}

// --- Codec engine assets ---

/// In-memory asset tree keyed by asset path.
pub struct FakeAssetSource {
    files: Mutex<HashMap<String, Vec<u8>>>,
    fetched: Mutex<Vec<String>>,
}

impl FakeAssetSource {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            files: Mutex::new(HashMap::new()),
            fetched: Mutex::new(Vec::new()),
        })
    }

    pub fn with_all_builds() -> Arc<Self> {
        let source = Self::empty();
        source.stage_build(EngineMode::Single);
        source.stage_build(EngineMode::Multi);
        source
    }

    /// Place every asset of `mode` at its default path.
    pub fn stage_build(&self, mode: EngineMode) {
        let config = TranscodeConfiguration::default();
        let mut files = self.files.lock();
        for kind in config.required_assets(mode) {
            let path = config.asset_path(mode, kind);
            files.insert(path.clone(), path.into_bytes());
        }
    }

    pub fn remove(&self, path: &str) {
        self.files.lock().remove(path);
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }
}

impl AssetSource for FakeAssetSource {
    fn exists(&self, path: &str) -> bool {
        self.files.lock().contains_key(path)
    }

    fn fetch(&self, path: &str, content_type: &str) -> Result<LoadableAsset, EngineError> {
        let data = self
            .files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| EngineError::AssetMissing(path.to_string()))?;
        self.fetched.lock().push(path.to_string());
        Ok(LoadableAsset {
            path: path.to_string(),
            blob: Blob::new(data, content_type),
        })
    }
}

// --- Codec engine ---

#[derive(Default)]
struct GateState {
    entered: bool,
    released: bool,
}

/// Holds `exec` inside the engine until released.
pub struct ExecGate {
    state: Mutex<GateState>,
    signal: Condvar,
}

impl ExecGate {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(GateState::default()),
            signal: Condvar::new(),
        })
    }

    fn enter(&self) {
        let mut s = self.state.lock();
        s.entered = true;
        self.signal.notify_all();
        while !s.released {
            self.signal.wait(&mut s);
        }
    }

    pub fn wait_entered(&self) {
        let mut s = self.state.lock();
        while !s.entered {
            self.signal.wait(&mut s);
        }
    }

    pub fn release(&self) {
        self.state.lock().released = true;
        self.signal.notify_all();
    }
}

#[derive(Default)]
struct FactoryState {
    initialized: Vec<EngineMode>,
    failing_modes: HashSet<EngineMode>,
    init_delay: Option<Duration>,
    exec_failure: Option<String>,
    write_failure: Option<String>,
    progress_script: Vec<f64>,
    gate: Option<Arc<ExecGate>>,
    last_exec_args: Option<Vec<String>>,
    exec_count: usize,
    namespace: HashMap<String, Vec<u8>>,
}

/// Engine factory whose engines "transcode" by prefixing the input with
/// `mp4:`. All engines share one virtual namespace for inspection.
pub struct FakeCodecFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl FakeCodecFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(Mutex::new(FactoryState::default())),
        })
    }

    pub fn fail_init(&self, mode: EngineMode) {
        self.state.lock().failing_modes.insert(mode);
    }

    pub fn set_init_delay(&self, delay: Duration) {
        self.state.lock().init_delay = Some(delay);
    }

    pub fn fail_exec(&self, message: &str) {
        self.state.lock().exec_failure = Some(message.to_string());
    }

    /// `write_file` stores a truncated copy, then fails.
    pub fn fail_write(&self, message: &str) {
        self.state.lock().write_failure = Some(message.to_string());
    }

    /// Raw ratios reported during every `exec`.
    pub fn set_progress_script(&self, ratios: Vec<f64>) {
        self.state.lock().progress_script = ratios;
    }

    pub fn gate_exec(&self) -> Arc<ExecGate> {
        let gate = ExecGate::new();
        self.state.lock().gate = Some(Arc::clone(&gate));
        gate
    }

    pub fn initialized_modes(&self) -> Vec<EngineMode> {
        self.state.lock().initialized.clone()
    }

    pub fn init_count(&self) -> usize {
        self.state.lock().initialized.len()
    }

    pub fn last_exec_args(&self) -> Option<Vec<String>> {
        self.state.lock().last_exec_args.clone()
    }

    pub fn exec_count(&self) -> usize {
        self.state.lock().exec_count
    }

    pub fn namespace_len(&self) -> usize {
        self.state.lock().namespace.len()
    }
}

impl CodecEngineFactory for FakeCodecFactory {
    fn initialize(&self, mode: EngineMode, assets: EngineAssets) -> Result<Box<dyn CodecEngine>, EngineError> {
        let delay = self.state.lock().init_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut s = self.state.lock();
        s.initialized.push(mode);
        if s.failing_modes.contains(&mode) {
            return Err(EngineError::Initialization(format!("{} build rejected", mode)));
        }
        if mode.needs_worker() && assets.worker.is_none() {
            return Err(EngineError::Initialization("worker asset missing".into()));
        }
        Ok(Box::new(FakeCodecEngine {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeCodecEngine {
    state: Arc<Mutex<FactoryState>>,
}

impl CodecEngine for FakeCodecEngine {
    fn write_file(&mut self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        let mut s = self.state.lock();
        if let Some(message) = s.write_failure.clone() {
            let partial = data[..data.len() / 2].to_vec();
            s.namespace.insert(name.to_string(), partial);
            return Err(EngineError::Namespace(message));
        }
        s.namespace.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn exec(&mut self, args: &[String], on_progress: &mut dyn FnMut(f64)) -> Result<(), EngineError> {
        let (gate, script, failure) = {
            let mut s = self.state.lock();
            s.exec_count += 1;
            s.last_exec_args = Some(args.to_vec());
            (s.gate.clone(), s.progress_script.clone(), s.exec_failure.clone())
        };

        if let Some(gate) = gate {
            gate.enter();
        }
        for ratio in script {
            on_progress(ratio);
        }
        if let Some(message) = failure {
            return Err(EngineError::Exec(message));
        }

        let input = args
            .iter()
            .position(|a| a == "-i")
            .and_then(|i| args.get(i + 1))
            .ok_or_else(|| EngineError::Exec("no input".into()))?;
        let output = args.last().ok_or_else(|| EngineError::Exec("no output".into()))?;

        let mut s = self.state.lock();
        let data = s
            .namespace
            .get(input)
            .cloned()
            .ok_or_else(|| EngineError::Namespace(format!("{} not found", input)))?;
        let mut converted = b"mp4:".to_vec();
        converted.extend_from_slice(&data);
        s.namespace.insert(output.clone(), converted);
        Ok(())
    }

    fn read_file(&mut self, name: &str) -> Result<Vec<u8>, EngineError> {
        self.state
            .lock()
            .namespace
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::Namespace(format!("{} not found", name)))
    }

    fn delete_file(&mut self, name: &str) -> Result<(), EngineError> {
        self.state
            .lock()
            .namespace
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::Namespace(format!("{} not found", name)))
    }
}

// --- Delegate ---

/// Records every delegate notification.
#[derive(Default)]
pub struct RecordingDelegate {
    statuses: Mutex<Vec<RecordingStatus>>,
    errors: Mutex<Vec<RecorderErrorKind>>,
    elapsed: Mutex<Vec<u64>>,
    finished: Mutex<Vec<Artifact>>,
    progress: Mutex<Vec<f64>>,
}

impl RecordingDelegate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn statuses(&self) -> Vec<RecordingStatus> {
        self.statuses.lock().clone()
    }

    pub fn errors(&self) -> Vec<RecorderErrorKind> {
        self.errors.lock().clone()
    }

    pub fn finished(&self) -> Vec<Artifact> {
        self.finished.lock().clone()
    }

    pub fn elapsed_updates(&self) -> Vec<u64> {
        self.elapsed.lock().clone()
    }

    pub fn progress(&self) -> Vec<f64> {
        self.progress.lock().clone()
    }
}

impl RecorderDelegate for RecordingDelegate {
    fn on_status_changed(&self, status: RecordingStatus) {
        self.statuses.lock().push(status);
    }

    fn on_elapsed_updated(&self, elapsed_ms: u64) {
        self.elapsed.lock().push(elapsed_ms);
    }

    fn on_error(&self, kind: RecorderErrorKind) {
        self.errors.lock().push(kind);
    }

    fn on_recording_finished(&self, artifact: &Artifact) {
        self.finished.lock().push(artifact.clone());
    }

    fn on_conversion_progress(&self, ratio: f64) {
        self.progress.lock().push(ratio);
    }
}
