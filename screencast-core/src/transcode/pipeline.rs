use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::models::artifact::{ArtifactKind, Blob};
use crate::models::engine::EngineMode;
use crate::models::error::EngineError;
use crate::traits::codec_engine::CodecEngine;
use crate::transcode::loader::CodecEngineLoader;
use crate::transcode::progress::ProgressTracker;

/// Output of one successful conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub blob: Blob,
    pub mode: EngineMode,
    pub engine: String,
}

/// Feeds a finished recording through the shared codec engine.
///
/// ```text
/// resolve engine → write input → exec(profile) → read output → delete both
///       0 ───────────── engine ratios (clamped, monotonic) ──────────→ 1
/// ```
///
/// At most one conversion runs at a time; a second request while one is in
/// flight is rejected with `EngineError::Busy` rather than queued.
pub struct TranscodePipeline {
    loader: Arc<CodecEngineLoader>,
    busy: AtomicBool,
    sequence: AtomicU64,
}

impl TranscodePipeline {
    pub fn new(loader: Arc<CodecEngineLoader>) -> Self {
        Self {
            loader,
            busy: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn loader(&self) -> &Arc<CodecEngineLoader> {
        &self.loader
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn convert<F>(&self, source: &Blob, mut on_progress: F) -> Result<ConversionResult, EngineError>
    where
        F: FnMut(f64),
    {
        let _busy = BusyGuard::acquire(&self.busy).ok_or(EngineError::Busy)?;
        self.run(source, &mut on_progress)
    }

    fn run(&self, source: &Blob, on_progress: &mut dyn FnMut(f64)) -> Result<ConversionResult, EngineError> {
        let mut progress = ProgressTracker::start(on_progress);

        let loaded = self.loader.resolve()?;
        let (input, output) = self.scratch_names();
        log::info!(
            "converting {} bytes with {}-threaded engine ({} → {})",
            source.len(),
            loaded.mode(),
            input,
            output
        );

        let data = {
            let mut engine = loaded.lock();
            let args = self.loader.config().transcode_args(&input, &output);
            let outcome = engine
                .write_file(&input, source.bytes())
                .and_then(|()| engine.exec(&args, &mut |ratio| progress.report(ratio)))
                .and_then(|()| engine.read_file(&output));

            Self::cleanup(&mut **engine, &input, &output);
            outcome?
        };

        log::info!(
            "conversion finished: {} bytes in, {} bytes out (last engine ratio {:.2})",
            source.len(),
            data.len(),
            progress.current()
        );
        progress.finish();

        Ok(ConversionResult {
            blob: Blob::new(data, ArtifactKind::Converted.content_type()),
            mode: loaded.mode(),
            engine: self.loader.config().engine_label.clone(),
        })
    }

    /// Unique, timestamped virtual file names for one conversion.
    fn scratch_names(&self) -> (String, String) {
        let stamp = chrono::Utc::now().timestamp_millis();
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        (
            format!("input-{}-{}.{}", stamp, seq, ArtifactKind::Raw.extension()),
            format!("output-{}-{}.{}", stamp, seq, ArtifactKind::Converted.extension()),
        )
    }

    /// Virtual files live as long as the engine does; delete them so repeated
    /// conversions do not grow its storage.
    fn cleanup(engine: &mut dyn CodecEngine, input: &str, output: &str) {
        for name in [input, output] {
            if let Err(e) = engine.delete_file(name) {
                log::debug!("could not delete virtual file {}: {}", name, e);
            }
        }
    }
}

/// Holds the pipeline's busy flag for one conversion and clears it on drop,
/// including when a progress callback unwinds.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
