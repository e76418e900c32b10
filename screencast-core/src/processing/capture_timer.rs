use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::traits::clock::Clock;

/// Called with the recomputed elapsed milliseconds on every timer period.
pub type TickCallback = Arc<dyn Fn(u64) + Send + Sync + 'static>;

#[derive(Debug, Default)]
struct TimerState {
    started_at: Option<Instant>,
    paused_at: Option<Instant>,
    paused_total: Duration,
    elapsed: Duration,
}

impl TimerState {
    /// `elapsed = reference - start - paused_total`, where the reference is
    /// the pause instant while paused and `now` otherwise.
    fn recompute(&mut self, now: Instant) {
        let Some(start) = self.started_at else {
            return;
        };
        let reference = self.paused_at.unwrap_or(now);
        self.elapsed = reference
            .saturating_duration_since(start)
            .saturating_sub(self.paused_total);
    }

    fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}

/// Pausable wall-clock recording timer.
///
/// A background thread recomputes the elapsed time every `period`. Each run
/// gets its own stop flag, so `stop` never waits on the thread and a stale
/// thread from a previous run exits on its next wake-up.
pub struct CaptureTimer {
    clock: Arc<dyn Clock>,
    period: Duration,
    state: Arc<Mutex<TimerState>>,
    running: Mutex<Option<Arc<AtomicBool>>>,
    on_tick: Option<TickCallback>,
}

impl CaptureTimer {
    pub fn new(clock: Arc<dyn Clock>, period: Duration) -> Self {
        Self {
            clock,
            period,
            state: Arc::new(Mutex::new(TimerState::default())),
            running: Mutex::new(None),
            on_tick: None,
        }
    }

    pub fn with_tick_callback(mut self, on_tick: TickCallback) -> Self {
        self.on_tick = Some(on_tick);
        self
    }

    /// Reset to zero and begin periodic recomputation.
    pub fn start(&self) {
        self.cancel();
        {
            let mut s = self.state.lock();
            *s = TimerState {
                started_at: Some(self.clock.now()),
                ..TimerState::default()
            };
        }

        let flag = Arc::new(AtomicBool::new(true));
        let thread_flag = Arc::clone(&flag);
        let state = Arc::clone(&self.state);
        let clock = Arc::clone(&self.clock);
        let on_tick = self.on_tick.clone();
        let period = self.period;

        let spawned = thread::Builder::new()
            .name("capture-timer".into())
            .spawn(move || loop {
                thread::sleep(period);
                if !thread_flag.load(Ordering::SeqCst) {
                    break;
                }
                let elapsed_ms = {
                    let mut s = state.lock();
                    s.recompute(clock.now());
                    s.elapsed_ms()
                };
                if let Some(ref callback) = on_tick {
                    callback(elapsed_ms);
                }
            });

        // Without the thread the value is still correct whenever sampled.
        if let Err(e) = spawned {
            log::error!("failed to spawn capture timer thread: {}", e);
        }

        *self.running.lock() = Some(flag);
    }

    /// Freeze the elapsed value. No-op if not running or already paused.
    pub fn pause(&self) {
        if !self.is_running() {
            return;
        }
        let now = self.clock.now();
        let mut s = self.state.lock();
        if s.paused_at.is_none() {
            s.paused_at = Some(now);
            s.recompute(now);
        }
    }

    /// Fold the finished pause into the paused total. No-op if not paused.
    pub fn resume(&self) {
        let now = self.clock.now();
        let mut s = self.state.lock();
        if let Some(paused_at) = s.paused_at.take() {
            s.paused_total += now.saturating_duration_since(paused_at);
            s.recompute(now);
        }
    }

    /// Stop periodic recomputation after one final sample. The elapsed value
    /// is kept until the next `start` or `reset`.
    pub fn stop(&self) {
        if self.cancel() {
            let now = self.clock.now();
            self.state.lock().recompute(now);
        }
    }

    /// Stop and zero the elapsed value.
    pub fn reset(&self) {
        self.cancel();
        *self.state.lock() = TimerState::default();
    }

    /// Recompute now (if running) and return the elapsed milliseconds.
    pub fn sample(&self) -> u64 {
        if self.is_running() {
            let now = self.clock.now();
            let mut s = self.state.lock();
            s.recompute(now);
            return s.elapsed_ms();
        }
        self.elapsed_ms()
    }

    /// Last computed elapsed milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.state.lock().elapsed_ms()
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused_at.is_some()
    }

    fn cancel(&self) -> bool {
        match self.running.lock().take() {
            Some(flag) => {
                flag.store(false, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }
}

impl Drop for CaptureTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
