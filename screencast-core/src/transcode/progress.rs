/// Highest ratio reported while the engine is still running. `1` is reserved
/// for `finish`, after the output has been read back.
pub const IN_FLIGHT_CEILING: f64 = 0.99;

/// Normalizes raw engine progress ratios for one conversion.
///
/// Every reported value is clamped into `[0, IN_FLIGHT_CEILING]` and held at
/// its high-water mark, so the caller sees a non-decreasing sequence that
/// starts at `0` and, on success only, ends at `1`.
pub struct ProgressTracker<'a> {
    callback: &'a mut dyn FnMut(f64),
    high_water: f64,
}

impl<'a> ProgressTracker<'a> {
    /// Creates the tracker and reports the initial `0`.
    pub fn start(callback: &'a mut dyn FnMut(f64)) -> Self {
        callback(0.0);
        Self {
            callback,
            high_water: 0.0,
        }
    }

    pub fn report(&mut self, ratio: f64) {
        if ratio.is_nan() {
            return;
        }
        let clamped = ratio.clamp(0.0, IN_FLIGHT_CEILING);
        if clamped > self.high_water {
            self.high_water = clamped;
        }
        (self.callback)(self.high_water);
    }

    /// Report completion. Only called once the output has been read back.
    pub fn finish(self) {
        (self.callback)(1.0);
    }

    pub fn current(&self) -> f64 {
        self.high_water
    }
}
