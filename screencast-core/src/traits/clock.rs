use std::time::Instant;

use chrono::{DateTime, Local};

/// Time source for the capture timer and filename stamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    fn local_time(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn local_time(&self) -> DateTime<Local> {
        Local::now()
    }
}
