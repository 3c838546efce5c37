use auto_impl::auto_impl;
use std::{
    fmt::Debug,
    time::{SystemTime, UNIX_EPOCH},
};

/// Source of wall-clock time in unix milliseconds.
#[auto_impl(&, Arc)]
pub trait Clock: Debug + Send + Sync {
    /// Current time in unix milliseconds.
    fn now_ms(&self) -> u64;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default()
    }
}
