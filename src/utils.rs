//! Utility functions
//!
//! Duration formatting and stage timing messages.

use std::time::{Duration, Instant};

use log::info;

/// Format a duration into (minutes, seconds) tuple
#[inline]
pub fn format_duration(dur: Duration) -> (u64, u64) {
    let secs = dur.as_secs();
    (secs / 60, secs % 60)
}

/// Format a duration as `<m>m<s>s`
#[inline]
pub fn format_elapsed(dur: Duration) -> String {
    let (m, s) = format_duration(dur);
    format!("{m}m{s}s")
}

/// A timed pipeline stage. Logs its name when started and the elapsed
/// time when finished.
///
/// ```text
/// Reading data...
/// done in 0m3s
/// ```
pub struct Stage {
    start: Instant,
}

impl Stage {
    pub fn start(name: &'static str) -> Self {
        info!("{name}...");
        Self { start: Instant::now() }
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.start.elapsed();
        info!("done in {}", format_elapsed(elapsed));
        elapsed
    }
}
