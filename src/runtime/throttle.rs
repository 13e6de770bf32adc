//! Progress throttle for high-frequency `(downloaded, total)` updates.
//!
//! Leading edge: the first update of a window is forwarded immediately.
//! Updates inside the window are held, newest wins. A held update is
//! released by `poll` once the window elapses, or by `flush` when the
//! session moves on (unpacking or a terminal event), so the last reported
//! value is never lost.

use std::time::Duration;

use tokio::time::Instant;

/// Default minimum interval between forwarded progress updates.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub downloaded: u64,
    pub total: u64,
}

#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last_forwarded: Option<Instant>,
    pending: Option<Progress>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_forwarded: None,
            pending: None,
        }
    }

    /// Offer a raw update. Returns the update to forward now, if any.
    pub fn offer(&mut self, progress: Progress, now: Instant) -> Option<Progress> {
        if self.window_open(now) {
            self.last_forwarded = Some(now);
            self.pending = None;
            Some(progress)
        } else {
            self.pending = Some(progress);
            None
        }
    }

    /// Release the held update if its window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<Progress> {
        if self.pending.is_some() && self.window_open(now) {
            self.last_forwarded = Some(now);
            self.pending.take()
        } else {
            None
        }
    }

    /// Release the held update unconditionally.
    pub fn flush(&mut self, now: Instant) -> Option<Progress> {
        let pending = self.pending.take();
        if pending.is_some() {
            self.last_forwarded = Some(now);
        }
        pending
    }

    /// When the held update becomes due, if one is held.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending?;
        Some(match self.last_forwarded {
            Some(last) => last + self.interval,
            None => Instant::now(),
        })
    }

    fn window_open(&self, now: Instant) -> bool {
        match self.last_forwarded {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_INTERVAL)
    }
}
