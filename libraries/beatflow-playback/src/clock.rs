//! Progress clock
//!
//! Adapters report position at coarse intervals (about once per second for a
//! remote device). Between reports the position is extrapolated from the
//! last anchor at wall-clock rate. Every report re-anchors the clock.

use tokio::time::Instant;

/// Extrapolating position clock
#[derive(Debug, Clone)]
pub struct ProgressClock {
    anchor_ms: u64,
    anchored_at: Instant,
    duration_ms: u64,
    running: bool,
}

impl ProgressClock {
    /// Create a stopped clock at position zero
    pub fn new(now: Instant) -> Self {
        Self {
            anchor_ms: 0,
            anchored_at: now,
            duration_ms: 0,
            running: false,
        }
    }

    /// Re-anchor from an authoritative report
    pub fn sync(&mut self, position_ms: u64, duration_ms: u64, running: bool, now: Instant) {
        self.anchor_ms = position_ms;
        self.duration_ms = duration_ms;
        self.anchored_at = now;
        self.running = running;
    }

    /// Start or stop extrapolating, keeping the current position
    pub fn set_running(&mut self, running: bool, now: Instant) {
        if self.running != running {
            let position = self.position_at(now);
            self.sync(position, self.duration_ms, running, now);
        }
    }

    /// Stop and rewind to zero
    pub fn reset(&mut self, now: Instant) {
        self.sync(0, 0, false, now);
    }

    /// Extrapolated position, clamped to the duration when one is known
    pub fn position_at(&self, now: Instant) -> u64 {
        if !self.running {
            return self.anchor_ms;
        }
        let elapsed = now.saturating_duration_since(self.anchored_at).as_millis() as u64;
        let position = self.anchor_ms.saturating_add(elapsed);
        if self.duration_ms > 0 {
            position.min(self.duration_ms)
        } else {
            position
        }
    }

    /// Whether the clock is extrapolating
    pub fn is_running(&self) -> bool {
        self.running
    }
}
