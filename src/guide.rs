//! Pulse-guide session bookkeeping
//!
//! A pulse guide is a short, fixed-duration corrective motion. The
//! controller offers no completion callback, so activity is judged by
//! wall-clock expiry first; while still inside the window, the driver
//! cross-checks the device status and treats an explicit "not guiding"
//! reply as authoritative early termination.

use crate::GuideDirection;
use serde::Serialize;
use std::time::{Duration, Instant};

/// One in-flight pulse guide.
#[derive(Debug, Clone, Copy)]
pub struct GuidePulse {
    pub direction: GuideDirection,
    pub duration: Duration,
    pub started: Instant,
    pub ends: Instant,
}

impl GuidePulse {
    pub fn begin(direction: GuideDirection, duration_ms: u32) -> Self {
        Self::begin_at(direction, duration_ms, Instant::now())
    }

    pub fn begin_at(direction: GuideDirection, duration_ms: u32, now: Instant) -> Self {
        let duration = Duration::from_millis(u64::from(duration_ms));
        Self {
            direction,
            duration,
            started: now,
            ends: now + duration,
        }
    }

    /// The commanded window has elapsed; no device interaction needed.
    pub fn expired(&self, now: Instant) -> bool {
        now >= self.ends
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.ends.saturating_duration_since(now)
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.duration_since(self.started)
    }

    pub fn info(&self, now: Instant) -> GuidePulseInfo {
        GuidePulseInfo {
            active: !self.expired(now),
            direction: self.direction.to_string(),
            duration_ms: self.duration.as_millis() as u64,
            elapsed_ms: self.elapsed(now).as_millis() as u64,
            remaining_ms: self.remaining(now).as_millis() as u64,
        }
    }
}

/// Read-model for the current or last guide pulse.
#[derive(Debug, Clone, Serialize)]
pub struct GuidePulseInfo {
    pub active: bool,
    pub direction: String,
    pub duration_ms: u64,
    pub elapsed_ms: u64,
    pub remaining_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulse_expires_on_wall_clock() {
        let t0 = Instant::now();
        let pulse = GuidePulse::begin_at(GuideDirection::North, 500, t0);

        assert!(!pulse.expired(t0));
        assert!(!pulse.expired(t0 + Duration::from_millis(499)));
        assert!(pulse.expired(t0 + Duration::from_millis(500)));
        assert!(pulse.expired(t0 + Duration::from_millis(800)));
    }

    #[test]
    fn test_pulse_info_accounting() {
        let t0 = Instant::now();
        let pulse = GuidePulse::begin_at(GuideDirection::West, 1000, t0);
        let info = pulse.info(t0 + Duration::from_millis(250));

        assert!(info.active);
        assert_eq!(info.direction, "West");
        assert_eq!(info.duration_ms, 1000);
        assert_eq!(info.elapsed_ms, 250);
        assert_eq!(info.remaining_ms, 750);

        let done = pulse.info(t0 + Duration::from_millis(1500));
        assert!(!done.active);
        assert_eq!(done.remaining_ms, 0);
    }
}
