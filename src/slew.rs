//! Slew completion inference
//!
//! The controller has no busy flag, so slew completion is inferred from
//! position polling: a slew is finished once the mount is close to the
//! target *and* has stopped moving for a stability window. Proximity
//! alone is not enough; some mounts oscillate or overshoot near the
//! target before settling.
//!
//! The session is an explicit state machine advanced once per external
//! poll; no background thread is involved.

use crate::coords::separation_arcmin;
use crate::state::EquatorialCoords;
use serde::Deserialize;
use std::time::{Duration, Instant};

/// Inference thresholds. Hand-tuned values carried as configuration with
/// their observed defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlewTuning {
    /// Separation below which the mount counts as "near target", arcmin.
    pub closeness_arcmin: f64,
    /// Movement between polls above which the settle timer resets, arcmin.
    pub jitter_arcmin: f64,
    /// How long the position must hold still before the slew is complete.
    pub stability_secs: f64,
    /// Hard ceiling on total slew time.
    pub timeout_secs: f64,
}

impl Default for SlewTuning {
    fn default() -> Self {
        Self {
            closeness_arcmin: 1.0,
            jitter_arcmin: 0.1,
            stability_secs: 2.0,
            timeout_secs: 120.0,
        }
    }
}

impl SlewTuning {
    pub fn stability(&self) -> Duration {
        Duration::from_secs_f64(self.stability_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }
}

/// Where the session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlewPhase {
    /// Still approaching the target.
    Slewing,
    /// Near the target, waiting for the position to hold still.
    Stabilizing,
}

/// Result of advancing the session by one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlewPoll {
    InProgress,
    /// Held within the jitter threshold for the full stability window.
    Settled,
    /// Hard timeout exceeded. Complete, but not necessarily successful;
    /// callers distinguish via position-vs-target distance.
    TimedOut,
}

#[derive(Debug, Clone, Copy)]
struct Settle {
    since: Instant,
    last: EquatorialCoords,
}

/// Tracking state for one commanded slew.
///
/// Alt-az slews carry no equatorial target; for those, settling is
/// judged by jitter alone under the same hard timeout.
#[derive(Debug, Clone)]
pub struct SlewSession {
    target: Option<EquatorialCoords>,
    started: Instant,
    settle: Option<Settle>,
}

impl SlewSession {
    pub fn begin(target: Option<EquatorialCoords>) -> Self {
        Self::begin_at(target, Instant::now())
    }

    pub fn begin_at(target: Option<EquatorialCoords>, now: Instant) -> Self {
        Self {
            target,
            started: now,
            settle: None,
        }
    }

    pub fn target(&self) -> Option<EquatorialCoords> {
        self.target
    }

    pub fn phase(&self) -> SlewPhase {
        if self.settle.is_some() {
            SlewPhase::Stabilizing
        } else {
            SlewPhase::Slewing
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.duration_since(self.started)
    }

    /// Advance the state machine with one position sample.
    ///
    /// `None` means the position could not be read this poll; the
    /// conservative answer is "still slewing" rather than guessing
    /// completion while the mount may be moving.
    pub fn poll(
        &mut self,
        sample: Option<EquatorialCoords>,
        tuning: &SlewTuning,
        now: Instant,
    ) -> SlewPoll {
        if self.elapsed(now) > tuning.timeout() {
            return SlewPoll::TimedOut;
        }

        let current = match sample {
            Some(coords) => coords,
            None => return SlewPoll::InProgress,
        };

        match self.settle.as_mut() {
            None => {
                if let Some(target) = self.target {
                    if separation_arcmin(current, target) >= tuning.closeness_arcmin {
                        return SlewPoll::InProgress;
                    }
                }
                // Just arrived near the target; start watching for motion.
                self.settle = Some(Settle {
                    since: now,
                    last: current,
                });
                SlewPoll::InProgress
            }
            Some(settle) => {
                let movement = separation_arcmin(current, settle.last);
                if movement > tuning.jitter_arcmin {
                    // Still in motion: restart the stability clock.
                    settle.since = now;
                    settle.last = current;
                    return SlewPoll::InProgress;
                }
                if now.duration_since(settle.since) >= tuning.stability() {
                    SlewPoll::Settled
                } else {
                    SlewPoll::InProgress
                }
            }
        }
    }
}
