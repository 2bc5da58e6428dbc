//! Frame pacing with drift correction
//!
//! The pacer is a pure scheduler: it never sleeps and never touches the core.
//! The core worker asks it when the next frame is due, runs the frame, and
//! reports back when the frame started. A late frame shortens the following
//! wait by the amount it overran, so lateness does not accumulate.

use std::time::{Duration, Instant};

use retroshell_shared::constants::NATIVE_FRAME_RATE;

use crate::config::PacerConfig;

/// Upper bound on the catch-up window, in frames.
const MAX_CATCH_UP_LIMIT: f64 = 600.0;

/// Accepted frame rates, in Hz.
const MIN_FRAME_RATE: f64 = 1.0;
const MAX_FRAME_RATE: f64 = 1000.0;

/// Self-rescheduling frame timer state.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Duration,
    max_catch_up: Duration,
    /// Deadline of the next frame. `None` until the first frame of a run.
    next_tick: Option<Instant>,
    frames: u64,
}

impl FramePacer {
    /// Create a pacer for `frame_rate` Hz.
    ///
    /// `max_catch_up_frames` caps how much of one overrun is subtracted from
    /// the next interval. `1.0` means a late frame can at most make the next
    /// one fire immediately; `0.0` disables catch-up entirely.
    pub fn new(frame_rate: f64, max_catch_up_frames: f64) -> Self {
        let frame_rate = if frame_rate.is_finite() && frame_rate > 0.0 {
            let clamped = frame_rate.clamp(MIN_FRAME_RATE, MAX_FRAME_RATE);
            if clamped != frame_rate {
                tracing::warn!("Frame rate {} out of range, using {}", frame_rate, clamped);
            }
            clamped
        } else {
            tracing::warn!(
                "Invalid frame rate {}, using {}",
                frame_rate,
                NATIVE_FRAME_RATE
            );
            NATIVE_FRAME_RATE
        };
        let interval = Duration::from_secs_f64(1.0 / frame_rate);

        let catch_up = if max_catch_up_frames.is_finite() {
            max_catch_up_frames.clamp(0.0, MAX_CATCH_UP_LIMIT)
        } else {
            MAX_CATCH_UP_LIMIT
        };

        Self {
            interval,
            max_catch_up: interval.mul_f64(catch_up),
            next_tick: None,
            frames: 0,
        }
    }

    pub fn from_config(config: &PacerConfig) -> Self {
        Self::new(config.frame_rate, config.max_catch_up_frames)
    }

    /// Target frame period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Deadline of the next frame, if a run is in progress.
    pub fn next_tick(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Frames completed since the pacer was created.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// How long to wait from `now` before the next frame is due.
    ///
    /// Zero for the first frame of a run and whenever the deadline has passed.
    pub fn wait(&self, now: Instant) -> Duration {
        self.next_tick
            .map(|next| next.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Whether a frame is due at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        self.wait(now).is_zero()
    }

    /// How late a frame starting at `start` is against the current deadline,
    /// capped at the catch-up window.
    pub fn delay(&self, start: Instant) -> Duration {
        match self.next_tick {
            None => Duration::ZERO,
            Some(next) => start.saturating_duration_since(next).min(self.max_catch_up),
        }
    }

    /// Record a frame that started at `start` and schedule the next one.
    ///
    /// Returns the new deadline, `start + interval - delay`.
    pub fn tick(&mut self, start: Instant) -> Instant {
        let delay = self.delay(start);
        let target = start + self.interval;
        let next = target.checked_sub(delay).unwrap_or(start);
        self.next_tick = Some(next);
        self.frames += 1;
        next
    }

    /// Forget the current run so the next frame starts an unbiased sequence.
    pub fn reset(&mut self) {
        self.next_tick = None;
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::from_config(&PacerConfig::default())
    }
}
