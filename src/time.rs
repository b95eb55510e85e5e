// src/time.rs
//! Frame timing and the spawn countdown.
//!
//! `FrameClock` measures wall-clock time between ticks and reports it untouched: no smoothing and
//! no clamping, the host's refresh rate is the only limiter. Catch-up is bounded later by the
//! physics sub-step cap instead.

use std::time::Instant;

/// Snapshot of timing data for one tick (Copy, cheap).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Seconds since the previous tick.
    pub delta: f32,
    /// Seconds since the clock started.
    pub elapsed: f64,
    pub frame: u64,
}

/// Wall-clock source for the frame loop.
#[derive(Debug)]
pub struct FrameClock {
    start: Instant,
    last_elapsed: f64,
    frame: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
            last_elapsed: 0.0,
            frame: 0,
        }
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds since the clock was created.
    #[inline(always)]
    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Call once per tick, first thing.
    #[inline]
    pub fn tick(&mut self) -> FrameTime {
        let elapsed = self.elapsed();
        let delta = (elapsed - self.last_elapsed) as f32;
        self.last_elapsed = elapsed;
        self.frame += 1;
        FrameTime { delta, elapsed, frame: self.frame }
    }

    #[inline(always)]
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

/// Repeating countdown. When it runs out it snaps back to exactly `interval`; overshoot is not
/// carried into the next period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Countdown {
    interval: f32,
    remaining: f32,
}

impl Countdown {
    pub fn new(interval: f32) -> Self {
        Self { interval, remaining: interval }
    }

    /// Subtracts `dt`; returns `true` (and resets) once the countdown reaches zero or below.
    #[inline]
    pub fn tick(&mut self, dt: f32) -> bool {
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            self.remaining = self.interval;
            true
        } else {
            false
        }
    }

    #[inline(always)]
    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    #[inline(always)]
    pub fn interval(&self) -> f32 {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_fires_and_resets_exactly() {
        let mut c = Countdown::new(0.25);
        assert!(!c.tick(0.125));
        assert_eq!(c.remaining(), 0.125);
        assert!(c.tick(0.125));
        assert_eq!(c.remaining(), 0.25);
    }

    #[test]
    fn overshoot_is_not_carried() {
        let mut c = Countdown::new(0.25);
        assert!(c.tick(1.0));
        assert_eq!(c.remaining(), 0.25);
        assert!(c.remaining() > 0.0);
    }

    #[test]
    fn clock_deltas_are_monotonic() {
        let mut clock = FrameClock::new();
        let a = clock.tick();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = clock.tick();
        assert_eq!(b.frame, 2);
        assert!(a.delta >= 0.0);
        assert!(b.delta >= 0.004);
        assert!(b.elapsed >= a.elapsed);
    }
}
