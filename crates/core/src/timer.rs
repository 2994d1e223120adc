//! Frame timing.

use std::time::{Duration, Instant};

/// Wall-clock timer driving per-frame animation.
///
/// Tracks total elapsed time since creation and the delta between
/// consecutive `tick` calls.
#[derive(Debug)]
pub struct FrameTimer {
    start: Instant,
    last_tick: Instant,
}

impl FrameTimer {
    /// Create a timer starting now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
        }
    }

    /// Total time since the timer was created, in seconds.
    pub fn elapsed_secs(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }

    /// Time since the previous `tick`, advancing the tick point.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        delta
    }

    /// Delta time in seconds since the previous tick.
    pub fn delta_secs(&mut self) -> f32 {
        self.tick().as_secs_f32()
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_grows() {
        let timer = FrameTimer::new();
        std::thread::sleep(Duration::from_millis(2));
        assert!(timer.elapsed_secs() > 0.0);
    }

    #[test]
    fn tick_resets_delta_origin() {
        let mut timer = FrameTimer::new();
        std::thread::sleep(Duration::from_millis(2));
        let first = timer.tick();
        let second = timer.tick();
        assert!(first >= Duration::from_millis(2));
        assert!(second < first);
    }
}
