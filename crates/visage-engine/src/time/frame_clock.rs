use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameTime {
    /// Time elapsed since the previous tick, in seconds. 0 on the first tick.
    pub dt: f32,

    /// Nanoseconds since the first tick. The first tick reports 0, which the
    /// background renderer treats as "no camera image yet".
    pub timestamp_ns: i64,

    /// Monotonic frame counter.
    pub frame_index: u64,
}

/// Session clock producing `FrameTime` snapshots.
///
/// Delta time is clamped to avoid pathological values when the process is
/// paused by the debugger or stalls; the timestamp itself is never clamped.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Option<Instant>,
    last: Option<Instant>,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
    }

    /// Creates a clock with custom delta-time clamps.
    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        Self {
            start: None,
            last: None,
            frame_index: 0,
            dt_min,
            dt_max,
        }
    }

    /// Forgets the baseline; the next tick reports timestamp 0 again.
    pub fn reset(&mut self) {
        self.start = None;
        self.last = None;
        self.frame_index = 0;
    }

    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    /// Advances the clock to `now`.
    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        let start = *self.start.get_or_insert(now);
        let dt = match self.last {
            Some(last) => now.saturating_duration_since(last).clamp(self.dt_min, self.dt_max),
            None => Duration::ZERO,
        };
        self.last = Some(now);

        let elapsed = now.saturating_duration_since(start).as_nanos();
        let ft = FrameTime {
            dt: dt.as_secs_f32(),
            timestamp_ns: i64::try_from(elapsed).unwrap_or(i64::MAX),
            frame_index: self.frame_index,
        };

        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_is_timestamp_zero() {
        let mut clock = FrameClock::new();
        let t = clock.tick();
        assert_eq!(t.timestamp_ns, 0);
        assert_eq!(t.dt, 0.0);
        assert_eq!(t.frame_index, 0);
    }

    #[test]
    fn timestamps_follow_elapsed_time() {
        let mut clock = FrameClock::new();
        let t0 = Instant::now();
        clock.tick_at(t0);
        let t = clock.tick_at(t0 + Duration::from_millis(16));
        assert_eq!(t.timestamp_ns, 16_000_000);
        assert_eq!(t.frame_index, 1);
        assert!((t.dt - 0.016).abs() < 1e-6);
    }

    #[test]
    fn dt_is_clamped_but_timestamp_is_not() {
        let mut clock = FrameClock::new();
        let t0 = Instant::now();
        clock.tick_at(t0);
        let t = clock.tick_at(t0 + Duration::from_secs(2));
        assert!((t.dt - 0.25).abs() < 1e-6);
        assert_eq!(t.timestamp_ns, 2_000_000_000);
    }

    #[test]
    fn reset_restarts_at_zero() {
        let mut clock = FrameClock::new();
        let t0 = Instant::now();
        clock.tick_at(t0);
        clock.tick_at(t0 + Duration::from_millis(5));
        clock.reset();
        let t = clock.tick_at(t0 + Duration::from_millis(10));
        assert_eq!(t.timestamp_ns, 0);
        assert_eq!(t.frame_index, 0);
    }
}
