//! Simulated clock: monotonic tick counter with optional wall pacing.

/// Discrete simulation clock. `tick()` advances simulated time by the
/// configured interval; when `realtime_factor > 0` it also sleeps
/// `tick_interval_s * realtime_factor` wall seconds, yielding wall time
/// without touching simulated time.
#[derive(Debug, Clone)]
pub struct Clock {
    pub current_time_s: f64,
    pub tick_count: u64,
    pub tick_interval_s: f64,
    pub realtime_factor: f64,
}

impl Clock {
    pub fn new(tick_interval_s: f64, realtime_factor: f64) -> Self {
        Self {
            current_time_s: 0.0,
            tick_count: 0,
            tick_interval_s,
            realtime_factor,
        }
    }

    /// Advance one tick.
    pub fn tick(&mut self) {
        self.current_time_s += self.tick_interval_s;
        self.tick_count += 1;

        if self.realtime_factor > 0.0 {
            let wall = self.tick_interval_s * self.realtime_factor;
            std::thread::sleep(std::time::Duration::from_secs_f64(wall));
        }
    }

    /// Zero time and the tick counter; pacing configuration is kept.
    pub fn reset(&mut self) {
        self.current_time_s = 0.0;
        self.tick_count = 0;
    }

    /// Simulated hour of day in [0, 24).
    pub fn hour_of_day(&self) -> f64 {
        (self.current_time_s / 3600.0) % 24.0
    }
}
