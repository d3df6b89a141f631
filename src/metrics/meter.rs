// Rate meter: total count, mean rate, and 1/5/15-minute exponentially weighted moving averages.

use serde::Serialize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// One exponentially weighted moving average, ticked every [`TICK_INTERVAL`].
#[derive(Debug)]
struct Ewma {
    alpha: f64,
    /// Events per second.
    rate: f64,
    initialized: bool,
    uncounted: i64,
}

impl Ewma {
    fn over_minutes(minutes: f64) -> Self {
        let interval_secs = TICK_INTERVAL.as_secs_f64();
        Self {
            alpha: 1.0 - (-interval_secs / 60.0 / minutes).exp(),
            rate: 0.0,
            initialized: false,
            uncounted: 0,
        }
    }

    fn update(&mut self, n: i64) {
        self.uncounted = self.uncounted.saturating_add(n);
    }

    fn tick(&mut self) {
        let instant_rate = self.uncounted as f64 / TICK_INTERVAL.as_secs_f64();
        self.uncounted = 0;
        if self.initialized {
            self.rate += self.alpha * (instant_rate - self.rate);
        } else {
            self.rate = instant_rate;
            self.initialized = true;
        }
    }
}

#[derive(Debug)]
struct MeterState {
    last_tick: Instant,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
}

impl MeterState {
    fn tick_if_necessary(&mut self, now: Instant) {
        let age = now.saturating_duration_since(self.last_tick);
        if age < TICK_INTERVAL {
            return;
        }
        let ticks = (age.as_nanos() / TICK_INTERVAL.as_nanos()) as u32;
        self.last_tick += TICK_INTERVAL * ticks;
        for _ in 0..ticks {
            self.m1.tick();
            self.m5.tick();
            self.m15.tick();
        }
    }
}

/// A metric that accumulates increments and reports average rates.
///
/// `mark` may run concurrently with readers: the count is atomic and the
/// moving averages sit behind a short mutex.
#[derive(Debug)]
pub struct Meter {
    count: AtomicI64,
    start: Instant,
    state: Mutex<MeterState>,
}

/// Serializable view of a [`Meter`]. Rates are events per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterSnapshot {
    pub count: i64,
    pub mean_rate: f64,
    pub one_minute_rate: f64,
    pub five_minute_rate: f64,
    pub fifteen_minute_rate: f64,
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

impl Meter {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    fn starting_at(start: Instant) -> Self {
        Self {
            count: AtomicI64::new(0),
            start,
            state: Mutex::new(MeterState {
                last_tick: start,
                m1: Ewma::over_minutes(1.0),
                m5: Ewma::over_minutes(5.0),
                m15: Ewma::over_minutes(15.0),
            }),
        }
    }

    /// Records `n` events.
    pub fn mark(&self, n: i64) {
        self.mark_at(n, Instant::now());
    }

    fn mark_at(&self, n: i64, now: Instant) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.tick_if_necessary(now);
        self.count.fetch_add(n, Ordering::Relaxed);
        state.m1.update(n);
        state.m5.update(n);
        state.m15.update(n);
    }

    /// Total events recorded since creation.
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean_rate(&self) -> f64 {
        self.mean_rate_at(Instant::now())
    }

    fn mean_rate_at(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.start).as_secs_f64();
        if elapsed > 0.0 {
            self.count() as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        self.snapshot_at(Instant::now())
    }

    fn snapshot_at(&self, now: Instant) -> MeterSnapshot {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.tick_if_necessary(now);
        MeterSnapshot {
            count: self.count(),
            mean_rate: self.mean_rate_at(now),
            one_minute_rate: state.m1.rate,
            five_minute_rate: state.m5.rate,
            fifteen_minute_rate: state.m15.rate,
        }
    }
}
