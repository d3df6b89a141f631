// Load averages from /proc/loadavg and uptime from /proc/uptime, exposed as cached gauges.
//
// /proc/loadavg: "0.20 0.18 0.12 1/80 11206" - 1, 5 and 15 minute run-queue averages first.
// /proc/uptime:  "350735.47 234388.90"      - uptime and cumulative idle time, in seconds.

use super::Refresh;
use crate::error::CollectorResult;
use crate::metrics::{Gauge, Metric, MetricBundle, MetricSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// One parse of the load average and uptime sources. Unreadable sources read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadValues {
    pub one_minute: f64,
    pub five_minute: f64,
    pub fifteen_minute: f64,
    pub uptime_secs: f64,
    pub idle_secs: f64,
}

impl LoadValues {
    fn read(loadavg: &Path, uptime: &Path) -> Self {
        let [one_minute, five_minute, fifteen_minute] = read_fields(loadavg);
        let [uptime_secs, idle_secs] = read_fields(uptime);
        Self {
            one_minute,
            five_minute,
            fifteen_minute,
            uptime_secs,
            idle_secs,
        }
    }
}

/// Reads the first `N` whitespace-separated floats. Missing trailing tokens are zero;
/// an unreadable file or any unparseable token zeroes every field.
fn read_fields<const N: usize>(path: &Path) -> [f64; N] {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_fields(&content).unwrap_or_else(|e| {
            debug!(path = %path.display(), error = %e, "unparseable value; reporting zeros");
            [0.0; N]
        }),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "source unreadable; reporting zeros");
            [0.0; N]
        }
    }
}

fn parse_fields<const N: usize>(content: &str) -> Result<[f64; N], std::num::ParseFloatError> {
    let mut out = [0.0; N];
    for (slot, token) in out.iter_mut().zip(content.split_whitespace()) {
        *slot = token.parse()?;
    }
    Ok(out)
}

/// Last parsed values plus when they were parsed. Reads younger than `min_age`
/// reuse the cached parse; the check-and-refresh runs under one lock.
#[derive(Debug)]
struct LoadCache {
    loadavg: PathBuf,
    uptime: PathBuf,
    min_age: Duration,
    last: Mutex<Option<(Instant, LoadValues)>>,
    parses: AtomicU64,
}

impl LoadCache {
    fn get_or_refresh(&self) -> LoadValues {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        if let Some((at, values)) = *last
            && now.saturating_duration_since(at) < self.min_age
        {
            return values;
        }
        let values = LoadValues::read(&self.loadavg, &self.uptime);
        let parses = self.parses.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(parses, "load sources re-parsed");
        *last = Some((now, values));
        values
    }
}

/// Load average and uptime gauges.
pub struct LoadAverage {
    cache: Arc<LoadCache>,
    metrics: MetricBundle,
}

impl LoadAverage {
    /// Never fails: missing sources are logged and their gauges report zero.
    pub fn new(proc_root: &Path, min_age: Duration) -> Self {
        let loadavg = proc_root.join("loadavg");
        let uptime = proc_root.join("uptime");
        for path in [&loadavg, &uptime] {
            if !path.exists() {
                warn!(path = %path.display(), "load source missing; gauges will report 0");
            }
        }

        let cache = Arc::new(LoadCache {
            loadavg,
            uptime,
            min_age,
            last: Mutex::new(None),
            parses: AtomicU64::new(0),
        });

        let gauge = |pick: fn(&LoadValues) -> f64| {
            let cache = cache.clone();
            Metric::from(Gauge::new(move || pick(&cache.get_or_refresh())))
        };

        let mut metrics = MetricBundle::new();
        metrics.insert("load-avg-1m".into(), gauge(|v| v.one_minute));
        metrics.insert("load-avg-5m".into(), gauge(|v| v.five_minute));
        metrics.insert("load-avg-15m".into(), gauge(|v| v.fifteen_minute));
        metrics.insert("system-uptime".into(), gauge(|v| v.uptime_secs));
        metrics.insert("processor-idle-time".into(), gauge(|v| v.idle_secs));

        Self { cache, metrics }
    }

    /// Current values, re-parsed only if the cached parse is older than the minimum age.
    pub fn values(&self) -> LoadValues {
        self.cache.get_or_refresh()
    }

    /// How many times the sources have been parsed.
    pub fn parse_count(&self) -> u64 {
        self.cache.parses.load(Ordering::Relaxed)
    }
}

impl MetricSet for LoadAverage {
    fn metrics(&self) -> MetricBundle {
        self.metrics.clone()
    }
}

impl Refresh for LoadAverage {
    fn name(&self) -> &'static str {
        "load_average"
    }

    fn refresh(&self) -> CollectorResult<()> {
        self.cache.get_or_refresh();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::GaugeValue;

    fn gauge_value(la: &LoadAverage, name: &str) -> f64 {
        la.metrics()[name].as_gauge().unwrap().value().as_f64()
    }

    #[test]
    fn parses_load_and_uptime() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("loadavg"), "0.20 0.18 0.12 1/80 11206\n").unwrap();
        std::fs::write(dir.path().join("uptime"), "350735.47 234388.90\n").unwrap();
        let la = LoadAverage::new(dir.path(), Duration::from_secs(10));
        assert_eq!(gauge_value(&la, "load-avg-1m"), 0.20);
        assert_eq!(gauge_value(&la, "load-avg-5m"), 0.18);
        assert_eq!(gauge_value(&la, "load-avg-15m"), 0.12);
        assert_eq!(gauge_value(&la, "system-uptime"), 350735.47);
        assert_eq!(gauge_value(&la, "processor-idle-time"), 234388.90);
    }

    #[test]
    fn missing_sources_report_zero() {
        let dir = tempfile::TempDir::new().unwrap();
        let la = LoadAverage::new(dir.path(), Duration::from_secs(10));
        assert_eq!(la.values(), LoadValues::default());
        assert_eq!(
            la.metrics()["load-avg-15m"].as_gauge().unwrap().value(),
            GaugeValue::Float(0.0)
        );
        assert!(la.refresh().is_ok());
    }

    #[test]
    fn bad_token_zeroes_the_whole_file() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("loadavg"), "0.20 oops 0.12\n").unwrap();
        std::fs::write(dir.path().join("uptime"), "12.5 3.0\n").unwrap();
        let values = LoadAverage::new(dir.path(), Duration::ZERO).values();
        assert_eq!(values.one_minute, 0.0);
        assert_eq!(values.fifteen_minute, 0.0);
        assert_eq!(values.uptime_secs, 12.5);
    }

    #[test]
    fn short_line_fills_missing_with_zero() {
        assert_eq!(parse_fields::<3>("1.5 2.5").unwrap(), [1.5, 2.5, 0.0]);
    }

    #[test]
    fn reads_within_min_age_reuse_cached_parse() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("loadavg");
        std::fs::write(&path, "1.00 1.00 1.00\n").unwrap();
        let la = LoadAverage::new(dir.path(), Duration::from_secs(3600));
        assert_eq!(la.values().one_minute, 1.0);
        std::fs::write(&path, "9.00 9.00 9.00\n").unwrap();
        assert_eq!(gauge_value(&la, "load-avg-1m"), 1.0);
    }

    #[test]
    fn zero_min_age_always_reparses() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("loadavg");
        std::fs::write(&path, "1.00 1.00 1.00\n").unwrap();
        let la = LoadAverage::new(dir.path(), Duration::ZERO);
        assert_eq!(la.values().one_minute, 1.0);
        std::fs::write(&path, "9.00 9.00 9.00\n").unwrap();
        la.refresh().unwrap();
        assert_eq!(gauge_value(&la, "load-avg-1m"), 9.0);
    }

    #[test]
    fn concurrent_reads_within_min_age_parse_once() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("loadavg"), "2.00 1.00 0.50\n").unwrap();
        std::fs::write(dir.path().join("uptime"), "10.0 5.0\n").unwrap();
        let la = LoadAverage::new(dir.path(), Duration::from_secs(3600));
        let barrier = std::sync::Barrier::new(16);

        std::thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    barrier.wait();
                    for _ in 0..100 {
                        assert_eq!(gauge_value(&la, "load-avg-1m"), 2.0);
                    }
                });
            }
        });
        assert_eq!(la.parse_count(), 1);
    }
}
