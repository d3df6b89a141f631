// Memory counters from /proc/meminfo ("MemTotal:        8055664 kB"), exposed as gauges.

use super::Refresh;
use crate::error::{CollectorResult, read_source};
use crate::metrics::{Gauge, MetricBundle, MetricSet};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{instrument, trace, warn};

/// Keys instrumented when none are configured.
pub const DEFAULT_MEMINFO_KEYS: &[&str] = &[
    "MemTotal",
    "MemFree",
    "Buffers",
    "Cached",
    "SwapCached",
    "Active",
    "Inactive",
    "SwapTotal",
    "SwapFree",
];

pub type MemValues = Arc<HashMap<String, u64>>;

/// Parses every `key: value [unit]` line. Lines without a parseable value are skipped.
pub(crate) fn parse_meminfo(content: &str) -> HashMap<String, u64> {
    let mut fields = HashMap::new();
    for line in content.lines() {
        let mut tokens = line
            .split(|c: char| c == ':' || c.is_whitespace())
            .filter(|t| !t.is_empty());
        let (Some(key), Some(value)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        match value.parse::<u64>() {
            Ok(v) => {
                fields.insert(key.to_string(), v);
            }
            Err(e) => trace!(key, value, error = %e, "skipping meminfo line"),
        }
    }
    fields
}

/// Gauges over an allow-listed subset of /proc/meminfo keys.
///
/// Each refresh swaps in a complete new snapshot, so gauge reads see either the
/// old or the new mapping and never a mix.
pub struct MemoryInfo {
    path: PathBuf,
    current: Arc<RwLock<MemValues>>,
    refresh_lock: Mutex<()>,
    metrics: MetricBundle,
}

impl MemoryInfo {
    /// Creates gauges for `keys`, named by the lower-cased key. Absent keys read as 0.
    pub fn new<I, S>(proc_root: &Path, keys: I) -> CollectorResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let path = proc_root.join("meminfo");
        let initial = parse_meminfo(&read_source(&path)?);
        let current = Arc::new(RwLock::new(Arc::new(initial)));

        let mut metrics = MetricBundle::new();
        for key in keys {
            let key = key.as_ref().to_string();
            let name = key.to_lowercase();
            if metrics.contains_key(&name) {
                warn!(key = %key, metric = %name, "duplicate memory gauge name; keeping the first");
                continue;
            }
            let current = current.clone();
            let gauge = Gauge::new(move || {
                let values = current.read().unwrap_or_else(|e| e.into_inner()).clone();
                values.get(&key).copied().unwrap_or(0)
            });
            metrics.insert(name, gauge.into());
        }

        Ok(Self {
            path,
            current,
            refresh_lock: Mutex::new(()),
            metrics,
        })
    }

    /// The most recently parsed values.
    pub fn values(&self) -> MemValues {
        self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl MetricSet for MemoryInfo {
    fn metrics(&self) -> MetricBundle {
        self.metrics.clone()
    }
}

impl Refresh for MemoryInfo {
    fn name(&self) -> &'static str {
        "memory_info"
    }

    /// An unreadable file publishes an empty snapshot (every gauge reads 0) and
    /// still reports the error.
    #[instrument(skip(self), fields(collector = "memory_info"))]
    fn refresh(&self) -> CollectorResult<()> {
        let _serial = self.refresh_lock.lock().unwrap_or_else(|e| e.into_inner());
        let (next, result) = match read_source(&self.path) {
            Ok(content) => (parse_meminfo(&content), Ok(())),
            Err(e) => (HashMap::new(), Err(e)),
        };
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(next);
        result
    }
}
