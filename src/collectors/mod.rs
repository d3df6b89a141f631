// Collectors for kernel-exposed counters under /proc and /sys, plus mounted filesystems.

pub mod blockdev;
pub mod filesystem;
pub mod loadavg;
pub mod meminfo;
pub mod netdev;

pub use blockdev::{BlockDevice, BlockDevices};
pub use filesystem::{FileStore, Filesystem, MountedStore, Storage};
pub use loadavg::{LoadAverage, LoadValues};
pub use meminfo::{MemValues, MemoryInfo};
pub use netdev::{Interface, NetworkDevices};

use crate::error::{CollectorError, CollectorResult};

/// A collector whose exposed metrics are updated by periodic re-polling.
pub trait Refresh: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Re-reads the source and updates exposed metrics in place.
    fn refresh(&self) -> CollectorResult<()>;
}

/// Increase of a monotonic counter between two polls.
///
/// Returns `None` when the counter went backwards (device reset or wrap); the
/// caller then reseeds from the new value instead of marking a negative delta.
/// Increases wider than `i64` saturate at the meter boundary.
pub(crate) fn counter_delta(prev: u128, curr: u128) -> Option<i64> {
    curr.checked_sub(prev).map(|d| i64::try_from(d).unwrap_or(i64::MAX))
}

/// Parses one unsigned counter token. Raw values can exceed `i64::MAX`.
pub(crate) fn parse_counter(token: &str, metric: &str, location: &str) -> CollectorResult<u128> {
    token.parse::<u128>().map_err(|e| CollectorError::ParseError {
        metric: metric.to_string(),
        location: location.to_string(),
        reason: format!("{token:?}: {e}"),
    })
}
