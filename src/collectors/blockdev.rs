// Per-device I/O counters from /proc/diskstats, exposed as rate meters.
//
//    8       1 sda1 426 243 3386 2056 3 0 18 87 0 2135 2142
//
// Fields used (0-based tokens): 2 device name, 3 reads completed, 5 sectors read,
// 7 writes completed, 9 sectors written. See Documentation/iostats.txt.
// Byte counts are sectors times the device's physical block size, read once from
// /sys/block/<dev>/queue/physical_block_size.

use super::{Refresh, counter_delta, parse_counter};
use crate::error::{CollectorResult, read_source};
use crate::metrics::{Meter, Metric, MetricBundle, MetricSet};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument, trace, warn};

const NAME_INDEX: usize = 2;
const READS_INDEX: usize = 3;
const SECTORS_READ_INDEX: usize = 5;
const WRITES_INDEX: usize = 7;
const SECTORS_WRITTEN_INDEX: usize = 9;
const MIN_EXPECTED_TOKENS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DiskCounters {
    reads: u128,
    sectors_read: u128,
    writes: u128,
    sectors_written: u128,
}

impl DiskCounters {
    fn parse(tokens: &[&str], location: &str) -> CollectorResult<Self> {
        let name = tokens[NAME_INDEX];
        let field = |index: usize| parse_counter(tokens[index], name, location);
        Ok(Self {
            reads: field(READS_INDEX)?,
            sectors_read: field(SECTORS_READ_INDEX)?,
            writes: field(WRITES_INDEX)?,
            sectors_written: field(SECTORS_WRITTEN_INDEX)?,
        })
    }
}

/// Whitespace tokens of a diskstats line, or `None` if it is too short to describe a device.
fn tokenize(line: &str) -> Option<Vec<&str>> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    (tokens.len() >= MIN_EXPECTED_TOKENS).then_some(tokens)
}

/// `sda1` -> `sda`, `nvme0n1p2` -> `nvme0n1`, `mmcblk0p1` -> `mmcblk0`.
fn parent_device(name: &str) -> &str {
    let stripped = name.trim_end_matches(|c: char| c.is_ascii_digit());
    match stripped.strip_suffix('p') {
        Some(base) if base.ends_with(|c: char| c.is_ascii_digit()) => base,
        _ => stripped,
    }
}

/// Physical block size for `name`, falling back to the parent device; 0 if neither is known.
pub(crate) fn block_size(sys_root: &Path, name: &str) -> u32 {
    let size_file = |dev: &str| {
        sys_root
            .join("block")
            .join(dev)
            .join("queue")
            .join("physical_block_size")
    };
    let mut path = size_file(name);
    if !path.exists() {
        path = size_file(parent_device(name));
    }
    if !path.exists() {
        debug!(device = name, "no physical_block_size; byte counts will read 0");
        return 0;
    }
    match std::fs::read_to_string(&path) {
        Ok(s) => s.trim().parse().unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "unparseable block size");
            0
        }),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "unreadable block size");
            0
        }
    }
}

/// Metrics for one block device.
#[derive(Debug)]
pub struct BlockDevice {
    name: String,
    block_size: u32,
    read_ops: Arc<Meter>,
    bytes_read: Arc<Meter>,
    write_ops: Arc<Meter>,
    bytes_written: Arc<Meter>,
    last: Mutex<DiskCounters>,
}

impl BlockDevice {
    fn new(name: String, block_size: u32, seed: DiskCounters) -> Self {
        Self {
            name,
            block_size,
            read_ops: Arc::new(Meter::new()),
            bytes_read: Arc::new(Meter::new()),
            write_ops: Arc::new(Meter::new()),
            bytes_written: Arc::new(Meter::new()),
            last: Mutex::new(seed),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    fn mark(&self, curr: DiskCounters) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let block_size = i64::from(self.block_size);
        let ops = |meter: &Arc<Meter>, prev: u128, curr: u128| {
            if let Some(delta) = counter_delta(prev, curr) {
                meter.mark(delta);
            }
        };
        let bytes = |meter: &Arc<Meter>, prev: u128, curr: u128| {
            if let Some(delta) = counter_delta(prev, curr) {
                meter.mark(delta.saturating_mul(block_size));
            }
        };
        ops(&self.read_ops, last.reads, curr.reads);
        bytes(&self.bytes_read, last.sectors_read, curr.sectors_read);
        ops(&self.write_ops, last.writes, curr.writes);
        bytes(&self.bytes_written, last.sectors_written, curr.sectors_written);
        *last = curr;
    }
}

impl MetricSet for BlockDevice {
    fn metrics(&self) -> MetricBundle {
        [
            ("read-ops", &self.read_ops),
            ("bytes-read", &self.bytes_read),
            ("write-ops", &self.write_ops),
            ("bytes-written", &self.bytes_written),
        ]
        .into_iter()
        .map(|(name, meter)| (name.to_string(), Metric::Meter(meter.clone())))
        .collect()
    }
}

/// Block devices listed in /proc/diskstats at construction time. The list is fixed.
pub struct BlockDevices {
    path: PathBuf,
    devices: Vec<Arc<BlockDevice>>,
    refresh_lock: Mutex<()>,
}

impl BlockDevices {
    pub fn new(proc_root: &Path, sys_root: &Path) -> CollectorResult<Self> {
        let path = proc_root.join("diskstats");
        let location = path.display().to_string();
        let content = read_source(&path)?;

        let mut devices: Vec<Arc<BlockDevice>> = Vec::new();
        for tokens in content.lines().filter_map(tokenize) {
            let name = tokens[NAME_INDEX];
            if devices.iter().any(|d| d.name == name) {
                warn!(device = name, "duplicate block device; keeping the first");
                continue;
            }
            match DiskCounters::parse(&tokens, &location) {
                Ok(seed) => {
                    let size = block_size(sys_root, name);
                    devices.push(Arc::new(BlockDevice::new(name.to_string(), size, seed)));
                }
                Err(e) => warn!(error = %e, "skipping malformed block device line"),
            }
        }

        Ok(Self {
            path,
            devices,
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn devices(&self) -> &[Arc<BlockDevice>] {
        &self.devices
    }

    pub fn device(&self, name: &str) -> Option<&Arc<BlockDevice>> {
        self.devices.iter().find(|d| d.name == name)
    }
}

impl Refresh for BlockDevices {
    fn name(&self) -> &'static str {
        "block_devices"
    }

    #[instrument(skip(self), fields(collector = "block_devices"))]
    fn refresh(&self) -> CollectorResult<()> {
        let _serial = self.refresh_lock.lock().unwrap_or_else(|e| e.into_inner());
        let location = self.path.display().to_string();
        let content = read_source(&self.path)?;

        let mut by_name: HashMap<&str, Vec<&str>> = HashMap::new();
        for tokens in content.lines().filter_map(tokenize) {
            by_name.entry(tokens[NAME_INDEX]).or_insert(tokens);
        }

        for device in &self.devices {
            let Some(tokens) = by_name.get(device.name.as_str()) else {
                trace!(device = %device.name, "device absent this poll");
                continue;
            };
            match DiskCounters::parse(tokens, &location) {
                Ok(curr) => device.mark(curr),
                Err(e) => debug!(device = %device.name, error = %e, "skipping device this poll"),
            }
        }
        Ok(())
    }
}
