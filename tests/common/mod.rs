// Shared test helpers: fixture /proc and /sys trees and fake filesystems

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sysmon::collectors::FileStore;
use sysmon::filter::AcceptAll;
use sysmon::{CollectorResult, MonitorConfig, StorageSource};
use tempfile::TempDir;

pub const NET_DEV_HEADER: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
";

/// One /proc/net/dev line with the given receive/transmit byte counters; other columns are 0.
pub fn net_dev_line(name: &str, rx_bytes: u128, tx_bytes: u128) -> String {
    format!("{name:>6}: {rx_bytes} 0 0 0 0 0 0 0 {tx_bytes} 0 0 0 0 0 0 0\n")
}

pub fn net_dev(rows: &[(&str, u128, u128)]) -> String {
    let mut content = NET_DEV_HEADER.to_string();
    for (name, rx, tx) in rows {
        content.push_str(&net_dev_line(name, *rx, *tx));
    }
    content
}

/// One /proc/diskstats line: reads, sectors read, writes, sectors written.
pub fn diskstats_line(name: &str, reads: u64, sectors_read: u64, writes: u64, sectors_written: u64) -> String {
    format!(
        "   8       1 {name} {reads} 0 {sectors_read} 0 {writes} 0 {sectors_written} 0 0 0 0\n"
    )
}

pub const MEMINFO: &str = "\
MemTotal:       16303428 kB
MemFree:         8123456 kB
Buffers:          234567 kB
Cached:          3456789 kB
SwapTotal:       2097148 kB
SwapFree:        2097148 kB
";

pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    /// Empty proc and sys roots.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("proc/net")).unwrap();
        std::fs::create_dir_all(dir.path().join("sys/block")).unwrap();
        Self { dir }
    }

    /// A host with load, memory, eth0 + lo, and sda1 backed by a 512-byte block device.
    pub fn populated() -> Self {
        let fixture = Self::new();
        fixture.write_proc("loadavg", "0.50 0.40 0.30 1/123 4567\n");
        fixture.write_proc("uptime", "3600.25 7200.50\n");
        fixture.write_proc("meminfo", MEMINFO);
        fixture.write_proc("net/dev", &net_dev(&[("lo", 10, 10), ("eth0", 1000, 2000)]));
        fixture.write_proc(
            "diskstats",
            &(diskstats_line("sda", 10, 100, 5, 50) + &diskstats_line("sda1", 20, 200, 8, 80)),
        );
        fixture.write_block_size("sda", 512);
        fixture
    }

    pub fn proc_root(&self) -> PathBuf {
        self.dir.path().join("proc")
    }

    pub fn sys_root(&self) -> PathBuf {
        self.dir.path().join("sys")
    }

    pub fn write_proc(&self, relative: &str, content: &str) {
        std::fs::write(self.proc_root().join(relative), content).unwrap();
    }

    pub fn remove_proc(&self, relative: &str) {
        std::fs::remove_file(self.proc_root().join(relative)).unwrap();
    }

    pub fn write_block_size(&self, device: &str, size: u32) {
        let queue = self.sys_root().join("block").join(device).join("queue");
        std::fs::create_dir_all(&queue).unwrap();
        std::fs::write(queue.join("physical_block_size"), format!("{size}\n")).unwrap();
    }

    /// Monitor config rooted at this fixture, with `stores` as the mounted filesystems.
    pub fn config(&self, stores: Vec<Arc<dyn FileStore>>) -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_millis(20),
            load_average_min_age: Duration::ZERO,
            interface_filter: Arc::new(AcceptAll),
            proc_root: self.proc_root(),
            sys_root: self.sys_root(),
            storage: StorageSource::Fixed(stores),
            ..MonitorConfig::default()
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// A filesystem with fixed capacity figures.
pub struct FixedStore {
    pub name: &'static str,
    pub fs_type: &'static str,
    pub total: u64,
    pub usable: u64,
    pub unallocated: u64,
}

impl FixedStore {
    pub fn ext4(name: &'static str) -> Arc<dyn FileStore> {
        Arc::new(FixedStore {
            name,
            fs_type: "ext4",
            total: 1_000_000,
            usable: 400_000,
            unallocated: 500_000,
        })
    }

    pub fn of_type(name: &'static str, fs_type: &'static str) -> Arc<dyn FileStore> {
        Arc::new(FixedStore {
            name,
            fs_type,
            total: 1,
            usable: 1,
            unallocated: 1,
        })
    }
}

impl FileStore for FixedStore {
    fn name(&self) -> &str {
        self.name
    }
    fn fs_type(&self) -> &str {
        self.fs_type
    }
    fn total_space(&self) -> CollectorResult<u64> {
        Ok(self.total)
    }
    fn usable_space(&self) -> CollectorResult<u64> {
        Ok(self.usable)
    }
    fn unallocated_space(&self) -> CollectorResult<u64> {
        Ok(self.unallocated)
    }
}
