// SystemMonitor end-to-end tests against fixture /proc and /sys trees

mod common;

use common::{FixedStore, Fixture, diskstats_line, net_dev};
use std::sync::Arc;
use std::time::Duration;
use sysmon::SystemMonitor;
use sysmon::filter::{AcceptNone, AcceptSet};
use sysmon::metrics::{GaugeValue, MetricSet, Registry};

fn meter_count(monitor: &SystemMonitor, bundle: &str, metric: &str) -> i64 {
    monitor.namespace()[bundle][metric].as_meter().unwrap().count()
}

fn gauge(monitor: &SystemMonitor, bundle: &str, metric: &str) -> GaugeValue {
    monitor.namespace()[bundle][metric].as_gauge().unwrap().value()
}

#[test]
fn test_namespace_keys() {
    let fixture = Fixture::populated();
    let monitor = SystemMonitor::build(fixture.config(vec![FixedStore::ext4("/dev/sda1")]));
    let keys: Vec<&str> = monitor.namespace().keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec![
            "blockdev.sda1",
            "dev/sda1",
            "iface.eth0",
            "iface.lo",
            "memory",
            "system"
        ]
    );
}

#[test]
fn test_interface_receive_bytes_delta() {
    let fixture = Fixture::populated();
    let monitor = SystemMonitor::build(fixture.config(vec![]));
    assert_eq!(meter_count(&monitor, "iface.eth0", "receive.bytes"), 0);

    fixture.write_proc("net/dev", &net_dev(&[("lo", 10, 10), ("eth0", 1500, 2000)]));
    monitor.poll_now();
    assert_eq!(meter_count(&monitor, "iface.eth0", "receive.bytes"), 500);
    assert_eq!(meter_count(&monitor, "iface.eth0", "transmit.bytes"), 0);
    assert_eq!(meter_count(&monitor, "iface.lo", "receive.bytes"), 0);
}

#[test]
fn test_interface_counters_beyond_signed_range() {
    let fixture = Fixture::new();
    let base = i64::MAX as u128 + 1_000;
    fixture.write_proc("net/dev", &net_dev(&[("eth0", base, 0)]));
    let monitor = SystemMonitor::build(fixture.config(vec![]));

    fixture.write_proc("net/dev", &net_dev(&[("eth0", base + 4096, 0)]));
    monitor.poll_now();
    assert_eq!(meter_count(&monitor, "iface.eth0", "receive.bytes"), 4096);
}

#[test]
fn test_counter_reset_reseeds_baseline() {
    let fixture = Fixture::populated();
    let monitor = SystemMonitor::build(fixture.config(vec![]));

    fixture.write_proc("net/dev", &net_dev(&[("lo", 10, 10), ("eth0", 100, 2000)]));
    monitor.poll_now();
    assert_eq!(meter_count(&monitor, "iface.eth0", "receive.bytes"), 0);

    fixture.write_proc("net/dev", &net_dev(&[("lo", 10, 10), ("eth0", 350, 2000)]));
    monitor.poll_now();
    assert_eq!(meter_count(&monitor, "iface.eth0", "receive.bytes"), 250);
}

#[test]
fn test_block_device_bytes_read_delta() {
    let fixture = Fixture::populated();
    let monitor = SystemMonitor::build(fixture.config(vec![FixedStore::ext4("/dev/sda1")]));

    fixture.write_proc(
        "diskstats",
        &(diskstats_line("sda", 10, 100, 5, 50) + &diskstats_line("sda1", 21, 300, 8, 80)),
    );
    monitor.poll_now();
    assert_eq!(meter_count(&monitor, "blockdev.sda1", "bytes-read"), 51_200);
    assert_eq!(meter_count(&monitor, "blockdev.sda1", "read-ops"), 1);
    assert_eq!(meter_count(&monitor, "blockdev.sda1", "bytes-written"), 0);
}

#[test]
fn test_block_device_without_block_size_reports_zero_bytes() {
    let fixture = Fixture::new();
    fixture.write_proc("diskstats", &diskstats_line("vdb1", 1, 100, 1, 100));
    let monitor = SystemMonitor::build(fixture.config(vec![FixedStore::ext4("/dev/vdb1")]));

    fixture.write_proc("diskstats", &diskstats_line("vdb1", 5, 900, 3, 700));
    monitor.poll_now();
    assert_eq!(meter_count(&monitor, "blockdev.vdb1", "read-ops"), 4);
    assert_eq!(meter_count(&monitor, "blockdev.vdb1", "bytes-read"), 0);
    assert_eq!(meter_count(&monitor, "blockdev.vdb1", "bytes-written"), 0);
}

#[test]
fn test_block_devices_follow_accepted_filesystems() {
    let fixture = Fixture::populated();
    let stores = vec![
        FixedStore::ext4("/dev/sda1"),
        FixedStore::of_type("tmpfs", "tmpfs"),
    ];
    let monitor = SystemMonitor::build(fixture.config(stores));
    let ns = monitor.namespace();
    assert!(ns.contains_key("blockdev.sda1"));
    assert!(!ns.contains_key("blockdev.sda"));
    assert!(!ns.contains_key("tmpfs"));
}

#[test]
fn test_rejected_filesystem_type_hides_its_block_device() {
    let fixture = Fixture::populated();
    let monitor = SystemMonitor::build(
        fixture.config(vec![FixedStore::of_type("/dev/sda1", "squashfs")]),
    );
    assert!(!monitor.namespace().contains_key("dev/sda1"));
    assert!(!monitor.namespace().contains_key("blockdev.sda1"));
}

#[test]
fn test_filesystem_gauges() {
    let fixture = Fixture::populated();
    let monitor = SystemMonitor::build(fixture.config(vec![FixedStore::ext4("/dev/sda1")]));
    assert_eq!(gauge(&monitor, "dev/sda1", "total"), GaugeValue::Integer(1_000_000));
    assert_eq!(gauge(&monitor, "dev/sda1", "usable"), GaugeValue::Integer(400_000));
    assert_eq!(gauge(&monitor, "dev/sda1", "unallocated"), GaugeValue::Integer(500_000));
}

#[test]
fn test_duplicate_filesystem_keeps_first() {
    let fixture = Fixture::populated();
    let monitor = SystemMonitor::build(fixture.config(vec![
        FixedStore::ext4("/dev/sda1"),
        FixedStore::of_type("/dev/sda1", "ext4"),
    ]));
    assert_eq!(gauge(&monitor, "dev/sda1", "total"), GaugeValue::Integer(1_000_000));
}

#[test]
fn test_interface_filter() {
    let fixture = Fixture::populated();

    let mut config = fixture.config(vec![]);
    config.interface_filter = Arc::new(AcceptSet::new(["eth0"]));
    let monitor = SystemMonitor::build(config);
    assert!(monitor.namespace().contains_key("iface.eth0"));
    assert!(!monitor.namespace().contains_key("iface.lo"));

    let mut config = fixture.config(vec![]);
    config.interface_filter = Arc::new(AcceptNone);
    let monitor = SystemMonitor::build(config);
    assert!(!monitor.namespace().keys().any(|k| k.starts_with("iface.")));
}

#[test]
fn test_default_interface_filter() {
    let fixture = Fixture::new();
    fixture.write_proc(
        "net/dev",
        &net_dev(&[("lo", 0, 0), ("eth1", 0, 0), ("docker0", 0, 0), ("wlan0", 0, 0)]),
    );
    let mut config = fixture.config(vec![]);
    config.interface_filter = sysmon::filter::default_interface_filter();
    let monitor = SystemMonitor::build(config);
    let ns = monitor.namespace();
    assert!(ns.contains_key("iface.lo"));
    assert!(ns.contains_key("iface.eth1"));
    assert!(ns.contains_key("iface.wlan0"));
    assert!(!ns.contains_key("iface.docker0"));
}

#[test]
fn test_missing_loadavg_reports_zero() {
    let fixture = Fixture::populated();
    fixture.remove_proc("loadavg");
    let monitor = SystemMonitor::build(fixture.config(vec![]));
    for metric in ["load-avg-1m", "load-avg-5m", "load-avg-15m"] {
        assert_eq!(gauge(&monitor, "system", metric), GaugeValue::Float(0.0));
    }
    assert_eq!(gauge(&monitor, "system", "system-uptime"), GaugeValue::Float(3600.25));
}

#[test]
fn test_load_average_gauges() {
    let fixture = Fixture::populated();
    let monitor = SystemMonitor::build(fixture.config(vec![]));
    assert_eq!(gauge(&monitor, "system", "load-avg-1m"), GaugeValue::Float(0.5));
    assert_eq!(gauge(&monitor, "system", "load-avg-15m"), GaugeValue::Float(0.3));
    assert_eq!(gauge(&monitor, "system", "processor-idle-time"), GaugeValue::Float(7200.5));
}

#[test]
fn test_empty_proc_root_degrades_gracefully() {
    let fixture = Fixture::new();
    let monitor = SystemMonitor::build(fixture.config(vec![]));
    let keys: Vec<&str> = monitor.namespace().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["system"]);
    monitor.poll_now();
}

#[test]
fn test_memory_gauges_follow_refresh() {
    let fixture = Fixture::populated();
    let monitor = SystemMonitor::build(fixture.config(vec![]));
    assert_eq!(gauge(&monitor, "memory", "memtotal"), GaugeValue::Integer(16_303_428));
    assert_eq!(gauge(&monitor, "memory", "swapcached"), GaugeValue::Integer(0));

    fixture.write_proc("meminfo", "MemTotal: 16303428 kB\nSwapCached: 42 kB\n");
    monitor.poll_now();
    assert_eq!(gauge(&monitor, "memory", "memfree"), GaugeValue::Integer(0));
    assert_eq!(gauge(&monitor, "memory", "swapcached"), GaugeValue::Integer(42));
}

#[test]
fn test_vanished_interface_keeps_previous_values() {
    let fixture = Fixture::populated();
    let monitor = SystemMonitor::build(fixture.config(vec![]));
    fixture.write_proc("net/dev", &net_dev(&[("lo", 10, 10), ("eth0", 1500, 2000)]));
    monitor.poll_now();

    fixture.write_proc("net/dev", &net_dev(&[("lo", 20, 20)]));
    monitor.poll_now();
    assert_eq!(meter_count(&monitor, "iface.eth0", "receive.bytes"), 500);
    assert_eq!(meter_count(&monitor, "iface.lo", "receive.bytes"), 10);
}

#[test]
fn test_register_with_uses_dotted_names() {
    let fixture = Fixture::populated();
    let monitor = SystemMonitor::build(fixture.config(vec![FixedStore::ext4("/dev/sda1")]));
    let registry = Registry::new();
    monitor.register_with(&registry);

    assert_eq!(registry.len(), monitor.metrics().len());
    assert!(registry.get("system.load-avg-1m").is_some());
    assert!(registry.get("memory.memtotal").is_some());
    assert!(registry.get("iface.eth0.receive.bytes").is_some());
    assert!(registry.get("dev/sda1.usable").is_some());
    assert!(registry.get("blockdev.sda1.bytes-written").is_some());
}

#[test]
fn test_scheduler_polls_and_stops() {
    let fixture = Fixture::populated();
    let monitor = SystemMonitor::new(fixture.config(vec![]));
    assert!(monitor.is_running());

    fixture.write_proc("net/dev", &net_dev(&[("lo", 10, 10), ("eth0", 1500, 2000)]));
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while meter_count(&monitor, "iface.eth0", "receive.bytes") != 500 {
        assert!(std::time::Instant::now() < deadline, "scheduler never polled");
        std::thread::sleep(Duration::from_millis(10));
    }

    monitor.shutdown();
    std::thread::sleep(Duration::from_millis(100));
    assert!(!monitor.is_running());
    fixture.write_proc("net/dev", &net_dev(&[("lo", 10, 10), ("eth0", 9000, 2000)]));
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(meter_count(&monitor, "iface.eth0", "receive.bytes"), 500);
}
