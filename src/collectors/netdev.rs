// Per-interface traffic counters from /proc/net/dev, exposed as rate meters.
//
// Inter-|   Receive                                                |  Transmit
//  face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
//     lo:  456216    3221    0    0    0     0          0         0   456216    3221    0    0    0     0       0          0
//   eth0: 33000242   44804    0    0    0     0          0      1111  5700898   26543    0    0    0     0       0          0

use super::{Refresh, counter_delta, parse_counter};
use crate::error::{CollectorError, CollectorResult, read_source};
use crate::metrics::{Meter, Metric, MetricBundle, MetricSet};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument, warn};

const HEADER_LINES: usize = 2;

/// One network interface: a meter per counter column plus the last raw values.
#[derive(Debug)]
pub struct Interface {
    name: String,
    meters: Vec<Arc<Meter>>,
    metrics: MetricBundle,
    last: Mutex<Vec<u128>>,
}

impl Interface {
    fn new(name: String, keys: &[String], seed: Vec<u128>) -> Self {
        let meters: Vec<Arc<Meter>> = keys.iter().map(|_| Arc::new(Meter::new())).collect();
        let metrics: MetricBundle = keys
            .iter()
            .cloned()
            .zip(meters.iter().map(|m| Metric::Meter(m.clone())))
            .collect();
        Self {
            name,
            meters,
            metrics,
            last: Mutex::new(seed),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Marks each meter with the increase since the last poll and stores `values`
    /// as the new baseline. A counter that went backwards is reseeded without marking.
    fn mark(&self, values: &[u128]) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        for ((meter, prev), &curr) in self.meters.iter().zip(last.iter()).zip(values) {
            match counter_delta(*prev, curr) {
                Some(delta) => meter.mark(delta),
                None => debug!(
                    interface = %self.name,
                    prev = %prev,
                    curr = %curr,
                    "counter went backwards; reseeding"
                ),
            }
        }
        *last = values.to_vec();
    }
}

impl MetricSet for Interface {
    fn metrics(&self) -> MetricBundle {
        self.metrics.clone()
    }
}

/// Counter names (`receive.<name>`, `transmit.<name>`) from the second header line.
fn parse_header(header: &str, location: &str) -> CollectorResult<Vec<String>> {
    let sections: Vec<&str> = header.split('|').map(str::trim).collect();
    let [_face, receive, transmit, ..] = sections.as_slice() else {
        return Err(CollectorError::invalid_format(
            location,
            format!("expected 'face|receive|transmit' header, got {header:?}"),
        ));
    };
    let keys: Vec<String> = receive
        .split_whitespace()
        .map(|k| format!("receive.{k}"))
        .chain(transmit.split_whitespace().map(|k| format!("transmit.{k}")))
        .collect();
    if keys.is_empty() {
        return Err(CollectorError::invalid_format(location, "header names no counters"));
    }
    Ok(keys)
}

/// Interface name as used in metric names: the trailing colon dropped, inner colons as dots.
fn clean_name(raw: &str) -> String {
    raw.trim().replace(':', ".")
}

/// Splits `"  eth0: 1 2 3"` (or the glued `"eth0:1 2 3"`) into a cleaned name and counters.
fn parse_interface_line(
    line: &str,
    expected: usize,
    location: &str,
) -> CollectorResult<(String, Vec<u128>)> {
    let Some((raw_name, rest)) = line.rsplit_once(':') else {
        return Err(CollectorError::invalid_format(
            location,
            format!("no interface separator in {line:?}"),
        ));
    };
    let name = clean_name(raw_name);
    if name.is_empty() {
        return Err(CollectorError::invalid_format(location, "empty interface name"));
    }
    let values = rest
        .split_whitespace()
        .map(|token| parse_counter(token, &name, location))
        .collect::<CollectorResult<Vec<u128>>>()?;
    if values.len() != expected {
        return Err(CollectorError::invalid_format(
            location,
            format!("{name}: expected {expected} counters, got {}", values.len()),
        ));
    }
    Ok((name, values))
}

/// Parses everything below the header. Any malformed line fails the whole parse.
fn parse_body(
    content: &str,
    keys: &[String],
    location: &str,
) -> CollectorResult<Vec<(String, Vec<u128>)>> {
    content
        .lines()
        .skip(HEADER_LINES)
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_interface_line(line, keys.len(), location))
        .collect()
}

/// All network interfaces listed in /proc/net/dev at construction time.
pub struct NetworkDevices {
    path: PathBuf,
    keys: Vec<String>,
    interfaces: BTreeMap<String, Arc<Interface>>,
    refresh_lock: Mutex<()>,
}

impl NetworkDevices {
    /// Reads the header and seeds every interface from the first poll. No rates yet.
    pub fn new(proc_root: &Path) -> CollectorResult<Self> {
        let path = proc_root.join("net").join("dev");
        let location = path.display().to_string();
        let content = read_source(&path)?;

        let mut lines = content.lines();
        let (Some(_), Some(header)) = (lines.next(), lines.next()) else {
            return Err(CollectorError::invalid_format(&location, "fewer than two header lines"));
        };
        let keys = parse_header(header, &location)?;

        let mut interfaces = BTreeMap::new();
        for line in lines.filter(|line| !line.trim().is_empty()) {
            let (name, seed) = match parse_interface_line(line, keys.len(), &location) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(error = %e, "skipping malformed interface line");
                    continue;
                }
            };
            if interfaces.contains_key(&name) {
                warn!(interface = %name, "duplicate interface name; keeping the first");
                continue;
            }
            let iface = Interface::new(name.clone(), &keys, seed);
            interfaces.insert(name, Arc::new(iface));
        }

        Ok(Self {
            path,
            keys,
            interfaces,
            refresh_lock: Mutex::new(()),
        })
    }

    /// Counter names shared by every interface, in column order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &Arc<Interface>> {
        self.interfaces.values()
    }

    pub fn interface(&self, name: &str) -> Option<&Arc<Interface>> {
        self.interfaces.get(name)
    }
}

impl Refresh for NetworkDevices {
    fn name(&self) -> &'static str {
        "network_devices"
    }

    /// A read or parse failure leaves every baseline untouched, so the next good
    /// poll reports the increase over the longer interval.
    #[instrument(skip(self), fields(collector = "network_devices"))]
    fn refresh(&self) -> CollectorResult<()> {
        let _serial = self.refresh_lock.lock().unwrap_or_else(|e| e.into_inner());
        let location = self.path.display().to_string();
        let content = read_source(&self.path)?;
        if content.lines().count() < HEADER_LINES {
            return Err(CollectorError::invalid_format(&location, "fewer than two header lines"));
        }
        let rows = parse_body(&content, &self.keys, &location)?;

        let mut seen = HashSet::new();
        for (name, values) in rows {
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(iface) = self.interfaces.get(&name) {
                iface.mark(&values);
            }
        }
        Ok(())
    }
}
