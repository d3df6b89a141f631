// SystemMonitor: builds every collector, merges their metric bundles into one namespace
// and drives the stateful ones from a single shared scheduler.

use crate::collectors::{
    BlockDevices, FileStore, LoadAverage, MemoryInfo, NetworkDevices, Refresh, Storage,
    meminfo::DEFAULT_MEMINFO_KEYS,
};
use crate::filter::{KeyFilter, default_interface_filter, default_storage_type_filter};
use crate::metrics::{MetricBundle, MetricSet, MetricSink};
use crate::scheduler::{self, Scheduler};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Namespace key of the load average and uptime bundle.
pub const SYSTEM_KEY: &str = "system";
/// Namespace key of the memory bundle.
pub const MEMORY_KEY: &str = "memory";
pub const INTERFACE_PREFIX: &str = "iface.";
pub const BLOCK_DEVICE_PREFIX: &str = "blockdev.";

/// Merged metric bundles keyed by collector namespace (`system`, `iface.eth0`, ...).
pub type Namespace = BTreeMap<String, MetricBundle>;

/// Where filesystems are enumerated from.
#[derive(Clone, Default)]
pub enum StorageSource {
    /// The OS mount table.
    #[default]
    Mounted,
    /// A fixed set of stores.
    Fixed(Vec<Arc<dyn FileStore>>),
}

#[derive(Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    /// Minimum age before a load average read re-parses its sources.
    pub load_average_min_age: Duration,
    pub meminfo_keys: Vec<String>,
    pub storage_type_filter: Arc<dyn KeyFilter>,
    pub interface_filter: Arc<dyn KeyFilter>,
    pub proc_root: PathBuf,
    pub sys_root: PathBuf,
    pub storage: StorageSource,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            load_average_min_age: Duration::from_secs(10),
            meminfo_keys: DEFAULT_MEMINFO_KEYS.iter().map(|k| k.to_string()).collect(),
            storage_type_filter: default_storage_type_filter(),
            interface_filter: default_interface_filter(),
            proc_root: PathBuf::from("/proc"),
            sys_root: PathBuf::from("/sys"),
            storage: StorageSource::Mounted,
        }
    }
}

pub struct SystemMonitor {
    namespace: Namespace,
    collectors: Vec<Arc<dyn Refresh>>,
    poll_interval: Duration,
    scheduler: Mutex<Option<Scheduler>>,
}

impl SystemMonitor {
    /// Builds every collector and starts polling.
    ///
    /// Never fails: a collector that cannot be built is logged and left out.
    pub fn new(config: MonitorConfig) -> Self {
        let monitor = Self::build(config);
        if let Err(e) = monitor.start() {
            error!(error = %e, "failed to start scheduler; metrics will not update");
        }
        monitor
    }

    /// Builds every collector without starting the scheduler.
    #[instrument(skip(config), fields(proc_root = %config.proc_root.display()))]
    pub fn build(config: MonitorConfig) -> Self {
        let mut builder = NamespaceBuilder::default();

        let load = Arc::new(LoadAverage::new(
            &config.proc_root,
            config.load_average_min_age,
        ));
        builder.insert(SYSTEM_KEY.to_string(), load.metrics());
        builder.collectors.push(load);

        match MemoryInfo::new(&config.proc_root, &config.meminfo_keys) {
            Ok(memory) => {
                let memory = Arc::new(memory);
                builder.insert(MEMORY_KEY.to_string(), memory.metrics());
                builder.collectors.push(memory);
            }
            Err(e) => error!(collector = "memory", error = %e, "unable to instrument memory"),
        }

        match NetworkDevices::new(&config.proc_root) {
            Ok(devices) => {
                for iface in devices.interfaces() {
                    if config.interface_filter.accept(iface.name()) {
                        builder.insert(format!("{INTERFACE_PREFIX}{}", iface.name()), iface.metrics());
                    } else {
                        debug!(interface = iface.name(), "interface filtered out");
                    }
                }
                builder.collectors.push(Arc::new(devices));
            }
            Err(e) => error!(
                collector = "network",
                error = %e,
                "unable to instrument network interfaces"
            ),
        }

        let storage = match config.storage {
            StorageSource::Mounted => Storage::mounted(),
            StorageSource::Fixed(stores) => Storage::from_stores(stores),
        };
        let mut backing_devices = HashSet::new();
        for fs in storage.into_filesystems() {
            if !config.storage_type_filter.accept(fs.fs_type()) {
                debug!(filesystem = fs.name(), fs_type = fs.fs_type(), "filesystem filtered out");
                continue;
            }
            if builder.insert(fs.name().to_string(), fs.metrics()) {
                backing_devices.insert(fs.device_name().to_string());
            }
        }

        match BlockDevices::new(&config.proc_root, &config.sys_root) {
            Ok(devices) => {
                for device in devices.devices() {
                    if backing_devices.contains(device.name()) {
                        builder.insert(
                            format!("{BLOCK_DEVICE_PREFIX}{}", device.name()),
                            device.metrics(),
                        );
                    }
                }
                builder.collectors.push(Arc::new(devices));
            }
            Err(e) => error!(
                collector = "block_devices",
                error = %e,
                "unable to instrument block devices"
            ),
        }

        info!(
            bundles = builder.namespace.len(),
            collectors = builder.collectors.len(),
            "System monitor built"
        );

        Self {
            namespace: builder.namespace,
            collectors: builder.collectors,
            poll_interval: config.poll_interval,
            scheduler: Mutex::new(None),
        }
    }

    /// Starts the shared scheduler. A no-op if it is already running.
    pub fn start(&self) -> std::io::Result<()> {
        let mut scheduler = self.scheduler.lock().unwrap_or_else(|e| e.into_inner());
        if scheduler.is_none() {
            *scheduler = Some(Scheduler::spawn(
                self.poll_interval,
                self.collectors.clone(),
            )?);
        }
        Ok(())
    }

    /// Refreshes every stateful collector once, on the calling thread.
    pub fn poll_now(&self) {
        scheduler::poll_once(&self.collectors);
    }

    /// Stops future polls. Exposed metrics keep their last values.
    pub fn shutdown(&self) {
        let scheduler = self.scheduler.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(scheduler) = scheduler {
            scheduler.shutdown();
            info!("System monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.scheduler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(Scheduler::is_running)
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Publishes every metric into `sink` as `<namespace key>.<metric name>`.
    pub fn register_with(&self, sink: &dyn MetricSink) {
        for (name, metric) in self.metrics() {
            sink.register(&name, metric);
        }
    }
}

impl MetricSet for SystemMonitor {
    /// The namespace flattened to dotted names.
    fn metrics(&self) -> MetricBundle {
        self.namespace
            .iter()
            .flat_map(|(key, bundle)| {
                bundle
                    .iter()
                    .map(move |(name, metric)| (format!("{key}.{name}"), metric.clone()))
            })
            .collect()
    }
}

impl Drop for SystemMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Default)]
struct NamespaceBuilder {
    namespace: Namespace,
    collectors: Vec<Arc<dyn Refresh>>,
}

impl NamespaceBuilder {
    /// Adds a bundle; the first bundle under a key wins.
    fn insert(&mut self, key: String, bundle: MetricBundle) -> bool {
        if self.namespace.contains_key(&key) {
            warn!(key = %key, "duplicate namespace key; keeping the first");
            return false;
        }
        self.namespace.insert(key, bundle);
        true
    }
}
