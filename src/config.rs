use crate::collectors::meminfo::DEFAULT_MEMINFO_KEYS;
use crate::filter::{
    AcceptAll, AcceptNone, AcceptSet, DEFAULT_STORAGE_TYPES, KeyFilter, default_interface_filter,
};
use crate::monitor::{MonitorConfig, StorageSource};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub monitor: MonitorSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSettings {
    pub poll_interval_secs: u64,
    /// Load average reads within this age reuse the previous parse.
    #[serde(default = "default_load_average_min_age_secs")]
    pub load_average_min_age_secs: u64,
    #[serde(default = "default_meminfo_keys")]
    pub meminfo_keys: Vec<String>,
    #[serde(default = "default_storage_types")]
    pub storage_types: Vec<String>,
    #[serde(default)]
    pub interfaces: InterfaceSelection,
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,
    #[serde(default = "default_sys_root")]
    pub sys_root: PathBuf,
}

fn default_load_average_min_age_secs() -> u64 {
    10
}

fn default_meminfo_keys() -> Vec<String> {
    DEFAULT_MEMINFO_KEYS.iter().map(|k| k.to_string()).collect()
}

fn default_storage_types() -> Vec<String> {
    DEFAULT_STORAGE_TYPES.iter().map(|t| t.to_string()).collect()
}

fn default_proc_root() -> PathBuf {
    PathBuf::from("/proc")
}

fn default_sys_root() -> PathBuf {
    PathBuf::from("/sys")
}

/// `interfaces = "default" | "all" | "none"`, or an explicit list of names.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InterfaceSelection {
    Preset(InterfacePreset),
    Only(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfacePreset {
    Default,
    All,
    None,
}

impl Default for InterfaceSelection {
    fn default() -> Self {
        InterfaceSelection::Preset(InterfacePreset::Default)
    }
}

impl InterfaceSelection {
    pub fn filter(&self) -> Arc<dyn KeyFilter> {
        match self {
            InterfaceSelection::Preset(InterfacePreset::Default) => default_interface_filter(),
            InterfaceSelection::Preset(InterfacePreset::All) => Arc::new(AcceptAll),
            InterfaceSelection::Preset(InterfacePreset::None) => Arc::new(AcceptNone),
            InterfaceSelection::Only(names) => Arc::new(AcceptSet::new(names.iter().cloned())),
        }
    }
}

impl MonitorSettings {
    /// Monitor configuration enumerating the OS mount table.
    pub fn to_monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            load_average_min_age: Duration::from_secs(self.load_average_min_age_secs),
            meminfo_keys: self.meminfo_keys.clone(),
            storage_type_filter: Arc::new(AcceptSet::new(self.storage_types.iter().cloned())),
            interface_filter: self.interfaces.filter(),
            proc_root: self.proc_root.clone(),
            sys_root: self.sys_root.clone(),
            storage: StorageSource::Mounted,
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.server.host.is_empty(),
            "server.host must be non-empty"
        );
        anyhow::ensure!(
            self.monitor.poll_interval_secs > 0,
            "monitor.poll_interval_secs must be > 0, got {}",
            self.monitor.poll_interval_secs
        );
        anyhow::ensure!(
            !self.monitor.meminfo_keys.iter().any(|k| k.trim().is_empty()),
            "monitor.meminfo_keys must not contain empty keys"
        );
        anyhow::ensure!(
            !self.monitor.proc_root.as_os_str().is_empty(),
            "monitor.proc_root must be non-empty"
        );
        anyhow::ensure!(
            !self.monitor.sys_root.as_os_str().is_empty(),
            "monitor.sys_root must be non-empty"
        );
        Ok(())
    }
}
