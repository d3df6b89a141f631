// Linux host metrics: kernel counters republished as gauges and rate meters

pub mod collectors;
pub mod config;
pub mod error;
pub mod filter;
pub mod metrics;
pub mod monitor;
pub mod routes;
pub mod scheduler;
pub mod version;

pub use error::{CollectorError, CollectorResult};
pub use monitor::{MonitorConfig, StorageSource, SystemMonitor};
