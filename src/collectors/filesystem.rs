// Mounted filesystems with live capacity gauges. No polling: every read queries the mount.

use crate::error::{CollectorError, CollectorResult};
use crate::metrics::{Gauge, MetricBundle, MetricSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sysinfo::Disks;
use tracing::trace;

/// A mounted filesystem whose capacity can be queried on demand.
pub trait FileStore: Send + Sync {
    /// Device or source name as reported by the mount table, e.g. `/dev/sda1`.
    fn name(&self) -> &str;
    /// Filesystem type, e.g. `ext4`.
    fn fs_type(&self) -> &str;
    fn total_space(&self) -> CollectorResult<u64>;
    fn usable_space(&self) -> CollectorResult<u64>;
    fn unallocated_space(&self) -> CollectorResult<u64>;
}

/// A filesystem from the OS mount table, sized with `statvfs(3)`.
#[derive(Debug, Clone)]
pub struct MountedStore {
    name: String,
    fs_type: String,
    mount_point: PathBuf,
}

#[derive(Debug, Clone, Copy)]
struct Capacity {
    total: u64,
    usable: u64,
    unallocated: u64,
}

impl MountedStore {
    pub fn new(name: impl Into<String>, fs_type: impl Into<String>, mount_point: &Path) -> Self {
        Self {
            name: name.into(),
            fs_type: fs_type.into(),
            mount_point: mount_point.to_path_buf(),
        }
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    #[cfg(unix)]
    fn capacity(&self) -> CollectorResult<Capacity> {
        use std::os::unix::ffi::OsStrExt;

        let statvfs_err = |source| CollectorError::Statvfs {
            path: self.mount_point.display().to_string(),
            source,
        };
        let c_path = std::ffi::CString::new(self.mount_point.as_os_str().as_bytes())
            .map_err(|e| statvfs_err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;

        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        // SAFETY: c_path is NUL-terminated and stat is a valid out-pointer.
        let result = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if result != 0 {
            return Err(statvfs_err(std::io::Error::last_os_error()));
        }

        let frsize = stat.f_frsize as u64;
        Ok(Capacity {
            total: (stat.f_blocks as u64).saturating_mul(frsize),
            usable: (stat.f_bavail as u64).saturating_mul(frsize),
            unallocated: (stat.f_bfree as u64).saturating_mul(frsize),
        })
    }

    #[cfg(not(unix))]
    fn capacity(&self) -> CollectorResult<Capacity> {
        Err(CollectorError::Statvfs {
            path: self.mount_point.display().to_string(),
            source: std::io::Error::from(std::io::ErrorKind::Unsupported),
        })
    }
}

impl FileStore for MountedStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn fs_type(&self) -> &str {
        &self.fs_type
    }

    fn total_space(&self) -> CollectorResult<u64> {
        self.capacity().map(|c| c.total)
    }

    fn usable_space(&self) -> CollectorResult<u64> {
        self.capacity().map(|c| c.usable)
    }

    fn unallocated_space(&self) -> CollectorResult<u64> {
        self.capacity().map(|c| c.unallocated)
    }
}

/// One filesystem's capacity gauges: `total`, `usable`, `unallocated` (bytes).
pub struct Filesystem {
    name: String,
    fs_type: String,
    metrics: MetricBundle,
}

impl Filesystem {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        let name = store
            .name()
            .strip_prefix('/')
            .unwrap_or(store.name())
            .to_string();
        let fs_type = store.fs_type().to_string();

        let gauge = |read: fn(&dyn FileStore) -> CollectorResult<u64>| {
            let store = store.clone();
            Gauge::new(move || {
                read(store.as_ref()).unwrap_or_else(|e| {
                    trace!(filesystem = store.name(), error = %e, "capacity read failed");
                    0
                })
            })
        };

        let mut metrics = MetricBundle::new();
        metrics.insert("total".into(), gauge(|s| s.total_space()).into());
        metrics.insert("usable".into(), gauge(|s| s.usable_space()).into());
        metrics.insert("unallocated".into(), gauge(|s| s.unallocated_space()).into());

        Self {
            name,
            fs_type,
            metrics,
        }
    }

    /// Name with one leading `/` removed, e.g. `dev/sda1`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fs_type(&self) -> &str {
        &self.fs_type
    }

    /// Block device backing this filesystem: the last segment of a two-segment
    /// `group/device` name (`dev/sda1` -> `sda1`), otherwise the whole name.
    pub fn device_name(&self) -> &str {
        match self.name.split_once('/') {
            Some((_, device)) if !device.is_empty() && !device.contains('/') => device,
            _ => &self.name,
        }
    }
}

impl MetricSet for Filesystem {
    fn metrics(&self) -> MetricBundle {
        self.metrics.clone()
    }
}

/// Every filesystem mounted when the collector was built.
pub struct Storage {
    filesystems: Vec<Filesystem>,
}

impl Storage {
    /// Enumerates the OS mount table.
    pub fn mounted() -> Self {
        let disks = Disks::new_with_refreshed_list();
        let stores = disks
            .list()
            .iter()
            .map(|d| {
                Arc::new(MountedStore::new(
                    d.name().to_string_lossy(),
                    d.file_system().to_string_lossy(),
                    d.mount_point(),
                )) as Arc<dyn FileStore>
            })
            .collect();
        Self::from_stores(stores)
    }

    pub fn from_stores(stores: Vec<Arc<dyn FileStore>>) -> Self {
        Self {
            filesystems: stores.into_iter().map(Filesystem::new).collect(),
        }
    }

    pub fn filesystems(&self) -> &[Filesystem] {
        &self.filesystems
    }

    pub(crate) fn into_filesystems(self) -> Vec<Filesystem> {
        self.filesystems
    }
}
