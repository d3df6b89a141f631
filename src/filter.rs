// Name filters deciding which devices, interfaces and filesystem types get instrumented.

use std::collections::HashSet;
use std::sync::Arc;

/// A pure predicate over device, interface or filesystem-type names.
pub trait KeyFilter: Send + Sync {
    /// Should the name be instrumented?
    fn accept(&self, key: &str) -> bool;
}

/// Accepts every name.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl KeyFilter for AcceptAll {
    fn accept(&self, _key: &str) -> bool {
        true
    }
}

/// Accepts no name.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptNone;

impl KeyFilter for AcceptNone {
    fn accept(&self, _key: &str) -> bool {
        false
    }
}

/// Accepts only names in a fixed set (exact, case-sensitive).
#[derive(Debug, Clone, Default)]
pub struct AcceptSet {
    allowed: HashSet<String>,
}

impl AcceptSet {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl KeyFilter for AcceptSet {
    fn accept(&self, key: &str) -> bool {
        self.allowed.contains(key)
    }
}

/// Accepts exact names plus anything starting with one of the prefixes.
#[derive(Debug, Clone, Default)]
pub struct AcceptPrefixes {
    exact: HashSet<String>,
    prefixes: Vec<String>,
}

impl AcceptPrefixes {
    pub fn new<E, P>(exact: E, prefixes: P) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            exact: exact.into_iter().map(Into::into).collect(),
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }
}

impl KeyFilter for AcceptPrefixes {
    fn accept(&self, key: &str) -> bool {
        self.exact.contains(key) || self.prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }
}

/// Default interface filter: `lo`, `eth*`, `bond*`, `wlan*`.
pub fn default_interface_filter() -> Arc<dyn KeyFilter> {
    Arc::new(AcceptPrefixes::new(["lo"], ["eth", "bond", "wlan"]))
}

/// Filesystem types instrumented by default.
pub const DEFAULT_STORAGE_TYPES: &[&str] = &[
    "minix", "ext", "ext2", "ext3", "ext4", "Reiserfs", "XFS", "JFS", "xia", "msdos", "umsdos",
    "vfat", "ntfs", "nfs", "iso9660", "hpfs", "sysv", "smb", "ncpfs",
];

/// Default filesystem type filter built from [`DEFAULT_STORAGE_TYPES`].
pub fn default_storage_type_filter() -> Arc<dyn KeyFilter> {
    Arc::new(AcceptSet::new(DEFAULT_STORAGE_TYPES.iter().copied()))
}
