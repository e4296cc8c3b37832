//! Opening configuration.

use segmentdb_storage::{StorageConfig, SyncPolicy};

/// Path sentinel selecting a non-persistent store.
pub use segmentdb_storage::IN_MEMORY;

const SHRINK_MIN_SIZE: u64 = 32 * 1024 * 1024;

/// Durability preset for the underlying store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Durability {
    /// Never sync, never auto-shrink. The default, and the only sensible
    /// choice for `":memory:"` stores.
    #[default]
    Ram,
    /// Sync every second; auto-shrink at 100% growth over a 32 MiB floor.
    FastSync,
    /// Sync on every write; auto-shrink at 50% growth over a 32 MiB floor.
    Disk,
}

impl Durability {
    pub(crate) fn storage_config(self) -> StorageConfig {
        match self {
            Durability::Ram => StorageConfig {
                sync_policy: SyncPolicy::Never,
                auto_shrink_percentage: None,
                auto_shrink_min_size: 0,
            },
            Durability::FastSync => StorageConfig {
                sync_policy: SyncPolicy::EverySecond,
                auto_shrink_percentage: Some(100),
                auto_shrink_min_size: SHRINK_MIN_SIZE,
            },
            Durability::Disk => StorageConfig {
                sync_policy: SyncPolicy::Always,
                auto_shrink_percentage: Some(50),
                auto_shrink_min_size: SHRINK_MIN_SIZE,
            },
        }
    }
}

/// Opening configuration for a [`crate::Database`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Filesystem path of the store, or [`IN_MEMORY`].
    pub path: String,
    /// Durability preset.
    pub durability: Durability,
}

impl Default for Config {
    fn default() -> Self {
        Self { path: IN_MEMORY.to_owned(), durability: Durability::Ram }
    }
}

impl Config {
    /// Configuration for a persistent store at `path`.
    #[must_use]
    pub fn at_path(path: impl Into<String>, durability: Durability) -> Self {
        Self { path: path.into(), durability }
    }
}
