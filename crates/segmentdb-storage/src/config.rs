//! Store configuration.

/// Path sentinel selecting a non-persistent store.
pub const IN_MEMORY: &str = ":memory:";

/// When the persistence log is fsynced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    /// Leave flushing to the operating system.
    #[default]
    Never,
    /// Sync on the first commit at least one second after the previous sync.
    EverySecond,
    /// Sync every commit.
    Always,
}

/// Persistence knobs for a store.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Fsync policy for the persistence log.
    pub sync_policy: SyncPolicy,
    /// Rewrite the log as a snapshot once it has grown by this percentage
    /// over the post-shrink baseline. `None` disables shrinking.
    pub auto_shrink_percentage: Option<u64>,
    /// Never shrink while the log is smaller than this many bytes.
    pub auto_shrink_min_size: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sync_policy: SyncPolicy::Never,
            auto_shrink_percentage: None,
            auto_shrink_min_size: 0,
        }
    }
}
