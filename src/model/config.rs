use serde::{Deserialize, Serialize};

/// Configuration from config.toml in the data directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tasks: TasksConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub complete: CompleteConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Whether an explicit single delete may remove locked tasks.
///
/// Bulk clear always skips locked subtrees; this only governs `delete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockPolicy {
    /// Refuse to delete a task that is locked, sits under a locked ancestor,
    /// or has a locked descendant
    #[default]
    Protect,
    /// Delete regardless of locks
    Allow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TasksConfig {
    #[serde(default)]
    pub locked_delete: LockPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Keep serialized ids, display orders and locks when importing
    #[serde(default)]
    pub preserve_metadata: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteConfig {
    #[serde(default = "default_complete_limit")]
    pub limit: usize,
    #[serde(default)]
    pub case_sensitive: bool,
}

impl Default for CompleteConfig {
    fn default() -> Self {
        CompleteConfig {
            limit: default_complete_limit(),
            case_sensitive: false,
        }
    }
}

fn default_complete_limit() -> usize {
    20
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing` filter directive used when PATHLIST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
