use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration from project.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project: ProjectInfo,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    /// Named filter sets: preset name -> (column -> needle)
    #[serde(default)]
    pub presets: IndexMap<String, IndexMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Fixed delay between reconnect attempts
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Automatic reconnects before giving up (manual reconnect resets)
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    /// Delay between a clear-all event and the follow-up full fetch
    #[serde(default = "default_refetch_delay_ms")]
    pub refetch_delay_ms: u64,
    /// Watch loop tick
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl SyncConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn refetch_delay(&self) -> Duration {
        Duration::from_millis(self.refetch_delay_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_attempts: default_max_retry_attempts(),
            refetch_delay_ms: default_refetch_delay_ms(),
            tick_ms: default_tick_ms(),
        }
    }
}

fn default_retry_delay_ms() -> u64 {
    3000
}

fn default_max_retry_attempts() -> u32 {
    5
}

fn default_refetch_delay_ms() -> u64 {
    1000
}

fn default_tick_ms() -> u64 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// chrono format string for date columns
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default = "default_breadcrumb_separator")]
    pub breadcrumb_separator: String,
    /// Maximum number of values offered by `wbs values`
    #[serde(default = "default_picker_limit")]
    pub picker_limit: usize,
    /// Columns shown by `wbs list` when `--columns` is not given.
    /// If empty, the built-in default set is used.
    #[serde(default)]
    pub columns: Vec<String>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            date_format: default_date_format(),
            breadcrumb_separator: default_breadcrumb_separator(),
            picker_limit: default_picker_limit(),
            columns: Vec::new(),
        }
    }
}

fn default_date_format() -> String {
    "%d.%m.%Y".to_string()
}

fn default_breadcrumb_separator() -> String {
    " / ".to_string()
}

fn default_picker_limit() -> usize {
    100
}
