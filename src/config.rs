use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_UTC_OFFSET_MINUTES: i32 = -180;
const DEFAULT_TABLE: &str = "presencas";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub data_dir: PathBuf,
    /// Spreadsheet append endpoint.
    #[serde(default)]
    pub sheets_url: Option<String>,
    /// Base URL of the relational REST API.
    #[serde(default)]
    pub db_url: Option<String>,
    #[serde(default)]
    pub db_key: Option<String>,
    #[serde(default = "default_table")]
    pub db_table: String,
    /// Reachability probe target; when unset only the backends' own errors say we're offline.
    #[serde(default)]
    pub probe_url: Option<String>,
    /// Offset used for calendar-day boundaries and displayed times.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_device_id")]
    pub device_id: String,
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

fn default_utc_offset() -> i32 {
    DEFAULT_UTC_OFFSET_MINUTES
}

fn default_device_id() -> String {
    env::var("ROLLSYNC_DEVICE_ID").unwrap_or_else(|_| {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string())
    })
}

impl SyncConfig {
    /// Load from `{data_dir}/rollsync.json`, falling back to `ROLLSYNC_*` env vars.
    pub fn load_or_default(data_dir: &Path) -> Self {
        let config_json = data_dir.join("rollsync.json");

        if config_json.exists() {
            match std::fs::read_to_string(&config_json) {
                Ok(content) => match serde_json::from_str::<SyncConfig>(&content) {
                    Ok(mut config) => {
                        if config.data_dir.as_os_str().is_empty() {
                            config.data_dir = data_dir.to_path_buf();
                        }
                        tracing::info!(
                            "Loaded sync config: device_id={}, sheets={}, db={}",
                            config.device_id,
                            config.sheets_url.is_some(),
                            config.db_url.is_some()
                        );
                        return config;
                    }
                    Err(e) => {
                        tracing::error!("Failed to parse rollsync.json: {}, using env", e);
                    }
                },
                Err(e) => {
                    tracing::error!("Failed to read rollsync.json: {}, using env", e);
                }
            }
        }

        let mut config = Self::from_env();
        config.data_dir = data_dir.to_path_buf();
        config
    }

    pub fn from_env() -> Self {
        SyncConfig {
            data_dir: env::var("ROLLSYNC_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            sheets_url: non_empty_var("ROLLSYNC_SHEETS_URL"),
            db_url: non_empty_var("ROLLSYNC_DB_URL"),
            db_key: non_empty_var("ROLLSYNC_DB_KEY"),
            db_table: non_empty_var("ROLLSYNC_DB_TABLE").unwrap_or_else(default_table),
            probe_url: non_empty_var("ROLLSYNC_PROBE_URL"),
            utc_offset_minutes: env::var("ROLLSYNC_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_UTC_OFFSET_MINUTES),
            device_id: default_device_id(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Timing and retry constants for the sync engine.
///
/// These are fixed for a given engine instance. Nothing in the public API
/// accepts a per-call override.
#[derive(Debug, Clone)]
pub struct SyncPolicy {
    /// Upper bound on the remote duplicate lookup.
    pub duplicate_check_timeout: Duration,
    /// Minimum gap between the end of one drain and the start of the next.
    pub drain_cooldown: Duration,
    pub connectivity_probes: u32,
    pub probe_backoff: Duration,
    pub item_delay: Duration,
    pub max_attempts: u32,
    /// Poll interval of the connectivity monitor.
    pub monitor_interval: Duration,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        SyncPolicy {
            duplicate_check_timeout: Duration::from_secs(2),
            drain_cooldown: Duration::from_secs(2),
            connectivity_probes: 3,
            probe_backoff: Duration::from_millis(500),
            item_delay: Duration::from_millis(300),
            max_attempts: 3,
            monitor_interval: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn test_load_or_default_no_file() {
        env::remove_var("ROLLSYNC_SHEETS_URL");
        env::remove_var("ROLLSYNC_UTC_OFFSET_MINUTES");
        let temp_dir = tempfile::tempdir().unwrap();
        let config = SyncConfig::load_or_default(temp_dir.path());

        assert_eq!(config.data_dir, temp_dir.path());
        assert!(config.sheets_url.is_none());
        assert_eq!(config.db_table, "presencas");
        assert_eq!(config.utc_offset_minutes, -180);
        assert!(!config.device_id.is_empty());
    }

    #[test]
    #[serial]
    fn test_load_or_default_valid_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_str = r#"{
            "data_dir": "",
            "sheets_url": "https://sheets.example/exec",
            "db_url": "https://db.example",
            "db_key": "anon",
            "utc_offset_minutes": 0,
            "device_id": "tablet-1"
        }"#;
        let mut file = std::fs::File::create(temp_dir.path().join("rollsync.json")).unwrap();
        file.write_all(config_str.as_bytes()).unwrap();

        let config = SyncConfig::load_or_default(temp_dir.path());

        assert_eq!(config.device_id, "tablet-1");
        assert_eq!(config.data_dir, temp_dir.path());
        assert_eq!(config.sheets_url.as_deref(), Some("https://sheets.example/exec"));
        assert_eq!(config.db_table, "presencas");
        assert_eq!(config.utc_offset_minutes, 0);
    }

    #[test]
    #[serial]
    fn test_load_or_default_invalid_json_falls_back_to_env() {
        env::set_var("ROLLSYNC_SHEETS_URL", "https://env.example/exec");
        env::set_var("ROLLSYNC_UTC_OFFSET_MINUTES", "60");
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("rollsync.json"), b"invalid json").unwrap();

        let config = SyncConfig::load_or_default(temp_dir.path());

        assert_eq!(config.sheets_url.as_deref(), Some("https://env.example/exec"));
        assert_eq!(config.utc_offset_minutes, 60);

        env::remove_var("ROLLSYNC_SHEETS_URL");
        env::remove_var("ROLLSYNC_UTC_OFFSET_MINUTES");
    }

    #[test]
    fn test_default_policy_constants() {
        let policy = SyncPolicy::default();
        assert_eq!(policy.duplicate_check_timeout, Duration::from_secs(2));
        assert_eq!(policy.drain_cooldown, Duration::from_secs(2));
        assert_eq!(policy.connectivity_probes, 3);
        assert_eq!(policy.item_delay, Duration::from_millis(300));
        assert_eq!(policy.max_attempts, 3);
    }
}
