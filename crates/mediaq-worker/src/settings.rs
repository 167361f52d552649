use mediaq::{EvictionConfig, JobsConfig};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Worker process settings, read from `MEDIAQ_*` environment variables
/// (optionally via a `.env` file).
#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_dequeue_timeout_ms")]
    pub dequeue_timeout_ms: u64,
    #[serde(default = "default_webhook_max_retries")]
    pub webhook_max_retries: u32,
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    #[serde(default = "default_max_file_age_hours")]
    pub max_file_age_hours: u64,
    #[serde(default = "default_temp_file_age_hours")]
    pub temp_file_age_hours: u64,
    #[serde(default = "default_eviction_interval_minutes")]
    pub eviction_interval_minutes: u64,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_namespace() -> String {
    "mediaq".to_string()
}
fn default_workers() -> usize {
    4
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_dequeue_timeout_ms() -> u64 {
    1000
}
fn default_webhook_max_retries() -> u32 {
    3
}
fn default_storage_path() -> PathBuf {
    PathBuf::from("./storage")
}
fn default_temp_dir() -> PathBuf {
    std::env::temp_dir()
}
fn default_max_file_age_hours() -> u64 {
    24
}
fn default_temp_file_age_hours() -> u64 {
    12
}
fn default_eviction_interval_minutes() -> u64 {
    60
}

pub fn load() -> Result<Settings, envy::Error> {
    envy::prefixed("MEDIAQ_").from_env()
}

impl Settings {
    pub fn jobs_config(&self) -> JobsConfig {
        JobsConfig::new()
            .workers(self.workers)
            .dequeue_timeout(Duration::from_millis(self.dequeue_timeout_ms))
            .webhook_max_retries(self.webhook_max_retries)
    }

    pub fn eviction_config(&self) -> EvictionConfig {
        EvictionConfig::new()
            .interval(Duration::from_secs(self.eviction_interval_minutes * 60))
            .root(
                &self.storage_path,
                Duration::from_secs(self.max_file_age_hours * 3600),
            )
            .root(
                &self.temp_dir,
                Duration::from_secs(self.temp_file_age_hours * 3600),
            )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
