use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::engine::reference_day::{DEFAULT_UTC_OFFSET_HOURS, ReferenceClock};
use crate::store::json_store;

/// Training levels offered when choosing a role.
pub const PLAYER_ROLES: &[&str] = &[
    "Pre-med",
    "MS1",
    "MS2",
    "MS3",
    "MS4",
    "Resident",
    "Attending",
    "Nurse",
    "PA",
    "Other",
];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_reference_utc_offset_hours")]
    pub reference_utc_offset_hours: i32,
    #[serde(default)]
    pub player_role: Option<String>,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_server_url() -> String {
    "http://127.0.0.1:5000".to_string()
}
fn default_theme() -> String {
    "clinic-dark".to_string()
}
fn default_reference_utc_offset_hours() -> i32 {
    DEFAULT_UTC_OFFSET_HOURS
}
fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            theme: default_theme(),
            reference_utc_offset_hours: default_reference_utc_offset_hours(),
            player_role: None,
            data_dir: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dxdaily")
            .join("config.toml")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(json_store::default_data_dir)
    }

    /// Offsets outside -12..=14 are clamped by the clock.
    pub fn reference_clock(&self) -> ReferenceClock {
        ReferenceClock::from_utc_offset_hours(self.reference_utc_offset_hours)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
