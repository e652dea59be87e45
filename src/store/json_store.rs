use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::session::state::ChatMessage;
use crate::store::schema::{SessionRecord, UserStats};

pub const CHAT_HISTORY: &str = "chatHistory";
pub const PATIENT_CONTEXT: &str = "patientContext";
pub const USER_STATS: &str = "userStats";
pub const ELAPSED_TIME: &str = "elapsedTime";
pub const PLAYER_ROLE: &str = "playerRole";
pub const CASE: &str = "case";

pub const ALL_KEYS: [&str; 6] = [
    CHAT_HISTORY,
    PATIENT_CONTEXT,
    USER_STATS,
    ELAPSED_TIME,
    PLAYER_ROLE,
    CASE,
];

/// One JSON file per key. Missing or corrupt files read as absent.
#[derive(Clone, Debug)]
pub struct JsonStore {
    base_dir: PathBuf,
}

impl JsonStore {
    pub fn with_base_dir(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{key}.json"))
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.file_path(key);
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "ignoring unreadable stored value");
                None
            }
        }
    }

    fn save<T: Serialize + ?Sized>(&self, key: &str, data: &T) -> Result<()> {
        let path = self.file_path(key);
        let tmp_path = path.with_extension("tmp");

        let json = serde_json::to_string_pretty(data)?;
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.file_path(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.file_path(key).exists()
    }

    pub fn load_user_stats(&self) -> UserStats {
        self.load(USER_STATS).unwrap_or_default()
    }

    pub fn save_user_stats(&self, stats: &UserStats) -> Result<()> {
        self.save(USER_STATS, stats)
    }

    /// Entries that fail to parse are dropped individually.
    pub fn load_chat_history(&self) -> Vec<ChatMessage> {
        match self.load::<Value>(CHAT_HISTORY) {
            Some(Value::Array(entries)) => entries
                .into_iter()
                .filter_map(|entry| serde_json::from_value(entry).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn save_chat_history(&self, messages: &[ChatMessage]) -> Result<()> {
        self.save(CHAT_HISTORY, messages)
    }

    pub fn load_session_record(&self) -> Option<SessionRecord> {
        self.load(PATIENT_CONTEXT)
    }

    pub fn save_session_record(&self, record: &SessionRecord) -> Result<()> {
        self.save(PATIENT_CONTEXT, record)
    }

    pub fn load_elapsed_time(&self) -> Option<u64> {
        self.load(ELAPSED_TIME)
    }

    pub fn save_elapsed_time(&self, seconds: u64) -> Result<()> {
        self.save(ELAPSED_TIME, &seconds)
    }

    pub fn load_player_role(&self) -> Option<String> {
        self.load::<String>(PLAYER_ROLE).filter(|role| !role.is_empty())
    }

    pub fn save_player_role(&self, role: &str) -> Result<()> {
        self.save(PLAYER_ROLE, role)
    }

    pub fn load_case(&self) -> Option<String> {
        self.load(CASE)
    }

    pub fn save_case(&self, case: &str) -> Result<()> {
        self.save(CASE, case)
    }

    /// Forget the in-progress session; stats and role survive.
    pub fn clear_session(&self) -> Result<()> {
        self.remove(CHAT_HISTORY)?;
        self.remove(PATIENT_CONTEXT)?;
        self.remove(ELAPSED_TIME)?;
        Ok(())
    }

    /// Remove `.tmp` files left by a write that died before its rename.
    /// Returns true if any were found.
    pub fn sweep_interrupted_writes(&self) -> bool {
        let mut found = false;
        for key in ALL_KEYS {
            let tmp_path = self.file_path(key).with_extension("tmp");
            if tmp_path.exists() {
                found = true;
                let _ = fs::remove_file(&tmp_path);
            }
        }
        found
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dxdaily")
}
