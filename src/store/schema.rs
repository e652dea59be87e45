use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::api::CaseContext;
use crate::engine::reference_day::{format_day_key, parse_day_key};
use crate::session::state::{Outcome, STARTING_ATTEMPTS};

/// Per-profile completion record. Every field defaults so partially written
/// or older shapes still load.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserStats {
    #[serde(rename = "personalBestTime")]
    pub personal_best_time_seconds: Option<u64>,
    pub games_completed: u32,
    /// Days with at least one win. Never reset on a missed day.
    pub daily_streak: u32,
    /// Run of consecutive reference days with a win, ending today or yesterday.
    pub consecutive_play_streak: u32,
    #[serde(with = "optional_day_key")]
    pub last_day_of_consecutive_play: Option<NaiveDate>,
    #[serde(with = "optional_day_key")]
    pub last_played: Option<NaiveDate>,
    #[serde(
        serialize_with = "serialize_day_keys",
        deserialize_with = "deserialize_game_history"
    )]
    pub game_history: Vec<NaiveDate>,
    #[serde(deserialize_with = "deserialize_win_history")]
    pub win_history: Vec<WinRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinRecord {
    #[serde(with = "day_key")]
    pub date: NaiveDate,
    pub time_seconds: u64,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(alias = "completedAtHonolulu", default)]
    pub completed_at_reference: String,
    #[serde(rename = "completedAtUTC")]
    pub completed_at_utc: DateTime<Utc>,
}

/// Durable mirror of the session (`patientContext`). Also the
/// `patient_context` payload the server expects on `/ask_llm`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionRecord {
    pub disease: String,
    pub case: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder_snippet: Option<String>,
    pub attempts: u32,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    pub history: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub custom: bool,
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self {
            disease: String::new(),
            case: String::new(),
            placeholder_snippet: None,
            attempts: STARTING_ATTEMPTS,
            completed: false,
            outcome: None,
            history: Vec::new(),
            custom: false,
        }
    }
}

impl SessionRecord {
    pub fn case_context(&self) -> CaseContext {
        CaseContext {
            disease: self.disease.clone(),
            case: self.case.clone(),
            placeholder_snippet: self.placeholder_snippet.clone(),
        }
    }
}

mod day_key {
    use super::*;

    pub fn serialize<S: Serializer>(day: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_day_key(*day))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        parse_day_key(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid day key: {raw}")))
    }
}

mod optional_day_key {
    use super::*;

    pub fn serialize<S: Serializer>(day: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match day {
            Some(day) => s.serialize_some(&format_day_key(*day)),
            None => s.serialize_none(),
        }
    }

    /// Unparseable keys read as unset rather than failing the whole record.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<Value>::deserialize(d)?;
        Ok(raw.as_ref().and_then(Value::as_str).and_then(parse_day_key))
    }
}

fn serialize_day_keys<S: Serializer>(days: &[NaiveDate], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(days.iter().map(|day| format_day_key(*day)))
}

/// Older builds stored `{date, ...}` objects instead of plain day strings.
fn deserialize_game_history<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<NaiveDate>, D::Error> {
    let Value::Array(entries) = Value::deserialize(d)? else {
        return Ok(Vec::new());
    };
    let mut days: Vec<NaiveDate> = Vec::with_capacity(entries.len());
    for entry in &entries {
        let raw = match entry {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => map.get("date").and_then(Value::as_str),
            _ => None,
        };
        if let Some(day) = raw.and_then(parse_day_key)
            && !days.contains(&day)
        {
            days.push(day);
        }
    }
    Ok(days)
}

fn deserialize_win_history<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<WinRecord>, D::Error> {
    let Value::Array(entries) = Value::deserialize(d)? else {
        return Ok(Vec::new());
    };
    Ok(entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect())
}
