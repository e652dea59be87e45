use std::fs;

use chrono::NaiveDate;
use tempfile::TempDir;

use dxdaily::store::json_store::{self, JsonStore};
use dxdaily::store::schema::UserStats;

fn make_test_store() -> (TempDir, JsonStore) {
    let dir = TempDir::new().unwrap();
    let store = JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap();
    (dir, store)
}

fn key_file(store: &JsonStore, key: &str) -> std::path::PathBuf {
    store.base_dir().join(format!("{key}.json"))
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn legacy_stats_file_loads_and_is_rewritten_in_iso_form() {
    let (_dir, store) = make_test_store();
    fs::write(
        key_file(&store, json_store::USER_STATS),
        r#"{
            "personalBestTime": 95,
            "gamesCompleted": 2,
            "dailyStreak": 2,
            "consecutivePlayStreak": 2,
            "lastDayOfConsecutivePlay": "Wed Jan 03 2024",
            "lastPlayed": "Wed Jan 03 2024",
            "gameHistory": [{"date": "Tue Jan 02 2024"}, "Wed Jan 03 2024"]
        }"#,
    )
    .unwrap();

    let stats = store.load_user_stats();
    assert_eq!(stats.personal_best_time_seconds, Some(95));
    assert_eq!(stats.last_played, Some(day(2024, 1, 3)));
    assert_eq!(stats.game_history, vec![day(2024, 1, 2), day(2024, 1, 3)]);
    assert!(stats.win_history.is_empty());

    store.save_user_stats(&stats).unwrap();
    let raw = fs::read_to_string(key_file(&store, json_store::USER_STATS)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["lastPlayed"], "2024-01-03");
    assert_eq!(value["gameHistory"][0], "2024-01-02");
    assert_eq!(value["personalBestTime"], 95);
    assert_eq!(store.load_user_stats(), stats);
}

#[test]
fn corrupt_keys_fall_back_to_defaults() {
    let (_dir, store) = make_test_store();
    for key in json_store::ALL_KEYS {
        fs::write(key_file(&store, key), "{\"truncated\": ").unwrap();
    }
    assert_eq!(store.load_user_stats(), UserStats::default());
    assert!(store.load_chat_history().is_empty());
    assert!(store.load_session_record().is_none());
    assert!(store.load_elapsed_time().is_none());
    assert!(store.load_player_role().is_none());
    assert!(store.load_case().is_none());
}

#[test]
fn wrong_shapes_are_treated_as_absent() {
    let (_dir, store) = make_test_store();
    fs::write(key_file(&store, json_store::USER_STATS), "[]").unwrap();
    fs::write(key_file(&store, json_store::CHAT_HISTORY), "{\"a\": 1}").unwrap();
    fs::write(key_file(&store, json_store::PLAYER_ROLE), "\"\"").unwrap();
    assert_eq!(store.load_user_stats(), UserStats::default());
    assert!(store.load_chat_history().is_empty());
    assert!(store.load_player_role().is_none());
}
