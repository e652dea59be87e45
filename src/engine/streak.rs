use chrono::{DateTime, NaiveDate, Utc};

use crate::engine::reference_day::ReferenceClock;
use crate::store::schema::{UserStats, WinRecord};

/// Both histories keep at most a year of entries.
pub const HISTORY_LIMIT: usize = 365;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletionSummary {
    pub final_time_seconds: u64,
    pub new_personal_best: bool,
    pub consecutive_play_streak: u32,
}

/// Fold one solved case into the stats. Call exactly once per solved session.
pub fn record_completion(
    stats: &mut UserStats,
    clock: &ReferenceClock,
    now: DateTime<Utc>,
    final_time_seconds: u64,
    diagnosis: Option<&str>,
) -> CompletionSummary {
    let today = clock.today(now);
    let yesterday = clock.yesterday(now);

    let new_personal_best = stats
        .personal_best_time_seconds
        .is_none_or(|best| final_time_seconds < best);
    if new_personal_best {
        stats.personal_best_time_seconds = Some(final_time_seconds);
    }

    stats.games_completed += 1;

    match stats.last_day_of_consecutive_play {
        None => stats.consecutive_play_streak = 1,
        Some(last) if last == today => {}
        Some(last) if last == yesterday => stats.consecutive_play_streak += 1,
        Some(_) => stats.consecutive_play_streak = 1,
    }
    stats.last_day_of_consecutive_play = Some(today);

    if stats.last_played != Some(today) {
        stats.daily_streak += 1;
        stats.last_played = Some(today);
    }

    if !stats.game_history.contains(&today) {
        stats.game_history.push(today);
        trim_front(&mut stats.game_history, HISTORY_LIMIT);
    }

    stats.win_history.push(WinRecord {
        date: today,
        time_seconds: final_time_seconds,
        diagnosis: diagnosis.map(str::to_string),
        completed_at_reference: clock.wall_clock(now),
        completed_at_utc: now,
    });
    trim_front(&mut stats.win_history, HISTORY_LIMIT);

    CompletionSummary {
        final_time_seconds,
        new_personal_best,
        consecutive_play_streak: stats.consecutive_play_streak,
    }
}

/// A returning player should see a broken streak before playing again.
/// Returns true when the stats changed and need saving.
pub fn ensure_streak_freshness(stats: &mut UserStats, today: NaiveDate) -> bool {
    let yesterday = today.pred_opt().unwrap_or(today);
    let fresh = matches!(
        stats.last_day_of_consecutive_play,
        Some(last) if last == today || last == yesterday
    );
    if !fresh && stats.consecutive_play_streak != 0 {
        stats.consecutive_play_streak = 0;
        return true;
    }
    false
}

fn trim_front<T>(items: &mut Vec<T>, limit: usize) {
    if items.len() > limit {
        let excess = items.len() - limit;
        items.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn noon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        // 22:00 UTC is noon at UTC-10
        Utc.with_ymd_and_hms(y, m, d, 22, 0, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_scenario_best_time_and_gap() {
        let clock = ReferenceClock::default();
        let mut stats = UserStats::default();
        let d1 = noon(2024, 4, 10);

        let first = record_completion(&mut stats, &clock, d1, 125, Some("Asthma"));
        assert!(first.new_personal_best);
        assert_eq!(stats.personal_best_time_seconds, Some(125));
        assert_eq!(stats.consecutive_play_streak, 1);
        assert_eq!(stats.game_history, vec![day(2024, 4, 10)]);

        record_completion(&mut stats, &clock, d1 + Duration::days(1), 90, None);
        assert_eq!(stats.personal_best_time_seconds, Some(90));
        assert_eq!(stats.consecutive_play_streak, 2);

        let gap = record_completion(&mut stats, &clock, d1 + Duration::days(3), 300, None);
        assert!(!gap.new_personal_best);
        assert_eq!(stats.personal_best_time_seconds, Some(90));
        assert_eq!(stats.consecutive_play_streak, 1);
        assert_eq!(stats.games_completed, 3);
    }

    #[test]
    fn test_consecutive_days_count_up() {
        let clock = ReferenceClock::default();
        let mut stats = UserStats::default();
        let start = noon(2024, 1, 28);
        for n in 0..10 {
            record_completion(&mut stats, &clock, start + Duration::days(n), 60, None);
            assert_eq!(stats.consecutive_play_streak, n as u32 + 1);
        }
        assert_eq!(stats.daily_streak, 10);
        assert_eq!(stats.game_history.len(), 10);
    }

    #[test]
    fn test_same_day_second_win_is_idempotent_for_streaks() {
        let clock = ReferenceClock::default();
        let mut stats = UserStats::default();
        let morning = Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap();
        record_completion(&mut stats, &clock, morning, 200, None);
        let history = stats.game_history.clone();

        record_completion(&mut stats, &clock, morning + Duration::hours(5), 150, None);
        assert_eq!(stats.consecutive_play_streak, 1);
        assert_eq!(stats.daily_streak, 1);
        assert_eq!(stats.game_history, history);
        assert_eq!(stats.games_completed, 2);
        assert_eq!(stats.win_history.len(), 2);
        assert_eq!(stats.personal_best_time_seconds, Some(150));
    }

    #[test]
    fn test_daily_streak_never_resets_on_gap() {
        let clock = ReferenceClock::default();
        let mut stats = UserStats::default();
        let d1 = noon(2024, 2, 1);
        record_completion(&mut stats, &clock, d1, 60, None);
        record_completion(&mut stats, &clock, d1 + Duration::days(5), 60, None);
        assert_eq!(stats.daily_streak, 2);
        assert_eq!(stats.consecutive_play_streak, 1);
    }

    #[test]
    fn test_histories_are_capped() {
        let clock = ReferenceClock::default();
        let mut stats = UserStats::default();
        let start = noon(2023, 1, 1);
        for n in 0..(HISTORY_LIMIT as i64 + 5) {
            record_completion(&mut stats, &clock, start + Duration::days(n), 60, None);
        }
        assert_eq!(stats.game_history.len(), HISTORY_LIMIT);
        assert_eq!(stats.win_history.len(), HISTORY_LIMIT);
        assert_eq!(stats.game_history[0], day(2023, 1, 6));
        assert_eq!(stats.win_history[0].date, day(2023, 1, 6));
    }

    #[test]
    fn test_win_record_keeps_both_timestamps() {
        let clock = ReferenceClock::default();
        let mut stats = UserStats::default();
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 0, 0).unwrap();
        record_completion(&mut stats, &clock, now, 75, Some("Lyme disease"));
        let win = &stats.win_history[0];
        assert_eq!(win.date, day(2024, 1, 1));
        assert_eq!(win.completed_at_utc, now);
        assert_eq!(win.completed_at_reference, "1/1/2024, 5:00:00 PM");
        assert_eq!(win.diagnosis.as_deref(), Some("Lyme disease"));
    }

    #[test]
    fn test_freshness_breaks_stale_streak() {
        let mut stats = UserStats {
            consecutive_play_streak: 4,
            last_day_of_consecutive_play: Some(day(2024, 3, 1)),
            ..UserStats::default()
        };
        assert!(!ensure_streak_freshness(&mut stats, day(2024, 3, 2)));
        assert_eq!(stats.consecutive_play_streak, 4);
        assert!(ensure_streak_freshness(&mut stats, day(2024, 3, 3)));
        assert_eq!(stats.consecutive_play_streak, 0);
        assert!(!ensure_streak_freshness(&mut stats, day(2024, 3, 3)));
    }

    #[test]
    fn test_freshness_then_completion_restarts_at_one() {
        let clock = ReferenceClock::default();
        let mut stats = UserStats {
            consecutive_play_streak: 7,
            last_day_of_consecutive_play: Some(day(2024, 3, 1)),
            ..UserStats::default()
        };
        let now = noon(2024, 3, 9);
        ensure_streak_freshness(&mut stats, clock.today(now));
        record_completion(&mut stats, &clock, now, 60, None);
        assert_eq!(stats.consecutive_play_streak, 1);
    }
}
