use std::time::Instant;

/// Elapsed-seconds counter. Ticks land once per whole second after `start`,
/// and a tick only counts while the terminal has focus. Unfocused seconds are
/// skipped, never caught up.
#[derive(Clone, Debug)]
pub struct Timer {
    elapsed: u64,
    running: bool,
    focused: bool,
    anchor: Option<Instant>,
    ticks_seen: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Timer {
    pub fn new(elapsed: u64) -> Self {
        Self {
            elapsed,
            running: false,
            focused: true,
            anchor: None,
            ticks_seen: 0,
        }
    }

    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Resume counting from the current value. No-op when already running.
    pub fn start(&mut self, now: Instant) {
        if self.running {
            return;
        }
        self.running = true;
        self.anchor = Some(now);
        self.ticks_seen = 0;
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.anchor = None;
    }

    pub fn reset(&mut self) {
        self.stop();
        self.elapsed = 0;
    }

    /// Apply every tick that came due since the last poll. Returns how many
    /// seconds were added.
    pub fn poll(&mut self, now: Instant) -> u64 {
        let Some(anchor) = self.anchor else {
            return 0;
        };
        let due = now.saturating_duration_since(anchor).as_secs();
        let fresh = due.saturating_sub(self.ticks_seen);
        self.ticks_seen = self.ticks_seen.max(due);
        if self.focused {
            self.elapsed += fresh;
            fresh
        } else {
            0
        }
    }

    /// Settle ticks under the old focus state, then switch. Returns seconds added.
    pub fn set_focused(&mut self, now: Instant, focused: bool) -> u64 {
        let added = self.poll(now);
        self.focused = focused;
        added
    }
}

/// `HH:MM:SS`, or `MM:SS` when under an hour.
pub fn format_time(seconds: u64) -> String {
    let hrs = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hrs > 0 {
        format!("{hrs:02}:{mins:02}:{secs:02}")
    } else {
        format!("{mins:02}:{secs:02}")
    }
}

/// `M:SS`, the personal-best style.
pub fn format_short(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_counts_whole_seconds_only() {
        let t0 = Instant::now();
        let mut timer = Timer::new(0);
        timer.start(t0);
        assert_eq!(timer.poll(t0 + Duration::from_millis(999)), 0);
        assert_eq!(timer.poll(t0 + Duration::from_millis(1000)), 1);
        assert_eq!(timer.poll(t0 + Duration::from_millis(3500)), 2);
        assert_eq!(timer.elapsed(), 3);
    }

    #[test]
    fn test_start_is_idempotent_and_resumes() {
        let t0 = Instant::now();
        let mut timer = Timer::new(42);
        timer.start(t0);
        timer.poll(t0 + secs(5));
        timer.start(t0 + secs(5) + Duration::from_millis(500));
        assert_eq!(timer.poll(t0 + secs(6)), 1);
        assert_eq!(timer.elapsed(), 48);
    }

    #[test]
    fn test_stop_retains_value_and_ignores_polls() {
        let t0 = Instant::now();
        let mut timer = Timer::new(0);
        timer.start(t0);
        timer.poll(t0 + secs(10));
        timer.stop();
        timer.stop();
        assert_eq!(timer.poll(t0 + secs(60)), 0);
        assert_eq!(timer.elapsed(), 10);
        assert!(!timer.is_running());
    }

    #[test]
    fn test_reset_zeroes_and_stops() {
        let t0 = Instant::now();
        let mut timer = Timer::new(0);
        timer.start(t0);
        timer.poll(t0 + secs(3));
        timer.reset();
        assert_eq!(timer.elapsed(), 0);
        assert!(!timer.is_running());
    }

    #[test]
    fn test_only_focused_seconds_count() {
        let t0 = Instant::now();
        let mut timer = Timer::new(0);
        timer.start(t0);

        // visible 0..4, hidden 4..10, visible 10..13, hidden 13..20, visible 20..25
        let toggles = [(4, false), (10, true), (13, false), (20, true)];
        for (at, focused) in toggles {
            timer.set_focused(t0 + secs(at), focused);
        }
        timer.poll(t0 + secs(25));
        assert_eq!(timer.elapsed(), 4 + 3 + 5);
    }

    #[test]
    fn test_no_catch_up_after_long_blur() {
        let t0 = Instant::now();
        let mut timer = Timer::new(0);
        timer.start(t0);
        timer.set_focused(t0, false);
        assert_eq!(timer.poll(t0 + secs(3600)), 0);
        timer.set_focused(t0 + secs(3600), true);
        assert_eq!(timer.poll(t0 + secs(3601)), 1);
        assert_eq!(timer.elapsed(), 1);
    }

    #[test]
    fn test_format_time_omits_zero_hours() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(125), "02:05");
        assert_eq!(format_time(3599), "59:59");
        assert_eq!(format_time(3600), "01:00:00");
        assert_eq!(format_time(37_230), "10:20:30");
        assert_eq!(format_short(125), "2:05");
    }
}
