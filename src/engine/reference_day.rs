use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

/// Pacific/Honolulu. It observes no DST, so a fixed offset is exact.
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = -10;

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";
/// `Date.prototype.toDateString()` output, e.g. "Tue Jan 02 2024".
const LEGACY_DAY_FORMAT: &str = "%a %b %d %Y";

/// Maps instants onto the shared daily boundary every player resets on,
/// regardless of the machine's local timezone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReferenceClock {
    offset: FixedOffset,
}

impl Default for ReferenceClock {
    fn default() -> Self {
        Self::from_utc_offset_hours(DEFAULT_UTC_OFFSET_HOURS)
    }
}

impl ReferenceClock {
    pub fn from_utc_offset_hours(hours: i32) -> Self {
        let hours = hours.clamp(-12, 14);
        let offset = FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    pub fn offset_hours(&self) -> i32 {
        self.offset.local_minus_utc() / 3600
    }

    pub fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.day_of(now)
    }

    pub fn yesterday(&self, now: DateTime<Utc>) -> NaiveDate {
        let today = self.today(now);
        today.pred_opt().unwrap_or(today)
    }

    pub fn same_day(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        self.day_of(a) == self.day_of(b)
    }

    /// Wall-clock rendering in the reference zone, shaped like en-US
    /// `toLocaleString` ("1/2/2024, 3:04:05 PM").
    pub fn wall_clock(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.offset)
            .format("%-m/%-d/%Y, %-I:%M:%S %p")
            .to_string()
    }
}

pub fn format_day_key(day: NaiveDate) -> String {
    day.format(DAY_KEY_FORMAT).to_string()
}

/// Accepts ISO day keys and the legacy `toDateString` form older data used.
pub fn parse_day_key(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, DAY_KEY_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(raw, LEGACY_DAY_FORMAT))
        .ok()
}
