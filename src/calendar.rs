use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

/// Calendar-day arithmetic in the registrations' local offset.
#[derive(Debug, Clone, Copy)]
pub struct LocalCalendar {
    offset: FixedOffset,
}

/// `[start, end)` bounds of one local calendar day, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

impl LocalCalendar {
    /// Out-of-range offsets fall back to UTC.
    pub fn from_offset_minutes(minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(|| {
            tracing::warn!("invalid UTC offset {} minutes, using UTC", minutes);
            Utc.fix()
        });
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::from_offset_minutes(0)
    }

    pub fn local_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.offset).date_naive()
    }

    pub fn day_window(&self, ts: DateTime<Utc>) -> DayWindow {
        let date = self.local_date(ts);
        let local_midnight = date.and_time(NaiveTime::MIN);
        let start = match self.offset.from_local_datetime(&local_midnight).single() {
            Some(dt) => dt.with_timezone(&Utc),
            None => Utc.from_utc_datetime(&local_midnight),
        };
        DayWindow {
            start,
            end: start + Duration::days(1),
        }
    }

    pub fn same_day(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        self.local_date(a) == self.local_date(b)
    }

    /// `dd/mm/yyyy`
    pub fn format_date(&self, ts: DateTime<Utc>) -> String {
        ts.with_timezone(&self.offset).format("%d/%m/%Y").to_string()
    }

    /// `HH:MM`, 24-hour clock.
    pub fn format_time(&self, ts: DateTime<Utc>) -> String {
        ts.with_timezone(&self.offset).format("%H:%M").to_string()
    }
}

impl Default for LocalCalendar {
    fn default() -> Self {
        Self::utc()
    }
}
