//! Viewing window resolution and window-relative time queries.

use chrono::{DateTime, Datelike, Days, Duration, Local, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::event::{CalendarEvent, resolve_local};

/// Window size selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "72h")]
    ThreeDays,
    #[serde(rename = "1w")]
    Week,
    #[serde(rename = "30d")]
    ThirtyDays,
}

impl Granularity {
    /// Gridline bucket size in minutes.
    pub fn bucket_minutes(&self) -> i64 {
        match self {
            Granularity::TwelveHours => 60,
            Granularity::Day => 60,
            Granularity::ThreeDays => 180,
            Granularity::Week => 360,
            Granularity::ThirtyDays => 1440,
        }
    }
}

/// The visible time span. Recomputed fresh from "now" whenever the
/// granularity or the clock changes; never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub granularity: Granularity,
    pub bucket_minutes: i64,
}

/// A background gridline instant within a window.
#[derive(Debug, Clone, PartialEq)]
pub struct Gridline {
    pub at: DateTime<Local>,
    /// True when the line falls on local midnight.
    pub day_boundary: bool,
}

/// Compute the window for a reference instant and a granularity.
pub fn resolve_window(now: DateTime<Local>, granularity: Granularity) -> TimeWindow {
    let today = now.date_naive();
    let (start, end) = match granularity {
        Granularity::TwelveHours => (now - Duration::hours(1), now + Duration::hours(11)),
        Granularity::Day => (day_start(today), day_end(today)),
        Granularity::ThreeDays => (day_start(today), day_end(today + Days::new(2))),
        Granularity::Week => {
            let sunday = today - Days::new(u64::from(now.weekday().num_days_from_sunday()));
            (day_start(sunday), day_end(sunday + Days::new(6)))
        }
        Granularity::ThirtyDays => (day_start(today), day_end(today + Days::new(29))),
    };

    TimeWindow {
        start,
        end,
        granularity,
        bucket_minutes: granularity.bucket_minutes(),
    }
}

impl TimeWindow {
    /// Closed-interval overlap test; the filter applied before layout.
    pub fn intersects(&self, event: &CalendarEvent) -> bool {
        event.start.instant() <= self.end && event.end.instant() >= self.start
    }

    pub fn contains(&self, instant: DateTime<Local>) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// Position of an instant as a fraction of the window, clamped to
    /// `[0, 1]`. Drives the live "now" cursor.
    pub fn position_of(&self, instant: DateTime<Local>) -> f64 {
        let total = (self.end - self.start).num_milliseconds() as f64;
        let offset = (instant - self.start).num_milliseconds() as f64;
        (offset / total).clamp(0.0, 1.0)
    }

    /// Gridline instants: the first line is the window start truncated
    /// to the top of its hour (so it may precede `start` slightly),
    /// then every `bucket_minutes` until the window end.
    pub fn gridlines(&self) -> Vec<Gridline> {
        let naive = self.start.naive_local();
        let mut cursor = resolve_local(
            naive
                .date()
                .and_time(NaiveTime::from_hms_opt(naive.hour(), 0, 0).unwrap()),
        );

        let mut lines = Vec::new();
        while cursor <= self.end {
            lines.push(Gridline {
                at: cursor,
                day_boundary: cursor.hour() == 0 && cursor.minute() == 0,
            });
            cursor += Duration::minutes(self.bucket_minutes);
        }
        lines
    }
}

fn day_start(date: NaiveDate) -> DateTime<Local> {
    resolve_local(date.and_time(NaiveTime::MIN))
}

fn day_end(date: NaiveDate) -> DateTime<Local> {
    resolve_local(date.and_time(NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap()))
}
