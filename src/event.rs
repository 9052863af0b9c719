//! Event types shared across parsing, aggregation, and layout.
//!
//! The engine distinguishes exactly three kinds of event times: all-day
//! dates, UTC instants, and local wall-clock ("floating") times. Deeper
//! timezone resolution is out of scope.

use chrono::{DateTime, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// A point in time as it appears in calendar data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventTime {
    /// An all-day date; resolves to local midnight.
    Date(NaiveDate),
    /// An absolute UTC instant.
    Utc(DateTime<Utc>),
    /// A local wall-clock time with no zone designator.
    Floating(NaiveDateTime),
}

impl EventTime {
    /// Resolve to an absolute instant in the local timezone.
    pub fn instant(&self) -> DateTime<Local> {
        match self {
            EventTime::Date(d) => resolve_local(d.and_time(NaiveTime::MIN)),
            EventTime::Utc(dt) => dt.with_timezone(&Local),
            EventTime::Floating(dt) => resolve_local(*dt),
        }
    }
}

/// Attach the local timezone to a naive datetime.
///
/// Times made ambiguous by a clock shift resolve to the earliest valid
/// instant; times that do not exist (spring-forward gap) are nudged
/// forward until they do.
pub(crate) fn resolve_local(naive: NaiveDateTime) -> DateTime<Local> {
    let mut candidate = naive;
    for _ in 0..4 {
        match candidate.and_local_timezone(Local) {
            LocalResult::Single(dt) => return dt,
            LocalResult::Ambiguous(earliest, _) => return earliest,
            LocalResult::None => candidate += Duration::hours(1),
        }
    }
    // No local mapping within a reasonable window; treat as UTC.
    DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc).with_timezone(&Local)
}

/// One event block as emitted by the interchange parser. Transient:
/// it only exists between a parse call and the import that maps it to
/// a [`CalendarEvent`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawIcsEvent {
    pub uid: String,
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: EventTime,
    pub end: EventTime,
    pub all_day: bool,
}

/// A canonical event, cached per source and consumed by the aggregator
/// and the layout engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Derived from source id + uid, or a random suffix when the uid is
    /// absent. Not guaranteed stable across re-imports of uid-less events.
    pub id: String,
    pub uid: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start: EventTime,
    pub end: EventTime,
    pub all_day: bool,
    pub source_id: String,
    pub color: String,
}
