//! Merging cached, manual, and deadline events into one canonical list.
//!
//! The aggregator is pure: it never mutates the store, so readers can
//! recompute freely and never observe a torn state.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::event::{CalendarEvent, EventTime, resolve_local};
use crate::source::{
    CalendarSource, DEADLINE_COLOR, DEADLINE_SOURCE_ID, MANUAL_COLOR, MANUAL_SOURCE_ID,
};
use crate::store::CacheEntry;

/// A manually entered item, owned by an unrelated subsystem and read on
/// every aggregation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualEntry {
    pub id: String,
    pub title: String,
    /// ISO-ish local datetime or bare date.
    pub date: String,
}

/// An externally owned deadline record. The owner flags terminal items;
/// that flag is trusted here, not re-derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlineEntry {
    pub id: String,
    pub name: String,
    pub deadline: Option<String>,
    pub completed: bool,
}

/// Merge enabled sources' caches with the manual and deadline streams
/// into one list sorted ascending by start. The sort is stable; ties
/// keep encounter order, which the layout engine relies on.
pub fn canonical_events(
    sources: &[CalendarSource],
    cache: &HashMap<String, CacheEntry>,
    manual: &[ManualEntry],
    deadlines: &[DeadlineEntry],
) -> Vec<CalendarEvent> {
    let mut events = Vec::new();

    for source in sources.iter().filter(|s| s.enabled) {
        if let Some(entry) = cache.get(&source.id) {
            // Re-tag with the source's current color so explicit color
            // changes show up without a re-import.
            events.extend(entry.events.iter().cloned().map(|mut e| {
                e.color = source.color.clone();
                e
            }));
        }
    }

    if stream_enabled(sources, MANUAL_SOURCE_ID) {
        for entry in manual {
            let Some((time, all_day)) = parse_entry_date(&entry.date) else {
                continue;
            };
            events.push(CalendarEvent {
                id: format!("manual-{}", entry.id),
                uid: entry.id.clone(),
                title: entry.title.clone(),
                description: String::new(),
                location: String::new(),
                start: time.clone(),
                end: time,
                all_day,
                source_id: MANUAL_SOURCE_ID.to_string(),
                color: MANUAL_COLOR.to_string(),
            });
        }
    }

    if stream_enabled(sources, DEADLINE_SOURCE_ID) {
        for entry in deadlines {
            if entry.completed {
                continue;
            }
            let Some(deadline) = entry.deadline.as_deref() else {
                continue;
            };
            let Some((time, _)) = parse_entry_date(deadline) else {
                continue;
            };
            events.push(CalendarEvent {
                id: format!("deadline-{}", entry.id),
                uid: entry.id.clone(),
                title: entry.name.clone(),
                description: "Deadline".to_string(),
                location: String::new(),
                start: time.clone(),
                end: time,
                all_day: true,
                source_id: DEADLINE_SOURCE_ID.to_string(),
                color: DEADLINE_COLOR.to_string(),
            });
        }
    }

    events.sort_by_key(|e| e.start.instant());
    events
}

fn stream_enabled(sources: &[CalendarSource], id: &str) -> bool {
    sources.iter().find(|s| s.id == id).is_none_or(|s| s.enabled)
}

/// Parse a collaborator date string. A bare date, or a datetime at the
/// exact midnight literal, counts as all-day.
fn parse_entry_date(value: &str) -> Option<(EventTime, bool)> {
    let clean = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(clean, "%Y-%m-%d") {
        return Some((EventTime::Date(date), true));
    }

    let all_day = !clean.contains('T') || clean.ends_with("T00:00:00");

    if let Some(stripped) = clean.strip_suffix('Z') {
        let dt = NaiveDateTime::parse_from_str(stripped, "%Y-%m-%dT%H:%M:%S").ok()?;
        return Some((EventTime::Utc(dt.and_utc()), all_day));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(clean, format) {
            return Some((EventTime::Floating(dt), all_day));
        }
    }
    None
}

/// Events whose `[start, end]` intersects the given local day
/// (closed-interval test, matching the window filter).
pub fn events_on_day(events: &[CalendarEvent], date: NaiveDate) -> Vec<&CalendarEvent> {
    let day_start = resolve_local(date.and_time(NaiveTime::MIN));
    let day_end = resolve_local(date.and_time(end_of_day()));
    events
        .iter()
        .filter(|e| e.start.instant() <= day_end && e.end.instant() >= day_start)
        .collect()
}

/// Events starting within `[now, now + horizon_days]`.
pub fn upcoming<'a>(
    events: &'a [CalendarEvent],
    now: DateTime<Local>,
    horizon_days: i64,
) -> Vec<&'a CalendarEvent> {
    let cutoff = now + Duration::days(horizon_days);
    events
        .iter()
        .filter(|e| {
            let start = e.start.instant();
            start >= now && start <= cutoff
        })
        .collect()
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceOrigin;
    use crate::store::CalendarStore;

    fn store_with_feed(ics: &str) -> (CalendarStore, String) {
        let mut store = CalendarStore::new();
        let source = store
            .add_source("feed", Some("https://example.com/cal.ics"), SourceOrigin::RemoteFeed)
            .unwrap();
        store.import_from_text(&source.id, ics, &source.color).unwrap();
        (store, source.id)
    }

    const ICS: &str = "BEGIN:VEVENT\nUID:a\nSUMMARY:Later\nDTSTART:20260305T140000Z\nEND:VEVENT\nBEGIN:VEVENT\nUID:b\nSUMMARY:Earlier\nDTSTART:20260301T140000Z\nEND:VEVENT\n";

    #[test]
    fn disabled_sources_are_excluded() {
        let (mut store, id) = store_with_feed(ICS);
        let events = canonical_events(store.sources(), store.cache(), &[], &[]);
        assert_eq!(events.len(), 2);

        store.toggle_source(&id).unwrap();
        let events = canonical_events(store.sources(), store.cache(), &[], &[]);
        assert!(events.is_empty());
    }

    #[test]
    fn output_is_sorted_by_start() {
        let (store, _) = store_with_feed(ICS);
        let events = canonical_events(store.sources(), store.cache(), &[], &[]);
        assert_eq!(events[0].title, "Earlier");
        assert_eq!(events[1].title, "Later");
    }

    #[test]
    fn color_changes_apply_without_reimport() {
        let (mut store, id) = store_with_feed(ICS);
        store.set_source_color(&id, "#abcdef").unwrap();
        let events = canonical_events(store.sources(), store.cache(), &[], &[]);
        assert!(events.iter().all(|e| e.color == "#abcdef"));
    }

    #[test]
    fn manual_entries_infer_all_day_from_the_date_string() {
        let store = CalendarStore::new();
        let manual = vec![
            ManualEntry { id: "1".into(), title: "Bare date".into(), date: "2026-03-05".into() },
            ManualEntry {
                id: "2".into(),
                title: "Midnight literal".into(),
                date: "2026-03-05T00:00:00".into(),
            },
            ManualEntry { id: "3".into(), title: "Timed".into(), date: "2026-03-05T14:30:00".into() },
            ManualEntry { id: "4".into(), title: "Unparseable".into(), date: "soonish".into() },
        ];

        let events = canonical_events(store.sources(), store.cache(), &manual, &[]);
        assert_eq!(events.len(), 3);
        let by_uid = |uid: &str| events.iter().find(|e| e.uid == uid).unwrap();
        assert!(by_uid("1").all_day);
        assert!(by_uid("2").all_day);
        assert!(!by_uid("3").all_day);
        assert_eq!(by_uid("3").start, by_uid("3").end);
        assert_eq!(by_uid("1").source_id, MANUAL_SOURCE_ID);
        assert_eq!(by_uid("1").color, MANUAL_COLOR);
    }

    #[test]
    fn completed_or_undated_deadlines_are_excluded() {
        let store = CalendarStore::new();
        let deadlines = vec![
            DeadlineEntry {
                id: "p1".into(),
                name: "Rollout".into(),
                deadline: Some("2026-03-10".into()),
                completed: false,
            },
            DeadlineEntry {
                id: "p2".into(),
                name: "Shipped".into(),
                deadline: Some("2026-03-11".into()),
                completed: true,
            },
            DeadlineEntry { id: "p3".into(), name: "Unscheduled".into(), deadline: None, completed: false },
        ];

        let events = canonical_events(store.sources(), store.cache(), &[], &deadlines);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Rollout");
        assert_eq!(events[0].source_id, DEADLINE_SOURCE_ID);
        assert!(events[0].all_day);
        assert_eq!(events[0].start, events[0].end);
    }

    #[test]
    fn toggling_a_pseudo_source_mutes_its_stream() {
        let mut store = CalendarStore::new();
        store.toggle_source(MANUAL_SOURCE_ID).unwrap();
        let manual =
            vec![ManualEntry { id: "1".into(), title: "Muted".into(), date: "2026-03-05".into() }];
        let events = canonical_events(store.sources(), store.cache(), &manual, &[]);
        assert!(events.is_empty());
    }

    #[test]
    fn day_query_uses_closed_interval_overlap() {
        let store = CalendarStore::new();
        let manual = vec![
            ManualEntry { id: "1".into(), title: "On day".into(), date: "2026-03-05T09:00:00".into() },
            ManualEntry { id: "2".into(), title: "Day before".into(), date: "2026-03-04T23:00:00".into() },
        ];
        let events = canonical_events(store.sources(), store.cache(), &manual, &[]);

        let day = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        let hits = events_on_day(&events, day);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "On day");
    }

    #[test]
    fn upcoming_respects_the_horizon() {
        let store = CalendarStore::new();
        let manual = vec![
            ManualEntry { id: "1".into(), title: "Soon".into(), date: "2026-03-06T10:00:00".into() },
            ManualEntry { id: "2".into(), title: "Far".into(), date: "2026-05-01T10:00:00".into() },
            ManualEntry { id: "3".into(), title: "Past".into(), date: "2026-03-01T10:00:00".into() },
        ];
        let events = canonical_events(store.sources(), store.cache(), &manual, &[]);

        let now = resolve_local(
            NaiveDate::from_ymd_opt(2026, 3, 5).unwrap().and_hms_opt(12, 0, 0).unwrap(),
        );
        let hits = upcoming(&events, now, 30);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Soon");
    }
}
