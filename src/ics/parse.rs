//! Parser for the VEVENT subset of the iCalendar interchange format.
//!
//! Total over arbitrary input: malformed records are skipped, never
//! reported. Only `UID`, `SUMMARY`, `DESCRIPTION`, `LOCATION`,
//! `DTSTART`, and `DTEND` are recognized; every other property or block
//! type is ignored.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::event::{EventTime, RawIcsEvent};

/// Parse raw interchange text into an ordered list of event records.
///
/// A record is emitted only when it has a non-empty summary and a
/// recognizable start. A `BEGIN:VEVENT` encountered before the matching
/// `END:VEVENT` silently restarts the record, discarding the partial
/// one. Records missing a final `END:VEVENT` are dropped.
pub fn parse(text: &str) -> Vec<RawIcsEvent> {
    let mut events = Vec::new();
    let mut current: Option<PartialEvent> = None;

    for line in unfold(text) {
        let line = line.trim();

        if line == "BEGIN:VEVENT" {
            current = Some(PartialEvent::default());
            continue;
        }
        if line == "END:VEVENT" {
            if let Some(partial) = current.take()
                && let Some(event) = partial.finish()
            {
                events.push(event);
            }
            continue;
        }
        let Some(partial) = current.as_mut() else {
            continue;
        };
        let Some((prop, value)) = line.split_once(':') else {
            continue;
        };
        // Parameters after ';' are dropped; they only delimit the name.
        let name = prop.split(';').next().unwrap_or(prop).to_ascii_uppercase();

        match name.as_str() {
            "UID" => partial.uid = value.to_string(),
            "SUMMARY" => partial.summary = unescape_text(value),
            "DESCRIPTION" => partial.description = unescape_text(value),
            "LOCATION" => partial.location = unescape_text(value),
            "DTSTART" => {
                if let Some((time, all_day)) = parse_ics_date(value) {
                    partial.start = Some(time);
                    partial.all_day = all_day;
                } else {
                    partial.start = None;
                }
            }
            "DTEND" => partial.end = parse_ics_date(value).map(|(time, _)| time),
            _ => {}
        }
    }

    events
}

#[derive(Default)]
struct PartialEvent {
    uid: String,
    summary: String,
    description: String,
    location: String,
    start: Option<EventTime>,
    end: Option<EventTime>,
    all_day: bool,
}

impl PartialEvent {
    fn finish(self) -> Option<RawIcsEvent> {
        let start = self.start?;
        if self.summary.is_empty() {
            return None;
        }

        let end = match self.end {
            Some(end) if end.instant() >= start.instant() => end,
            // An end before the start would break layout downstream.
            Some(_) => start.clone(),
            None => default_end(&start),
        };

        Some(RawIcsEvent {
            uid: self.uid,
            summary: self.summary,
            description: self.description,
            location: self.location,
            start,
            end,
            all_day: self.all_day,
        })
    }
}

/// Default duration when DTEND is absent: one day for all-day events,
/// one hour for timed ones. Layout overlap behavior depends on this.
fn default_end(start: &EventTime) -> EventTime {
    match start {
        EventTime::Date(d) => EventTime::Date(d.succ_opt().unwrap_or(*d)),
        EventTime::Utc(dt) => EventTime::Utc(*dt + Duration::hours(1)),
        EventTime::Floating(dt) => EventTime::Floating(*dt + Duration::hours(1)),
    }
}

/// Normalize line endings, then splice folded lines back together:
/// a physical line starting with one space or tab continues the
/// previous logical line, with that whitespace byte removed.
fn unfold(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    normalized
        .replace("\n ", "")
        .replace("\n\t", "")
        .split('\n')
        .map(str::to_string)
        .collect()
}

/// Unescape text property values: `\n` → newline, `\,` → comma,
/// `\\` → backslash, applied in that fixed order.
fn unescape_text(value: &str) -> String {
    value
        .replace("\\n", "\n")
        .replace("\\,", ",")
        .replace("\\\\", "\\")
}

/// Sniff a date value into an [`EventTime`].
///
/// Exactly 8 digits is an all-day date. `YYYYMMDDTHHMMSS` is a timed
/// value, UTC with a `Z` suffix and floating without. Anything else is
/// unrecognized and yields `None`.
fn parse_ics_date(value: &str) -> Option<(EventTime, bool)> {
    let clean = value.trim();

    if clean.len() == 8 && clean.bytes().all(|b| b.is_ascii_digit()) {
        let date = NaiveDate::parse_from_str(clean, "%Y%m%d").ok()?;
        return Some((EventTime::Date(date), true));
    }

    if let Some(stripped) = clean.strip_suffix('Z') {
        let dt = NaiveDateTime::parse_from_str(stripped, "%Y%m%dT%H%M%S").ok()?;
        return Some((EventTime::Utc(dt.and_utc()), false));
    }

    let dt = NaiveDateTime::parse_from_str(clean, "%Y%m%dT%H%M%S").ok()?;
    Some((EventTime::Floating(dt), false))
}
