//! Calendar ingestion and timeline layout engine for the ops dashboard.
//!
//! The engine parses iCalendar-style interchange text, merges events
//! from remote feeds, imported files, manually entered items, and
//! externally owned deadlines into one canonical list, and computes a
//! deterministic non-overlapping column layout for an arbitrary,
//! continuously advancing time window.
//!
//! - [`ics`] — interchange parser (pure, total)
//! - [`store`] — source registry and per-source event cache
//! - [`aggregate`] — canonical event list and day/upcoming queries
//! - [`window`] — window resolution, gridlines, intersection
//! - [`layout`] — greedy column packing
//! - [`service`] — async facade: file import, feed sync, auto-sync
//! - [`fetch`] / [`persist`] — pluggable HTTP and storage collaborators

pub mod aggregate;
pub mod error;
pub mod event;
pub mod fetch;
pub mod ics;
pub mod layout;
pub mod persist;
pub mod service;
pub mod source;
pub mod store;
pub mod window;

pub use aggregate::{DeadlineEntry, ManualEntry, canonical_events, events_on_day, upcoming};
pub use error::{CalendarError, CalendarResult};
pub use event::{CalendarEvent, EventTime, RawIcsEvent};
pub use fetch::{FetchResponse, HttpClient, HttpFetch};
pub use layout::{LayoutBlock, layout};
pub use persist::{KvStore, MemoryStore};
pub use service::{AutoSyncHandle, CalendarService, DEFAULT_SYNC_INTERVAL};
pub use source::{CalendarSource, SourceOrigin};
pub use store::{CacheEntry, CalendarStore, StoreChange};
pub use window::{Granularity, Gridline, TimeWindow, resolve_window};
