//! Source registry and per-source event cache.
//!
//! The store is the only mutable shared state in the engine. It is
//! owned by one logical host; change notifications go out on a
//! broadcast channel so any UI layer can subscribe without coupling the
//! core to a rendering model.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::error::{CalendarError, CalendarResult};
use crate::event::CalendarEvent;
use crate::ics;
use crate::persist::{EVENT_CACHE_KEY, KvStore, SOURCES_KEY};
use crate::source::{
    CalendarSource, DEADLINE_COLOR, DEADLINE_SOURCE_ID, MANUAL_COLOR, MANUAL_SOURCE_ID,
    SOURCE_PALETTE, SourceOrigin,
};

/// What changed in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    /// The source list or a source's configuration changed.
    Sources,
    /// A source's cached events were replaced.
    Events,
}

/// Cached parse result for one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub events: Vec<CalendarEvent>,
    pub fetched_at: DateTime<Utc>,
}

/// Persisted registry shape: the ordered source list plus the palette
/// counter that keeps color assignment stable across remove/re-add.
#[derive(Debug, Serialize, Deserialize)]
struct SourcesSnapshot {
    sources: Vec<CalendarSource>,
    created_count: usize,
}

pub struct CalendarStore {
    sources: Vec<CalendarSource>,
    cache: HashMap<String, CacheEntry>,
    /// Count of sources ever created, not current length.
    created_count: usize,
    changes: broadcast::Sender<StoreChange>,
}

impl CalendarStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        CalendarStore {
            sources: vec![
                pseudo_source(MANUAL_SOURCE_ID, "Manual events", SourceOrigin::Manual, MANUAL_COLOR),
                pseudo_source(
                    DEADLINE_SOURCE_ID,
                    "External deadlines",
                    SourceOrigin::ExternalDeadline,
                    DEADLINE_COLOR,
                ),
            ],
            cache: HashMap::new(),
            created_count: 0,
            changes,
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    fn notify(&self, change: StoreChange) {
        // Nobody listening is fine.
        let _ = self.changes.send(change);
    }

    // =========================================================================
    // Registry operations
    // =========================================================================

    pub fn sources(&self) -> &[CalendarSource] {
        &self.sources
    }

    pub fn source(&self, id: &str) -> Option<&CalendarSource> {
        self.sources.iter().find(|s| s.id == id)
    }

    /// Add a source. The color comes from the palette, round-robin on a
    /// stored creation counter so re-adding after a removal does not
    /// shift colors. Remote feeds require a locator; nothing else may
    /// carry one, and the reserved pseudo-origins cannot be added.
    pub fn add_source(
        &mut self,
        name: &str,
        locator: Option<&str>,
        origin: SourceOrigin,
    ) -> CalendarResult<CalendarSource> {
        if origin.is_reserved() {
            return Err(CalendarError::ReservedSource(name.to_string()));
        }
        match (origin, locator) {
            (SourceOrigin::RemoteFeed, None) => {
                return Err(CalendarError::InvalidSource(format!(
                    "remote feed '{name}' needs a locator"
                )));
            }
            (SourceOrigin::RemoteFeed, Some(_)) => {}
            (_, Some(_)) => {
                return Err(CalendarError::InvalidSource(format!(
                    "source '{name}' is not a remote feed and cannot have a locator"
                )));
            }
            (_, None) => {}
        }

        let source = CalendarSource {
            id: format!("src-{}", Uuid::new_v4()),
            name: name.to_string(),
            origin,
            locator: locator.map(str::to_string),
            color: SOURCE_PALETTE[self.created_count % SOURCE_PALETTE.len()].to_string(),
            enabled: true,
            last_synced: None,
        };
        self.created_count += 1;
        self.sources.push(source.clone());
        self.notify(StoreChange::Sources);
        Ok(source)
    }

    /// Remove a source and purge its cache entry. No-op for unknown
    /// ids; the pseudo-sources refuse removal.
    pub fn remove_source(&mut self, id: &str) -> CalendarResult<()> {
        if let Some(source) = self.source(id)
            && source.is_reserved()
        {
            return Err(CalendarError::ReservedSource(id.to_string()));
        }
        let before = self.sources.len();
        self.sources.retain(|s| s.id != id);
        self.cache.remove(id);
        if self.sources.len() != before {
            self.notify(StoreChange::Sources);
            self.notify(StoreChange::Events);
        }
        Ok(())
    }

    /// Flip a source's enabled flag. The cache entry is retained so
    /// re-enabling is cheap.
    pub fn toggle_source(&mut self, id: &str) -> CalendarResult<()> {
        let source = self
            .sources
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| CalendarError::UnknownSource(id.to_string()))?;
        source.enabled = !source.enabled;
        self.notify(StoreChange::Sources);
        Ok(())
    }

    /// Explicitly change a source's color.
    pub fn set_source_color(&mut self, id: &str, color: &str) -> CalendarResult<()> {
        let source = self
            .sources
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| CalendarError::UnknownSource(id.to_string()))?;
        if source.is_reserved() {
            return Err(CalendarError::ReservedSource(id.to_string()));
        }
        source.color = color.to_string();
        self.notify(StoreChange::Sources);
        Ok(())
    }

    // =========================================================================
    // Event cache
    // =========================================================================

    pub fn cache(&self) -> &HashMap<String, CacheEntry> {
        &self.cache
    }

    pub fn cached_events(&self, source_id: &str) -> Option<&CacheEntry> {
        self.cache.get(source_id)
    }

    /// Parse interchange text and replace the source's cache entry
    /// wholesale. Returns the number of events imported.
    pub fn import_from_text(
        &mut self,
        source_id: &str,
        text: &str,
        color: &str,
    ) -> CalendarResult<usize> {
        if self.source(source_id).is_none() {
            return Err(CalendarError::UnknownSource(source_id.to_string()));
        }

        let events: Vec<CalendarEvent> = ics::parse(text)
            .into_iter()
            .map(|raw| {
                let id = if raw.uid.is_empty() {
                    format!("{source_id}-{}", Uuid::new_v4().simple())
                } else {
                    format!("{source_id}-{}", raw.uid)
                };
                CalendarEvent {
                    id,
                    uid: raw.uid,
                    title: raw.summary,
                    description: raw.description,
                    location: raw.location,
                    start: raw.start,
                    end: raw.end,
                    all_day: raw.all_day,
                    source_id: source_id.to_string(),
                    color: color.to_string(),
                }
            })
            .collect();
        let count = events.len();

        let now = Utc::now();
        self.cache.insert(
            source_id.to_string(),
            CacheEntry { events, fetched_at: now },
        );
        if let Some(source) = self.sources.iter_mut().find(|s| s.id == source_id) {
            source.last_synced = Some(now);
        }

        debug!(source = source_id, count, "imported calendar events");
        self.notify(StoreChange::Events);
        self.notify(StoreChange::Sources);
        Ok(count)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Write the registry and cache to the two persistence keys.
    pub fn save(&self, kv: &mut dyn KvStore) -> CalendarResult<()> {
        let snapshot = SourcesSnapshot {
            sources: self.sources.clone(),
            created_count: self.created_count,
        };
        let sources_json = serde_json::to_string(&snapshot)
            .map_err(|e| CalendarError::Persistence(e.to_string()))?;
        let cache_json = serde_json::to_string(&self.cache)
            .map_err(|e| CalendarError::Persistence(e.to_string()))?;
        kv.set(SOURCES_KEY, sources_json);
        kv.set(EVENT_CACHE_KEY, cache_json);
        Ok(())
    }

    /// Rebuild a store from the persistence keys. Missing keys yield a
    /// fresh store; the pseudo-sources are re-seeded if a snapshot
    /// predates them.
    pub fn load(kv: &dyn KvStore) -> CalendarResult<Self> {
        let mut store = CalendarStore::new();

        if let Some(sources_json) = kv.get(SOURCES_KEY) {
            let snapshot: SourcesSnapshot = serde_json::from_str(&sources_json)
                .map_err(|e| CalendarError::Persistence(e.to_string()))?;
            store.created_count = snapshot.created_count;
            for source in snapshot.sources {
                if store.source(&source.id).is_none() {
                    store.sources.push(source);
                } else if let Some(existing) =
                    store.sources.iter_mut().find(|s| s.id == source.id)
                {
                    *existing = source;
                }
            }
        }
        if let Some(cache_json) = kv.get(EVENT_CACHE_KEY) {
            store.cache = serde_json::from_str(&cache_json)
                .map_err(|e| CalendarError::Persistence(e.to_string()))?;
        }
        Ok(store)
    }
}

impl Default for CalendarStore {
    fn default() -> Self {
        Self::new()
    }
}

fn pseudo_source(id: &str, name: &str, origin: SourceOrigin, color: &str) -> CalendarSource {
    CalendarSource {
        id: id.to_string(),
        name: name.to_string(),
        origin,
        locator: None,
        color: color.to_string(),
        enabled: true,
        last_synced: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryStore;

    const FEED_URL: &str = "https://feeds.example.com/oncall.ics";

    const ONE_EVENT: &str = "BEGIN:VEVENT\nUID:abc\nSUMMARY:Standup\nDTSTART:20260302T140000Z\nDTEND:20260302T143000Z\nEND:VEVENT\n";
    const TWO_EVENTS: &str = "BEGIN:VEVENT\nUID:a\nSUMMARY:One\nDTSTART:20260302T140000Z\nEND:VEVENT\nBEGIN:VEVENT\nUID:b\nSUMMARY:Two\nDTSTART:20260303T140000Z\nEND:VEVENT\n";

    #[test]
    fn pseudo_sources_always_exist_and_resist_removal() {
        let mut store = CalendarStore::new();
        assert!(store.source(MANUAL_SOURCE_ID).is_some());
        assert!(store.source(DEADLINE_SOURCE_ID).is_some());

        assert!(matches!(
            store.remove_source(MANUAL_SOURCE_ID),
            Err(CalendarError::ReservedSource(_))
        ));
        assert!(matches!(
            store.add_source("more manual", None, SourceOrigin::Manual),
            Err(CalendarError::ReservedSource(_))
        ));
        assert!(matches!(
            store.set_source_color(DEADLINE_SOURCE_ID, "#000000"),
            Err(CalendarError::ReservedSource(_))
        ));
    }

    #[test]
    fn palette_colors_assigned_round_robin() {
        let mut store = CalendarStore::new();
        for i in 0..10 {
            let source = store
                .add_source(&format!("feed {i}"), Some(FEED_URL), SourceOrigin::RemoteFeed)
                .unwrap();
            assert_eq!(source.color, SOURCE_PALETTE[i % SOURCE_PALETTE.len()]);
            assert!(source.enabled);
            assert!(source.last_synced.is_none());
        }
    }

    #[test]
    fn palette_counter_survives_remove_and_re_add() {
        let mut store = CalendarStore::new();
        let a = store.add_source("a", Some(FEED_URL), SourceOrigin::RemoteFeed).unwrap();
        let b = store.add_source("b", Some(FEED_URL), SourceOrigin::RemoteFeed).unwrap();
        assert_eq!(a.color, SOURCE_PALETTE[0]);
        assert_eq!(b.color, SOURCE_PALETTE[1]);

        store.remove_source(&b.id).unwrap();
        let c = store.add_source("c", Some(FEED_URL), SourceOrigin::RemoteFeed).unwrap();
        // Not palette[1]: the counter counts creations, not live sources.
        assert_eq!(c.color, SOURCE_PALETTE[2]);
    }

    #[test]
    fn locator_invariant_is_enforced() {
        let mut store = CalendarStore::new();
        assert!(matches!(
            store.add_source("feed", None, SourceOrigin::RemoteFeed),
            Err(CalendarError::InvalidSource(_))
        ));
        assert!(matches!(
            store.add_source("file", Some(FEED_URL), SourceOrigin::ImportedFile),
            Err(CalendarError::InvalidSource(_))
        ));
        assert!(store.add_source("file", None, SourceOrigin::ImportedFile).is_ok());
    }

    #[test]
    fn import_replaces_cache_wholesale_and_updates_last_synced() {
        let mut store = CalendarStore::new();
        let source = store.add_source("feed", Some(FEED_URL), SourceOrigin::RemoteFeed).unwrap();

        let count = store.import_from_text(&source.id, TWO_EVENTS, &source.color).unwrap();
        assert_eq!(count, 2);
        assert_eq!(store.cached_events(&source.id).unwrap().events.len(), 2);

        let count = store.import_from_text(&source.id, ONE_EVENT, &source.color).unwrap();
        assert_eq!(count, 1);
        let entry = store.cached_events(&source.id).unwrap();
        assert_eq!(entry.events.len(), 1);
        assert_eq!(entry.events[0].id, format!("{}-abc", source.id));
        assert_eq!(entry.events[0].title, "Standup");
        assert!(store.source(&source.id).unwrap().last_synced.is_some());
    }

    #[test]
    fn uid_less_events_get_fresh_ids_per_import() {
        let mut store = CalendarStore::new();
        let source = store.add_source("file", None, SourceOrigin::ImportedFile).unwrap();
        let no_uid = "BEGIN:VEVENT\nSUMMARY:Anon\nDTSTART:20260302T140000Z\nEND:VEVENT\n";

        store.import_from_text(&source.id, no_uid, &source.color).unwrap();
        let first = store.cached_events(&source.id).unwrap().events[0].id.clone();
        store.import_from_text(&source.id, no_uid, &source.color).unwrap();
        let second = store.cached_events(&source.id).unwrap().events[0].id.clone();

        assert!(first.starts_with(&format!("{}-", source.id)));
        assert_ne!(first, second);
    }

    #[test]
    fn remove_purges_cache_but_toggle_retains_it() {
        let mut store = CalendarStore::new();
        let source = store.add_source("feed", Some(FEED_URL), SourceOrigin::RemoteFeed).unwrap();
        store.import_from_text(&source.id, ONE_EVENT, &source.color).unwrap();

        store.toggle_source(&source.id).unwrap();
        assert!(!store.source(&source.id).unwrap().enabled);
        assert!(store.cached_events(&source.id).is_some());

        store.remove_source(&source.id).unwrap();
        assert!(store.source(&source.id).is_none());
        assert!(store.cached_events(&source.id).is_none());

        // Removing again is a no-op.
        store.remove_source(&source.id).unwrap();
    }

    #[test]
    fn mutations_notify_subscribers() {
        let mut store = CalendarStore::new();
        let mut rx = store.subscribe();

        let source = store.add_source("feed", Some(FEED_URL), SourceOrigin::RemoteFeed).unwrap();
        assert_eq!(rx.try_recv().unwrap(), StoreChange::Sources);

        store.import_from_text(&source.id, ONE_EVENT, &source.color).unwrap();
        assert_eq!(rx.try_recv().unwrap(), StoreChange::Events);
        assert_eq!(rx.try_recv().unwrap(), StoreChange::Sources);

        store.toggle_source(&source.id).unwrap();
        assert_eq!(rx.try_recv().unwrap(), StoreChange::Sources);
    }

    #[test]
    fn snapshot_round_trips_through_kv_store() {
        let mut store = CalendarStore::new();
        let source = store.add_source("feed", Some(FEED_URL), SourceOrigin::RemoteFeed).unwrap();
        store.import_from_text(&source.id, ONE_EVENT, &source.color).unwrap();
        store.set_source_color(&source.id, "#123456").unwrap();

        let mut kv = MemoryStore::new();
        store.save(&mut kv).unwrap();

        let restored = CalendarStore::load(&kv).unwrap();
        assert_eq!(restored.sources().len(), store.sources().len());
        let restored_source = restored.source(&source.id).unwrap();
        assert_eq!(restored_source.color, "#123456");
        assert_eq!(
            restored.cached_events(&source.id).unwrap().events,
            store.cached_events(&source.id).unwrap().events
        );

        // The counter round-trips too: the next add continues the cycle.
        let mut restored = restored;
        let next = restored.add_source("b", Some(FEED_URL), SourceOrigin::RemoteFeed).unwrap();
        assert_eq!(next.color, SOURCE_PALETTE[1]);
    }

    #[test]
    fn load_from_empty_kv_yields_fresh_store() {
        let kv = MemoryStore::new();
        let store = CalendarStore::load(&kv).unwrap();
        assert_eq!(store.sources().len(), 2);
        assert!(store.cache().is_empty());
    }
}
