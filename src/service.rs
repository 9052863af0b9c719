//! Host-facing facade: owns the store behind a lock and drives the
//! suspending operations (file import, remote sync, periodic resync).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::aggregate::{self, DeadlineEntry, ManualEntry};
use crate::error::CalendarResult;
use crate::event::CalendarEvent;
use crate::fetch::HttpFetch;
use crate::layout::{LayoutBlock, layout};
use crate::source::{CalendarSource, SourceOrigin};
use crate::store::{CalendarStore, StoreChange};
use crate::window::TimeWindow;

/// Cadence for the background feed resync.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// The engine's public surface. Cloneable; clones share one store.
#[derive(Clone)]
pub struct CalendarService {
    store: Arc<Mutex<CalendarStore>>,
    http: Arc<dyn HttpFetch>,
}

impl CalendarService {
    pub fn new(store: CalendarStore, http: Arc<dyn HttpFetch>) -> Self {
        CalendarService { store: Arc::new(Mutex::new(store)), http }
    }

    /// Shared handle to the underlying store, for hosts that need
    /// registry operations or persistence.
    pub fn store(&self) -> Arc<Mutex<CalendarStore>> {
        Arc::clone(&self.store)
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.store.lock().await.subscribe()
    }

    pub async fn sources(&self) -> Vec<CalendarSource> {
        self.store.lock().await.sources().to_vec()
    }

    /// Read a calendar file, register it as an imported-file source
    /// named after the file stem, and cache its events. Read failures
    /// propagate to the caller.
    pub async fn import_from_path(&self, path: &Path) -> CalendarResult<usize> {
        let text = tokio::fs::read_to_string(path).await?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "calendar".to_string());

        let mut store = self.store.lock().await;
        let source = store.add_source(&name, None, SourceOrigin::ImportedFile)?;
        store.import_from_text(&source.id, &text, &source.color)
    }

    /// Fetch a remote feed and replace its cache. Every failure mode
    /// (unknown/non-remote source, network error, non-2xx, timeout)
    /// resolves to 0 with the prior cache left intact; remote sync is
    /// best-effort and must never block unrelated sources.
    pub async fn sync_source(&self, id: &str) -> usize {
        let target = {
            let store = self.store.lock().await;
            store.source(id).filter(|s| s.is_remote()).and_then(|s| {
                s.locator.as_ref().map(|url| (url.clone(), s.color.clone()))
            })
        };
        let Some((url, color)) = target else {
            return 0;
        };

        // The lock is not held across the fetch.
        let response = match self.http.get(&url).await {
            Ok(response) => response,
            Err(err) => {
                debug!(source = id, error = %err, "feed fetch failed");
                return 0;
            }
        };
        if !response.ok() {
            debug!(source = id, status = response.status, "feed fetch rejected");
            return 0;
        }

        let mut store = self.store.lock().await;
        // The source may have been removed while the fetch was in flight.
        store.import_from_text(id, &response.body, &color).unwrap_or(0)
    }

    /// Sync every enabled remote feed, sequentially to bound concurrent
    /// outbound calls. Returns the total events imported.
    pub async fn sync_all(&self) -> usize {
        let ids: Vec<String> = {
            let store = self.store.lock().await;
            store
                .sources()
                .iter()
                .filter(|s| s.is_remote() && s.enabled)
                .map(|s| s.id.clone())
                .collect()
        };

        let mut total = 0;
        for id in ids {
            total += self.sync_source(&id).await;
        }
        total
    }

    /// Run `sync_all` now and then on every interval tick until the
    /// returned handle is stopped or dropped.
    pub fn spawn_auto_sync(&self, interval: Duration) -> AutoSyncHandle {
        let service = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let imported = service.sync_all().await;
                debug!(imported, "auto-sync pass finished");
            }
        });
        AutoSyncHandle { task }
    }

    /// The canonical event list for the given collaborator streams.
    pub async fn canonical_events(
        &self,
        manual: &[ManualEntry],
        deadlines: &[DeadlineEntry],
    ) -> Vec<CalendarEvent> {
        let store = self.store.lock().await;
        aggregate::canonical_events(store.sources(), store.cache(), manual, deadlines)
    }

    /// Canonical events filtered to the window and laid out.
    pub async fn layout_blocks(
        &self,
        manual: &[ManualEntry],
        deadlines: &[DeadlineEntry],
        window: &TimeWindow,
    ) -> Vec<LayoutBlock> {
        let events = self.canonical_events(manual, deadlines).await;
        let visible: Vec<CalendarEvent> =
            events.into_iter().filter(|e| window.intersects(e)).collect();
        layout(&visible, window)
    }
}

/// Aborts the auto-sync task when stopped or dropped.
pub struct AutoSyncHandle {
    task: JoinHandle<()>,
}

impl AutoSyncHandle {
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for AutoSyncHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
