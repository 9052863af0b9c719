//! Calendar source identity and configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved id for the manually-entered-event pseudo-source.
pub const MANUAL_SOURCE_ID: &str = "manual";
/// Reserved id for the externally-owned deadline pseudo-source.
pub const DEADLINE_SOURCE_ID: &str = "external-deadline";

/// Display color for manually entered events.
pub const MANUAL_COLOR: &str = "#06b6d4";
/// Display color for external deadline events.
pub const DEADLINE_COLOR: &str = "#f59e0b";

/// Palette cycled through as sources are created.
pub const SOURCE_PALETTE: [&str; 8] = [
    "#06b6d4", // cyan
    "#8b5cf6", // violet
    "#f59e0b", // amber
    "#10b981", // emerald
    "#ef4444", // red
    "#ec4899", // pink
    "#3b82f6", // blue
    "#f97316", // orange
];

/// Where a source's events come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceOrigin {
    /// A subscribed ICS feed, re-fetched periodically.
    RemoteFeed,
    /// A one-shot ICS file import.
    ImportedFile,
    /// Manually entered items (reserved pseudo-source).
    Manual,
    /// Externally owned deadline records (reserved pseudo-source).
    ExternalDeadline,
}

impl SourceOrigin {
    /// Pseudo-origins exist from the start and cannot be added or removed.
    pub fn is_reserved(&self) -> bool {
        matches!(self, SourceOrigin::Manual | SourceOrigin::ExternalDeadline)
    }
}

/// One configured origin of calendar events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarSource {
    pub id: String,
    pub name: String,
    pub origin: SourceOrigin,
    /// Feed URL; `Some` iff `origin` is [`SourceOrigin::RemoteFeed`].
    pub locator: Option<String>,
    pub color: String,
    pub enabled: bool,
    pub last_synced: Option<DateTime<Utc>>,
}

impl CalendarSource {
    pub fn is_reserved(&self) -> bool {
        self.origin.is_reserved()
    }

    pub fn is_remote(&self) -> bool {
        self.origin == SourceOrigin::RemoteFeed
    }
}
