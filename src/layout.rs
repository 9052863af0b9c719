//! Greedy interval column packing for the timeline.
//!
//! Not optimal minimum-coloring: a column is never revisited for an
//! earlier gap, and an event's column never changes once assigned. In
//! exchange the result is deterministic for the same sorted input,
//! which keeps re-renders stable on every clock tick. O(n·c) for c
//! columns.

use serde::Serialize;

use crate::event::CalendarEvent;
use crate::window::TimeWindow;

/// Minimum height for a timed event, as a fraction of the window, so
/// short events stay visible.
pub const MIN_TIMED_HEIGHT: f64 = 0.008;
/// Fixed height for all-day events, which would otherwise render at
/// their clipped (possibly zero) duration.
pub const ALL_DAY_HEIGHT: f64 = 0.02;

/// Position assignment for one event within a window. Offsets and
/// heights are fractions of the window height; recomputed every pass,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutBlock {
    pub event_id: String,
    pub top_offset: f64,
    pub height: f64,
    pub column: usize,
    /// The number of columns opened over the whole pass; the same on
    /// every block so consumers can divide width without recomputing.
    pub total_columns: usize,
}

/// Lay out events into non-overlapping columns.
///
/// Expects events already filtered to the window and sorted ascending
/// by start (the aggregator's output order).
pub fn layout(events: &[CalendarEvent], window: &TimeWindow) -> Vec<LayoutBlock> {
    let total_ms = (window.end - window.start).num_milliseconds() as f64;

    let mut blocks: Vec<LayoutBlock> = Vec::new();
    // Per column, the index of its last-assigned block.
    let mut columns: Vec<usize> = Vec::new();

    for event in events {
        let clipped_start = event.start.instant().max(window.start);
        let clipped_end = event.end.instant().min(window.end);

        let top = (clipped_start - window.start).num_milliseconds() as f64 / total_ms;
        let height = if event.all_day {
            ALL_DAY_HEIGHT
        } else {
            let fraction = (clipped_end - clipped_start).num_milliseconds() as f64 / total_ms;
            fraction.max(MIN_TIMED_HEIGHT)
        };

        // First column whose last block ends at or before this top.
        let mut column = None;
        for (index, last) in columns.iter_mut().enumerate() {
            let last_block = &blocks[*last];
            if last_block.top_offset + last_block.height <= top {
                *last = blocks.len();
                column = Some(index);
                break;
            }
        }
        let column = column.unwrap_or_else(|| {
            columns.push(blocks.len());
            columns.len() - 1
        });

        blocks.push(LayoutBlock {
            event_id: event.id.clone(),
            top_offset: top,
            height,
            column,
            total_columns: 0,
        });
    }

    let total_columns = columns.len().max(1);
    for block in &mut blocks {
        block.total_columns = total_columns;
    }
    blocks
}
