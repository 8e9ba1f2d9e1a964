//! Drag-to-zoom on a time-series chart.

#[cfg(test)]
#[path = "range_test.rs"]
mod range_test;

use tracing::debug;

use crate::time_window::{TimeWindow, TimeWindowStore, TimeWindowUpdate};

/// Update request for a drag from `start` to `end` (fractional epoch ms).
///
/// Both ends are truncated to whole milliseconds and sorted. Returns `None`
/// for a zero-width drag (a click read as a drag) or for an end that is not
/// a representable millisecond timestamp.
#[must_use]
pub fn drag_update(start: f64, end: f64) -> Option<TimeWindowUpdate> {
    let (start_ms, end_ms) = (to_millis(start)?, to_millis(end)?);
    if start_ms == end_ms {
        return None;
    }

    Some(TimeWindowUpdate::custom(TimeWindow::new(start_ms, end_ms)))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn to_millis(value: f64) -> Option<i64> {
    let value = value.trunc();
    // `i64::MAX as f64` rounds up to 2^63, which is already out of range.
    (value.is_finite() && value >= i64::MIN as f64 && value < i64::MAX as f64).then(|| value as i64)
}

/// Forwards drag selections to the global time window.
pub struct RangeSelectionHandler<'a, T: TimeWindowStore> {
    store: &'a mut T,
}

impl<'a, T: TimeWindowStore> RangeSelectionHandler<'a, T> {
    pub fn new(store: &'a mut T) -> Self {
        Self { store }
    }

    /// Returns the dispatched update, or `None` when the drag was a no-op.
    pub fn on_drag_select(&mut self, start: f64, end: f64) -> Option<TimeWindowUpdate> {
        let update = drag_update(start, end)?;
        debug!(start = update.bounds[0], end = update.bounds[1], "drag selection updates time window");
        self.store.dispatch(update);
        Some(update)
    }
}
