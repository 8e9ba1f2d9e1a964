//! Global time window contract.
//!
//! DESIGN
//! ======
//! The time window is owned by a store outside this crate. The core reads the
//! current window and proposes changes as [`TimeWindowUpdate`] command values,
//! so tests can substitute an in-memory store and inspect what was dispatched.

#[cfg(test)]
#[path = "time_window_test.rs"]
mod time_window_test;

use serde::{Deserialize, Serialize};

/// Closed time interval in milliseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    start_ms: i64,
    end_ms: i64,
}

impl TimeWindow {
    /// Build a window from two bounds in either order.
    #[must_use]
    pub fn new(a: i64, b: i64) -> Self {
        Self { start_ms: a.min(b), end_ms: a.max(b) }
    }

    #[must_use]
    pub fn start_ms(&self) -> i64 {
        self.start_ms
    }

    #[must_use]
    pub fn end_ms(&self) -> i64 {
        self.end_ms
    }

    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Interval kind carried by an update request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalKind {
    /// Explicit bounds picked by the user.
    Custom,
}

/// Request to replace the global time window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindowUpdate {
    pub kind: IntervalKind,
    pub bounds: [i64; 2],
}

impl TimeWindowUpdate {
    #[must_use]
    pub fn custom(window: TimeWindow) -> Self {
        Self { kind: IntervalKind::Custom, bounds: [window.start_ms, window.end_ms] }
    }

    #[must_use]
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.bounds[0], self.bounds[1])
    }
}

/// Read/update access to the global time window.
pub trait TimeWindowStore {
    /// The window every widget query is currently scoped to.
    fn current(&self) -> TimeWindow;

    /// Apply an update request. Stores are free to normalize the bounds.
    fn dispatch(&mut self, update: TimeWindowUpdate);
}

/// Store that keeps the window in memory and records every dispatched update.
#[derive(Clone, Debug)]
pub struct InMemoryTimeStore {
    window: TimeWindow,
    history: Vec<TimeWindowUpdate>,
}

impl InMemoryTimeStore {
    #[must_use]
    pub fn new(window: TimeWindow) -> Self {
        Self { window, history: Vec::new() }
    }

    /// Updates received so far, oldest first.
    #[must_use]
    pub fn history(&self) -> &[TimeWindowUpdate] {
        &self.history
    }
}

impl TimeWindowStore for InMemoryTimeStore {
    fn current(&self) -> TimeWindow {
        self.window
    }

    fn dispatch(&mut self, update: TimeWindowUpdate) {
        self.window = update.window();
        self.history.push(update);
    }
}
