//! Shared selected moment across the overview's sibling widgets.
//!
//! DESIGN
//! ======
//! Two states: unset (initial) and set(timestamp). Chart clicks move into
//! set; only [`SelectionCoordinator::reset`] returns to unset, which the page
//! calls when the service changes.
//!
//! Click handling is split into a pure extraction
//! ([`extract_click_timestamp`]) and one mutating entry point
//! ([`SelectionCoordinator::select`]). The widget kind is carried through for
//! the "View Traces" popup anchor only; it never changes the state machine.

#[cfg(test)]
#[path = "selection_test.rs"]
mod selection_test;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Widget that produced an interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    Rate,
    Error,
}

impl WidgetKind {
    /// DOM id of the widget's "View Traces" button.
    #[must_use]
    pub fn button_id(self) -> &'static str {
        match self {
            Self::Rate => "Rate_button",
            Self::Error => "Error_button",
        }
    }
}

/// Chart element under the cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActiveElement {
    pub dataset_index: usize,
    pub index: usize,
}

/// Click on a chart, already hit-tested by the chart library.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChartClick {
    pub active: Vec<ActiveElement>,
    /// Pointer position in page coordinates, if the event carried one.
    pub position: Option<(f64, f64)>,
}

/// The part of the chart's data model needed to map an index to a time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChartData {
    /// X-axis labels as epoch milliseconds, one per data index.
    pub labels: Vec<i64>,
}

/// Where the "View Traces" popup is shown.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PopupAnchor {
    pub kind: WidgetKind,
    pub x: f64,
    pub y: f64,
}

/// Snapshot of the coordinator's state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub timestamp: Option<i64>,
    /// Serialized trace tags for the current resource attributes.
    pub trace_tags: String,
}

/// Timestamp of the first element under the cursor, if any.
#[must_use]
pub fn extract_click_timestamp(_kind: WidgetKind, click: &ChartClick, data: &ChartData) -> Option<i64> {
    let first = click.active.first()?;
    data.labels.get(first.index).copied()
}

#[derive(Clone, Debug)]
pub struct SelectionCoordinator {
    state: SelectionState,
    popup: Option<PopupAnchor>,
}

impl Default for SelectionCoordinator {
    fn default() -> Self {
        Self { state: SelectionState { timestamp: None, trace_tags: "[]".to_owned() }, popup: None }
    }
}

impl SelectionCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    #[must_use]
    pub fn timestamp(&self) -> Option<i64> {
        self.state.timestamp
    }

    #[must_use]
    pub fn trace_tags(&self) -> &str {
        &self.state.trace_tags
    }

    #[must_use]
    pub fn popup(&self) -> Option<PopupAnchor> {
        self.popup
    }

    /// The single setter for the selected moment.
    pub fn select(&mut self, timestamp: i64) {
        debug!(timestamp, previous = ?self.state.timestamp, "selected moment changed");
        self.state.timestamp = Some(timestamp);
    }

    pub fn set_trace_tags(&mut self, serialized: String) {
        self.state.trace_tags = serialized;
    }

    /// Back to unset; hides the popup. Trace tags are kept.
    pub fn reset(&mut self) {
        self.state.timestamp = None;
        self.popup = None;
    }

    #[must_use]
    pub fn click_handler(&self, kind: WidgetKind) -> ClickHandler {
        ClickHandler { kind }
    }

    /// Apply a chart click from a widget of `kind`.
    ///
    /// A click with no element under the cursor leaves the selection alone and
    /// hides a visible popup. A hit without a pointer position selects the
    /// moment but hides the popup, since there is nowhere to anchor it.
    pub fn handle_click(&mut self, kind: WidgetKind, click: &ChartClick, data: &ChartData) {
        match extract_click_timestamp(kind, click, data) {
            Some(timestamp) => {
                self.popup = click.position.map(|(x, y)| PopupAnchor { kind, x, y });
                self.select(timestamp);
            }
            None => {
                if click.active.is_empty() {
                    self.popup = None;
                }
            }
        }
    }
}

/// Per-widget click callback. Identical for every kind apart from the label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClickHandler {
    kind: WidgetKind,
}

impl ClickHandler {
    #[must_use]
    pub fn kind(&self) -> WidgetKind {
        self.kind
    }

    pub fn handle(&self, coordinator: &mut SelectionCoordinator, click: &ChartClick, data: &ChartData) {
        coordinator.handle_click(self.kind, click, data);
    }
}
