//! One service's overview page: wires tags, operations, widgets, selection
//! and links together.
//!
//! DESIGN
//! ======
//! Derived values (tag filters, trace tags, widget queries) are recomputed
//! from current inputs on every read; widget queries are memoized per kind by
//! input equality. A widget is only ever built from the operation set resolved
//! for the *current* `(service, window, tags)` key: if that key has not
//! resolved yet the widget is pending, even when an older key has data.
//!
//! Widgets that do not depend on the operation set (the per-operation detail
//! table, the selection, links) keep working when the lookup fails.

#[cfg(test)]
#[path = "overview_test.rs"]
mod overview_test;

use std::collections::HashMap;

use tracing::info;

use crate::deep_link::{DeepLinkEncoder, DeepLinkError, DrillDown, DrillDownRequest};
use crate::features::{FeatureFlags, OperationDetailWidget, operation_detail_widget};
use crate::memo::Memo;
use crate::operations::{
    OperationSetKey, OperationSetResolver, OperationsStatus, ResolveError, TopLevelOperationsSource,
};
use crate::query::{MetricKind, WidgetQuery, default_widget_query};
use crate::range::RangeSelectionHandler;
use crate::selection::{ChartClick, ChartData, SelectionCoordinator, WidgetKind};
use crate::tags::{ResourceAttributeQuery, TagFilterItem, derive_tag_filters, serialize_trace_tags};
use crate::time_window::{TimeWindow, TimeWindowStore, TimeWindowUpdate};

/// What a metric widget should render.
#[derive(Clone, Debug, PartialEq)]
pub enum WidgetStatus {
    Pending,
    Failed(ResolveError),
    Ready(WidgetQuery),
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct WidgetInputs {
    service_name: String,
    tag_filters: Vec<TagFilterItem>,
    operations: Vec<String>,
}

pub struct ServiceOverview<S, T> {
    service_name: String,
    attributes: Vec<ResourceAttributeQuery>,
    tag_filters: Vec<TagFilterItem>,
    resolver: OperationSetResolver<S>,
    selection: SelectionCoordinator,
    encoder: DeepLinkEncoder,
    time: T,
    widgets: HashMap<MetricKind, Memo<WidgetInputs, WidgetQuery>>,
}

impl<S: TopLevelOperationsSource, T: TimeWindowStore> ServiceOverview<S, T> {
    #[must_use]
    pub fn new(service_name: impl Into<String>, source: S, time: T, encoder: DeepLinkEncoder) -> Self {
        Self {
            service_name: service_name.into(),
            attributes: Vec::new(),
            tag_filters: Vec::new(),
            resolver: OperationSetResolver::new(source),
            selection: SelectionCoordinator::new(),
            encoder,
            time,
            widgets: HashMap::new(),
        }
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Switch to another service. The selected moment belongs to the old
    /// service and is cleared.
    pub fn set_service(&mut self, service_name: impl Into<String>) {
        let service_name = service_name.into();
        if service_name != self.service_name {
            info!(from = %self.service_name, to = %service_name, "overview service changed");
            self.service_name = service_name;
            self.selection.reset();
        }
    }

    pub fn set_resource_attributes(&mut self, attributes: Vec<ResourceAttributeQuery>) {
        self.tag_filters = derive_tag_filters(&attributes);
        self.selection.set_trace_tags(serialize_trace_tags(&attributes));
        self.attributes = attributes;
    }

    #[must_use]
    pub fn resource_attributes(&self) -> &[ResourceAttributeQuery] {
        &self.attributes
    }

    #[must_use]
    pub fn tag_filters(&self) -> &[TagFilterItem] {
        &self.tag_filters
    }

    #[must_use]
    pub fn time_window(&self) -> TimeWindow {
        self.time.current()
    }

    #[must_use]
    pub fn time_store(&self) -> &T {
        &self.time
    }

    #[must_use]
    pub fn selection(&self) -> &SelectionCoordinator {
        &self.selection
    }

    #[must_use]
    pub fn operation_key(&self) -> OperationSetKey {
        OperationSetKey {
            service_name: self.service_name.clone(),
            window: self.time.current(),
            tag_filters: self.tag_filters.clone(),
        }
    }

    /// Resolve top-level operations for the current inputs.
    pub async fn refresh_operations(&mut self) -> OperationsStatus {
        let key = self.operation_key();
        self.resolver.resolve(key).await
    }

    #[must_use]
    pub fn operations_status(&self) -> OperationsStatus {
        self.resolver.status_for(&self.operation_key())
    }

    pub fn widget(&mut self, kind: MetricKind) -> WidgetStatus {
        let operations = match self.operations_status() {
            OperationsStatus::Pending => return WidgetStatus::Pending,
            OperationsStatus::Failed(error) => return WidgetStatus::Failed(error),
            OperationsStatus::Ready(operations) => operations,
        };

        let inputs = WidgetInputs {
            service_name: self.service_name.clone(),
            tag_filters: self.tag_filters.clone(),
            operations,
        };
        let widget = self.widgets.entry(kind).or_default().get_or_compute(inputs, |i| {
            default_widget_query(&i.service_name, &i.tag_filters, &i.operations, kind)
        });
        WidgetStatus::Ready(widget.clone())
    }

    pub fn on_chart_click(&mut self, kind: WidgetKind, click: &ChartClick, data: &ChartData) {
        self.selection.click_handler(kind).handle(&mut self.selection, click, data);
    }

    /// Select a moment directly, e.g. from a timestamp in the page URL.
    pub fn select_moment(&mut self, timestamp: i64) {
        self.selection.select(timestamp);
    }

    pub fn on_drag_select(&mut self, start: f64, end: f64) -> Option<TimeWindowUpdate> {
        RangeSelectionHandler::new(&mut self.time).on_drag_select(start, end)
    }

    /// Trace-view link for the selected moment.
    ///
    /// # Errors
    ///
    /// Returns [`DeepLinkError::EmptyServiceName`] without a service and
    /// [`DeepLinkError::NothingSelected`] before any chart point was clicked.
    pub fn view_traces(&self, flavor: DrillDown, page_query: &str) -> Result<String, DeepLinkError> {
        if self.service_name.trim().is_empty() {
            return Err(DeepLinkError::EmptyServiceName);
        }
        let state = self.selection.state();
        let timestamp = state.timestamp.ok_or(DeepLinkError::NothingSelected)?;
        let request = DrillDownRequest {
            service_name: &self.service_name,
            timestamp,
            trace_tags: &state.trace_tags,
            page_query,
        };
        self.encoder.encode(flavor, &request)
    }

    #[must_use]
    pub fn operation_detail_widget(&self, flags: &impl FeatureFlags) -> OperationDetailWidget {
        operation_detail_widget(flags)
    }
}
