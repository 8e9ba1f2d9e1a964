//! Selection-and-correlation core for a service overview page.
//!
//! The overview shows throughput and error-rate charts for one service. This
//! crate turns chart interactions into a shared selected moment, global time
//! window updates and trace-view links, and builds the widget queries those
//! charts render. It is UI-framework agnostic; rendering, the time store and
//! the feature-flag service plug in through traits.

pub mod config;
pub mod deep_link;
pub mod features;
pub mod memo;
pub mod operations;
pub mod overview;
pub mod query;
pub mod range;
pub mod selection;
pub mod tags;
pub mod time_window;

pub use config::OverviewConfig;
pub use deep_link::{DeepLinkEncoder, DeepLinkError, DrillDown, DrillDownRequest, LinkMode};
pub use operations::{HttpTopLevelOperations, OperationSetResolver, OperationsStatus, TopLevelOperationsSource};
pub use overview::{ServiceOverview, WidgetStatus};
pub use query::{MetricKind, WidgetQuery, build_widget_query};
pub use selection::{SelectionCoordinator, WidgetKind};
pub use tags::{TagFilterItem, normalize_tag_filters};
pub use time_window::{TimeWindow, TimeWindowStore, TimeWindowUpdate};
