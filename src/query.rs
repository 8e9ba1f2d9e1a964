//! Widget query construction for the overview's time-series panels.
//!
//! DESIGN
//! ======
//! `build_widget_query` is a pure function of its inputs apart from the widget
//! `id`, which is a fresh v4 UUID on every call so the renderer can tell two
//! structurally equal widgets apart. Compare `builder` for equality, never the
//! whole widget.

#[cfg(test)]
#[path = "query_test.rs"]
mod query_test;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tags::{AttributeKey, TagFilterItem, TagOperator, TagValue};

pub const SERVICE_NAME_KEY: &str = "service_name";
pub const OPERATION_KEY: &str = "operation";
pub const STATUS_CODE_KEY: &str = "status_code";
pub const STATUS_CODE_ERROR: &str = "STATUS_CODE_ERROR";
pub const LATENCY_COUNT_METRIC: &str = "signoz_latency_count";
pub const CALLS_TOTAL_METRIC: &str = "signoz_calls_total";
pub const ERROR_PERCENTAGE_FORMULA: &str = "A*100/B";
pub const STEP_INTERVAL_SECS: u32 = 60;

/// Which aggregate a widget plots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Requests per second.
    Rate,
    /// Percentage of calls with error status.
    ErrorRate,
}

impl MetricKind {
    #[must_use]
    pub fn default_title(self) -> &'static str {
        match self {
            Self::Rate => "Rate (ops/s)",
            Self::ErrorRate => "Error Percentage",
        }
    }

    /// Panel name used by the renderer.
    #[must_use]
    pub fn widget_name(self) -> &'static str {
        match self {
            Self::Rate => "operations_per_sec",
            Self::ErrorRate => "error_percentage_%",
        }
    }

    #[must_use]
    pub fn y_axis_unit(self) -> &'static str {
        match self {
            Self::Rate => "ops",
            Self::ErrorRate => "%",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    #[default]
    Builder,
    Raw,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PanelType {
    #[default]
    #[serde(rename = "graph")]
    TimeSeries,
    #[serde(rename = "value")]
    Value,
    #[serde(rename = "table")]
    Table,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Metrics,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateOperator {
    SumRate,
}

/// Conjunction of filter items.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    pub op: String,
    pub items: Vec<TagFilterItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderQuery {
    pub query_name: String,
    pub data_source: DataSource,
    pub aggregate_operator: AggregateOperator,
    pub aggregate_attribute: AttributeKey,
    pub filters: FilterSet,
    pub expression: String,
    pub disabled: bool,
    pub group_by: Vec<AttributeKey>,
    pub legend: String,
    pub step_interval: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderFormula {
    pub query_name: String,
    pub expression: String,
    pub disabled: bool,
    pub legend: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderSpec {
    pub query_data: Vec<BuilderQuery>,
    pub query_formulas: Vec<BuilderFormula>,
}

/// A renderable widget: query plus display metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetQuery {
    pub id: Uuid,
    pub query_type: QueryType,
    pub builder: BuilderSpec,
    pub title: String,
    pub panel_type: PanelType,
    pub name: String,
    pub y_axis_unit: String,
}

/// Build the widget for `kind` scoped to one service.
///
/// An empty `operations` slice omits the operation predicate entirely so the
/// widget covers every operation of the service.
#[must_use]
pub fn build_widget_query(
    service_name: &str,
    tag_filters: &[TagFilterItem],
    operations: &[String],
    kind: MetricKind,
    title: &str,
    panel_type: PanelType,
) -> WidgetQuery {
    WidgetQuery {
        id: Uuid::new_v4(),
        query_type: QueryType::Builder,
        builder: builder_spec(service_name, tag_filters, operations, kind),
        title: title.to_owned(),
        panel_type,
        name: kind.widget_name().to_owned(),
        y_axis_unit: kind.y_axis_unit().to_owned(),
    }
}

/// Same as [`build_widget_query`] with the kind's default title as a time series.
#[must_use]
pub fn default_widget_query(
    service_name: &str,
    tag_filters: &[TagFilterItem],
    operations: &[String],
    kind: MetricKind,
) -> WidgetQuery {
    build_widget_query(service_name, tag_filters, operations, kind, kind.default_title(), PanelType::TimeSeries)
}

/// The deterministic part of a widget.
#[must_use]
pub fn builder_spec(
    service_name: &str,
    tag_filters: &[TagFilterItem],
    operations: &[String],
    kind: MetricKind,
) -> BuilderSpec {
    let scope = scope_filters(service_name, tag_filters, operations);

    match kind {
        MetricKind::Rate => BuilderSpec {
            query_data: vec![sum_rate_query("A", LATENCY_COUNT_METRIC, scope, false, service_name)],
            query_formulas: Vec::new(),
        },
        MetricKind::ErrorRate => {
            let mut errors = scope.clone();
            // Status goes after the service/operation scope, before caller tags.
            let tags_at = errors.len() - tag_filters.len();
            errors.insert(
                tags_at,
                TagFilterItem {
                    key: AttributeKey::tag(STATUS_CODE_KEY),
                    op: TagOperator::In,
                    value: TagValue::List(vec![STATUS_CODE_ERROR.to_owned()]),
                },
            );

            BuilderSpec {
                query_data: vec![
                    sum_rate_query("A", CALLS_TOTAL_METRIC, errors, true, ""),
                    sum_rate_query("B", CALLS_TOTAL_METRIC, scope, true, ""),
                ],
                query_formulas: vec![BuilderFormula {
                    query_name: "F1".to_owned(),
                    expression: ERROR_PERCENTAGE_FORMULA.to_owned(),
                    disabled: false,
                    legend: MetricKind::ErrorRate.default_title().to_owned(),
                }],
            }
        }
    }
}

fn scope_filters(service_name: &str, tag_filters: &[TagFilterItem], operations: &[String]) -> Vec<TagFilterItem> {
    let mut items = Vec::with_capacity(tag_filters.len() + 2);
    items.push(TagFilterItem {
        key: AttributeKey::resource(SERVICE_NAME_KEY),
        op: TagOperator::Eq,
        value: TagValue::Single(service_name.to_owned()),
    });
    if !operations.is_empty() {
        items.push(TagFilterItem {
            key: AttributeKey::tag(OPERATION_KEY),
            op: TagOperator::In,
            value: TagValue::List(operations.to_vec()),
        });
    }
    items.extend_from_slice(tag_filters);
    items
}

fn sum_rate_query(name: &str, metric: &str, items: Vec<TagFilterItem>, disabled: bool, legend: &str) -> BuilderQuery {
    BuilderQuery {
        query_name: name.to_owned(),
        data_source: DataSource::Metrics,
        aggregate_operator: AggregateOperator::SumRate,
        aggregate_attribute: AttributeKey::metric(metric),
        filters: FilterSet { op: "AND".to_owned(), items },
        expression: name.to_owned(),
        disabled,
        group_by: Vec::new(),
        legend: legend.to_owned(),
        step_interval: STEP_INTERVAL_SECS,
    }
}
