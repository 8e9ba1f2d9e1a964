use super::*;
use crate::deep_link::LinkMode;
use crate::features::FeatureKey;
use crate::operations::TopLevelOperationSet;
use crate::selection::ActiveElement;
use crate::tags::TagOperator;
use crate::time_window::InMemoryTimeStore;
use std::collections::HashSet;
use std::sync::Mutex;

// =========================================================================
// MockSource
// =========================================================================

struct MockSource {
    responses: Mutex<Vec<Result<TopLevelOperationSet, ResolveError>>>,
}

impl MockSource {
    fn new(responses: Vec<Result<TopLevelOperationSet, ResolveError>>) -> Self {
        Self { responses: Mutex::new(responses) }
    }
}

#[async_trait::async_trait]
impl TopLevelOperationsSource for MockSource {
    async fn fetch(&self, _key: &OperationSetKey) -> Result<TopLevelOperationSet, ResolveError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() { Ok(TopLevelOperationSet::default()) } else { responses.remove(0) }
    }
}

fn ops_for(service: &str, ops: &[&str]) -> TopLevelOperationSet {
    let mut entries = HashMap::new();
    entries.insert(service.to_owned(), ops.iter().map(|o| (*o).to_owned()).collect());
    TopLevelOperationSet::new(entries)
}

fn overview(responses: Vec<Result<TopLevelOperationSet, ResolveError>>) -> ServiceOverview<MockSource, InMemoryTimeStore> {
    ServiceOverview::new(
        "checkout",
        MockSource::new(responses),
        InMemoryTimeStore::new(TimeWindow::new(1_699_999_000_000, 1_700_000_900_000)),
        DeepLinkEncoder::new("/trace", vec!["startTime".to_owned(), "endTime".to_owned()], LinkMode::Legacy),
    )
}

fn attribute(key: &str, operator: &str, value: &str) -> ResourceAttributeQuery {
    ResourceAttributeQuery {
        id: key.to_owned(),
        tag_key: key.to_owned(),
        operator: operator.to_owned(),
        tag_value: vec![value.to_owned()],
    }
}

fn click(index: usize) -> (ChartClick, ChartData) {
    (
        ChartClick { active: vec![ActiveElement { dataset_index: 0, index }], position: Some((10.0, 20.0)) },
        ChartData { labels: vec![1_700_000_000_000, 1_700_000_060_000] },
    )
}

fn failure() -> ResolveError {
    ResolveError::Request("connection refused".to_owned())
}

// =========================================================================
// Widgets
// =========================================================================

#[test]
fn widgets_are_pending_before_resolution() {
    let mut overview = overview(Vec::new());
    assert_eq!(overview.widget(MetricKind::Rate), WidgetStatus::Pending);
    assert_eq!(overview.widget(MetricKind::ErrorRate), WidgetStatus::Pending);
}

#[tokio::test]
async fn widgets_use_resolved_operations() {
    let mut overview = overview(vec![Ok(ops_for("checkout", &["GET /cart"]))]);
    overview.refresh_operations().await;

    let WidgetStatus::Ready(widget) = overview.widget(MetricKind::Rate) else {
        panic!("rate widget should be ready");
    };
    let items = &widget.builder.query_data[0].filters.items;
    assert_eq!(items[1].key.key, crate::query::OPERATION_KEY);
}

#[tokio::test]
async fn widget_is_memoized_until_inputs_change() {
    let mut overview = overview(vec![Ok(ops_for("checkout", &["a"])), Ok(ops_for("checkout", &["a"]))]);
    overview.refresh_operations().await;

    let WidgetStatus::Ready(first) = overview.widget(MetricKind::Rate) else { panic!("ready") };
    let WidgetStatus::Ready(again) = overview.widget(MetricKind::Rate) else { panic!("ready") };
    assert_eq!(first.id, again.id);

    overview.set_resource_attributes(vec![attribute("resource_env", "IN", "prod")]);
    assert_eq!(overview.widget(MetricKind::Rate), WidgetStatus::Pending);

    overview.refresh_operations().await;
    let WidgetStatus::Ready(rebuilt) = overview.widget(MetricKind::Rate) else { panic!("ready") };
    assert_ne!(first.id, rebuilt.id);
    assert_eq!(rebuilt.builder.query_data[0].filters.items.last().unwrap().key.key, "env");
}

#[tokio::test]
async fn failure_is_reported_per_widget_and_spares_siblings() {
    let mut overview = overview(vec![Err(failure())]);
    overview.refresh_operations().await;

    assert_eq!(overview.widget(MetricKind::Rate), WidgetStatus::Failed(failure()));
    assert_eq!(overview.widget(MetricKind::ErrorRate), WidgetStatus::Failed(failure()));

    let flags = HashSet::from([FeatureKey::UseSpanMetrics]);
    assert_eq!(overview.operation_detail_widget(&flags), OperationDetailWidget::TopOperationMetrics);

    let (event, data) = click(0);
    overview.on_chart_click(WidgetKind::Rate, &event, &data);
    assert!(overview.view_traces(DrillDown::Errors, "").is_ok());
}

// =========================================================================
// Tags
// =========================================================================

#[test]
fn resource_attributes_feed_filters_and_trace_tags() {
    let mut overview = overview(Vec::new());
    overview.set_resource_attributes(vec![
        attribute("resource_env", "IN", "prod"),
        attribute("resource_region", "Not IN", "eu"),
    ]);

    assert_eq!(overview.tag_filters().len(), 1);
    assert_eq!(overview.tag_filters()[0].op, TagOperator::In);
    assert!(overview.selection().trace_tags().contains("\"NotIn\""));
    assert_eq!(overview.resource_attributes().len(), 2);
}

// =========================================================================
// Selection and time window
// =========================================================================

#[test]
fn drag_updates_window_and_invalidates_widgets() {
    let mut overview = overview(Vec::new());
    assert!(overview.on_drag_select(1_000.4, 1_000.6).is_none());

    let update = overview.on_drag_select(5_000.9, 2_000.1).unwrap();
    assert_eq!(update.bounds, [2_000, 5_000]);
    assert_eq!(overview.time_window(), TimeWindow::new(2_000, 5_000));
    assert_eq!(overview.time_store().history().len(), 1);
    assert_eq!(overview.operation_key().window, TimeWindow::new(2_000, 5_000));
}

#[test]
fn service_change_resets_selection() {
    let mut overview = overview(Vec::new());
    let (event, data) = click(1);
    overview.on_chart_click(WidgetKind::Error, &event, &data);
    assert_eq!(overview.selection().timestamp(), Some(1_700_000_060_000));

    overview.set_service("checkout");
    assert_eq!(overview.selection().timestamp(), Some(1_700_000_060_000));

    overview.set_service("cart");
    assert_eq!(overview.service_name(), "cart");
    assert_eq!(overview.selection().timestamp(), None);
}

// =========================================================================
// Links
// =========================================================================

#[test]
fn view_traces_requires_selection() {
    let overview = overview(Vec::new());
    assert_eq!(overview.view_traces(DrillDown::Point, ""), Err(DeepLinkError::NothingSelected));
}

#[test]
fn view_traces_rejects_empty_service_first() {
    let mut overview = overview(Vec::new());
    overview.set_service("");
    assert_eq!(overview.view_traces(DrillDown::Errors, ""), Err(DeepLinkError::EmptyServiceName));
}

#[test]
fn view_traces_encodes_selected_moment_and_tags() {
    let mut overview = overview(Vec::new());
    overview.set_resource_attributes(vec![attribute("resource_env", "IN", "prod")]);
    let (event, data) = click(0);
    overview.on_chart_click(WidgetKind::Error, &event, &data);

    let url = overview.view_traces(DrillDown::Errors, "").unwrap();
    assert!(url.starts_with(r#"/trace?selected={"serviceName":["checkout"],"status":["error"]}"#));
    assert!(url.contains(r#"selectedTags=[{"Key":"env","Operator":"In","StringValues":["prod"]"#));
    assert!(url.ends_with("&startTime=1700000000000&endTime=1700000060000&"));
}
