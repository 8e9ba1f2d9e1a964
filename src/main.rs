use clap::Parser;
use serde_json::{Map, Value, json};
use service_overview::config::ConfigError;
use service_overview::operations::ResolveError;
use service_overview::tags::{ResourceAttributeQuery, TagParseError};
use service_overview::time_window::InMemoryTimeStore;
use service_overview::{
    DeepLinkEncoder, DeepLinkError, DrillDown, HttpTopLevelOperations, MetricKind, OperationsStatus, OverviewConfig,
    ServiceOverview, TimeWindow, WidgetStatus,
};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid --tag: {0}")]
    Tag(#[from] TagParseError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("trace link failed: {0}")]
    Link(#[from] DeepLinkError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "service-overview", about = "Service overview widget queries and trace links")]
struct Cli {
    /// Service whose overview is built.
    #[arg(long, env = "OVERVIEW_SERVICE")]
    service: String,

    /// Window start, epoch milliseconds.
    #[arg(long)]
    start: i64,

    /// Window end, epoch milliseconds.
    #[arg(long)]
    end: i64,

    /// Resource attribute filter, `key=v1,v2` or `key!=v1,v2`. Repeatable.
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Selected moment for trace links, epoch milliseconds.
    #[arg(long)]
    at: Option<i64>,

    /// Current page query string whose allow-listed parameters are forwarded.
    #[arg(long, default_value = "")]
    query: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(error) = run(Cli::parse()).await {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = OverviewConfig::from_env()?;
    let attributes = parse_attributes(&cli.tags)?;

    let source = HttpTopLevelOperations::new(&config)?;
    let store = InMemoryTimeStore::new(TimeWindow::new(cli.start, cli.end));
    let mut overview = ServiceOverview::new(cli.service, source, store, DeepLinkEncoder::from_config(&config));
    overview.set_resource_attributes(attributes);

    if let OperationsStatus::Failed(error) = overview.refresh_operations().await {
        warn!(%error, "rendering widgets without top-level operations");
    }

    let mut widgets = Map::new();
    for kind in [MetricKind::Rate, MetricKind::ErrorRate] {
        let value = match overview.widget(kind) {
            WidgetStatus::Ready(widget) => serde_json::to_value(widget)?,
            WidgetStatus::Failed(error) => json!({ "error": error.to_string() }),
            WidgetStatus::Pending => Value::Null,
        };
        widgets.insert(kind.widget_name().to_owned(), value);
    }

    let mut links = Map::new();
    if let Some(at) = cli.at {
        overview.select_moment(at);
        links.insert("point".to_owned(), Value::String(overview.view_traces(DrillDown::Point, &cli.query)?));
        links.insert("errors".to_owned(), Value::String(overview.view_traces(DrillDown::Errors, &cli.query)?));
    }

    let output = json!({
        "service": overview.service_name(),
        "widgets": widgets,
        "operationDetail": overview.operation_detail_widget(&config.features),
        "links": links,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn parse_attributes(raw: &[String]) -> Result<Vec<ResourceAttributeQuery>, TagParseError> {
    raw.iter()
        .enumerate()
        .map(|(i, tag)| {
            let mut query = tag.parse::<ResourceAttributeQuery>()?;
            query.id = i.to_string();
            Ok(query)
        })
        .collect()
}
