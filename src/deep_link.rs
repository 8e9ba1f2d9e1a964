//! Trace-view links that reproduce the overview's current selection.
//!
//! DESIGN
//! ======
//! The trace view parses a fixed query grammar: JSON objects and arrays as
//! parameter values, literal keys (`selected`, `selectedTags`,
//! `spanAggregateCurrentPage`, ...). JSON values are built with `serde_json`
//! from typed structs so field order is fixed, then escaped just enough to
//! stay one query value (`&`, `#`, `%`, `+`, whitespace and non-ASCII are
//! percent-encoded, JSON punctuation is left readable).
//!
//! [`LinkMode::Legacy`] reproduces the consumer's historical URLs byte for
//! byte, including the repeated `spanAggregateCurrentPage=1` and the trailing
//! `&` after every forwarded parameter. [`LinkMode::Normalized`] drops those.

#[cfg(test)]
#[path = "deep_link_test.rs"]
mod deep_link_test;

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::config::OverviewConfig;

/// Look-ahead applied to the selected moment when building the trace window.
pub const LOOK_AHEAD_MS: i64 = 60_000;
pub const START_TIME_PARAM: &str = "startTime";
pub const END_TIME_PARAM: &str = "endTime";

const FILTER_TO_FETCH_DATA: [&str; 3] = ["duration", "status", "serviceName"];
const PAGINATION_MARKER: &str = "spanAggregateCurrentPage=1";
const JSON_SAFE: &str = "{}[]\":,._-~*'()!/@$;?";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeepLinkError {
    #[error("service name is empty")]
    EmptyServiceName,
    #[error("no moment selected on the overview")]
    NothingSelected,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LinkMode {
    #[default]
    Legacy,
    Normalized,
}

/// Which trace listing a link opens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrillDown {
    /// All traces of the service around the selected moment.
    Point,
    /// Error traces of the service in the minute after the selected moment.
    Errors,
}

/// Inputs for one link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrillDownRequest<'a> {
    pub service_name: &'a str,
    pub timestamp: i64,
    /// Serialized trace tags, see [`crate::tags::serialize_trace_tags`].
    pub trace_tags: &'a str,
    /// Current page query string, with or without the leading `?`.
    pub page_query: &'a str,
}

#[derive(Serialize)]
struct ServiceFilter<'a> {
    #[serde(rename = "serviceName")]
    service_name: [&'a str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<[&'static str; 1]>,
}

#[derive(Serialize)]
struct StatusFirstFilter<'a> {
    status: [&'static str; 2],
    #[serde(rename = "serviceName")]
    service_name: [&'a str; 1],
}

#[derive(Serialize)]
struct ExcludeFlags {
    #[serde(rename = "serviceName")]
    service_name: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeepLinkEncoder {
    trace_route: String,
    forwarded_params: Vec<String>,
    mode: LinkMode,
}

impl DeepLinkEncoder {
    #[must_use]
    pub fn new(trace_route: impl Into<String>, forwarded_params: Vec<String>, mode: LinkMode) -> Self {
        Self { trace_route: trace_route.into(), forwarded_params, mode }
    }

    #[must_use]
    pub fn from_config(config: &OverviewConfig) -> Self {
        Self::new(config.trace_route.clone(), config.trace_params.clone(), config.link_mode)
    }

    /// # Errors
    ///
    /// Returns [`DeepLinkError::EmptyServiceName`] for a blank service name.
    pub fn point_drill_down(&self, request: &DrillDownRequest<'_>) -> Result<String, DeepLinkError> {
        self.encode(DrillDown::Point, request)
    }

    /// # Errors
    ///
    /// Returns [`DeepLinkError::EmptyServiceName`] for a blank service name.
    pub fn error_drill_down(&self, request: &DrillDownRequest<'_>) -> Result<String, DeepLinkError> {
        self.encode(DrillDown::Errors, request)
    }

    /// Build the trace-view URL for `flavor`.
    ///
    /// # Errors
    ///
    /// Returns [`DeepLinkError::EmptyServiceName`] for a blank service name;
    /// no partial URL is produced.
    pub fn encode(&self, flavor: DrillDown, request: &DrillDownRequest<'_>) -> Result<String, DeepLinkError> {
        let service = request.service_name;
        if service.trim().is_empty() {
            return Err(DeepLinkError::EmptyServiceName);
        }

        let (selected, exclude, user_selected) = match flavor {
            DrillDown::Point => (
                to_json(&ServiceFilter { service_name: [service], status: None }),
                to_json(&ExcludeFlags { service_name: false, status: None }),
                to_json(&StatusFirstFilter { status: ["error", "ok"], service_name: [service] }),
            ),
            DrillDown::Errors => {
                let filter = to_json(&ServiceFilter { service_name: [service], status: Some(["error"]) });
                (filter.clone(), to_json(&ExcludeFlags { service_name: false, status: Some(false) }), filter)
            }
        };

        let mut segments = vec![
            format!("selected={}", escape_json_value(&selected)),
            format!("filterToFetchData={}", escape_json_value(&to_json(&FILTER_TO_FETCH_DATA))),
            PAGINATION_MARKER.to_owned(),
            format!("selectedTags={}", escape_json_value(request.trace_tags)),
        ];
        if self.mode == LinkMode::Legacy && flavor == DrillDown::Point {
            segments.push(String::new());
        }
        segments.push(format!("isFilterExclude={}", escape_json_value(&exclude)));
        segments.push(format!("userSelectedFilter={}", escape_json_value(&user_selected)));

        let forwarded = self.forwarded(request);
        let url = match self.mode {
            LinkMode::Legacy => {
                segments.push(PAGINATION_MARKER.to_owned());
                let tail = forwarded.iter().map(|p| format!("{p}&")).collect::<String>();
                format!("{}?{}&{tail}", self.trace_route, segments.join("&"))
            }
            LinkMode::Normalized => {
                segments.extend(forwarded);
                format!("{}?{}", self.trace_route, segments.join("&"))
            }
        };
        Ok(url)
    }

    /// Allow-listed page parameters present on the page, with the trace
    /// window set from the selected moment. Empty values are kept in legacy
    /// mode (`name=`) and skipped in normalized mode.
    fn forwarded(&self, request: &DrillDownRequest<'_>) -> Vec<String> {
        let query = request.page_query.trim_start_matches('?');
        let pairs = form_urlencoded::parse(query.as_bytes()).into_owned().collect::<Vec<_>>();
        let start = request.timestamp.to_string();
        let end = request.timestamp.saturating_add(LOOK_AHEAD_MS).to_string();

        self.forwarded_params
            .iter()
            .filter_map(|name| {
                let value = match name.as_str() {
                    START_TIME_PARAM => start.clone(),
                    END_TIME_PARAM => end.clone(),
                    _ => pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())?,
                };
                if value.is_empty() && self.mode == LinkMode::Normalized {
                    return None;
                }
                Some(format!("{}={}", encode_component(name), encode_component(&value)))
            })
            .collect()
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    // Only string arrays and flag structs reach here; they always serialize.
    serde_json::to_string(value).unwrap_or_default()
}

fn encode_component(raw: &str) -> String {
    form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

/// Percent-encode characters that would end or corrupt a query value while
/// keeping JSON punctuation literal.
#[must_use]
pub fn escape_json_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut buf = [0u8; 4];
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() || JSON_SAFE.contains(ch) {
            out.push(ch);
        } else {
            out.extend(form_urlencoded::byte_serialize(ch.encode_utf8(&mut buf).as_bytes()));
        }
    }
    out
}
