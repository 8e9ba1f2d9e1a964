//! Overview configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::collections::HashSet;

use crate::deep_link::LinkMode;
use crate::features::{FeatureKey, UnknownFeature};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3301/api/v1";
pub const DEFAULT_TRACE_ROUTE: &str = "/trace";
pub const DEFAULT_TRACE_PARAMS: &[&str] = &["resourceAttribute", "startTime", "endTime"];
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unsupported OVERVIEW_LINK_MODE '{0}' (expected 'legacy' or 'normalized')")]
    LinkMode(String),
    #[error("invalid OVERVIEW_FEATURES: {0}")]
    Feature(#[from] UnknownFeature),
    #[error("OVERVIEW_TRACE_ROUTE must start with '/': {0}")]
    TraceRoute(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverviewConfig {
    pub api_base_url: String,
    pub trace_route: String,
    /// Page query parameters forwarded into trace links.
    pub trace_params: Vec<String>,
    pub link_mode: LinkMode,
    pub features: HashSet<FeatureKey>,
    pub timeouts: HttpTimeouts,
}

impl Default for OverviewConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            trace_route: DEFAULT_TRACE_ROUTE.to_owned(),
            trace_params: DEFAULT_TRACE_PARAMS.iter().map(|p| (*p).to_owned()).collect(),
            link_mode: LinkMode::Legacy,
            features: HashSet::new(),
            timeouts: HttpTimeouts {
                request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
                connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            },
        }
    }
}

impl OverviewConfig {
    /// Build typed config from environment variables. All are optional:
    ///
    /// - `OVERVIEW_API_BASE_URL`: query service base URL
    /// - `OVERVIEW_TRACE_ROUTE`: path of the trace view, default `/trace`
    /// - `OVERVIEW_TRACE_PARAMS`: comma list of forwarded page parameters
    /// - `OVERVIEW_LINK_MODE`: `legacy` (default) or `normalized`
    /// - `OVERVIEW_FEATURES`: comma list of active feature keys
    /// - `OVERVIEW_REQUEST_TIMEOUT_SECS`: default 30
    /// - `OVERVIEW_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an unknown link mode or feature key, or a
    /// trace route that is not an absolute path.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = std::env::var("OVERVIEW_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();

        let trace_route = std::env::var("OVERVIEW_TRACE_ROUTE").unwrap_or_else(|_| DEFAULT_TRACE_ROUTE.to_owned());
        if !trace_route.starts_with('/') {
            return Err(ConfigError::TraceRoute(trace_route));
        }

        let trace_params = match std::env::var("OVERVIEW_TRACE_PARAMS") {
            Ok(raw) => split_list(&raw).map(str::to_owned).collect(),
            Err(_) => DEFAULT_TRACE_PARAMS.iter().map(|p| (*p).to_owned()).collect(),
        };

        let link_mode = parse_link_mode(std::env::var("OVERVIEW_LINK_MODE").ok().as_deref())?;

        let features = split_list(&std::env::var("OVERVIEW_FEATURES").unwrap_or_default())
            .map(str::parse::<FeatureKey>)
            .collect::<Result<HashSet<_>, _>>()?;

        let timeouts = HttpTimeouts {
            request_secs: env_parse_u64("OVERVIEW_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("OVERVIEW_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self { api_base_url, trace_route, trace_params, link_mode, features, timeouts })
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_link_mode(raw: Option<&str>) -> Result<LinkMode, ConfigError> {
    match raw.unwrap_or("legacy") {
        "legacy" => Ok(LinkMode::Legacy),
        "normalized" => Ok(LinkMode::Normalized),
        other => Err(ConfigError::LinkMode(other.to_owned())),
    }
}
