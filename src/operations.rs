//! Top-level operation lookup for a service.
//!
//! DESIGN
//! ======
//! A lookup is keyed by `(service, window, tag filters)`. The resolver keeps
//! one entry per key and a pointer to the key the page currently shows.
//! Results for any other key are stored but never reported by
//! [`OperationSetResolver::status`], so a slow response for an old key cannot
//! overwrite what the page renders. A failure only ever touches its own key.
//!
//! The cache is bounded: moving to another key forgets the previous key if it
//! never resolved, late failures for keys the page no longer shows are
//! dropped, and at most [`MAX_CACHED_SETS`] resolved sets are kept, evicting
//! the least recently shown one that is not current.
//!
//! `fetch` is behind the async [`TopLevelOperationsSource`] trait so tests can
//! substitute a scripted source; [`HttpTopLevelOperations`] is the real one.

#[cfg(test)]
#[path = "operations_test.rs"]
mod operations_test;

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::OverviewConfig;
use crate::tags::TagFilterItem;
use crate::time_window::TimeWindow;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
    #[error("top-level operations request failed: {0}")]
    Request(String),
    #[error("top-level operations request returned status {status}")]
    Status { status: u16, body: String },
    #[error("top-level operations response parse failed: {0}")]
    Parse(String),
}

/// Inputs that identify one lookup.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OperationSetKey {
    pub service_name: String,
    pub window: TimeWindow,
    pub tag_filters: Vec<TagFilterItem>,
}

/// Operation names per service, in the order the backend reported them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopLevelOperationSet(HashMap<String, Vec<String>>);

impl TopLevelOperationSet {
    #[must_use]
    pub fn new(entries: HashMap<String, Vec<String>>) -> Self {
        Self(entries)
    }

    /// Operations for `service`; empty when the service is absent.
    #[must_use]
    pub fn operations_for(&self, service: &str) -> &[String] {
        self.0.get(service).map(Vec::as_slice).unwrap_or_default()
    }

    #[must_use]
    pub fn contains_service(&self, service: &str) -> bool {
        self.0.contains_key(service)
    }
}

/// What a dependent widget should render for the current key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationsStatus {
    Pending,
    Ready(Vec<String>),
    Failed(ResolveError),
}

/// Backend lookup of top-level operations.
#[async_trait::async_trait]
pub trait TopLevelOperationsSource: Send + Sync {
    /// Fetch the operation set for `key`. The mapping may contain other services.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolveError`] if the backend cannot be reached or answers
    /// with something other than an operation mapping.
    async fn fetch(&self, key: &OperationSetKey) -> Result<TopLevelOperationSet, ResolveError>;
}

// =============================================================================
// HTTP SOURCE
// =============================================================================

pub struct HttpTopLevelOperations {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpTopLevelOperations {
    /// # Errors
    ///
    /// Returns [`ResolveError::HttpClientBuild`] if the HTTP client cannot be built.
    pub fn new(config: &OverviewConfig) -> Result<Self, ResolveError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ResolveError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, endpoint: format!("{}/service/top_level_operations", config.api_base_url) })
    }
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    service: &'a str,
    start: i64,
    end: i64,
    tags: &'a [TagFilterItem],
}

#[async_trait::async_trait]
impl TopLevelOperationsSource for HttpTopLevelOperations {
    async fn fetch(&self, key: &OperationSetKey) -> Result<TopLevelOperationSet, ResolveError> {
        let body = ApiRequest {
            service: &key.service_name,
            start: key.window.start_ms(),
            end: key.window.end_ms(),
            tags: &key.tag_filters,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ResolveError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ResolveError::Request(e.to_string()))?;

        if status != 200 {
            return Err(ResolveError::Status { status, body: text });
        }

        parse_top_level_operations(&text)
    }
}

/// Parse the backend's `{ "service": ["op", ...] }` body.
///
/// # Errors
///
/// Returns [`ResolveError::Parse`] when the body is not such a mapping.
pub fn parse_top_level_operations(json: &str) -> Result<TopLevelOperationSet, ResolveError> {
    serde_json::from_str(json).map_err(|e| ResolveError::Parse(e.to_string()))
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Resolved operation sets kept for switching back without a refetch.
pub const MAX_CACHED_SETS: usize = 16;

#[derive(Clone, Debug)]
enum Entry {
    Pending,
    Ready(TopLevelOperationSet),
    Failed(ResolveError),
}

pub struct OperationSetResolver<S> {
    source: S,
    current: Option<OperationSetKey>,
    entries: HashMap<OperationSetKey, Entry>,
    /// Keys with a `Ready` entry, least recently used first.
    ready: VecDeque<OperationSetKey>,
}

impl<S: TopLevelOperationsSource> OperationSetResolver<S> {
    #[must_use]
    pub fn new(source: S) -> Self {
        Self { source, current: None, entries: HashMap::new(), ready: VecDeque::new() }
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    #[must_use]
    pub fn current_key(&self) -> Option<&OperationSetKey> {
        self.current.as_ref()
    }

    /// Make `key` the displayed key. Returns `true` when a fetch is needed,
    /// i.e. nothing successful is cached for it yet.
    pub fn request(&mut self, key: OperationSetKey) -> bool {
        if let Some(previous) = self.current.take() {
            let resolved = matches!(self.entries.get(&previous), Some(Entry::Ready(_)));
            if previous != key && !resolved {
                self.entries.remove(&previous);
            }
        }

        let needs_fetch = !matches!(self.entries.get(&key), Some(Entry::Ready(_)));
        if needs_fetch {
            self.entries.insert(key.clone(), Entry::Pending);
        } else {
            self.touch(&key);
        }
        self.current = Some(key);
        needs_fetch
    }

    /// Store the outcome of a lookup for `key`. Other keys are untouched.
    pub fn record(&mut self, key: OperationSetKey, result: Result<TopLevelOperationSet, ResolveError>) {
        let stale = self.current.as_ref() != Some(&key);
        match result {
            Ok(set) => {
                debug!(service = %key.service_name, stale, "top-level operations resolved");
                self.entries.insert(key.clone(), Entry::Ready(set));
                self.touch(&key);
                self.evict();
            }
            Err(error) if stale => {
                warn!(service = %key.service_name, %error, "dropping failed lookup for a key no longer shown");
                if matches!(self.entries.get(&key), Some(Entry::Pending)) {
                    self.entries.remove(&key);
                }
            }
            Err(error) => {
                warn!(service = %key.service_name, %error, "top-level operations lookup failed");
                self.forget_ready(&key);
                self.entries.insert(key, Entry::Failed(error));
            }
        }
    }

    /// Number of keys with any cached state.
    #[must_use]
    pub fn cached_keys(&self) -> usize {
        self.entries.len()
    }

    fn touch(&mut self, key: &OperationSetKey) {
        self.forget_ready(key);
        self.ready.push_back(key.clone());
    }

    fn forget_ready(&mut self, key: &OperationSetKey) {
        self.ready.retain(|k| k != key);
    }

    fn evict(&mut self) {
        while self.ready.len() > MAX_CACHED_SETS {
            let Some(index) = self.ready.iter().position(|k| Some(k) != self.current.as_ref()) else {
                break;
            };
            if let Some(key) = self.ready.remove(index) {
                debug!(service = %key.service_name, "evicting cached top-level operations");
                self.entries.remove(&key);
            }
        }
    }

    /// Request, fetch if needed, and record `key`; returns the status the page
    /// should render afterwards.
    pub async fn resolve(&mut self, key: OperationSetKey) -> OperationsStatus {
        if self.request(key.clone()) {
            info!(service = %key.service_name, "fetching top-level operations");
            let result = self.source.fetch(&key).await;
            self.record(key, result);
        }
        self.status()
    }

    /// Status for the current key, indexed by its own service name.
    #[must_use]
    pub fn status(&self) -> OperationsStatus {
        match &self.current {
            Some(key) => self.status_for(key),
            None => OperationsStatus::Pending,
        }
    }

    #[must_use]
    pub fn status_for(&self, key: &OperationSetKey) -> OperationsStatus {
        match self.entries.get(key) {
            None | Some(Entry::Pending) => OperationsStatus::Pending,
            Some(Entry::Ready(set)) => OperationsStatus::Ready(set.operations_for(&key.service_name).to_vec()),
            Some(Entry::Failed(error)) => OperationsStatus::Failed(error.clone()),
        }
    }
}
