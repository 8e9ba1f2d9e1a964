//! Feature-flag gate for the per-operation detail widget.

#[cfg(test)]
#[path = "features_test.rs"]
mod features_test;

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKey {
    /// Per-operation figures come from span metrics instead of raw traces.
    #[serde(rename = "USE_SPAN_METRICS")]
    UseSpanMetrics,
}

impl FeatureKey {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UseSpanMetrics => "USE_SPAN_METRICS",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown feature key: {0}")]
pub struct UnknownFeature(pub String);

impl FromStr for FeatureKey {
    type Err = UnknownFeature;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "USE_SPAN_METRICS" => Ok(Self::UseSpanMetrics),
            other => Err(UnknownFeature(other.to_owned())),
        }
    }
}

/// Side-effect free capability check.
pub trait FeatureFlags {
    fn is_active(&self, key: FeatureKey) -> bool;
}

impl FeatureFlags for HashSet<FeatureKey> {
    fn is_active(&self, key: FeatureKey) -> bool {
        self.contains(&key)
    }
}

/// Which per-operation table sits next to the error widget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationDetailWidget {
    TopOperationMetrics,
    TopOperations,
}

#[must_use]
pub fn operation_detail_widget(flags: &impl FeatureFlags) -> OperationDetailWidget {
    if flags.is_active(FeatureKey::UseSpanMetrics) {
        OperationDetailWidget::TopOperationMetrics
    } else {
        OperationDetailWidget::TopOperations
    }
}
