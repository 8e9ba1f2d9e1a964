//! Tag filters derived from the page's resource-attribute query.
//!
//! DESIGN
//! ======
//! Raw resource attributes arrive in metric form (`resource_deployment_environment`
//! with an `IN` / `Not IN` label). Two views are derived from them:
//!
//! - builder tag filters, normalized so the query language never sees a
//!   negated set (`NotIn` is dropped, everything else passes through in order);
//! - trace selected tags, serialized as JSON for the trace view's
//!   `selectedTags` parameter. These keep every operator.

#[cfg(test)]
#[path = "tags_test.rs"]
mod tags_test;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Value type of an attribute as understood by the query builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Float64,
}

/// Where an attribute lives on the span.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    Resource,
    Tag,
}

/// Fully qualified attribute reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeKey {
    pub key: String,
    pub data_type: DataType,
    pub is_column: bool,
    #[serde(rename = "type")]
    pub attr_type: Option<AttributeType>,
}

impl AttributeKey {
    /// String attribute on the resource (service name, environment, ...).
    #[must_use]
    pub fn resource(key: &str) -> Self {
        Self { key: key.to_owned(), data_type: DataType::String, is_column: false, attr_type: Some(AttributeType::Resource) }
    }

    /// String attribute on the span itself.
    #[must_use]
    pub fn tag(key: &str) -> Self {
        Self { key: key.to_owned(), data_type: DataType::String, is_column: false, attr_type: Some(AttributeType::Tag) }
    }

    /// Numeric metric column.
    #[must_use]
    pub fn metric(key: &str) -> Self {
        Self { key: key.to_owned(), data_type: DataType::Float64, is_column: true, attr_type: None }
    }
}

/// Filter operator. Unknown tokens are kept verbatim in [`TagOperator::Other`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TagOperator {
    Eq,
    Neq,
    In,
    NotIn,
    Like,
    NotLike,
    Other(String),
}

impl TagOperator {
    /// Parse an operator token, accepting both UI labels (`IN`, `Not IN`,
    /// `NOT_IN`) and query-builder tokens (`in`, `nin`). Case, spaces and
    /// underscores are ignored.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        let canonical = token
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match canonical.as_str() {
            "=" | "eq" => Self::Eq,
            "!=" | "neq" => Self::Neq,
            "in" => Self::In,
            "nin" | "notin" => Self::NotIn,
            "like" => Self::Like,
            "nlike" | "notlike" => Self::NotLike,
            _ => Self::Other(token.to_owned()),
        }
    }

    /// Query-builder token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::In => "in",
            Self::NotIn => "nin",
            Self::Like => "like",
            Self::NotLike => "nlike",
            Self::Other(token) => token,
        }
    }

    /// Operator spelling used by the trace view's `selectedTags`.
    #[must_use]
    pub fn trace_operator(&self) -> &str {
        match self {
            Self::In => "In",
            Self::NotIn => "NotIn",
            other => other.as_str(),
        }
    }
}

impl From<String> for TagOperator {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<TagOperator> for String {
    fn from(value: TagOperator) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for TagOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a filter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Single(String),
    List(Vec<String>),
}

/// One `key op value` predicate.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagFilterItem {
    pub key: AttributeKey,
    pub op: TagOperator,
    pub value: TagValue,
}

/// Drop predicates the downstream query language cannot express (negated
/// sets). All other entries are returned unchanged and in order.
#[must_use]
pub fn normalize_tag_filters(items: Vec<TagFilterItem>) -> Vec<TagFilterItem> {
    items.into_iter().filter(|item| item.op != TagOperator::NotIn).collect()
}

/// Resource-attribute filter as entered on the page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAttributeQuery {
    pub id: String,
    /// Metric-form key, e.g. `resource_deployment_environment`.
    pub tag_key: String,
    /// UI operator label, `IN` or `Not IN`.
    pub operator: String,
    pub tag_value: Vec<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TagParseError {
    #[error("resource attribute `{0}` has no operator (expected key=values or key!=values)")]
    MissingOperator(String),
    #[error("resource attribute `{0}` has an empty key")]
    EmptyKey(String),
}

impl FromStr for ResourceAttributeQuery {
    type Err = TagParseError;

    /// Parses `key=v1,v2` (IN) and `key!=v1,v2` (Not IN).
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (key, operator, values) = if let Some((key, values)) = raw.split_once("!=") {
            (key, "Not IN", values)
        } else if let Some((key, values)) = raw.split_once('=') {
            (key, "IN", values)
        } else {
            return Err(TagParseError::MissingOperator(raw.to_owned()));
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(TagParseError::EmptyKey(raw.to_owned()));
        }

        Ok(Self {
            id: String::new(),
            tag_key: key.to_owned(),
            operator: operator.to_owned(),
            tag_value: values
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
                .collect(),
        })
    }
}

/// Convert a metric-form key into its trace form by dropping the first `_`
/// segment and joining the rest with `.`. Keys without `_` convert to `""`.
#[must_use]
pub fn metric_key_to_trace(key: &str) -> String {
    let mut parts = key.split('_');
    parts.next();
    parts.collect::<Vec<_>>().join(".")
}

/// Builder tag filters for a resource-attribute query, before normalization.
#[must_use]
pub fn resource_attributes_to_tag_filters(queries: &[ResourceAttributeQuery]) -> Vec<TagFilterItem> {
    queries
        .iter()
        .map(|query| TagFilterItem {
            key: AttributeKey::resource(&metric_key_to_trace(&query.tag_key)),
            op: TagOperator::parse(&query.operator),
            value: TagValue::List(query.tag_value.clone()),
        })
        .collect()
}

/// Normalized builder tag filters for a resource-attribute query.
#[must_use]
pub fn derive_tag_filters(queries: &[ResourceAttributeQuery]) -> Vec<TagFilterItem> {
    normalize_tag_filters(resource_attributes_to_tag_filters(queries))
}

/// Entry of the trace view's `selectedTags` array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TraceSelectedTag {
    pub key: String,
    pub operator: String,
    pub string_values: Vec<String>,
    pub number_values: Vec<f64>,
    pub bool_values: Vec<bool>,
    pub tag_type: String,
}

#[must_use]
pub fn trace_selected_tags(queries: &[ResourceAttributeQuery]) -> Vec<TraceSelectedTag> {
    queries
        .iter()
        .map(|query| TraceSelectedTag {
            key: metric_key_to_trace(&query.tag_key),
            operator: TagOperator::parse(&query.operator).trace_operator().to_owned(),
            string_values: query.tag_value.clone(),
            number_values: Vec::new(),
            bool_values: Vec::new(),
            tag_type: "ResourceAttribute".to_owned(),
        })
        .collect()
}

/// Serialized `selectedTags` value; `[]` when there are no attributes.
#[must_use]
pub fn serialize_trace_tags(queries: &[ResourceAttributeQuery]) -> String {
    // Plain structs of strings and finite numbers always serialize.
    serde_json::to_string(&trace_selected_tags(queries)).unwrap_or_else(|_| "[]".to_owned())
}
