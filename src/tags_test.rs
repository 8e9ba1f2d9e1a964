use super::*;

fn item(key: &str, op: TagOperator, values: &[&str]) -> TagFilterItem {
    TagFilterItem {
        key: AttributeKey::resource(key),
        op,
        value: TagValue::List(values.iter().map(|v| (*v).to_owned()).collect()),
    }
}

fn raw(key: &str, operator: &str, values: &[&str]) -> ResourceAttributeQuery {
    ResourceAttributeQuery {
        id: key.to_owned(),
        tag_key: key.to_owned(),
        operator: operator.to_owned(),
        tag_value: values.iter().map(|v| (*v).to_owned()).collect(),
    }
}

// =============================================================
// normalize_tag_filters
// =============================================================

#[test]
fn normalize_drops_not_in_and_keeps_order() {
    let items = vec![
        item("a", TagOperator::In, &["1"]),
        item("b", TagOperator::NotIn, &["2"]),
        item("c", TagOperator::Eq, &["3"]),
        item("d", TagOperator::NotIn, &["4"]),
        item("e", TagOperator::Neq, &["5"]),
    ];
    let keys = normalize_tag_filters(items)
        .into_iter()
        .map(|i| i.key.key)
        .collect::<Vec<_>>();
    assert_eq!(keys, vec!["a", "c", "e"]);
}

#[test]
fn normalize_passes_unknown_operators_through() {
    let odd = item("x", TagOperator::parse("~="), &["v"]);
    let out = normalize_tag_filters(vec![odd.clone()]);
    assert_eq!(out, vec![odd]);
}

#[test]
fn normalize_empty_input() {
    assert!(normalize_tag_filters(Vec::new()).is_empty());
}

#[test]
fn normalize_never_emits_not_in_for_mixed_sequences() {
    let ops = [TagOperator::In, TagOperator::NotIn, TagOperator::Like, TagOperator::NotLike];
    for len in 0..8 {
        let items = (0..len)
            .map(|i| item(&format!("k{i}"), ops[i % ops.len()].clone(), &["v"]))
            .collect::<Vec<_>>();
        let expected = items
            .iter()
            .filter(|i| i.op != TagOperator::NotIn)
            .cloned()
            .collect::<Vec<_>>();
        let out = normalize_tag_filters(items);
        assert!(out.iter().all(|i| i.op != TagOperator::NotIn));
        assert_eq!(out, expected);
    }
}

// =============================================================
// TagOperator
// =============================================================

#[test]
fn operator_parses_labels_and_tokens() {
    assert_eq!(TagOperator::parse("IN"), TagOperator::In);
    assert_eq!(TagOperator::parse("Not IN"), TagOperator::NotIn);
    assert_eq!(TagOperator::parse("nin"), TagOperator::NotIn);
    assert_eq!(TagOperator::parse("="), TagOperator::Eq);
    assert_eq!(TagOperator::parse("weird"), TagOperator::Other("weird".to_owned()));
}

#[test]
fn operator_ignores_case_spaces_and_underscores() {
    for token in ["NOT_IN", "NOT IN", "not_in", "Not In", "notIn", " nin ", "NIN"] {
        assert_eq!(TagOperator::parse(token), TagOperator::NotIn, "{token}");
    }
    assert_eq!(TagOperator::parse("NOT_LIKE"), TagOperator::NotLike);
    assert_eq!(TagOperator::parse("  weird "), TagOperator::Other("weird".to_owned()));
}

#[test]
fn every_negated_spelling_is_dropped() {
    for token in ["NOT_IN", "NOT IN", "not_in", "Not In", "notIn"] {
        let filters = derive_tag_filters(&[raw("resource_region", token, &["eu"])]);
        assert!(filters.is_empty(), "{token} reached the query builder");
    }

    let deserialized: TagFilterItem = serde_json::from_str(
        r#"{"key":{"key":"region","dataType":"string","isColumn":true,"type":"resource"},"op":"NOT_IN","value":["eu"]}"#,
    )
    .unwrap();
    assert_eq!(deserialized.op, TagOperator::NotIn);
    assert!(normalize_tag_filters(vec![deserialized]).is_empty());
}

#[test]
fn operator_serializes_as_builder_token() {
    let json = serde_json::to_string(&TagOperator::NotIn).unwrap();
    assert_eq!(json, r#""nin""#);
    let back: TagOperator = serde_json::from_str(r#""in""#).unwrap();
    assert_eq!(back, TagOperator::In);
}

#[test]
fn trace_operator_spelling() {
    assert_eq!(TagOperator::In.trace_operator(), "In");
    assert_eq!(TagOperator::NotIn.trace_operator(), "NotIn");
    assert_eq!(TagOperator::Eq.trace_operator(), "=");
}

// =============================================================
// resource attribute conversion
// =============================================================

#[test]
fn metric_key_to_trace_drops_first_segment() {
    assert_eq!(metric_key_to_trace("resource_deployment_environment"), "deployment.environment");
    assert_eq!(metric_key_to_trace("resource_host"), "host");
    assert_eq!(metric_key_to_trace("plain"), "");
}

#[test]
fn resource_attributes_convert_to_resource_filters() {
    let filters = resource_attributes_to_tag_filters(&[raw("resource_k8s_namespace", "IN", &["prod", "stage"])]);
    assert_eq!(filters.len(), 1);
    assert_eq!(filters[0].key.key, "k8s.namespace");
    assert_eq!(filters[0].key.attr_type, Some(AttributeType::Resource));
    assert_eq!(filters[0].op, TagOperator::In);
    assert_eq!(filters[0].value, TagValue::List(vec!["prod".to_owned(), "stage".to_owned()]));
}

#[test]
fn derive_tag_filters_excludes_not_in_queries() {
    let filters = derive_tag_filters(&[
        raw("resource_env", "IN", &["prod"]),
        raw("resource_region", "Not IN", &["eu"]),
    ]);
    assert_eq!(filters.len(), 1);
    assert_eq!(filters[0].key.key, "env");
}

#[test]
fn parse_resource_attribute_in_and_not_in() {
    let q: ResourceAttributeQuery = "resource_env=prod, stage".parse().unwrap();
    assert_eq!(q.tag_key, "resource_env");
    assert_eq!(q.operator, "IN");
    assert_eq!(q.tag_value, vec!["prod", "stage"]);

    let q: ResourceAttributeQuery = "resource_env!=dev".parse().unwrap();
    assert_eq!(q.operator, "Not IN");
    assert_eq!(q.tag_value, vec!["dev"]);
}

#[test]
fn parse_resource_attribute_rejects_malformed() {
    assert_eq!(
        "resource_env".parse::<ResourceAttributeQuery>(),
        Err(TagParseError::MissingOperator("resource_env".to_owned()))
    );
    assert_eq!("=x".parse::<ResourceAttributeQuery>(), Err(TagParseError::EmptyKey("=x".to_owned())));
}

// =============================================================
// trace selected tags
// =============================================================

#[test]
fn serialize_trace_tags_empty_is_empty_array() {
    assert_eq!(serialize_trace_tags(&[]), "[]");
}

#[test]
fn serialize_trace_tags_keeps_negated_sets() {
    let json = serialize_trace_tags(&[raw("resource_env", "Not IN", &["dev"])]);
    assert_eq!(
        json,
        r#"[{"Key":"env","Operator":"NotIn","StringValues":["dev"],"NumberValues":[],"BoolValues":[],"TagType":"ResourceAttribute"}]"#
    );
}
