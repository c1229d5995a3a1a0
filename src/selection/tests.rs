use super::*;
use crate::record::JsonRecord;
use crate::services::remote::RemoteError;
use serde_json::json;
use std::cell::RefCell;

/// Scripted remote: pops one canned response per call, records every call.
struct StubRemote {
    calls: RefCell<Vec<(String, String, Vec<JsonValue>, Option<JsonValue>)>>,
    responses: RefCell<Vec<Result<JsonValue, RemoteError>>>,
}

impl StubRemote {
    fn new(responses: Vec<Result<JsonValue, RemoteError>>) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            responses: RefCell::new(responses),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl Remote for StubRemote {
    fn call(
        &self,
        model: &str,
        method: &str,
        args: &[JsonValue],
        context: Option<&Map<String, JsonValue>>,
    ) -> Result<JsonValue, RemoteError> {
        self.calls.borrow_mut().push((
            model.to_string(),
            method.to_string(),
            args.to_vec(),
            context.map(|c| JsonValue::Object(c.clone())),
        ));
        let mut responses = self.responses.borrow_mut();
        if responses.is_empty() {
            return Err(RemoteError("no scripted response".into()));
        }
        responses.remove(0)
    }
}

fn method_attrs() -> FieldAttrs {
    FieldAttrs {
        name: "category".into(),
        model: Some("product".into()),
        selection: Some(SelectionSource::Method("category_options".into())),
        ..Default::default()
    }
}

fn relational_attrs() -> FieldAttrs {
    FieldAttrs {
        name: "party".into(),
        relation: Some("party".into()),
        domain: Some(json!([["company", "=", "${company}"]])),
        context: Some(json!({"lang": "${lang}"})),
        ..Default::default()
    }
}

fn record(company: i64) -> JsonRecord {
    JsonRecord::from_value(&json!({"id": 42, "company": company, "lang": "en"}))
}

fn labels(selection: &[SelectOption]) -> Vec<&str> {
    selection.iter().map(|o| o.label.as_str()).collect()
}

#[test]
fn literal_selection_sorts_by_label_without_remote() {
    let attrs = FieldAttrs {
        name: "state".into(),
        selection: Some(SelectionSource::Literal(vec![
            SelectOption::new(json!(1), "Alpha"),
            SelectOption::new(json!(2), "B"),
        ])),
        ..Default::default()
    };
    let remote = StubRemote::new(vec![]);
    let mut resolver = SelectionResolver::new();
    resolver.init_selection(&attrs, &remote, None);
    assert_eq!(labels(&resolver.selection), vec!["Alpha", "B"]);
    assert_eq!(resolver.selection[0].value, json!(1));
    assert_eq!(remote.call_count(), 0);
    assert!(resolver.state.cache.is_empty());
}

#[test]
fn literal_selection_keeps_source_order_when_sort_disabled() {
    let attrs = FieldAttrs {
        name: "state".into(),
        sort: false,
        selection: Some(SelectionSource::Literal(vec![
            SelectOption::new(json!(1), "Zulu"),
            SelectOption::new(json!(2), "Alpha"),
        ])),
        ..Default::default()
    };
    let remote = StubRemote::new(vec![]);
    let mut resolver = SelectionResolver::new();
    resolver.init_selection(&attrs, &remote, None);
    assert_eq!(labels(&resolver.selection), vec!["Zulu", "Alpha"]);
}

#[test]
fn method_selection_fetched_once_then_cached() {
    let attrs = method_attrs();
    let remote = StubRemote::new(vec![Ok(json!([["b", "B"], ["a", "Alpha"]]))]);
    let mut resolver = SelectionResolver::new();
    resolver.init_selection(&attrs, &remote, None);
    assert_eq!(labels(&resolver.selection), vec!["Alpha", "B"]);

    // Second resolution is served from the cache
    resolver.init_selection(&attrs, &remote, None);
    assert_eq!(remote.call_count(), 1);
    assert_eq!(labels(&resolver.selection), vec!["Alpha", "B"]);

    let (model, method, args, _) = remote.calls.borrow()[0].clone();
    assert_eq!(model, "product");
    assert_eq!(method, "category_options");
    assert!(args.is_empty());
}

#[test]
fn cache_stores_fetch_order_sort_is_view_time() {
    let attrs = method_attrs();
    let remote = StubRemote::new(vec![Ok(json!([["b", "B"], ["a", "Alpha"]]))]);
    let mut resolver = SelectionResolver::new();
    resolver.init_selection(&attrs, &remote, None);
    let cached = resolver.state.cache.values().next().unwrap();
    assert_eq!(labels(cached), vec!["B", "Alpha"]);
    assert_eq!(labels(&resolver.selection), vec!["Alpha", "B"]);
}

#[test]
fn method_failure_is_empty_and_not_cached() {
    let attrs = method_attrs();
    let remote = StubRemote::new(vec![
        Err(RemoteError("boom".into())),
        Ok(json!([["a", "Alpha"]])),
    ]);
    let mut resolver = SelectionResolver::new();
    resolver.init_selection(&attrs, &remote, None);
    assert!(resolver.selection.is_empty());
    assert!(resolver.state.cache.is_empty());

    // Retry succeeds and is cached
    resolver.init_selection(&attrs, &remote, None);
    assert_eq!(remote.call_count(), 2);
    assert_eq!(labels(&resolver.selection), vec!["Alpha"]);
    assert_eq!(resolver.state.cache.len(), 1);
}

#[test]
fn change_with_values_form_the_key_and_the_args() {
    let mut attrs = method_attrs();
    attrs.selection_change_with = vec!["company".into(), "id".into()];
    let remote = StubRemote::new(vec![
        Ok(json!([["a", "Alpha"]])),
        Ok(json!([["b", "Bravo"]])),
    ]);
    let mut resolver = SelectionResolver::new();

    resolver.update_selection(Some(&attrs), &remote, &record(7));
    assert_eq!(labels(&resolver.selection), vec!["Alpha"]);
    let (_, _, args, _) = remote.calls.borrow()[0].clone();
    // On-change snapshot passed as the argument map, own id excluded
    assert_eq!(args, vec![json!({"company": 7})]);

    // Same sibling values: cache hit, no second call
    resolver.update_selection(Some(&attrs), &remote, &record(7));
    assert_eq!(remote.call_count(), 1);

    // Different sibling values: new key, new fetch
    resolver.update_selection(Some(&attrs), &remote, &record(8));
    assert_eq!(remote.call_count(), 2);
    assert_eq!(labels(&resolver.selection), vec!["Bravo"]);
}

#[test]
fn update_selection_without_field_is_noop() {
    let remote = StubRemote::new(vec![]);
    let mut resolver = SelectionResolver::new();
    resolver.selection = vec![SelectOption::new(json!(1), "Kept")];
    resolver.update_selection(None, &remote, &record(7));
    assert_eq!(labels(&resolver.selection), vec!["Kept"]);
    assert_eq!(remote.call_count(), 0);
}

#[test]
fn same_domain_issues_at_most_one_query() {
    let attrs = relational_attrs();
    let remote = StubRemote::new(vec![Ok(json!([
        {"id": 1, "display_name": "Acme"},
        {"id": 2, "display_name": "Globex"},
    ]))]);
    let mut resolver = SelectionResolver::new();

    resolver.update_selection(Some(&attrs), &remote, &record(7));
    resolver.update_selection(Some(&attrs), &remote, &record(7));
    assert_eq!(remote.call_count(), 1);

    // Search order kept, trailing no-selection entry appended
    assert_eq!(labels(&resolver.selection), vec!["Acme", "Globex", ""]);
    assert_eq!(resolver.selection[2].value, JsonValue::Null);

    let (model, method, args, context) = remote.calls.borrow()[0].clone();
    assert_eq!(model, "party");
    assert_eq!(method, "search_read");
    assert_eq!(args[0], json!([["company", "=", 7]]));
    assert_eq!(args[1], json!(0));
    assert_eq!(args[4], json!(["display_name"]));
    assert_eq!(context, Some(json!({"lang": "en"})));
}

#[test]
fn changed_domain_refetches_and_old_domain_hits_cache() {
    let attrs = relational_attrs();
    let remote = StubRemote::new(vec![
        Ok(json!([{"id": 1, "display_name": "Acme"}])),
        Ok(json!([{"id": 9, "display_name": "Initech"}])),
    ]);
    let mut resolver = SelectionResolver::new();

    resolver.update_selection(Some(&attrs), &remote, &record(7));
    assert_eq!(labels(&resolver.selection), vec!["Acme", ""]);

    resolver.update_selection(Some(&attrs), &remote, &record(8));
    assert_eq!(remote.call_count(), 2);
    assert_eq!(labels(&resolver.selection), vec!["Initech", ""]);

    // Back to the first domain: adopted from cache, still two calls
    resolver.update_selection(Some(&attrs), &remote, &record(7));
    assert_eq!(remote.call_count(), 2);
    assert_eq!(labels(&resolver.selection), vec!["Acme", ""]);
}

#[test]
fn failed_search_clears_last_domain_and_retries() {
    let attrs = relational_attrs();
    let remote = StubRemote::new(vec![
        Err(RemoteError("unreachable".into())),
        Ok(json!([{"id": 1, "display_name": "Acme"}])),
    ]);
    let mut resolver = SelectionResolver::new();

    resolver.update_selection(Some(&attrs), &remote, &record(7));
    assert!(resolver.selection.is_empty());
    assert!(resolver.state.last_domain.is_none());

    // Identical domain immediately retries instead of staying empty
    resolver.update_selection(Some(&attrs), &remote, &record(7));
    assert_eq!(remote.call_count(), 2);
    assert_eq!(labels(&resolver.selection), vec!["Acme", ""]);
}

#[test]
fn non_list_search_result_counts_as_failure() {
    let attrs = relational_attrs();
    let remote = StubRemote::new(vec![Ok(json!({"unexpected": true}))]);
    let mut resolver = SelectionResolver::new();
    resolver.update_selection(Some(&attrs), &remote, &record(7));
    assert!(resolver.selection.is_empty());
    assert!(resolver.state.last_domain.is_none());
}

#[test]
fn duplicate_record_ids_are_dropped() {
    let attrs = relational_attrs();
    let remote = StubRemote::new(vec![Ok(json!([
        {"id": 1, "display_name": "Acme"},
        {"id": 1, "display_name": "Acme (dup)"},
        {"id": 2, "display_name": "Globex"},
    ]))]);
    let mut resolver = SelectionResolver::new();
    resolver.update_selection(Some(&attrs), &remote, &record(7));
    assert_eq!(labels(&resolver.selection), vec!["Acme", "Globex", ""]);
}

#[test]
fn fresh_resolution_resets_inactive_cache() {
    let attrs = relational_attrs();
    let remote = StubRemote::new(vec![
        Ok(json!([{"id": 1, "display_name": "Acme"}])),
        Ok(json!([{"id": 3, "display_name": "Hooli"}])),
        Ok(json!([{"id": 9, "display_name": "Initech"}])),
    ]);
    let mut resolver = SelectionResolver::new();
    resolver.update_selection(Some(&attrs), &remote, &record(7));

    // Value 3 is not in the active set: looked up and cached as inactive
    assert_eq!(resolver.inactive_label(&attrs, &remote, &json!(3)), "Hooli");
    assert_eq!(resolver.state.inactive.len(), 1);

    resolver.update_selection(Some(&attrs), &remote, &record(8));
    assert!(resolver.state.inactive.is_empty());
}

#[test]
fn inactive_label_for_non_relational_field_never_calls_remote() {
    let attrs = method_attrs();
    let remote = StubRemote::new(vec![]);
    let mut resolver = SelectionResolver::new();
    assert_eq!(resolver.inactive_label(&attrs, &remote, &json!(3)), "");
    assert_eq!(remote.call_count(), 0);
}

#[test]
fn inactive_hit_is_served_from_cache_by_string_form() {
    let attrs = relational_attrs();
    let remote = StubRemote::new(vec![Ok(json!([{"id": 3, "display_name": "Hooli"}]))]);
    let mut resolver = SelectionResolver::new();
    assert_eq!(resolver.inactive_label(&attrs, &remote, &json!(3)), "Hooli");
    // Numeric id and its string form hit the same entry
    assert_eq!(resolver.inactive_label(&attrs, &remote, &json!("3")), "Hooli");
    assert_eq!(remote.call_count(), 1);

    let (model, method, args, _) = remote.calls.borrow()[0].clone();
    assert_eq!(model, "party");
    assert_eq!(method, "read");
    assert_eq!(args, vec![json!([3]), json!(["display_name"])]);
}

#[test]
fn failed_inactive_read_is_not_cached() {
    let attrs = relational_attrs();
    let remote = StubRemote::new(vec![
        Err(RemoteError("gone".into())),
        Ok(json!([{"id": 3, "display_name": "Hooli"}])),
    ]);
    let mut resolver = SelectionResolver::new();
    assert_eq!(resolver.inactive_label(&attrs, &remote, &json!(3)), "");
    assert!(resolver.state.inactive.is_empty());
    // Next lookup retries
    assert_eq!(resolver.inactive_label(&attrs, &remote, &json!(3)), "Hooli");
    assert_eq!(remote.call_count(), 2);
}

#[test]
fn parse_option_pairs_accepts_pairs_and_objects() {
    let pairs = parse_option_pairs(&json!([
        ["a", "Alpha"],
        [1, 2],
        {"value": "b", "label": "Bravo"},
        "junk",
    ]));
    assert_eq!(
        pairs,
        vec![
            SelectOption::new(json!("a"), "Alpha"),
            SelectOption::new(json!(1), "2"),
            SelectOption::new(json!("b"), "Bravo"),
        ]
    );
    assert!(parse_option_pairs(&json!({"not": "a list"})).is_empty());
}
