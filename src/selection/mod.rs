pub mod inactive;
pub mod keys;

#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value as JsonValue};

use crate::model::{value_str, FieldAttrs, SelectOption, SelectionSource};
use crate::record::{self, Record};
use crate::services::remote::{self, Remote};
use keys::{CacheKey, StaticKey};

/// Per-widget resolution state. Lives for the widget's whole lifetime;
/// entries are never evicted, a domain entry is overwritten in place when a
/// fetch succeeds.
#[derive(Debug, Default)]
pub struct SelectionState {
    pub(crate) cache: HashMap<CacheKey, Vec<SelectOption>>,
    pub(crate) inactive: Vec<SelectOption>,
    pub(crate) last_domain: Option<(JsonValue, Map<String, JsonValue>)>,
}

/// Decides when a previously fetched option list can be reused and when the
/// remote service must be queried again. Owns the active option set.
#[derive(Debug, Default)]
pub struct SelectionResolver {
    pub selection: Vec<SelectOption>,
    pub(crate) state: SelectionState,
}

impl SelectionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the selectable options for a statically sourced field.
    ///
    /// Literal lists are used directly and never cached. Method-resolved
    /// lists are cached under the static key; a failed fetch yields an empty
    /// selection and caches nothing, so the next call retries. Sorting is a
    /// view-time transform: the cache keeps the fetch order.
    pub fn init_selection(
        &mut self,
        attrs: &FieldAttrs,
        remote: &dyn Remote,
        key: Option<StaticKey>,
    ) {
        let key =
            key.unwrap_or_else(|| StaticKey::from_change_with(&attrs.selection_change_with));
        let mut selection = match &attrs.selection {
            Some(SelectionSource::Literal(opts)) => opts.clone(),
            Some(SelectionSource::Method(method)) => {
                let cache_key = CacheKey::for_static(&key);
                if let Some(cached) = self.state.cache.get(&cache_key) {
                    cached.clone()
                } else {
                    let model = attrs.model.as_deref().unwrap_or_default();
                    let args: Vec<JsonValue> = if attrs.selection_change_with.is_empty() {
                        Vec::new()
                    } else {
                        vec![JsonValue::Object(key.args_map())]
                    };
                    match remote.call(model, method, &args, None) {
                        Ok(v) => {
                            let fetched = parse_option_pairs(&v);
                            self.state.cache.insert(cache_key, fetched.clone());
                            fetched
                        }
                        Err(_) => Vec::new(),
                    }
                }
            }
            None => Vec::new(),
        };
        if attrs.sort {
            selection.sort_by(|a, b| a.label.cmp(&b.label));
        }
        self.selection = selection;
        self.state.inactive.clear();
    }

    /// Resolve options for a field whose option set depends on the record.
    ///
    /// A missing descriptor is a no-op. Non-relational fields delegate to
    /// [`init_selection`](Self::init_selection) with a static key built from
    /// the record's on-change snapshot. Relational fields adopt a cached set
    /// for the domain fingerprint when one exists, skip the remote entirely
    /// when the `(domain, context)` pair is unchanged since the last
    /// resolution, and otherwise run a filtered search. A failed search
    /// empties the active set and clears the last domain so the next call
    /// retries even for the same domain.
    pub fn update_selection(
        &mut self,
        attrs: Option<&FieldAttrs>,
        remote: &dyn Remote,
        rec: &dyn Record,
    ) {
        let Some(attrs) = attrs else {
            return;
        };
        let Some(relation) = attrs.relation.as_deref() else {
            let args = rec.on_change_args(&attrs.selection_change_with);
            let key = StaticKey::new(args);
            self.init_selection(attrs, remote, Some(key));
            return;
        };

        let domain = record::resolve_domain(attrs, rec);
        let context = record::resolve_context(attrs, rec);
        let cache_key = CacheKey::for_domain(&domain, &context);
        if let Some(cached) = self.state.cache.get(&cache_key) {
            self.selection = cached.clone();
            self.state.inactive.clear();
            self.state.last_domain = Some((domain.clone(), context.clone()));
        }
        // Evaluated after the cache check: a hit above lands here trivially
        if matches!(&self.state.last_domain, Some((d, c)) if *d == domain && *c == context) {
            return;
        }

        match remote::search_read(remote, relation, domain.clone(), &context) {
            Ok(JsonValue::Array(rows)) => {
                let mut selection = options_from_rows(&rows);
                selection.push(SelectOption::none());
                self.state.last_domain = Some((domain, context));
                self.state.cache.insert(cache_key, selection.clone());
                self.selection = selection;
            }
            _ => {
                self.selection = Vec::new();
                self.state.last_domain = None;
            }
        }
        self.state.inactive.clear();
    }
}

// One option per record row, first occurrence of an id wins.
fn options_from_rows(rows: &[JsonValue]) -> Vec<SelectOption> {
    let mut out: Vec<SelectOption> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for row in rows {
        let id = row.get("id").cloned().unwrap_or(JsonValue::Null);
        let label = row
            .get("display_name")
            .and_then(|s| s.as_str())
            .unwrap_or_default()
            .to_string();
        if seen.insert(value_str(&id)) {
            out.push(SelectOption::new(id, label));
        }
    }
    out
}

/// Parse `[value, label]` pairs from a method-resolved selection. Tolerates
/// `{value, label}` objects as well; anything else is skipped.
pub(crate) fn parse_option_pairs(v: &JsonValue) -> Vec<SelectOption> {
    let mut out: Vec<SelectOption> = Vec::new();
    let Some(items) = v.as_array() else {
        return out;
    };
    for item in items {
        if let Some(pair) = item.as_array() {
            if pair.len() == 2 {
                let value = pair[0].clone();
                let label = match &pair[1] {
                    JsonValue::String(s) => s.clone(),
                    other => value_str(other),
                };
                out.push(SelectOption::new(value, label));
            }
        } else if let Some(obj) = item.as_object() {
            let value = obj.get("value").cloned().unwrap_or(JsonValue::Null);
            let label = obj
                .get("label")
                .and_then(|s| s.as_str())
                .unwrap_or_default()
                .to_string();
            out.push(SelectOption::new(value, label));
        }
    }
    out
}
