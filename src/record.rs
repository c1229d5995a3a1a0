use regex::Regex;
use serde_json::{Map, Value as JsonValue};

use crate::model::{value_str, FieldAttrs};

/// Read access to the record a field belongs to. The resolver only ever needs
/// current field values and the on-change snapshot, so hosts can back this
/// with whatever record abstraction they have.
pub trait Record {
    /// Current value of a field by name; `Null` when unset or unknown.
    fn value(&self, field: &str) -> JsonValue;

    /// Snapshot of the given fields for on-change arguments. The record's own
    /// identifier is never part of the snapshot.
    fn on_change_args(&self, fields: &[String]) -> Map<String, JsonValue> {
        let mut args = Map::new();
        for f in fields {
            args.insert(f.clone(), self.value(f));
        }
        args.remove("id");
        args
    }
}

/// Record backed by a plain JSON object.
#[derive(Debug, Clone, Default)]
pub struct JsonRecord {
    values: Map<String, JsonValue>,
}

impl JsonRecord {
    pub fn new(values: Map<String, JsonValue>) -> Self {
        Self { values }
    }

    pub fn from_value(v: &JsonValue) -> Self {
        Self {
            values: v.as_object().cloned().unwrap_or_default(),
        }
    }

    pub fn set(&mut self, field: impl Into<String>, value: JsonValue) {
        self.values.insert(field.into(), value);
    }
}

impl Record for JsonRecord {
    fn value(&self, field: &str) -> JsonValue {
        self.values.get(field).cloned().unwrap_or(JsonValue::Null)
    }
}

/// Resolve `${field}` placeholders in a domain/context template against a
/// record. A string that is exactly one placeholder becomes the record value
/// with its type preserved; placeholders embedded in longer strings are
/// interpolated textually. Arrays and objects resolve recursively.
pub fn resolve_template(template: &JsonValue, record: &dyn Record) -> JsonValue {
    let re = Regex::new(r"\$\{([A-Za-z0-9_]+)\}").unwrap();
    resolve_value(&re, template, record)
}

fn resolve_value(re: &Regex, v: &JsonValue, record: &dyn Record) -> JsonValue {
    match v {
        JsonValue::String(s) => {
            if let Some(caps) = re.captures(s) {
                if caps.get(0).map(|m| m.as_str()) == Some(s.as_str()) {
                    return record.value(&caps[1]);
                }
            }
            let out = re.replace_all(s, |caps: &regex::Captures| value_str(&record.value(&caps[1])));
            JsonValue::String(out.to_string())
        }
        JsonValue::Array(items) => JsonValue::Array(
            items
                .iter()
                .map(|item| resolve_value(re, item, record))
                .collect(),
        ),
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(k, val)| (k.clone(), resolve_value(re, val, record)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Domain expression for a relational field, resolved against the record.
/// A field without a domain template searches unconstrained.
pub fn resolve_domain(attrs: &FieldAttrs, record: &dyn Record) -> JsonValue {
    match &attrs.domain {
        Some(template) => resolve_template(template, record),
        None => JsonValue::Array(Vec::new()),
    }
}

/// Context mapping for a relational field, resolved against the record.
/// Non-object templates collapse to an empty context.
pub fn resolve_context(attrs: &FieldAttrs, record: &dyn Record) -> Map<String, JsonValue> {
    match &attrs.context {
        Some(template) => resolve_template(template, record)
            .as_object()
            .cloned()
            .unwrap_or_default(),
        None => Map::new(),
    }
}
