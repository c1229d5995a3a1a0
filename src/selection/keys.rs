use serde_json::{Map, Value as JsonValue};

/// Key for statically resolved option lists: the `(field, value)` pairs of
/// the change-with fields, sorted by field name for order independence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StaticKey(Vec<(String, JsonValue)>);

impl StaticKey {
    pub fn new(pairs: impl IntoIterator<Item = (String, JsonValue)>) -> Self {
        let mut pairs: Vec<(String, JsonValue)> = pairs.into_iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        Self(pairs)
    }

    /// Key for a field whose change-with values are not known yet.
    pub fn from_change_with(names: &[String]) -> Self {
        Self::new(names.iter().map(|n| (n.clone(), JsonValue::Null)))
    }

    /// The pairs as the argument map passed to the remote method.
    pub fn args_map(&self) -> Map<String, JsonValue> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn fingerprint(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.0 {
            write_canonical(&JsonValue::String(name.clone()), &mut out);
            out.push(':');
            write_canonical(value, &mut out);
            out.push(',');
        }
        out
    }
}

/// Cache key over both option-source kinds. Domain keys are structural
/// fingerprints of the `(domain, context)` pair, so expressions that happen
/// to share a display form cannot collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Static(String),
    Domain(String),
}

impl CacheKey {
    pub fn for_static(key: &StaticKey) -> Self {
        CacheKey::Static(key.fingerprint())
    }

    pub fn for_domain(domain: &JsonValue, context: &Map<String, JsonValue>) -> Self {
        let mut out = String::new();
        write_canonical(domain, &mut out);
        out.push('|');
        write_canonical(&JsonValue::Object(context.clone()), &mut out);
        CacheKey::Domain(out)
    }
}

// Canonical JSON with object keys sorted, independent of map insertion order.
fn write_canonical(v: &JsonValue, out: &mut String) {
    match v {
        JsonValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        JsonValue::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(&JsonValue::String(k.clone()), out);
                out.push(':');
                write_canonical(&map[k.as_str()], out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
