use serde::Deserialize;
use serde_json::Value as JsonValue;

/// One selectable option: an opaque value and its display label.
/// `value == Null` represents "no selection".
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "(JsonValue, String)")]
pub struct SelectOption {
    pub value: JsonValue,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: JsonValue, label: impl Into<String>) -> Self {
        Self {
            value,
            label: label.into(),
        }
    }

    /// The trailing entry appended to relational option sets.
    pub fn none() -> Self {
        Self {
            value: JsonValue::Null,
            label: String::new(),
        }
    }
}

impl From<(JsonValue, String)> for SelectOption {
    fn from((value, label): (JsonValue, String)) -> Self {
        Self { value, label }
    }
}

/// Where a non-literal option list comes from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SelectionSource {
    /// Inline `[value, label]` pairs; used directly, never cached.
    Literal(Vec<SelectOption>),
    /// Name of a remote method that returns the pairs.
    Method(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldAttrs {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    // Model the method-resolved selection is called on
    #[serde(default)]
    pub model: Option<String>,
    // Target model of a relational field; absent for plain selections
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default)]
    pub selection: Option<SelectionSource>,
    #[serde(default = "default_true")]
    pub sort: bool,
    // Sibling fields whose values pick the applicable option list
    #[serde(default)]
    pub selection_change_with: Vec<String>,
    // Domain/context templates; `${field}` placeholders resolve against the record
    #[serde(default)]
    pub domain: Option<JsonValue>,
    #[serde(default)]
    pub context: Option<JsonValue>,
}

impl Default for FieldAttrs {
    fn default() -> Self {
        Self {
            name: String::new(),
            label: None,
            model: None,
            relation: None,
            selection: None,
            sort: true,
            selection_change_with: Vec::new(),
            domain: None,
            context: None,
        }
    }
}

fn default_true() -> bool {
    true
}

impl FieldAttrs {
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn is_relational(&self) -> bool {
        self.relation.is_some()
    }
}

/// Canonical string form of an option value. Used wherever values from
/// heterogeneous sources must compare equal (numeric id vs. its string form).
pub fn value_str(v: &JsonValue) -> String {
    match v {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// "No selection" test: null, false, empty string or numeric zero.
pub fn is_falsy(v: &JsonValue) -> bool {
    match v {
        JsonValue::Null => true,
        JsonValue::Bool(b) => !b,
        JsonValue::String(s) => s.is_empty(),
        JsonValue::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

/// Load field definitions from a YAML file (parsed through JSON values so the
/// same shapes work from either format).
pub fn load_fields_yaml(path: &std::path::Path) -> anyhow::Result<Vec<FieldAttrs>> {
    use anyhow::Context;
    let s = std::fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
    let v: JsonValue = serde_yaml::from_str(&s).with_context(|| format!("parsing {path:?}"))?;
    fields_from_value(&v)
}

pub fn fields_from_value(v: &JsonValue) -> anyhow::Result<Vec<FieldAttrs>> {
    use anyhow::Context;
    let fields: Vec<FieldAttrs> =
        serde_json::from_value(v.clone()).with_context(|| "parsing field definitions")?;
    validate_field_attrs(&fields).map_err(anyhow::Error::msg)?;
    Ok(fields)
}

pub(crate) fn validate_field_attrs(fields: &[FieldAttrs]) -> Result<(), String> {
    use std::collections::HashSet;
    let mut names = HashSet::new();
    for (i, f) in fields.iter().enumerate() {
        if f.name.is_empty() {
            return Err(format!("field at index {i} has an empty name"));
        }
        if !names.insert(&f.name) {
            return Err(format!("duplicate field name: '{}' at index {}", f.name, i));
        }
        if matches!(f.selection, Some(SelectionSource::Method(_))) && f.model.is_none() {
            return Err(format!(
                "field '{}' resolves its selection remotely but has no 'model'",
                f.name
            ));
        }
        if f.relation.is_some() && !f.selection_change_with.is_empty() {
            return Err(format!(
                "field '{}' is relational and cannot also use 'selection_change_with'",
                f.name
            ));
        }
    }
    Ok(())
}
