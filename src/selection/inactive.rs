use serde_json::Value as JsonValue;

use crate::model::{value_str, FieldAttrs, SelectOption};
use crate::selection::SelectionResolver;
use crate::services::remote::{self, Remote};

impl SelectionResolver {
    /// Label for a value that is no longer part of the active option set.
    ///
    /// Only relational references have individually readable labels; for any
    /// other field this returns the empty label without touching the remote.
    /// Hits are served from the inactive cache (values compared by string
    /// form, since ids arrive from heterogeneous sources); a miss reads the
    /// single record and caches the result. A failed read returns the empty
    /// label and caches nothing, so a later lookup retries.
    pub fn inactive_label(
        &mut self,
        attrs: &FieldAttrs,
        remote: &dyn Remote,
        value: &JsonValue,
    ) -> String {
        let Some(relation) = attrs.relation.as_deref() else {
            return String::new();
        };
        let wanted = value_str(value);
        if let Some(opt) = self
            .state
            .inactive
            .iter()
            .find(|o| value_str(&o.value) == wanted)
        {
            return opt.label.clone();
        }
        match remote::read_display_name(remote, relation, value) {
            Ok(v) => {
                let Some(row) = v.as_array().and_then(|rows| rows.first()) else {
                    return String::new();
                };
                let id = row.get("id").cloned().unwrap_or(JsonValue::Null);
                let Some(label) = row.get("display_name").and_then(|s| s.as_str()) else {
                    return String::new();
                };
                if self
                    .state
                    .inactive
                    .iter()
                    .all(|o| value_str(&o.value) != value_str(&id))
                {
                    self.state
                        .inactive
                        .push(SelectOption::new(id, label.to_string()));
                }
                label.to_string()
            }
            Err(_) => String::new(),
        }
    }
}
