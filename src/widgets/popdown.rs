use serde_json::Value as JsonValue;

use crate::model::{is_falsy, SelectOption};

/// Renderable table for a popdown list: one row per option, column 0 the
/// label, column 1 the opaque value. Also carries the label lengths the
/// display-width heuristic and the host's input-length cap are derived from.
#[derive(Debug, Clone, Default)]
pub struct PopdownModel {
    rows: Vec<(String, JsonValue)>,
    lengths: Vec<usize>,
}

impl PopdownModel {
    pub fn build(selection: &[SelectOption]) -> Self {
        let mut rows: Vec<(String, JsonValue)> = Vec::new();
        let mut lengths: Vec<usize> = Vec::new();
        for opt in selection {
            lengths.push(opt.label.chars().count());
            rows.push((opt.label.clone(), opt.value.clone()));
        }
        Self { rows, lengths }
    }

    pub fn rows(&self) -> &[(String, JsonValue)] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn label(&self, row: usize) -> Option<&str> {
        self.rows.get(row).map(|(label, _)| label.as_str())
    }

    /// Width in characters the host should give the entry.
    pub fn width(&self) -> u16 {
        display_width(&self.lengths)
    }

    /// Longest label; hosts cap the entry's input length with it.
    pub fn max_label_len(&self) -> usize {
        self.lengths.iter().copied().max().unwrap_or(0)
    }

    /// Value at the active row; `Null` when nothing is active.
    pub fn active_value(&self, active: isize) -> JsonValue {
        if active < 0 {
            return JsonValue::Null;
        }
        self.rows
            .get(active as usize)
            .map(|(_, value)| value.clone())
            .unwrap_or(JsonValue::Null)
    }

    /// Row holding a value, by structural equality.
    pub fn row_for_value(&self, value: &JsonValue) -> Option<usize> {
        self.rows.iter().position(|(_, v)| v == value)
    }

    /// Activation target for a value: `Some(row)` when present, `Some(-1)`
    /// (no selection) for a falsy value, `None` when an actual value has no
    /// row — the host must then leave the activation unchanged.
    pub fn set_active_by_value(&self, value: &JsonValue) -> Option<isize> {
        if let Some(row) = self.row_for_value(value) {
            return Some(row as isize);
        }
        if is_falsy(value) {
            return Some(-1);
        }
        None
    }
}

/// Display width from a set of label lengths: the longest length that stays
/// under four population standard deviations, so a handful of extreme labels
/// cannot dominate the visible width, with a usable floor of 10.
pub fn display_width(lengths: &[usize]) -> u16 {
    if lengths.is_empty() {
        return 10;
    }
    let mut pop: Vec<usize> = lengths.to_vec();
    pop.sort_unstable_by(|a, b| b.cmp(a));
    let n = pop.len() as f64;
    let mean = pop.iter().sum::<usize>() as f64 / n;
    let deviation = (pop
        .iter()
        .map(|&x| {
            let d = x as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n)
        .sqrt();
    let threshold = deviation * 4.0;
    let picked = pop
        .iter()
        .copied()
        .find(|&x| (x as f64) < threshold)
        .unwrap_or(10);
    picked.max(10).min(u16::MAX as usize) as u16
}
