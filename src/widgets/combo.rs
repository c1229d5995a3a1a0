use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use serde_json::Value as JsonValue;

use crate::model::{is_falsy, FieldAttrs};
use crate::record::Record;
use crate::selection::SelectionResolver;
use crate::services::remote::Remote;
use crate::widgets::popdown::PopdownModel;

pub const OPTIONS_VISIBLE: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum ComboEvent {
    /// The bound value changed; carries the new value (`Null` = no selection).
    Changed(JsonValue),
}

/// Combo box bound to a remote-resolved option list. Owns the resolver state,
/// the built popdown model, the active row and the popup window.
pub struct ComboWidget {
    pub attrs: FieldAttrs,
    resolver: SelectionResolver,
    model: PopdownModel,
    value: JsonValue,
    summary: String,
    active: isize,
    cursor: usize,
    offset: usize,
    open: bool,
}

impl ComboWidget {
    pub fn new(attrs: FieldAttrs) -> Self {
        Self {
            attrs,
            resolver: SelectionResolver::new(),
            model: PopdownModel::default(),
            value: JsonValue::Null,
            summary: String::new(),
            active: -1,
            cursor: 0,
            offset: 0,
            open: false,
        }
    }

    /// Resolve the statically sourced options and build the popdown model.
    pub fn init(&mut self, remote: &dyn Remote) {
        self.resolver.init_selection(&self.attrs, remote, None);
        self.rebuild(remote);
    }

    /// Re-resolve options against the record and rebuild the model. The
    /// previously bound value stays active when it is still offered;
    /// otherwise the widget falls back to "no selection" and renders the
    /// value through the inactive lookup.
    pub fn refresh(&mut self, remote: &dyn Remote, rec: &dyn Record) {
        self.resolver
            .update_selection(Some(&self.attrs), remote, rec);
        self.rebuild(remote);
    }

    fn rebuild(&mut self, remote: &dyn Remote) {
        self.model = PopdownModel::build(&self.resolver.selection);
        self.open = false;
        self.cursor = 0;
        self.offset = 0;
        self.active = self.model.set_active_by_value(&self.value).unwrap_or(-1);
        self.update_summary(remote);
    }

    fn update_summary(&mut self, remote: &dyn Remote) {
        self.summary = if self.active >= 0 {
            self.model
                .label(self.active as usize)
                .unwrap_or_default()
                .to_string()
        } else if !is_falsy(&self.value) {
            self.resolver
                .inactive_label(&self.attrs, remote, &self.value)
        } else {
            String::new()
        };
    }

    /// Bind a value. Fails without touching the activation when an actual
    /// value has no row; a falsy value resets to "no selection" and succeeds.
    pub fn set_value(&mut self, remote: &dyn Remote, value: JsonValue) -> bool {
        match self.model.set_active_by_value(&value) {
            Some(active) => {
                self.active = active;
                self.value = value;
                self.update_summary(remote);
                true
            }
            None => false,
        }
    }

    /// Activation hook for an auxiliary completion lookup: mark the row
    /// holding the value active. Unknown values are silently ignored.
    pub fn match_selected(&mut self, remote: &dyn Remote, value: &JsonValue) {
        if let Some(row) = self.model.row_for_value(value) {
            self.active = row as isize;
            self.value = value.clone();
            self.update_summary(remote);
        }
    }

    pub fn active_value(&self) -> JsonValue {
        self.model.active_value(self.active)
    }

    pub fn value(&self) -> &JsonValue {
        &self.value
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Width in characters the host should give the entry.
    pub fn display_width(&self) -> u16 {
        self.model.width()
    }

    /// Cap for the host's free-text entry, from the longest label.
    pub fn max_input_len(&self) -> usize {
        self.model.max_label_len()
    }

    pub fn model(&self) -> &PopdownModel {
        &self.model
    }

    fn open_popup(&mut self) {
        if self.model.is_empty() {
            return;
        }
        self.cursor = if self.active >= 0 {
            self.active as usize
        } else {
            0
        };
        if self.cursor < self.offset {
            self.offset = self.cursor;
        }
        if self.cursor >= self.offset + OPTIONS_VISIBLE {
            self.offset = self.cursor + 1 - OPTIONS_VISIBLE;
        }
        self.open = true;
    }

    fn commit_cursor(&mut self) -> Vec<ComboEvent> {
        self.active = self.cursor as isize;
        self.value = self.model.active_value(self.active);
        self.summary = self
            .model
            .label(self.cursor)
            .unwrap_or_default()
            .to_string();
        self.open = false;
        vec![ComboEvent::Changed(self.value.clone())]
    }

    // Browse-mode quick change: cycle through the rows without the popup
    fn quick_step(&mut self, forward: bool) -> Vec<ComboEvent> {
        if self.model.is_empty() {
            return Vec::new();
        }
        let len = self.model.len();
        let next = if self.active < 0 {
            if forward {
                0
            } else {
                len - 1
            }
        } else if forward {
            (self.active as usize + 1) % len
        } else {
            (self.active as usize + len - 1) % len
        };
        self.active = next as isize;
        self.value = self.model.active_value(self.active);
        self.summary = self.model.label(next).unwrap_or_default().to_string();
        vec![ComboEvent::Changed(self.value.clone())]
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Vec<ComboEvent> {
        // Popup request chord
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char(' ') {
            self.open_popup();
            return Vec::new();
        }
        match key.code {
            KeyCode::Up if self.open => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                }
                if self.cursor < self.offset {
                    self.offset = self.cursor;
                }
                Vec::new()
            }
            KeyCode::Down if self.open => {
                if self.cursor + 1 < self.model.len() {
                    self.cursor += 1;
                }
                if self.cursor >= self.offset + OPTIONS_VISIBLE {
                    self.offset = self.cursor + 1 - OPTIONS_VISIBLE;
                }
                Vec::new()
            }
            KeyCode::Enter if self.open => self.commit_cursor(),
            KeyCode::Enter => {
                self.open_popup();
                Vec::new()
            }
            KeyCode::Esc if self.open => {
                self.open = false;
                Vec::new()
            }
            KeyCode::Left if !self.open => self.quick_step(false),
            KeyCode::Right if !self.open => self.quick_step(true),
            _ => Vec::new(),
        }
    }

    pub fn render(&self, f: &mut Frame, area: Rect, focused: bool) {
        let mut lines: Vec<Line> = Vec::new();
        let header_style = if focused && self.open {
            Style::default()
                .fg(Color::Rgb(255, 165, 0))
                .add_modifier(Modifier::BOLD)
        } else if focused {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::raw(format!("{}: ", self.attrs.display_label())),
            Span::styled(self.summary.clone(), header_style),
        ]));
        if self.open {
            let start = self.offset.min(self.model.len());
            let end = (start + OPTIONS_VISIBLE).min(self.model.len());
            for (oi, (label, _)) in self
                .model
                .rows()
                .iter()
                .enumerate()
                .take(end)
                .skip(start)
            {
                let mark = if oi as isize == self.active {
                    "(•)"
                } else {
                    "( )"
                };
                let cur = if oi == self.cursor { '›' } else { ' ' };
                let st = if oi == self.cursor {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Rgb(255, 165, 0))
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                lines.push(Line::from(Span::styled(
                    format!("  {cur} {mark} {label}"),
                    st,
                )));
            }
        }
        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.attrs.display_label().to_string());
        let p = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false });
        f.render_widget(p, area);
    }
}
