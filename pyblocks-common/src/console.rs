//! Console (output region) entries and events

use crate::{ButtonLabel, PromptId};
use serde::{Deserialize, Serialize};

/// Internally generated status markup
///
/// This is the only kind of markup the console accepts. Program output is
/// always appended as [`ConsoleEntry::Text`] and escaped when rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusMarkup {
    /// Horizontal rule closing one run
    Separator,
    /// The user stopped the running program
    Halted,
    /// The interpreter failed to load; no further runs are possible
    FatalError(String),
}

impl StatusMarkup {
    pub fn to_html(&self) -> String {
        match self {
            StatusMarkup::Separator => "<hr><br>".to_string(),
            StatusMarkup::Halted => "<code>Program halted by user</code><br><hr><br>".to_string(),
            StatusMarkup::FatalError(details) => format!(
                "<code><p style=\"color: #F00; font-weight:bold\">An exception occurred while \
                 loading the Python environment (try restarting to fix this)</p><hr>\
                 <b>Exception Details:</b><br><br>{}<br></code><hr><br>",
                escape_html(details)
            ),
        }
    }

    pub fn to_plain(&self) -> String {
        match self {
            StatusMarkup::Separator => "----\n".to_string(),
            StatusMarkup::Halted => "Program halted by user\n----\n".to_string(),
            StatusMarkup::FatalError(details) => format!(
                "!! An exception occurred while loading the Python environment \
                 (try restarting to fix this)\n!! Exception details: {}\n----\n",
                details
            ),
        }
    }
}

/// Rendered state of one input prompt (text field plus submit control)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptView {
    pub id: PromptId,
    /// Submitted value, once the user has submitted
    pub value: Option<String>,
    pub input_enabled: bool,
    pub submit_enabled: bool,
}

impl PromptView {
    pub fn pending(id: PromptId) -> Self {
        Self {
            id,
            value: None,
            input_enabled: true,
            submit_enabled: true,
        }
    }

    /// Whether the user can still type and submit
    pub fn is_interactive(&self) -> bool {
        self.input_enabled || self.submit_enabled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsoleEntry {
    Text(String),
    Markup(StatusMarkup),
    Prompt(PromptView),
}

/// Rendered state of the run/stop button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonView {
    pub label: ButtonLabel,
    pub enabled: bool,
}

impl Default for ButtonView {
    fn default() -> Self {
        Self {
            label: ButtonLabel::Unavailable,
            enabled: false,
        }
    }
}

/// Change notification emitted by the console
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsoleEvent {
    Appended(ConsoleEntry),
    PromptUpdated(PromptView),
    Cleared,
    ButtonChanged(ButtonView),
}

/// Escape text for inclusion in HTML
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
