//! Run requests, outcomes and the run button state machine

use serde::{Deserialize, Serialize};

/// Source text submitted for one execution attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub source: String,
}

impl RunRequest {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.source.trim().is_empty()
    }
}

/// Result of one execution attempt
///
/// Success and failure payloads are both text destined for the console, but
/// they are kept apart so a fault is never mistaken for regular output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum RunOutcome {
    Ok(String),
    Fault(String),
}

impl RunOutcome {
    /// Text to render in the console
    pub fn text(&self) -> &str {
        match self {
            RunOutcome::Ok(text) | RunOutcome::Fault(text) => text,
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, RunOutcome::Fault(_))
    }
}

/// State of the run/stop button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControllerState {
    #[default]
    Idle,
    Running,
    /// Termination is in flight; further stop requests are ignored
    Stopping,
}

impl ControllerState {
    /// Label the run button shows in this state
    pub fn button_label(self) -> ButtonLabel {
        match self {
            ControllerState::Idle => ButtonLabel::Run,
            ControllerState::Running => ButtonLabel::Stop,
            ControllerState::Stopping => ButtonLabel::Stopping,
        }
    }

    pub fn is_active(self) -> bool {
        self != ControllerState::Idle
    }
}

/// Text affordance of the run button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonLabel {
    Run,
    Stop,
    Stopping,
    /// The interpreter never came up (or could not be recreated)
    Unavailable,
}

impl std::fmt::Display for ButtonLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ButtonLabel::Run => "Run",
            ButtonLabel::Stop => "Stop",
            ButtonLabel::Stopping => "Stopping...",
            ButtonLabel::Unavailable => "Unavailable",
        };
        f.write_str(text)
    }
}
