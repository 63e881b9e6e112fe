//! Messages exchanged with the interpreter worker
//!
//! Every message is a single JSON object on its own line.

use serde::{Deserialize, Serialize};

/// Worker -> host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// Sent once after the interpreter has loaded
    Ready,
    /// The program called `input()`; `output` is what it printed since the
    /// last flush
    InputRequest {
        #[serde(default)]
        prompt: String,
        #[serde(default)]
        output: String,
    },
    Completed {
        #[serde(default)]
        output: String,
    },
    Fault {
        #[serde(default)]
        output: String,
        error: String,
    },
}

/// Host -> worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    Run { source: String },
    InputReply { value: String },
}

impl HostMessage {
    /// Encode as one protocol line, newline included
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

impl WorkerMessage {
    pub fn from_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim())
    }
}
