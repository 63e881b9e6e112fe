//! Input-request bridge - the interpreter's `input()` callback

use crate::console::Console;
use crate::error::{SandboxError, SandboxResult};
use crate::runtime::{InputHandler, InputRequest};
use async_trait::async_trait;

/// Renders a prompt for each `input()` call and suspends until it is submitted
#[derive(Clone)]
pub struct InputBridge {
    console: Console,
}

impl InputBridge {
    pub fn new(console: Console) -> Self {
        Self { console }
    }
}

#[async_trait]
impl InputHandler for InputBridge {
    async fn wait_for_input(&self, request: InputRequest) -> SandboxResult<String> {
        self.console.append(&request.preceding_output);
        self.console.append(&request.prompt);
        let (id, submitted) = self.console.open_prompt();
        tracing::debug!(prompt_id = %id, "Waiting for user input");

        // If the prompt is abandoned the session is being torn down and this
        // future is dropped with it
        let value = submitted.await.map_err(|_| SandboxError::InputAbandoned)?;
        tracing::debug!(prompt_id = %id, len = value.len(), "Input submitted");
        Ok(value)
    }
}
