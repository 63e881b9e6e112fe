//! Interpreter runtime traits and implementations

#[cfg(feature = "process")]
mod process;

use crate::error::SandboxResult;
use async_trait::async_trait;
use pyblocks_common::{RunOutcome, RunRequest};

#[cfg(feature = "process")]
pub use process::ProcessRuntime;

/// An `input()` call made by the running program
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputRequest {
    /// Prompt text passed to `input()`
    pub prompt: String,
    /// Output the program produced since the previous flush
    pub preceding_output: String,
}

/// Host callback the interpreter invokes when the program asks for input
///
/// The returned future suspends until the user submits a value. There is no
/// timeout.
#[async_trait]
pub trait InputHandler: Send + Sync {
    async fn wait_for_input(&self, request: InputRequest) -> SandboxResult<String>;
}

/// One live interpreter instance
#[async_trait]
pub trait Session: Send {
    /// Run a program to completion, calling back into `input` for each
    /// `input()` the program makes
    async fn run(
        &mut self,
        request: &RunRequest,
        input: &dyn InputHandler,
    ) -> SandboxResult<RunOutcome>;

    /// Forcibly stop the interpreter; the session is unusable afterwards
    async fn kill(&mut self);
}

/// Runtime abstraction for creating interpreter sessions
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Load a fresh interpreter; resolves once it is ready to accept a run
    async fn spawn_session(&self) -> SandboxResult<Box<dyn Session>>;

    /// Get runtime name
    fn name(&self) -> &str;
}
