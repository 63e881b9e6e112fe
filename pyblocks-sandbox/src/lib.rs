//! pyblocks sandbox - run/stop pipeline for block-built Python programs
//!
//! Takes the current program text, runs it in an out-of-process interpreter,
//! routes `input()` calls to prompts in the console, and keeps the run button
//! state machine consistent across start, stop and restart.

mod bridge;
mod config;
mod console;
mod controller;
mod error;
mod runtime;
mod source;
mod worker;

pub use bridge::InputBridge;
pub use config::{AppConfig, StorageConfig, WorkerConfig};
pub use console::{Confirm, Console, CLEAR_CONFIRMATION};
pub use controller::{ClickOutcome, RunController};
pub use error::{ConfigError, SandboxError, SandboxResult, StoreError, WorkerError};
#[cfg(feature = "process")]
pub use runtime::ProcessRuntime;
pub use runtime::{InputHandler, InputRequest, Runtime, Session};
pub use source::{
    numbered_listing, InlineSource, ProgramStore, SourceProvider, StoredProgram, WorkspaceEvent,
    DEFAULT_STORAGE_KEY,
};
pub use worker::ExecutionWorker;
