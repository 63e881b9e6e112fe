//! Shared types for the pyblocks execution pipeline
//!
//! Plain data used by the sandbox crate, the CLI front end and the tests:
//! run requests and outcomes, the run button state machine, console entries
//! and the newline-delimited JSON messages spoken with the interpreter worker.

pub mod console;
pub mod ids;
pub mod run;
pub mod wire;

pub use console::*;
pub use ids::*;
pub use run::*;
pub use wire::*;
