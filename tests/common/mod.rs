//! Common test utilities shared across integration and E2E tests


pub use scripted::*;

use pyblocks_sandbox::{Console, InlineSource, RunController, SourceProvider};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Setup logging for tests
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Controller over a scripted runtime running a fixed program
pub fn scripted_controller(program: &str) -> (Arc<RunController>, Console, Arc<ScriptStats>) {
    scripted_controller_with(Arc::new(InlineSource::new(program)))
}

pub fn scripted_controller_with(
    source: Arc<dyn SourceProvider>,
) -> (Arc<RunController>, Console, Arc<ScriptStats>) {
    let (runtime, stats) = ScriptedRuntime::new();
    let console = Console::new();
    let controller = Arc::new(RunController::new(runtime, console.clone(), source));
    (controller, console, stats)
}

/// Poll until `condition` holds, failing the test after two seconds
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Program text the test can swap out, or withdraw, between runs
#[derive(Default)]
pub struct SwitchableSource(Mutex<Option<String>>);

impl SwitchableSource {
    pub fn new(program: &str) -> Arc<Self> {
        let source = Arc::new(Self::default());
        source.set(Some(program));
        source
    }

    pub fn set(&self, program: Option<&str>) {
        *self.0.lock().unwrap() = program.map(str::to_string);
    }
}

impl SourceProvider for SwitchableSource {
    fn current_source(&self) -> Option<String> {
        self.0.lock().unwrap().clone()
    }
}
