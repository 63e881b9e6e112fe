//! Run/stop controller - the state machine behind the run button

use crate::bridge::InputBridge;
use crate::console::{Confirm, Console};
use crate::error::WorkerError;
use crate::runtime::Runtime;
use crate::source::SourceProvider;
use crate::worker::ExecutionWorker;
use pyblocks_common::{ButtonLabel, ControllerState, RunOutcome, RunRequest, StatusMarkup};
use std::sync::{Arc, Mutex, MutexGuard};

/// What a button press ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// A run finished (normally or with a fault) and its output was rendered
    Completed(RunOutcome),
    /// The run was cut short by a stop request
    Interrupted,
    /// The press stopped the running program and re-armed the interpreter
    Stopped,
    /// Nothing to do in the current state
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Availability {
    Booting,
    Ready,
    Failed,
}

#[derive(Debug)]
struct ControlCell {
    state: ControllerState,
    availability: Availability,
}

enum Action {
    Start,
    Stop,
}

/// Routes run-button presses to start or stop and keeps the button, the
/// console and the interpreter session consistent
pub struct RunController {
    cell: Mutex<ControlCell>,
    worker: ExecutionWorker,
    console: Console,
    source: Arc<dyn SourceProvider>,
    /// Last program text successfully read from the source provider
    last_source: Mutex<Option<String>>,
}

impl RunController {
    pub fn new(
        runtime: impl Runtime + 'static,
        console: Console,
        source: Arc<dyn SourceProvider>,
    ) -> Self {
        let worker = ExecutionWorker::new(runtime, InputBridge::new(console.clone()));
        Self::with_worker(worker, console, source)
    }

    pub fn with_worker(
        worker: ExecutionWorker,
        console: Console,
        source: Arc<dyn SourceProvider>,
    ) -> Self {
        console.set_button(ButtonLabel::Unavailable, false);
        Self {
            cell: Mutex::new(ControlCell {
                state: ControllerState::Idle,
                availability: Availability::Booting,
            }),
            worker,
            console,
            source,
            last_source: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControlCell> {
        self.cell.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> ControllerState {
        self.lock().state
    }

    /// Whether the interpreter failed to load and no runs are possible
    pub fn is_failed(&self) -> bool {
        self.lock().availability == Availability::Failed
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn worker(&self) -> &ExecutionWorker {
        &self.worker
    }

    /// Load the interpreter; the run button becomes usable on success
    ///
    /// A failure is fatal: the console shows an error panel and the button
    /// stays unavailable for good.
    pub async fn boot(&self) -> Result<(), WorkerError> {
        match self.worker.recreate().await {
            Ok(session_id) => {
                tracing::info!(session_id = %session_id, "Interpreter loaded");
                let mut cell = self.lock();
                if cell.availability == Availability::Booting {
                    cell.availability = Availability::Ready;
                    self.console.set_button(cell.state.button_label(), true);
                }
                Ok(())
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    fn fail(&self, error: &WorkerError) {
        tracing::error!("Interpreter unavailable: {}", error);
        let mut cell = self.lock();
        cell.availability = Availability::Failed;
        cell.state = ControllerState::Idle;
        self.console
            .append_markup(StatusMarkup::FatalError(error.to_string()));
        self.console.set_button(ButtonLabel::Unavailable, false);
    }

    /// Press the run/stop button
    pub async fn click(&self) -> ClickOutcome {
        let action = {
            let mut cell = self.lock();
            if cell.availability != Availability::Ready {
                return ClickOutcome::Ignored;
            }
            match cell.state {
                ControllerState::Idle => {
                    self.enter(&mut cell, ControllerState::Running);
                    Action::Start
                }
                ControllerState::Running => {
                    self.enter(&mut cell, ControllerState::Stopping);
                    Action::Stop
                }
                ControllerState::Stopping => return ClickOutcome::Ignored,
            }
        };

        match action {
            Action::Start => self.execute().await,
            Action::Stop => self.halt().await,
        }
    }

    /// Start a run if idle; otherwise a no-op
    pub async fn run(&self) -> ClickOutcome {
        {
            let mut cell = self.lock();
            if cell.availability != Availability::Ready || cell.state != ControllerState::Idle {
                return ClickOutcome::Ignored;
            }
            self.enter(&mut cell, ControllerState::Running);
        }
        self.execute().await
    }

    /// Stop the running program; a no-op when idle or already stopping
    pub async fn stop(&self) -> ClickOutcome {
        {
            let mut cell = self.lock();
            if cell.state != ControllerState::Running {
                return ClickOutcome::Ignored;
            }
            self.enter(&mut cell, ControllerState::Stopping);
        }
        self.halt().await
    }

    /// Clear the console, confirming first if it has content or a run is
    /// active. Returns false if the user declined.
    pub fn clear(&self, confirm: &dyn Confirm) -> bool {
        let run_active = self.state().is_active();
        self.console.clear(confirm, run_active)
    }

    /// Transition and update the button in the same critical section, so the
    /// label is never out of step with the state
    fn enter(&self, cell: &mut ControlCell, state: ControllerState) {
        tracing::debug!(from = ?cell.state, to = ?state, "Controller transition");
        cell.state = state;
        if cell.availability == Availability::Ready {
            self.console
                .set_button(state.button_label(), state != ControllerState::Stopping);
        }
    }

    fn fetch_source(&self) -> String {
        let mut last = self.last_source.lock().unwrap_or_else(|e| e.into_inner());
        match self.source.current_source() {
            Some(source) => {
                *last = Some(source.clone());
                source
            }
            None => {
                tracing::warn!("No program available, using last known source");
                last.clone().unwrap_or_default()
            }
        }
    }

    async fn execute(&self) -> ClickOutcome {
        let request = RunRequest::new(self.fetch_source());
        if request.is_empty() {
            tracing::debug!("Running an empty program");
        }

        let mut session_lost = false;
        let outcome = match self.worker.start(request).await {
            Ok(outcome) => outcome,
            // The stop path owns the rest of the transition
            Err(WorkerError::Terminated) => return ClickOutcome::Interrupted,
            Err(e) => {
                session_lost = match &e {
                    WorkerError::Sandbox(inner) => inner.is_fatal_to_session(),
                    WorkerError::NoSession => true,
                    _ => false,
                };
                RunOutcome::Fault(e.to_string())
            }
        };
        let session_lost = session_lost || !self.worker.is_alive().await;

        // Hold the button in Stopping while a dead interpreter is replaced, so
        // a press cannot halt a run that already finished
        let recovering = {
            let mut cell = self.lock();
            let recovering = session_lost && cell.state == ControllerState::Running;
            if recovering {
                self.enter(&mut cell, ControllerState::Stopping);
            }
            recovering
        };

        if outcome.is_fault() {
            tracing::info!("Run finished with a fault");
        } else {
            tracing::info!("Run completed");
        }
        self.console.append(outcome.text());
        self.console.append_markup(StatusMarkup::Separator);

        if recovering {
            tracing::warn!("Interpreter died during the run, recreating");
            if let Err(e) = self.worker.recreate().await {
                self.fail(&e);
                return ClickOutcome::Completed(outcome);
            }
        }

        let mut cell = self.lock();
        // A stop that raced with completion finishes its own sequence
        if cell.state == ControllerState::Running || recovering {
            self.enter(&mut cell, ControllerState::Idle);
        }
        ClickOutcome::Completed(outcome)
    }

    async fn halt(&self) -> ClickOutcome {
        tracing::info!("Stop requested");
        self.worker.terminate().await;

        let abandoned = self.console.abandon_prompts();
        if abandoned > 0 {
            tracing::debug!(prompts = abandoned, "Disabled dangling input prompts");
        }
        self.console.append_markup(StatusMarkup::Halted);

        if let Err(e) = self.worker.recreate().await {
            self.fail(&e);
            return ClickOutcome::Stopped;
        }

        let mut cell = self.lock();
        self.enter(&mut cell, ControllerState::Idle);
        ClickOutcome::Stopped
    }
}
