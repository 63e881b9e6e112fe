//! Execution worker proxy - owns the lifetime of the interpreter session

use crate::error::{SandboxResult, WorkerError};
use crate::runtime::{InputHandler, Runtime, Session};
use pyblocks_common::{RunOutcome, RunRequest, SessionId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

enum Command {
    Run {
        request: RunRequest,
        reply: oneshot::Sender<SandboxResult<RunOutcome>>,
    },
}

/// Handle to the task driving one live session
struct SessionHandle {
    id: SessionId,
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    fn spawn(session: Box<dyn Session>, input: Arc<dyn InputHandler>) -> Self {
        let id = SessionId::new();
        let (commands, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(drive(id, session, rx, cancel.clone(), input));
        Self {
            id,
            commands,
            cancel,
            task,
        }
    }

    fn is_alive(&self) -> bool {
        !self.task.is_finished()
    }

    /// Kill the session and wait until its interpreter is gone
    async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(session_id = %self.id, "Session task failed: {}", e);
        }
    }
}

async fn drive(
    id: SessionId,
    mut session: Box<dyn Session>,
    mut commands: mpsc::Receiver<Command>,
    cancel: CancellationToken,
    input: Arc<dyn InputHandler>,
) {
    loop {
        let command = tokio::select! {
            _ = cancel.cancelled() => break,
            command = commands.recv() => command,
        };
        let Some(Command::Run { request, reply }) = command else {
            break;
        };

        tracing::debug!(session_id = %id, code_len = request.source.len(), "Run dispatched");
        let result = tokio::select! {
            _ = cancel.cancelled() => None,
            result = session.run(&request, input.as_ref()) => Some(result),
        };

        match result {
            // Dropping `reply` tells the caller the session was terminated
            None => break,
            Some(result) => {
                let dead = matches!(&result, Err(e) if e.is_fatal_to_session());
                let _ = reply.send(result);
                if dead {
                    tracing::warn!(session_id = %id, "Session is no longer usable");
                    break;
                }
            }
        }
    }

    session.kill().await;
    tracing::debug!(session_id = %id, "Session finished");
}

/// Proxy to the out-of-process interpreter
///
/// At most one session exists at a time. After [`ExecutionWorker::terminate`]
/// the session is gone and [`ExecutionWorker::recreate`] must complete before
/// the next [`ExecutionWorker::start`] can succeed.
pub struct ExecutionWorker {
    runtime: Arc<dyn Runtime>,
    input: Arc<dyn InputHandler>,
    session: Mutex<Option<SessionHandle>>,
}

impl ExecutionWorker {
    pub fn new(runtime: impl Runtime + 'static, input: impl InputHandler + 'static) -> Self {
        Self::from_parts(Arc::new(runtime), Arc::new(input))
    }

    pub fn from_parts(runtime: Arc<dyn Runtime>, input: Arc<dyn InputHandler>) -> Self {
        Self {
            runtime,
            input,
            session: Mutex::new(None),
        }
    }

    /// Get the runtime name
    pub fn runtime_name(&self) -> &str {
        self.runtime.name()
    }

    /// Id of the current session, if any
    pub async fn session_id(&self) -> Option<SessionId> {
        self.session.lock().await.as_ref().map(|handle| handle.id)
    }

    /// Whether a session exists and can accept work
    pub async fn is_alive(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(SessionHandle::is_alive)
    }

    /// Run a program in the current session
    ///
    /// Resolves with [`WorkerError::Terminated`] if the session is terminated
    /// while the program runs.
    pub async fn start(&self, request: RunRequest) -> Result<RunOutcome, WorkerError> {
        let (id, commands) = {
            let guard = self.session.lock().await;
            let handle = guard.as_ref().ok_or(WorkerError::NoSession)?;
            (handle.id, handle.commands.clone())
        };

        tracing::info!(
            session_id = %id,
            runtime = self.runtime.name(),
            code_len = request.source.len(),
            "Executing code"
        );

        let (reply, outcome) = oneshot::channel();
        commands
            .send(Command::Run { request, reply })
            .await
            .map_err(|_| WorkerError::Terminated)?;

        match outcome.await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(WorkerError::Sandbox(e)),
            Err(_) => Err(WorkerError::Terminated),
        }
    }

    /// Forcibly stop the current session, aborting any run in flight
    ///
    /// A no-op when there is no session.
    pub async fn terminate(&self) {
        let handle = self.session.lock().await.take();
        if let Some(handle) = handle {
            let id = handle.id;
            tracing::info!(session_id = %id, "Terminating session");
            handle.shutdown().await;
            tracing::info!(session_id = %id, "Session terminated");
        }
    }

    /// Replace the current session (if any) with a freshly loaded one
    pub async fn recreate(&self) -> Result<SessionId, WorkerError> {
        self.terminate().await;

        let session = self
            .runtime
            .spawn_session()
            .await
            .map_err(WorkerError::Boot)?;
        let handle = SessionHandle::spawn(session, Arc::clone(&self.input));
        let id = handle.id;

        let previous = self.session.lock().await.replace(handle);
        if let Some(previous) = previous {
            previous.shutdown().await;
        }

        tracing::info!(session_id = %id, runtime = self.runtime.name(), "Session ready");
        Ok(id)
    }
}
