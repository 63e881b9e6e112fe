//! Process-based runtime - a Python interpreter in a child process

use super::{InputHandler, InputRequest, Runtime, Session};
use crate::config::WorkerConfig;
use crate::error::{SandboxError, SandboxResult};
use async_trait::async_trait;
use futures::StreamExt;
use pyblocks_common::{HostMessage, RunOutcome, RunRequest, WorkerMessage};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio_util::codec::{FramedRead, LinesCodec};

/// Longest protocol line accepted from the worker
const MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

/// Worker loop executed by the child interpreter.
///
/// The protocol travels on private duplicates of fds 0 and 1. The program
/// never sees them: fd 1 is pointed at stderr, fd 0 at /dev/null, and the
/// Python-level streams are replaced for the life of the process. Program
/// output is captured into a buffer; `input()` and stdin reads flush the
/// buffer to the host, then block until the host replies.
const WORKER_PRELUDE: &str = r##"
import builtins
import io
import json
import os
import sys
import threading
import traceback

_proto_in = os.fdopen(os.dup(0), "r", encoding="utf-8")
_proto_out = os.fdopen(os.dup(1), "w", encoding="utf-8")
os.dup2(2, 1)
_null_fd = os.open(os.devnull, os.O_RDONLY)
os.dup2(_null_fd, 0)
os.close(_null_fd)

_lock = threading.Lock()
_captured = io.StringIO()


class _Capture(io.TextIOBase):
    def writable(self):
        return True

    def write(self, text):
        with _lock:
            return _captured.write(text)


def _send(message):
    _proto_out.write(json.dumps(message) + "\n")
    _proto_out.flush()


def _drain():
    with _lock:
        text = _captured.getvalue()
        _captured.seek(0)
        _captured.truncate(0)
    return text


def _input(prompt=""):
    _send({"type": "input_request", "prompt": str(prompt), "output": _drain()})
    line = _proto_in.readline()
    if not line:
        raise EOFError("host closed the input channel")
    return json.loads(line).get("value", "")


class _ConsoleStdin(io.TextIOBase):
    def readable(self):
        return True

    def readline(self, size=-1):
        return _input("") + "\n"

    def read(self, size=-1):
        return self.readline()


def _format_fault(exc):
    # Skip the frame of this loop's exec() call
    tb = exc.__traceback__.tb_next if exc.__traceback__ else None
    return "".join(traceback.format_exception(type(exc), exc, tb))


builtins.input = _input
sys.stdout = _Capture()
sys.stderr = _Capture()
sys.stdin = _ConsoleStdin()
_send({"type": "ready"})

for _line in _proto_in:
    if not _line.strip():
        continue
    _request = json.loads(_line)
    if _request.get("type") != "run":
        continue
    _error = None
    try:
        _code = compile(_request.get("source", ""), "<blocks>", "exec")
        exec(_code, {"__name__": "__main__", "__builtins__": builtins})
    except SystemExit as _exit:
        if _exit.code not in (None, 0):
            _error = str(_exit.code) + "\n"
    except BaseException as _exc:
        _error = _format_fault(_exc)
    if _error is None:
        _send({"type": "completed", "output": _drain()})
    else:
        _send({"type": "fault", "output": _drain(), "error": _error})
"##;

/// Process-based runtime - runs programs with a local Python interpreter
pub struct ProcessRuntime {
    python: String,
    boot_timeout: Duration,
}

impl ProcessRuntime {
    pub fn new() -> Self {
        Self::from_config(&WorkerConfig::default())
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            python: config.python.clone(),
            boot_timeout: config.boot_timeout,
        }
    }

    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }

    pub fn with_boot_timeout(mut self, timeout: Duration) -> Self {
        self.boot_timeout = timeout;
        self
    }
}

impl Default for ProcessRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runtime for ProcessRuntime {
    async fn spawn_session(&self) -> SandboxResult<Box<dyn Session>> {
        let mut child = Command::new(&self.python)
            .arg("-u")
            .arg("-c")
            .arg(WORKER_PRELUDE)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(SandboxError::Spawn)?;

        let pid = child.id();
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SandboxError::Protocol("worker stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SandboxError::Protocol("worker stdout unavailable".to_string()))?;

        // Interpreter-level diagnostics (not program output) go to the log
        if let Some(stderr) = child.stderr.take() {
            let mut reader = BufReader::new(stderr).lines();
            tokio::spawn(async move {
                while let Ok(Some(line)) = reader.next_line().await {
                    tracing::debug!(pid = ?pid, "worker stderr: {}", line);
                }
            });
        }

        let mut session = ProcessSession {
            child,
            stdin,
            messages: FramedRead::new(stdout, LinesCodec::new_with_max_length(MAX_LINE_LENGTH)),
        };

        match tokio::time::timeout(self.boot_timeout, session.next_message()).await {
            Ok(Ok(WorkerMessage::Ready)) => {
                tracing::info!(pid = ?pid, python = %self.python, "Interpreter ready");
                Ok(Box::new(session))
            }
            Ok(Ok(other)) => {
                session.terminate().await;
                Err(SandboxError::Protocol(format!(
                    "expected ready message, got {:?}",
                    other
                )))
            }
            Ok(Err(SandboxError::WorkerExited)) => {
                session.terminate().await;
                Err(SandboxError::BootExited)
            }
            Ok(Err(e)) => {
                session.terminate().await;
                Err(e)
            }
            Err(_) => {
                session.terminate().await;
                Err(SandboxError::BootTimeout(self.boot_timeout))
            }
        }
    }

    fn name(&self) -> &str {
        "process"
    }
}

struct ProcessSession {
    child: Child,
    stdin: ChildStdin,
    messages: FramedRead<ChildStdout, LinesCodec>,
}

impl ProcessSession {
    async fn next_message(&mut self) -> SandboxResult<WorkerMessage> {
        loop {
            match self.messages.next().await {
                Some(Ok(line)) if line.trim().is_empty() => continue,
                Some(Ok(line)) => return Ok(WorkerMessage::from_line(&line)?),
                Some(Err(e)) => return Err(e.into()),
                None => return Err(SandboxError::WorkerExited),
            }
        }
    }

    async fn send(&mut self, message: &HostMessage) -> SandboxResult<()> {
        let line = message.to_line()?;
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn terminate(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::warn!("Failed to kill worker process: {}", e);
        }
    }
}

/// Program output followed by the error report, starting on its own line
fn fault_text(mut output: String, error: &str) -> String {
    if !output.is_empty() && !output.ends_with('\n') {
        output.push('\n');
    }
    output.push_str(error);
    output
}

#[async_trait]
impl Session for ProcessSession {
    async fn run(
        &mut self,
        request: &RunRequest,
        input: &dyn InputHandler,
    ) -> SandboxResult<RunOutcome> {
        self.send(&HostMessage::Run {
            source: request.source.clone(),
        })
        .await?;

        loop {
            match self.next_message().await? {
                WorkerMessage::InputRequest { prompt, output } => {
                    let value = input
                        .wait_for_input(InputRequest {
                            prompt,
                            preceding_output: output,
                        })
                        .await?;
                    self.send(&HostMessage::InputReply { value }).await?;
                }
                WorkerMessage::Completed { output } => return Ok(RunOutcome::Ok(output)),
                WorkerMessage::Fault { output, error } => {
                    return Ok(RunOutcome::Fault(fault_text(output, &error)))
                }
                WorkerMessage::Ready => {
                    return Err(SandboxError::Protocol(
                        "unexpected ready message during a run".to_string(),
                    ))
                }
            }
        }
    }

    async fn kill(&mut self) {
        self.terminate().await;
    }
}
