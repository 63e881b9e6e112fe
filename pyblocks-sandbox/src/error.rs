use std::time::Duration;
use thiserror::Error;

/// Failures talking to an interpreter session
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Failed to spawn interpreter: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Interpreter did not become ready within {0:?}")]
    BootTimeout(Duration),

    #[error("Interpreter exited before becoming ready")]
    BootExited,

    #[error("Worker exited unexpectedly")]
    WorkerExited,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input request was abandoned")]
    InputAbandoned,
}

impl SandboxError {
    /// Whether the session that produced this error can no longer be used
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(
            self,
            SandboxError::WorkerExited
                | SandboxError::Io(_)
                | SandboxError::Protocol(_)
                | SandboxError::Serialization(_)
        )
    }
}

impl From<tokio_util::codec::LinesCodecError> for SandboxError {
    fn from(e: tokio_util::codec::LinesCodecError) -> Self {
        match e {
            tokio_util::codec::LinesCodecError::Io(io) => SandboxError::Io(io),
            tokio_util::codec::LinesCodecError::MaxLineLengthExceeded => {
                SandboxError::Protocol("worker message exceeds the maximum line length".to_string())
            }
        }
    }
}

pub type SandboxResult<T> = Result<T, SandboxError>;

/// Failures of the execution worker proxy
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("No live execution session")]
    NoSession,

    #[error("Execution session was terminated")]
    Terminated,

    #[error("Interpreter failed to initialize: {0}")]
    Boot(#[source] SandboxError),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

/// Failures reading or writing the program store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access program store {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Program store {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot determine home directory")]
    NoHome,

    #[error("Failed to read config: {0}")]
    Read(#[source] std::io::Error),

    #[error("Failed to write config: {0}")]
    Write(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
