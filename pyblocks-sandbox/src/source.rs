//! Program source provider - persisted output of the block editor's generator

use crate::config::StorageConfig;
use crate::error::{ConfigError, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Key the generated program is stored under unless configured otherwise
pub const DEFAULT_STORAGE_KEY: &str = "pythonCode";

/// Supplies the current program text when a run is requested
pub trait SourceProvider: Send + Sync {
    /// `None` when no program is available
    fn current_source(&self) -> Option<String>;
}

/// A fixed program, e.g. read from a file given on the command line
#[derive(Debug, Clone)]
pub struct InlineSource(String);

impl InlineSource {
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }
}

impl SourceProvider for InlineSource {
    fn current_source(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Change notification from the block editor workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceEvent {
    /// Pure view change: scroll, zoom, selection
    Ui,
    /// The workspace finished loading from storage
    FinishedLoading,
    /// Blocks were created, moved, edited or deleted
    Change { dragging: bool },
}

impl WorkspaceEvent {
    /// Whether this event should regenerate and store the program
    pub fn changes_program(self) -> bool {
        matches!(self, WorkspaceEvent::Change { dragging: false })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProgram {
    pub source: String,
    pub updated_at: DateTime<Utc>,
}

/// Key/value store persisted as a JSON file
pub struct ProgramStore {
    path: PathBuf,
    key: String,
}

impl ProgramStore {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.resolved_path()?, config.key.clone()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn read_all(&self) -> Result<BTreeMap<String, StoredProgram>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })
    }

    fn write_all(&self, programs: &BTreeMap<String, StoredProgram>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(programs)?;
        // Write-then-rename so readers never see a half-written file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }

    pub fn get(&self) -> Result<Option<StoredProgram>, StoreError> {
        Ok(self.read_all()?.remove(&self.key))
    }

    pub fn set(&self, source: impl Into<String>) -> Result<(), StoreError> {
        let mut programs = self.read_all()?;
        let program = StoredProgram {
            source: source.into(),
            updated_at: Utc::now(),
        };
        tracing::debug!(key = %self.key, code_len = program.source.len(), "Storing program");
        programs.insert(self.key.clone(), program);
        self.write_all(&programs)
    }

    /// Regenerate and store the program if the event changed it
    ///
    /// Returns whether the generator ran.
    pub fn record_change<F>(&self, event: WorkspaceEvent, generate: F) -> Result<bool, StoreError>
    where
        F: FnOnce() -> String,
    {
        if !event.changes_program() {
            return Ok(false);
        }
        self.set(generate())?;
        Ok(true)
    }
}

impl SourceProvider for ProgramStore {
    fn current_source(&self) -> Option<String> {
        match self.get() {
            Ok(program) => program.map(|p| p.source),
            Err(e) => {
                tracing::warn!("Failed to read stored program: {}", e);
                None
            }
        }
    }
}

/// Program listing with right-aligned line numbers
pub fn numbered_listing(source: &str) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let width = lines.len().max(1).to_string().len();
    let mut out = String::new();
    for (index, line) in lines.iter().enumerate() {
        out.push_str(&format!("{:>width$} | {}\n", index + 1, line, width = width));
    }
    out
}
