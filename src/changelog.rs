//! Persisted Pending-Change Log
//!
//! The engine does not care where the log lives; it only needs
//! `load_log` and `save_log`. Logs are wrapped in a versioned envelope so an
//! older engine refuses a log it cannot read.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

use crate::changes::{Change, PendingChanges};

pub const CHANGE_LOG_FORMAT: &str = "1.0.0";

#[derive(Debug, Error)]
pub enum ChangeLogError {
    #[error("Change log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Change log is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Change log format {found} is not compatible with {supported}")]
    IncompatibleVersion { found: String, supported: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLogEnvelope {
    pub format_version: semver::Version,
    pub changes: Vec<Change>,
}

impl ChangeLogEnvelope {
    pub fn wrap(pending: &PendingChanges) -> Self {
        Self {
            format_version: current_format(),
            changes: pending.as_slice().to_vec(),
        }
    }

    pub fn into_pending(self) -> Result<PendingChanges, ChangeLogError> {
        let supported = current_format();
        if self.format_version.major != supported.major {
            return Err(ChangeLogError::IncompatibleVersion {
                found: self.format_version.to_string(),
                supported: supported.to_string(),
            });
        }
        Ok(PendingChanges::from_changes(self.changes))
    }

    pub fn to_json(&self) -> Result<String, ChangeLogError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, ChangeLogError> {
        Ok(serde_json::from_str(raw)?)
    }
}

fn current_format() -> semver::Version {
    semver::Version::new(1, 0, 0)
}

/// Where the pending-change log is kept between sessions.
pub trait ChangeLogStore {
    fn load_log(&self) -> Result<PendingChanges, ChangeLogError>;
    fn save_log(&mut self, pending: &PendingChanges) -> Result<(), ChangeLogError>;
}

/// In-process log, for tests and short-lived sessions.
#[derive(Debug, Default)]
pub struct MemoryChangeLog {
    saved: Option<String>,
}

impl MemoryChangeLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChangeLogStore for MemoryChangeLog {
    fn load_log(&self) -> Result<PendingChanges, ChangeLogError> {
        match &self.saved {
            Some(raw) => ChangeLogEnvelope::from_json(raw)?.into_pending(),
            None => Ok(PendingChanges::new()),
        }
    }

    fn save_log(&mut self, pending: &PendingChanges) -> Result<(), ChangeLogError> {
        self.saved = Some(ChangeLogEnvelope::wrap(pending).to_json()?);
        Ok(())
    }
}

/// Log kept as a JSON file. A missing file is an empty log.
#[derive(Debug, Clone)]
pub struct JsonFileChangeLog {
    path: PathBuf,
}

impl JsonFileChangeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ChangeLogStore for JsonFileChangeLog {
    fn load_log(&self) -> Result<PendingChanges, ChangeLogError> {
        if !self.path.exists() {
            return Ok(PendingChanges::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        ChangeLogEnvelope::from_json(&raw)?.into_pending()
    }

    fn save_log(&mut self, pending: &PendingChanges) -> Result<(), ChangeLogError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, ChangeLogEnvelope::wrap(pending).to_json()?)?;
        Ok(())
    }
}
