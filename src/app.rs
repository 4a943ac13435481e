use thiserror::Error;
use tracing::warn;

use crate::backup::{BackupError, SnapshotStore};
use crate::ledger::{LedgerError, TaskLedger};
use crate::tracker::{TrackerError, WorklogTracker};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Backup(#[from] BackupError),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error("{0}")]
    Validation(String),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// Everything a view may touch while handling one event.
pub struct AppContext {
    pub ledger: TaskLedger,
    pub backup: Option<Box<dyn SnapshotStore>>,
    pub tracker: Option<Box<dyn WorklogTracker>>,
    backup_error: Option<String>,
}

impl AppContext {
    pub fn new(
        ledger: TaskLedger,
        backup: Option<Box<dyn SnapshotStore>>,
        tracker: Option<Box<dyn WorklogTracker>>,
    ) -> Self {
        Self {
            ledger,
            backup,
            tracker,
            backup_error: None,
        }
    }

    /// Snapshots the store after a successful ledger change. A failure does
    /// not undo the change; it is kept until the controller picks it up.
    pub fn snapshot_after_change(&mut self) {
        let Some(backup) = self.backup.as_mut() else {
            return;
        };
        if !backup.available() {
            return;
        }
        if let Err(err) = backup.create_snapshot() {
            warn!(error = %err, "failed to create snapshot");
            self.backup_error = Some(format!("failed to create snapshot: {err}"));
        }
    }

    pub fn take_backup_error(&mut self) -> Option<String> {
        self.backup_error.take()
    }

    pub fn snapshot_store(&mut self) -> Result<&mut dyn SnapshotStore, AppError> {
        let Some(backup) = self.backup.as_mut() else {
            return Err(BackupError::Unavailable.into());
        };
        if !backup.available() {
            return Err(BackupError::Unavailable.into());
        }
        Ok(backup.as_mut())
    }

    pub fn worklog_tracker(&self) -> Result<&dyn WorklogTracker, AppError> {
        self.tracker
            .as_deref()
            .ok_or(AppError::NotConfigured("JIRA"))
    }
}

#[cfg(test)]
pub use fakes::{FakeBackup, FakeTracker, context_with};
