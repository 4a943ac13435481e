use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::Task;
use crate::storage::{Persistence, StorageError};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("the ledger already contains a task with code {0}")]
    DuplicateCode(String),
    #[error("task {0} not found")]
    TaskNotFound(String),
    #[error("task {0} is not clocked in")]
    NotClockedIn(String),
    #[error("persistence failure: {0}")]
    Persistence(#[from] StorageError),
}

/// In-memory view of every task plus the active-code marker. The ledger is
/// the only writer of its store; each mutation reaches disk before it becomes
/// visible here.
pub struct TaskLedger {
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
    active_code: Option<String>,
    store: Box<dyn Persistence>,
}

impl TaskLedger {
    pub fn load(store: Box<dyn Persistence>) -> Result<Self, LedgerError> {
        let mut ledger = Self {
            tasks: Vec::new(),
            index: HashMap::new(),
            active_code: None,
            store,
        };
        ledger.reload()?;
        Ok(ledger)
    }

    /// Replaces the in-memory state with what the store holds. At most one
    /// booking stays open: without a valid active code the latest running task
    /// is adopted, and every other open booking is closed and written back.
    pub fn reload(&mut self) -> Result<(), LedgerError> {
        info!("loading ledger state");
        let mut tasks = self.store.load_all()?;
        let stored_active = self.store.load_active_code()?;

        let mut index = HashMap::with_capacity(tasks.len());
        for (position, task) in tasks.iter().enumerate() {
            if index.insert(task.code.clone(), position).is_some() {
                return Err(LedgerError::DuplicateCode(task.code.clone()));
            }
        }

        let valid_active = stored_active.clone().filter(|code| match index.get(code) {
            Some(&position) if tasks[position].is_running() => true,
            _ => {
                warn!(code = %code, "active code does not name a running task, ignoring it");
                false
            }
        });
        let active_code = valid_active.or_else(|| latest_running(&tasks));
        let active_start = active_code
            .as_deref()
            .and_then(|code| index.get(code))
            .and_then(|&position| tasks[position].bookings.last())
            .and_then(|booking| booking.start);

        let mut repaired = Vec::new();
        for (position, task) in tasks.iter().enumerate() {
            let keep_running = active_code.as_deref() == Some(task.code.as_str());
            if let Some(closed) = close_stray_bookings(task, keep_running, active_start) {
                warn!(code = %task.code, "closing open booking of a task that is not active");
                repaired.push((position, closed));
            }
        }
        for (_, task) in &repaired {
            self.store.save_task(task)?;
        }
        if active_code != stored_active {
            self.store.save_active_code(active_code.as_deref())?;
        }
        for (position, task) in repaired {
            tasks[position] = task;
        }

        info!(tasks = tasks.len(), active = ?active_code, "ledger loaded");
        self.tasks = tasks;
        self.index = index;
        self.active_code = active_code;
        Ok(())
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, code: &str) -> Option<&Task> {
        self.index.get(code).map(|&position| &self.tasks[position])
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn active_code(&self) -> Option<&str> {
        self.active_code.as_deref()
    }

    pub fn active_task(&self) -> Option<&Task> {
        self.active_code.as_deref().and_then(|code| self.task(code))
    }

    /// Case-insensitive substring match against each task label, in ledger
    /// order.
    pub fn filtered_tasks(&self, query: &str) -> Vec<&Task> {
        if query.is_empty() {
            return self.tasks.iter().collect();
        }

        let query = query.to_lowercase();
        self.tasks
            .iter()
            .filter(|task| task.label().to_lowercase().contains(&query))
            .collect()
    }

    pub fn add_task(&mut self, task: Task) -> Result<(), LedgerError> {
        if self.index.contains_key(&task.code) {
            return Err(LedgerError::DuplicateCode(task.code));
        }

        let task = Task {
            bookings: Vec::new(),
            ..task
        };
        self.store.save_task(&task)?;

        info!(code = %task.code, "task added");
        self.index.insert(task.code.clone(), self.tasks.len());
        self.tasks.push(task);
        Ok(())
    }

    /// Changes title and tags. The code is the task's identity and never
    /// changes.
    pub fn update_task(
        &mut self,
        code: &str,
        title: String,
        tags: Vec<String>,
    ) -> Result<(), LedgerError> {
        let position = self.position(code)?;
        let updated = Task {
            title,
            tags,
            ..self.tasks[position].clone()
        };
        self.store.save_task(&updated)?;

        info!(code = %code, "task updated");
        self.tasks[position] = updated;
        Ok(())
    }

    /// Opens a booking on `code`, closing the previously active task's
    /// booking first. Clocking into the already active task changes nothing.
    pub fn clock_into(&mut self, code: &str, now: DateTime<Utc>) -> Result<(), LedgerError> {
        let target = self.position(code)?;
        if self.active_code.as_deref() == Some(code) {
            debug!(code = %code, "task is already active");
            return Ok(());
        }

        let mut changes = Vec::with_capacity(2);
        if let Some(previous) = self.active_position() {
            if let Some(closed) = self.tasks[previous].stopped(now) {
                changes.push((previous, closed));
            }
        }
        changes.push((target, self.tasks[target].started(now)));

        self.commit(changes, Some(code.to_string()))?;
        info!(code = %code, "clocked in");
        Ok(())
    }

    pub fn clock_out_of(&mut self, code: &str, now: DateTime<Utc>) -> Result<(), LedgerError> {
        let position = self.position(code)?;
        if self.active_code.as_deref() != Some(code) {
            return Err(LedgerError::NotClockedIn(code.to_string()));
        }

        let closed = self.tasks[position]
            .stopped(now)
            .ok_or_else(|| LedgerError::NotClockedIn(code.to_string()))?;

        self.commit(vec![(position, closed)], None)?;
        info!(code = %code, "clocked out");
        Ok(())
    }

    fn position(&self, code: &str) -> Result<usize, LedgerError> {
        self.index
            .get(code)
            .copied()
            .ok_or_else(|| LedgerError::TaskNotFound(code.to_string()))
    }

    fn active_position(&self) -> Option<usize> {
        self.active_code
            .as_deref()
            .and_then(|code| self.index.get(code).copied())
    }

    /// Writes the changed tasks and the active marker, then applies them in
    /// memory. On a failed write nothing is applied and earlier writes of this
    /// call are reverted.
    fn commit(
        &mut self,
        changes: Vec<(usize, Task)>,
        active_code: Option<String>,
    ) -> Result<(), LedgerError> {
        let mut written = 0;
        let mut result = Ok(());
        for (_, task) in &changes {
            if let Err(err) = self.store.save_task(task) {
                result = Err(err);
                break;
            }
            written += 1;
        }
        if result.is_ok() {
            result = self.store.save_active_code(active_code.as_deref());
        }

        if let Err(err) = result {
            self.revert(&changes[..written]);
            return Err(err.into());
        }

        for (position, task) in changes {
            self.tasks[position] = task;
        }
        self.active_code = active_code;
        Ok(())
    }

    fn revert(&mut self, written: &[(usize, Task)]) {
        for (position, _) in written {
            let original = &self.tasks[*position];
            if let Err(err) = self.store.save_task(original) {
                warn!(code = %original.code, error = %err, "failed to restore task after write error");
            }
        }
        if !written.is_empty() {
            let active = self.active_code.clone();
            if let Err(err) = self.store.save_active_code(active.as_deref()) {
                warn!(error = %err, "failed to restore active code after write error");
            }
        }
    }
}

/// The running task whose open booking started last.
fn latest_running(tasks: &[Task]) -> Option<String> {
    let task = tasks
        .iter()
        .filter(|task| task.is_running())
        .max_by_key(|task| task.bookings.last().and_then(|booking| booking.start))?;
    info!(code = %task.code, "adopting running task as active");
    Some(task.code.clone())
}

/// Closes every open booking of `task` except its last one when
/// `keep_running` is set. A booking stops where the next one starts, else at
/// `fallback`, and never before its own start. `None` when nothing changed.
fn close_stray_bookings(
    task: &Task,
    keep_running: bool,
    fallback: Option<DateTime<Utc>>,
) -> Option<Task> {
    let mut repaired = task.clone();
    let last = repaired.bookings.len().saturating_sub(1);
    let mut changed = false;
    for position in 0..repaired.bookings.len() {
        if !repaired.bookings[position].is_open() || (keep_running && position == last) {
            continue;
        }
        let next_start = repaired
            .bookings
            .get(position + 1)
            .and_then(|booking| booking.start);
        let start = repaired.bookings[position].start;
        repaired.bookings[position].stop = next_start.or(fallback).max(start);
        changed = true;
    }
    changed.then_some(repaired)
}
