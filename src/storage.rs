use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::domain::Task;

pub const ACTIVE_CODE_FILENAME: &str = "activeCode";
pub const TASKS_FOLDER: &str = "tasks";
const TASK_EXTENSION: &str = "toml";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse task file {path}: {source}")]
    TomlDecode {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to encode task {code}: {source}")]
    TomlEncode {
        code: String,
        #[source]
        source: toml::ser::Error,
    },
    #[error("{0} doesn't match the filename pattern {{code}}.toml")]
    InvalidFileName(PathBuf),
    #[error("task code {0:?} cannot be used as a file name")]
    InvalidCode(String),
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Durable home of the ledger. Every call is a complete write or read.
pub trait Persistence {
    fn load_all(&self) -> Result<Vec<Task>, StorageError>;
    fn save_task(&mut self, task: &Task) -> Result<(), StorageError>;
    fn load_active_code(&self) -> Result<Option<String>, StorageError>;
    fn save_active_code(&mut self, code: Option<&str>) -> Result<(), StorageError>;
}

/// One TOML file per task below `<root>/tasks`, plus a plain-text marker
/// holding the active task code.
#[derive(Debug, Clone)]
pub struct FolderStore {
    root: PathBuf,
}

impl FolderStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn tasks_folder(&self) -> PathBuf {
        self.root.join(TASKS_FOLDER)
    }

    fn task_path(&self, code: &str) -> Result<PathBuf, StorageError> {
        if !is_valid_code(code) {
            return Err(StorageError::InvalidCode(code.to_string()));
        }
        Ok(self.tasks_folder().join(format!("{code}.{TASK_EXTENSION}")))
    }

    fn load_task(&self, path: &Path) -> Result<Task, StorageError> {
        let code = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| StorageError::InvalidFileName(path.to_path_buf()))?
            .to_string();
        let raw = fs::read_to_string(path).map_err(|err| StorageError::io(path, err))?;
        let mut task: Task = toml::from_str(&raw).map_err(|source| StorageError::TomlDecode {
            path: path.to_path_buf(),
            source,
        })?;
        task.code = code;
        Ok(task)
    }
}

impl Persistence for FolderStore {
    fn load_all(&self) -> Result<Vec<Task>, StorageError> {
        let folder = self.tasks_folder();
        let entries = match fs::read_dir(&folder) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StorageError::io(&folder, err)),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| StorageError::io(&folder, err))?.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(TASK_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut tasks = Vec::with_capacity(paths.len());
        for path in paths {
            debug!(path = %path.display(), "loading task");
            tasks.push(self.load_task(&path)?);
        }
        Ok(tasks)
    }

    fn save_task(&mut self, task: &Task) -> Result<(), StorageError> {
        let path = self.task_path(&task.code)?;
        let folder = self.tasks_folder();
        fs::create_dir_all(&folder).map_err(|err| StorageError::io(&folder, err))?;

        let encoded = toml::to_string_pretty(task).map_err(|source| StorageError::TomlEncode {
            code: task.code.clone(),
            source,
        })?;
        fs::write(&path, encoded).map_err(|err| StorageError::io(&path, err))
    }

    fn load_active_code(&self) -> Result<Option<String>, StorageError> {
        let path = self.root.join(ACTIVE_CODE_FILENAME);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::io(&path, err)),
        };

        let code = raw.trim();
        if code.is_empty() {
            Ok(None)
        } else {
            Ok(Some(code.to_string()))
        }
    }

    fn save_active_code(&mut self, code: Option<&str>) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).map_err(|err| StorageError::io(&self.root, err))?;
        let path = self.root.join(ACTIVE_CODE_FILENAME);
        fs::write(&path, code.unwrap_or_default()).map_err(|err| StorageError::io(&path, err))
    }
}

pub fn is_valid_code(code: &str) -> bool {
    !code.is_empty()
        && code != "."
        && code != ".."
        && !code
            .chars()
            .any(|ch| ch == '/' || ch == '\\' || ch.is_whitespace() || ch.is_control())
}

#[cfg(test)]
pub use memory::MemoryStore;

#[cfg(test)]
mod memory {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::{Persistence, StorageError};
    use crate::domain::Task;

    #[derive(Debug, Default)]
    pub struct MemoryState {
        pub tasks: Vec<Task>,
        pub active_code: Option<String>,
        pub fail_writes: bool,
        pub fail_code: Option<String>,
        pub writes: usize,
    }

    /// Test double whose state stays observable after the ledger takes
    /// ownership of the store.
    #[derive(Debug, Clone, Default)]
    pub struct MemoryStore {
        pub state: Rc<RefCell<MemoryState>>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_fail_writes(&self, fail: bool) {
            self.state.borrow_mut().fail_writes = fail;
        }

        /// Makes writes of the task named `code` fail while others succeed.
        pub fn fail_writes_for(&self, code: &str) {
            self.state.borrow_mut().fail_code = Some(code.to_string());
        }

        pub fn stored_task(&self, code: &str) -> Option<Task> {
            self.state
                .borrow()
                .tasks
                .iter()
                .find(|task| task.code == code)
                .cloned()
        }

        pub fn stored_active_code(&self) -> Option<String> {
            self.state.borrow().active_code.clone()
        }

        fn check_writable(&self, code: Option<&str>) -> Result<(), StorageError> {
            let state = self.state.borrow();
            if state.fail_writes || (code.is_some() && state.fail_code.as_deref() == code) {
                return Err(StorageError::Io {
                    path: "memory".into(),
                    source: std::io::Error::other("disk full"),
                });
            }
            Ok(())
        }
    }

    impl Persistence for MemoryStore {
        fn load_all(&self) -> Result<Vec<Task>, StorageError> {
            Ok(self.state.borrow().tasks.clone())
        }

        fn save_task(&mut self, task: &Task) -> Result<(), StorageError> {
            self.check_writable(Some(&task.code))?;
            let mut state = self.state.borrow_mut();
            state.writes += 1;
            match state.tasks.iter_mut().find(|stored| stored.code == task.code) {
                Some(stored) => *stored = task.clone(),
                None => state.tasks.push(task.clone()),
            }
            Ok(())
        }

        fn load_active_code(&self) -> Result<Option<String>, StorageError> {
            Ok(self.state.borrow().active_code.clone())
        }

        fn save_active_code(&mut self, code: Option<&str>) -> Result<(), StorageError> {
            self.check_writable(None)?;
            let mut state = self.state.borrow_mut();
            state.writes += 1;
            state.active_code = code.map(str::to_string);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::{TimeZone, Utc};

    use super::{FolderStore, Persistence, StorageError, TASKS_FOLDER};
    use crate::domain::{Booking, Task};

    #[test]
    fn round_trips_tasks_and_active_code() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut store = FolderStore::new(dir.path());

        let mut task = Task::new("ABC-1", "Write docs", vec!["offline".to_string()]);
        task.bookings.push(Booking {
            start: Some(Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap()),
            stop: Some(Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap()),
        });
        task.bookings
            .push(Booking::open(Utc.with_ymd_and_hms(2026, 1, 1, 11, 0, 0).unwrap()));

        store.save_task(&task).expect("save should succeed");
        store
            .save_active_code(Some("ABC-1"))
            .expect("save active code should succeed");

        let loaded = store.load_all().expect("load should succeed");
        assert_eq!(loaded, vec![task]);
        assert_eq!(
            store.load_active_code().expect("load active code"),
            Some("ABC-1".to_string())
        );

        store.save_active_code(None).expect("clear active code");
        assert_eq!(store.load_active_code().expect("load active code"), None);
    }

    #[test]
    fn writes_unset_timestamps_as_empty_strings() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut store = FolderStore::new(dir.path());
        let task = Task::new("a", "", Vec::new())
            .started(Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap());
        store.save_task(&task).expect("save should succeed");

        let raw = fs::read_to_string(dir.path().join(TASKS_FOLDER).join("a.toml"))
            .expect("task file exists");
        assert!(raw.contains("start = \"2026-01-01T09:00:00Z\""), "{raw}");
        assert!(raw.contains("stop = \"\""), "{raw}");
    }

    #[test]
    fn code_is_taken_from_file_name() {
        let dir = tempfile::tempdir().expect("temp dir");
        let folder = dir.path().join(TASKS_FOLDER);
        fs::create_dir_all(&folder).expect("create tasks folder");
        fs::write(
            folder.join("XYZ-9.toml"),
            "code = \"stale\"\ntitle = \"Review\"\ntags = []\n\n[[bookings]]\nstart = \"2026-01-01T09:00:00+01:00\"\nstop = \"\"\n",
        )
        .expect("write task file");

        let store = FolderStore::new(dir.path());
        let tasks = store.load_all().expect("load should succeed");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].code, "XYZ-9");
        assert_eq!(
            tasks[0].bookings[0].start,
            Some(Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap())
        );
        assert!(tasks[0].is_running());
    }

    #[test]
    fn missing_store_is_empty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = FolderStore::new(dir.path().join("nothing-here"));
        assert!(store.load_all().expect("load").is_empty());
        assert_eq!(store.load_active_code().expect("load active code"), None);
    }

    #[test]
    fn rejects_codes_that_are_not_file_names() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut store = FolderStore::new(dir.path());
        let err = store
            .save_task(&Task::new("../escape", "", Vec::new()))
            .expect_err("path separators are rejected");
        assert!(matches!(err, StorageError::InvalidCode(_)));
    }
}
