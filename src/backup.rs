use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, FixedOffset};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

const RESTIC_BINARY: &str = "restic";
const PASSWORD_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backups are not available: restic was not found in PATH")]
    Unavailable,
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to run restic {command}: {source}")]
    Spawn {
        command: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("restic {command} failed: {stderr}")]
    Failed {
        command: &'static str,
        stderr: String,
    },
    #[error("failed to parse restic snapshot list: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0} is a directory and not a file")]
    PasswordFileIsDirectory(PathBuf),
    #[error("{0} is not a directory")]
    RepositoryNotDirectory(PathBuf),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "time")]
    pub raw_time: String,
    pub id: String,
}

impl Snapshot {
    pub fn time(&self) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(&self.raw_time)
    }

    pub fn label(&self) -> String {
        match self.time() {
            Ok(time) => time.format("%A, %d-%b-%y %H:%M:%S %:z").to_string(),
            Err(err) => format!("<Error: {err}>"),
        }
    }
}

/// Point-in-time copies of the store folder.
pub trait SnapshotStore {
    fn available(&mut self) -> bool;
    fn create_snapshot(&mut self) -> Result<(), BackupError>;
    fn restore(&mut self, id: &str) -> Result<(), BackupError>;
    fn snapshots(&mut self) -> Result<Vec<Snapshot>, BackupError>;
}

#[derive(Debug, Clone, Default)]
pub struct BackupOptions {
    pub source_path: PathBuf,
    pub repository_path: Option<PathBuf>,
    pub password_file: Option<PathBuf>,
}

/// Shells out to restic. The repository defaults to `<source>_backups` and
/// the password file to `<source>/backups.passwd`.
#[derive(Debug, Clone)]
pub struct ResticBackup {
    source_path: PathBuf,
    repository_path: PathBuf,
    password_file: PathBuf,
    restic_path: Option<PathBuf>,
    created: bool,
}

impl ResticBackup {
    pub fn new(options: BackupOptions) -> Self {
        let source_path = options.source_path;
        let repository_path = options.repository_path.unwrap_or_else(|| {
            let mut raw = source_path.clone().into_os_string();
            raw.push("_backups");
            PathBuf::from(raw)
        });
        let password_file = options
            .password_file
            .unwrap_or_else(|| source_path.join("backups.passwd"));

        Self {
            source_path,
            repository_path,
            password_file,
            restic_path: None,
            created: false,
        }
    }

    /// True when `init` had to create a fresh repository.
    pub fn created(&self) -> bool {
        self.created
    }

    pub fn init(&mut self) -> Result<(), BackupError> {
        self.ensure_password_file()?;
        self.ensure_repository()
    }

    fn ensure_password_file(&self) -> Result<(), BackupError> {
        match fs::metadata(&self.password_file) {
            Ok(metadata) if metadata.is_dir() => Err(BackupError::PasswordFileIsDirectory(
                self.password_file.clone(),
            )),
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %self.password_file.display(), "creating backup password file");
                fs::write(&self.password_file, generate_password()).map_err(|source| {
                    BackupError::Io {
                        path: self.password_file.clone(),
                        source,
                    }
                })
            }
            Err(source) => Err(BackupError::Io {
                path: self.password_file.clone(),
                source,
            }),
        }
    }

    fn ensure_repository(&mut self) -> Result<(), BackupError> {
        match fs::metadata(&self.repository_path) {
            Ok(metadata) if !metadata.is_dir() => Err(BackupError::RepositoryNotDirectory(
                self.repository_path.clone(),
            )),
            Ok(_) if self.repository_path.join("config").exists() => Ok(()),
            Ok(_) => self.create_repository(),
            Err(err) if err.kind() == ErrorKind::NotFound => self.create_repository(),
            Err(source) => Err(BackupError::Io {
                path: self.repository_path.clone(),
                source,
            }),
        }
    }

    fn create_repository(&mut self) -> Result<(), BackupError> {
        info!(path = %self.repository_path.display(), "initializing backup repository");
        self.run("init", &[])?;
        self.created = true;
        Ok(())
    }

    fn run(&mut self, command: &'static str, args: &[&str]) -> Result<Vec<u8>, BackupError> {
        let restic = self.restic_path()?;
        debug!(command, ?args, "running restic");
        let output = Command::new(restic)
            .arg(command)
            .args(args)
            .env("RESTIC_REPOSITORY", &self.repository_path)
            .env("RESTIC_PASSWORD_FILE", &self.password_file)
            .output()
            .map_err(|source| BackupError::Spawn { command, source })?;

        if !output.status.success() {
            return Err(BackupError::Failed {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    fn restic_path(&mut self) -> Result<PathBuf, BackupError> {
        if self.available() {
            self.restic_path.clone().ok_or(BackupError::Unavailable)
        } else {
            Err(BackupError::Unavailable)
        }
    }
}

impl SnapshotStore for ResticBackup {
    fn available(&mut self) -> bool {
        if self.restic_path.is_none() {
            self.restic_path = find_in_path(RESTIC_BINARY);
        }
        self.restic_path.is_some()
    }

    fn create_snapshot(&mut self) -> Result<(), BackupError> {
        let source = self.source_path.to_string_lossy().into_owned();
        self.run("backup", &[source.as_str()])?;
        info!("snapshot created");
        Ok(())
    }

    fn restore(&mut self, id: &str) -> Result<(), BackupError> {
        let target = self
            .source_path
            .parent()
            .unwrap_or_else(|| Path::new("/"))
            .to_string_lossy()
            .into_owned();
        self.run("restore", &["--target", target.as_str(), id])?;
        info!(id, "snapshot restored");
        Ok(())
    }

    fn snapshots(&mut self) -> Result<Vec<Snapshot>, BackupError> {
        let stdout = self.run("snapshots", &["--json"])?;
        parse_snapshots(&stdout)
    }
}

/// Decodes `restic snapshots --json` output, newest first. Snapshots with an
/// unreadable time go last.
pub fn parse_snapshots(raw: &[u8]) -> Result<Vec<Snapshot>, BackupError> {
    let mut snapshots: Vec<Snapshot> = serde_json::from_slice(raw)?;
    snapshots.sort_by(|left, right| right.time().ok().cmp(&left.time().ok()));
    Ok(snapshots)
}

fn find_in_path(binary: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

fn generate_password() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LEN)
        .map(char::from)
        .collect()
}
