use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_FILENAME: &str = "config.toml";
const STORE_ENV: &str = "CLOCKED_STORE";
const JIRA_PASSWORD_ENV: &str = "CLOCKED_JIRA_PASSWORD";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("failed to parse config file {path}: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},
	#[error("no store folder: pass --store <path>, set CLOCKED_STORE, or set HOME")]
	NoStore,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub backups_path: Option<PathBuf>,
	#[serde(default)]
	pub jira: JiraConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JiraConfig {
	#[serde(default)]
	pub url: String,
	#[serde(default)]
	pub username: String,
	#[serde(default)]
	pub password: String,
}

impl JiraConfig {
	pub fn is_complete(&self) -> bool {
		!self.url.is_empty() && !self.username.is_empty() && !self.password.is_empty()
	}
}

impl Config {
	/// Reads `config.toml` from the store folder. A missing file yields the
	/// defaults.
	pub fn load(store: &Path) -> Result<Self, ConfigError> {
		let path = store.join(CONFIG_FILENAME);
		let mut config = match fs::read_to_string(&path) {
			Ok(raw) => toml::from_str(&raw).map_err(|source| ConfigError::Parse {
				path: path.clone(),
				source,
			})?,
			Err(err) if err.kind() == ErrorKind::NotFound => Config::default(),
			Err(source) => return Err(ConfigError::Read { path, source }),
		};

		if let Some(password) = env::var_os(JIRA_PASSWORD_ENV) {
			config.jira.password = password.to_string_lossy().into_owned();
		}

		Ok(config)
	}
}

pub fn resolve_store_path(cli_path: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
	if let Some(path) = cli_path {
		return Ok(absolutize(path));
	}

	if let Some(path) = env::var_os(STORE_ENV) {
		let path = PathBuf::from(path);
		if !path.as_os_str().is_empty() {
			return Ok(absolutize(path));
		}
	}

	if let Some(home) = env::var_os("HOME") {
		return Ok(PathBuf::from(home).join(".clocked"));
	}

	Err(ConfigError::NoStore)
}

pub fn ensure_store_folder(path: &Path) -> Result<(), std::io::Error> {
	fs::create_dir_all(path)
}

fn absolutize(path: PathBuf) -> PathBuf {
	let path = if path.is_absolute() {
		path
	} else if let Ok(cwd) = env::current_dir() {
		cwd.join(path)
	} else {
		path
	};

	if path.exists() {
		fs::canonicalize(&path).unwrap_or(path)
	} else {
		path
	}
}
