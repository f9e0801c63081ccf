use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::Granularity;
use crate::storage::StorageError;

const CONFIG_FILE: &str = "config.toml";
const APP_DIR: &str = "blocktime";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Used until a granularity has been chosen and persisted.
	pub default_granularity: Granularity,
	pub log_level: Option<String>,
}

/// Reads `config.toml` from the data directory, or the file named by
/// `BLOCKTIME_CONFIG`. A missing file yields the defaults.
pub fn load_config(data_dir: &Path) -> Result<Config, StorageError> {
	let path = match env::var_os("BLOCKTIME_CONFIG") {
		Some(path) if !path.is_empty() => PathBuf::from(path),
		_ => data_dir.join(CONFIG_FILE),
	};
	read_config(&path)
}

pub fn read_config(path: &Path) -> Result<Config, StorageError> {
	let raw = match fs::read_to_string(path) {
		Ok(raw) => raw,
		Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Config::default()),
		Err(err) => return Err(StorageError::Io(err)),
	};

	toml::from_str(&raw).map_err(StorageError::TomlDecode)
}

pub fn resolve_data_dir(cli_path: Option<PathBuf>) -> PathBuf {
	if let Some(path) = cli_path {
		return absolutize(path);
	}

	if let Some(path) = env::var_os("BLOCKTIME_DATA_DIR") {
		let path = PathBuf::from(path);
		if !path.as_os_str().is_empty() {
			return absolutize(path);
		}
	}

	default_data_dir()
}

fn default_data_dir() -> PathBuf {
	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("LOCALAPPDATA") {
			return PathBuf::from(path).join(APP_DIR);
		}
	}

	if let Some(path) = env::var_os("XDG_STATE_HOME") {
		return PathBuf::from(path).join(APP_DIR);
	}

	if let Some(path) = env::var_os("HOME") {
		return PathBuf::from(path)
			.join(".local")
			.join("state")
			.join(APP_DIR);
	}

	PathBuf::from(".blocktime")
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
