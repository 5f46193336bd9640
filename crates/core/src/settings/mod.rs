//! Durable auto-attach settings.
//!
//! Five values, each with a default: the launch file path, the enabled flag
//! and three millisecond durations. Values live in a [`SettingsStore`];
//! [`SettingsManager`] keeps a validated in-memory copy and writes through on
//! every change.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};


const SETTINGS_SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_LAUNCH_CONFIG_FILE: &str = "launch.json";
pub const DEFAULT_AUTO_ATTACH_ENABLED: bool = true;
pub const DEFAULT_START_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_AUTO_RESTART_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 500;

/// Persisted setting names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingKey {
	LaunchConfigFile,
	AutoAttachEnabled,
	StartTimeout,
	AutoRestartTimeout,
	RetryInterval,
}

impl SettingKey {
	pub const ALL: [SettingKey; 5] = [
		SettingKey::LaunchConfigFile,
		SettingKey::AutoAttachEnabled,
		SettingKey::StartTimeout,
		SettingKey::AutoRestartTimeout,
		SettingKey::RetryInterval,
	];

	/// Key as written to disk.
	pub fn as_str(self) -> &'static str {
		match self {
			SettingKey::LaunchConfigFile => "launchConfigFile",
			SettingKey::AutoAttachEnabled => "isAutoAttachEnabled",
			SettingKey::StartTimeout => "debugSessionStartTimeout",
			SettingKey::AutoRestartTimeout => "autoRestartTimeout",
			SettingKey::RetryInterval => "retryInterval",
		}
	}

	pub fn parse(name: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|key| key.as_str() == name)
	}
}

/// Key/value persistence for settings.
pub trait SettingsStore: Send + Sync {
	fn get(&self, key: SettingKey) -> Option<Value>;

	/// Stores `value` durably.
	fn set(&mut self, key: SettingKey, value: Value) -> Result<()>;
}

/// Effective settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
	#[serde(rename = "launchConfigFile")]
	pub launch_config_file: String,
	#[serde(rename = "isAutoAttachEnabled")]
	pub auto_attach_enabled: bool,
	#[serde(rename = "debugSessionStartTimeout")]
	pub start_timeout_ms: u64,
	#[serde(rename = "autoRestartTimeout")]
	pub auto_restart_timeout_ms: u64,
	#[serde(rename = "retryInterval")]
	pub retry_interval_ms: u64,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			launch_config_file: DEFAULT_LAUNCH_CONFIG_FILE.to_string(),
			auto_attach_enabled: DEFAULT_AUTO_ATTACH_ENABLED,
			start_timeout_ms: DEFAULT_START_TIMEOUT_MS,
			auto_restart_timeout_ms: DEFAULT_AUTO_RESTART_TIMEOUT_MS,
			retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
		}
	}
}

impl Settings {
	/// Reads every key from `store`. Missing, mistyped or non-positive values
	/// fall back to their defaults.
	pub fn load(store: &dyn SettingsStore) -> Self {
		let mut settings = Settings::default();
		for key in SettingKey::ALL {
			let Some(value) = store.get(key) else {
				continue;
			};
			if !settings.apply(key, &value) {
				warn!(target = "autoattach.settings", key = key.as_str(), %value, "ignoring invalid stored setting");
			}
		}
		settings
	}

	pub fn start_timeout(&self) -> Duration {
		Duration::from_millis(self.start_timeout_ms)
	}

	pub fn auto_restart_timeout(&self) -> Duration {
		Duration::from_millis(self.auto_restart_timeout_ms)
	}

	pub fn retry_interval(&self) -> Duration {
		Duration::from_millis(self.retry_interval_ms)
	}

	fn apply(&mut self, key: SettingKey, value: &Value) -> bool {
		match key {
			SettingKey::LaunchConfigFile => match value.as_str() {
				Some(path) if !path.is_empty() => self.launch_config_file = path.to_string(),
				_ => return false,
			},
			SettingKey::AutoAttachEnabled => match value.as_bool() {
				Some(enabled) => self.auto_attach_enabled = enabled,
				None => return false,
			},
			SettingKey::StartTimeout | SettingKey::AutoRestartTimeout | SettingKey::RetryInterval => {
				let Some(ms) = value.as_u64().filter(|ms| *ms > 0) else {
					return false;
				};
				*self.duration_mut(key) = ms;
			}
		}
		true
	}

	fn duration_mut(&mut self, key: SettingKey) -> &mut u64 {
		match key {
			SettingKey::AutoRestartTimeout => &mut self.auto_restart_timeout_ms,
			SettingKey::RetryInterval => &mut self.retry_interval_ms,
			_ => &mut self.start_timeout_ms,
		}
	}
}

/// Validated settings backed by a store.
pub struct SettingsManager {
	store: Box<dyn SettingsStore>,
	current: Settings,
}

impl SettingsManager {
	/// Loads settings from `store`, falling back to defaults per key.
	pub fn load(store: Box<dyn SettingsStore>) -> Self {
		let current = Settings::load(store.as_ref());
		Self { store, current }
	}

	/// Manager over a fresh [`MemoryStore`].
	pub fn in_memory() -> Self {
		Self::load(Box::new(MemoryStore::default()))
	}

	pub fn current(&self) -> &Settings {
		&self.current
	}

	pub fn store(&self) -> &dyn SettingsStore {
		self.store.as_ref()
	}

	pub fn set_launch_config_file(&mut self, path: &str) -> Result<()> {
		self.store.set(SettingKey::LaunchConfigFile, Value::from(path))?;
		self.current.launch_config_file = path.to_string();
		Ok(())
	}

	pub fn set_auto_attach_enabled(&mut self, enabled: bool) -> Result<()> {
		self.store.set(SettingKey::AutoAttachEnabled, Value::from(enabled))?;
		self.current.auto_attach_enabled = enabled;
		Ok(())
	}

	pub fn set_start_timeout(&mut self, ms: u64) -> Result<()> {
		self.set_duration(SettingKey::StartTimeout, ms)
	}

	pub fn set_auto_restart_timeout(&mut self, ms: u64) -> Result<()> {
		self.set_duration(SettingKey::AutoRestartTimeout, ms)
	}

	pub fn set_retry_interval(&mut self, ms: u64) -> Result<()> {
		self.set_duration(SettingKey::RetryInterval, ms)
	}

	fn set_duration(&mut self, key: SettingKey, ms: u64) -> Result<()> {
		if ms == 0 {
			return Err(Error::InvalidSetting { key: key.as_str() });
		}
		self.store.set(key, Value::from(ms))?;
		*self.current.duration_mut(key) = ms;
		debug!(target = "autoattach.settings", key = key.as_str(), ms, "setting updated");
		Ok(())
	}
}

/// In-process store. Nothing survives the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
	values: HashMap<SettingKey, Value>,
}

impl MemoryStore {
	pub fn with(mut self, key: SettingKey, value: impl Into<Value>) -> Self {
		self.values.insert(key, value.into());
		self
	}
}

impl SettingsStore for MemoryStore {
	fn get(&self, key: SettingKey) -> Option<Value> {
		self.values.get(&key).cloned()
	}

	fn set(&mut self, key: SettingKey, value: Value) -> Result<()> {
		self.values.insert(key, value);
		Ok(())
	}
}

/// On-disk format of a settings file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsFile {
	pub schema: u32,
	#[serde(default)]
	pub values: BTreeMap<String, Value>,
}

impl Default for SettingsFile {
	fn default() -> Self {
		Self {
			schema: SETTINGS_SCHEMA_VERSION,
			values: BTreeMap::new(),
		}
	}
}

/// Settings persisted as a JSON file, rewritten on every change.
#[derive(Debug)]
pub struct JsonFileStore {
	path: PathBuf,
	file: SettingsFile,
}

impl JsonFileStore {
	/// Loads `path`. A missing or unreadable file starts empty.
	pub fn load(path: PathBuf) -> Self {
		let file = match fs::read_to_string(&path) {
			Ok(content) => serde_json::from_str(&content).unwrap_or_else(|err| {
				warn!(target = "autoattach.settings", path = %path.display(), error = %err, "settings file is malformed; using defaults");
				SettingsFile::default()
			}),
			Err(_) => SettingsFile::default(),
		};
		Self { path, file }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn save(&self) -> Result<()> {
		write_settings(&self.path, &self.file)
	}
}

impl SettingsStore for JsonFileStore {
	fn get(&self, key: SettingKey) -> Option<Value> {
		self.file.values.get(key.as_str()).cloned()
	}

	/// Nothing changes in memory unless the write succeeds.
	fn set(&mut self, key: SettingKey, value: Value) -> Result<()> {
		let mut next = self.file.clone();
		next.schema = SETTINGS_SCHEMA_VERSION;
		next.values.insert(key.as_str().to_string(), value);
		write_settings(&self.path, &next)?;
		self.file = next;
		Ok(())
	}
}

fn write_settings(path: &Path, file: &SettingsFile) -> Result<()> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)?;
	}
	let json = serde_json::to_string_pretty(file)?;
	fs::write(path, json)?;
	Ok(())
}

/// `$XDG_CONFIG_HOME/autoattach/settings.json` or the platform equivalent.
pub fn default_settings_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join("autoattach").join("settings.json"))
}
