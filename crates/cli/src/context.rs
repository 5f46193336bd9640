use std::path::{Path, PathBuf};

use autoattach::{JsonFileStore, SettingsManager, default_settings_path};

use crate::error::{CliError, Result};
use crate::output::OutputFormat;

/// Flags shared by every command.
#[derive(Debug, Clone)]
pub struct CommandContext {
	pub format: OutputFormat,
	settings_path: Option<PathBuf>,
	project_root: Option<PathBuf>,
}

impl CommandContext {
	pub fn new(format: OutputFormat, settings: Option<PathBuf>, project: Option<PathBuf>, no_project: bool) -> Self {
		let project_root = if no_project {
			None
		} else {
			project.or_else(|| std::env::current_dir().ok())
		};
		Self {
			format,
			settings_path: settings.or_else(default_settings_path),
			project_root,
		}
	}

	pub fn project_root(&self) -> Option<&Path> {
		self.project_root.as_deref()
	}

	pub fn settings_path(&self) -> Result<&Path> {
		self.settings_path.as_deref().ok_or(CliError::NoSettingsPath)
	}

	pub fn settings_store(&self) -> Result<JsonFileStore> {
		Ok(JsonFileStore::load(self.settings_path()?.to_path_buf()))
	}

	pub fn settings_manager(&self) -> Result<SettingsManager> {
		Ok(SettingsManager::load(Box::new(self.settings_store()?)))
	}
}
