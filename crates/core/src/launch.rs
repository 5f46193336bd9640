//! Locating and loading the launch file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use autoattach_protocol::{DebugConfiguration, LaunchFile};
use tracing::debug;

use crate::error::{Error, InvalidLaunchFile, Result};

/// Directory under the project root that relative launch paths live in.
pub const LAUNCH_DIR: &str = ".vscode";

/// Resolves a configured launch path. Absolute paths are used as-is; relative
/// ones need a project root and resolve under [`LAUNCH_DIR`].
pub fn resolve_launch_path(configured: &str, project_root: Option<&Path>) -> Result<PathBuf> {
	let path = Path::new(configured);
	if path.is_absolute() {
		return Ok(path.to_path_buf());
	}
	let root = project_root.ok_or(Error::ConfigurationMissing)?;
	Ok(root.join(LAUNCH_DIR).join(path))
}

/// Reads `path` and selects its attach target.
pub async fn load_configuration(path: &Path) -> Result<DebugConfiguration> {
	let invalid = |reason| Error::FileInvalid {
		path: path.to_path_buf(),
		reason,
	};
	let text = tokio::fs::read_to_string(path).await.map_err(|err| {
		debug!(target = "autoattach.launch", path = %path.display(), error = %err, "launch file unreadable");
		match err.kind() {
			ErrorKind::NotFound => Error::FileNotFound { path: path.to_path_buf() },
			// Not UTF-8.
			ErrorKind::InvalidData => invalid(InvalidLaunchFile::Malformed),
			_ => Error::Io(err),
		}
	})?;

	let file = LaunchFile::parse(&text).map_err(|_| invalid(InvalidLaunchFile::Malformed))?;
	let config = file.select().ok_or_else(|| invalid(InvalidLaunchFile::NoSuitableConfiguration))?;

	debug!(target = "autoattach.launch", path = %path.display(), name = %config.name, address = %config.address(), "launch configuration selected");
	Ok(config)
}
