use std::path::PathBuf;

use autoattach::{DebugConfiguration, Settings};
use serde::{Deserialize, Serialize};

/// Result data for `config` commands.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigData {
	pub settings_path: PathBuf,
	pub settings: Settings,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub launch_path: Option<PathBuf>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub configuration: Option<DebugConfiguration>,
	/// Why the selected launch file could not be used, if it could not.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub launch_error: Option<String>,
}

/// Result data for `probe`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeData {
	pub host: String,
	pub port: u16,
	pub reachable: bool,
	pub elapsed_ms: u64,
}
