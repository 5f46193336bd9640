//! Launch file format and attach-target selection.
//!
//! A launch file is a JSON object with a top-level `configurations` array.
//! The first entry carrying every key in [`REQUIRED_KEYS`] becomes the
//! attach target; everything else in the file is ignored.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Host used when a configuration omits `host`.
pub const DEFAULT_HOST: &str = "localhost";

/// Port used when a configuration omits `port`.
pub const DEFAULT_PORT: u16 = 9229;

/// Keys an entry must carry to qualify as a debug configuration.
pub const REQUIRED_KEYS: [&str; 3] = ["type", "name", "request"];

/// A selected attach target.
///
/// `type`, `name` and `request` are opaque discriminators understood by the
/// debug host. Adapter-specific keys are kept in [`extra`](Self::extra) so the
/// whole entry can be forwarded as attach arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugConfiguration {
	#[serde(rename = "type")]
	pub kind: String,
	pub name: String,
	pub request: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub host: Option<String>,
	#[serde(default, deserialize_with = "port_from_number_or_string", skip_serializing_if = "Option::is_none")]
	pub port: Option<u16>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl DebugConfiguration {
	/// Builds a configuration with only the required keys set.
	pub fn new(kind: impl Into<String>, name: impl Into<String>, request: impl Into<String>) -> Self {
		Self {
			kind: kind.into(),
			name: name.into(),
			request: request.into(),
			host: None,
			port: None,
			extra: Map::new(),
		}
	}

	/// Sets the target host.
	pub fn with_host(mut self, host: impl Into<String>) -> Self {
		self.host = Some(host.into());
		self
	}

	/// Sets the target port.
	pub fn with_port(mut self, port: u16) -> Self {
		self.port = Some(port);
		self
	}

	/// Target host, falling back to [`DEFAULT_HOST`] when absent or empty.
	pub fn host(&self) -> &str {
		match self.host.as_deref() {
			Some(host) if !host.is_empty() => host,
			_ => DEFAULT_HOST,
		}
	}

	/// Target port, falling back to [`DEFAULT_PORT`] when absent or zero.
	pub fn port(&self) -> u16 {
		self.port.filter(|port| *port != 0).unwrap_or(DEFAULT_PORT)
	}

	/// `host:port` as shown in status lines.
	pub fn address(&self) -> String {
		format!("{}:{}", self.host(), self.port())
	}
}

/// On-disk launch file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaunchFile {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub configurations: Option<Vec<Value>>,
}

impl LaunchFile {
	/// Parses launch file text. A leading byte-order mark is tolerated.
	pub fn parse(text: &str) -> serde_json::Result<Self> {
		serde_json::from_str(text.trim_start_matches('\u{feff}'))
	}

	/// Returns the first qualifying entry as a configuration.
	///
	/// Entries that carry the required keys but whose values are not strings
	/// (or whose port is not a valid port) are skipped.
	pub fn select(&self) -> Option<DebugConfiguration> {
		self.configurations
			.iter()
			.flatten()
			.filter(|entry| is_qualifying(entry))
			.find_map(|entry| serde_json::from_value(entry.clone()).ok())
	}
}

/// Returns true when `entry` is an object whose keys include [`REQUIRED_KEYS`].
pub fn is_qualifying(entry: &Value) -> bool {
	entry
		.as_object()
		.is_some_and(|object| REQUIRED_KEYS.iter().all(|key| object.contains_key(*key)))
}

fn port_from_number_or_string<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
	D: Deserializer<'de>,
{
	use serde::de::Error;

	match Option::<Value>::deserialize(deserializer)? {
		None | Some(Value::Null) => Ok(None),
		Some(Value::Number(n)) => n
			.as_u64()
			.and_then(|n| u16::try_from(n).ok())
			.map(Some)
			.ok_or_else(|| D::Error::custom(format!("port out of range: {n}"))),
		Some(Value::String(s)) => s
			.trim()
			.parse::<u16>()
			.map(Some)
			.map_err(|_| D::Error::custom(format!("invalid port: {s:?}"))),
		Some(other) => Err(D::Error::custom(format!("invalid port: {other}"))),
	}
}
