use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use autoattach_runtime::{AttachOutcome, CycleError, NoticeLevel, watchdog::WATCHDOG_MESSAGE};
use thiserror::Error;

/// Why a launch file was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidLaunchFile {
	/// The file is not valid JSON.
	Malformed,
	/// No entry in `configurations` carries `type`, `name` and `request`.
	NoSuitableConfiguration,
}

impl fmt::Display for InvalidLaunchFile {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			InvalidLaunchFile::Malformed => write!(f, "Invalid JSON in launch.json file."),
			InvalidLaunchFile::NoSuitableConfiguration => write!(f, "No suitable debug configuration found in launch.json."),
		}
	}
}

/// Failures surfaced to the user. `Display` is the message shown.
///
/// None of these is fatal; each leaves the orchestrator ready for the next
/// trigger.
#[derive(Debug, Error)]
pub enum Error {
	#[error("Please open a folder to set a launch configuration.")]
	ConfigurationMissing,

	#[error("Failed to read {}. Please select a valid config file", path.display())]
	FileNotFound { path: PathBuf },

	#[error("{reason}")]
	FileInvalid { path: PathBuf, reason: InvalidLaunchFile },

	#[error("{address} is not reachable")]
	HostUnreachable { address: String },

	#[error("Unable to Attach: no debug session started within {}ms", timeout.as_millis())]
	SessionStartTimeout { timeout: Duration },

	#[error("{}", WATCHDOG_MESSAGE)]
	WatchdogAbort,

	#[error("No suitable debug configuration found. Please set Launch Configuration.")]
	NoConfigurationForRestart,

	#[error("{key} must be a positive number of milliseconds")]
	InvalidSetting { key: &'static str },

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Cycle(#[from] CycleError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
	/// Error describing a failed attach outcome, or `None` for outcomes that
	/// are not failures.
	pub fn from_outcome(outcome: AttachOutcome, address: String, timeout: Duration) -> Option<Self> {
		match outcome {
			AttachOutcome::Unreachable => Some(Error::HostUnreachable { address }),
			AttachOutcome::TimedOut => Some(Error::SessionStartTimeout { timeout }),
			AttachOutcome::WatchdogAbort => Some(Error::WatchdogAbort),
			AttachOutcome::Attached | AttachOutcome::AlreadyActive | AttachOutcome::Cancelled => None,
		}
	}

	/// Severity used when the error is shown as a notification.
	pub fn level(&self) -> NoticeLevel {
		match self {
			Error::ConfigurationMissing => NoticeLevel::Warning,
			_ => NoticeLevel::Error,
		}
	}

	/// Stable machine-readable code.
	pub fn code(&self) -> &'static str {
		match self {
			Error::ConfigurationMissing => "CONFIGURATION_MISSING",
			Error::FileNotFound { .. } => "FILE_NOT_FOUND",
			Error::FileInvalid { .. } => "FILE_INVALID",
			Error::HostUnreachable { .. } => "HOST_UNREACHABLE",
			Error::SessionStartTimeout { .. } => "SESSION_START_TIMEOUT",
			Error::WatchdogAbort => "WATCHDOG_ABORT",
			Error::NoConfigurationForRestart => "NO_CONFIGURATION_FOR_RESTART",
			Error::InvalidSetting { .. } | Error::Cycle(_) => "INVALID_SETTING",
			Error::Io(_) => "IO_ERROR",
			Error::Json(_) => "JSON_ERROR",
		}
	}
}
