use serde_json::json;
use thiserror::Error;

use crate::output::ErrorCode;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	AutoAttach(#[from] autoattach::Error),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("No settings location available; pass --settings <FILE>")]
	NoSettingsPath,

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;

impl CliError {
	pub fn code(&self) -> ErrorCode {
		match self {
			CliError::AutoAttach(err) => match err {
				autoattach::Error::ConfigurationMissing | autoattach::Error::NoConfigurationForRestart => ErrorCode::ConfigurationMissing,
				autoattach::Error::FileNotFound { .. } => ErrorCode::FileNotFound,
				autoattach::Error::FileInvalid { .. } => ErrorCode::FileInvalid,
				autoattach::Error::HostUnreachable { .. } => ErrorCode::HostUnreachable,
				autoattach::Error::SessionStartTimeout { .. } | autoattach::Error::WatchdogAbort => ErrorCode::Timeout,
				autoattach::Error::InvalidSetting { .. } | autoattach::Error::Cycle(_) => ErrorCode::InvalidInput,
				autoattach::Error::Io(_) => ErrorCode::IoError,
				autoattach::Error::Json(_) => ErrorCode::ProtocolError,
			},
			CliError::Io(_) => ErrorCode::IoError,
			CliError::NoSettingsPath => ErrorCode::ConfigurationMissing,
			CliError::Anyhow(_) => ErrorCode::InternalError,
		}
	}

	/// Structured context for the error envelope.
	pub fn details(&self) -> Option<serde_json::Value> {
		match self {
			CliError::AutoAttach(autoattach::Error::FileNotFound { path } | autoattach::Error::FileInvalid { path, .. }) => {
				Some(json!({ "path": path }))
			}
			CliError::AutoAttach(autoattach::Error::HostUnreachable { address }) => Some(json!({ "address": address })),
			CliError::AutoAttach(autoattach::Error::InvalidSetting { key }) => Some(json!({ "key": key })),
			_ => None,
		}
	}
}
