use std::time::Duration;

use thiserror::Error;

/// Errors raised while talking to a debug adapter.
#[derive(Debug, Error)]
pub enum RuntimeError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("debug adapter protocol violation: {0}")]
	Protocol(String),

	#[error("debug adapter rejected `{command}`: {message}")]
	Rejected { command: String, message: String },

	#[error("timed out after {}ms waiting for {what}", .after.as_millis())]
	Timeout { what: String, after: Duration },

	#[error("debug adapter closed the connection")]
	Closed,
}

/// Invalid input handed to an attach cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
	#[error("{field} must be a positive duration")]
	InvalidTiming { field: &'static str },
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
