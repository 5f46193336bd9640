//! Collaborator contracts consumed by the attach engine.

use async_trait::async_trait;
use autoattach_protocol::DebugConfiguration;
use tokio::sync::broadcast;

/// Change in the debug host's active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
	/// A session became active.
	Started { name: String },
	/// The active session went away.
	Ended,
}

/// The debugger client that actually owns sessions.
#[async_trait]
pub trait DebugHost: Send + Sync {
	/// Returns true while a session is active.
	fn has_active_session(&self) -> bool;

	/// Starts a session for `config`, resolving to whether it succeeded.
	async fn start_session(&self, config: &DebugConfiguration) -> bool;

	/// Stops any active or in-progress session. Fire-and-forget.
	fn stop_session(&self);

	/// Subscribes to active-session changes.
	fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
	Info,
	Warning,
	Error,
}

/// Receives short human-readable status for display.
pub trait StatusReporter: Send + Sync {
	/// Replaces the persistent status line.
	fn status(&self, text: &str);

	/// Shows a one-off notification.
	fn notify(&self, level: NoticeLevel, message: &str);
}
