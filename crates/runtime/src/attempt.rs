//! Per-cycle attempt state shared by the retry loop and its watchdog.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How an attach cycle resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachOutcome {
	/// A `start session` call succeeded.
	Attached,
	/// A session was already active when the loop checked.
	AlreadyActive,
	/// The pre-flight probe failed; no attempts were made.
	Unreachable,
	/// The overall timeout elapsed without success.
	TimedOut,
	/// The watchdog ceiling fired first.
	WatchdogAbort,
	/// The cycle was cancelled from outside (disabled or superseded).
	Cancelled,
}

impl AttachOutcome {
	/// True when the cycle ended with a session attached.
	pub fn is_attached(self) -> bool {
		matches!(self, AttachOutcome::Attached | AttachOutcome::AlreadyActive)
	}
}

/// Live state of one in-flight attach cycle.
///
/// Clones share state. The outcome can be set once; whichever side sets it
/// owns every side effect of the resolution, and setting it also interrupts
/// anything awaiting [`interrupted`](Self::interrupted).
#[derive(Debug, Clone)]
pub struct AttachAttempt {
	inner: Arc<AttemptInner>,
}

#[derive(Debug)]
struct AttemptInner {
	started: Instant,
	token: CancellationToken,
	outcome: OnceLock<AttachOutcome>,
}

impl AttachAttempt {
	/// Starts the clock. Cancelling `token` interrupts the attempt without resolving it.
	pub fn begin(token: CancellationToken) -> Self {
		Self {
			inner: Arc::new(AttemptInner {
				started: Instant::now(),
				token,
				outcome: OnceLock::new(),
			}),
		}
	}

	pub fn elapsed(&self) -> Duration {
		self.inner.started.elapsed()
	}

	/// Claims the resolution. Returns false if another side already resolved.
	pub fn resolve(&self, outcome: AttachOutcome) -> bool {
		let won = self.inner.outcome.set(outcome).is_ok();
		self.inner.token.cancel();
		won
	}

	pub fn outcome(&self) -> Option<AttachOutcome> {
		self.inner.outcome.get().copied()
	}

	/// True once resolved or cancelled from outside.
	pub fn is_interrupted(&self) -> bool {
		self.inner.token.is_cancelled()
	}

	/// Completes once resolved or cancelled from outside.
	pub async fn interrupted(&self) {
		self.inner.token.cancelled().await
	}
}
