//! Hard ceiling on a single attach cycle.
//!
//! The retry loop has its own deadline, but it can only check it between
//! attempts. A `start session` call that never returns would stall the loop
//! forever; the watchdog fires independently of the loop, stops whatever the
//! debug host is doing and resolves the attempt as failed.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::STATUS_UNABLE_TO_ATTACH;
use crate::attempt::{AttachAttempt, AttachOutcome};
use crate::host::{DebugHost, NoticeLevel, StatusReporter};

/// Default ceiling, independent of the caller's overall timeout.
pub const WATCHDOG_CEILING: Duration = Duration::from_millis(5000);

/// Error notice emitted when the watchdog fires.
pub const WATCHDOG_MESSAGE: &str =
	"Unable to start debugging session. Please restart your debug server to clear out any open connection attempts and try again";

/// Armed watchdog for one attempt. Fires at most once.
#[derive(Debug)]
pub struct Watchdog {
	disarm: CancellationToken,
	handle: JoinHandle<()>,
}

impl Watchdog {
	/// Spawns a timer that resolves `attempt` as [`AttachOutcome::WatchdogAbort`]
	/// after `ceiling` unless disarmed or resolved first.
	pub fn arm(ceiling: Duration, attempt: AttachAttempt, host: Arc<dyn DebugHost>, reporter: Arc<dyn StatusReporter>) -> Self {
		let disarm = CancellationToken::new();
		let token = disarm.clone();
		let handle = tokio::spawn(async move {
			tokio::select! {
				biased;
				_ = token.cancelled() => {}
				_ = attempt.interrupted() => {}
				_ = tokio::time::sleep(ceiling) => fire(&attempt, ceiling, host.as_ref(), reporter.as_ref()),
			}
		});
		Self { disarm, handle }
	}

	/// Cancels the timer. No-op if it already fired or was disarmed.
	pub fn disarm(&self) {
		self.disarm.cancel();
	}

	/// True once the timer task has finished, fired or not.
	pub fn is_finished(&self) -> bool {
		self.handle.is_finished()
	}
}

impl Drop for Watchdog {
	fn drop(&mut self) {
		self.disarm.cancel();
	}
}

fn fire(attempt: &AttachAttempt, ceiling: Duration, host: &dyn DebugHost, reporter: &dyn StatusReporter) {
	if !attempt.resolve(AttachOutcome::WatchdogAbort) {
		debug!(target = "autoattach.watchdog", "attempt already resolved; watchdog stands down");
		return;
	}

	warn!(
		target = "autoattach.watchdog",
		ceiling_ms = ceiling.as_millis() as u64,
		"attach attempt exceeded ceiling; stopping debug host"
	);
	host.stop_session();
	reporter.notify(NoticeLevel::Error, WATCHDOG_MESSAGE);
	reporter.status(STATUS_UNABLE_TO_ATTACH);
}
