//! The attach retry loop.
//!
//! One cycle optionally probes the target, then calls `start session` until
//! it succeeds, a session shows up on its own, the overall timeout elapses,
//! the watchdog fires, or the caller cancels. Attempts within a cycle are
//! strictly sequential and spaced by the retry interval.

use std::sync::Arc;
use std::time::Duration;

use autoattach_protocol::DebugConfiguration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::attempt::{AttachAttempt, AttachOutcome};
use crate::error::CycleError;
use crate::host::{DebugHost, StatusReporter};
use crate::probe::{ReachabilityProbe, TcpProbe};
use crate::watchdog::{WATCHDOG_CEILING, Watchdog};
use crate::{STATUS_ATTACHED, STATUS_UNABLE_TO_ATTACH};

/// Timing and gating for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachOptions {
	pub overall_timeout: Duration,
	pub retry_interval: Duration,
	/// Probe the target before spending any attempts on it.
	pub check_host: bool,
	pub watchdog_ceiling: Duration,
}

impl AttachOptions {
	pub fn new(overall_timeout: Duration, retry_interval: Duration) -> Self {
		Self {
			overall_timeout,
			retry_interval,
			check_host: true,
			watchdog_ceiling: WATCHDOG_CEILING,
		}
	}

	pub fn with_check_host(mut self, check_host: bool) -> Self {
		self.check_host = check_host;
		self
	}

	pub fn with_watchdog_ceiling(mut self, ceiling: Duration) -> Self {
		self.watchdog_ceiling = ceiling;
		self
	}

	/// Rejects zero durations.
	pub fn validate(&self) -> Result<(), CycleError> {
		for (field, value) in [
			("overall_timeout", self.overall_timeout),
			("retry_interval", self.retry_interval),
			("watchdog_ceiling", self.watchdog_ceiling),
		] {
			if value.is_zero() {
				return Err(CycleError::InvalidTiming { field });
			}
		}
		Ok(())
	}
}

/// Runs attach cycles against a debug host.
#[derive(Clone)]
pub struct AttachCycle {
	host: Arc<dyn DebugHost>,
	reporter: Arc<dyn StatusReporter>,
	probe: Arc<dyn ReachabilityProbe>,
}

impl AttachCycle {
	pub fn new(host: Arc<dyn DebugHost>, reporter: Arc<dyn StatusReporter>) -> Self {
		Self {
			host,
			reporter,
			probe: Arc::new(TcpProbe::default()),
		}
	}

	/// Replaces the reachability probe.
	pub fn with_probe(mut self, probe: Arc<dyn ReachabilityProbe>) -> Self {
		self.probe = probe;
		self
	}

	/// Runs one cycle to resolution.
	///
	/// Cancelling `cancel` turns the rest of the cycle into a no-op that
	/// resolves as [`AttachOutcome::Cancelled`] without touching status.
	pub async fn run(&self, config: &DebugConfiguration, options: &AttachOptions, cancel: CancellationToken) -> Result<AttachOutcome, CycleError> {
		options.validate()?;

		if options.check_host {
			let reachable = tokio::select! {
				biased;
				_ = cancel.cancelled() => return Ok(AttachOutcome::Cancelled),
				reachable = self.probe.probe(config.host(), config.port()) => reachable,
			};
			if !reachable {
				let address = config.address();
				info!(target = "autoattach.cycle", %address, "host not reachable; unable to attach debugger");
				self.reporter.status(&format!("{address} is not reachable"));
				return Ok(AttachOutcome::Unreachable);
			}
		}

		if cancel.is_cancelled() {
			return Ok(AttachOutcome::Cancelled);
		}

		self.reporter
			.status(&format!("Attempting to attach for {}ms", options.overall_timeout.as_millis()));

		let attempt = AttachAttempt::begin(cancel.child_token());
		let watchdog = Watchdog::arm(options.watchdog_ceiling, attempt.clone(), Arc::clone(&self.host), Arc::clone(&self.reporter));
		let outcome = self.poll(config, options, &attempt).await;
		watchdog.disarm();

		Ok(outcome)
	}

	async fn poll(&self, config: &DebugConfiguration, options: &AttachOptions, attempt: &AttachAttempt) -> AttachOutcome {
		let mut attempts = 0u32;
		loop {
			if self.host.has_active_session() {
				return self.settle(attempt, AttachOutcome::AlreadyActive, attempts);
			}
			if attempt.is_interrupted() {
				return self.settle(attempt, AttachOutcome::Cancelled, attempts);
			}
			if attempt.elapsed() >= options.overall_timeout {
				return self.settle(attempt, AttachOutcome::TimedOut, attempts);
			}

			attempts += 1;
			debug!(target = "autoattach.cycle", attempt = attempts, name = %config.name, "starting debug session");

			let started = tokio::select! {
				biased;
				_ = attempt.interrupted() => return self.settle(attempt, AttachOutcome::Cancelled, attempts),
				started = self.host.start_session(config) => started,
			};
			if started {
				return self.settle(attempt, AttachOutcome::Attached, attempts);
			}

			tokio::select! {
				biased;
				_ = attempt.interrupted() => return self.settle(attempt, AttachOutcome::Cancelled, attempts),
				_ = tokio::time::sleep(options.retry_interval) => {}
			}
		}
	}

	/// Claims the resolution and reports it. If the watchdog got there first
	/// its outcome is returned and nothing is reported.
	fn settle(&self, attempt: &AttachAttempt, outcome: AttachOutcome, attempts: u32) -> AttachOutcome {
		if !attempt.resolve(outcome) {
			return attempt.outcome().unwrap_or(AttachOutcome::Cancelled);
		}

		let elapsed_ms = attempt.elapsed().as_millis() as u64;
		match outcome {
			AttachOutcome::Attached => {
				info!(target = "autoattach.cycle", attempts, elapsed_ms, "debugging session started successfully");
				self.reporter.status(STATUS_ATTACHED);
			}
			AttachOutcome::AlreadyActive => {
				info!(target = "autoattach.cycle", attempts, elapsed_ms, "debugging session is already active");
				self.reporter.status(STATUS_ATTACHED);
			}
			AttachOutcome::TimedOut => {
				warn!(target = "autoattach.cycle", attempts, elapsed_ms, "overall timeout reached; unable to start debugging session");
				self.reporter.status(STATUS_UNABLE_TO_ATTACH);
			}
			AttachOutcome::Cancelled => {
				debug!(target = "autoattach.cycle", attempts, elapsed_ms, "attach cycle cancelled");
			}
			AttachOutcome::Unreachable | AttachOutcome::WatchdogAbort => {}
		}
		outcome
	}
}

#[cfg(test)]
mod tests {
	use tokio::time::Instant;

	use super::*;
	use crate::testing::{FakeDebugHost, RecordingReporter, StaticProbe};
	use crate::watchdog::WATCHDOG_MESSAGE;

	const INTERVAL: Duration = Duration::from_millis(500);

	struct Harness {
		host: Arc<FakeDebugHost>,
		reporter: Arc<RecordingReporter>,
		probe: Arc<StaticProbe>,
		cycle: AttachCycle,
	}

	fn harness(host: FakeDebugHost, reachable: bool) -> Harness {
		let host = Arc::new(host);
		let reporter = Arc::new(RecordingReporter::default());
		let probe = Arc::new(StaticProbe::new(reachable));
		let cycle = AttachCycle::new(host.clone(), reporter.clone()).with_probe(probe.clone());
		Harness { host, reporter, probe, cycle }
	}

	fn config() -> DebugConfiguration {
		DebugConfiguration::new("node", "Attach", "attach")
	}

	fn options(overall_ms: u64) -> AttachOptions {
		AttachOptions::new(Duration::from_millis(overall_ms), INTERVAL).with_check_host(false)
	}

	fn assert_near(actual: Duration, expected_ms: u64) {
		let expected = Duration::from_millis(expected_ms);
		assert!(actual >= expected && actual < expected + Duration::from_millis(20), "expected ~{expected:?}, got {actual:?}");
	}

	#[tokio::test(start_paused = true)]
	async fn succeeds_on_nth_attempt_spaced_by_interval() {
		let h = harness(FakeDebugHost::succeeds_on(3), true);

		let outcome = h.cycle.run(&config(), &options(30_000), CancellationToken::new()).await.unwrap();

		assert_eq!(outcome, AttachOutcome::Attached);
		let calls = h.host.call_times();
		assert_eq!(calls.len(), 3);
		for pair in calls.windows(2) {
			assert_near(pair[1] - pair[0], 500);
		}
		assert_eq!(h.reporter.statuses(), vec!["Attempting to attach for 30000ms".to_string(), STATUS_ATTACHED.to_string()]);
		assert_eq!(h.host.stop_count(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn never_succeeding_times_out_at_overall_deadline() {
		let h = harness(FakeDebugHost::never_succeeds(), true);
		let started = Instant::now();

		let outcome = h.cycle.run(&config(), &options(2_000), CancellationToken::new()).await.unwrap();

		assert_eq!(outcome, AttachOutcome::TimedOut);
		assert_near(started.elapsed(), 2_000);
		assert_eq!(h.host.call_count(), 4);
		assert_eq!(h.reporter.last_status().as_deref(), Some(STATUS_UNABLE_TO_ATTACH));
		assert!(h.reporter.errors().is_empty());
		assert_eq!(h.host.stop_count(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn watchdog_ceiling_wins_when_smaller_than_overall_timeout() {
		let h = harness(FakeDebugHost::never_succeeds(), true);
		let started = Instant::now();

		let outcome = h.cycle.run(&config(), &options(30_000), CancellationToken::new()).await.unwrap();

		assert_eq!(outcome, AttachOutcome::WatchdogAbort);
		assert_near(started.elapsed(), 5_000);
		assert_eq!(h.host.stop_count(), 1);
		assert_eq!(h.reporter.errors(), vec![WATCHDOG_MESSAGE.to_string()]);
		assert_eq!(h.reporter.last_status().as_deref(), Some(STATUS_UNABLE_TO_ATTACH));
	}

	#[tokio::test(start_paused = true)]
	async fn wedged_start_call_is_interrupted_by_watchdog() {
		let h = harness(FakeDebugHost::succeeds_on(1).with_start_latency(Duration::from_secs(60)), true);
		let started = Instant::now();

		let outcome = h.cycle.run(&config(), &options(30_000), CancellationToken::new()).await.unwrap();

		assert_eq!(outcome, AttachOutcome::WatchdogAbort);
		assert_near(started.elapsed(), 5_000);
		assert_eq!(h.host.call_count(), 1);
		assert_eq!(h.host.stop_count(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn active_session_resolves_without_attempts() {
		let h = harness(FakeDebugHost::never_succeeds(), true);
		h.host.set_active(true);

		let outcome = h.cycle.run(&config(), &options(30_000), CancellationToken::new()).await.unwrap();

		assert_eq!(outcome, AttachOutcome::AlreadyActive);
		assert!(outcome.is_attached());
		assert_eq!(h.host.call_count(), 0);
		assert_eq!(h.reporter.last_status().as_deref(), Some(STATUS_ATTACHED));
	}

	#[tokio::test(start_paused = true)]
	async fn unreachable_host_spends_no_attempts() {
		let h = harness(FakeDebugHost::succeeds_on(1), false);

		let outcome = h
			.cycle
			.run(&config(), &options(30_000).with_check_host(true), CancellationToken::new())
			.await
			.unwrap();

		assert_eq!(outcome, AttachOutcome::Unreachable);
		assert_eq!(h.probe.call_count(), 1);
		assert_eq!(h.host.call_count(), 0);
		assert_eq!(h.reporter.statuses(), vec!["localhost:9229 is not reachable".to_string()]);
	}

	#[tokio::test(start_paused = true)]
	async fn probe_is_skipped_without_check_host() {
		let h = harness(FakeDebugHost::succeeds_on(1), false);

		let outcome = h.cycle.run(&config(), &options(30_000), CancellationToken::new()).await.unwrap();

		assert_eq!(outcome, AttachOutcome::Attached);
		assert_eq!(h.probe.call_count(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn zero_timing_is_rejected_before_any_attempt() {
		let h = harness(FakeDebugHost::succeeds_on(1), true);
		let bad = AttachOptions::new(Duration::from_secs(30), Duration::ZERO);

		let err = h.cycle.run(&config(), &bad, CancellationToken::new()).await.unwrap_err();

		assert_eq!(err, CycleError::InvalidTiming { field: "retry_interval" });
		assert_eq!(h.probe.call_count(), 0);
		assert_eq!(h.host.call_count(), 0);
		assert!(h.reporter.statuses().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn cancelled_cycle_goes_quiet() {
		let h = harness(FakeDebugHost::never_succeeds(), true);
		let cancel = CancellationToken::new();
		let trigger = cancel.clone();
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(1_200)).await;
			trigger.cancel();
		});

		let outcome = h.cycle.run(&config(), &options(30_000), cancel).await.unwrap();
		assert_eq!(outcome, AttachOutcome::Cancelled);
		let calls = h.host.call_count();

		tokio::time::sleep(Duration::from_secs(10)).await;

		assert_eq!(h.host.call_count(), calls);
		assert_eq!(h.host.stop_count(), 0);
		assert!(h.reporter.errors().is_empty());
		assert_eq!(h.reporter.statuses(), vec!["Attempting to attach for 30000ms".to_string()]);
	}
}
