//! In-memory collaborators for exercising the attach engine without a
//! debug adapter.
//!
//! # Example
//!
//! ```ignore
//! let host = Arc::new(FakeDebugHost::succeeds_on(3));
//! let reporter = Arc::new(RecordingReporter::default());
//! let cycle = AttachCycle::new(host.clone(), reporter.clone())
//!     .with_probe(Arc::new(StaticProbe::new(true)));
//!
//! let outcome = cycle.run(&config, &options, CancellationToken::new()).await?;
//! assert_eq!(host.call_count(), 3);
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use autoattach_protocol::DebugConfiguration;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::host::{DebugHost, NoticeLevel, SessionEvent, StatusReporter};
use crate::probe::ReachabilityProbe;

const NEVER: usize = 0;

/// Debug host whose `start session` succeeds from a chosen call onward.
pub struct FakeDebugHost {
	succeed_from: AtomicUsize,
	start_latency: Duration,
	calls: Mutex<Vec<Instant>>,
	configs: Mutex<Vec<DebugConfiguration>>,
	active: AtomicBool,
	stops: AtomicUsize,
	events: broadcast::Sender<SessionEvent>,
}

impl FakeDebugHost {
	/// Fails the first `n - 1` calls and succeeds from call `n` on.
	pub fn succeeds_on(n: usize) -> Self {
		let (events, _) = broadcast::channel(64);
		Self {
			succeed_from: AtomicUsize::new(n.max(1)),
			start_latency: Duration::ZERO,
			calls: Mutex::new(Vec::new()),
			configs: Mutex::new(Vec::new()),
			active: AtomicBool::new(false),
			stops: AtomicUsize::new(0),
			events,
		}
	}

	pub fn never_succeeds() -> Self {
		let host = Self::succeeds_on(1);
		host.succeed_from.store(NEVER, Ordering::SeqCst);
		host
	}

	/// Makes every `start session` call take `latency` before answering.
	pub fn with_start_latency(mut self, latency: Duration) -> Self {
		self.start_latency = latency;
		self
	}

	/// Succeeds from the `n`-th call counted from now on; `0` never succeeds.
	pub fn succeed_after(&self, n: usize) {
		let from = if n == 0 { NEVER } else { self.call_count() + n };
		self.succeed_from.store(from, Ordering::SeqCst);
	}

	pub fn call_count(&self) -> usize {
		self.calls.lock().len()
	}

	pub fn call_times(&self) -> Vec<Instant> {
		self.calls.lock().clone()
	}

	/// Configurations passed to `start session`, in call order.
	pub fn started_configs(&self) -> Vec<DebugConfiguration> {
		self.configs.lock().clone()
	}

	pub fn stop_count(&self) -> usize {
		self.stops.load(Ordering::SeqCst)
	}

	/// Flips the active flag and publishes the matching event.
	pub fn set_active(&self, active: bool) {
		let was = self.active.swap(active, Ordering::SeqCst);
		if was == active {
			return;
		}
		let event = if active {
			SessionEvent::Started { name: "fake".to_string() }
		} else {
			SessionEvent::Ended
		};
		let _ = self.events.send(event);
	}
}

#[async_trait]
impl DebugHost for FakeDebugHost {
	fn has_active_session(&self) -> bool {
		self.active.load(Ordering::SeqCst)
	}

	async fn start_session(&self, config: &DebugConfiguration) -> bool {
		let call = {
			let mut calls = self.calls.lock();
			calls.push(Instant::now());
			calls.len()
		};
		self.configs.lock().push(config.clone());

		if !self.start_latency.is_zero() {
			tokio::time::sleep(self.start_latency).await;
		}

		let from = self.succeed_from.load(Ordering::SeqCst);
		let ok = from != NEVER && call >= from;
		if ok {
			self.active.store(true, Ordering::SeqCst);
			let _ = self.events.send(SessionEvent::Started { name: config.name.clone() });
		}
		ok
	}

	fn stop_session(&self) {
		self.stops.fetch_add(1, Ordering::SeqCst);
		self.set_active(false);
	}

	fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
		self.events.subscribe()
	}
}

/// Reporter that records everything it is shown.
#[derive(Default)]
pub struct RecordingReporter {
	statuses: Mutex<Vec<String>>,
	notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl RecordingReporter {
	pub fn statuses(&self) -> Vec<String> {
		self.statuses.lock().clone()
	}

	pub fn last_status(&self) -> Option<String> {
		self.statuses.lock().last().cloned()
	}

	pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
		self.notices.lock().clone()
	}

	pub fn errors(&self) -> Vec<String> {
		self.notices_at(NoticeLevel::Error)
	}

	pub fn warnings(&self) -> Vec<String> {
		self.notices_at(NoticeLevel::Warning)
	}

	pub fn infos(&self) -> Vec<String> {
		self.notices_at(NoticeLevel::Info)
	}

	fn notices_at(&self, level: NoticeLevel) -> Vec<String> {
		self.notices
			.lock()
			.iter()
			.filter(|(l, _)| *l == level)
			.map(|(_, message)| message.clone())
			.collect()
	}
}

impl StatusReporter for RecordingReporter {
	fn status(&self, text: &str) {
		self.statuses.lock().push(text.to_string());
	}

	fn notify(&self, level: NoticeLevel, message: &str) {
		self.notices.lock().push((level, message.to_string()));
	}
}

/// Probe with a fixed answer.
pub struct StaticProbe {
	reachable: AtomicBool,
	calls: AtomicUsize,
}

impl StaticProbe {
	pub fn new(reachable: bool) -> Self {
		Self {
			reachable: AtomicBool::new(reachable),
			calls: AtomicUsize::new(0),
		}
	}

	pub fn set_reachable(&self, reachable: bool) {
		self.reachable.store(reachable, Ordering::SeqCst);
	}

	pub fn call_count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl ReachabilityProbe for StaticProbe {
	async fn probe(&self, _host: &str, _port: u16) -> bool {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.reachable.load(Ordering::SeqCst)
	}
}
