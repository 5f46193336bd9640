//! The attach state machine.
//!
//! The orchestrator owns the selected debug configuration and the settings,
//! and is the only thing that starts attach cycles. At most one cycle is live
//! at a time: disabling cancels it, a lost session while it runs is absorbed,
//! and any other trigger supersedes it. A superseded cycle's token is
//! cancelled and its late completion is discarded by cycle id.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use autoattach_protocol::DebugConfiguration;
use autoattach_runtime::{
	AttachCycle, AttachOptions, AttachOutcome, CycleError, DebugHost, NoticeLevel, ReachabilityProbe, STATUS_ATTACHED, SessionEvent,
	StatusReporter, WATCHDOG_CEILING,
};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::launch::{load_configuration, resolve_launch_path};
use crate::menu::Menu;
use crate::settings::{Settings, SettingsManager};

#[cfg(test)]
mod tests;

pub const STATUS_LOADING: &str = "Loading debug launch config...";
pub const STATUS_SETUP: &str = "Setup";
pub const STATUS_DISABLED: &str = "Disabled";
pub const STATUS_RECONNECTING: &str = "Connection to debugger lost. Attempting to reconnect...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachState {
	Uninitialized,
	Disabled,
	/// Enabled with a configuration, nothing in flight.
	Idle,
	AwaitingConfiguration,
	Attaching,
	Attached,
	Unreachable,
	Failed,
}

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
	Startup,
	Enable,
	Restart,
	LaunchSelected,
	SessionLost,
}

/// Requests accepted by [`Orchestrator::run`].
#[derive(Debug)]
pub enum OrchestratorCommand {
	ToggleAutoAttach,
	Restart { check_host: bool },
	SelectLaunchFile(String),
	SetStartTimeout(u64),
	SetRetryInterval(u64),
	SetAutoRestartTimeout(u64),
	Status(oneshot::Sender<StatusSnapshot>),
	Menu(oneshot::Sender<Menu>),
	Shutdown,
}

/// The live cycle as seen from outside.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleInfo {
	pub id: u64,
	pub trigger: Trigger,
	pub check_host: bool,
	pub timeout_ms: u64,
	pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
	pub state: AttachState,
	pub enabled: bool,
	pub session_active: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub session_name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub configuration: Option<DebugConfiguration>,
	pub settings: Settings,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cycle: Option<CycleInfo>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_outcome: Option<AttachOutcome>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_error: Option<String>,
}

struct LiveCycle {
	id: u64,
	trigger: Trigger,
	check_host: bool,
	timeout: Duration,
	address: String,
	started: Instant,
	cancel: CancellationToken,
}

struct Completion {
	id: u64,
	result: std::result::Result<AttachOutcome, CycleError>,
}

pub struct Orchestrator {
	host: Arc<dyn DebugHost>,
	reporter: Arc<dyn StatusReporter>,
	cycle: AttachCycle,
	settings: SettingsManager,
	project_root: Option<PathBuf>,
	watchdog_ceiling: Duration,
	configuration: Option<DebugConfiguration>,
	state: AttachState,
	session_name: Option<String>,
	live: Option<LiveCycle>,
	next_cycle: u64,
	last_outcome: Option<AttachOutcome>,
	last_error: Option<String>,
	events: broadcast::Receiver<SessionEvent>,
	completions_tx: mpsc::UnboundedSender<Completion>,
	completions: mpsc::UnboundedReceiver<Completion>,
}

impl Orchestrator {
	pub fn new(host: Arc<dyn DebugHost>, reporter: Arc<dyn StatusReporter>, settings: SettingsManager) -> Self {
		let events = host.subscribe();
		let cycle = AttachCycle::new(Arc::clone(&host), Arc::clone(&reporter));
		let (completions_tx, completions) = mpsc::unbounded_channel();
		Self {
			host,
			reporter,
			cycle,
			settings,
			project_root: None,
			watchdog_ceiling: WATCHDOG_CEILING,
			configuration: None,
			state: AttachState::Uninitialized,
			session_name: None,
			live: None,
			next_cycle: 0,
			last_outcome: None,
			last_error: None,
			events,
			completions_tx,
			completions,
		}
	}

	/// Root that relative launch paths resolve against. `None` means no
	/// project is open.
	pub fn with_project_root(mut self, root: Option<PathBuf>) -> Self {
		self.project_root = root;
		self
	}

	pub fn with_probe(mut self, probe: Arc<dyn ReachabilityProbe>) -> Self {
		self.cycle = self.cycle.with_probe(probe);
		self
	}

	pub fn with_watchdog_ceiling(mut self, ceiling: Duration) -> Self {
		self.watchdog_ceiling = ceiling;
		self
	}

	pub fn state(&self) -> AttachState {
		self.state
	}

	pub fn configuration(&self) -> Option<&DebugConfiguration> {
		self.configuration.as_ref()
	}

	pub fn settings(&self) -> &Settings {
		self.settings.current()
	}

	/// True while a cycle is live.
	pub fn in_flight(&self) -> bool {
		self.live.is_some()
	}

	/// Loads the configured launch file and, if it yields a configuration,
	/// starts a cycle without probing the host.
	pub async fn startup(&mut self) {
		self.reporter.status(STATUS_LOADING);

		let configured = self.settings.current().launch_config_file.clone();
		let loaded = match resolve_launch_path(&configured, self.project_root.as_deref()) {
			Ok(path) => load_configuration(&path).await,
			Err(err) => Err(err),
		};

		match loaded {
			Ok(config) => {
				info!(target = "autoattach.orchestrator", name = %config.name, address = %config.address(), "launch configuration loaded");
				self.configuration = Some(config);
				self.state = AttachState::Idle;
				self.begin_cycle(Trigger::Startup, false);
			}
			Err(err) => {
				self.state = AttachState::AwaitingConfiguration;
				let not_found = matches!(err, Error::FileNotFound { .. });
				self.reject(err);
				if not_found {
					self.reporter.status(STATUS_SETUP);
				}
			}
		}
	}

	/// Flips the enabled flag. Enabling starts a probed cycle; disabling
	/// cancels the live one. Returns the new flag.
	pub fn toggle_auto_attach(&mut self) -> Result<bool> {
		let enabled = !self.settings.current().auto_attach_enabled;
		self.settings.set_auto_attach_enabled(enabled).map_err(|err| self.reject(err))?;
		info!(target = "autoattach.orchestrator", enabled, "auto-attach toggled");

		if enabled {
			self.restart_with(Trigger::Enable, true)?;
		} else {
			self.cancel_live("disabled");
			self.state = AttachState::Disabled;
			self.reporter.status(STATUS_DISABLED);
		}
		Ok(enabled)
	}

	/// Re-enables auto-attach and starts a cycle for the current
	/// configuration.
	pub fn restart(&mut self, check_host: bool) -> Result<()> {
		self.restart_with(Trigger::Restart, check_host)
	}

	fn restart_with(&mut self, trigger: Trigger, check_host: bool) -> Result<()> {
		if self.configuration.is_none() {
			return Err(self.reject(Error::NoConfigurationForRestart));
		}
		if !self.settings.current().auto_attach_enabled {
			self.settings.set_auto_attach_enabled(true).map_err(|err| self.reject(err))?;
		}
		self.begin_cycle(trigger, check_host);
		Ok(())
	}

	/// Replaces the configuration with the one selected from `path` and
	/// starts a probed cycle. On failure nothing changes.
	pub async fn select_launch_file(&mut self, path: &str) -> Result<()> {
		let resolved = resolve_launch_path(path, self.project_root.as_deref()).map_err(|err| self.reject(err))?;
		let config = match load_configuration(&resolved).await {
			Ok(config) => config,
			Err(err) => return Err(self.reject(err)),
		};

		self.settings.set_launch_config_file(path).map_err(|err| self.reject(err))?;
		info!(target = "autoattach.orchestrator", path = %resolved.display(), name = %config.name, "launch configuration selected");
		self.configuration = Some(config);
		self.reporter
			.notify(NoticeLevel::Info, &format!("Launch configuration updated: {}", resolved.display()));
		self.begin_cycle(Trigger::LaunchSelected, true);
		Ok(())
	}

	pub fn set_start_timeout(&mut self, ms: u64) -> Result<()> {
		self.settings.set_start_timeout(ms).map_err(|err| self.reject(err))?;
		self.reporter.notify(NoticeLevel::Info, &format!("Timeout updated to {ms} milliseconds."));
		Ok(())
	}

	pub fn set_retry_interval(&mut self, ms: u64) -> Result<()> {
		self.settings.set_retry_interval(ms).map_err(|err| self.reject(err))?;
		self.reporter.notify(NoticeLevel::Info, &format!("Retry interval updated to {ms} milliseconds."));
		Ok(())
	}

	pub fn set_auto_restart_timeout(&mut self, ms: u64) -> Result<()> {
		self.settings.set_auto_restart_timeout(ms).map_err(|err| self.reject(err))?;
		self.reporter
			.notify(NoticeLevel::Info, &format!("Auto-restart timeout updated to {ms} milliseconds."));
		Ok(())
	}

	/// Reacts to the debug host gaining or losing its session.
	pub fn handle_session_event(&mut self, event: SessionEvent) {
		match event {
			SessionEvent::Started { name } => {
				debug!(target = "autoattach.orchestrator", %name, "debug session started");
				self.session_name = Some(name);
				self.reporter.status(STATUS_ATTACHED);
				if self.live.is_none() {
					self.state = AttachState::Attached;
				}
			}
			SessionEvent::Ended => {
				self.session_name = None;
				if !self.settings.current().auto_attach_enabled {
					debug!(target = "autoattach.orchestrator", "debug session ended while disabled");
					self.state = AttachState::Disabled;
					return;
				}
				if self.configuration.is_none() {
					self.state = AttachState::AwaitingConfiguration;
					return;
				}
				if let Some(live) = &self.live {
					debug!(target = "autoattach.orchestrator", cycle = live.id, "debug session ended during live cycle; absorbed");
					return;
				}
				self.reconnect();
			}
		}
	}

	pub fn status(&self) -> StatusSnapshot {
		StatusSnapshot {
			state: self.state,
			enabled: self.settings.current().auto_attach_enabled,
			session_active: self.host.has_active_session(),
			session_name: self.session_name.clone(),
			configuration: self.configuration.clone(),
			settings: self.settings.current().clone(),
			cycle: self.live.as_ref().map(|live| CycleInfo {
				id: live.id,
				trigger: live.trigger,
				check_host: live.check_host,
				timeout_ms: live.timeout.as_millis() as u64,
				elapsed_ms: live.started.elapsed().as_millis() as u64,
			}),
			last_outcome: self.last_outcome,
			last_error: self.last_error.clone(),
		}
	}

	pub fn menu(&self) -> Menu {
		let session = self.host.has_active_session().then(|| {
			self.session_name
				.clone()
				.or_else(|| self.configuration.as_ref().map(|config| config.name.clone()))
				.unwrap_or_else(|| "debug session".to_string())
		});
		Menu::build(self.settings.current().auto_attach_enabled, session.as_deref())
	}

	/// Waits for the live cycle to resolve and applies its result. Returns
	/// `None` when no cycle is live or the cycle failed to start.
	pub async fn settle(&mut self) -> Option<AttachOutcome> {
		let id = self.live.as_ref()?.id;
		while let Some(completion) = self.completions.recv().await {
			let current = completion.id == id;
			let outcome = self.complete(completion);
			if current {
				return outcome;
			}
		}
		None
	}

	/// Runs startup, then serves commands, session events and cycle
	/// completions until the command channel closes or `Shutdown` arrives.
	pub async fn run(mut self, mut commands: mpsc::Receiver<OrchestratorCommand>) {
		self.startup().await;

		let mut events_open = true;
		loop {
			tokio::select! {
				command = commands.recv() => {
					let Some(command) = command else { break };
					if !self.dispatch(command).await {
						break;
					}
				}
				event = self.events.recv(), if events_open => match event {
					Ok(event) => self.handle_session_event(event),
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						warn!(target = "autoattach.orchestrator", skipped, "missed debug session events");
					}
					Err(broadcast::error::RecvError::Closed) => {
						warn!(target = "autoattach.orchestrator", "debug host event stream closed");
						events_open = false;
					}
				},
				Some(completion) = self.completions.recv() => {
					self.complete(completion);
				}
			}
		}

		self.cancel_live("shutdown");
		info!(target = "autoattach.orchestrator", "orchestrator stopped");
	}

	async fn dispatch(&mut self, command: OrchestratorCommand) -> bool {
		let result = match command {
			OrchestratorCommand::ToggleAutoAttach => self.toggle_auto_attach().map(|_| ()),
			OrchestratorCommand::Restart { check_host } => self.restart(check_host),
			OrchestratorCommand::SelectLaunchFile(path) => self.select_launch_file(&path).await,
			OrchestratorCommand::SetStartTimeout(ms) => self.set_start_timeout(ms),
			OrchestratorCommand::SetRetryInterval(ms) => self.set_retry_interval(ms),
			OrchestratorCommand::SetAutoRestartTimeout(ms) => self.set_auto_restart_timeout(ms),
			OrchestratorCommand::Status(reply) => {
				let _ = reply.send(self.status());
				Ok(())
			}
			OrchestratorCommand::Menu(reply) => {
				let _ = reply.send(self.menu());
				Ok(())
			}
			OrchestratorCommand::Shutdown => return false,
		};
		if let Err(err) = result {
			debug!(target = "autoattach.orchestrator", error = %err, "command failed");
		}
		true
	}

	/// Starts a cycle if enabled, configured and not already attached.
	/// Returns whether a cycle was started.
	fn begin_cycle(&mut self, trigger: Trigger, check_host: bool) -> bool {
		let settings = self.settings.current().clone();
		if !settings.auto_attach_enabled {
			self.state = AttachState::Disabled;
			self.reporter.status(STATUS_DISABLED);
			return false;
		}
		let Some(config) = self.configuration.clone() else {
			self.state = AttachState::AwaitingConfiguration;
			return false;
		};
		if self.host.has_active_session() {
			debug!(target = "autoattach.orchestrator", ?trigger, "debugging session is already active");
			self.state = AttachState::Attached;
			self.reporter.status(STATUS_ATTACHED);
			return false;
		}
		if let Some(live) = &self.live {
			if trigger == Trigger::SessionLost {
				debug!(target = "autoattach.orchestrator", cycle = live.id, "cycle already live; not restarting");
				return false;
			}
			self.cancel_live("superseded");
		}

		let timeout = match trigger {
			Trigger::SessionLost => settings.auto_restart_timeout(),
			_ => settings.start_timeout(),
		};
		let options = AttachOptions::new(timeout, settings.retry_interval())
			.with_check_host(check_host)
			.with_watchdog_ceiling(self.watchdog_ceiling);

		self.next_cycle += 1;
		let id = self.next_cycle;
		let cancel = CancellationToken::new();
		let address = config.address();

		let cycle = self.cycle.clone();
		let token = cancel.clone();
		let completions = self.completions_tx.clone();
		tokio::spawn(async move {
			let result = cycle.run(&config, &options, token).await;
			let _ = completions.send(Completion { id, result });
		});

		info!(
			target = "autoattach.orchestrator",
			cycle = id,
			?trigger,
			check_host,
			timeout_ms = timeout.as_millis() as u64,
			%address,
			"attach cycle started"
		);
		self.live = Some(LiveCycle {
			id,
			trigger,
			check_host,
			timeout,
			address,
			started: Instant::now(),
			cancel,
		});
		self.state = AttachState::Attaching;
		true
	}

	fn cancel_live(&mut self, reason: &'static str) {
		if let Some(live) = self.live.take() {
			live.cancel.cancel();
			debug!(target = "autoattach.orchestrator", cycle = live.id, reason, "attach cycle cancelled");
		}
	}

	fn complete(&mut self, completion: Completion) -> Option<AttachOutcome> {
		let Completion { id, result } = completion;
		let Some(live) = self.live.take_if(|live| live.id == id) else {
			debug!(target = "autoattach.orchestrator", cycle = id, "discarding result of superseded attach cycle");
			return None;
		};

		let outcome = match result {
			Ok(outcome) => outcome,
			Err(err) => {
				self.state = AttachState::Failed;
				self.reject(Error::from(err));
				return None;
			}
		};

		let elapsed_ms = live.started.elapsed().as_millis() as u64;
		self.last_outcome = Some(outcome);
		self.state = match outcome {
			AttachOutcome::Attached | AttachOutcome::AlreadyActive => AttachState::Attached,
			AttachOutcome::Unreachable => AttachState::Unreachable,
			AttachOutcome::TimedOut | AttachOutcome::WatchdogAbort => AttachState::Failed,
			AttachOutcome::Cancelled if self.settings.current().auto_attach_enabled => AttachState::Idle,
			AttachOutcome::Cancelled => AttachState::Disabled,
		};

		match Error::from_outcome(outcome, live.address, live.timeout) {
			Some(err) => {
				warn!(target = "autoattach.orchestrator", cycle = id, ?outcome, elapsed_ms, error = %err, "attach cycle failed");
				self.last_error = Some(err.to_string());
			}
			None => {
				info!(target = "autoattach.orchestrator", cycle = id, ?outcome, elapsed_ms, "attach cycle resolved");
				if outcome.is_attached() {
					self.last_error = None;
				}
			}
		}

		// The session may have ended while this completion was queued; that
		// event was absorbed by the then-live cycle.
		if outcome.is_attached() && !self.host.has_active_session() && self.settings.current().auto_attach_enabled {
			debug!(target = "autoattach.orchestrator", cycle = id, "session gone by the time the cycle resolved");
			self.session_name = None;
			self.reconnect();
		}
		Some(outcome)
	}

	fn reconnect(&mut self) {
		info!(target = "autoattach.orchestrator", "connection to debugger lost; attempting to reconnect");
		self.reporter.status(STATUS_RECONNECTING);
		self.begin_cycle(Trigger::SessionLost, false);
	}

	/// Shows `err` to the user and remembers it for status snapshots.
	fn reject(&mut self, err: Error) -> Error {
		warn!(target = "autoattach.orchestrator", error = %err, "{}", err.code());
		self.reporter.notify(err.level(), &err.to_string());
		self.last_error = Some(err.to_string());
		err
	}
}
