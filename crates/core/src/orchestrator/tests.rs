use std::fs;
use std::path::{Path, PathBuf};

use autoattach_runtime::testing::{FakeDebugHost, RecordingReporter, StaticProbe};
use serde_json::json;
use tempfile::TempDir;

use super::*;
use crate::settings::{MemoryStore, SettingKey};

const LAUNCH: &str = r#"{
	"version": "0.2.0",
	"configurations": [
		{ "type": "node", "name": "Attach", "request": "attach", "port": 9229 }
	]
}"#;

struct Harness {
	orchestrator: Orchestrator,
	host: Arc<FakeDebugHost>,
	reporter: Arc<RecordingReporter>,
	probe: Arc<StaticProbe>,
	root: PathBuf,
	_tmp: TempDir,
}

fn harness(host: FakeDebugHost, store: MemoryStore) -> Harness {
	let tmp = TempDir::new().unwrap();
	let root = tmp.path().to_path_buf();
	let host = Arc::new(host);
	let reporter = Arc::new(RecordingReporter::default());
	let probe = Arc::new(StaticProbe::new(true));
	let orchestrator = Orchestrator::new(host.clone(), reporter.clone(), SettingsManager::load(Box::new(store)))
		.with_project_root(Some(root.clone()))
		.with_probe(probe.clone())
		.with_watchdog_ceiling(Duration::from_secs(600));
	Harness {
		orchestrator,
		host,
		reporter,
		probe,
		root,
		_tmp: tmp,
	}
}

fn write_launch(root: &Path, file: &str, body: &str) -> PathBuf {
	let dir = root.join(".vscode");
	fs::create_dir_all(&dir).unwrap();
	let path = dir.join(file);
	fs::write(&path, body).unwrap();
	path
}

fn count(statuses: &[String], wanted: &str) -> usize {
	statuses.iter().filter(|status| status.as_str() == wanted).count()
}

/// Harness that has already attached once through startup.
async fn attached(host: FakeDebugHost) -> Harness {
	let mut h = harness(host, MemoryStore::default());
	write_launch(&h.root, "launch.json", LAUNCH);
	h.orchestrator.startup().await;
	assert_eq!(h.orchestrator.settle().await, Some(AttachOutcome::Attached));
	h
}

#[tokio::test(start_paused = true)]
async fn startup_attaches_without_probing() {
	let mut h = harness(FakeDebugHost::succeeds_on(1), MemoryStore::default());
	write_launch(&h.root, "launch.json", LAUNCH);

	h.orchestrator.startup().await;
	assert_eq!(h.orchestrator.state(), AttachState::Attaching);
	assert!(h.orchestrator.in_flight());

	assert_eq!(h.orchestrator.settle().await, Some(AttachOutcome::Attached));
	assert_eq!(h.orchestrator.state(), AttachState::Attached);
	assert_eq!(h.probe.call_count(), 0);
	assert_eq!(h.host.call_count(), 1);
	assert_eq!(h.host.started_configs()[0].name, "Attach");
	assert_eq!(
		h.reporter.statuses(),
		vec!["Loading debug launch config...", "Attempting to attach for 30000ms", "Attached"]
	);
}

#[tokio::test(start_paused = true)]
async fn startup_with_missing_launch_file_waits_for_configuration() {
	let mut h = harness(FakeDebugHost::succeeds_on(1), MemoryStore::default());

	h.orchestrator.startup().await;

	let expected = h.root.join(".vscode").join("launch.json");
	assert_eq!(h.orchestrator.state(), AttachState::AwaitingConfiguration);
	assert_eq!(
		h.reporter.errors(),
		vec![format!("Failed to read {}. Please select a valid config file", expected.display())]
	);
	assert_eq!(h.reporter.last_status().as_deref(), Some(STATUS_SETUP));
	assert!(!h.orchestrator.in_flight());
	assert_eq!(h.host.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn startup_with_malformed_launch_file_reports_invalid_json() {
	let mut h = harness(FakeDebugHost::succeeds_on(1), MemoryStore::default());
	write_launch(&h.root, "launch.json", "{ \"configurations\": [ {");

	h.orchestrator.startup().await;

	assert_eq!(h.orchestrator.state(), AttachState::AwaitingConfiguration);
	assert_eq!(h.reporter.errors(), vec!["Invalid JSON in launch.json file."]);
	assert!(h.orchestrator.configuration().is_none());
}

#[tokio::test(start_paused = true)]
async fn startup_without_project_warns() {
	let mut h = harness(FakeDebugHost::succeeds_on(1), MemoryStore::default());
	h.orchestrator = h.orchestrator.with_project_root(None);

	h.orchestrator.startup().await;

	assert_eq!(h.orchestrator.state(), AttachState::AwaitingConfiguration);
	assert_eq!(h.reporter.warnings(), vec!["Please open a folder to set a launch configuration."]);
	assert!(h.reporter.errors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn startup_while_disabled_loads_but_does_not_attach() {
	let store = MemoryStore::default().with(SettingKey::AutoAttachEnabled, false);
	let mut h = harness(FakeDebugHost::succeeds_on(1), store);
	write_launch(&h.root, "launch.json", LAUNCH);

	h.orchestrator.startup().await;

	assert_eq!(h.orchestrator.state(), AttachState::Disabled);
	assert_eq!(h.orchestrator.configuration().map(|c| c.name.as_str()), Some("Attach"));
	assert_eq!(h.reporter.last_status().as_deref(), Some(STATUS_DISABLED));
	assert_eq!(h.host.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn toggling_off_then_on_starts_a_probed_cycle() {
	let mut h = attached(FakeDebugHost::succeeds_on(1)).await;

	assert!(!h.orchestrator.toggle_auto_attach().unwrap());
	assert_eq!(h.orchestrator.state(), AttachState::Disabled);
	assert_eq!(h.reporter.last_status().as_deref(), Some(STATUS_DISABLED));
	assert!(!h.orchestrator.settings().auto_attach_enabled);

	h.host.set_active(false);
	h.orchestrator.handle_session_event(SessionEvent::Ended);
	assert!(!h.orchestrator.in_flight());

	h.host.succeed_after(1);
	assert!(h.orchestrator.toggle_auto_attach().unwrap());
	assert_eq!(h.orchestrator.status().cycle.map(|c| (c.trigger, c.check_host)), Some((Trigger::Enable, true)));
	assert_eq!(h.orchestrator.settle().await, Some(AttachOutcome::Attached));

	assert_eq!(h.probe.call_count(), 1);
	assert_eq!(h.host.call_count(), 2);
	assert_eq!(count(&h.reporter.statuses(), "Attempting to attach for 30000ms"), 2);
}

#[tokio::test(start_paused = true)]
async fn lost_session_restarts_once_with_auto_restart_timeout() {
	let mut h = attached(FakeDebugHost::succeeds_on(1)).await;
	h.host.succeed_after(0);
	h.host.set_active(false);

	h.orchestrator.handle_session_event(SessionEvent::Ended);
	h.orchestrator.handle_session_event(SessionEvent::Ended);

	assert_eq!(h.orchestrator.status().cycle.map(|c| c.trigger), Some(Trigger::SessionLost));
	assert_eq!(h.orchestrator.settle().await, Some(AttachOutcome::TimedOut));

	let statuses = h.reporter.statuses();
	assert_eq!(count(&statuses, STATUS_RECONNECTING), 1);
	assert_eq!(count(&statuses, "Attempting to attach for 5000ms"), 1);
	assert_eq!(h.orchestrator.state(), AttachState::Failed);
	assert_eq!(h.reporter.last_status().as_deref(), Some("Unable to Attach"));
	assert_eq!(h.probe.call_count(), 0);
	assert!(h.orchestrator.status().last_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn session_ended_before_completion_is_handled_still_reconnects() {
	let mut h = harness(FakeDebugHost::succeeds_on(1), MemoryStore::default());
	write_launch(&h.root, "launch.json", LAUNCH);
	h.orchestrator.startup().await;
	while !h.host.has_active_session() {
		tokio::task::yield_now().await;
	}

	// Adapter hangs up right after attaching, before the completion is seen.
	h.host.set_active(false);
	h.orchestrator.handle_session_event(SessionEvent::Ended);
	assert_eq!(count(&h.reporter.statuses(), STATUS_RECONNECTING), 0);

	assert_eq!(h.orchestrator.settle().await, Some(AttachOutcome::Attached));
	assert!(h.orchestrator.in_flight());
	assert_eq!(h.orchestrator.status().cycle.map(|c| c.trigger), Some(Trigger::SessionLost));
	assert_eq!(count(&h.reporter.statuses(), STATUS_RECONNECTING), 1);

	assert_eq!(h.orchestrator.settle().await, Some(AttachOutcome::Attached));
	assert_eq!(h.host.call_count(), 2);
	assert!(h.reporter.statuses().contains(&"Attempting to attach for 5000ms".to_string()));
	assert_eq!(h.orchestrator.state(), AttachState::Attached);
	assert!(!h.orchestrator.in_flight());
}

#[tokio::test(start_paused = true)]
async fn session_end_while_disabled_is_ignored() {
	let store = MemoryStore::default().with(SettingKey::AutoAttachEnabled, false);
	let mut h = harness(FakeDebugHost::succeeds_on(1), store);
	write_launch(&h.root, "launch.json", LAUNCH);
	h.orchestrator.startup().await;

	h.orchestrator.handle_session_event(SessionEvent::Ended);

	assert!(!h.orchestrator.in_flight());
	assert_eq!(count(&h.reporter.statuses(), STATUS_RECONNECTING), 0);
}

#[tokio::test(start_paused = true)]
async fn unparsable_selection_keeps_previous_configuration() {
	let mut h = attached(FakeDebugHost::succeeds_on(1)).await;
	write_launch(&h.root, "broken.json", "{ nope");

	let err = h.orchestrator.select_launch_file("broken.json").await.unwrap_err();

	assert!(matches!(err, Error::FileInvalid { .. }));
	assert_eq!(h.reporter.errors().last().map(String::as_str), Some("Invalid JSON in launch.json file."));
	assert_eq!(h.orchestrator.configuration().map(|c| c.name.as_str()), Some("Attach"));
	assert!(h.orchestrator.settings().auto_attach_enabled);
	assert_eq!(h.orchestrator.settings().launch_config_file, "launch.json");
	assert_eq!(h.orchestrator.state(), AttachState::Attached);
	assert!(!h.orchestrator.in_flight());
}

#[tokio::test(start_paused = true)]
async fn valid_selection_replaces_configuration_and_probes() {
	let mut h = attached(FakeDebugHost::succeeds_on(1)).await;
	h.host.set_active(false);
	h.host.succeed_after(1);
	let path = write_launch(
		&h.root,
		"other.json",
		r#"{ "configurations": [ { "type": "node", "name": "Other", "request": "attach", "port": 9300 } ] }"#,
	);

	h.orchestrator.select_launch_file("other.json").await.unwrap();

	assert_eq!(h.reporter.infos(), vec![format!("Launch configuration updated: {}", path.display())]);
	assert_eq!(h.orchestrator.settings().launch_config_file, "other.json");

	assert_eq!(h.orchestrator.settle().await, Some(AttachOutcome::Attached));
	assert_eq!(h.probe.call_count(), 1);
	let started = h.host.started_configs();
	assert_eq!(started.last().map(|c| c.address()), Some("localhost:9300".to_string()));
}

#[tokio::test(start_paused = true)]
async fn unreachable_selection_reports_address() {
	let mut h = attached(FakeDebugHost::succeeds_on(1)).await;
	h.host.set_active(false);
	h.probe.set_reachable(false);

	h.orchestrator.select_launch_file("launch.json").await.unwrap();

	assert_eq!(h.orchestrator.settle().await, Some(AttachOutcome::Unreachable));
	assert_eq!(h.orchestrator.state(), AttachState::Unreachable);
	assert_eq!(h.reporter.last_status().as_deref(), Some("localhost:9229 is not reachable"));
	assert_eq!(h.host.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn restart_without_configuration_is_rejected() {
	let mut h = harness(FakeDebugHost::succeeds_on(1), MemoryStore::default());
	h.orchestrator.startup().await;

	let err = h.orchestrator.restart(false).unwrap_err();

	assert!(matches!(err, Error::NoConfigurationForRestart));
	assert_eq!(
		h.reporter.errors().last().map(String::as_str),
		Some("No suitable debug configuration found. Please set Launch Configuration.")
	);
	assert_eq!(h.orchestrator.state(), AttachState::AwaitingConfiguration);
	assert_eq!(h.host.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn restart_re_enables_auto_attach() {
	let store = MemoryStore::default().with(SettingKey::AutoAttachEnabled, false);
	let mut h = harness(FakeDebugHost::succeeds_on(1), store);
	write_launch(&h.root, "launch.json", LAUNCH);
	h.orchestrator.startup().await;

	h.orchestrator.restart(false).unwrap();

	assert!(h.orchestrator.settings().auto_attach_enabled);
	assert_eq!(h.orchestrator.settle().await, Some(AttachOutcome::Attached));
	assert_eq!(h.probe.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn disabling_cancels_the_live_cycle() {
	let mut h = harness(FakeDebugHost::never_succeeds(), MemoryStore::default());
	write_launch(&h.root, "launch.json", LAUNCH);
	h.orchestrator.startup().await;

	tokio::time::sleep(Duration::from_millis(1200)).await;
	h.orchestrator.toggle_auto_attach().unwrap();
	let calls = h.host.call_count();
	assert!(calls >= 2);

	tokio::time::sleep(Duration::from_secs(60)).await;

	assert_eq!(h.orchestrator.settle().await, None);
	assert_eq!(h.host.call_count(), calls);
	assert_eq!(h.orchestrator.state(), AttachState::Disabled);
	assert_eq!(h.reporter.last_status().as_deref(), Some(STATUS_DISABLED));
	assert_eq!(count(&h.reporter.statuses(), "Unable to Attach"), 0);
}

#[tokio::test(start_paused = true)]
async fn restart_supersedes_live_cycle() {
	let mut h = harness(FakeDebugHost::never_succeeds(), MemoryStore::default());
	write_launch(&h.root, "launch.json", LAUNCH);
	h.orchestrator.startup().await;
	let first = h.orchestrator.status().cycle.map(|c| c.id);

	tokio::time::sleep(Duration::from_millis(700)).await;
	h.orchestrator.restart(false).unwrap();
	let second = h.orchestrator.status().cycle.map(|c| c.id);
	assert_ne!(first, second);

	assert_eq!(h.orchestrator.settle().await, Some(AttachOutcome::TimedOut));
	assert_eq!(count(&h.reporter.statuses(), "Unable to Attach"), 1);
	assert_eq!(h.orchestrator.state(), AttachState::Failed);
}

#[tokio::test(start_paused = true)]
async fn already_active_session_short_circuits() {
	let mut h = harness(FakeDebugHost::succeeds_on(1), MemoryStore::default());
	write_launch(&h.root, "launch.json", LAUNCH);
	h.host.set_active(true);

	h.orchestrator.startup().await;

	assert!(!h.orchestrator.in_flight());
	assert_eq!(h.orchestrator.state(), AttachState::Attached);
	assert_eq!(h.reporter.last_status().as_deref(), Some("Attached"));
	assert_eq!(h.host.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn setters_validate_and_announce() {
	let mut h = harness(FakeDebugHost::succeeds_on(1), MemoryStore::default());

	let err = h.orchestrator.set_start_timeout(0).unwrap_err();
	assert!(matches!(err, Error::InvalidSetting { .. }));
	assert_eq!(h.reporter.errors(), vec!["debugSessionStartTimeout must be a positive number of milliseconds"]);

	h.orchestrator.set_start_timeout(1000).unwrap();
	h.orchestrator.set_retry_interval(250).unwrap();
	h.orchestrator.set_auto_restart_timeout(2000).unwrap();
	assert_eq!(
		h.reporter.infos(),
		vec![
			"Timeout updated to 1000 milliseconds.",
			"Retry interval updated to 250 milliseconds.",
			"Auto-restart timeout updated to 2000 milliseconds.",
		]
	);

	write_launch(&h.root, "launch.json", LAUNCH);
	h.orchestrator.startup().await;
	assert_eq!(h.orchestrator.settle().await, Some(AttachOutcome::Attached));
	assert!(h.reporter.statuses().contains(&"Attempting to attach for 1000ms".to_string()));
}

#[tokio::test(start_paused = true)]
async fn run_serves_commands_and_session_events() {
	let h = harness(FakeDebugHost::succeeds_on(1), MemoryStore::default());
	write_launch(&h.root, "launch.json", LAUNCH);
	let host = h.host.clone();
	let (tx, rx) = mpsc::channel(8);
	let task = tokio::spawn(h.orchestrator.run(rx));

	let status = |tx: mpsc::Sender<OrchestratorCommand>| async move {
		let (reply, answer) = oneshot::channel();
		tx.send(OrchestratorCommand::Status(reply)).await.unwrap();
		answer.await.unwrap()
	};

	let mut snapshot = status(tx.clone()).await;
	while snapshot.state != AttachState::Attached {
		tokio::time::sleep(Duration::from_millis(10)).await;
		snapshot = status(tx.clone()).await;
	}
	assert_eq!(snapshot.last_outcome, Some(AttachOutcome::Attached));

	host.succeed_after(1);
	host.set_active(false);
	while host.call_count() < 2 || status(tx.clone()).await.state != AttachState::Attached {
		tokio::time::sleep(Duration::from_millis(10)).await;
	}

	let (reply, answer) = oneshot::channel();
	tx.send(OrchestratorCommand::Menu(reply)).await.unwrap();
	let menu = answer.await.unwrap();
	assert_eq!(menu.items[1].label, "Disable Auto-Attach");
	assert_eq!(menu.session, "Active session: Attach");

	let snapshot = serde_json::to_value(status(tx.clone()).await).unwrap();
	assert_eq!(snapshot["state"], "attached");
	assert_eq!(snapshot["settings"]["retryInterval"], json!(500));

	tx.send(OrchestratorCommand::Shutdown).await.unwrap();
	task.await.unwrap();
}
