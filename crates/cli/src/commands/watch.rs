//! Long-running attach loop driven by line commands on stdin.

use std::sync::Arc;

use anyhow::Context;
use autoattach::{DebugHost, Orchestrator, OrchestratorCommand, StatusReporter};
use autoattach_runtime::DapHost;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::context::CommandContext;
use crate::error::Result;
use crate::output::OutputFormat;
use crate::reporter::ConsoleReporter;

const HELP: &str = "commands: menu, status, toggle, restart [--probe], select <path>, timeout <ms>, interval <ms>, restart-timeout <ms>, quit";

/// A line typed into `watch`.
#[derive(Debug, PartialEq, Eq)]
enum Input {
	Menu,
	Status,
	Toggle,
	Restart { check_host: bool },
	Select(String),
	Timeout(u64),
	Interval(u64),
	RestartTimeout(u64),
	Help,
	Quit,
}

fn parse_input(line: &str) -> std::result::Result<Option<Input>, String> {
	let line = line.trim();
	let (word, rest) = match line.split_once(char::is_whitespace) {
		Some((word, rest)) => (word, rest.trim()),
		None => (line, ""),
	};
	let millis = |rest: &str| rest.parse::<u64>().map_err(|_| format!("{word} expects milliseconds, got {rest:?}"));

	let input = match word {
		"" => return Ok(None),
		"menu" => Input::Menu,
		"status" => Input::Status,
		"toggle" => Input::Toggle,
		"restart" => match rest {
			"" => Input::Restart { check_host: false },
			"--probe" => Input::Restart { check_host: true },
			other => return Err(format!("unknown restart flag {other:?}")),
		},
		"select" if !rest.is_empty() => Input::Select(rest.to_string()),
		"select" => return Err("select expects a launch file path".to_string()),
		"timeout" => Input::Timeout(millis(rest)?),
		"interval" => Input::Interval(millis(rest)?),
		"restart-timeout" => Input::RestartTimeout(millis(rest)?),
		"help" | "?" => Input::Help,
		"quit" | "exit" => Input::Quit,
		other => return Err(format!("unknown command {other:?}")),
	};
	Ok(Some(input))
}

pub async fn run(ctx: &CommandContext) -> Result<()> {
	let settings = ctx.settings_manager()?;
	let host = Arc::new(DapHost::new());
	let reporter = Arc::new(ConsoleReporter::new(ctx.format));

	let orchestrator = Orchestrator::new(host.clone(), reporter.clone(), settings).with_project_root(ctx.project_root().map(|root| root.to_path_buf()));
	let (tx, rx) = mpsc::channel(16);
	let engine = tokio::spawn(orchestrator.run(rx));
	info!(target = "autoattach.cli", "watching; type `help` for commands");

	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	let mut stdin_open = true;
	loop {
		tokio::select! {
			biased;
			_ = tokio::signal::ctrl_c() => {
				debug!(target = "autoattach.cli", "interrupted");
				break;
			}
			line = lines.next_line(), if stdin_open => match line {
				Ok(Some(line)) => match parse_input(&line) {
					Ok(Some(Input::Quit)) => break,
					Ok(Some(input)) => {
						if !handle(input, &tx, reporter.as_ref(), ctx.format).await {
							break;
						}
					}
					Ok(None) => {}
					Err(message) => reporter.notify(autoattach::NoticeLevel::Warning, &message),
				},
				Ok(None) => {
					debug!(target = "autoattach.cli", "stdin closed; waiting for interrupt");
					stdin_open = false;
				}
				Err(err) => {
					warn!(target = "autoattach.cli", error = %err, "failed to read stdin");
					stdin_open = false;
				}
			},
		}
	}

	let _ = tx.send(OrchestratorCommand::Shutdown).await;
	let joined = engine.await;
	host.stop_session();
	joined.context("orchestrator task failed")?;
	Ok(())
}

/// Forwards one input to the orchestrator. Returns false once it is gone.
async fn handle(input: Input, tx: &mpsc::Sender<OrchestratorCommand>, reporter: &ConsoleReporter, format: OutputFormat) -> bool {
	let command = match input {
		Input::Status => {
			let (reply, rx) = oneshot::channel();
			return query(tx, OrchestratorCommand::Status(reply), rx, format).await;
		}
		Input::Menu => {
			let (reply, rx) = oneshot::channel();
			return query(tx, OrchestratorCommand::Menu(reply), rx, format).await;
		}
		Input::Help => {
			reporter.notify(autoattach::NoticeLevel::Info, HELP);
			return true;
		}
		Input::Toggle => OrchestratorCommand::ToggleAutoAttach,
		Input::Restart { check_host } => OrchestratorCommand::Restart { check_host },
		Input::Select(path) => OrchestratorCommand::SelectLaunchFile(path),
		Input::Timeout(ms) => OrchestratorCommand::SetStartTimeout(ms),
		Input::Interval(ms) => OrchestratorCommand::SetRetryInterval(ms),
		Input::RestartTimeout(ms) => OrchestratorCommand::SetAutoRestartTimeout(ms),
		Input::Quit => return false,
	};
	tx.send(command).await.is_ok()
}

async fn query<T: Serialize>(tx: &mpsc::Sender<OrchestratorCommand>, command: OrchestratorCommand, rx: oneshot::Receiver<T>, format: OutputFormat) -> bool {
	if tx.send(command).await.is_err() {
		return false;
	}
	let Ok(value) = rx.await else {
		return false;
	};
	let rendered = match format {
		OutputFormat::Text | OutputFormat::Json => serde_json::to_string_pretty(&value),
		OutputFormat::Ndjson => serde_json::to_string(&value),
		OutputFormat::Toon => serde_json::to_value(&value).map(|json| toon::encode(&json, None)),
	};
	match rendered {
		Ok(text) => println!("{text}"),
		Err(err) => warn!(target = "autoattach.cli", error = %err, "failed to render reply"),
	}
	true
}
