mod config;
mod probe;
mod watch;

use std::future::Future;
use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use crate::cli::{Cli, Commands, ConfigAction};
use crate::context::CommandContext;
use crate::error::Result;
use crate::output::{CommandResult, DiagnosticLevel, ResultBuilder, print_error_stderr, print_result};

pub async fn dispatch(cli: Cli) -> Result<()> {
	let ctx = CommandContext::new(cli.format, cli.settings, cli.project, cli.no_project);
	debug!(target = "autoattach.cli", project = ?ctx.project_root(), "dispatching");

	match cli.command {
		Commands::Watch => watch::run(&ctx).await,
		Commands::Probe { host, port, timeout_ms } => finish(&ctx, "probe", None, probe::execute(&host, port, timeout_ms)).await,
		Commands::Config { action } => {
			let name = action.name();
			let note = (!matches!(action, ConfigAction::Show)).then_some(SETTINGS_UNCHANGED);
			finish(&ctx, name, note, config::execute(action, &ctx)).await
		}
	}
}

/// Diagnostic attached when a settings change is rejected.
const SETTINGS_UNCHANGED: &str = "settings left unchanged";

/// Runs a one-shot command and prints its result envelope. `failure_note`
/// becomes a warning diagnostic when the command fails.
async fn finish<T, F>(ctx: &CommandContext, command: &str, failure_note: Option<&str>, work: F) -> Result<()>
where
	T: Serialize,
	F: Future<Output = Result<T>>,
{
	let started = Instant::now();
	match work.await {
		Ok(data) => {
			let result = ResultBuilder::new(command).started_at(started).data(data).build();
			print_result(&result, ctx.format);
			Ok(())
		}
		Err(err) => {
			let mut builder = ResultBuilder::new(command)
				.started_at(started)
				.error(err.code(), err.to_string())
				.error_details(err.details());
			if let Some(note) = failure_note {
				builder = builder.diagnostic(DiagnosticLevel::Warning, note);
			}
			let result: CommandResult<T> = builder.build();
			if ctx.format.is_structured() {
				print_result(&result, ctx.format);
			} else if let Some(error) = &result.error {
				print_error_stderr(error, &result.diagnostics);
			}
			Err(err)
		}
	}
}
