use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "autoattach")]
#[command(about = "Keep a debugger attached to a debug adapter endpoint")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format
	#[arg(short = 'f', long, global = true, value_enum, default_value_t = OutputFormat::Text)]
	pub format: OutputFormat,

	/// Settings file (defaults to the user config directory)
	#[arg(long, global = true, value_name = "FILE")]
	pub settings: Option<PathBuf>,

	/// Project root that relative launch paths resolve against (defaults to the current directory)
	#[arg(long, global = true, value_name = "DIR")]
	pub project: Option<PathBuf>,

	/// Run without a project; only absolute launch paths work
	#[arg(long, global = true, conflicts_with = "project")]
	pub no_project: bool,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Attach to the configured target and stay attached; reads commands from stdin
	Watch,

	/// Check once whether a host:port accepts connections
	Probe {
		host: String,
		port: u16,
		/// Connect timeout in milliseconds
		#[arg(long, default_value_t = 500)]
		timeout_ms: u64,
	},

	/// Inspect or change persisted settings
	Config {
		#[command(subcommand)]
		action: ConfigAction,
	},
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
	/// Show effective settings and the selected launch configuration
	Show,
	/// Set the session start timeout (ms)
	SetTimeout { ms: u64 },
	/// Set the retry interval (ms)
	SetRetryInterval { ms: u64 },
	/// Set the timeout used when reconnecting after a lost session (ms)
	SetRestartTimeout { ms: u64 },
	/// Validate and select a launch file
	SelectLaunch { path: String },
	/// Enable auto-attach
	Enable,
	/// Disable auto-attach
	Disable,
}

impl ConfigAction {
	pub fn name(&self) -> &'static str {
		match self {
			ConfigAction::Show => "config.show",
			ConfigAction::SetTimeout { .. } => "config.set-timeout",
			ConfigAction::SetRetryInterval { .. } => "config.set-retry-interval",
			ConfigAction::SetRestartTimeout { .. } => "config.set-restart-timeout",
			ConfigAction::SelectLaunch { .. } => "config.select-launch",
			ConfigAction::Enable => "config.enable",
			ConfigAction::Disable => "config.disable",
		}
	}
}
