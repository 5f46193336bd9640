//! Console rendering of status lines and notifications.

use std::io::{self, Write};

use autoattach::{MESSAGE_PREFIX, NoticeLevel, StatusReporter};
use colored::Colorize;
use serde_json::json;
use tracing::debug;

use crate::output::OutputFormat;

/// Prints status changes and notices to stdout.
///
/// Text mode prefixes every line with the product name; structured formats
/// emit one JSON object per line.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleReporter {
	structured: bool,
}

impl ConsoleReporter {
	pub fn new(format: OutputFormat) -> Self {
		Self {
			structured: format.is_structured(),
		}
	}

	fn emit(&self, line: String) {
		let mut stdout = io::stdout().lock();
		let _ = writeln!(stdout, "{line}");
		let _ = stdout.flush();
	}
}

fn level_name(level: NoticeLevel) -> &'static str {
	match level {
		NoticeLevel::Info => "info",
		NoticeLevel::Warning => "warning",
		NoticeLevel::Error => "error",
	}
}

impl StatusReporter for ConsoleReporter {
	fn status(&self, text: &str) {
		debug!(target = "autoattach.cli", status = text);
		if self.structured {
			self.emit(json!({ "type": "status", "text": text }).to_string());
		} else {
			self.emit(format!("{} {}", MESSAGE_PREFIX.bold(), text));
		}
	}

	fn notify(&self, level: NoticeLevel, message: &str) {
		debug!(target = "autoattach.cli", level = level_name(level), message);
		if self.structured {
			self.emit(json!({ "type": "notice", "level": level_name(level), "message": message }).to_string());
			return;
		}
		let tag = match level {
			NoticeLevel::Info => "info".cyan(),
			NoticeLevel::Warning => "warning".yellow(),
			NoticeLevel::Error => "error".red(),
		};
		self.emit(format!("{} [{tag}] {message}", MESSAGE_PREFIX.bold()));
	}
}
