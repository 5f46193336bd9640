//! Action menu offered to the user.

use serde::Serialize;

/// Something the user can pick from the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MenuAction {
	Restart,
	ToggleAutoAttach,
	SetTimeout,
	SetRetryInterval,
	SelectLaunchConfiguration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
	pub action: MenuAction,
	pub label: String,
}

/// Menu contents for the current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Menu {
	/// Indicator line describing the debug session.
	pub session: String,
	pub items: Vec<MenuItem>,
}

impl Menu {
	pub fn build(enabled: bool, session_name: Option<&str>) -> Self {
		let session = match session_name {
			Some(name) => format!("Active session: {name}"),
			None => "No active debug session".to_string(),
		};
		let toggle = if enabled { "Disable Auto-Attach" } else { "Enable Auto-Attach" };
		let items = [
			(MenuAction::Restart, "Restart Auto-Attach"),
			(MenuAction::ToggleAutoAttach, toggle),
			(MenuAction::SetTimeout, "Set Timeout"),
			(MenuAction::SetRetryInterval, "Set Retry Interval"),
			(MenuAction::SelectLaunchConfiguration, "Select Launch Configuration"),
		]
		.into_iter()
		.map(|(action, label)| MenuItem {
			action,
			label: label.to_string(),
		})
		.collect();
		Self { session, items }
	}

	pub fn labels(&self) -> Vec<&str> {
		self.items.iter().map(|item| item.label.as_str()).collect()
	}
}
