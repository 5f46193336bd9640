use autoattach::{SettingsManager, load_configuration, resolve_launch_path};
use tracing::info;

use crate::cli::ConfigAction;
use crate::context::CommandContext;
use crate::error::Result;
use crate::output::ConfigData;

pub async fn execute(action: ConfigAction, ctx: &CommandContext) -> Result<ConfigData> {
	let mut manager = ctx.settings_manager()?;

	match action {
		ConfigAction::Show => {}
		ConfigAction::SetTimeout { ms } => manager.set_start_timeout(ms)?,
		ConfigAction::SetRetryInterval { ms } => manager.set_retry_interval(ms)?,
		ConfigAction::SetRestartTimeout { ms } => manager.set_auto_restart_timeout(ms)?,
		ConfigAction::Enable => manager.set_auto_attach_enabled(true)?,
		ConfigAction::Disable => manager.set_auto_attach_enabled(false)?,
		ConfigAction::SelectLaunch { path } => {
			// Only a loadable file is persisted.
			let resolved = resolve_launch_path(&path, ctx.project_root())?;
			let configuration = load_configuration(&resolved).await?;
			manager.set_launch_config_file(&path)?;
			info!(target = "autoattach.cli", path = %resolved.display(), name = %configuration.name, "launch configuration selected");
		}
	}

	describe(&manager, ctx).await
}

/// Effective settings plus the launch configuration they select.
async fn describe(manager: &SettingsManager, ctx: &CommandContext) -> Result<ConfigData> {
	let settings = manager.current().clone();
	let (launch_path, configuration, launch_error) = match resolve_launch_path(&settings.launch_config_file, ctx.project_root()) {
		Ok(path) => match load_configuration(&path).await {
			Ok(config) => (Some(path), Some(config), None),
			Err(err) => (Some(path), None, Some(err.to_string())),
		},
		Err(err) => (None, None, Some(err.to_string())),
	};

	Ok(ConfigData {
		settings_path: ctx.settings_path()?.to_path_buf(),
		settings,
		launch_path,
		configuration,
		launch_error,
	})
}
