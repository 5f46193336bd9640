//! Debugger auto-attach.
//!
//! [`Orchestrator`] owns the current debug configuration and settings, reacts
//! to user commands and debug-session changes, and drives attach cycles from
//! [`autoattach_runtime`]. Settings persist through a [`SettingsStore`].
//!
//! ```ignore
//! let settings = SettingsManager::load(Box::new(JsonFileStore::load(path)));
//! let mut orchestrator = Orchestrator::new(host, reporter, settings)
//!     .with_project_root(Some(project));
//! let (tx, rx) = tokio::sync::mpsc::channel(16);
//! orchestrator.run(rx).await;
//! ```

pub mod error;
pub mod launch;
pub mod menu;
pub mod orchestrator;
pub mod settings;

pub use autoattach_protocol::DebugConfiguration;
pub use autoattach_runtime::{AttachOutcome, DebugHost, NoticeLevel, SessionEvent, StatusReporter};
pub use error::{Error, InvalidLaunchFile, Result};
pub use launch::{LAUNCH_DIR, load_configuration, resolve_launch_path};
pub use menu::{Menu, MenuAction, MenuItem};
pub use orchestrator::{AttachState, CycleInfo, Orchestrator, OrchestratorCommand, StatusSnapshot, Trigger};
pub use settings::{JsonFileStore, MemoryStore, SettingKey, Settings, SettingsManager, SettingsStore, default_settings_path};

/// Prefix the console puts in front of every status line and notification.
pub const MESSAGE_PREFIX: &str = "Debugger Auto Attach:";
