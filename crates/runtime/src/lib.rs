//! Attach engine for autoattach.
//!
//! This crate sequences reachability probing, timed attach retries and the
//! watchdog that guards against a wedged attach call. The debug host itself
//! is a collaborator behind [`DebugHost`]; [`DapHost`] is the
//! Debug Adapter Protocol implementation used by the CLI.

pub mod attempt;
pub mod cycle;
pub mod dap;
pub mod error;
pub mod host;
pub mod probe;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod watchdog;

pub use attempt::{AttachAttempt, AttachOutcome};
pub use cycle::{AttachCycle, AttachOptions};
pub use dap::DapHost;
pub use error::{CycleError, Result, RuntimeError};
pub use host::{DebugHost, NoticeLevel, SessionEvent, StatusReporter};
pub use probe::{PROBE_TIMEOUT, ReachabilityProbe, TcpProbe, probe};
pub use watchdog::{WATCHDOG_CEILING, Watchdog};

/// Status line shown once an attach succeeds or a session is already active.
pub const STATUS_ATTACHED: &str = "Attached";
/// Status line shown when an attach cycle gives up.
pub const STATUS_UNABLE_TO_ATTACH: &str = "Unable to Attach";
