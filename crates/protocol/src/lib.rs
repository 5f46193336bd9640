//! Wire types for autoattach.
//!
//! This crate contains the serde-serializable shapes exchanged with the
//! outside world: the launch file that names an attach target, and the
//! Debug Adapter Protocol messages used to attach to it.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization and the
//!   launch-file selection rule
//! * 1:1 with the formats: `launch.json` as editors write it, DAP as adapters speak it
//! * Stable: Changes only when one of those formats changes
//!
//! The attach engine is built on top of these types in `autoattach-runtime`.

pub mod dap;
pub mod launch;

pub use dap::{Event, Incoming, OutgoingResponse, Request, Response, ReverseRequest};
pub use launch::{DEFAULT_HOST, DEFAULT_PORT, DebugConfiguration, LaunchFile, REQUIRED_KEYS, is_qualifying};
