//! Debug Adapter Protocol client used as the production [`DebugHost`](crate::DebugHost).

pub mod codec;
mod host;

pub use host::{CONNECT_TIMEOUT, DapHost, REQUEST_TIMEOUT};
