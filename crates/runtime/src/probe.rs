//! Transport-level reachability probing.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

/// Upper bound on a single probe, DNS resolution included.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Pre-flight check that a host:port accepts connections.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
	async fn probe(&self, host: &str, port: u16) -> bool;
}

/// Probe that opens (and immediately closes) a TCP connection.
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
	timeout: Duration,
}

impl TcpProbe {
	pub fn new(timeout: Duration) -> Self {
		Self { timeout }
	}
}

impl Default for TcpProbe {
	fn default() -> Self {
		Self::new(PROBE_TIMEOUT)
	}
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
	async fn probe(&self, host: &str, port: u16) -> bool {
		probe_with_timeout(host, port, self.timeout).await
	}
}

/// Returns `true` when `host:port` accepts a TCP connection within [`PROBE_TIMEOUT`].
pub async fn probe(host: &str, port: u16) -> bool {
	probe_with_timeout(host, port, PROBE_TIMEOUT).await
}

async fn probe_with_timeout(host: &str, port: u16, timeout: Duration) -> bool {
	match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
		Ok(Ok(stream)) => {
			drop(stream);
			debug!(target = "autoattach.probe", %host, port, "reachable");
			true
		}
		Ok(Err(err)) => {
			debug!(target = "autoattach.probe", %host, port, error = %err, "unreachable");
			false
		}
		Err(_) => {
			debug!(target = "autoattach.probe", %host, port, timeout_ms = timeout.as_millis() as u64, "probe timed out");
			false
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Instant;

	use tokio::net::TcpListener;

	use super::*;

	#[tokio::test]
	async fn listening_port_is_reachable() {
		let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
		let port = listener.local_addr().unwrap().port();
		assert!(probe("127.0.0.1", port).await);
	}

	#[tokio::test]
	async fn closed_port_is_unreachable_within_timeout() {
		let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
		let port = listener.local_addr().unwrap().port();
		drop(listener);

		let started = Instant::now();
		assert!(!probe("127.0.0.1", port).await);
		assert!(started.elapsed() < PROBE_TIMEOUT + Duration::from_millis(250));
	}

	#[tokio::test]
	async fn unresolvable_host_is_unreachable() {
		let started = Instant::now();
		assert!(!TcpProbe::default().probe("autoattach-probe.invalid", 9229).await);
		assert!(started.elapsed() < PROBE_TIMEOUT + Duration::from_millis(250));
	}
}
