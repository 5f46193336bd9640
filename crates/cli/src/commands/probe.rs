use std::time::{Duration, Instant};

use autoattach_runtime::{ReachabilityProbe, TcpProbe};

use crate::error::Result;
use crate::output::ProbeData;

pub async fn execute(host: &str, port: u16, timeout_ms: u64) -> Result<ProbeData> {
	let started = Instant::now();
	let reachable = TcpProbe::new(Duration::from_millis(timeout_ms)).probe(host, port).await;
	if !reachable {
		return Err(autoattach::Error::HostUnreachable {
			address: format!("{host}:{port}"),
		}
		.into());
	}
	Ok(ProbeData {
		host: host.to_string(),
		port,
		reachable,
		elapsed_ms: started.elapsed().as_millis() as u64,
	})
}
