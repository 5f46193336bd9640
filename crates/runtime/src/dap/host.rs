use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use autoattach_protocol::{DebugConfiguration, Incoming, OutgoingResponse, Request, Response, ReverseRequest};
use parking_lot::Mutex;
use serde_json::json;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::codec::{read_json_message, write_json_message};
use crate::error::{Result, RuntimeError};
use crate::host::{DebugHost, SessionEvent};

/// Bound on opening the adapter connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
/// Bound on the whole handshake once connected.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Debug host that attaches to a DAP adapter over TCP.
///
/// At most one session is held. `start_session` performs the
/// `initialize` / attach / `configurationDone` handshake; a monitor task then
/// watches the connection and publishes [`SessionEvent::Ended`] when the
/// adapter terminates or hangs up.
pub struct DapHost {
	shared: Arc<Shared>,
	connect_timeout: Duration,
	request_timeout: Duration,
}

struct Shared {
	active: Mutex<Option<ActiveSession>>,
	pending: Mutex<Option<(u64, CancellationToken)>>,
	next_id: AtomicU64,
	events: broadcast::Sender<SessionEvent>,
}

struct ActiveSession {
	id: u64,
	name: String,
	writer: Arc<tokio::sync::Mutex<OwnedWriteHalf>>,
	seq: Arc<AtomicU64>,
	monitor: JoinHandle<()>,
}

struct Connection {
	reader: BufReader<OwnedReadHalf>,
	writer: OwnedWriteHalf,
	seq: u64,
}

impl Default for DapHost {
	fn default() -> Self {
		Self::new()
	}
}

impl DapHost {
	pub fn new() -> Self {
		let (events, _) = broadcast::channel(16);
		Self {
			shared: Arc::new(Shared {
				active: Mutex::new(None),
				pending: Mutex::new(None),
				next_id: AtomicU64::new(1),
				events,
			}),
			connect_timeout: CONNECT_TIMEOUT,
			request_timeout: REQUEST_TIMEOUT,
		}
	}

	pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
		self.connect_timeout = timeout;
		self
	}

	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	/// Name of the active session's configuration, if any.
	pub fn active_session_name(&self) -> Option<String> {
		self.shared.active.lock().as_ref().map(|session| session.name.clone())
	}

	async fn handshake(&self, config: &DebugConfiguration) -> Result<Connection> {
		let address = config.address();
		let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect((config.host(), config.port())))
			.await
			.map_err(|_| RuntimeError::Timeout {
				what: format!("connection to {address}"),
				after: self.connect_timeout,
			})??;
		stream.set_nodelay(true)?;

		let (read, write) = stream.into_split();
		let mut conn = Connection {
			reader: BufReader::new(read),
			writer: write,
			seq: 1,
		};

		tokio::time::timeout(self.request_timeout, conn.negotiate(config))
			.await
			.map_err(|_| RuntimeError::Timeout {
				what: format!("{} handshake with {address}", config.request),
				after: self.request_timeout,
			})??;
		Ok(conn)
	}

	fn install(&self, conn: Connection, name: &str) {
		let Connection { reader, writer, seq } = conn;
		let writer = Arc::new(tokio::sync::Mutex::new(writer));
		let seq = Arc::new(AtomicU64::new(seq));
		let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);

		let previous = {
			let mut active = self.shared.active.lock();
			let monitor = tokio::spawn(monitor(Arc::clone(&self.shared), id, reader, Arc::clone(&writer), Arc::clone(&seq)));
			active.replace(ActiveSession {
				id,
				name: name.to_string(),
				writer,
				seq,
				monitor,
			})
		};
		if let Some(previous) = previous {
			previous.monitor.abort();
		}

		info!(target = "autoattach.dap", session = id, %name, "debug session started");
		let _ = self.shared.events.send(SessionEvent::Started { name: name.to_string() });
	}
}

#[async_trait]
impl DebugHost for DapHost {
	fn has_active_session(&self) -> bool {
		self.shared.active.lock().is_some()
	}

	async fn start_session(&self, config: &DebugConfiguration) -> bool {
		let cancel = CancellationToken::new();
		let ticket = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
		if let Some((_, stale)) = self.shared.pending.lock().replace((ticket, cancel.clone())) {
			stale.cancel();
		}

		let result = tokio::select! {
			biased;
			_ = cancel.cancelled() => Err(RuntimeError::Closed),
			result = self.handshake(config) => result,
		};

		{
			let mut pending = self.shared.pending.lock();
			if pending.as_ref().is_some_and(|(id, _)| *id == ticket) {
				pending.take();
			}
		}

		match result {
			Ok(conn) => {
				self.install(conn, &config.name);
				true
			}
			Err(err) => {
				debug!(target = "autoattach.dap", address = %config.address(), error = %err, "start session failed");
				false
			}
		}
	}

	fn stop_session(&self) {
		if let Some((_, pending)) = self.shared.pending.lock().take() {
			pending.cancel();
		}

		let Some(session) = self.shared.active.lock().take() else {
			return;
		};
		session.monitor.abort();
		info!(target = "autoattach.dap", session = session.id, "stopping debug session");

		if let Ok(runtime) = tokio::runtime::Handle::try_current() {
			runtime.spawn(async move {
				let seq = session.seq.fetch_add(1, Ordering::SeqCst);
				let disconnect = Request::new(seq, "disconnect", Some(json!({ "terminateDebuggee": false })));
				let mut writer = session.writer.lock().await;
				if let Err(err) = write_json_message(&mut *writer, &disconnect).await {
					debug!(target = "autoattach.dap", error = %err, "disconnect not delivered");
				}
				let _ = writer.shutdown().await;
			});
		}

		let _ = self.shared.events.send(SessionEvent::Ended);
	}

	fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
		self.shared.events.subscribe()
	}
}

impl Shared {
	fn end(&self, id: u64) {
		let ended = {
			let mut active = self.active.lock();
			if active.as_ref().is_some_and(|session| session.id == id) {
				active.take()
			} else {
				None
			}
		};
		if ended.is_some() {
			let _ = self.events.send(SessionEvent::Ended);
		}
	}
}

impl Connection {
	async fn send(&mut self, command: &str, arguments: Option<serde_json::Value>) -> Result<u64> {
		let seq = self.next_seq();
		write_json_message(&mut self.writer, &Request::new(seq, command, arguments)).await?;
		Ok(seq)
	}

	fn next_seq(&mut self) -> u64 {
		let seq = self.seq;
		self.seq += 1;
		seq
	}

	async fn next(&mut self) -> Result<Incoming> {
		read_json_message(&mut self.reader).await?.ok_or(RuntimeError::Closed)
	}

	async fn decline(&mut self, request: &ReverseRequest) -> Result<()> {
		let seq = self.next_seq();
		write_json_message(&mut self.writer, &OutgoingResponse::unsupported(seq, request)).await
	}

	/// `initialize`, then the configuration's request with the whole
	/// configuration as arguments, answering `initialized` along the way.
	async fn negotiate(&mut self, config: &DebugConfiguration) -> Result<()> {
		let initialize = self.next_seq();
		write_json_message(&mut self.writer, &Request::initialize(initialize, &config.kind)).await?;
		let response = self.await_response(initialize).await?;
		ensure_success(&response)?;

		let arguments = serde_json::to_value(config)?;
		let attach = self.send(&config.request, Some(arguments)).await?;
		let mut configuration_done = None;
		loop {
			match self.next().await? {
				Incoming::Response(response) if response.request_seq == attach => {
					return ensure_success(&response);
				}
				Incoming::Response(response) if Some(response.request_seq) == configuration_done => {
					if !response.success {
						warn!(target = "autoattach.dap", message = ?response.message, "configurationDone rejected");
					}
				}
				Incoming::Event(event) if event.event == "initialized" => {
					configuration_done = Some(self.send("configurationDone", None).await?);
				}
				Incoming::Event(event) if event.ends_session() => {
					return Err(RuntimeError::Protocol(format!("adapter sent {} during {}", event.event, config.request)));
				}
				Incoming::Request(request) => self.decline(&request).await?,
				_ => {}
			}
		}
	}

	async fn await_response(&mut self, request_seq: u64) -> Result<Response> {
		loop {
			match self.next().await? {
				Incoming::Response(response) if response.request_seq == request_seq => return Ok(response),
				Incoming::Request(request) => self.decline(&request).await?,
				_ => {}
			}
		}
	}
}

fn ensure_success(response: &Response) -> Result<()> {
	if response.success {
		return Ok(());
	}
	Err(RuntimeError::Rejected {
		command: response.command.clone(),
		message: response.message.clone().unwrap_or_else(|| "no reason given".to_string()),
	})
}

async fn monitor(
	shared: Arc<Shared>,
	id: u64,
	mut reader: BufReader<OwnedReadHalf>,
	writer: Arc<tokio::sync::Mutex<OwnedWriteHalf>>,
	seq: Arc<AtomicU64>,
) {
	let reason = loop {
		match read_json_message::<_, Incoming>(&mut reader).await {
			Ok(Some(Incoming::Event(event))) if event.ends_session() => break format!("adapter sent {}", event.event),
			Ok(Some(Incoming::Request(request))) => {
				let reply = OutgoingResponse::unsupported(seq.fetch_add(1, Ordering::SeqCst), &request);
				let mut writer = writer.lock().await;
				if let Err(err) = write_json_message(&mut *writer, &reply).await {
					break err.to_string();
				}
			}
			Ok(Some(_)) => {}
			Ok(None) => break "connection closed".to_string(),
			Err(err) => break err.to_string(),
		}
	};

	info!(target = "autoattach.dap", session = id, %reason, "debug session ended");
	shared.end(id);
}
