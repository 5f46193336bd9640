//! Debug Adapter Protocol message shapes, client side.
//!
//! Only the subset needed to attach is modelled: outgoing requests, incoming
//! responses/events, and reverse requests the adapter may send back.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Client-to-adapter request.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
	pub seq: u64,
	#[serde(rename = "type")]
	pub type_: &'static str,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub arguments: Option<Value>,
}

impl Request {
	pub fn new(seq: u64, command: impl Into<String>, arguments: Option<Value>) -> Self {
		Self {
			seq,
			type_: "request",
			command: command.into(),
			arguments,
		}
	}

	/// `initialize` request announcing this client to the adapter.
	pub fn initialize(seq: u64, adapter_id: &str) -> Self {
		Self::new(
			seq,
			"initialize",
			Some(json!({
				"clientID": "autoattach",
				"clientName": "autoattach",
				"adapterID": adapter_id,
				"linesStartAt1": true,
				"columnsStartAt1": true,
				"pathFormat": "path",
			})),
		)
	}
}

/// Client reply to an adapter-initiated request.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingResponse {
	pub seq: u64,
	#[serde(rename = "type")]
	pub type_: &'static str,
	pub request_seq: u64,
	pub success: bool,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

impl OutgoingResponse {
	/// Declines a reverse request the client does not support.
	pub fn unsupported(seq: u64, request: &ReverseRequest) -> Self {
		Self {
			seq,
			type_: "response",
			request_seq: request.seq,
			success: false,
			command: request.command.clone(),
			message: Some(format!("{} is not supported by this client", request.command)),
		}
	}
}

/// Any message an adapter can send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Incoming {
	Response(Response),
	Event(Event),
	Request(ReverseRequest),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Response {
	#[serde(default)]
	pub seq: u64,
	pub request_seq: u64,
	pub success: bool,
	pub command: String,
	#[serde(default)]
	pub message: Option<String>,
	#[serde(default)]
	pub body: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Event {
	#[serde(default)]
	pub seq: u64,
	pub event: String,
	#[serde(default)]
	pub body: Option<Value>,
}

impl Event {
	/// True for events after which the debuggee is gone.
	pub fn ends_session(&self) -> bool {
		matches!(self.event.as_str(), "terminated" | "exited")
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReverseRequest {
	pub seq: u64,
	pub command: String,
	#[serde(default)]
	pub arguments: Option<Value>,
}
