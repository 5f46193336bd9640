//! `Content-Length` framing for DAP messages.
//!
//! ```text
//! Content-Length: 123\r\n
//! \r\n
//! { ...json... }
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, RuntimeError};

pub const MAX_HEADER_LINE_BYTES: usize = 8 * 1024;
pub const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// Reads one framed JSON message. Returns `None` on a clean EOF between messages.
pub async fn read_json_message<R, T>(reader: &mut R) -> Result<Option<T>>
where
	R: AsyncBufRead + Unpin,
	T: DeserializeOwned,
{
	match read_raw_message(reader).await? {
		Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
		None => Ok(None),
	}
}

/// Writes one framed JSON message and flushes.
pub async fn write_json_message<W, T>(writer: &mut W, message: &T) -> Result<()>
where
	W: AsyncWrite + Unpin,
	T: Serialize,
{
	let bytes = serde_json::to_vec(message)?;
	writer.write_all(format!("Content-Length: {}\r\n\r\n", bytes.len()).as_bytes()).await?;
	writer.write_all(&bytes).await?;
	writer.flush().await?;
	Ok(())
}

pub async fn read_raw_message<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
	R: AsyncBufRead + Unpin,
{
	let mut content_length: Option<usize> = None;
	let mut saw_header_line = false;

	loop {
		let Some(line) = read_line_limited(reader).await? else {
			if !saw_header_line {
				return Ok(None);
			}
			return Err(RuntimeError::Protocol("EOF while reading DAP headers".to_string()));
		};
		saw_header_line = true;

		let line = line.trim_end_matches(['\r', '\n']);
		if line.is_empty() {
			break;
		}

		if let Some((name, value)) = line.split_once(':') {
			if name.eq_ignore_ascii_case("Content-Length") {
				let value = value.trim();
				content_length = Some(
					value
						.parse::<usize>()
						.map_err(|err| RuntimeError::Protocol(format!("invalid Content-Length {value:?}: {err}")))?,
				);
			}
		}
	}

	let content_length = content_length.ok_or_else(|| RuntimeError::Protocol("DAP message missing Content-Length header".to_string()))?;
	if content_length > MAX_MESSAGE_BYTES {
		return Err(RuntimeError::Protocol(format!(
			"DAP message Content-Length {content_length} exceeds maximum allowed size {MAX_MESSAGE_BYTES}"
		)));
	}

	let mut buf = vec![0u8; content_length];
	reader.read_exact(&mut buf).await?;
	Ok(Some(buf))
}

async fn read_line_limited<R>(reader: &mut R) -> Result<Option<String>>
where
	R: AsyncBufRead + Unpin,
{
	let mut buf = Vec::<u8>::new();
	loop {
		let available = reader.fill_buf().await?;
		if available.is_empty() {
			if buf.is_empty() {
				return Ok(None);
			}
			break;
		}

		let newline_pos = available.iter().position(|&b| b == b'\n');
		let take = newline_pos.map(|pos| pos + 1).unwrap_or(available.len());
		if buf.len() + take > MAX_HEADER_LINE_BYTES {
			return Err(RuntimeError::Protocol(format!(
				"DAP header line exceeds maximum size ({MAX_HEADER_LINE_BYTES} bytes)"
			)));
		}

		buf.extend_from_slice(&available[..take]);
		reader.consume(take);
		if newline_pos.is_some() {
			break;
		}
	}

	String::from_utf8(buf)
		.map(Some)
		.map_err(|_| RuntimeError::Protocol("DAP header line is not UTF-8".to_string()))
}
