#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default maximum inbound frame payload size.
pub const MAX_INBOUND_FRAME_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
	#[error("frame exceeds maximum size: len={len} max={max}")]
	FrameTooLarge {
		len: usize,
		max: usize,
	},

	#[error("undecodable frame: {0}")]
	Malformed(#[from] serde_json::Error),

	#[error("empty message body")]
	EmptyMessage,
}

/// Inbound chat frame: `{"message": "..."}`, unknown fields ignored.
#[derive(Debug, Deserialize)]
struct ChatFrame {
	#[serde(default)]
	message: Option<String>,
}

/// Decode an inbound chat frame into its trimmed message body.
///
/// Callers drop every error silently; a bad frame is a no-op for the
/// connection, never an error surfaced to the peer.
pub fn decode_chat_frame(payload: &[u8], max_frame_bytes: usize) -> Result<String, FrameError> {
	if payload.len() > max_frame_bytes {
		return Err(FrameError::FrameTooLarge {
			len: payload.len(),
			max: max_frame_bytes,
		});
	}

	let frame: ChatFrame = serde_json::from_slice(payload)?;
	let body = frame.message.as_deref().unwrap_or("").trim();
	if body.is_empty() {
		return Err(FrameError::EmptyMessage);
	}

	Ok(body.to_string())
}

/// What an `unread_update` asks the client to do with its badge.
///
/// Both are content-free signals: the receiver re-derives the count from
/// the store rather than trusting a pushed delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnreadAction {
	Refresh,
	Increment,
}

/// Outbound events, tagged by `type` and matched exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
	ChatMessage {
		message: String,
		sender: String,
		sender_name: String,
		timestamp: i64,
	},
	UnreadUpdate {
		action: UnreadAction,
	},
}

/// Serialize an outbound event for the wire.
pub fn encode_event(event: &ServerEvent) -> Result<String, serde_json::Error> {
	serde_json::to_string(event)
}

/// Why the server closed a connection.
///
/// Each rejection maps to a distinct, documented close code so clients
/// can tell "not logged in" from "not your conversation". Bad address and
/// not-found deliberately share a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
	/// No valid identity attached to the connection.
	Unauthenticated,
	/// Room reference missing or malformed.
	BadAddress,
	/// Referenced room does not exist.
	NotFound,
	/// Room exists but the membership invariant does not hold.
	Forbidden,
	/// A store call failed while verifying authorization.
	Internal,
}

impl CloseReason {
	/// Websocket close code.
	pub const fn code(self) -> u16 {
		match self {
			CloseReason::Unauthenticated => 4401,
			CloseReason::BadAddress | CloseReason::NotFound => 4404,
			CloseReason::Forbidden => 4403,
			CloseReason::Internal => 1011,
		}
	}

	/// Short human-readable reason for the close frame.
	pub const fn reason(self) -> &'static str {
		match self {
			CloseReason::Unauthenticated => "unauthenticated",
			CloseReason::BadAddress => "bad address",
			CloseReason::NotFound => "not found",
			CloseReason::Forbidden => "forbidden",
			CloseReason::Internal => "internal error",
		}
	}
}
