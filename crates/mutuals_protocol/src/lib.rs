#![forbid(unsafe_code)]

//! JSON wire contract for the chat and notification websocket channels.

mod wire;

pub use wire::{
	CloseReason, FrameError, MAX_INBOUND_FRAME_BYTES, ServerEvent, UnreadAction, decode_chat_frame, encode_event,
};
