use mutuals_protocol::{MAX_INBOUND_FRAME_BYTES, ServerEvent, UnreadAction, decode_chat_frame, encode_event};
use proptest::prelude::*;
use serde_json::Value;

#[test]
fn chat_message_wire_shape() {
	let event = ServerEvent::ChatMessage {
		message: "hi".to_string(),
		sender: "ada".to_string(),
		sender_name: "Ada Lovelace".to_string(),
		timestamp: 1_700_000_000_000,
	};

	let wire = encode_event(&event).expect("encode");
	let value: Value = serde_json::from_str(&wire).expect("valid json");

	assert_eq!(value["type"], "chat_message");
	assert_eq!(value["message"], "hi");
	assert_eq!(value["sender"], "ada");
	assert_eq!(value["sender_name"], "Ada Lovelace");
	assert_eq!(value["timestamp"], 1_700_000_000_000i64);
}

#[test]
fn unread_update_wire_shape() {
	let refresh = encode_event(&ServerEvent::UnreadUpdate {
		action: UnreadAction::Refresh,
	})
	.expect("encode");
	let value: Value = serde_json::from_str(&refresh).expect("valid json");
	assert_eq!(value["type"], "unread_update");
	assert_eq!(value["action"], "refresh");

	let increment = encode_event(&ServerEvent::UnreadUpdate {
		action: UnreadAction::Increment,
	})
	.expect("encode");
	let value: Value = serde_json::from_str(&increment).expect("valid json");
	assert_eq!(value["action"], "increment");
}

#[test]
fn events_deserialize_by_tag() {
	let event: ServerEvent = serde_json::from_str(r#"{"type":"unread_update","action":"refresh"}"#).expect("decode");
	assert_eq!(
		event,
		ServerEvent::UnreadUpdate {
			action: UnreadAction::Refresh
		}
	);
}

proptest! {
	#[test]
	fn any_nonblank_body_survives_the_frame(body in "[^\\s]{1,40}( [^\\s]{1,40}){0,5}") {
		let frame = serde_json::json!({ "message": body }).to_string();
		let decoded = decode_chat_frame(frame.as_bytes(), MAX_INBOUND_FRAME_BYTES).expect("decode");
		prop_assert_eq!(decoded, body.trim().to_string());
	}

	#[test]
	fn whitespace_only_bodies_never_decode(body in "[ \\t\\r\\n]{0,20}") {
		let frame = serde_json::json!({ "message": body }).to_string();
		prop_assert!(decode_chat_frame(frame.as_bytes(), MAX_INBOUND_FRAME_BYTES).is_err());
	}
}
