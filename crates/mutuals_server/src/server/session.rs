#![forbid(unsafe_code)]

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::{Sink, SinkExt as _, StreamExt as _};
use mutuals_domain::{Channel, Identity, Room, RoomId, UserId};
use mutuals_protocol::{CloseReason, MAX_INBOUND_FRAME_BYTES, ServerEvent, UnreadAction, decode_chat_frame, encode_event};
use tracing::{debug, info, warn};

use crate::server::auth::verify_hmac_token;
use crate::server::hub::HubItem;
use crate::server::notify::RefreshSink;
use crate::server::state::AppState;

/// A join that passed the full admission check.
#[derive(Debug, Clone)]
pub struct AuthorizedJoin {
	pub user: Identity,
	pub peer: Identity,
	pub room: Room,
}

/// Resolve the identity behind an access token, or say why not.
pub async fn authenticate(state: &AppState, token: Option<&str>) -> Result<Identity, CloseReason> {
	let Some(secret) = state.settings.auth_hmac_secret.as_ref() else {
		warn!("rejecting session: no auth_hmac_secret configured");
		return Err(CloseReason::Unauthenticated);
	};

	let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
		return Err(CloseReason::Unauthenticated);
	};

	let claims = verify_hmac_token(token, secret.expose()).map_err(|e| {
		debug!(error = %e, "token rejected");
		CloseReason::Unauthenticated
	})?;

	let user_id = claims.user_id().map_err(|_| CloseReason::Unauthenticated)?;

	match state.stores.users.get(user_id).await {
		Ok(Some(identity)) => Ok(identity),
		Ok(None) => Err(CloseReason::Unauthenticated),
		Err(e) => {
			warn!(error = %e, "identity lookup failed");
			Err(CloseReason::Internal)
		}
	}
}

/// Admission check for a room session.
///
/// Ordering matters: identity before address, address before existence,
/// existence before membership and friendship. Each failure maps to the
/// close code the client keys its error UI off.
pub async fn authorize(state: &AppState, token: Option<&str>, room_id_raw: &str) -> Result<AuthorizedJoin, CloseReason> {
	let user = authenticate(state, token).await?;

	let room_id: RoomId = room_id_raw.parse().map_err(|_| CloseReason::BadAddress)?;

	let room = match state.stores.rooms.get(room_id).await {
		Ok(Some(room)) => room,
		Ok(None) => return Err(CloseReason::NotFound),
		Err(e) => {
			warn!(error = %e, room = %room_id, "room lookup failed");
			return Err(CloseReason::Internal);
		}
	};

	let Some(peer_id) = room.other_member(user.id) else {
		return Err(CloseReason::Forbidden);
	};

	match state.stores.social.are_friends(user.id, peer_id).await {
		Ok(true) => {}
		Ok(false) => return Err(CloseReason::Forbidden),
		Err(e) => {
			warn!(error = %e, "friendship check failed");
			return Err(CloseReason::Internal);
		}
	}

	let peer = match state.stores.users.get(peer_id).await {
		Ok(Some(peer)) => peer,
		Ok(None) => {
			warn!(room = %room_id, peer = %peer_id, "room member has no identity row");
			return Err(CloseReason::Internal);
		}
		Err(e) => {
			warn!(error = %e, "peer lookup failed");
			return Err(CloseReason::Internal);
		}
	};

	Ok(AuthorizedJoin { user, peer, room })
}

/// Close an upgraded socket with a taxonomy code.
pub async fn reject(mut socket: WebSocket, reason: CloseReason) {
	metrics::counter!("mutuals_server_joins_rejected_total").increment(1);

	let frame = CloseFrame {
		code: reason.code(),
		reason: reason.reason().into(),
	};
	let _ = socket.send(Message::Close(Some(frame))).await;
}

fn chat_event(sender: &Identity, body: &str, timestamp: i64) -> ServerEvent {
	ServerEvent::ChatMessage {
		message: body.to_string(),
		sender: sender.username.clone(),
		sender_name: sender.display().to_string(),
		timestamp,
	}
}

/// Drive one authorized room session until the socket goes away.
pub async fn serve_chat(socket: WebSocket, state: AppState, join: AuthorizedJoin) {
	struct SessionGaugeGuard;
	impl Drop for SessionGaugeGuard {
		fn drop(&mut self) {
			metrics::gauge!("mutuals_server_active_sessions").decrement(1.0);
		}
	}

	metrics::gauge!("mutuals_server_active_sessions").increment(1.0);
	let _session_guard = SessionGaugeGuard;
	metrics::counter!("mutuals_server_sessions_total").increment(1);

	let AuthorizedJoin { user, peer, room } = join;
	let room_channel = Channel::Room(room.id);
	let own_feed = Channel::Notifications(user.id);

	info!(room = %room.id, user = %user.id, "session opened");

	// Subscribe before touching the store so nothing published during
	// the catch-up window is missed.
	let mut room_rx = state.hub.subscribe(room_channel).await;
	let mut feed_rx = state.hub.subscribe(own_feed).await;

	let refresh = RefreshSink::new(state.hub.clone());

	let (mut ws_tx, mut ws_rx) = socket.split();

	// Entering the room consumes its unread backlog. The counterpart gets
	// a refresh signal so its view of the conversation catches up without
	// polling.
	match state.stores.messages.mark_all_read(room.id, user.id).await {
		Ok(_) => refresh.send_refresh(peer.id).await,
		Err(e) => warn!(error = %e, room = %room.id, "mark-read on join failed"),
	}

	loop {
		tokio::select! {
			msg = ws_rx.next() => {
				match msg {
					Some(Ok(Message::Text(text))) => {
						if !handle_inbound(&state, &refresh, &user, peer.id, &room, text.as_bytes(), &mut ws_tx).await {
							break;
						}
					}
					Some(Ok(Message::Close(_))) | None => break,
					Some(Ok(_)) => {}
					Some(Err(e)) => {
						debug!(error = %e, "websocket read error");
						break;
					}
				}
			}
			item = room_rx.recv() => {
				if !forward_item(item, &mut ws_tx).await {
					break;
				}
			}
			item = feed_rx.recv() => {
				if !forward_item(item, &mut ws_tx).await {
					break;
				}
			}
		}
	}

	drop(room_rx);
	drop(feed_rx);
	state.hub.prune_channel(&room_channel).await;
	state.hub.prune_channel(&own_feed).await;

	info!(room = %room.id, user = %user.id, "session closed");
}

/// Process one inbound frame. Returns false when the session must end.
pub(crate) async fn handle_inbound(
	state: &AppState,
	refresh: &RefreshSink,
	user: &Identity,
	peer: UserId,
	room: &Room,
	payload: &[u8],
	ws_tx: &mut (impl Sink<Message, Error = axum::Error> + Unpin),
) -> bool {
	let body = match decode_chat_frame(payload, MAX_INBOUND_FRAME_BYTES) {
		Ok(body) => body,
		Err(e) => {
			// Bad frames are a no-op for the connection.
			metrics::counter!("mutuals_server_frames_rejected_total").increment(1);
			debug!(error = %e, room = %room.id, "dropping inbound frame");
			return true;
		}
	};

	// Persist before fan-out: a message no subscriber sees right now is
	// still never lost.
	let stored = match state.stores.messages.append(room.id, user.id, &body).await {
		Ok(stored) => stored,
		Err(e) => {
			metrics::counter!("mutuals_server_store_failures_total").increment(1);
			warn!(error = %e, room = %room.id, "message append failed");

			let frame = CloseFrame {
				code: CloseReason::Internal.code(),
				reason: CloseReason::Internal.reason().into(),
			};
			let _ = ws_tx.send(Message::Close(Some(frame))).await;
			return false;
		}
	};

	metrics::counter!("mutuals_server_messages_total").increment(1);

	state
		.hub
		.publish(Channel::Room(room.id), chat_event(user, &stored.body, stored.sent_at_unix_ms))
		.await;
	refresh.send_increment(peer).await;

	true
}

/// Forward one hub item to the socket. Returns false when the session
/// must end.
async fn forward_item(item: Option<HubItem>, ws_tx: &mut (impl Sink<Message, Error = axum::Error> + Unpin)) -> bool {
	match item {
		Some(HubItem::Event(event)) => send_event(ws_tx, &event).await.is_ok(),
		Some(HubItem::Lagged { dropped }) => {
			metrics::counter!("mutuals_server_sessions_lagged_total").increment(1);
			warn!(dropped, "session lagged; events were dropped");

			// The client cannot trust its local view any more; tell it
			// to re-derive counters from the store.
			send_event(ws_tx, &ServerEvent::UnreadUpdate {
				action: UnreadAction::Refresh,
			})
			.await
			.is_ok()
		}
		None => false,
	}
}

async fn send_event(
	ws_tx: &mut (impl Sink<Message, Error = axum::Error> + Unpin),
	event: &ServerEvent,
) -> Result<(), ()> {
	let wire = match encode_event(event) {
		Ok(wire) => wire,
		Err(e) => {
			warn!(error = %e, "event serialization failed");
			return Err(());
		}
	};

	ws_tx.send(Message::Text(wire.into())).await.map_err(|_| ())
}
