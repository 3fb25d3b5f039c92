#![forbid(unsafe_code)]

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt as _, StreamExt as _};
use mutuals_domain::{Channel, Identity, UserId};
use mutuals_protocol::{ServerEvent, UnreadAction, encode_event};
use tracing::{debug, info};

use crate::server::hub::{BroadcastHub, HubItem};
use crate::server::state::AppState;

/// Handle for pushing unread-badge signals into a user's feed channel.
///
/// The signal carries no counts; receivers re-derive their badge from
/// the store.
#[derive(Clone)]
pub struct RefreshSink {
	hub: BroadcastHub,
}

impl RefreshSink {
	pub fn new(hub: BroadcastHub) -> Self {
		Self { hub }
	}

	/// Tell every session of `user` to re-fetch its unread counters.
	pub async fn send_refresh(&self, user: UserId) {
		self.hub
			.publish(Channel::Notifications(user), ServerEvent::UnreadUpdate {
				action: UnreadAction::Refresh,
			})
			.await;
	}

	/// Tell every session of `user` that one more unread item exists.
	pub async fn send_increment(&self, user: UserId) {
		self.hub
			.publish(Channel::Notifications(user), ServerEvent::UnreadUpdate {
				action: UnreadAction::Increment,
			})
			.await;
	}
}

/// Drive a notification-only session: no inbound protocol, just badge
/// signals until the socket goes away.
pub async fn serve_notifications(socket: WebSocket, state: AppState, user: Identity) {
	struct FeedGaugeGuard;
	impl Drop for FeedGaugeGuard {
		fn drop(&mut self) {
			metrics::gauge!("mutuals_server_active_feeds").decrement(1.0);
		}
	}

	metrics::gauge!("mutuals_server_active_feeds").increment(1.0);
	let _feed_guard = FeedGaugeGuard;

	let feed = Channel::Notifications(user.id);
	info!(user = %user.id, "feed session opened");

	let mut feed_rx = state.hub.subscribe(feed).await;
	let (mut ws_tx, mut ws_rx) = socket.split();

	// Fresh sessions start from the store, not from whatever the client
	// last cached.
	let opening = ServerEvent::UnreadUpdate {
		action: UnreadAction::Refresh,
	};
	if let Ok(wire) = encode_event(&opening)
		&& ws_tx.send(Message::Text(wire.into())).await.is_err()
	{
		state.hub.prune_channel(&feed).await;
		return;
	}

	loop {
		tokio::select! {
			msg = ws_rx.next() => {
				match msg {
					// Inbound frames on the feed socket are ignored.
					Some(Ok(Message::Close(_))) | None => break,
					Some(Ok(_)) => {}
					Some(Err(e)) => {
						debug!(error = %e, "feed websocket read error");
						break;
					}
				}
			}
			item = feed_rx.recv() => {
				match item {
					Some(HubItem::Event(event)) => {
						let Ok(wire) = encode_event(&event) else {
							continue;
						};
						if ws_tx.send(Message::Text(wire.into())).await.is_err() {
							break;
						}
					}
					Some(HubItem::Lagged { .. }) => {
						// A missed signal collapses into one refresh.
						let refresh = ServerEvent::UnreadUpdate {
							action: UnreadAction::Refresh,
						};
						let Ok(wire) = encode_event(&refresh) else {
							continue;
						};
						if ws_tx.send(Message::Text(wire.into())).await.is_err() {
							break;
						}
					}
					None => break,
				}
			}
		}
	}

	drop(feed_rx);
	state.hub.prune_channel(&feed).await;

	info!(user = %user.id, "feed session closed");
}
