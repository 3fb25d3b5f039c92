#![forbid(unsafe_code)]

use axum::Router;
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use serde::Deserialize;

use crate::server::health::{healthz, readyz};
use crate::server::state::AppState;
use crate::server::{notify, session};

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/ws/chat/{room_id}", get(chat_ws))
		.route("/ws/notifications", get(notifications_ws))
		.route("/healthz", get(healthz))
		.route("/readyz", get(readyz))
		.with_state(state)
}

#[derive(Debug, Deserialize)]
struct AuthQuery {
	token: Option<String>,
}

/// Room gateway. The admission check runs after the upgrade so every
/// rejection reaches the client as a websocket close code rather than
/// an opaque failed handshake.
async fn chat_ws(
	Path(room_id): Path<String>,
	Query(auth): Query<AuthQuery>,
	State(state): State<AppState>,
	ws: WebSocketUpgrade,
) -> impl IntoResponse {
	ws.on_upgrade(move |socket| async move {
		match session::authorize(&state, auth.token.as_deref(), &room_id).await {
			Ok(join) => session::serve_chat(socket, state, join).await,
			Err(reason) => session::reject(socket, reason).await,
		}
	})
}

/// Notification-only gateway: identity is all the admission it needs.
async fn notifications_ws(
	Query(auth): Query<AuthQuery>,
	State(state): State<AppState>,
	ws: WebSocketUpgrade,
) -> impl IntoResponse {
	ws.on_upgrade(move |socket| async move {
		match session::authenticate(&state, auth.token.as_deref()).await {
			Ok(user) => notify::serve_notifications(socket, state, user).await,
			Err(reason) => session::reject(socket, reason).await,
		}
	})
}
