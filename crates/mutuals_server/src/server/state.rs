#![forbid(unsafe_code)]

use mutuals_store::Stores;
use mutuals_util::secret::SecretString;

use crate::server::health::HealthState;
use crate::server::hub::BroadcastHub;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
	pub stores: Stores,
	pub hub: BroadcastHub,
	pub health: HealthState,
	pub settings: SessionSettings,
}

/// Per-session knobs resolved from config at startup.
#[derive(Clone)]
pub struct SessionSettings {
	pub auth_hmac_secret: Option<SecretString>,
}
