#![forbid(unsafe_code)]

mod config;
mod server;

use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::server::health::HealthState;
use crate::server::hub::{BroadcastHub, BroadcastHubConfig};
use crate::server::routes::router;
use crate::server::state::{AppState, SessionSettings};

fn usage_and_exit() -> ! {
	eprintln!(
		"Usage: mutuals_server [--bind host:port] [--config path]\n\
\n\
Options:\n\
\t--bind    Bind address (default: 127.0.0.1:8323)\n\
\t--config  Config file path (default: ~/.mutuals/config.toml)\n\
\t--help    Show this help\n\
"
	);
	std::process::exit(2)
}

struct Args {
	bind: SocketAddr,
	config_path: Option<PathBuf>,
}

fn parse_args() -> Args {
	let mut bind = "127.0.0.1:8323".to_string();
	let mut config_path = None;

	let mut it = std::env::args().skip(1);
	while let Some(arg) = it.next() {
		match arg.as_str() {
			"--help" | "-h" => usage_and_exit(),
			"--bind" | "--listen" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				if v.trim().is_empty() {
					eprintln!("--bind must be non-empty (expected host:port)");
					usage_and_exit();
				}
				bind = v;
			}
			"--config" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				config_path = Some(PathBuf::from(v));
			}
			other => {
				eprintln!("Unknown argument: {other}");
				usage_and_exit();
			}
		}
	}

	let bind: SocketAddr = bind.parse().unwrap_or_else(|e| {
		eprintln!("invalid --bind address: {e}");
		usage_and_exit();
	});

	Args { bind, config_path }
}

fn init_tracing() {
	let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,mutuals_server=debug".to_string());

	tracing_subscriber::registry()
		.with(tracing_subscriber::EnvFilter::new(filter))
		.with(tracing_subscriber::fmt::layer().with_target(false))
		.init();
}

fn init_metrics(bind: Option<&str>) {
	let Some(bind) = bind else {
		return;
	};

	match bind.parse::<SocketAddr>() {
		Ok(addr) => {
			if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new()
				.with_http_listener(addr)
				.install()
			{
				warn!(error = %e, "failed to start metrics exporter");
			} else {
				info!(%addr, "metrics exporter listening");
			}
		}
		Err(e) => {
			warn!(error = %e, %bind, "invalid metrics bind address (expected host:port)");
		}
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	init_tracing();

	let args = parse_args();

	let config_path = match args.config_path {
		Some(path) => path,
		None => crate::config::default_config_path()?,
	};
	let server_cfg = crate::config::load_server_config_from_path(&config_path)?;
	info!(path = %config_path.display(), "loaded server config (toml + env overrides)");

	init_metrics(server_cfg.server.metrics_bind.as_deref());

	if server_cfg.server.auth_hmac_secret.is_none() {
		warn!("no auth_hmac_secret configured; every session will be rejected as unauthenticated");
	}

	let pool = match server_cfg.database.url.as_deref() {
		Some(url) => mutuals_store::connect(url).await?,
		None => {
			warn!("no database url configured; using a volatile in-memory database");
			mutuals_store::connect_in_memory().await?
		}
	};
	let stores = mutuals_store::Stores::new(pool);

	let hub = BroadcastHub::new(BroadcastHubConfig {
		subscriber_queue_capacity: server_cfg.server.subscriber_queue_capacity,
		debug_logs: cfg!(debug_assertions),
	});

	let health = HealthState::new();
	let state = AppState {
		stores,
		hub,
		health: health.clone(),
		settings: SessionSettings {
			auth_hmac_secret: server_cfg.server.auth_hmac_secret.clone(),
		},
	};

	let listener = tokio::net::TcpListener::bind(args.bind).await?;
	info!(bind = %args.bind, "mutuals_server: websocket gateway ready");

	health.mark_ready();

	axum::serve(listener, router(state)).await?;

	Ok(())
}
