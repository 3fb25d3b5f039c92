#![forbid(unsafe_code)]

//! Sqlite-backed collaborators of the realtime core: user directory,
//! social graph oracle, room directory, message store, notification
//! store. All handles are cheap clones over one shared pool; the stores
//! provide their own atomicity for single-statement mutations.

mod messages;
mod notifications;
mod rooms;
mod social;
mod users;

use std::str::FromStr;

use anyhow::Context as _;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub use crate::messages::MessageStore;
pub use crate::notifications::NotificationStore;
pub use crate::rooms::RoomDirectory;
pub use crate::social::SocialGraph;
pub use crate::users::UserDirectory;

/// Connect to the database and run embedded migrations.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
	let options = SqliteConnectOptions::from_str(database_url)
		.with_context(|| format!("parse database url: {database_url}"))?
		.create_if_missing(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(16)
		.connect_with(options)
		.await
		.context("connect sqlite")?;

	sqlx::migrate!().run(&pool).await.context("run migrations")?;
	Ok(pool)
}

/// In-memory database for tests and the dev default.
///
/// Single-connection pool: every handle must see the same in-memory db.
pub async fn connect_in_memory() -> anyhow::Result<SqlitePool> {
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect("sqlite::memory:")
		.await
		.context("connect in-memory sqlite")?;

	sqlx::migrate!().run(&pool).await.context("run migrations")?;
	Ok(pool)
}

/// Bundle of every store handle the server needs.
#[derive(Clone)]
pub struct Stores {
	pub users: UserDirectory,
	pub social: SocialGraph,
	pub rooms: RoomDirectory,
	pub messages: MessageStore,
	pub notifications: NotificationStore,
}

impl Stores {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			users: UserDirectory::new(pool.clone()),
			social: SocialGraph::new(pool.clone()),
			rooms: RoomDirectory::new(pool.clone()),
			messages: MessageStore::new(pool.clone()),
			notifications: NotificationStore::new(pool),
		}
	}
}
