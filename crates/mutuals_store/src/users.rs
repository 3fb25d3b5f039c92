#![forbid(unsafe_code)]

use anyhow::Context as _;
use mutuals_domain::{Identity, UserId};
use mutuals_util::time::unix_ms_now;
use sqlx::SqlitePool;

/// Read access to the external identity system's user records.
#[derive(Clone)]
pub struct UserDirectory {
	pool: SqlitePool,
}

impl UserDirectory {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Register a user. Used by the surrounding signup flow and by tests.
	pub async fn create(&self, username: &str, display_name: Option<&str>) -> anyhow::Result<Identity> {
		let (id,): (i64,) = sqlx::query_as(
			"INSERT INTO users (username, display_name, created_at) VALUES (?, ?, ?) RETURNING id",
		)
		.bind(username)
		.bind(display_name)
		.bind(unix_ms_now())
		.fetch_one(&self.pool)
		.await
		.context("insert user")?;

		Ok(Identity {
			id: UserId(id),
			username: username.to_string(),
			display_name: display_name.map(str::to_string),
		})
	}

	pub async fn get(&self, user: UserId) -> anyhow::Result<Option<Identity>> {
		let row: Option<(String, Option<String>)> =
			sqlx::query_as("SELECT username, display_name FROM users WHERE id = ?")
				.bind(user.as_i64())
				.fetch_optional(&self.pool)
				.await
				.context("select user")?;

		Ok(row.map(|(username, display_name)| Identity {
			id: user,
			username,
			display_name,
		}))
	}
}
