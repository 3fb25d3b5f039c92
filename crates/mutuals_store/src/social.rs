#![forbid(unsafe_code)]

use anyhow::Context as _;
use mutuals_domain::UserId;
use mutuals_util::time::unix_ms_now;
use sqlx::SqlitePool;

/// Oracle over the follow graph. Authorization asks one question:
/// do these two users follow each other?
#[derive(Clone)]
pub struct SocialGraph {
	pool: SqlitePool,
}

impl SocialGraph {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Record `follower` following `followee`. Idempotent.
	pub async fn follow(&self, follower: UserId, followee: UserId) -> anyhow::Result<()> {
		sqlx::query(
			"INSERT INTO follows (follower_id, followee_id, created_at) VALUES (?, ?, ?) \
			 ON CONFLICT (follower_id, followee_id) DO NOTHING",
		)
		.bind(follower.as_i64())
		.bind(followee.as_i64())
		.bind(unix_ms_now())
		.execute(&self.pool)
		.await
		.context("insert follow")?;
		Ok(())
	}

	/// Remove the follow edge if present. Returns whether it existed.
	pub async fn unfollow(&self, follower: UserId, followee: UserId) -> anyhow::Result<bool> {
		let result = sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followee_id = ?")
			.bind(follower.as_i64())
			.bind(followee.as_i64())
			.execute(&self.pool)
			.await
			.context("delete follow")?;
		Ok(result.rows_affected() > 0)
	}

	pub async fn is_following(&self, follower: UserId, followee: UserId) -> anyhow::Result<bool> {
		let (count,): (i64,) =
			sqlx::query_as("SELECT COUNT(*) FROM follows WHERE follower_id = ? AND followee_id = ?")
				.bind(follower.as_i64())
				.bind(followee.as_i64())
				.fetch_one(&self.pool)
				.await
				.context("select follow")?;
		Ok(count > 0)
	}

	/// Mutual follow between two distinct users. Never true for `a == b`.
	pub async fn are_friends(&self, a: UserId, b: UserId) -> anyhow::Result<bool> {
		if a == b {
			return Ok(false);
		}

		let (count,): (i64,) = sqlx::query_as(
			"SELECT COUNT(*) FROM follows f \
			 JOIN follows g ON g.follower_id = f.followee_id AND g.followee_id = f.follower_id \
			 WHERE f.follower_id = ? AND f.followee_id = ?",
		)
		.bind(a.as_i64())
		.bind(b.as_i64())
		.fetch_one(&self.pool)
		.await
		.context("select mutual follow")?;
		Ok(count > 0)
	}
}
