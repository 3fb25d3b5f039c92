#![forbid(unsafe_code)]

use std::str::FromStr;

use anyhow::Context as _;
use mutuals_domain::{NotificationEvent, NotificationKind, UserId};
use mutuals_util::time::unix_ms_now;
use sqlx::SqlitePool;

/// Log of social notifications (follows, likes, comments, friendships).
#[derive(Clone)]
pub struct NotificationStore {
	pool: SqlitePool,
}

impl NotificationStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	pub async fn record(
		&self,
		recipient: UserId,
		sender: UserId,
		kind: NotificationKind,
		post_ref: Option<i64>,
	) -> anyhow::Result<NotificationEvent> {
		let created_at = unix_ms_now();
		let (id,): (i64,) = sqlx::query_as(
			"INSERT INTO notifications (recipient_id, sender_id, kind, post_ref, created_at) \
			 VALUES (?, ?, ?, ?, ?) RETURNING id",
		)
		.bind(recipient.as_i64())
		.bind(sender.as_i64())
		.bind(kind.as_str())
		.bind(post_ref)
		.bind(created_at)
		.fetch_one(&self.pool)
		.await
		.context("insert notification")?;

		Ok(NotificationEvent {
			id,
			recipient,
			sender,
			kind,
			post_ref,
			read: false,
			created_at_unix_ms: created_at,
		})
	}

	pub async fn unread_count(&self, recipient: UserId) -> anyhow::Result<i64> {
		let (count,): (i64,) =
			sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE recipient_id = ? AND read = 0")
				.bind(recipient.as_i64())
				.fetch_one(&self.pool)
				.await
				.context("count unread notifications")?;
		Ok(count)
	}

	pub async fn mark_all_read(&self, recipient: UserId) -> anyhow::Result<u64> {
		let result = sqlx::query("UPDATE notifications SET read = 1 WHERE recipient_id = ? AND read = 0")
			.bind(recipient.as_i64())
			.execute(&self.pool)
			.await
			.context("mark notifications read")?;
		Ok(result.rows_affected())
	}

	/// Most recent `limit` notifications, newest first.
	pub async fn recent(&self, recipient: UserId, limit: u32) -> anyhow::Result<Vec<NotificationEvent>> {
		let rows: Vec<(i64, i64, String, Option<i64>, i64, i64)> = sqlx::query_as(
			"SELECT id, sender_id, kind, post_ref, read, created_at FROM notifications \
			 WHERE recipient_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
		)
		.bind(recipient.as_i64())
		.bind(i64::from(limit))
		.fetch_all(&self.pool)
		.await
		.context("select recent notifications")?;

		rows.into_iter()
			.map(|(id, sender, kind, post_ref, read, created_at)| {
				let kind = NotificationKind::from_str(&kind)
					.with_context(|| format!("stored notification {id} has unknown kind {kind:?}"))?;
				Ok(NotificationEvent {
					id,
					recipient,
					sender: UserId(sender),
					kind,
					post_ref,
					read: read != 0,
					created_at_unix_ms: created_at,
				})
			})
			.collect()
	}

	/// Delete notifications of one kind from one sender, e.g. to retract
	/// follow and friend notifications when the sender unfollows.
	pub async fn remove_kind(
		&self,
		recipient: UserId,
		sender: UserId,
		kind: NotificationKind,
	) -> anyhow::Result<u64> {
		let result =
			sqlx::query("DELETE FROM notifications WHERE recipient_id = ? AND sender_id = ? AND kind = ?")
				.bind(recipient.as_i64())
				.bind(sender.as_i64())
				.bind(kind.as_str())
				.execute(&self.pool)
				.await
				.context("delete notifications by kind")?;
		Ok(result.rows_affected())
	}
}
