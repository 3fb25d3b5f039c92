#![forbid(unsafe_code)]

use anyhow::Context as _;
use mutuals_domain::{MessageId, RoomId, StoredMessage, UserId};
use mutuals_util::time::unix_ms_now;
use sqlx::SqlitePool;

/// Durable per-room message log with unread bookkeeping.
#[derive(Clone)]
pub struct MessageStore {
	pool: SqlitePool,
}

impl MessageStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Append a message.
	///
	/// Timestamps within a room never go backwards: the stored `sent_at`
	/// is the wall clock clamped to the room's current maximum.
	pub async fn append(&self, room: RoomId, sender: UserId, body: &str) -> anyhow::Result<StoredMessage> {
		let (id, sent_at): (i64, i64) = sqlx::query_as(
			"INSERT INTO messages (room_id, sender_id, body, sent_at) \
			 VALUES (?1, ?2, ?3, MAX(?4, COALESCE((SELECT MAX(sent_at) FROM messages WHERE room_id = ?1), 0))) \
			 RETURNING id, sent_at",
		)
		.bind(room.as_i64())
		.bind(sender.as_i64())
		.bind(body)
		.bind(unix_ms_now())
		.fetch_one(&self.pool)
		.await
		.context("insert message")?;

		Ok(StoredMessage {
			id: MessageId(id),
			room_id: room,
			sender,
			body: body.to_string(),
			sent_at_unix_ms: sent_at,
			read: false,
		})
	}

	/// Mark every message in the room not sent by `reader` as read.
	pub async fn mark_all_read(&self, room: RoomId, reader: UserId) -> anyhow::Result<u64> {
		let result = sqlx::query("UPDATE messages SET read = 1 WHERE room_id = ? AND sender_id <> ? AND read = 0")
			.bind(room.as_i64())
			.bind(reader.as_i64())
			.execute(&self.pool)
			.await
			.context("mark messages read")?;
		Ok(result.rows_affected())
	}

	/// Unread messages in one room, as seen by `reader`.
	pub async fn unread_count(&self, room: RoomId, reader: UserId) -> anyhow::Result<i64> {
		let (count,): (i64,) = sqlx::query_as(
			"SELECT COUNT(*) FROM messages WHERE room_id = ? AND sender_id <> ? AND read = 0",
		)
		.bind(room.as_i64())
		.bind(reader.as_i64())
		.fetch_one(&self.pool)
		.await
		.context("count unread messages")?;
		Ok(count)
	}

	/// Unread messages across every room the user is a member of.
	pub async fn unread_total(&self, user: UserId) -> anyhow::Result<i64> {
		let (count,): (i64,) = sqlx::query_as(
			"SELECT COUNT(*) FROM messages m \
			 JOIN rooms r ON r.id = m.room_id \
			 WHERE (r.member_lo = ?1 OR r.member_hi = ?1) AND m.sender_id <> ?1 AND m.read = 0",
		)
		.bind(user.as_i64())
		.fetch_one(&self.pool)
		.await
		.context("count unread total")?;
		Ok(count)
	}

	/// Most recent `limit` messages of a room, oldest first.
	pub async fn history(&self, room: RoomId, limit: u32) -> anyhow::Result<Vec<StoredMessage>> {
		let rows: Vec<(i64, i64, String, i64, i64)> = sqlx::query_as(
			"SELECT id, sender_id, body, sent_at, read FROM \
			 (SELECT * FROM messages WHERE room_id = ? ORDER BY sent_at DESC, id DESC LIMIT ?) \
			 ORDER BY sent_at, id",
		)
		.bind(room.as_i64())
		.bind(i64::from(limit))
		.fetch_all(&self.pool)
		.await
		.context("select message history")?;

		Ok(rows
			.into_iter()
			.map(|(id, sender, body, sent_at, read)| StoredMessage {
				id: MessageId(id),
				room_id: room,
				sender: UserId(sender),
				body,
				sent_at_unix_ms: sent_at,
				read: read != 0,
			})
			.collect())
	}
}
