#![forbid(unsafe_code)]

use anyhow::Context as _;
use mutuals_domain::{Room, RoomId, RoomPair, UserId};
use mutuals_util::time::unix_ms_now;
use sqlx::SqlitePool;

/// Directory of 1:1 rooms, keyed by their normalized member pair.
#[derive(Clone)]
pub struct RoomDirectory {
	pool: SqlitePool,
}

fn room_from_row(id: i64, lo: i64, hi: i64, created_at: i64) -> anyhow::Result<Room> {
	let members = RoomPair::new(UserId(lo), UserId(hi)).context("stored room has a degenerate member pair")?;
	Ok(Room {
		id: RoomId(id),
		members,
		created_at_unix_ms: created_at,
	})
}

impl RoomDirectory {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	pub async fn get(&self, room: RoomId) -> anyhow::Result<Option<Room>> {
		let row: Option<(i64, i64, i64)> =
			sqlx::query_as("SELECT member_lo, member_hi, created_at FROM rooms WHERE id = ?")
				.bind(room.as_i64())
				.fetch_optional(&self.pool)
				.await
				.context("select room")?;

		row.map(|(lo, hi, created_at)| room_from_row(room.as_i64(), lo, hi, created_at))
			.transpose()
	}

	/// Find or lazily create the room for a member pair.
	///
	/// Insert-then-select so two racing callers converge on one row.
	pub async fn get_or_create(&self, pair: RoomPair) -> anyhow::Result<Room> {
		sqlx::query(
			"INSERT INTO rooms (member_lo, member_hi, created_at) VALUES (?, ?, ?) \
			 ON CONFLICT (member_lo, member_hi) DO NOTHING",
		)
		.bind(pair.lo().as_i64())
		.bind(pair.hi().as_i64())
		.bind(unix_ms_now())
		.execute(&self.pool)
		.await
		.context("insert room")?;

		let (id, created_at): (i64, i64) =
			sqlx::query_as("SELECT id, created_at FROM rooms WHERE member_lo = ? AND member_hi = ?")
				.bind(pair.lo().as_i64())
				.bind(pair.hi().as_i64())
				.fetch_one(&self.pool)
				.await
				.context("select room by pair")?;

		Ok(Room {
			id: RoomId(id),
			members: pair,
			created_at_unix_ms: created_at,
		})
	}

	/// Every room the user is a member of, oldest first.
	pub async fn rooms_for(&self, user: UserId) -> anyhow::Result<Vec<Room>> {
		let rows: Vec<(i64, i64, i64, i64)> = sqlx::query_as(
			"SELECT id, member_lo, member_hi, created_at FROM rooms \
			 WHERE member_lo = ? OR member_hi = ? ORDER BY id",
		)
		.bind(user.as_i64())
		.bind(user.as_i64())
		.fetch_all(&self.pool)
		.await
		.context("select rooms for user")?;

		rows.into_iter()
			.map(|(id, lo, hi, created_at)| room_from_row(id, lo, hi, created_at))
			.collect()
	}
}
