#![forbid(unsafe_code)]

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors for parsing identifiers from strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseIdError {
	#[error("empty value")]
	Empty,
	#[error("not a number: {0}")]
	NotNumeric(String),
	#[error("out of range: {0}")]
	OutOfRange(i64),
	#[error("invalid format: {0}")]
	InvalidFormat(String),
}

fn parse_positive(s: &str) -> Result<i64, ParseIdError> {
	let s = s.trim();
	if s.is_empty() {
		return Err(ParseIdError::Empty);
	}

	let n: i64 = s.parse().map_err(|_| ParseIdError::NotNumeric(s.to_string()))?;
	if n <= 0 {
		return Err(ParseIdError::OutOfRange(n));
	}

	Ok(n)
}

/// Opaque user identifier, owned by the external identity system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
	pub const fn as_i64(self) -> i64 {
		self.0
	}
}

impl fmt::Display for UserId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for UserId {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		parse_positive(s).map(UserId)
	}
}

/// Identifier of a 1:1 conversation room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub i64);

impl RoomId {
	pub const fn as_i64(self) -> i64 {
		self.0
	}
}

impl fmt::Display for RoomId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for RoomId {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		parse_positive(s).map(RoomId)
	}
}

/// Store-assigned message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// An authenticated user as the core sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
	pub id: UserId,
	pub username: String,
	pub display_name: Option<String>,
}

impl Identity {
	/// Display name with username fallback.
	pub fn display(&self) -> &str {
		match self.display_name.as_deref() {
			Some(name) if !name.trim().is_empty() => name,
			_ => &self.username,
		}
	}
}

/// Error constructing an unordered member pair.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PairError {
	#[error("a room needs two distinct members, got {0} twice")]
	SameUser(UserId),
}

/// Unordered pair of distinct user ids, normalized so `lo < hi`.
///
/// The unique key of a room: `RoomPair::new(a, b) == RoomPair::new(b, a)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomPair {
	lo: UserId,
	hi: UserId,
}

impl RoomPair {
	pub fn new(a: UserId, b: UserId) -> Result<Self, PairError> {
		if a == b {
			return Err(PairError::SameUser(a));
		}

		let (lo, hi) = if a < b { (a, b) } else { (b, a) };
		Ok(Self { lo, hi })
	}

	pub fn lo(&self) -> UserId {
		self.lo
	}

	pub fn hi(&self) -> UserId {
		self.hi
	}

	pub fn contains(&self, user: UserId) -> bool {
		self.lo == user || self.hi == user
	}

	/// The member that is not `user`, if `user` is a member at all.
	pub fn other(&self, user: UserId) -> Option<UserId> {
		if user == self.lo {
			Some(self.hi)
		} else if user == self.hi {
			Some(self.lo)
		} else {
			None
		}
	}
}

/// A 1:1 conversation channel between exactly two identities.
///
/// Created lazily on first authorized contact, never deleted in normal
/// operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
	pub id: RoomId,
	pub members: RoomPair,
	pub created_at_unix_ms: i64,
}

impl Room {
	pub fn is_member(&self, user: UserId) -> bool {
		self.members.contains(user)
	}

	pub fn other_member(&self, user: UserId) -> Option<UserId> {
		self.members.other(user)
	}
}

/// A persisted chat message.
///
/// `read` means any non-sender member has viewed the room since this
/// message was appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
	pub id: MessageId,
	pub room_id: RoomId,
	pub sender: UserId,
	pub body: String,
	pub sent_at_unix_ms: i64,
	pub read: bool,
}

/// Kinds of social notification the surrounding layer records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
	Follow,
	Like,
	Comment,
	Friend,
}

impl NotificationKind {
	/// Stable string identifier.
	pub const fn as_str(self) -> &'static str {
		match self {
			NotificationKind::Follow => "follow",
			NotificationKind::Like => "like",
			NotificationKind::Comment => "comment",
			NotificationKind::Friend => "friend",
		}
	}
}

impl fmt::Display for NotificationKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for NotificationKind {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim() {
			"" => Err(ParseIdError::Empty),
			"follow" => Ok(NotificationKind::Follow),
			"like" => Ok(NotificationKind::Like),
			"comment" => Ok(NotificationKind::Comment),
			"friend" => Ok(NotificationKind::Friend),
			other => Err(ParseIdError::InvalidFormat(other.to_string())),
		}
	}
}

/// A recorded social notification; the core only signals its arrival.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
	pub id: i64,
	pub recipient: UserId,
	pub sender: UserId,
	pub kind: NotificationKind,
	pub post_ref: Option<i64>,
	pub read: bool,
	pub created_at_unix_ms: i64,
}

/// A broadcast-group name: one per room, one per user's notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
	Room(RoomId),
	Notifications(UserId),
}

impl Channel {
	pub const ROOM_PREFIX: &'static str = "room:";
	pub const NOTIFICATIONS_PREFIX: &'static str = "notifications:";

	/// Parse a channel name of the form `room:<id>` or `notifications:<id>`.
	pub fn parse(s: &str) -> Result<Self, ParseIdError> {
		let s = s.trim();
		if s.is_empty() {
			return Err(ParseIdError::Empty);
		}

		if let Some(rest) = s.strip_prefix(Self::ROOM_PREFIX) {
			return rest.parse::<RoomId>().map(Channel::Room);
		}

		if let Some(rest) = s.strip_prefix(Self::NOTIFICATIONS_PREFIX) {
			return rest.parse::<UserId>().map(Channel::Notifications);
		}

		Err(ParseIdError::InvalidFormat(
			"expected room:<id> or notifications:<id>".into(),
		))
	}
}

impl fmt::Display for Channel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Channel::Room(id) => write!(f, "{}{id}", Self::ROOM_PREFIX),
			Channel::Notifications(id) => write!(f, "{}{id}", Self::NOTIFICATIONS_PREFIX),
		}
	}
}

impl FromStr for Channel {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Channel::parse(s)
	}
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;

	#[test]
	fn ids_parse_and_display() {
		assert_eq!("42".parse::<UserId>().unwrap(), UserId(42));
		assert_eq!(" 7 ".parse::<RoomId>().unwrap(), RoomId(7));
		assert_eq!(UserId(3).to_string(), "3");
	}

	#[test]
	fn rejects_bad_ids() {
		assert_eq!("".parse::<RoomId>().unwrap_err(), ParseIdError::Empty);
		assert!(matches!("abc".parse::<RoomId>(), Err(ParseIdError::NotNumeric(_))));
		assert!(matches!("-4".parse::<UserId>(), Err(ParseIdError::OutOfRange(-4))));
		assert!(matches!("0".parse::<RoomId>(), Err(ParseIdError::OutOfRange(0))));
	}

	#[test]
	fn pair_is_unordered_and_distinct() {
		let ab = RoomPair::new(UserId(2), UserId(9)).unwrap();
		let ba = RoomPair::new(UserId(9), UserId(2)).unwrap();
		assert_eq!(ab, ba);
		assert_eq!(ab.lo(), UserId(2));
		assert_eq!(ab.other(UserId(9)), Some(UserId(2)));
		assert_eq!(ab.other(UserId(5)), None);
		assert!(RoomPair::new(UserId(3), UserId(3)).is_err());
	}

	#[test]
	fn room_membership() {
		let room = Room {
			id: RoomId(1),
			members: RoomPair::new(UserId(1), UserId(2)).unwrap(),
			created_at_unix_ms: 0,
		};
		assert!(room.is_member(UserId(1)));
		assert!(!room.is_member(UserId(3)));
		assert_eq!(room.other_member(UserId(1)), Some(UserId(2)));
		assert_eq!(room.other_member(UserId(3)), None);
	}

	#[test]
	fn identity_display_falls_back_to_username() {
		let mut id = Identity {
			id: UserId(1),
			username: "ada".into(),
			display_name: Some("Ada Lovelace".into()),
		};
		assert_eq!(id.display(), "Ada Lovelace");

		id.display_name = Some("   ".into());
		assert_eq!(id.display(), "ada");

		id.display_name = None;
		assert_eq!(id.display(), "ada");
	}

	#[test]
	fn channel_parse_roundtrip() {
		let room = Channel::parse("room:12").unwrap();
		assert_eq!(room, Channel::Room(RoomId(12)));
		assert_eq!(room.to_string(), "room:12");

		let notif = Channel::parse("notifications:5").unwrap();
		assert_eq!(notif, Channel::Notifications(UserId(5)));
		assert_eq!(notif.to_string(), "notifications:5");
	}

	#[test]
	fn channel_rejects_junk() {
		assert!(Channel::parse("").is_err());
		assert!(Channel::parse("room:").is_err());
		assert!(Channel::parse("room:x").is_err());
		assert!(Channel::parse("presence:3").is_err());
	}

	#[test]
	fn notification_kind_roundtrip() {
		for kind in [
			NotificationKind::Follow,
			NotificationKind::Like,
			NotificationKind::Comment,
			NotificationKind::Friend,
		] {
			assert_eq!(kind.as_str().parse::<NotificationKind>().unwrap(), kind);
		}
		assert!("poke".parse::<NotificationKind>().is_err());
	}

	proptest! {
		#[test]
		fn pair_commutes(a in 1i64..10_000, b in 1i64..10_000) {
			prop_assume!(a != b);
			let x = RoomPair::new(UserId(a), UserId(b)).unwrap();
			let y = RoomPair::new(UserId(b), UserId(a)).unwrap();
			prop_assert_eq!(x, y);
			prop_assert!(x.lo() < x.hi());
		}

		#[test]
		fn channel_display_parse_roundtrip(id in 1i64..i64::MAX) {
			let room = Channel::Room(RoomId(id));
			prop_assert_eq!(Channel::parse(&room.to_string()).unwrap(), room);

			let notif = Channel::Notifications(UserId(id));
			prop_assert_eq!(Channel::parse(&notif.to_string()).unwrap(), notif);
		}
	}
}
