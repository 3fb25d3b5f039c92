use mutuals_domain::{NotificationKind, RoomPair, UserId};
use mutuals_store::{Stores, connect_in_memory};

async fn fresh() -> Stores {
	let pool = connect_in_memory().await.expect("in-memory pool");
	Stores::new(pool)
}

async fn two_users(stores: &Stores) -> (UserId, UserId) {
	let ada = stores.users.create("ada", Some("Ada Lovelace")).await.expect("create ada");
	let bob = stores.users.create("bob", None).await.expect("create bob");
	(ada.id, bob.id)
}

#[tokio::test]
async fn user_lookup_roundtrip() {
	let stores = fresh().await;
	let created = stores.users.create("ada", Some("Ada Lovelace")).await.expect("create");

	let found = stores.users.get(created.id).await.expect("get").expect("present");
	assert_eq!(found, created);
	assert_eq!(found.display(), "Ada Lovelace");

	assert!(stores.users.get(UserId(9999)).await.expect("get").is_none());
}

#[tokio::test]
async fn friendship_requires_both_directions() {
	let stores = fresh().await;
	let (ada, bob) = two_users(&stores).await;

	assert!(!stores.social.are_friends(ada, bob).await.expect("query"));

	stores.social.follow(ada, bob).await.expect("follow");
	assert!(stores.social.is_following(ada, bob).await.expect("query"));
	assert!(!stores.social.are_friends(ada, bob).await.expect("query"));

	stores.social.follow(bob, ada).await.expect("follow back");
	assert!(stores.social.are_friends(ada, bob).await.expect("query"));
	assert!(stores.social.are_friends(bob, ada).await.expect("query"));
	assert!(!stores.social.are_friends(ada, ada).await.expect("query"));
}

#[tokio::test]
async fn unfollow_breaks_friendship() {
	let stores = fresh().await;
	let (ada, bob) = two_users(&stores).await;

	stores.social.follow(ada, bob).await.expect("follow");
	stores.social.follow(bob, ada).await.expect("follow back");
	assert!(stores.social.are_friends(ada, bob).await.expect("query"));

	assert!(stores.social.unfollow(ada, bob).await.expect("unfollow"));
	assert!(!stores.social.are_friends(ada, bob).await.expect("query"));
	assert!(stores.social.is_following(bob, ada).await.expect("query"));

	assert!(!stores.social.unfollow(ada, bob).await.expect("second unfollow"));
}

#[tokio::test]
async fn follow_is_idempotent() {
	let stores = fresh().await;
	let (ada, bob) = two_users(&stores).await;

	stores.social.follow(ada, bob).await.expect("follow");
	stores.social.follow(ada, bob).await.expect("repeat follow");
	assert!(stores.social.is_following(ada, bob).await.expect("query"));
}

#[tokio::test]
async fn get_or_create_converges_and_commutes() {
	let stores = fresh().await;
	let (ada, bob) = two_users(&stores).await;

	let ab = RoomPair::new(ada, bob).expect("pair");
	let ba = RoomPair::new(bob, ada).expect("pair");

	let first = stores.rooms.get_or_create(ab).await.expect("create");
	let second = stores.rooms.get_or_create(ba).await.expect("find");
	assert_eq!(first.id, second.id);
	assert_eq!(first.members, second.members);

	let fetched = stores.rooms.get(first.id).await.expect("get").expect("present");
	assert_eq!(fetched.id, first.id);
	assert!(fetched.is_member(ada));
	assert_eq!(fetched.other_member(ada), Some(bob));

	let rooms = stores.rooms.rooms_for(ada).await.expect("rooms for");
	assert_eq!(rooms.len(), 1);
	assert_eq!(rooms[0].id, first.id);
}

#[tokio::test]
async fn timestamps_never_go_backwards_within_a_room() {
	let stores = fresh().await;
	let (ada, bob) = two_users(&stores).await;
	let room = stores
		.rooms
		.get_or_create(RoomPair::new(ada, bob).expect("pair"))
		.await
		.expect("room");

	let mut last = 0i64;
	for i in 0..20 {
		let msg = stores
			.messages
			.append(room.id, if i % 2 == 0 { ada } else { bob }, "hello")
			.await
			.expect("append");
		assert!(msg.sent_at_unix_ms >= last, "timestamp regressed");
		last = msg.sent_at_unix_ms;
	}

	let history = stores.messages.history(room.id, 50).await.expect("history");
	assert_eq!(history.len(), 20);
	assert!(history.windows(2).all(|w| w[0].sent_at_unix_ms <= w[1].sent_at_unix_ms));
}

#[tokio::test]
async fn history_keeps_the_most_recent_messages() {
	let stores = fresh().await;
	let (ada, bob) = two_users(&stores).await;
	let room = stores
		.rooms
		.get_or_create(RoomPair::new(ada, bob).expect("pair"))
		.await
		.expect("room");

	for i in 0..10 {
		stores
			.messages
			.append(room.id, ada, &format!("message {i}"))
			.await
			.expect("append");
	}

	let tail = stores.messages.history(room.id, 3).await.expect("history");
	assert_eq!(tail.len(), 3);
	assert_eq!(tail[0].body, "message 7");
	assert_eq!(tail[2].body, "message 9");
}

#[tokio::test]
async fn mark_all_read_skips_own_messages() {
	let stores = fresh().await;
	let (ada, bob) = two_users(&stores).await;
	let room = stores
		.rooms
		.get_or_create(RoomPair::new(ada, bob).expect("pair"))
		.await
		.expect("room");

	stores.messages.append(room.id, ada, "one").await.expect("append");
	stores.messages.append(room.id, ada, "two").await.expect("append");
	stores.messages.append(room.id, bob, "reply").await.expect("append");

	assert_eq!(stores.messages.unread_count(room.id, bob).await.expect("count"), 2);
	assert_eq!(stores.messages.unread_count(room.id, ada).await.expect("count"), 1);

	// Ada reads the room: only Bob's message flips.
	assert_eq!(stores.messages.mark_all_read(room.id, ada).await.expect("mark"), 1);
	assert_eq!(stores.messages.unread_count(room.id, ada).await.expect("count"), 0);
	assert_eq!(stores.messages.unread_count(room.id, bob).await.expect("count"), 2);
}

#[tokio::test]
async fn unread_total_sums_across_rooms() {
	let stores = fresh().await;
	let ada = stores.users.create("ada", None).await.expect("ada").id;
	let bob = stores.users.create("bob", None).await.expect("bob").id;
	let eve = stores.users.create("eve", None).await.expect("eve").id;

	let room_ab = stores
		.rooms
		.get_or_create(RoomPair::new(ada, bob).expect("pair"))
		.await
		.expect("room");
	let room_ae = stores
		.rooms
		.get_or_create(RoomPair::new(ada, eve).expect("pair"))
		.await
		.expect("room");

	stores.messages.append(room_ab.id, bob, "hi").await.expect("append");
	stores.messages.append(room_ab.id, bob, "there").await.expect("append");
	stores.messages.append(room_ae.id, eve, "hello").await.expect("append");
	stores.messages.append(room_ab.id, ada, "own message").await.expect("append");

	assert_eq!(stores.messages.unread_total(ada).await.expect("total"), 3);
	assert_eq!(stores.messages.unread_total(bob).await.expect("total"), 1);
	assert_eq!(stores.messages.unread_total(eve).await.expect("total"), 0);

	stores.messages.mark_all_read(room_ab.id, ada).await.expect("mark");
	assert_eq!(stores.messages.unread_total(ada).await.expect("total"), 1);
}

#[tokio::test]
async fn notification_lifecycle() {
	let stores = fresh().await;
	let (ada, bob) = two_users(&stores).await;

	let follow = stores
		.notifications
		.record(ada, bob, NotificationKind::Follow, None)
		.await
		.expect("record");
	stores
		.notifications
		.record(ada, bob, NotificationKind::Like, Some(42))
		.await
		.expect("record");

	assert_eq!(stores.notifications.unread_count(ada).await.expect("count"), 2);
	assert_eq!(stores.notifications.unread_count(bob).await.expect("count"), 0);

	let recent = stores.notifications.recent(ada, 10).await.expect("recent");
	assert_eq!(recent.len(), 2);
	assert_eq!(recent[1].id, follow.id);
	assert_eq!(recent[0].kind, NotificationKind::Like);
	assert_eq!(recent[0].post_ref, Some(42));

	assert_eq!(stores.notifications.mark_all_read(ada).await.expect("mark"), 2);
	assert_eq!(stores.notifications.unread_count(ada).await.expect("count"), 0);
}

#[tokio::test]
async fn unfollow_retracts_follow_and_friend_notifications() {
	let stores = fresh().await;
	let (ada, bob) = two_users(&stores).await;

	stores
		.notifications
		.record(ada, bob, NotificationKind::Follow, None)
		.await
		.expect("record");
	stores
		.notifications
		.record(ada, bob, NotificationKind::Friend, None)
		.await
		.expect("record");
	stores
		.notifications
		.record(ada, bob, NotificationKind::Like, Some(7))
		.await
		.expect("record");

	let removed = stores
		.notifications
		.remove_kind(ada, bob, NotificationKind::Follow)
		.await
		.expect("remove follow");
	let removed = removed
		+ stores
			.notifications
			.remove_kind(ada, bob, NotificationKind::Friend)
			.await
			.expect("remove friend");
	assert_eq!(removed, 2);

	let recent = stores.notifications.recent(ada, 10).await.expect("recent");
	assert_eq!(recent.len(), 1);
	assert_eq!(recent[0].kind, NotificationKind::Like);
}
