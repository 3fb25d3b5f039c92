#![forbid(unsafe_code)]

use std::time::Duration;

use mutuals_domain::{Channel, RoomId, UserId};
use mutuals_protocol::{ServerEvent, UnreadAction};
use tokio::time::timeout;

use crate::server::hub::{BroadcastHub, BroadcastHubConfig, HubItem};

fn chat(text: &str) -> ServerEvent {
	ServerEvent::ChatMessage {
		message: text.to_string(),
		sender: "ada".to_string(),
		sender_name: "Ada".to_string(),
		timestamp: 0,
	}
}

#[tokio::test]
async fn subscribers_receive_events_for_their_channel_only() {
	let hub = BroadcastHub::new(BroadcastHubConfig {
		subscriber_queue_capacity: 16,
		debug_logs: false,
	});

	let room_a = Channel::Room(RoomId(1));
	let room_b = Channel::Room(RoomId(2));

	let mut rx_a = hub.subscribe(room_a).await;

	hub.publish(room_b, chat("b-1")).await;

	let got_unexpected = timeout(Duration::from_millis(50), rx_a.recv()).await;
	assert!(
		got_unexpected.is_err(),
		"subscriber for room A unexpectedly received an item for room B"
	);

	hub.publish(room_a, chat("a-1")).await;

	let item = timeout(Duration::from_millis(250), rx_a.recv())
		.await
		.expect("expected to receive within timeout")
		.expect("channel open");

	match item {
		HubItem::Event(ServerEvent::ChatMessage { message, .. }) => assert_eq!(message, "a-1"),
		other => panic!("expected chat event, got: {other:?}"),
	}
}

#[tokio::test]
async fn room_and_feed_channels_are_disjoint() {
	let hub = BroadcastHub::new(BroadcastHubConfig::default());

	let mut feed_rx = hub.subscribe(Channel::Notifications(UserId(7))).await;

	hub.publish(Channel::Room(RoomId(7)), chat("same numeric id")).await;

	let got_unexpected = timeout(Duration::from_millis(50), feed_rx.recv()).await;
	assert!(got_unexpected.is_err(), "feed received a room event");

	hub.publish(Channel::Notifications(UserId(7)), ServerEvent::UnreadUpdate {
		action: UnreadAction::Increment,
	})
	.await;

	let item = timeout(Duration::from_millis(250), feed_rx.recv())
		.await
		.expect("expected to receive within timeout")
		.expect("channel open");

	assert!(matches!(
		item,
		HubItem::Event(ServerEvent::UnreadUpdate {
			action: UnreadAction::Increment
		})
	));
}

#[tokio::test]
async fn dropped_subscribers_are_pruned() {
	let hub = BroadcastHub::new(BroadcastHubConfig {
		subscriber_queue_capacity: 16,
		debug_logs: false,
	});

	let room = Channel::Room(RoomId(1));

	{
		let _rx = hub.subscribe(room).await;
	}

	hub.prune_channel(&room).await;

	hub.publish(room, chat("a-1")).await;

	let counts = hub.channel_subscriber_counts().await;
	assert_eq!(counts.get(&room).copied().unwrap_or(0), 0);
}

#[tokio::test]
async fn bounded_queue_drops_and_emits_lagged_marker() {
	let hub = BroadcastHub::new(BroadcastHubConfig {
		subscriber_queue_capacity: 2,
		debug_logs: false,
	});

	let room = Channel::Room(RoomId(1));
	let mut rx = hub.subscribe(room).await;

	hub.publish(room, chat("a-1")).await;
	hub.publish(room, chat("a-2")).await;

	// Queue full: this one is dropped and counted as pending lag.
	hub.publish(room, chat("a-3")).await;

	for expected in ["a-1", "a-2"] {
		let item = timeout(Duration::from_millis(250), rx.recv())
			.await
			.expect("expected queued item")
			.expect("channel open");
		match item {
			HubItem::Event(ServerEvent::ChatMessage { message, .. }) => assert_eq!(message, expected),
			other => panic!("expected chat event, got: {other:?}"),
		}
	}

	// The queue drained; the next publish delivers the event and flushes
	// the pending lag marker behind it.
	hub.publish(room, chat("a-4")).await;

	let next = timeout(Duration::from_millis(250), rx.recv())
		.await
		.expect("expected delivered item")
		.expect("channel open");
	match next {
		HubItem::Event(ServerEvent::ChatMessage { message, .. }) => assert_eq!(message, "a-4"),
		other => panic!("expected chat event, got: {other:?}"),
	}

	let marker = timeout(Duration::from_millis(250), rx.recv())
		.await
		.expect("expected lag marker")
		.expect("channel open");
	match marker {
		HubItem::Lagged { dropped } => assert!(dropped >= 1, "expected dropped >= 1, got {dropped}"),
		other => panic!("expected lag marker, got: {other:?}"),
	}
}
