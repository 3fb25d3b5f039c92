#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;

use mutuals_domain::Channel;
use mutuals_protocol::ServerEvent;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// Per-channel hub that fans out server events to websocket sessions.
///
/// A channel is one room or one user's notification feed; every open
/// session subscribes to the channels it renders.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
	inner: Arc<Mutex<Inner>>,
	cfg: BroadcastHubConfig,
}

/// Configuration for `BroadcastHub`.
#[derive(Debug, Clone)]
pub struct BroadcastHubConfig {
	/// Maximum number of queued events per subscriber.
	pub subscriber_queue_capacity: usize,

	pub debug_logs: bool,
}

impl Default for BroadcastHubConfig {
	fn default() -> Self {
		Self {
			subscriber_queue_capacity: 1024,
			debug_logs: false,
		}
	}
}

/// Items emitted on a subscriber stream.
#[derive(Debug, Clone)]
pub enum HubItem {
	Event(ServerEvent),

	/// Indicates the subscriber is lagging and events were dropped.
	Lagged { dropped: u64 },
}

impl BroadcastHub {
	pub fn new(cfg: BroadcastHubConfig) -> Self {
		Self {
			inner: Arc::new(Mutex::new(Inner::default())),
			cfg,
		}
	}

	/// Subscribe to a channel.
	pub async fn subscribe(&self, channel: Channel) -> mpsc::Receiver<HubItem> {
		let (tx, rx) = mpsc::channel(self.cfg.subscriber_queue_capacity);

		let mut inner = self.inner.lock().await;
		let entry = inner.channels.entry(channel).or_default();

		prune_closed_subscribers(entry);

		entry.subscribers.push(tx);
		entry.pending_lag_by_subscriber.push(0);

		if self.cfg.debug_logs {
			debug!(channel = %channel, subs = entry.subscribers.len(), "hub: subscribed");
		}

		rx
	}

	/// Unsubscribe bookkeeping for a given channel.
	pub async fn prune_channel(&self, channel: &Channel) {
		let mut inner = self.inner.lock().await;
		if let Some(entry) = inner.channels.get_mut(channel) {
			prune_closed_subscribers(entry);

			if entry.subscribers.is_empty() {
				inner.channels.remove(channel);
			}
		}
	}

	/// Publish an event to every live subscriber of a channel.
	///
	/// Best-effort: a subscriber with a full queue loses the event and
	/// later receives a single lag marker carrying the drop count.
	pub async fn publish(&self, channel: Channel, event: ServerEvent) {
		self.publish_item(channel, HubItem::Event(event)).await;
	}

	pub(crate) async fn publish_item(&self, channel: Channel, item: HubItem) {
		let mut inner = self.inner.lock().await;
		let Some(entry) = inner.channels.get_mut(&channel) else {
			return;
		};

		prune_closed_subscribers(entry);

		if entry.subscribers.is_empty() {
			inner.channels.remove(&channel);
			return;
		}

		let mut dropped_total: u64 = 0;

		for (idx, sub) in entry.subscribers.iter_mut().enumerate() {
			match sub.try_send(item.clone()) {
				Ok(()) => {
					if let Some(pending) = entry.pending_lag_by_subscriber.get_mut(idx)
						&& *pending > 0 && sub.try_send(HubItem::Lagged { dropped: *pending }).is_ok()
					{
						*pending = 0;
					}
				}
				Err(mpsc::error::TrySendError::Full(_)) => {
					dropped_total += 1;

					if let Some(pending) = entry.pending_lag_by_subscriber.get_mut(idx) {
						*pending = pending.saturating_add(1);
					}
				}
				Err(mpsc::error::TrySendError::Closed(_)) => {}
			}
		}

		prune_closed_subscribers(entry);

		if entry.subscribers.is_empty() {
			inner.channels.remove(&channel);
		}

		if dropped_total > 0 {
			metrics::counter!("mutuals_server_hub_dropped_total").increment(dropped_total);

			if self.cfg.debug_logs {
				debug!(
					channel = %channel,
					dropped = dropped_total,
					"hub: dropped due to full subscriber queues"
				);
			}
		}
	}

	/// Get a snapshot of subscriber counts per channel.
	pub async fn channel_subscriber_counts(&self) -> HashMap<Channel, usize> {
		let inner = self.inner.lock().await;
		inner
			.channels
			.iter()
			.map(|(k, v)| (*k, v.subscribers.iter().filter(|s| !s.is_closed()).count()))
			.collect()
	}
}

#[derive(Debug, Default)]
struct Inner {
	channels: HashMap<Channel, ChannelEntry>,
}

#[derive(Debug, Default)]
struct ChannelEntry {
	subscribers: Vec<mpsc::Sender<HubItem>>,

	/// Pending lag markers per subscriber.
	pending_lag_by_subscriber: Vec<u64>,
}

fn prune_closed_subscribers(entry: &mut ChannelEntry) {
	if entry.subscribers.len() != entry.pending_lag_by_subscriber.len() {
		entry.pending_lag_by_subscriber.resize(entry.subscribers.len(), 0);
	}

	let mut new_subs = Vec::with_capacity(entry.subscribers.len());
	let mut new_lag = Vec::with_capacity(entry.subscribers.len());

	for (idx, s) in entry.subscribers.drain(..).enumerate() {
		if !s.is_closed() {
			new_subs.push(s);
			new_lag.push(*entry.pending_lag_by_subscriber.get(idx).unwrap_or(&0));
		}
	}

	entry.subscribers = new_subs;
	entry.pending_lag_by_subscriber = new_lag;
}
