use crate::bus::{IoPolicy, MessageBus, SendOutcome};
use crate::err::Error;
use crate::supply::SupplyMessage;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::time::Duration;
use uuid::Uuid;

/// An in-process message bus backed by per-node inbox channels.
///
/// Per-node channels preserve the emission order of messages, which models
/// the ordered-topic delivery guarantee of a real cluster bus.
pub struct MemBus {
	/// The inbox of each registered node
	inboxes: DashMap<Uuid, channel::Sender<(String, SupplyMessage)>>,
	/// The nodes which have left the cluster
	gone: DashSet<Uuid>,
}

impl Default for MemBus {
	fn default() -> Self {
		Self::new()
	}
}

impl MemBus {
	/// Create a new in-process bus
	pub fn new() -> Self {
		Self {
			inboxes: DashMap::new(),
			gone: DashSet::new(),
		}
	}

	/// Register a node, returning the receiving side of its inbox
	pub fn register(&self, node: Uuid) -> channel::Receiver<(String, SupplyMessage)> {
		let (tx, rx) = channel::unbounded();
		self.inboxes.insert(node, tx);
		rx
	}

	/// Mark a node as having left the cluster
	pub fn depart(&self, node: Uuid) {
		self.gone.insert(node);
		self.inboxes.remove(&node);
	}
}

#[async_trait]
impl MessageBus for MemBus {
	async fn send_ordered(
		&self,
		node: Uuid,
		topic: &str,
		msg: SupplyMessage,
		_policy: IoPolicy,
		_timeout: Duration,
	) -> Result<SendOutcome, Error> {
		// A departed recipient is reported, never errored
		if self.gone.contains(&node) {
			return Ok(SendOutcome::RecipientGone);
		}
		// Fetch the inbox sender without holding the map entry
		let tx = match self.inboxes.get(&node) {
			Some(tx) => tx.value().clone(),
			None => return Ok(SendOutcome::RecipientGone),
		};
		// Deliver the message to the recipient inbox
		match tx.send((topic.to_string(), msg)).await {
			Ok(()) => Ok(SendOutcome::Delivered),
			Err(_) => Ok(SendOutcome::RecipientGone),
		}
	}
}
