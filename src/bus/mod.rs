use crate::err::Error;
use crate::supply::SupplyMessage;
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

/// The I/O pool a bus message is processed on at the recipient.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum IoPolicy {
	/// The general system pool
	System,
	/// The dedicated rebalance pool
	#[default]
	Rebalance,
}

/// The delivery outcome of an ordered bus send.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum SendOutcome {
	/// The recipient acknowledged the message
	Delivered,
	/// The recipient has left the cluster
	RecipientGone,
}

/// An ordered, topic-addressed message bus between cluster nodes.
///
/// Messages sent to one node on one topic are delivered in emission order.
/// A send blocks until the message is acknowledged, the timeout elapses, or
/// the recipient is found to have left the cluster.
#[async_trait]
pub trait MessageBus: Send + Sync {
	/// Send a message on an ordered topic, blocking until acknowledged
	async fn send_ordered(
		&self,
		node: Uuid,
		topic: &str,
		msg: SupplyMessage,
		policy: IoPolicy,
		timeout: Duration,
	) -> Result<SendOutcome, Error>;
}
