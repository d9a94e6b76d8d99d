use super::supplier::Supplier;
use crate::node::{ClusterEvent, ClusterEventKind};
use channel::Receiver;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

const TARGET: &str = "tesseradb::core::supply::events";

impl Supplier {
	/// Subscribe this supplier to the cluster membership events.
	///
	/// Spawns a task which, for every node that leaves or fails, or towards
	/// which rebalancing is stopped, removes and evicts the supply contexts
	/// stored for that node. Eviction closes any open cursor, deregisters
	/// any registered listener, and gives back the partition lease; errors
	/// during eviction are logged and swallowed.
	pub fn subscribe(self: Arc<Self>, events: Receiver<ClusterEvent>) -> JoinHandle<()> {
		let supplier = self;
		tokio::spawn(async move {
			// Process membership events until the channel closes
			while let Ok(event) = events.recv().await {
				supplier.on_event(event);
			}
			trace!(target: TARGET, "Cluster event channel closed");
		})
	}

	/// React to one cluster membership event
	pub(crate) fn on_event(&self, event: ClusterEvent) {
		match event.kind {
			ClusterEventKind::NodeLeft
			| ClusterEventKind::NodeFailed
			| ClusterEventKind::RebalanceStopped => {
				debug!(
					target: TARGET,
					node = %event.node,
					kind = ?event.kind,
					"Evicting the supply contexts of a departed demander"
				);
				self.evict_node(event.node);
			}
		}
	}

	/// Remove and reclaim every context stored for a node
	fn evict_node(&self, node: Uuid) {
		// Check every worker slot the node could have demanded on
		for slot in 0..self.options.rebalance_thread_pool_size {
			if let Some(mut ctx) = self.contexts.remove(node, slot) {
				trace!(target: TARGET, %node, slot, "Evicting a supply context");
				ctx.evict();
			}
		}
	}
}
