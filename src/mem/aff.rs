use crate::aff::Affinity;
use crate::node::TopologyVersion;
use crate::part::PartitionId;
use dashmap::DashMap;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// An in-memory affinity oracle with explicitly assigned ownership.
pub struct MemAffinity {
	/// The current cluster view
	version: Mutex<TopologyVersion>,
	/// The nodes each partition maps to
	owners: DashMap<PartitionId, Vec<Uuid>>,
}

impl MemAffinity {
	/// Create a new oracle at the given topology version
	pub fn new(version: TopologyVersion) -> Self {
		Self {
			version: Mutex::new(version),
			owners: DashMap::new(),
		}
	}

	/// Map a partition to a set of nodes
	pub fn assign(&self, partition: PartitionId, nodes: Vec<Uuid>) {
		self.owners.insert(partition, nodes);
	}

	/// Remove a node from the mapping of a partition
	pub fn unassign(&self, partition: PartitionId, node: Uuid) {
		if let Some(mut owners) = self.owners.get_mut(&partition) {
			owners.retain(|n| *n != node);
		}
	}

	/// Advance the cluster view to the next topology version
	pub fn advance(&self) -> TopologyVersion {
		let mut version = self.version.lock().unwrap_or_else(PoisonError::into_inner);
		*version = version.next();
		*version
	}
}

impl Affinity for MemAffinity {
	fn current_version(&self) -> TopologyVersion {
		*self.version.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn belongs(&self, node: Uuid, partition: PartitionId, version: TopologyVersion) -> bool {
		// A stale view never maps a partition to a node
		if version != self.current_version() {
			return false;
		}
		// Check the assigned owners of the partition
		self.owners.get(&partition).map(|owners| owners.contains(&node)).unwrap_or(false)
	}
}
