use crate::node::TopologyVersion;
use crate::part::PartitionId;
use uuid::Uuid;

/// The mapping from partitions to the nodes responsible for them at a
/// given topology version. The supply engine consults the oracle to drop
/// demands issued against a stale cluster view, and to re-validate on every
/// entry that a demander still maps to the partition being supplied.
pub trait Affinity: Send + Sync {
	/// The topology version of the current cluster view
	fn current_version(&self) -> TopologyVersion;
	/// Check whether a partition maps to a node at a topology version
	fn belongs(&self, node: Uuid, partition: PartitionId, version: TopologyVersion) -> bool;
}
