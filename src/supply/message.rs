use crate::dep::DeploymentInfo;
use crate::node::TopologyVersion;
use crate::part::{EntryInfo, PartitionId};
use revision::revisioned;
use serde::{Deserialize, Serialize};

/// The estimated per-entry overhead of the wire encoding
const ENTRY_OVERHEAD: usize = 32;

/// The estimated fixed overhead of the message envelope
const HEADER_OVERHEAD: usize = 64;

/// A request for the contents of a set of partitions owned by this node.
///
/// Sent by a demanding peer when it joins, leaves, or rebalances. The
/// demander node id travels on the bus envelope; one `(demander, slot)`
/// pair has at most one outstanding demand.
#[revisioned(revision = 1)]
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct DemandMessage {
	/// The demander-side worker slot this demand belongs to
	pub worker_slot: u32,
	/// The rebalance round this demand belongs to
	pub update_seq: u64,
	/// The cluster view this demand was issued against
	pub topology: TopologyVersion,
	/// The partitions requested from this node
	pub partitions: Vec<PartitionId>,
	/// The topic the supply batches should be sent back on
	pub reply_topic: String,
	/// The send timeout for supply batches, in milliseconds
	pub timeout: u64,
}

/// One supplied entry, tagged with the partition it belongs to.
#[revisioned(revision = 1)]
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct SupplyEntry {
	/// The partition this entry belongs to
	pub partition: PartitionId,
	/// The transferable entry
	pub entry: EntryInfo,
}

/// One size-bounded batch of a partition supply stream.
///
/// Entries for the same partition appear in the order they were added, and
/// partitions appear in the order of the demand. The size accounting is an
/// admission precondition: entries are accepted while the estimated size is
/// strictly below the configured batch size, so the final entry may push a
/// batch over the limit, but a batch is never closed strictly below it.
#[revisioned(revision = 1)]
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct SupplyMessage {
	/// The demander-side worker slot this batch belongs to
	pub worker_slot: u32,
	/// The rebalance round this batch belongs to
	pub update_seq: u64,
	/// The cluster view this batch was produced against
	pub topology: TopologyVersion,
	/// The supplied entries, in stream order
	pub entries: Vec<SupplyEntry>,
	/// The partitions this node is no longer a source for
	pub missed: Vec<PartitionId>,
	/// The partitions for which this batch is terminal
	pub last: Vec<PartitionId>,
	/// Deployment information for the overflow-sourced entries, at most once
	pub deployment: Option<DeploymentInfo>,
	/// A conservative estimate of the encoded message size in bytes
	size: u64,
}

impl SupplyMessage {
	/// Create a new, empty supply batch echoing the fields of a demand
	pub fn new(demand: &DemandMessage) -> Self {
		Self {
			worker_slot: demand.worker_slot,
			update_seq: demand.update_seq,
			topology: demand.topology,
			entries: Vec::new(),
			missed: Vec::new(),
			last: Vec::new(),
			deployment: None,
			size: HEADER_OVERHEAD as u64,
		}
	}

	/// Append an in-memory entry for a partition
	pub fn add_entry(&mut self, partition: PartitionId, entry: EntryInfo) {
		self.size += (entry.key.len() + entry.val.len() + ENTRY_OVERHEAD) as u64;
		self.entries.push(SupplyEntry {
			partition,
			entry,
		});
	}

	/// Append an overflow-sourced entry for a partition.
	/// Overflow entries use the same layout as in-memory entries; a demander
	/// distinguishes them only by whether deployment information is attached.
	pub fn add_overflow_entry(&mut self, partition: PartitionId, entry: EntryInfo) {
		self.add_entry(partition, entry);
	}

	/// Mark a partition as no longer supplied from this node
	pub fn missed(&mut self, partition: PartitionId) {
		if !self.missed.contains(&partition) {
			self.missed.push(partition);
		}
	}

	/// Mark this batch as the terminal batch for a partition
	pub fn last(&mut self, partition: PartitionId) {
		if !self.last.contains(&partition) {
			self.last.push(partition);
		}
	}

	/// Attach deployment information, keeping the first attachment
	pub fn set_deployment(&mut self, info: DeploymentInfo) {
		if self.deployment.is_none() {
			self.deployment = Some(info);
		}
	}

	/// Whether deployment information has been attached to this batch
	pub fn has_deployment(&self) -> bool {
		self.deployment.is_some()
	}

	/// A conservative upper bound of the encoded message size in bytes
	pub fn message_size(&self) -> usize {
		self.size as usize
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use uuid::Uuid;

	fn demand() -> DemandMessage {
		DemandMessage {
			worker_slot: 2,
			update_seq: 7,
			topology: TopologyVersion::from(3),
			partitions: vec![1, 2, 3],
			reply_topic: "rebalance/42".to_string(),
			timeout: 10_000,
		}
	}

	fn entry(key: &[u8], val: &[u8]) -> EntryInfo {
		EntryInfo {
			key: key.to_vec(),
			val: val.to_vec(),
			version: 1,
			..Default::default()
		}
	}

	#[test]
	fn echoes_demand_fields() {
		let msg = SupplyMessage::new(&demand());
		assert_eq!(msg.worker_slot, 2);
		assert_eq!(msg.update_seq, 7);
		assert_eq!(msg.topology, TopologyVersion::from(3));
		assert!(msg.entries.is_empty());
	}

	#[test]
	fn size_grows_with_entries() {
		let mut msg = SupplyMessage::new(&demand());
		let empty = msg.message_size();
		msg.add_entry(1, entry(b"key", b"value"));
		assert_eq!(msg.message_size(), empty + 3 + 5 + ENTRY_OVERHEAD);
		msg.add_entry(1, entry(b"key2", b"value2"));
		assert_eq!(msg.message_size(), empty + 3 + 5 + 4 + 6 + 2 * ENTRY_OVERHEAD);
	}

	#[test]
	fn markers_are_idempotent() {
		let mut msg = SupplyMessage::new(&demand());
		msg.missed(7);
		msg.missed(7);
		msg.last(9);
		msg.last(9);
		assert_eq!(msg.missed, vec![7]);
		assert_eq!(msg.last, vec![9]);
	}

	#[test]
	fn deployment_first_wins() {
		let mut msg = SupplyMessage::new(&demand());
		let first = DeploymentInfo {
			loader: Uuid::new_v4(),
			node: Uuid::new_v4(),
			user_version: "1".to_string(),
		};
		let second = DeploymentInfo {
			loader: Uuid::new_v4(),
			node: Uuid::new_v4(),
			user_version: "2".to_string(),
		};
		msg.set_deployment(first.clone());
		msg.set_deployment(second);
		assert_eq!(msg.deployment, Some(first));
	}

	#[test]
	fn entries_keep_partition_order() {
		let mut msg = SupplyMessage::new(&demand());
		msg.add_entry(2, entry(b"a", b"1"));
		msg.add_entry(2, entry(b"b", b"2"));
		msg.add_entry(1, entry(b"c", b"3"));
		let order: Vec<_> = msg.entries.iter().map(|e| (e.partition, e.entry.key.clone())).collect();
		assert_eq!(order, vec![(2, b"a".to_vec()), (2, b"b".to_vec()), (1, b"c".to_vec())]);
	}
}
