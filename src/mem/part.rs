use crate::node::TopologyVersion;
use crate::part::{EntryInfo, Key, Partition, PartitionId, PartitionState, PartitionStore};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// An in-memory partition holding its entries in key order.
pub struct MemPartition {
	/// The identifier of this partition
	id: PartitionId,
	/// The lifecycle state of this partition copy
	state: Mutex<PartitionState>,
	/// The number of leases currently held on this partition
	reservations: AtomicU32,
	/// The in-memory entries of this partition
	entries: Mutex<BTreeMap<Key, EntryInfo>>,
}

impl MemPartition {
	/// Create a new owning partition
	fn new(id: PartitionId) -> Self {
		Self {
			id,
			state: Mutex::new(PartitionState::Owning),
			reservations: AtomicU32::new(0),
			entries: Mutex::new(BTreeMap::new()),
		}
	}

	/// Insert or overwrite an entry in this partition
	pub fn put(&self, entry: EntryInfo) {
		let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
		entries.insert(entry.key.clone(), entry);
	}

	/// Remove an entry from this partition
	pub fn remove(&self, key: &[u8]) -> Option<EntryInfo> {
		let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
		entries.remove(key)
	}

	/// The number of entries currently held in memory
	pub fn len(&self) -> usize {
		self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
	}

	/// Whether this partition currently holds no entries
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// The number of leases currently held on this partition
	pub fn reserved(&self) -> u32 {
		self.reservations.load(Ordering::Acquire)
	}

	/// Change the lifecycle state of this partition copy.
	/// A reserved owning partition cannot be evicted until released.
	pub fn set_state(&self, state: PartitionState) -> bool {
		let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
		if state == PartitionState::Evicted
			&& *current == PartitionState::Owning
			&& self.reserved() > 0
		{
			return false;
		}
		*current = state;
		true
	}
}

impl Partition for MemPartition {
	fn id(&self) -> PartitionId {
		self.id
	}

	fn state(&self) -> PartitionState {
		*self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn reserve(&self) -> bool {
		// Only an owning partition can be leased
		match self.state() {
			PartitionState::Owning => {
				self.reservations.fetch_add(1, Ordering::AcqRel);
				true
			}
			_ => false,
		}
	}

	fn release(&self) {
		self.reservations.fetch_sub(1, Ordering::AcqRel);
	}

	fn entries(&self) -> Box<dyn Iterator<Item = EntryInfo> + Send + Sync> {
		// Iterate over a point-in-time snapshot of the in-memory tier.
		// Entries promoted during the iteration are caught by the listener
		// channels of the overflow store, not by this snapshot.
		let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
		let snapshot: Vec<EntryInfo> = entries.values().cloned().collect();
		Box::new(snapshot.into_iter())
	}
}

/// An in-memory store of the local partitions of one cache.
pub struct MemPartitionStore {
	/// The local partitions keyed by identifier
	parts: DashMap<PartitionId, Arc<MemPartition>>,
}

impl Default for MemPartitionStore {
	fn default() -> Self {
		Self::new()
	}
}

impl MemPartitionStore {
	/// Create a new, empty partition store
	pub fn new() -> Self {
		Self {
			parts: DashMap::new(),
		}
	}

	/// Create the local partition, returning the existing one if present
	pub fn create(&self, id: PartitionId) -> Arc<MemPartition> {
		self.parts.entry(id).or_insert_with(|| Arc::new(MemPartition::new(id))).clone()
	}

	/// Fetch the local partition, if present
	pub fn get(&self, id: PartitionId) -> Option<Arc<MemPartition>> {
		self.parts.get(&id).map(|part| part.value().clone())
	}
}

impl PartitionStore for MemPartitionStore {
	fn local_partition(
		&self,
		id: PartitionId,
		_version: TopologyVersion,
	) -> Option<Arc<dyn Partition>> {
		self.parts.get(&id).map(|part| part.value().clone() as Arc<dyn Partition>)
	}
}
