use super::part::MemPartitionStore;
use crate::err::Error;
use crate::ovf::{OverflowCursor, OverflowEntry, OverflowListener, OverflowStore};
use crate::part::{Key, PartitionId};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An in-memory overflow tier with live promotion into a partition store.
pub struct MemOverflowStore {
	/// Whether the overflow tier is enabled
	enabled: bool,
	/// The overflow entries of each partition, in key order
	parts: DashMap<PartitionId, BTreeMap<Key, OverflowEntry>>,
	/// The listeners registered on the overflow channel of each partition
	overflow_listeners: DashMap<PartitionId, Vec<Arc<dyn OverflowListener>>>,
	/// The listeners registered on the promotion channel of each partition
	promotion_listeners: DashMap<PartitionId, Vec<Arc<dyn OverflowListener>>>,
}

impl MemOverflowStore {
	/// Create a new overflow tier
	pub fn new(enabled: bool) -> Self {
		Self {
			enabled,
			parts: DashMap::new(),
			overflow_listeners: DashMap::new(),
			promotion_listeners: DashMap::new(),
		}
	}

	/// Insert or overwrite an entry in the overflow tier of a partition
	pub fn put(&self, partition: PartitionId, entry: OverflowEntry) {
		let mut entries = self.parts.entry(partition).or_default();
		entries.insert(entry.key.clone(), entry);
	}

	/// The number of overflow entries held for a partition
	pub fn len(&self, partition: PartitionId) -> usize {
		self.parts.get(&partition).map(|entries| entries.len()).unwrap_or(0)
	}

	/// The number of listeners registered for a partition, on both channels
	pub fn listener_count(&self, partition: PartitionId) -> usize {
		let overflow =
			self.overflow_listeners.get(&partition).map(|l| l.len()).unwrap_or_default();
		let promotion =
			self.promotion_listeners.get(&partition).map(|l| l.len()).unwrap_or_default();
		overflow + promotion
	}

	/// Move an entry from the overflow tier into the in-memory tier of the
	/// given partition store, notifying the promotion listeners.
	pub fn promote(&self, partition: PartitionId, key: &[u8], store: &MemPartitionStore) -> bool {
		// Take the entry out of the overflow tier
		let entry = match self.parts.get_mut(&partition) {
			Some(mut entries) => match entries.remove(key) {
				Some(entry) => entry,
				None => return false,
			},
			None => return false,
		};
		let info = entry.info();
		// Land the entry in the in-memory tier of the partition
		if let Some(part) = store.get(partition) {
			part.put(info.clone());
		}
		// Notify the listeners on the promotion channel
		if let Some(listeners) = self.promotion_listeners.get(&partition) {
			for listener in listeners.iter() {
				listener.on_entry(partition, info.clone());
			}
		}
		true
	}
}

/// A cursor over a snapshot of one partition's overflow entries.
struct MemOverflowCursor {
	/// The snapshot being iterated
	inner: std::vec::IntoIter<OverflowEntry>,
	/// Whether the cursor has been closed
	closed: bool,
}

impl Iterator for MemOverflowCursor {
	type Item = Result<OverflowEntry, Error>;
	fn next(&mut self) -> Option<Self::Item> {
		// A closed cursor produces nothing further
		if self.closed {
			return None;
		}
		self.inner.next().map(Ok)
	}
}

impl OverflowCursor for MemOverflowCursor {
	fn close(&mut self) -> Result<(), Error> {
		self.closed = true;
		Ok(())
	}
}

impl OverflowStore for MemOverflowStore {
	fn enabled(&self) -> bool {
		self.enabled
	}

	fn cursor(&self, partition: PartitionId) -> Option<Box<dyn OverflowCursor>> {
		// No overflow space exists for an unknown partition
		let entries = self.parts.get(&partition)?;
		let snapshot: Vec<OverflowEntry> = entries.values().cloned().collect();
		Some(Box::new(MemOverflowCursor {
			inner: snapshot.into_iter(),
			closed: false,
		}))
	}

	fn add_overflow_listener(&self, partition: PartitionId, listener: Arc<dyn OverflowListener>) {
		self.overflow_listeners.entry(partition).or_default().push(listener);
	}

	fn remove_overflow_listener(
		&self,
		partition: PartitionId,
		listener: &Arc<dyn OverflowListener>,
	) {
		if let Some(mut listeners) = self.overflow_listeners.get_mut(&partition) {
			listeners.retain(|l| !Arc::ptr_eq(l, listener));
		}
	}

	fn add_promotion_listener(&self, partition: PartitionId, listener: Arc<dyn OverflowListener>) {
		self.promotion_listeners.entry(partition).or_default().push(listener);
	}

	fn remove_promotion_listener(
		&self,
		partition: PartitionId,
		listener: &Arc<dyn OverflowListener>,
	) {
		if let Some(mut listeners) = self.promotion_listeners.get_mut(&partition) {
			listeners.retain(|l| !Arc::ptr_eq(l, listener));
		}
	}
}
