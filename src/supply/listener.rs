use crate::ovf::{OverflowListener, OverflowStore};
use crate::part::{EntryInfo, PartitionId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Captures entries which move between the storage tiers while a partition
/// is being supplied.
///
/// The in-memory and overflow scans read two snapshots which can race with
/// live promotion. An entry promoted after the in-memory scan has passed its
/// slot, but before the overflow scan reaches its old slot, would otherwise
/// be missed entirely. Buffering such entries here, and draining the buffer
/// as the final phase of the partition, guarantees that every entry alive
/// during the supply window is shipped at least once.
pub(super) struct PromotionListener {
	/// The store the listener is registered on
	store: Arc<dyn OverflowStore>,
	/// The partition this listener is registered for
	partition: PartitionId,
	/// The buffer capturing the promoted entries
	buffer: Arc<Buffer>,
	/// Whether this listener is currently registered
	registered: AtomicBool,
}

/// The append-only buffer of captured entries.
struct Buffer {
	/// The partition the captured entries belong to
	partition: PartitionId,
	/// The captured entries, in arrival order
	entries: Mutex<Vec<EntryInfo>>,
}

impl OverflowListener for Buffer {
	fn on_entry(&self, partition: PartitionId, entry: EntryInfo) {
		// Ignore events for other partitions
		if partition != self.partition {
			return;
		}
		// Capture the entry into the buffer
		self.entries.lock().unwrap_or_else(PoisonError::into_inner).push(entry);
	}
}

impl PromotionListener {
	/// Register a new listener on both tier channels of a partition
	pub(super) fn register(store: Arc<dyn OverflowStore>, partition: PartitionId) -> Self {
		let buffer = Arc::new(Buffer {
			partition,
			entries: Mutex::new(Vec::new()),
		});
		let listener: Arc<dyn OverflowListener> = buffer.clone();
		store.add_overflow_listener(partition, listener.clone());
		store.add_promotion_listener(partition, listener);
		Self {
			store,
			partition,
			buffer,
			registered: AtomicBool::new(true),
		}
	}

	/// Deregister from both tier channels. Safe to call more than once.
	pub(super) fn deregister(&self) {
		if self.registered.swap(false, Ordering::AcqRel) {
			let listener: Arc<dyn OverflowListener> = self.buffer.clone();
			self.store.remove_overflow_listener(self.partition, &listener);
			self.store.remove_promotion_listener(self.partition, &listener);
		}
	}

	/// Take the captured entries. Read once, after deregistration.
	pub(super) fn entries(&self) -> Vec<EntryInfo> {
		std::mem::take(&mut *self.buffer.entries.lock().unwrap_or_else(PoisonError::into_inner))
	}
}

impl Drop for PromotionListener {
	fn drop(&mut self) {
		// An abandoned listener must not stay registered on the store
		self.deregister();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mem::MemOverflowStore;

	fn entry(key: &[u8]) -> EntryInfo {
		EntryInfo {
			key: key.to_vec(),
			val: b"v".to_vec(),
			version: 1,
			..Default::default()
		}
	}

	#[test]
	fn captures_matching_partition_only() {
		let store: Arc<dyn OverflowStore> = Arc::new(MemOverflowStore::new(true));
		let listener = PromotionListener::register(store, 7);
		listener.buffer.on_entry(7, entry(b"a"));
		listener.buffer.on_entry(8, entry(b"b"));
		listener.buffer.on_entry(7, entry(b"c"));
		let keys: Vec<_> = listener.entries().into_iter().map(|e| e.key).collect();
		assert_eq!(keys, vec![b"a".to_vec(), b"c".to_vec()]);
	}

	#[test]
	fn deregistration_is_idempotent() {
		let store = Arc::new(MemOverflowStore::new(true));
		let listener = PromotionListener::register(store.clone(), 3);
		assert_eq!(store.listener_count(3), 2);
		listener.deregister();
		assert_eq!(store.listener_count(3), 0);
		listener.deregister();
		assert_eq!(store.listener_count(3), 0);
	}

	#[test]
	fn drop_deregisters() {
		let store = Arc::new(MemOverflowStore::new(true));
		{
			let _listener = PromotionListener::register(store.clone(), 3);
			assert_eq!(store.listener_count(3), 2);
		}
		assert_eq!(store.listener_count(3), 0);
	}
}
