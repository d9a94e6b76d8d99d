use super::listener::PromotionListener;
use crate::node::TopologyVersion;
use crate::ovf::OverflowCursor;
use crate::part::{EntryInfo, PartitionId, Reservation};
use dashmap::DashMap;
use uuid::Uuid;

const TARGET: &str = "tesseradb::core::supply::context";

/// The resumable position inside one partition's supply stream.
///
/// The cursor names the phase: the in-memory entries of the partition are
/// streamed first, then the overflow tier, then the buffer of entries which
/// were promoted while the scans were running.
pub(super) enum EntryCursor {
	/// Iterating the in-memory entries of the partition
	Memory(Box<dyn Iterator<Item = EntryInfo> + Send + Sync>),
	/// Iterating the overflow tier of the partition
	Overflow(Box<dyn OverflowCursor>),
	/// Draining the entries promoted while the scans were running
	Promotion(std::vec::IntoIter<EntryInfo>),
}

/// The saved state of one in-flight demand.
///
/// While a context exists, exactly one partition is reserved on behalf of
/// it, and the registered listener and open cursor are owned by it. Whoever
/// removes a context from the map is responsible for either resuming it or
/// evicting it.
pub(super) struct SupplyContext {
	/// The cluster view of the demand which created this context
	pub(super) topology: TopologyVersion,
	/// The rebalance round of the demand which created this context
	pub(super) update_seq: u64,
	/// The demanded partitions not yet started
	pub(super) remaining: std::vec::IntoIter<PartitionId>,
	/// The partition currently being supplied
	pub(super) partition: PartitionId,
	/// The lease held on the current partition
	pub(super) reservation: Option<Reservation>,
	/// The position inside the current partition
	pub(super) cursor: Option<EntryCursor>,
	/// The listener capturing entries promoted during the scans
	pub(super) listener: Option<PromotionListener>,
}

impl SupplyContext {
	/// Tear down this context, releasing every resource it owns.
	///
	/// Every resource is taken out of the context on first use, so eviction
	/// is idempotent and never closes a cursor twice. Errors are logged and
	/// swallowed; eviction always completes.
	pub(super) fn evict(&mut self) {
		// Close the overflow cursor if one is still open
		if let Some(EntryCursor::Overflow(mut cursor)) = self.cursor.take() {
			if let Err(error) = cursor.close() {
				warn!(
					target: TARGET,
					partition = self.partition,
					%error,
					"Failed to close an overflow cursor during eviction"
				);
			}
		}
		// Deregister the promotion listener if one is still registered
		if let Some(listener) = self.listener.take() {
			listener.deregister();
		}
		// Give back the lease on the current partition
		if let Some(reservation) = self.reservation.take() {
			reservation.release();
		}
	}
}

/// The set of in-flight supply contexts of this node, keyed by demander
/// node id and worker slot. Each key has a de facto single writer, because
/// a demander sends at most one outstanding demand per slot; the map itself
/// is shared with the topology event subscriber, which evicts the contexts
/// of departed demanders.
pub(super) struct SupplyContextMap {
	inner: DashMap<(Uuid, u32), SupplyContext>,
}

impl SupplyContextMap {
	/// Create a new, empty context map
	pub(super) fn new() -> Self {
		Self {
			inner: DashMap::new(),
		}
	}

	/// Remove and return the context stored for a demander worker slot
	pub(super) fn remove(&self, demander: Uuid, slot: u32) -> Option<SupplyContext> {
		self.inner.remove(&(demander, slot)).map(|(_, ctx)| ctx)
	}

	/// Store the context for a demander worker slot
	pub(super) fn insert(&self, demander: Uuid, slot: u32, ctx: SupplyContext) {
		self.inner.insert((demander, slot), ctx);
	}

	/// The number of stored contexts
	pub(super) fn len(&self) -> usize {
		self.inner.len()
	}
}
