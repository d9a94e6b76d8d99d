//! Partitions are the shards of the keyspace, and the unit of ownership
//! and rebalancing. This module defines the transferable entry form, the
//! partition and partition store seams, and the counted reservation lease
//! which prevents a partition from being evicted while it is supplied.

use crate::node::TopologyVersion;
use revision::revisioned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The key part of a key-value pair
pub type Key = Vec<u8>;

/// The value part of a key-value pair
pub type Val = Vec<u8>;

/// The identifier of a keyspace partition
pub type PartitionId = u32;

/// The lifecycle state of a local partition copy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum PartitionState {
	/// The authoritative copy of this partition is present on this node
	Owning,
	/// The partition is currently being loaded from a remote node
	Loading,
	/// The partition copy has been evicted from this node
	Evicted,
}

/// The transferable unit of a partition supply stream.
#[revisioned(revision = 1)]
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct EntryInfo {
	/// The raw key bytes of this entry
	pub key: Key,
	/// The raw value bytes of this entry
	pub val: Val,
	/// The version establishing a per-key total order for conflict resolution
	pub version: u64,
	/// The time-to-live of this entry in milliseconds, or zero when eternal
	pub ttl: u64,
	/// The wall-clock expiry time in milliseconds, or zero when eternal
	pub expires: u64,
	/// Whether this entry has never been committed
	pub uncommitted: bool,
}

/// A locally held shard of the keyspace.
///
/// Reservation is a counted lease; a reserved owning partition cannot be
/// evicted until every lease has been released.
pub trait Partition: Send + Sync {
	/// The identifier of this partition
	fn id(&self) -> PartitionId;
	/// The lifecycle state of this partition copy
	fn state(&self) -> PartitionState;
	/// Take a lease preventing eviction, if the partition state allows it
	fn reserve(&self) -> bool;
	/// Give back a previously taken lease
	fn release(&self);
	/// Iterate the in-memory entries of this partition
	fn entries(&self) -> Box<dyn Iterator<Item = EntryInfo> + Send + Sync>;
}

/// The local store of partitions for one cache.
pub trait PartitionStore: Send + Sync {
	/// Fetch the local partition, if one is present at this topology version
	fn local_partition(
		&self,
		id: PartitionId,
		version: TopologyVersion,
	) -> Option<Arc<dyn Partition>>;
}

/// The result of attempting to reserve a partition for supply.
#[non_exhaustive]
pub enum ReserveOutcome {
	/// The partition was reserved and the lease is now held
	Reserved(Reservation),
	/// The partition is present but is not an authoritative copy
	NotOwner,
	/// The partition is not present on this node
	NotPresent,
}

/// A counted lease held on a partition, given back exactly once.
///
/// The lease is released explicitly on the normal paths, and on drop as a
/// backstop, so that no exit path can leave a partition unreleasable.
pub struct Reservation {
	part: Arc<dyn Partition>,
	released: bool,
}

impl Reservation {
	/// Attempt to take a lease on an authoritative partition copy
	pub fn acquire(part: Arc<dyn Partition>) -> ReserveOutcome {
		// Only an owning partition is a valid supply source
		if part.state() != PartitionState::Owning {
			return ReserveOutcome::NotOwner;
		}
		// Take a counted lease on the partition
		match part.reserve() {
			true => ReserveOutcome::Reserved(Reservation {
				part,
				released: false,
			}),
			false => ReserveOutcome::NotOwner,
		}
	}

	/// The partition this lease is held on
	pub fn partition(&self) -> &Arc<dyn Partition> {
		&self.part
	}

	/// Give the lease back
	pub fn release(mut self) {
		self.release_once();
	}

	fn release_once(&mut self) {
		if !self.released {
			self.released = true;
			self.part.release();
		}
	}
}

impl Drop for Reservation {
	fn drop(&mut self) {
		self.release_once();
	}
}
