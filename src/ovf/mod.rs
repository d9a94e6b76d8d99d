//! The overflow store is the secondary storage tier holding entries which
//! have been evicted from the in-memory tier. During a partition supply the
//! overflow tier is scanned after the in-memory tier, and listeners on its
//! promotion channels capture entries which move back into memory while the
//! scans are running.

use crate::err::Error;
use crate::part::{EntryInfo, Key, PartitionId, Val};
use revision::revisioned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// An entry sourced from the overflow tier of the store.
#[revisioned(revision = 1)]
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct OverflowEntry {
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
	/// The loader which produced the key bytes, if any
	pub key_loader: Option<Uuid>,
	/// The loader which produced the value bytes, if any
	pub val_loader: Option<Uuid>,
}

impl OverflowEntry {
	/// Convert this entry into its transferable form
	pub fn info(&self) -> EntryInfo {
		EntryInfo {
			key: self.key.clone(),
			val: self.val.clone(),
			version: self.version,
			ttl: self.ttl,
			expires: self.expires,
			uncommitted: false,
		}
	}

	/// The loader attached to this entry, preferring the key loader
	pub fn loader(&self) -> Option<Uuid> {
		self.key_loader.or(self.val_loader)
	}
}

/// A closeable cursor over the overflow entries of one partition.
///
/// Implementations should release any underlying resources on drop as well,
/// as a backstop for abandoned cursors.
pub trait OverflowCursor: Iterator<Item = Result<OverflowEntry, Error>> + Send + Sync {
	/// Close the cursor, releasing any underlying resources
	fn close(&mut self) -> Result<(), Error>;
}

/// A listener notified when entries move between the storage tiers.
pub trait OverflowListener: Send + Sync {
	/// An entry was promoted into memory, or evicted or overwritten
	fn on_entry(&self, partition: PartitionId, entry: EntryInfo);
}

/// The overflow tier of the local store.
pub trait OverflowStore: Send + Sync {
	/// Whether the overflow tier is enabled for this cache
	fn enabled(&self) -> bool;
	/// Open a cursor over one partition's overflow entries, if any exist
	fn cursor(&self, partition: PartitionId) -> Option<Box<dyn OverflowCursor>>;
	/// Register a listener on the overflow channel of a partition
	fn add_overflow_listener(&self, partition: PartitionId, listener: Arc<dyn OverflowListener>);
	/// Deregister a listener from the overflow channel of a partition
	fn remove_overflow_listener(&self, partition: PartitionId, listener: &Arc<dyn OverflowListener>);
	/// Register a listener on the promotion channel of a partition
	fn add_promotion_listener(&self, partition: PartitionId, listener: Arc<dyn OverflowListener>);
	/// Deregister a listener from the promotion channel of a partition
	fn remove_promotion_listener(
		&self,
		partition: PartitionId,
		listener: &Arc<dyn OverflowListener>,
	);
}
