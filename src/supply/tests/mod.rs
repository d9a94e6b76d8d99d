use crate::aff::Affinity;
use crate::bus::{IoPolicy, MessageBus, SendOutcome};
use crate::dep::DeploymentInfo;
use crate::err::Error;
use crate::mem::{MemAffinity, MemBus, MemDeployments, MemOverflowStore, MemPartitionStore};
use crate::node::{ClusterEvent, ClusterEventKind, TopologyVersion};
use crate::options::EngineOptions;
use crate::ovf::OverflowEntry;
use crate::part::{EntryInfo, PartitionId, PartitionState};
use crate::supply::{DemandMessage, Supplier, SupplyMessage};
use async_trait::async_trait;
use rand::RngCore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// A single-supplier test cluster with one demanding peer.
struct Test {
	affinity: Arc<MemAffinity>,
	partitions: Arc<MemPartitionStore>,
	overflow: Arc<MemOverflowStore>,
	bus: Arc<MemBus>,
	deployments: Arc<MemDeployments>,
	demander: Uuid,
	inbox: channel::Receiver<(String, SupplyMessage)>,
	supplier: Arc<Supplier>,
}

fn new_test(options: EngineOptions, overflow_enabled: bool) -> Test {
	let node = Uuid::parse_str("900aa36f-8e16-43bb-8b0f-50e36dd42f8e").unwrap();
	let demander = Uuid::parse_str("04da7d4c-1b6b-4a26-9f89-a52283cf5869").unwrap();
	let affinity = Arc::new(MemAffinity::new(TopologyVersion::from(1)));
	let partitions = Arc::new(MemPartitionStore::new());
	let overflow = Arc::new(MemOverflowStore::new(overflow_enabled));
	let bus = Arc::new(MemBus::new());
	let deployments = Arc::new(MemDeployments::new());
	let inbox = bus.register(demander);
	let supplier = Arc::new(
		Supplier::new(
			node,
			affinity.clone(),
			partitions.clone(),
			overflow.clone(),
			bus.clone(),
			deployments.clone(),
		)
		.with_options(options),
	);
	Test {
		affinity,
		partitions,
		overflow,
		bus,
		deployments,
		demander,
		inbox,
		supplier,
	}
}

impl Test {
	/// Build a demand for a set of partitions at the current cluster view
	fn demand(&self, partitions: Vec<PartitionId>) -> DemandMessage {
		DemandMessage {
			worker_slot: 0,
			update_seq: 1,
			topology: self.affinity.current_version(),
			partitions,
			reply_topic: "rebalance/supply".to_string(),
			timeout: 5_000,
		}
	}

	/// Drain every batch currently sitting in the demander inbox
	fn drain(&self) -> Vec<SupplyMessage> {
		let mut batches = Vec::new();
		while let Ok((_, msg)) = self.inbox.try_recv() {
			batches.push(msg);
		}
		batches
	}
}

/// Build a committed entry with a random value of the given size
fn entry(partition: PartitionId, index: usize, size: usize) -> EntryInfo {
	let mut val = vec![0u8; size];
	rand::thread_rng().fill_bytes(&mut val);
	EntryInfo {
		key: format!("{partition:04}/{index:06}").into_bytes(),
		val,
		version: index as u64 + 1,
		ttl: 0,
		expires: 0,
		uncommitted: false,
	}
}

/// Build an overflow entry with a random value of the given size
fn overflow_entry(
	partition: PartitionId,
	index: usize,
	size: usize,
	loader: Option<Uuid>,
) -> OverflowEntry {
	let mut val = vec![0u8; size];
	rand::thread_rng().fill_bytes(&mut val);
	OverflowEntry {
		key: format!("{partition:04}/ovf/{index:06}").into_bytes(),
		val,
		version: index as u64 + 1,
		ttl: 0,
		expires: 0,
		key_loader: loader,
		val_loader: None,
	}
}

/// The keys of every entry in a sequence of batches, in stream order
fn streamed_keys(batches: &[SupplyMessage]) -> Vec<Vec<u8>> {
	batches.iter().flat_map(|b| b.entries.iter().map(|e| e.entry.key.clone())).collect()
}

/// Wait for a condition which is satisfied by a background task
async fn eventually(cond: impl Fn() -> bool) {
	for _ in 0..200 {
		if cond() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	panic!("condition was not reached in time");
}

include!("deployment.rs");
include!("small.rs");
include!("suspend.rs");
include!("missed.rs");
include!("promotion.rs");
include!("gone.rs");
include!("stale.rs");
include!("evict.rs");
include!("pool.rs");
