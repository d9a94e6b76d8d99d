use super::context::{EntryCursor, SupplyContext, SupplyContextMap};
use super::listener::PromotionListener;
use super::message::{DemandMessage, SupplyMessage};
use crate::aff::Affinity;
use crate::bus::{IoPolicy, MessageBus, SendOutcome};
use crate::dep::DeploymentRegistry;
use crate::err::Error;
use crate::options::EngineOptions;
use crate::ovf::OverflowStore;
use crate::part::{EntryInfo, PartitionId, PartitionStore, Reservation, ReserveOutcome};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

const TARGET: &str = "tesseradb::core::supply";

/// A predicate deciding whether an entry should be preloaded to a demander.
pub type PreloadPredicate = Arc<dyn Fn(PartitionId, &EntryInfo) -> bool + Send + Sync>;

/// Streams the contents of locally owned partitions to demanding peers.
///
/// Each demanded partition is supplied in phases: the in-memory entries
/// first, then the overflow tier, then the entries which were promoted
/// between the tiers while the scans were running. Batches are bounded in
/// size, and the number of batches per turn is bounded, so that no single
/// demander can monopolise this node. When a turn is cut short, the position
/// is saved in a supply context and resumed by the follow-up demand.
pub struct Supplier {
	/// The unique id of this node
	id: Uuid,
	/// The affinity oracle for the current cluster view
	affinity: Arc<dyn Affinity>,
	/// The local partition store
	partitions: Arc<dyn PartitionStore>,
	/// The overflow tier of the local store
	overflow: Arc<dyn OverflowStore>,
	/// The ordered message bus to peer nodes
	bus: Arc<dyn MessageBus>,
	/// The registry of code deployments on this node
	deployments: Arc<dyn DeploymentRegistry>,
	/// The I/O policy supply batches are sent under
	policy: IoPolicy,
	/// The engine options for this supplier
	pub(super) options: EngineOptions,
	/// An optional predicate filtering the preloaded entries
	predicate: Option<PreloadPredicate>,
	/// The in-flight supply contexts of this node
	pub(super) contexts: SupplyContextMap,
}

/// The in-flight state of the partition currently being supplied.
struct Position {
	/// The partition being supplied
	partition: PartitionId,
	/// The lease held on the partition
	reservation: Reservation,
	/// The cursor of the current phase
	cursor: EntryCursor,
	/// The listener capturing entries promoted during the scans
	listener: Option<PromotionListener>,
}

impl Supplier {
	/// Create a new supplier for this node
	pub fn new(
		id: Uuid,
		affinity: Arc<dyn Affinity>,
		partitions: Arc<dyn PartitionStore>,
		overflow: Arc<dyn OverflowStore>,
		bus: Arc<dyn MessageBus>,
		deployments: Arc<dyn DeploymentRegistry>,
	) -> Self {
		Self {
			id,
			affinity,
			partitions,
			overflow,
			bus,
			deployments,
			policy: IoPolicy::default(),
			options: EngineOptions::default(),
			predicate: None,
			contexts: SupplyContextMap::new(),
		}
	}

	/// Set the engine options for this supplier
	pub fn with_options(mut self, options: EngineOptions) -> Self {
		self.options = options;
		self
	}

	/// Set a predicate filtering the entries preloaded to demanders
	pub fn with_preload_predicate(mut self, predicate: PreloadPredicate) -> Self {
		self.predicate = Some(predicate);
		self
	}

	/// Set the I/O policy supply batches are sent under
	pub fn with_io_policy(mut self, policy: IoPolicy) -> Self {
		self.policy = policy;
		self
	}

	/// The unique id of this node
	pub fn id(&self) -> Uuid {
		self.id
	}

	/// The number of in-flight supply contexts stored on this node
	pub fn context_count(&self) -> usize {
		self.contexts.len()
	}

	/// Handle one demand message received from a peer node.
	///
	/// This is the bus-facing entry point: every internal failure is caught
	/// and logged here, and never propagates back into the message bus. The
	/// demander recovers by reissuing its demand.
	#[instrument(level = "trace", target = "tesseradb::core::supply", skip_all, fields(slot = demand.worker_slot))]
	pub async fn handle_demand(&self, demander: Uuid, demand: DemandMessage) {
		if let Err(error) = self.process(demander, demand).await {
			error!(target: TARGET, node = %self.id, %demander, %error, "Failed to process a partition demand");
		}
	}

	/// Process one demand message, streaming supply batches back.
	async fn process(&self, demander: Uuid, demand: DemandMessage) -> Result<(), Error> {
		// Demands issued against a stale cluster view are dropped silently
		let current = self.affinity.current_version();
		if demand.topology != current {
			// Reclaim any context left over from the stale view
			if let Some(mut ctx) = self.contexts.remove(demander, demand.worker_slot) {
				ctx.evict();
			}
			trace!(
				target: TARGET,
				%demander,
				demanded = %demand.topology,
				%current,
				"Dropping a demand for a stale cluster view"
			);
			return Ok(());
		}
		// Fetch any saved context for this demander worker slot
		let ctx = match self.contexts.remove(demander, demand.worker_slot) {
			// A context from a different round or view must be reclaimed
			Some(mut ctx)
				if ctx.topology != demand.topology || ctx.update_seq != demand.update_seq =>
			{
				ctx.evict();
				None
			}
			other => other,
		};
		// A fresh demand with no partitions has nothing to stream
		if ctx.is_none() && demand.partitions.is_empty() {
			return Ok(());
		}
		// A resumed demand is given a single batch before yielding
		let max_batches = match ctx.is_some() {
			true => 1,
			false => self.options.rebalance_batches_count,
		};
		// Drive the supply state machine for this turn
		self.stream(demander, &demand, ctx, max_batches).await
	}

	/// Drive the supply state machine for one demand turn.
	async fn stream(
		&self,
		demander: Uuid,
		demand: &DemandMessage,
		ctx: Option<SupplyContext>,
		max_batches: u32,
	) -> Result<(), Error> {
		// The batch currently being accumulated for transmission
		let mut batch = SupplyMessage::new(demand);
		// The number of batches emitted on this turn
		let mut sent = 0u32;
		// Split a resumed context into the partition source and the position
		let (mut remaining, mut resume) = match ctx {
			Some(mut ctx) => {
				let position = match (ctx.reservation.take(), ctx.cursor.take()) {
					(Some(reservation), Some(cursor)) => Some(Position {
						partition: ctx.partition,
						reservation,
						cursor,
						listener: ctx.listener.take(),
					}),
					_ => None,
				};
				(ctx.remaining, position)
			}
			None => (demand.partitions.clone().into_iter(), None),
		};
		// Loop over the partitions of the demand
		'partitions: loop {
			// Resume the saved position, or start the next partition
			let mut pos = match resume.take() {
				Some(pos) => pos,
				None => match remaining.next() {
					Some(partition) => match self.begin(demander, partition, demand) {
						Some(pos) => pos,
						// This node is not a valid source for the partition
						None => {
							batch.missed(partition);
							continue;
						}
					},
					// Every demanded partition has been processed
					None => break,
				},
			};
			// Drive the current partition through its phases
			loop {
				// Close the batch once the size limit has been reached
				if batch.message_size() >= self.options.rebalance_batch_size {
					sent += 1;
					// Yield the turn once the batch budget is exhausted
					if sent >= max_batches {
						// Save the context before transmitting, so that a
						// follow-up demand always observes it
						self.suspend(demander, demand, remaining, pos);
						self.transmit(demander, demand, batch).await?;
						return Ok(());
					}
					// Transmit the batch and continue with a fresh one
					match self.transmit(demander, demand, batch).await? {
						SendOutcome::Delivered => (),
						// Stop the turn and drop the in-flight resources
						SendOutcome::RecipientGone => {
							self.abandon(pos);
							return Ok(());
						}
					}
					// Pause between batches when throttling is configured
					self.throttle().await;
					batch = SupplyMessage::new(demand);
				}
				// Pull the next entry of the current phase
				let entry = match &mut pos.cursor {
					// Phase 1: the in-memory entries of the partition
					EntryCursor::Memory(iter) => iter.next(),
					// Phase 2: the overflow tier of the partition
					EntryCursor::Overflow(cursor) => match cursor.next().transpose()? {
						Some(entry) => {
							// Attach deployment information for the first
							// loader-tagged entry which resolves
							if let Some(loader) = entry.loader() {
								if !batch.has_deployment() {
									match self.deployments.deployment_for(loader) {
										Some(info) => batch.set_deployment(info),
										// An unresolvable loader skips the entry
										None => {
											trace!(
												target: TARGET,
												partition = pos.partition,
												%loader,
												"Skipping an entry with an unresolvable loader"
											);
											continue;
										}
									}
								}
							}
							Some(entry.info())
						}
						None => None,
					},
					// Phase 3: the entries promoted during the scans
					EntryCursor::Promotion(iter) => iter.next(),
				};
				match entry {
					Some(entry) => {
						// Re-validate that the demander still maps to the partition
						if !self.affinity.belongs(demander, pos.partition, demand.topology) {
							debug!(
								target: TARGET,
								%demander,
								partition = pos.partition,
								"Partition moved away from the demander mid-stream"
							);
							batch.missed(pos.partition);
							self.abandon(pos);
							continue 'partitions;
						}
						// Never ship entries which have not been committed
						if entry.uncommitted {
							continue;
						}
						// Apply the preload predicate when one is set
						if let Some(predicate) = &self.predicate {
							if !predicate(pos.partition, &entry) {
								continue;
							}
						}
						// Append the entry to the outbound batch
						match &pos.cursor {
							EntryCursor::Overflow(_) => {
								batch.add_overflow_entry(pos.partition, entry)
							}
							_ => batch.add_entry(pos.partition, entry),
						}
					}
					// The phase is exhausted, move to the next phase
					None => {
						if !self.advance(&mut pos) {
							// Mark the terminal batch and give back the lease
							batch.last(pos.partition);
							pos.reservation.release();
							continue 'partitions;
						}
					}
				}
			}
		}
		// Emit the final batch of the turn, which may only carry markers
		self.transmit(demander, demand, batch).await?;
		// Everything was streamed successfully
		Ok(())
	}

	/// Reserve a partition and set up its first supply phase.
	/// Returns None when this node is not a valid source for the partition.
	fn begin(
		&self,
		demander: Uuid,
		partition: PartitionId,
		demand: &DemandMessage,
	) -> Option<Position> {
		// Fetch the local copy of the demanded partition
		let part = match self.partitions.local_partition(partition, demand.topology) {
			Some(part) => part,
			None => {
				trace!(target: TARGET, %demander, partition, "Partition is not present on this node");
				return None;
			}
		};
		// Lease the partition so it cannot be evicted while supplying
		let reservation = match Reservation::acquire(part) {
			ReserveOutcome::Reserved(reservation) => reservation,
			ReserveOutcome::NotOwner | ReserveOutcome::NotPresent => {
				trace!(target: TARGET, %demander, partition, "Partition is not owned by this node");
				return None;
			}
		};
		// Capture entries promoted out of the overflow tier during the scans
		let listener = match self.overflow.enabled() {
			true => Some(PromotionListener::register(self.overflow.clone(), partition)),
			false => None,
		};
		// Start with the in-memory entries of the partition
		let cursor = EntryCursor::Memory(reservation.partition().entries());
		Some(Position {
			partition,
			reservation,
			cursor,
			listener,
		})
	}

	/// Move an exhausted cursor to the next phase of the partition.
	/// Returns false once the partition has no further phases.
	fn advance(&self, pos: &mut Position) -> bool {
		// Close the overflow cursor before leaving the overflow phase
		if let EntryCursor::Overflow(cursor) = &mut pos.cursor {
			if let Err(error) = cursor.close() {
				warn!(
					target: TARGET,
					partition = pos.partition,
					%error,
					"Failed to close an overflow cursor"
				);
			}
		}
		// Select the next phase for this partition
		let next = match &pos.cursor {
			// After the in-memory scan, move to the overflow tier
			EntryCursor::Memory(_) if self.overflow.enabled() => {
				match self.overflow.cursor(pos.partition) {
					// Iterate the overflow entries of this partition
					Some(cursor) => Some(EntryCursor::Overflow(cursor)),
					// No overflow space, drain the promotion buffer
					None => Some(drain(&mut pos.listener)),
				}
			}
			// Without an overflow tier there is nothing further to stream
			EntryCursor::Memory(_) => None,
			// After the overflow scan, drain the promotion buffer
			EntryCursor::Overflow(_) => Some(drain(&mut pos.listener)),
			// The promotion drain is the final phase
			EntryCursor::Promotion(_) => None,
		};
		// Install the cursor of the next phase
		match next {
			Some(cursor) => {
				pos.cursor = cursor;
				true
			}
			None => false,
		}
	}

	/// Save the in-flight position so a follow-up demand can resume it
	fn suspend(
		&self,
		demander: Uuid,
		demand: &DemandMessage,
		remaining: std::vec::IntoIter<PartitionId>,
		pos: Position,
	) {
		trace!(
			target: TARGET,
			%demander,
			slot = demand.worker_slot,
			partition = pos.partition,
			"Suspending the supply turn"
		);
		let ctx = SupplyContext {
			topology: demand.topology,
			update_seq: demand.update_seq,
			remaining,
			partition: pos.partition,
			reservation: Some(pos.reservation),
			cursor: Some(pos.cursor),
			listener: pos.listener,
		};
		self.contexts.insert(demander, demand.worker_slot, ctx);
	}

	/// Drop the in-flight resources when a turn stops mid-partition
	fn abandon(&self, mut pos: Position) {
		// Close the overflow cursor if one is open
		if let EntryCursor::Overflow(cursor) = &mut pos.cursor {
			if let Err(error) = cursor.close() {
				warn!(
					target: TARGET,
					partition = pos.partition,
					%error,
					"Failed to close an overflow cursor"
				);
			}
		}
		// Deregister the promotion listener if one is registered
		if let Some(listener) = pos.listener.take() {
			listener.deregister();
		}
		// Give back the lease on the partition
		pos.reservation.release();
	}

	/// Transmit one supply batch on the reply topic of the demand
	async fn transmit(
		&self,
		demander: Uuid,
		demand: &DemandMessage,
		batch: SupplyMessage,
	) -> Result<SendOutcome, Error> {
		trace!(
			target: TARGET,
			%demander,
			entries = batch.entries.len(),
			size = batch.message_size(),
			"Transmitting a supply batch"
		);
		let timeout = Duration::from_millis(demand.timeout);
		let outcome = self
			.bus
			.send_ordered(demander, &demand.reply_topic, batch, self.policy, timeout)
			.await?;
		// A departed recipient stops the turn without further batches
		if outcome == SendOutcome::RecipientGone {
			debug!(target: TARGET, %demander, "Demander has left the cluster, stopping the supply turn");
		}
		Ok(outcome)
	}

	/// Pause between consecutive batches when throttling is configured
	async fn throttle(&self) {
		let pause = self.options.rebalance_throttle;
		if !pause.is_zero() {
			tokio::time::sleep(pause).await;
		}
	}
}

/// Deregister the promotion listener and drain its captured entries
fn drain(listener: &mut Option<PromotionListener>) -> EntryCursor {
	// The buffer is read once, after the listener has been deregistered
	let entries = match listener.take() {
		Some(listener) => {
			listener.deregister();
			listener.entries()
		}
		None => Vec::new(),
	};
	EntryCursor::Promotion(entries.into_iter())
}
