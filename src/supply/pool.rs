use super::message::DemandMessage;
use super::supplier::Supplier;
use channel::Receiver;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

const TARGET: &str = "tesseradb::core::supply::pool";

/// A demand message together with the node which sent it.
pub type Demand = (Uuid, DemandMessage);

impl Supplier {
	/// Serve demand messages from a channel on a fixed pool of workers.
	///
	/// The pool holds `rebalance_thread_pool_size` workers, and demands are
	/// routed to a worker by their worker slot, so the batches of one
	/// `(demander, slot)` stream are always produced and transmitted in
	/// order by the same worker. Returns the handles of the spawned tasks;
	/// closing the demand channel winds the pool down.
	pub fn serve(self: Arc<Self>, demands: Receiver<Demand>) -> Vec<JoinHandle<()>> {
		let workers = self.options.rebalance_thread_pool_size.max(1) as usize;
		// One inbound lane per worker preserves the per-slot ordering
		let lanes: Vec<_> = (0..workers).map(|_| channel::unbounded::<Demand>()).collect();
		let mut handles = Vec::with_capacity(workers + 1);
		// Spawn the supply workers
		for (_, rx) in lanes.iter() {
			let supplier = self.clone();
			let lane = rx.clone();
			handles.push(tokio::spawn(async move {
				while let Ok((demander, demand)) = lane.recv().await {
					supplier.handle_demand(demander, demand).await;
				}
			}));
		}
		// Spawn the dispatcher routing demands to the worker lanes
		let senders: Vec<_> = lanes.into_iter().map(|(tx, _)| tx).collect();
		handles.push(tokio::spawn(async move {
			while let Ok((demander, demand)) = demands.recv().await {
				// Pin the demand to its worker by slot
				let lane = demand.worker_slot as usize % senders.len();
				if senders[lane].send((demander, demand)).await.is_err() {
					break;
				}
			}
			trace!(target: TARGET, "Demand channel closed, stopping the supply workers");
		}));
		handles
	}
}
