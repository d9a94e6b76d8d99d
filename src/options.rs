use crate::cnf;
use std::time::Duration;

/// Configuration for the engine behaviour
/// The defaults are optimal so please only modify these if you know deliberately why you are modifying them.
#[derive(Clone, Copy, Debug)]
pub struct EngineOptions {
	/// The byte size at which an outbound supply batch is cut off
	pub rebalance_batch_size: usize,
	/// The number of supply batches a fresh demand may stream in one turn
	pub rebalance_batches_count: u32,
	/// The pause applied between consecutive supply batches
	pub rebalance_throttle: Duration,
	/// The number of demander-side rebalance worker slots per node
	pub rebalance_thread_pool_size: u32,
}

impl Default for EngineOptions {
	fn default() -> Self {
		Self {
			rebalance_batch_size: *cnf::REBALANCE_BATCH_SIZE,
			rebalance_batches_count: *cnf::REBALANCE_BATCHES_COUNT,
			rebalance_throttle: Duration::from_millis(*cnf::REBALANCE_THROTTLE),
			rebalance_thread_pool_size: *cnf::REBALANCE_THREAD_POOL_SIZE,
		}
	}
}

impl EngineOptions {
	/// Set the byte size at which an outbound supply batch is cut off
	pub fn with_rebalance_batch_size(mut self, size: usize) -> Self {
		self.rebalance_batch_size = size;
		self
	}

	/// Set the number of supply batches a fresh demand may stream in one turn
	pub fn with_rebalance_batches_count(mut self, count: u32) -> Self {
		self.rebalance_batches_count = count;
		self
	}

	/// Set the pause applied between consecutive supply batches
	pub fn with_rebalance_throttle(mut self, throttle: Duration) -> Self {
		self.rebalance_throttle = throttle;
		self
	}

	/// Set the number of demander-side rebalance worker slots per node
	pub fn with_rebalance_thread_pool_size(mut self, size: u32) -> Self {
		self.rebalance_thread_pool_size = size;
		self
	}
}
