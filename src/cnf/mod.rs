use once_cell::sync::Lazy;

/// The byte size at which an outbound supply batch is cut off.
///
/// The size check is an admission precondition: a batch accepts entries while
/// its estimated size is strictly below this limit, so the final entry may
/// push it over, but a batch is never closed while strictly below the limit.
pub static REBALANCE_BATCH_SIZE: Lazy<usize> =
	lazy_env_parse!("TESSERA_REBALANCE_BATCH_SIZE", usize, 512 * 1024);

/// How many supply batches a fresh demand may stream in a single turn.
///
/// A resumed demand is always limited to a single batch per turn, so that no
/// demander can monopolise the supplier.
pub static REBALANCE_BATCHES_COUNT: Lazy<u32> =
	lazy_env_parse!("TESSERA_REBALANCE_BATCHES_COUNT", u32, 3);

/// Milliseconds to sleep between consecutive supply batches.
///
/// Applied after a successful send only, and never after the final batch of a
/// turn. A value of zero disables throttling.
pub static REBALANCE_THROTTLE: Lazy<u64> = lazy_env_parse!("TESSERA_REBALANCE_THROTTLE", u64, 0);

/// The number of demander-side rebalance workers per node.
///
/// Each demand carries a worker slot in `[0, REBALANCE_THREAD_POOL_SIZE)`,
/// and a `(demander, slot)` pair has at most one outstanding demand.
pub static REBALANCE_THREAD_POOL_SIZE: Lazy<u32> =
	lazy_env_parse_or_else!("TESSERA_REBALANCE_THREAD_POOL_SIZE", u32, |_| {
		(num_cpus::get() as u32 / 4).clamp(1, 4)
	});
