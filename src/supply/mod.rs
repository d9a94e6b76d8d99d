//! The partition supply engine.
//!
//! When a peer node joins, leaves, or rebalances, it demands the partitions
//! it should now host from the nodes which currently own them. This module
//! streams the contents of those partitions back to the demander in bounded
//! batches, resumes where it left off across repeated demands, and releases
//! every held resource when the demander disappears or the cluster view
//! changes.

mod context;
mod events;
mod listener;
mod message;
mod pool;
mod supplier;

#[cfg(test)]
mod tests;

pub use self::message::*;
pub use self::pool::Demand;
pub use self::supplier::*;
