//! In-memory reference implementations of the collaborator seams of the
//! supply engine. These back the embedded single-node mode and the test
//! suite, the same way an in-memory datastore backs a persistent one.

mod aff;
mod bus;
mod dep;
mod ovf;
mod part;

pub use self::aff::MemAffinity;
pub use self::bus::MemBus;
pub use self::dep::MemDeployments;
pub use self::ovf::MemOverflowStore;
pub use self::part::{MemPartition, MemPartitionStore};
