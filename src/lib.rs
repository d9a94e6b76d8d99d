//! The core library for TesseraDB, a scalable, distributed, partitioned
//! key-value store. This crate contains the partition supply engine, which
//! streams the contents of locally owned partitions to peer nodes during
//! cluster rebalancing, along with the collaborator seams it is driven by.

#[macro_use]
extern crate tracing;

#[macro_use]
mod mac;

#[doc(hidden)]
pub mod aff;
#[doc(hidden)]
pub mod bus;
#[doc(hidden)]
pub mod cnf;
#[doc(hidden)]
pub mod dep;
#[doc(hidden)]
pub mod err;
#[doc(hidden)]
pub mod mem;
#[doc(hidden)]
pub mod node;
#[doc(hidden)]
pub mod options;
#[doc(hidden)]
pub mod ovf;
#[doc(hidden)]
pub mod part;
pub mod supply;

#[doc(hidden)]
/// Channels for delivering demand messages and cluster events
pub mod channels {
	pub use channel::bounded;
	pub use channel::unbounded;
	pub use channel::Receiver;
	pub use channel::Sender;
}
