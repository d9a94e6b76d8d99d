use revision::revisioned;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A totally ordered tag denoting a specific cluster membership and
/// partition assignment. Every demand and every supply reply is stamped
/// with the topology version it was issued against; two values are equal
/// iff they denote the same cluster view.
#[revisioned(revision = 1)]
#[derive(
	Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[non_exhaustive]
pub struct TopologyVersion {
	pub value: u64,
}

impl From<u64> for TopologyVersion {
	fn from(value: u64) -> Self {
		TopologyVersion {
			value,
		}
	}
}

impl fmt::Display for TopologyVersion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.value)
	}
}

impl TopologyVersion {
	/// The topology version denoting the next cluster view
	pub fn next(&self) -> Self {
		TopologyVersion {
			value: self.value + 1,
		}
	}
}

/// The kinds of cluster membership change the supply engine reacts to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ClusterEventKind {
	/// A node left the cluster in an orderly fashion
	NodeLeft,
	/// A node was detected as failed and removed from the cluster
	NodeFailed,
	/// Rebalancing towards a node was stopped
	RebalanceStopped,
}

/// A cluster membership event distributed by the membership service.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct ClusterEvent {
	/// The kind of membership change
	pub kind: ClusterEventKind,
	/// The node affected by the change
	pub node: Uuid,
}

impl ClusterEvent {
	/// Construct a new cluster membership event
	pub const fn new(kind: ClusterEventKind, node: Uuid) -> Self {
		Self {
			kind,
			node,
		}
	}
}
