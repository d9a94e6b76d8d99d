use revision::revisioned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Deployment metadata describing the code which produced a set of entries.
/// Attached to a supply stream at most once, so that the demander can set up
/// the matching deployment before applying overflow-sourced entries.
#[revisioned(revision = 1)]
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct DeploymentInfo {
	/// The loader this deployment information was resolved from
	pub loader: Uuid,
	/// The node which registered the deployment
	pub node: Uuid,
	/// The user version tag of the deployed artefacts
	pub user_version: String,
}

/// The registry of code deployments known to this node.
pub trait DeploymentRegistry: Send + Sync {
	/// Resolve a loader id to its deployment information
	fn deployment_for(&self, loader: Uuid) -> Option<DeploymentInfo>;
}
