use crate::dep::{DeploymentInfo, DeploymentRegistry};
use dashmap::DashMap;
use uuid::Uuid;

/// An in-memory registry of code deployments.
pub struct MemDeployments {
	/// The known deployments keyed by loader id
	loaders: DashMap<Uuid, DeploymentInfo>,
}

impl Default for MemDeployments {
	fn default() -> Self {
		Self::new()
	}
}

impl MemDeployments {
	/// Create a new, empty deployment registry
	pub fn new() -> Self {
		Self {
			loaders: DashMap::new(),
		}
	}

	/// Register the deployment information for a loader
	pub fn register(&self, info: DeploymentInfo) {
		self.loaders.insert(info.loader, info);
	}
}

impl DeploymentRegistry for MemDeployments {
	fn deployment_for(&self, loader: Uuid) -> Option<DeploymentInfo> {
		self.loaders.get(&loader).map(|info| info.value().clone())
	}
}
