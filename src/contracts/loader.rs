//! Contract loader.
//!
//! Resolves the deployed address and interface of a contract for the active
//! network from Truffle-style build artifacts (`<Name>.json` with `abi` and a
//! `networks` map keyed by network id). A network without a deployment entry
//! resolves to `None`, which the bootstrap sequence turns into a
//! "contract not found" notice instead of a crash.

use crate::contracts::abi::AbiEntry;
use crate::provider::NetworkId;
use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// The two contracts the application works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractKind {
	Token,
	Exchange,
}

impl ContractKind {
	pub const ALL: [ContractKind; 2] = [ContractKind::Token, ContractKind::Exchange];

	/// Contract name as used in artifact file names.
	pub fn contract_name(&self) -> &'static str {
		match self {
			ContractKind::Token => "Token",
			ContractKind::Exchange => "Exchange",
		}
	}
}

impl fmt::Display for ContractKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.contract_name())
	}
}

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
	#[error("Failed to read artifact {path:?}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Malformed artifact {name}: {source}")]
	Json {
		name: String,
		#[source]
		source: serde_json::Error,
	},

	#[error("Artifact {name} has a non-numeric network key {key:?}")]
	InvalidNetworkKey { name: String, key: String },
}

/// Deployment of a contract on one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDeployment {
	pub address: Address,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transaction_hash: Option<B256>,
}

/// Compiled contract artifact: interface plus per-network deployments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
	pub contract_name: String,
	pub abi: Vec<AbiEntry>,
	#[serde(default)]
	pub networks: BTreeMap<String, NetworkDeployment>,
}

impl Artifact {
	pub fn from_json(name: &str, text: &str) -> Result<Self, LoaderError> {
		let artifact: Artifact = serde_json::from_str(text).map_err(|source| LoaderError::Json {
			name: name.to_string(),
			source,
		})?;
		if let Some(key) = artifact.networks.keys().find(|key| key.parse::<u64>().is_err()) {
			return Err(LoaderError::InvalidNetworkKey {
				name: name.to_string(),
				key: key.clone(),
			});
		}
		Ok(artifact)
	}

	/// Adds or replaces the deployment entry for `network_id`.
	pub fn with_deployment(mut self, network_id: NetworkId, address: Address) -> Self {
		self.networks.insert(
			network_id.to_string(),
			NetworkDeployment {
				address,
				transaction_hash: None,
			},
		);
		self
	}

	pub fn deployment(&self, network_id: NetworkId) -> Option<&NetworkDeployment> {
		self.networks.get(&network_id.to_string())
	}
}

/// Deployment metadata for every known contract kind.
#[derive(Debug, Clone, Default)]
pub struct DeploymentRegistry {
	artifacts: HashMap<ContractKind, Arc<Artifact>>,
}

impl DeploymentRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Reads `Token.json` and `Exchange.json` from `dir`. A missing file leaves
	/// that kind without deployments.
	pub fn from_dir(dir: &Path) -> Result<Self, LoaderError> {
		let mut registry = Self::new();
		for kind in ContractKind::ALL {
			let path = dir.join(format!("{}.json", kind.contract_name()));
			if !path.exists() {
				debug!(?path, "No artifact for {}", kind);
				continue;
			}
			let text = std::fs::read_to_string(&path).map_err(|source| LoaderError::Io {
				path: path.clone(),
				source,
			})?;
			registry.insert(kind, Artifact::from_json(kind.contract_name(), &text)?);
		}
		info!(?dir, artifacts = registry.artifacts.len(), "Loaded deployment metadata");
		Ok(registry)
	}

	pub fn insert(&mut self, kind: ContractKind, artifact: Artifact) {
		self.artifacts.insert(kind, Arc::new(artifact));
	}

	pub fn artifact(&self, kind: ContractKind) -> Option<&Artifact> {
		self.artifacts.get(&kind).map(Arc::as_ref)
	}
}

/// Deployed address plus interface of one contract on one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractHandle {
	pub kind: ContractKind,
	pub network_id: NetworkId,
	pub address: Address,
	pub abi: Arc<Vec<AbiEntry>>,
}

impl ContractHandle {
	pub fn event(&self, name: &str) -> Option<&AbiEntry> {
		self.abi.iter().find(|entry| entry.is_event(name))
	}

	/// Whether the interface declares an event or function with exactly this
	/// canonical signature.
	pub fn declares(&self, signature: &str) -> bool {
		self.abi.iter().any(|entry| entry.signature() == signature)
	}

	pub fn has_function(&self, name: &str) -> bool {
		self.abi.iter().any(|entry| entry.is_function(name))
	}
}

/// Resolves contract handles from deployment metadata.
#[derive(Debug, Clone)]
pub struct ContractLoader {
	registry: DeploymentRegistry,
}

impl ContractLoader {
	pub fn new(registry: DeploymentRegistry) -> Self {
		Self { registry }
	}

	/// Handle for `kind` on `network_id`, or `None` when the contract has no
	/// deployment on that network.
	pub fn load_contract(&self, network_id: NetworkId, kind: ContractKind) -> Option<ContractHandle> {
		let Some(artifact) = self.registry.artifacts.get(&kind) else {
			debug!(%kind, "No deployment metadata for contract");
			return None;
		};
		let Some(deployment) = artifact.deployment(network_id) else {
			debug!(%kind, %network_id, "Contract not deployed on network");
			return None;
		};

		info!(%kind, %network_id, address = %deployment.address, "Loaded contract");
		Some(ContractHandle {
			kind,
			network_id,
			address: deployment.address,
			abi: Arc::new(artifact.abi.clone()),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{exchange_artifact, token_artifact};

	#[test]
	fn missing_deployment_is_none() {
		let mut registry = DeploymentRegistry::new();
		registry.insert(
			ContractKind::Token,
			token_artifact().with_deployment(NetworkId(5777), Address::repeat_byte(1)),
		);
		let loader = ContractLoader::new(registry);

		assert!(loader.load_contract(NetworkId(1), ContractKind::Token).is_none());
		assert!(loader.load_contract(NetworkId(5777), ContractKind::Exchange).is_none());
		assert!(loader.load_contract(NetworkId(5777), ContractKind::Token).is_some());
	}

	#[test]
	fn loading_twice_yields_equal_handles() {
		let mut registry = DeploymentRegistry::new();
		registry.insert(
			ContractKind::Exchange,
			exchange_artifact().with_deployment(NetworkId(5777), Address::repeat_byte(2)),
		);
		let loader = ContractLoader::new(registry);

		let first = loader.load_contract(NetworkId(5777), ContractKind::Exchange);
		let second = loader.load_contract(NetworkId(5777), ContractKind::Exchange);
		assert!(first.is_some());
		assert_eq!(first, second);
	}

	#[test]
	fn handle_reports_declared_signatures() {
		let mut registry = DeploymentRegistry::new();
		registry.insert(
			ContractKind::Token,
			token_artifact().with_deployment(NetworkId(5777), Address::repeat_byte(1)),
		);
		let handle = ContractLoader::new(registry)
			.load_contract(NetworkId(5777), ContractKind::Token)
			.expect("token handle");

		assert!(handle.event("Transfer").is_some());
		assert!(handle.declares("Transfer(address,address,uint256)"));
		assert!(!handle.declares("Transfer(address,uint256)"));
		assert!(handle.event("Order").is_none());
		assert!(handle.has_function("transferFrom"));
	}

	#[test]
	fn reads_artifacts_from_directory() {
		let dir = tempfile::tempdir().expect("tempdir");
		let artifact = token_artifact().with_deployment(NetworkId(5777), Address::repeat_byte(3));
		std::fs::write(
			dir.path().join("Token.json"),
			serde_json::to_string(&artifact).expect("serialize"),
		)
		.expect("write artifact");

		let registry = DeploymentRegistry::from_dir(dir.path()).expect("registry");
		assert_eq!(registry.artifact(ContractKind::Token), Some(&artifact));
		assert!(registry.artifact(ContractKind::Exchange).is_none());
	}

	#[test]
	fn malformed_artifact_is_an_error() {
		let err = Artifact::from_json("Token", "{\"abi\": 3}").expect_err("should fail");
		assert!(matches!(err, LoaderError::Json { .. }));

		let text = serde_json::json!({
			"contractName": "Token",
			"abi": [],
			"networks": {"dev": {"address": "0x0000000000000000000000000000000000000001"}}
		})
		.to_string();
		let err = Artifact::from_json("Token", &text).expect_err("should fail");
		assert!(matches!(err, LoaderError::InvalidNetworkKey { .. }));
	}
}
