/// ABI encoding, decoding and interface descriptions
pub mod abi;
/// Exchange contract client
pub mod exchange;
/// Deployment metadata and contract handle resolution
pub mod loader;
/// ERC-20 token contract client
pub mod token;

pub use exchange::{ExchangeContract, ExchangeError};
pub use loader::{
	Artifact, ContractHandle, ContractKind, ContractLoader, DeploymentRegistry, LoaderError,
	NetworkDeployment,
};
pub use token::{ApprovalEvent, TokenContract, TokenError, TransferEvent};

/// Number of decimal places of the exchange token and of ether.
pub const TOKEN_DECIMALS: u32 = 18;
