//! In-memory development chain.
//!
//! `DevChain` implements [`Provider`] without a node: it holds token and
//! exchange contract state, mines one block per transaction and pushes every
//! mined log to open subscriptions. Tests and the `--dev` mode of the binary
//! run against it.

mod ledger;

pub use ledger::REVERT_MESSAGE;

use crate::contracts::{
	Artifact, ContractHandle, ContractKind, ContractLoader, DeploymentRegistry, ExchangeContract,
};
use crate::provider::{
	CallRequest, Log, LogFilter, LogStream, NetworkId, NetworkType, Provider, ProviderError,
	TxReceipt,
};
use ledger::{Contract, ExchangeState, TokenState};

use alloy_primitives::{Address, Bytes, LogData, U256, keccak256};
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

/// Chain id reported by local development nodes.
const DEV_CHAIN_ID: u64 = 1337;
/// Logs buffered per subscriber before it counts as lagging.
const SUBSCRIPTION_BUFFER: usize = 1024;

/// Token artifact bundled with the crate, without deployments.
pub fn token_artifact() -> Artifact {
	Artifact::from_json("Token", include_str!("../../abis/Token.json"))
		.expect("bundled Token artifact is valid")
}

/// Exchange artifact bundled with the crate, without deployments.
pub fn exchange_artifact() -> Artifact {
	Artifact::from_json("Exchange", include_str!("../../abis/Exchange.json"))
		.expect("bundled Exchange artifact is valid")
}

#[derive(Default)]
struct Ledger {
	block_number: u64,
	tx_count: u64,
	deployments: u64,
	contracts: HashMap<Address, Contract>,
	logs: Vec<Log>,
}

/// In-memory chain with unlocked accounts.
pub struct DevChain {
	network_id: NetworkId,
	accounts: Vec<Address>,
	ledger: Mutex<Ledger>,
	live: broadcast::Sender<Log>,
	log_queries: AtomicUsize,
}

impl DevChain {
	/// Chain reporting `network_id` with `account_count` random accounts.
	pub fn new(network_id: u64, account_count: usize) -> Self {
		let mut rng = rand::rng();
		let accounts = (0..account_count)
			.map(|_| {
				let mut bytes = [0u8; 20];
				rng.fill(&mut bytes);
				Address::from(bytes)
			})
			.collect();
		let (live, _) = broadcast::channel(SUBSCRIPTION_BUFFER);
		Self {
			network_id: NetworkId(network_id),
			accounts,
			ledger: Mutex::new(Ledger::default()),
			live,
			log_queries: AtomicUsize::new(0),
		}
	}

	pub fn account_list(&self) -> Vec<Address> {
		self.accounts.clone()
	}

	/// Number of `get_logs` queries served so far.
	pub fn log_queries(&self) -> usize {
		self.log_queries.load(Ordering::SeqCst)
	}

	fn ledger(&self) -> MutexGuard<'_, Ledger> {
		self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn deploy(&self, contract: Contract) -> Address {
		let mut ledger = self.ledger();
		ledger.deployments += 1;
		let mut seed = b"devchain-contract".to_vec();
		seed.extend_from_slice(&ledger.deployments.to_be_bytes());
		let address = Address::from_slice(&keccak256(&seed)[12..]);
		ledger.contracts.insert(address, contract);
		ledger.block_number += 1;
		address
	}

	/// Deploys a token crediting the whole supply to `deployer`.
	pub fn deploy_token(&self, deployer: Address, name: &str, symbol: &str, total_supply: U256) -> Address {
		let address = self.deploy(Contract::Token(TokenState::new(deployer, name, symbol, total_supply)));
		debug!(%address, symbol, "Deployed token");
		address
	}

	pub fn deploy_exchange(&self, fee_account: Address, fee_percent: u64) -> Address {
		let address = self.deploy(Contract::Exchange(ExchangeState::new(fee_account, fee_percent)));
		debug!(%address, "Deployed exchange");
		address
	}

	/// Deployment metadata for the given contracts on this chain's network.
	pub fn registry(&self, token: Option<Address>, exchange: Option<Address>) -> DeploymentRegistry {
		let mut registry = DeploymentRegistry::new();
		if let Some(address) = token {
			registry.insert(
				ContractKind::Token,
				token_artifact().with_deployment(self.network_id, address),
			);
		}
		if let Some(address) = exchange {
			registry.insert(
				ContractKind::Exchange,
				exchange_artifact().with_deployment(self.network_id, address),
			);
		}
		registry
	}

	pub fn handles(
		&self,
		token: Option<Address>,
		exchange: Option<Address>,
	) -> (Option<ContractHandle>, Option<ContractHandle>) {
		let loader = ContractLoader::new(self.registry(token, exchange));
		(
			loader.load_contract(self.network_id, ContractKind::Token),
			loader.load_contract(self.network_id, ContractKind::Exchange),
		)
	}

	/// Exchange client bound to this chain.
	pub fn exchange_client(self: &std::sync::Arc<Self>, exchange: Address) -> ExchangeContract {
		let handle = self
			.handles(None, Some(exchange))
			.1
			.expect("exchange is registered on this network");
		ExchangeContract::new(self.clone(), handle).expect("bundled Exchange artifact declares order events")
	}

	fn mine(&self, ledger: &mut Ledger, contract: Address, emitted: Vec<LogData>) -> TxReceipt {
		ledger.block_number += 1;
		ledger.tx_count += 1;
		let block_number = ledger.block_number;
		let transaction_hash = keccak256(ledger.tx_count.to_be_bytes());

		let logs: Vec<Log> = emitted
			.into_iter()
			.enumerate()
			.map(|(index, event)| Log {
				address: contract,
				topics: event.topics().to_vec(),
				data: event.data,
				block_number: Some(block_number),
				log_index: Some(index as u64),
				transaction_hash: Some(transaction_hash),
				removed: false,
			})
			.collect();

		for log in &logs {
			ledger.logs.push(log.clone());
			// No receivers is fine.
			let _ = self.live.send(log.clone());
		}
		debug!(block_number, logs = logs.len(), "Mined block");

		TxReceipt {
			transaction_hash,
			block_number: Some(block_number),
			status: Some(1),
			logs,
		}
	}
}

fn now() -> u64 {
	u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

fn no_contract(address: Address) -> ProviderError {
	ProviderError::Reverted(format!("{REVERT_MESSAGE} (no contract at {address})"))
}

#[async_trait::async_trait]
impl Provider for DevChain {
	async fn network_type(&self) -> Result<NetworkType, ProviderError> {
		Ok(NetworkType::from_chain_id(DEV_CHAIN_ID))
	}

	async fn network_id(&self) -> Result<NetworkId, ProviderError> {
		Ok(self.network_id)
	}

	async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
		Ok(self.accounts.clone())
	}

	async fn block_number(&self) -> Result<u64, ProviderError> {
		Ok(self.ledger().block_number)
	}

	async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, ProviderError> {
		self.log_queries.fetch_add(1, Ordering::SeqCst);
		Ok(self
			.ledger()
			.logs
			.iter()
			.filter(|log| filter.matches(log))
			.cloned()
			.collect())
	}

	async fn subscribe_logs(&self, filter: &LogFilter) -> Result<LogStream, ProviderError> {
		let receiver = self.live.subscribe();
		let filter = filter.clone();
		let stream = futures::stream::unfold((receiver, filter), |(mut receiver, filter)| async move {
			loop {
				match receiver.recv().await {
					Ok(log) if filter.matches(&log) => return Some((Ok(log), (receiver, filter))),
					Ok(_) => continue,
					Err(RecvError::Lagged(missed)) => {
						let err = ProviderError::SubscriptionError(format!("subscriber lagged behind by {missed} logs"));
						return Some((Err(err), (receiver, filter)));
					}
					Err(RecvError::Closed) => return None,
				}
			}
		});
		Ok(Box::pin(stream))
	}

	async fn call(&self, request: &CallRequest) -> Result<Bytes, ProviderError> {
		let ledger = self.ledger();
		let contract = ledger.contracts.get(&request.to).ok_or_else(|| no_contract(request.to))?;
		Ok(contract.call(&request.data)?.into())
	}

	async fn send_transaction(&self, request: &CallRequest) -> Result<TxReceipt, ProviderError> {
		let sender = request.from.ok_or_else(|| ProviderError::Rpc {
			code: -32000,
			message: "from address is required".to_string(),
		})?;
		if !self.accounts.contains(&sender) {
			return Err(ProviderError::Rpc {
				code: -32000,
				message: format!("sender account {sender} not recognized"),
			});
		}
		let mut ledger = self.ledger();
		let emitted = ledger
			.contracts
			.get_mut(&request.to)
			.ok_or_else(|| no_contract(request.to))?
			.execute(sender, &request.data, now())?;
		Ok(self.mine(&mut ledger, request.to, emitted))
	}
}
