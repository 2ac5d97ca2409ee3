//! Session bootstrap sequence.
//!
//! `initialize` runs the startup stages strictly in order, each one consuming
//! what the previous produced:
//!
//! 1. acquire the provider connection
//! 2. resolve network and accounts
//! 3. load the token contract
//! 4. load the exchange contract
//! 5. load the order book snapshot and start the live subscription
//!
//! The first failing stage ends the session attempt. Nothing is retried and
//! there is no degraded mode: a missing contract halts before any order-book
//! work is done.

use crate::contracts::{
	ContractHandle, ContractKind, ContractLoader, ExchangeContract, ExchangeError, TokenContract,
};
use crate::provider::{Connection, GatewayError, NetworkInfo, ProviderError, ProviderGateway};
use crate::store::Store;
use crate::sync::progress_tracker::SyncStats;
use crate::sync::subscriber::{Subscription, bootstrap_order_book};
use crate::sync::types::SyncError;

use alloy_primitives::Address;
use tracing::{error, info};

/// Fatal bootstrap failures.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
	#[error("No blockchain provider detected ({0}). Connect to a supported wallet or node.")]
	NoProvider(#[source] GatewayError),

	#[error("The provider exposes no accounts. Unlock or create an account in the wallet.")]
	NoAccount,

	#[error("{0} smart contract not detected on the current network. Please select another network.")]
	ContractNotFound(ContractKind),

	#[error("Provider error: {0}")]
	Provider(#[from] ProviderError),

	#[error("Order book sync error: {0}")]
	Sync(#[from] SyncError),
}

/// Inputs of one application session.
pub struct Session {
	pub gateway: ProviderGateway,
	pub loader: ContractLoader,
	pub store: Store,
}

impl Session {
	pub fn new(gateway: ProviderGateway, loader: ContractLoader, store: Store) -> Self {
		Self {
			gateway,
			loader,
			store,
		}
	}
}

/// A fully bootstrapped session.
pub struct Ready {
	pub provider: Connection,
	pub store: Store,
	pub network: NetworkInfo,
	pub account: Address,
	pub token: ContractHandle,
	pub exchange: ContractHandle,
	subscription: Subscription,
}

impl Ready {
	pub fn token_contract(&self) -> TokenContract {
		TokenContract::new(self.provider.clone(), self.token.clone())
	}

	pub fn exchange_contract(&self) -> Result<ExchangeContract, ExchangeError> {
		ExchangeContract::new(self.provider.clone(), self.exchange.clone())
	}

	pub fn is_listening(&self) -> bool {
		self.subscription.is_active()
	}

	/// Ends the session, releasing the event subscription.
	pub async fn shutdown(self) -> Result<SyncStats, SyncError> {
		let stats = self.subscription.unsubscribe().await?;
		info!("Session closed: {}", stats.summary());
		Ok(stats)
	}
}

/// Run the bootstrap sequence once for `session`.
pub async fn initialize(session: Session) -> Result<Ready, BootstrapError> {
	let Session {
		gateway,
		loader,
		store,
	} = session;

	// Stage 1: connection
	let provider = gateway.connect().await.map_err(|e| {
		error!("No provider: {}", e);
		BootstrapError::NoProvider(e)
	})?;
	info!("Connected to provider");

	// Stage 2: network and accounts
	let network = ProviderGateway::network(&provider).await?;
	store.connection_loaded(network);

	let accounts = ProviderGateway::accounts(&provider).await?;
	let Some(&account) = accounts.first() else {
		error!("Provider returned no accounts");
		return Err(BootstrapError::NoAccount);
	};
	store.account_loaded(account);
	info!(%account, "Loaded account");

	// Stage 3: token
	let token = load_stage(&loader, &store, network, ContractKind::Token)?;

	// Stage 4: exchange
	let exchange = load_stage(&loader, &store, network, ContractKind::Exchange)?;
	debug_assert!(store.contracts_loaded());

	// Stage 5: order book
	let subscription = bootstrap_order_book(&provider, &exchange, &store).await?;
	info!(orders = store.orders().len(), "Session ready");

	Ok(Ready {
		provider,
		store,
		network,
		account,
		token,
		exchange,
		subscription,
	})
}

fn load_stage(
	loader: &ContractLoader,
	store: &Store,
	network: NetworkInfo,
	kind: ContractKind,
) -> Result<ContractHandle, BootstrapError> {
	let Some(handle) = loader.load_contract(network.id, kind) else {
		let err = BootstrapError::ContractNotFound(kind);
		error!(network_id = %network.id, "{}", err);
		return Err(err);
	};
	match kind {
		ContractKind::Token => store.token_loaded(handle.clone()),
		ContractKind::Exchange => store.exchange_loaded(handle.clone()),
	}
	Ok(handle)
}
