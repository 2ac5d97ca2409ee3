//! Provider integration module
//!
//! A provider is the blockchain client the application talks to: it answers
//! network and account queries, executes contract calls and transactions, and
//! streams contract event logs. The JSON-RPC client talks to a node over HTTP
//! and WebSocket; the gateway turns a configured endpoint into a connection
//! handle for the bootstrap sequence.

/// JSON-RPC client over HTTP with WebSocket log subscriptions
mod client;
/// Connection acquisition and network/account resolution
mod gateway;
/// Type definitions for provider data structures
mod types;

pub use client::JsonRpcProvider;
pub use gateway::{GatewayError, NetworkInfo, ProviderGateway, ProviderSource};
pub use types::*;

use alloy_primitives::{Address, Bytes};
use std::sync::Arc;

/// Shared connection handle to a provider, alive for the whole session.
pub type Connection = Arc<dyn Provider>;

/// Operations the application needs from a blockchain client.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
	/// Classification of the network the provider is attached to.
	async fn network_type(&self) -> Result<NetworkType, ProviderError>;

	/// Network identifier used to look up contract deployments.
	async fn network_id(&self) -> Result<NetworkId, ProviderError>;

	/// Accounts the provider can sign for, primary account first.
	async fn accounts(&self) -> Result<Vec<Address>, ProviderError>;

	/// Number of the most recent block.
	async fn block_number(&self) -> Result<u64, ProviderError>;

	/// Historical logs matching the filter, in chain order.
	async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, ProviderError>;

	/// Live logs matching the filter. Items produced before the stream is
	/// first polled are buffered, not dropped.
	async fn subscribe_logs(&self, filter: &LogFilter) -> Result<LogStream, ProviderError>;

	/// Read-only contract call against the latest block.
	async fn call(&self, request: &CallRequest) -> Result<Bytes, ProviderError>;

	/// Submits a transaction signed by `request.from` and waits for its receipt.
	///
	/// A reverted transaction is reported as [`ProviderError::Reverted`].
	async fn send_transaction(&self, request: &CallRequest) -> Result<TxReceipt, ProviderError>;
}
