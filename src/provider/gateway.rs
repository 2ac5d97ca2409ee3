//! Provider gateway: turns the configured provider source into a live
//! connection handle and resolves the network and account list.

use super::{Connection, JsonRpcProvider, NetworkId, NetworkType, ProviderError};
use alloy_primitives::Address;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where the connection comes from.
#[derive(Clone)]
pub enum ProviderSource {
	/// A node reachable over JSON-RPC. `None` means no endpoint was configured.
	JsonRpc {
		rpc_url: Option<String>,
		ws_url: Option<String>,
		receipt_poll_interval: Duration,
	},
	/// A provider object handed over by the host, e.g. an in-process chain.
	Injected(Connection),
}

/// Why no connection handle could be acquired.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
	#[error("no provider endpoint is configured")]
	NoEndpoint,

	#[error("failed to create provider client: {0}")]
	Client(#[source] ProviderError),

	#[error("provider is not reachable: {0}")]
	Unreachable(#[from] ProviderError),
}

/// Network the session is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
	pub id: NetworkId,
	pub kind: NetworkType,
}

/// Acquires the session's connection handle.
#[derive(Clone)]
pub struct ProviderGateway {
	source: ProviderSource,
}

impl ProviderGateway {
	pub fn new(source: ProviderSource) -> Self {
		Self { source }
	}

	pub fn injected(provider: Connection) -> Self {
		Self::new(ProviderSource::Injected(provider))
	}

	/// Obtain a connection handle.
	///
	/// Fails when no endpoint is configured or the endpoint does not answer a
	/// network id query.
	pub async fn connect(&self) -> Result<Connection, GatewayError> {
		let provider: Connection = match &self.source {
			ProviderSource::Injected(provider) => provider.clone(),
			ProviderSource::JsonRpc {
				rpc_url,
				ws_url,
				receipt_poll_interval,
			} => {
				let Some(rpc_url) = rpc_url else {
					return Err(GatewayError::NoEndpoint);
				};
				let ws_url = ws_url.clone().unwrap_or_else(|| websocket_url(rpc_url));
				let client = JsonRpcProvider::new(rpc_url.clone(), ws_url)
					.map_err(GatewayError::Client)?
					.with_receipt_poll_interval(*receipt_poll_interval);
				Arc::new(client)
			}
		};

		match provider.network_id().await {
			Ok(network_id) => {
				debug!(%network_id, "Provider answered network id query");
				Ok(provider)
			}
			Err(e) => {
				warn!("Provider did not answer network id query: {}", e);
				Err(GatewayError::Unreachable(e))
			}
		}
	}

	/// Network type and identifier, read in that order.
	pub async fn network(connection: &Connection) -> Result<NetworkInfo, ProviderError> {
		let kind = connection.network_type().await?;
		let id = connection.network_id().await?;
		info!(network_id = %id, network_type = %kind, "Resolved network");
		Ok(NetworkInfo { id, kind })
	}

	pub async fn accounts(connection: &Connection) -> Result<Vec<Address>, ProviderError> {
		let accounts = connection.accounts().await?;
		debug!(count = accounts.len(), "Fetched accounts");
		Ok(accounts)
	}
}

/// WebSocket endpoint served next to an HTTP endpoint, as local nodes do.
pub fn websocket_url(rpc_url: &str) -> String {
	if let Some(rest) = rpc_url.strip_prefix("https://") {
		format!("wss://{rest}")
	} else if let Some(rest) = rpc_url.strip_prefix("http://") {
		format!("ws://{rest}")
	} else {
		rpc_url.to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn derives_websocket_endpoint() {
		assert_eq!(websocket_url("http://127.0.0.1:7545"), "ws://127.0.0.1:7545");
		assert_eq!(websocket_url("https://rpc.example.org/v1"), "wss://rpc.example.org/v1");
		assert_eq!(websocket_url("ws://node:8546"), "ws://node:8546");
	}

	#[tokio::test]
	async fn missing_endpoint_is_rejected() {
		let gateway = ProviderGateway::new(ProviderSource::JsonRpc {
			rpc_url: None,
			ws_url: None,
			receipt_poll_interval: Duration::from_millis(100),
		});
		let err = gateway.connect().await.err().expect("connect should fail");
		assert!(matches!(err, GatewayError::NoEndpoint));
		assert_eq!(err.to_string(), "no provider endpoint is configured");
	}

	#[tokio::test]
	async fn silent_endpoint_is_unreachable() {
		let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
		let port = listener.local_addr().expect("local addr").port();
		drop(listener);

		let gateway = ProviderGateway::new(ProviderSource::JsonRpc {
			rpc_url: Some(format!("http://127.0.0.1:{port}")),
			ws_url: None,
			receipt_poll_interval: Duration::from_millis(100),
		});
		let err = gateway.connect().await.err().expect("nothing listens on the port");
		assert!(matches!(err, GatewayError::Unreachable(ProviderError::HttpError(_))));
	}
}
