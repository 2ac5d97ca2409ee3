//!
//! JSON-RPC client for an Ethereum-compatible node.
//!
//! Calls and transactions go over HTTP. Log subscriptions use `eth_subscribe`
//! over a WebSocket connection and are exposed as an async stream. All methods
//! are async and designed for use with Tokio.

use super::Provider;
use super::types::*;
use alloy_primitives::{Address, B256, Bytes};
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info};

/// Ethereum JSON-RPC client
#[derive(Clone)]
pub struct JsonRpcProvider {
	/// The underlying HTTP client for JSON-RPC requests.
	http_client: Client,
	/// The HTTP JSON-RPC endpoint.
	rpc_url: String,
	/// The WebSocket endpoint for log subscriptions.
	ws_url: String,
	/// Monotonic JSON-RPC request id.
	request_id: Arc<AtomicU64>,
	/// Delay between receipt polls while a transaction is pending.
	receipt_poll_interval: Duration,
}

impl JsonRpcProvider {
	/// Create a new JSON-RPC client.
	///
	/// # Arguments
	/// * `rpc_url` - The HTTP endpoint for calls and transactions.
	/// * `ws_url` - The WebSocket endpoint for subscriptions.
	pub fn new(rpc_url: String, ws_url: String) -> Result<Self, ProviderError> {
		let http_client = Client::builder().timeout(Duration::from_secs(30)).build()?;

		Ok(Self {
			http_client,
			rpc_url,
			ws_url,
			request_id: Arc::new(AtomicU64::new(1)),
			receipt_poll_interval: Duration::from_millis(500),
		})
	}

	pub fn with_receipt_poll_interval(mut self, interval: Duration) -> Self {
		self.receipt_poll_interval = interval;
		self
	}

	pub fn rpc_url(&self) -> &str {
		&self.rpc_url
	}

	/// Execute a JSON-RPC request and deserialize its `result`.
	///
	/// # Returns
	/// The decoded result, or a `ProviderError` if the transport fails or the
	/// node answers with an error object.
	pub async fn request<T: DeserializeOwned>(
		&self,
		method: &str,
		params: serde_json::Value,
	) -> Result<T, ProviderError> {
		let request_body = json!({
			"jsonrpc": "2.0",
			"id": self.request_id.fetch_add(1, Ordering::Relaxed),
			"method": method,
			"params": params,
		});

		let response = self
			.http_client
			.post(&self.rpc_url)
			.header("Content-Type", "application/json")
			.json(&request_body)
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(ProviderError::InvalidResponse(format!(
				"HTTP status {} for {}",
				response.status(),
				method
			)));
		}

		let mut response_json: serde_json::Value = response.json().await?;

		if let Some(err) = response_json.get("error") {
			let code = err.get("code").and_then(|c| c.as_i64()).unwrap_or_default();
			let message = err
				.get("message")
				.and_then(|m| m.as_str())
				.unwrap_or("unknown error")
				.to_string();
			debug!(method, code, %message, "RPC call returned an error");
			return Err(ProviderError::from_rpc(code, message));
		}

		let result = response_json
			.get_mut("result")
			.map(serde_json::Value::take)
			.ok_or(ProviderError::NoData)?;
		Ok(serde_json::from_value(result)?)
	}

	async fn quantity(&self, method: &str) -> Result<u64, ProviderError> {
		let text: String = self.request(method, json!([])).await?;
		quantity::decode(&text).map_err(ProviderError::InvalidResponse)
	}

	async fn wait_for_receipt(&self, hash: B256) -> Result<TxReceipt, ProviderError> {
		loop {
			let receipt: Option<TxReceipt> = self
				.request("eth_getTransactionReceipt", json!([hash]))
				.await?;
			if let Some(receipt) = receipt {
				return Ok(receipt);
			}
			debug!(%hash, "Transaction pending, polling receipt again");
			tokio::time::sleep(self.receipt_poll_interval).await;
		}
	}
}

#[async_trait::async_trait]
impl Provider for JsonRpcProvider {
	async fn network_type(&self) -> Result<NetworkType, ProviderError> {
		let chain_id = self.quantity("eth_chainId").await?;
		Ok(NetworkType::from_chain_id(chain_id))
	}

	async fn network_id(&self) -> Result<NetworkId, ProviderError> {
		let version: String = self.request("net_version", json!([])).await?;
		version
			.parse::<u64>()
			.map(NetworkId)
			.map_err(|e| ProviderError::InvalidResponse(format!("net_version {version:?}: {e}")))
	}

	async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
		self.request("eth_accounts", json!([])).await
	}

	async fn block_number(&self) -> Result<u64, ProviderError> {
		self.quantity("eth_blockNumber").await
	}

	async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, ProviderError> {
		let mut logs: Vec<Log> = self.request("eth_getLogs", json!([filter.to_json()])).await?;
		logs.sort_by_key(|log| log.cursor());
		Ok(logs)
	}

	/// Subscribe to contract logs.
	///
	/// # Returns
	/// A pinned async stream of logs. Each item is either a log or an error.
	///
	/// # Errors
	/// Returns `ProviderError` if the WebSocket connection or subscription fails.
	async fn subscribe_logs(&self, filter: &LogFilter) -> Result<LogStream, ProviderError> {
		debug!("Attempting WebSocket connection to: {}", self.ws_url);

		let (ws_stream, response) = connect_async(self.ws_url.as_str()).await?;
		debug!(
			"WebSocket connection established, response status: {}",
			response.status()
		);
		let (mut ws_sender, mut ws_receiver) = ws_stream.split();

		let subscribe_message = json!({
			"jsonrpc": "2.0",
			"id": 1,
			"method": "eth_subscribe",
			"params": ["logs", filter.to_json()],
		});
		ws_sender
			.send(Message::Text(subscribe_message.to_string()))
			.await?;

		// Wait for the subscription id
		let subscription_id = loop {
			let Some(msg) = ws_receiver.next().await else {
				return Err(ProviderError::SubscriptionError(
					"Connection closed before subscription was confirmed".to_string(),
				));
			};
			match msg? {
				Message::Text(text) => {
					let parsed: serde_json::Value = serde_json::from_str(&text)?;
					if parsed.get("id") != Some(&json!(1)) {
						continue;
					}
					if let Some(err) = parsed.get("error") {
						return Err(ProviderError::SubscriptionError(err.to_string()));
					}
					let id = parsed
						.get("result")
						.and_then(|r| r.as_str())
						.ok_or(ProviderError::NoData)?;
					break id.to_string();
				}
				Message::Ping(_) | Message::Pong(_) => continue,
				_ => {
					return Err(ProviderError::SubscriptionError(
						"Unexpected message type during handshake".to_string(),
					));
				}
			}
		};

		info!(%subscription_id, address = %filter.address, "Subscribed to contract logs");

		// Return stream of logs for this subscription
		let stream = ws_receiver.filter_map(move |msg| {
			let subscription_id = subscription_id.clone();
			async move {
				match msg {
					Ok(Message::Text(text)) => {
						let parsed = match serde_json::from_str::<serde_json::Value>(&text) {
							Ok(parsed) => parsed,
							Err(e) => return Some(Err(ProviderError::JsonError(e))),
						};
						if parsed.get("method").and_then(|m| m.as_str()) != Some("eth_subscription") {
							debug!("Ignoring non-subscription message: {}", text);
							return None;
						}
						let params = parsed.get("params")?;
						if params.get("subscription").and_then(|s| s.as_str())
							!= Some(subscription_id.as_str())
						{
							return None;
						}
						match params.get("result") {
							Some(result) => match serde_json::from_value::<Log>(result.clone()) {
								Ok(log) => Some(Ok(log)),
								Err(e) => {
									error!("Failed to deserialize log: {}", e);
									Some(Err(ProviderError::JsonError(e)))
								}
							},
							None => Some(Err(ProviderError::NoData)),
						}
					}
					Ok(Message::Close(frame)) => Some(Err(ProviderError::SubscriptionError(format!(
						"Connection closed by node: {:?}",
						frame
					)))),
					Ok(_) => None,
					Err(e) => Some(Err(ProviderError::WebSocketError(e))),
				}
			}
		});

		Ok(Box::pin(stream))
	}

	async fn call(&self, request: &CallRequest) -> Result<Bytes, ProviderError> {
		self.request("eth_call", json!([request, "latest"])).await
	}

	async fn send_transaction(&self, request: &CallRequest) -> Result<TxReceipt, ProviderError> {
		let hash: B256 = self.request("eth_sendTransaction", json!([request])).await?;
		debug!(%hash, to = %request.to, "Transaction submitted");

		let receipt = self.wait_for_receipt(hash).await?;
		if !receipt.succeeded() {
			return Err(ProviderError::Reverted(format!(
				"transaction {} reverted",
				hash
			)));
		}
		Ok(receipt)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::AtomicUsize;
	use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
	use tokio::net::{TcpListener, TcpStream};

	const TX_HASH: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

	/// Minimal JSON-RPC node over HTTP/1.1. Answers `eth_sendTransaction` with
	/// a hash, reports the receipt as pending `pending_polls` times, then
	/// returns a mined receipt with `status`.
	async fn spawn_node(pending_polls: usize, status: &'static str) -> (String, Arc<AtomicUsize>) {
		let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
		let url = format!("http://{}", listener.local_addr().expect("local addr"));
		let receipt_polls = Arc::new(AtomicUsize::new(0));
		let polls = receipt_polls.clone();
		tokio::spawn(async move {
			while let Ok((socket, _)) = listener.accept().await {
				let polls = polls.clone();
				tokio::spawn(async move {
					let _ = serve(socket, pending_polls, status, polls).await;
				});
			}
		});
		(url, receipt_polls)
	}

	async fn serve(
		socket: TcpStream,
		pending_polls: usize,
		status: &str,
		polls: Arc<AtomicUsize>,
	) -> std::io::Result<()> {
		let mut reader = BufReader::new(socket);
		let mut content_length = 0;
		loop {
			let mut line = String::new();
			reader.read_line(&mut line).await?;
			let line = line.trim_end();
			if line.is_empty() {
				break;
			}
			if let Some((name, value)) = line.split_once(':') {
				if name.eq_ignore_ascii_case("content-length") {
					content_length = value.trim().parse().unwrap_or_default();
				}
			}
		}
		let mut body = vec![0u8; content_length];
		reader.read_exact(&mut body).await?;
		let request: serde_json::Value = serde_json::from_slice(&body)?;

		let result = match request["method"].as_str() {
			Some("eth_sendTransaction") => json!(TX_HASH),
			Some("eth_getTransactionReceipt") => {
				if polls.fetch_add(1, Ordering::SeqCst) < pending_polls {
					serde_json::Value::Null
				} else {
					json!({
						"transactionHash": TX_HASH,
						"blockNumber": "0x5",
						"status": status,
						"logs": [],
					})
				}
			}
			_ => serde_json::Value::Null,
		};
		let response = json!({"jsonrpc": "2.0", "id": request["id"], "result": result}).to_string();
		let mut socket = reader.into_inner();
		socket
			.write_all(
				format!(
					"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
					response.len(),
					response
				)
				.as_bytes(),
			)
			.await?;
		socket.shutdown().await
	}

	fn transfer_request() -> CallRequest {
		CallRequest::new(Address::repeat_byte(0xaa), Bytes::from_static(&[0xa9, 0x05, 0x9c, 0xbb]))
			.from(Address::repeat_byte(0x01))
	}

	#[tokio::test]
	async fn failed_receipt_status_is_reported_as_revert() {
		let (url, receipt_polls) = spawn_node(1, "0x0").await;
		let provider = JsonRpcProvider::new(url.clone(), url)
			.expect("client")
			.with_receipt_poll_interval(Duration::from_millis(10));

		let err = provider
			.send_transaction(&transfer_request())
			.await
			.expect_err("status 0x0 is a revert");
		assert!(matches!(err, ProviderError::Reverted(_)));
		assert!(err.is_revert());
		assert!(receipt_polls.load(Ordering::SeqCst) >= 2);
	}

	#[tokio::test]
	async fn receipt_is_polled_until_mined() {
		let (url, receipt_polls) = spawn_node(3, "0x1").await;
		let provider = JsonRpcProvider::new(url.clone(), url)
			.expect("client")
			.with_receipt_poll_interval(Duration::from_millis(10));

		let receipt = provider
			.send_transaction(&transfer_request())
			.await
			.expect("mined receipt");
		assert!(receipt.succeeded());
		assert_eq!(receipt.block_number, Some(5));
		assert_eq!(receipt_polls.load(Ordering::SeqCst), 4);
	}
}
