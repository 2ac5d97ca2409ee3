//! Types shared by every provider implementation: network identity, logs,
//! call requests, receipts and the provider error taxonomy.

use alloy_primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;

/// Integer tag of the active network, as reported by `net_version`.
///
/// Deployment metadata is keyed by this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NetworkId(pub u64);

impl fmt::Display for NetworkId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Coarse classification of the network, derived from the chain id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
	Main,
	Goerli,
	Sepolia,
	/// Anything else, including local development chains.
	Private,
}

impl NetworkType {
	pub fn from_chain_id(chain_id: u64) -> Self {
		match chain_id {
			1 => NetworkType::Main,
			5 => NetworkType::Goerli,
			11_155_111 => NetworkType::Sepolia,
			_ => NetworkType::Private,
		}
	}
}

impl fmt::Display for NetworkType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			NetworkType::Main => "main",
			NetworkType::Goerli => "goerli",
			NetworkType::Sepolia => "sepolia",
			NetworkType::Private => "private",
		};
		f.write_str(name)
	}
}

/// Position of a log in the chain. Orders logs totally within one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogCursor {
	pub block_number: u64,
	pub log_index: u64,
}

impl LogCursor {
	/// Cursor placed after every log of `block_number`.
	pub fn end_of_block(block_number: u64) -> Self {
		Self {
			block_number,
			log_index: u64::MAX,
		}
	}
}

impl fmt::Display for LogCursor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.block_number, self.log_index)
	}
}

/// A contract event log as returned by `eth_getLogs` and `eth_subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
	pub address: Address,
	pub topics: Vec<B256>,
	pub data: Bytes,
	#[serde(default, with = "quantity::option")]
	pub block_number: Option<u64>,
	#[serde(default, with = "quantity::option")]
	pub log_index: Option<u64>,
	#[serde(default)]
	pub transaction_hash: Option<B256>,
	#[serde(default)]
	pub removed: bool,
}

impl Log {
	/// Chain position of the log. Pending logs have none.
	pub fn cursor(&self) -> Option<LogCursor> {
		Some(LogCursor {
			block_number: self.block_number?,
			log_index: self.log_index?,
		})
	}

	pub fn topic0(&self) -> Option<&B256> {
		self.topics.first()
	}
}

/// Log query for a single contract, matching any of `event_topics` in topic 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
	pub address: Address,
	pub event_topics: Vec<B256>,
	pub from_block: Option<u64>,
	pub to_block: Option<u64>,
}

impl LogFilter {
	pub fn new(address: Address, event_topics: Vec<B256>) -> Self {
		Self {
			address,
			event_topics,
			from_block: None,
			to_block: None,
		}
	}

	pub fn from_block(mut self, block: u64) -> Self {
		self.from_block = Some(block);
		self
	}

	pub fn to_block(mut self, block: u64) -> Self {
		self.to_block = Some(block);
		self
	}

	/// JSON-RPC filter object.
	pub fn to_json(&self) -> serde_json::Value {
		let mut filter = serde_json::json!({
			"address": self.address,
			"topics": [self.event_topics],
		});
		if let Some(from) = self.from_block {
			filter["fromBlock"] = serde_json::Value::String(quantity::encode(from));
		}
		if let Some(to) = self.to_block {
			filter["toBlock"] = serde_json::Value::String(quantity::encode(to));
		}
		filter
	}

	pub fn matches(&self, log: &Log) -> bool {
		if log.address != self.address {
			return false;
		}
		if !self.event_topics.is_empty()
			&& !log
				.topic0()
				.is_some_and(|topic| self.event_topics.contains(topic))
		{
			return false;
		}
		match log.block_number {
			Some(block) => {
				self.from_block.is_none_or(|from| block >= from)
					&& self.to_block.is_none_or(|to| block <= to)
			}
			None => self.from_block.is_none() && self.to_block.is_none(),
		}
	}
}

/// Payload of `eth_call` and `eth_sendTransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub from: Option<Address>,
	pub to: Address,
	pub data: Bytes,
}

impl CallRequest {
	pub fn new(to: Address, data: Bytes) -> Self {
		Self {
			from: None,
			to,
			data,
		}
	}

	pub fn from(mut self, from: Address) -> Self {
		self.from = Some(from);
		self
	}
}

/// Mined transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
	pub transaction_hash: B256,
	#[serde(default, with = "quantity::option")]
	pub block_number: Option<u64>,
	/// `1` for success, `0` for a reverted transaction.
	#[serde(default, with = "quantity::option")]
	pub status: Option<u64>,
	#[serde(default)]
	pub logs: Vec<Log>,
}

impl TxReceipt {
	pub fn succeeded(&self) -> bool {
		self.status != Some(0)
	}
}

/// Stream of live logs returned by a subscription.
pub type LogStream =
	Pin<Box<dyn futures_util::Stream<Item = Result<Log, ProviderError>> + Send>>;

/// Error types for provider operations
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
	#[error("HTTP error: {0}")]
	HttpError(#[from] reqwest::Error),

	#[error("WebSocket error: {0}")]
	WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

	#[error("JSON parse error: {0}")]
	JsonError(#[from] serde_json::Error),

	#[error("RPC error {code}: {message}")]
	Rpc { code: i64, message: String },

	#[error("Execution reverted: {0}")]
	Reverted(String),

	#[error("No data returned")]
	NoData,

	#[error("Subscription error: {0}")]
	SubscriptionError(String),

	#[error("Invalid response: {0}")]
	InvalidResponse(String),
}

impl ProviderError {
	/// Builds the error for a JSON-RPC error object. Ganache and geth report
	/// reverts as plain RPC errors whose message mentions `revert`.
	pub fn from_rpc(code: i64, message: String) -> Self {
		if message.contains("revert") {
			ProviderError::Reverted(message)
		} else {
			ProviderError::Rpc { code, message }
		}
	}

	pub fn is_revert(&self) -> bool {
		matches!(self, ProviderError::Reverted(_))
	}
}

/// Serde helpers for JSON-RPC hex quantities (`"0x1a"`).
pub mod quantity {
	pub fn encode(value: u64) -> String {
		format!("{:#x}", value)
	}

	pub fn decode(text: &str) -> Result<u64, String> {
		let digits = text
			.strip_prefix("0x")
			.ok_or_else(|| format!("quantity {text:?} is missing the 0x prefix"))?;
		if digits.is_empty() {
			return Err("empty quantity".to_string());
		}
		u64::from_str_radix(digits, 16).map_err(|e| format!("invalid quantity {text:?}: {e}"))
	}

	pub mod option {
		use serde::{Deserialize, Deserializer, Serializer};

		pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
			match value {
				Some(v) => serializer.serialize_str(&super::encode(*v)),
				None => serializer.serialize_none(),
			}
		}

		pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
			let text: Option<String> = Option::deserialize(deserializer)?;
			text.map(|t| super::decode(&t).map_err(serde::de::Error::custom))
				.transpose()
		}
	}
}
