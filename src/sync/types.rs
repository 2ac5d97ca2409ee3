use crate::provider::{LogCursor, ProviderError};

use alloy_primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state carried by an order record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
	Open,
	Cancelled,
	Filled,
}

/// One order-lifecycle event of the exchange, normalized.
///
/// Records are only ever appended. A cancellation or fill is a new record for
/// the same `id` with the new status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
	pub id: U256,
	/// Order maker.
	pub user: Address,
	pub token_get: Address,
	pub amount_get: U256,
	pub token_give: Address,
	pub amount_give: U256,
	pub timestamp: DateTime<Utc>,
	pub status: OrderStatus,
	/// Taker of a filled order.
	pub filled_by: Option<Address>,
	/// Chain position of the originating event.
	pub cursor: LogCursor,
}

/// Which side of the book an order is on, relative to a traded token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
	/// The maker receives the token.
	Buy,
	/// The maker gives away the token.
	Sell,
}

impl OrderRecord {
	pub fn side(&self, token: Address) -> OrderSide {
		if self.token_get == token {
			OrderSide::Buy
		} else {
			OrderSide::Sell
		}
	}

	pub fn involves(&self, account: Address) -> bool {
		self.user == account || self.filled_by == Some(account)
	}
}

/// Error types for order-book synchronization
#[allow(clippy::enum_variant_names)]
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	#[error("Provider error: {0}")]
	ProviderError(#[from] ProviderError),

	#[error("Exchange interface has no {0} event")]
	MissingEvent(&'static str),

	#[error("Log decode error: {0}")]
	DecodeError(#[from] alloy_sol_types::Error),

	#[error("Unexpected event topic {0}")]
	UnexpectedEvent(B256),

	#[error("Log at {0} is not part of the canonical chain")]
	PendingLog(String),

	#[error("Timestamp {0} is out of range")]
	TimestampError(U256),

	#[error("Subscription task failed: {0}")]
	TaskError(String),
}
