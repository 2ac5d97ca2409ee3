//! Exchange event decoding.
//!
//! Translates raw exchange logs into [`OrderRecord`]s. The three recognized
//! events share their leading fields:
//!
//! - `Order(id, user, tokenGet, amountGet, tokenGive, amountGive, timestamp)`
//! - `Cancel(id, user, tokenGet, amountGet, tokenGive, amountGive, timestamp)`
//! - `Trade(id, user, tokenGet, amountGet, tokenGive, amountGive, userFill, timestamp)`
//!
//! The deployment's interface must declare all three with matching
//! signatures, so a mismatched artifact is rejected up front.

use crate::contracts::ContractHandle;
use crate::contracts::abi::{Exchange, log_data};
use crate::provider::{Log, LogFilter};
use crate::sync::types::{OrderRecord, OrderStatus, SyncError};

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolEvent;
use chrono::{DateTime, Utc};

/// Kinds of exchange events the subscriber understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderEventKind {
	Created,
	Cancelled,
	Filled,
}

impl OrderEventKind {
	pub const ALL: [OrderEventKind; 3] = [
		OrderEventKind::Created,
		OrderEventKind::Cancelled,
		OrderEventKind::Filled,
	];

	pub fn event_name(&self) -> &'static str {
		match self {
			OrderEventKind::Created => "Order",
			OrderEventKind::Cancelled => "Cancel",
			OrderEventKind::Filled => "Trade",
		}
	}

	pub fn signature(&self) -> &'static str {
		match self {
			OrderEventKind::Created => Exchange::Order::SIGNATURE,
			OrderEventKind::Cancelled => Exchange::Cancel::SIGNATURE,
			OrderEventKind::Filled => Exchange::Trade::SIGNATURE,
		}
	}

	/// Topic 0 of the event.
	pub fn topic(&self) -> B256 {
		match self {
			OrderEventKind::Created => Exchange::Order::SIGNATURE_HASH,
			OrderEventKind::Cancelled => Exchange::Cancel::SIGNATURE_HASH,
			OrderEventKind::Filled => Exchange::Trade::SIGNATURE_HASH,
		}
	}

	pub fn status(&self) -> OrderStatus {
		match self {
			OrderEventKind::Created => OrderStatus::Open,
			OrderEventKind::Cancelled => OrderStatus::Cancelled,
			OrderEventKind::Filled => OrderStatus::Filled,
		}
	}
}

/// Decoder for the order events of one exchange deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEventDecoder {
	exchange: Address,
}

impl OrderEventDecoder {
	pub fn new(exchange: &ContractHandle) -> Result<Self, SyncError> {
		if let Some(kind) = OrderEventKind::ALL
			.into_iter()
			.find(|kind| !exchange.declares(kind.signature()))
		{
			return Err(SyncError::MissingEvent(kind.event_name()));
		}
		Ok(Self {
			exchange: exchange.address,
		})
	}

	/// Filter selecting every order event of the exchange.
	pub fn filter(&self) -> LogFilter {
		LogFilter::new(
			self.exchange,
			OrderEventKind::ALL.iter().map(OrderEventKind::topic).collect(),
		)
	}

	pub fn kind_of(&self, log: &Log) -> Option<OrderEventKind> {
		let topic = log.topic0()?;
		OrderEventKind::ALL.into_iter().find(|kind| kind.topic() == *topic)
	}

	/// Normalize a raw exchange log into an order record.
	pub fn decode(&self, log: &Log) -> Result<OrderRecord, SyncError> {
		let kind = self
			.kind_of(log)
			.ok_or_else(|| SyncError::UnexpectedEvent(log.topic0().copied().unwrap_or_default()))?;
		let cursor = log.cursor().ok_or_else(|| {
			SyncError::PendingLog(
				log.transaction_hash
					.map(|hash| hash.to_string())
					.unwrap_or_else(|| "unknown transaction".to_string()),
			)
		})?;

		let data = log_data(&log.topics, &log.data);
		let record = match kind {
			OrderEventKind::Created => {
				let e = Exchange::Order::decode_log_data(&data)?;
				OrderRecord {
					id: e.id,
					user: e.user,
					token_get: e.tokenGet,
					amount_get: e.amountGet,
					token_give: e.tokenGive,
					amount_give: e.amountGive,
					timestamp: timestamp(e.timestamp)?,
					status: kind.status(),
					filled_by: None,
					cursor,
				}
			}
			OrderEventKind::Cancelled => {
				let e = Exchange::Cancel::decode_log_data(&data)?;
				OrderRecord {
					id: e.id,
					user: e.user,
					token_get: e.tokenGet,
					amount_get: e.amountGet,
					token_give: e.tokenGive,
					amount_give: e.amountGive,
					timestamp: timestamp(e.timestamp)?,
					status: kind.status(),
					filled_by: None,
					cursor,
				}
			}
			OrderEventKind::Filled => {
				let e = Exchange::Trade::decode_log_data(&data)?;
				OrderRecord {
					id: e.id,
					user: e.user,
					token_get: e.tokenGet,
					amount_get: e.amountGet,
					token_give: e.tokenGive,
					amount_give: e.amountGive,
					timestamp: timestamp(e.timestamp)?,
					status: kind.status(),
					filled_by: Some(e.userFill),
					cursor,
				}
			}
		};
		Ok(record)
	}
}

fn timestamp(seconds: U256) -> Result<DateTime<Utc>, SyncError> {
	i64::try_from(seconds)
		.ok()
		.and_then(|secs| DateTime::from_timestamp(secs, 0))
		.ok_or(SyncError::TimestampError(seconds))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::contracts::{ContractKind, ContractLoader, DeploymentRegistry};
	use crate::provider::{LogCursor, NetworkId};
	use crate::testing::exchange_artifact;
	use alloy_primitives::{Bytes, LogData};

	fn exchange_handle() -> ContractHandle {
		let mut registry = DeploymentRegistry::new();
		registry.insert(
			ContractKind::Exchange,
			exchange_artifact().with_deployment(NetworkId(5777), Address::repeat_byte(0xee)),
		);
		ContractLoader::new(registry)
			.load_contract(NetworkId(5777), ContractKind::Exchange)
			.expect("exchange handle")
	}

	fn log(data: LogData) -> Log {
		Log {
			address: Address::repeat_byte(0xee),
			topics: data.topics().to_vec(),
			data: data.data,
			block_number: Some(9),
			log_index: Some(2),
			transaction_hash: None,
			removed: false,
		}
	}

	fn order(timestamp: u64) -> Exchange::Order {
		Exchange::Order {
			id: U256::from(1u8),
			user: Address::repeat_byte(0x01),
			tokenGet: Address::repeat_byte(0x02),
			amountGet: U256::from(100u8),
			tokenGive: Address::ZERO,
			amountGive: U256::from(1u8),
			timestamp: U256::from(timestamp),
		}
	}

	#[test]
	fn decodes_created_order() {
		let decoder = OrderEventDecoder::new(&exchange_handle()).expect("decoder");

		let record = decoder
			.decode(&log(order(1_600_000_000).encode_log_data()))
			.expect("record");
		assert_eq!(record.status, OrderStatus::Open);
		assert_eq!(record.user, Address::repeat_byte(0x01));
		assert_eq!(record.amount_get, U256::from(100u8));
		assert_eq!(record.timestamp.timestamp(), 1_600_000_000);
		assert_eq!(
			record.cursor,
			LogCursor {
				block_number: 9,
				log_index: 2
			}
		);
		assert_eq!(record.filled_by, None);
	}

	#[test]
	fn decodes_trade_with_taker() {
		let decoder = OrderEventDecoder::new(&exchange_handle()).expect("decoder");
		let trade = Exchange::Trade {
			id: U256::from(1u8),
			user: Address::repeat_byte(0x01),
			tokenGet: Address::repeat_byte(0x02),
			amountGet: U256::from(100u8),
			tokenGive: Address::ZERO,
			amountGive: U256::from(1u8),
			userFill: Address::repeat_byte(0x03),
			timestamp: U256::from(1_600_000_100u64),
		};

		let record = decoder.decode(&log(trade.encode_log_data())).expect("record");
		assert_eq!(record.status, OrderStatus::Filled);
		assert_eq!(record.filled_by, Some(Address::repeat_byte(0x03)));
		assert_eq!(record.timestamp.timestamp(), 1_600_000_100);
	}

	#[test]
	fn rejects_unknown_and_truncated_logs() {
		let decoder = OrderEventDecoder::new(&exchange_handle()).expect("decoder");

		let mut unknown = log(order(1).encode_log_data());
		unknown.topics[0] = B256::repeat_byte(0x42);
		assert!(decoder.kind_of(&unknown).is_none());
		assert!(matches!(decoder.decode(&unknown), Err(SyncError::UnexpectedEvent(_))));

		let mut truncated = log(order(1).encode_log_data());
		truncated.topics[0] = Exchange::Cancel::SIGNATURE_HASH;
		truncated.data = Bytes::copy_from_slice(&truncated.data[..6 * 32]);
		assert!(matches!(decoder.decode(&truncated), Err(SyncError::DecodeError(_))));
	}

	#[test]
	fn out_of_range_timestamp_is_rejected() {
		let decoder = OrderEventDecoder::new(&exchange_handle()).expect("decoder");
		let mut event = order(0);
		event.timestamp = U256::MAX;
		assert!(matches!(
			decoder.decode(&log(event.encode_log_data())),
			Err(SyncError::TimestampError(_))
		));
	}

	#[test]
	fn interface_without_order_events_is_rejected() {
		let mut handle = exchange_handle();
		handle.abi = std::sync::Arc::new(Vec::new());
		assert!(matches!(
			OrderEventDecoder::new(&handle),
			Err(SyncError::MissingEvent("Order"))
		));
	}
}
