//! Exchange contract client.
//!
//! Order placement, cancellation and filling are sent as transactions; the
//! resulting order event is decoded from the receipt into the same record the
//! subscriber produces from live logs.

use crate::contracts::ContractHandle;
use crate::contracts::abi::Exchange;
use crate::provider::{CallRequest, Connection, ProviderError, TxReceipt};
use crate::sync::{OrderEventDecoder, OrderRecord, SyncError};
use alloy_primitives::{Address, U256};
use alloy_sol_types::{SolCall, SolValue};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
	#[error("Exchange rejected {call}: {reason}")]
	Rejected { call: &'static str, reason: String },

	#[error("Provider error: {0}")]
	Provider(#[from] ProviderError),

	#[error("Decode error: {0}")]
	Decode(#[from] alloy_sol_types::Error),

	#[error("Event error: {0}")]
	Event(#[from] SyncError),

	#[error("Receipt for {0} carries no order event")]
	MissingEvent(&'static str),
}

/// Client for the exchange contract behind `handle`.
#[derive(Clone)]
pub struct ExchangeContract {
	provider: Connection,
	handle: ContractHandle,
	decoder: OrderEventDecoder,
}

impl ExchangeContract {
	pub fn new(provider: Connection, handle: ContractHandle) -> Result<Self, ExchangeError> {
		let decoder = OrderEventDecoder::new(&handle)?;
		Ok(Self {
			provider,
			handle,
			decoder,
		})
	}

	pub fn address(&self) -> Address {
		self.handle.address
	}

	pub async fn fee_account(&self) -> Result<Address, ExchangeError> {
		let call = Exchange::feeAccountCall {};
		let output = self
			.provider
			.call(&CallRequest::new(self.handle.address, call.abi_encode().into()))
			.await?;
		Ok(Address::abi_decode(&output)?)
	}

	pub async fn order_count(&self) -> Result<U256, ExchangeError> {
		let call = Exchange::orderCountCall {};
		let output = self
			.provider
			.call(&CallRequest::new(self.handle.address, call.abi_encode().into()))
			.await?;
		Ok(U256::abi_decode(&output)?)
	}

	async fn send<C: SolCall>(&self, from: Address, call: &'static str, data: C) -> Result<OrderRecord, ExchangeError> {
		let request = CallRequest::new(self.handle.address, data.abi_encode().into()).from(from);
		let receipt = self
			.provider
			.send_transaction(&request)
			.await
			.map_err(|e| match e {
				ProviderError::Reverted(reason) => {
					warn!(call, %reason, "Exchange transaction reverted");
					ExchangeError::Rejected { call, reason }
				}
				other => ExchangeError::Provider(other),
			})?;
		self.order_event(call, &receipt)
	}

	fn order_event(&self, call: &'static str, receipt: &TxReceipt) -> Result<OrderRecord, ExchangeError> {
		let log = receipt
			.logs
			.iter()
			.find(|log| self.decoder.kind_of(log).is_some())
			.ok_or(ExchangeError::MissingEvent(call))?;
		let record = self.decoder.decode(log)?;
		info!(call, id = %record.id, status = ?record.status, "Exchange order event");
		Ok(record)
	}

	/// Offers `amount_give` of `token_give` in exchange for `amount_get` of `token_get`.
	pub async fn make_order(
		&self,
		from: Address,
		token_get: Address,
		amount_get: U256,
		token_give: Address,
		amount_give: U256,
	) -> Result<OrderRecord, ExchangeError> {
		let call = Exchange::makeOrderCall {
			tokenGet: token_get,
			amountGet: amount_get,
			tokenGive: token_give,
			amountGive: amount_give,
		};
		self.send(from, "makeOrder", call).await
	}

	pub async fn cancel_order(&self, from: Address, id: U256) -> Result<OrderRecord, ExchangeError> {
		self.send(from, "cancelOrder", Exchange::cancelOrderCall { id }).await
	}

	pub async fn fill_order(&self, from: Address, id: U256) -> Result<OrderRecord, ExchangeError> {
		self.send(from, "fillOrder", Exchange::fillOrderCall { id }).await
	}
}
