//! ERC-20 token contract client.
//!
//! Reads go through `eth_call`; writes are sent as transactions from the given
//! account and return the event the token emitted. A revert is reported as
//! `TransferRejected` or `ApprovalRejected` and always reaches the caller.

use crate::contracts::ContractHandle;
use crate::contracts::abi::{Token, log_data};
use crate::provider::{CallRequest, Connection, Log, ProviderError, TxReceipt};
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{SolCall, SolEvent, SolType, SolValue};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
	#[error("Transfer rejected: {0}")]
	TransferRejected(String),

	#[error("Approval rejected: {0}")]
	ApprovalRejected(String),

	#[error("Provider error: {0}")]
	Provider(#[from] ProviderError),

	#[error("Decode error: {0}")]
	Decode(#[from] alloy_sol_types::Error),

	#[error("Token reports {0} decimals")]
	InvalidDecimals(U256),

	#[error("Receipt has no {0} event")]
	MissingEvent(&'static str),
}

/// Decoded `Transfer(from, to, value)` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
	pub from: Address,
	pub to: Address,
	pub value: U256,
}

/// Decoded `Approval(owner, spender, value)` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalEvent {
	pub owner: Address,
	pub spender: Address,
	pub value: U256,
}

/// Client for the token contract behind `handle`.
#[derive(Clone)]
pub struct TokenContract {
	provider: Connection,
	handle: ContractHandle,
}

impl TokenContract {
	pub fn new(provider: Connection, handle: ContractHandle) -> Self {
		Self { provider, handle }
	}

	pub fn address(&self) -> Address {
		self.handle.address
	}

	/// Runs a read-only call and decodes its single return value.
	async fn call<C, R>(&self, call: C) -> Result<R, TokenError>
	where
		C: SolCall,
		R: SolValue + From<<R::SolType as SolType>::RustType>,
	{
		let request = CallRequest::new(self.handle.address, call.abi_encode().into());
		let output = self.provider.call(&request).await?;
		Ok(R::abi_decode(&output)?)
	}

	async fn send<C: SolCall>(&self, from: Address, call: C) -> Result<TxReceipt, ProviderError> {
		let request = CallRequest::new(self.handle.address, call.abi_encode().into()).from(from);
		let receipt = self.provider.send_transaction(&request).await?;
		debug!(hash = %receipt.transaction_hash, signature = C::SIGNATURE, "Token transaction mined");
		Ok(receipt)
	}

	pub async fn name(&self) -> Result<String, TokenError> {
		self.call(Token::nameCall {}).await
	}

	pub async fn symbol(&self) -> Result<String, TokenError> {
		self.call(Token::symbolCall {}).await
	}

	pub async fn decimals(&self) -> Result<u64, TokenError> {
		let decimals: U256 = self.call(Token::decimalsCall {}).await?;
		u64::try_from(decimals).map_err(|_| TokenError::InvalidDecimals(decimals))
	}

	pub async fn total_supply(&self) -> Result<U256, TokenError> {
		self.call(Token::totalSupplyCall {}).await
	}

	pub async fn balance_of(&self, owner: Address) -> Result<U256, TokenError> {
		self.call(Token::balanceOfCall { owner }).await
	}

	pub async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, TokenError> {
		self.call(Token::allowanceCall { owner, spender }).await
	}

	/// Moves `value` from `from` to `to`.
	pub async fn transfer(&self, from: Address, to: Address, value: U256) -> Result<TransferEvent, TokenError> {
		let receipt = self
			.send(from, Token::transferCall { to, value })
			.await
			.map_err(|e| rejected(e, TokenError::TransferRejected))?;
		let event = transfer_event(&receipt)?;
		info!(from = %event.from, to = %event.to, value = %event.value, "Token transfer");
		Ok(event)
	}

	/// Allows `spender` to move up to `value` of `owner`'s tokens.
	pub async fn approve(&self, owner: Address, spender: Address, value: U256) -> Result<ApprovalEvent, TokenError> {
		let receipt = self
			.send(owner, Token::approveCall { spender, value })
			.await
			.map_err(|e| rejected(e, TokenError::ApprovalRejected))?;

		let log = find_log(&receipt, Token::Approval::SIGNATURE_HASH).ok_or(TokenError::MissingEvent("Approval"))?;
		let approval = Token::Approval::decode_log_data(&log_data(&log.topics, &log.data))?;
		let event = ApprovalEvent {
			owner: approval.owner,
			spender: approval.spender,
			value: approval.value,
		};
		info!(owner = %event.owner, spender = %event.spender, value = %event.value, "Token approval");
		Ok(event)
	}

	/// Moves `value` from `from` to `to` on behalf of `spender`, consuming allowance.
	pub async fn transfer_from(
		&self,
		spender: Address,
		from: Address,
		to: Address,
		value: U256,
	) -> Result<TransferEvent, TokenError> {
		let receipt = self
			.send(spender, Token::transferFromCall { from, to, value })
			.await
			.map_err(|e| rejected(e, TokenError::TransferRejected))?;
		transfer_event(&receipt)
	}
}

fn transfer_event(receipt: &TxReceipt) -> Result<TransferEvent, TokenError> {
	let log = find_log(receipt, Token::Transfer::SIGNATURE_HASH).ok_or(TokenError::MissingEvent("Transfer"))?;
	let transfer = Token::Transfer::decode_log_data(&log_data(&log.topics, &log.data))?;
	Ok(TransferEvent {
		from: transfer.from,
		to: transfer.to,
		value: transfer.value,
	})
}

fn find_log(receipt: &TxReceipt, topic: B256) -> Option<&Log> {
	receipt.logs.iter().find(|log| log.topic0() == Some(&topic))
}

fn rejected(err: ProviderError, wrap: fn(String) -> TokenError) -> TokenError {
	match err {
		ProviderError::Reverted(reason) => {
			warn!("Token transaction reverted: {}", reason);
			wrap(reason)
		}
		other => TokenError::Provider(other),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::DevChain;
	use crate::utils::tokens;
	use std::sync::Arc;

	struct Fixture {
		token: TokenContract,
		deployer: Address,
		recipient: Address,
		exchange: Address,
	}

	fn fixture() -> Fixture {
		let chain = Arc::new(DevChain::new(5777, 3));
		let accounts = chain.account_list();
		let (deployer, recipient, exchange) = (accounts[0], accounts[1], accounts[2]);
		let deployment = chain.deploy_token(deployer, "DApp Token", "DAPP", tokens(1_000_000));
		let handle = chain.handles(Some(deployment), None).0.expect("token handle");
		Fixture {
			token: TokenContract::new(chain, handle),
			deployer,
			recipient,
			exchange,
		}
	}

	#[tokio::test]
	async fn tracks_deployment_metadata() {
		let f = fixture();
		assert_eq!(f.token.name().await.unwrap(), "DApp Token");
		assert_eq!(f.token.symbol().await.unwrap(), "DAPP");
		assert_eq!(f.token.decimals().await.unwrap(), 18);
		assert_eq!(f.token.total_supply().await.unwrap(), tokens(1_000_000));
		assert_eq!(f.token.balance_of(f.deployer).await.unwrap(), tokens(1_000_000));
	}

	#[tokio::test]
	async fn transfer_moves_balances_and_emits_event() {
		let f = fixture();
		let event = f
			.token
			.transfer(f.deployer, f.recipient, tokens(100))
			.await
			.expect("transfer should succeed");

		assert_eq!(f.token.balance_of(f.deployer).await.unwrap(), tokens(999_900));
		assert_eq!(f.token.balance_of(f.recipient).await.unwrap(), tokens(100));
		assert_eq!(
			event,
			TransferEvent {
				from: f.deployer,
				to: f.recipient,
				value: U256::from(100u64) * U256::from(10u64).pow(U256::from(18u64)),
			}
		);
	}

	#[tokio::test]
	async fn transfer_emits_exactly_one_log() {
		let f = fixture();
		let call = Token::transferCall {
			to: f.recipient,
			value: tokens(100),
		};
		let request = CallRequest::new(f.token.address(), call.abi_encode().into()).from(f.deployer);
		let receipt = f.token.provider.send_transaction(&request).await.unwrap();
		assert_eq!(receipt.logs.len(), 1);
	}

	#[tokio::test]
	async fn rejects_insufficient_balances() {
		let f = fixture();

		let err = f
			.token
			.transfer(f.deployer, f.recipient, tokens(100_000_000))
			.await
			.expect_err("more than total supply");
		assert!(matches!(err, TokenError::TransferRejected(_)));

		let err = f
			.token
			.transfer(f.recipient, f.deployer, tokens(10))
			.await
			.expect_err("recipient holds nothing");
		assert!(matches!(err, TokenError::TransferRejected(_)));

		assert_eq!(f.token.balance_of(f.deployer).await.unwrap(), tokens(1_000_000));
		assert_eq!(f.token.balance_of(f.recipient).await.unwrap(), U256::ZERO);
	}

	#[tokio::test]
	async fn rejects_invalid_recipients() {
		let f = fixture();
		let err = f
			.token
			.transfer(f.deployer, Address::ZERO, tokens(100))
			.await
			.expect_err("zero address");
		assert!(matches!(err, TokenError::TransferRejected(_)));
	}

	#[tokio::test]
	async fn approve_allocates_allowance() {
		let f = fixture();
		let event = f
			.token
			.approve(f.deployer, f.exchange, tokens(100))
			.await
			.expect("approve should succeed");

		assert_eq!(f.token.allowance(f.deployer, f.exchange).await.unwrap(), tokens(100));
		assert_eq!(event.owner, f.deployer);
		assert_eq!(event.spender, f.exchange);
		assert_eq!(event.value, tokens(100));
	}

	#[tokio::test]
	async fn rejects_invalid_spenders() {
		let f = fixture();
		let err = f
			.token
			.approve(f.deployer, Address::ZERO, tokens(100))
			.await
			.expect_err("zero spender");
		assert!(matches!(err, TokenError::ApprovalRejected(_)));
	}

	#[tokio::test]
	async fn delegated_transfer_resets_allowance() {
		let f = fixture();
		f.token.approve(f.deployer, f.exchange, tokens(100)).await.unwrap();

		let event = f
			.token
			.transfer_from(f.exchange, f.deployer, f.recipient, tokens(100))
			.await
			.expect("transferFrom should succeed");

		assert_eq!(f.token.balance_of(f.deployer).await.unwrap(), tokens(999_900));
		assert_eq!(f.token.balance_of(f.recipient).await.unwrap(), tokens(100));
		assert_eq!(f.token.allowance(f.deployer, f.exchange).await.unwrap(), U256::ZERO);
		assert_eq!(event.from, f.deployer);
		assert_eq!(event.to, f.recipient);
		assert_eq!(event.value, tokens(100));
	}

	#[tokio::test]
	async fn delegated_transfer_rejects_excess_amounts() {
		let f = fixture();
		f.token.approve(f.deployer, f.exchange, tokens(100)).await.unwrap();

		let err = f
			.token
			.transfer_from(f.exchange, f.deployer, f.recipient, tokens(10_000_000))
			.await
			.expect_err("over balance and allowance");
		assert!(matches!(err, TokenError::TransferRejected(_)));

		let err = f
			.token
			.transfer_from(f.exchange, f.deployer, Address::ZERO, tokens(100))
			.await
			.expect_err("zero recipient");
		assert!(matches!(err, TokenError::TransferRejected(_)));

		assert_eq!(f.token.allowance(f.deployer, f.exchange).await.unwrap(), tokens(100));
	}
}
