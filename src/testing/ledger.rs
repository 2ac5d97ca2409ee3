//! Contract state machines of the development chain.
//!
//! Each contract checks its preconditions before touching state, so a
//! reverted transaction leaves balances, allowances and orders unchanged.

use crate::contracts::TOKEN_DECIMALS;
use crate::contracts::abi::{Exchange, Token};
use crate::provider::ProviderError;
use crate::sync::OrderStatus;

use alloy_primitives::{Address, LogData, U256};
use alloy_sol_types::{SolEvent, SolInterface, SolValue};
use std::collections::HashMap;

/// Message nodes return for a failed `require`.
pub const REVERT_MESSAGE: &str = "VM Exception while processing transaction: revert";

pub enum Contract {
	Token(TokenState),
	Exchange(ExchangeState),
}

impl Contract {
	pub fn call(&self, data: &[u8]) -> Result<Vec<u8>, ProviderError> {
		match self {
			Contract::Token(token) => token.call(Token::TokenCalls::abi_decode(data).map_err(bad_input)?),
			Contract::Exchange(exchange) => exchange.call(Exchange::ExchangeCalls::abi_decode(data).map_err(bad_input)?),
		}
	}

	/// Runs a transaction, returning the logs it emits.
	pub fn execute(&mut self, sender: Address, data: &[u8], now: u64) -> Result<Vec<LogData>, ProviderError> {
		match self {
			Contract::Token(token) => token.execute(sender, Token::TokenCalls::abi_decode(data).map_err(bad_input)?),
			Contract::Exchange(exchange) => {
				exchange.execute(sender, Exchange::ExchangeCalls::abi_decode(data).map_err(bad_input)?, now)
			}
		}
	}
}

fn revert() -> ProviderError {
	ProviderError::Reverted(REVERT_MESSAGE.to_string())
}

fn require(condition: bool) -> Result<(), ProviderError> {
	if condition { Ok(()) } else { Err(revert()) }
}

fn bad_input(err: alloy_sol_types::Error) -> ProviderError {
	ProviderError::Reverted(format!("{REVERT_MESSAGE} ({err})"))
}

fn read_only() -> ProviderError {
	ProviderError::Reverted(format!("{REVERT_MESSAGE} (view functions take no transactions)"))
}

fn not_a_view(name: &str) -> ProviderError {
	ProviderError::Reverted(format!("{REVERT_MESSAGE} ({name} modifies state)"))
}

pub struct TokenState {
	name: String,
	symbol: String,
	total_supply: U256,
	balances: HashMap<Address, U256>,
	allowances: HashMap<(Address, Address), U256>,
}

impl TokenState {
	pub fn new(deployer: Address, name: &str, symbol: &str, total_supply: U256) -> Self {
		Self {
			name: name.to_string(),
			symbol: symbol.to_string(),
			total_supply,
			balances: HashMap::from([(deployer, total_supply)]),
			allowances: HashMap::new(),
		}
	}

	fn balance(&self, owner: Address) -> U256 {
		self.balances.get(&owner).copied().unwrap_or_default()
	}

	fn allowance(&self, owner: Address, spender: Address) -> U256 {
		self.allowances.get(&(owner, spender)).copied().unwrap_or_default()
	}

	fn call(&self, call: Token::TokenCalls) -> Result<Vec<u8>, ProviderError> {
		use Token::TokenCalls;
		Ok(match call {
			TokenCalls::name(_) => self.name.abi_encode(),
			TokenCalls::symbol(_) => self.symbol.abi_encode(),
			TokenCalls::decimals(_) => U256::from(TOKEN_DECIMALS).abi_encode(),
			TokenCalls::totalSupply(_) => self.total_supply.abi_encode(),
			TokenCalls::balanceOf(call) => self.balance(call.owner).abi_encode(),
			TokenCalls::allowance(call) => self.allowance(call.owner, call.spender).abi_encode(),
			TokenCalls::transfer(_) => return Err(not_a_view("transfer")),
			TokenCalls::approve(_) => return Err(not_a_view("approve")),
			TokenCalls::transferFrom(_) => return Err(not_a_view("transferFrom")),
		})
	}

	fn execute(&mut self, sender: Address, call: Token::TokenCalls) -> Result<Vec<LogData>, ProviderError> {
		use Token::TokenCalls;
		match call {
			TokenCalls::transfer(call) => {
				require(call.to != Address::ZERO)?;
				require(self.balance(sender) >= call.value)?;
				Ok(vec![self.move_balance(sender, call.to, call.value)])
			}
			TokenCalls::approve(call) => {
				require(call.spender != Address::ZERO)?;
				self.allowances.insert((sender, call.spender), call.value);
				let event = Token::Approval {
					owner: sender,
					spender: call.spender,
					value: call.value,
				};
				Ok(vec![event.encode_log_data()])
			}
			TokenCalls::transferFrom(call) => {
				let allowance = self.allowance(call.from, sender);
				require(call.to != Address::ZERO)?;
				require(call.value <= self.balance(call.from))?;
				require(call.value <= allowance)?;
				self.allowances.insert((call.from, sender), allowance - call.value);
				Ok(vec![self.move_balance(call.from, call.to, call.value)])
			}
			_ => Err(read_only()),
		}
	}

	fn move_balance(&mut self, from: Address, to: Address, value: U256) -> LogData {
		let from_balance = self.balance(from);
		self.balances.insert(from, from_balance - value);
		let to_balance = self.balance(to);
		self.balances.insert(to, to_balance + value);
		Token::Transfer { from, to, value }.encode_log_data()
	}
}

struct DevOrder {
	user: Address,
	token_get: Address,
	amount_get: U256,
	token_give: Address,
	amount_give: U256,
	status: OrderStatus,
}

pub struct ExchangeState {
	fee_account: Address,
	fee_percent: U256,
	order_count: U256,
	orders: HashMap<U256, DevOrder>,
}

impl ExchangeState {
	pub fn new(fee_account: Address, fee_percent: u64) -> Self {
		Self {
			fee_account,
			fee_percent: U256::from(fee_percent),
			order_count: U256::ZERO,
			orders: HashMap::new(),
		}
	}

	fn call(&self, call: Exchange::ExchangeCalls) -> Result<Vec<u8>, ProviderError> {
		use Exchange::ExchangeCalls;
		Ok(match call {
			ExchangeCalls::feeAccount(_) => self.fee_account.abi_encode(),
			ExchangeCalls::feePercent(_) => self.fee_percent.abi_encode(),
			ExchangeCalls::orderCount(_) => self.order_count.abi_encode(),
			ExchangeCalls::makeOrder(_) => return Err(not_a_view("makeOrder")),
			ExchangeCalls::cancelOrder(_) => return Err(not_a_view("cancelOrder")),
			ExchangeCalls::fillOrder(_) => return Err(not_a_view("fillOrder")),
		})
	}

	fn execute(&mut self, sender: Address, call: Exchange::ExchangeCalls, now: u64) -> Result<Vec<LogData>, ProviderError> {
		use Exchange::ExchangeCalls;
		let now = U256::from(now);
		match call {
			ExchangeCalls::makeOrder(call) => {
				let order = DevOrder {
					user: sender,
					token_get: call.tokenGet,
					amount_get: call.amountGet,
					token_give: call.tokenGive,
					amount_give: call.amountGive,
					status: OrderStatus::Open,
				};
				self.order_count += U256::from(1u8);
				let id = self.order_count;
				let event = Exchange::Order {
					id,
					user: order.user,
					tokenGet: order.token_get,
					amountGet: order.amount_get,
					tokenGive: order.token_give,
					amountGive: order.amount_give,
					timestamp: now,
				};
				self.orders.insert(id, order);
				Ok(vec![event.encode_log_data()])
			}
			ExchangeCalls::cancelOrder(call) => {
				let order = self.orders.get_mut(&call.id).ok_or_else(revert)?;
				require(order.user == sender)?;
				require(order.status == OrderStatus::Open)?;
				order.status = OrderStatus::Cancelled;
				let event = Exchange::Cancel {
					id: call.id,
					user: order.user,
					tokenGet: order.token_get,
					amountGet: order.amount_get,
					tokenGive: order.token_give,
					amountGive: order.amount_give,
					timestamp: now,
				};
				Ok(vec![event.encode_log_data()])
			}
			ExchangeCalls::fillOrder(call) => {
				let order = self.orders.get_mut(&call.id).ok_or_else(revert)?;
				require(order.status == OrderStatus::Open)?;
				order.status = OrderStatus::Filled;
				let event = Exchange::Trade {
					id: call.id,
					user: order.user,
					tokenGet: order.token_get,
					amountGet: order.amount_get,
					tokenGive: order.token_give,
					amountGive: order.amount_give,
					userFill: sender,
					timestamp: now,
				};
				Ok(vec![event.encode_log_data()])
			}
			_ => Err(read_only()),
		}
	}
}
