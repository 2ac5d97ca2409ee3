//! Application state store.
//!
//! The store is constructed by the host and handed to every component that
//! needs it. State changes only through the action methods; readers use the
//! selector methods or watch the revision counter returned by
//! [`Store::subscribe`].

use crate::contracts::ContractHandle;
use crate::provider::NetworkInfo;
use crate::sync::{OrderRecord, OrderSide, OrderStatus};

use alloy_primitives::{Address, U256};
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Everything the view layer renders from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
	pub network: Option<NetworkInfo>,
	pub account: Option<Address>,
	pub token: Option<ContractHandle>,
	pub exchange: Option<ContractHandle>,
	/// Append-only order event log, in chain order.
	pub orders: Vec<OrderRecord>,
	pub orders_loaded: bool,
}

/// Open orders split by side relative to the loaded token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBook {
	pub buy: Vec<OrderRecord>,
	pub sell: Vec<OrderRecord>,
}

/// Shared handle to the application state.
#[derive(Debug, Clone)]
pub struct Store {
	state: Arc<RwLock<State>>,
	revision: Arc<watch::Sender<u64>>,
}

impl Default for Store {
	fn default() -> Self {
		Self::new()
	}
}

impl Store {
	pub fn new() -> Self {
		let (revision, _) = watch::channel(0);
		Self {
			state: Arc::new(RwLock::new(State::default())),
			revision: Arc::new(revision),
		}
	}

	/// Receiver that changes whenever an action modifies the state.
	pub fn subscribe(&self) -> watch::Receiver<u64> {
		self.revision.subscribe()
	}

	pub fn revision(&self) -> u64 {
		*self.revision.borrow()
	}

	fn read(&self) -> RwLockReadGuard<'_, State> {
		self.state.read().unwrap_or_else(PoisonError::into_inner)
	}

	fn write(&self) -> RwLockWriteGuard<'_, State> {
		self.state.write().unwrap_or_else(PoisonError::into_inner)
	}

	fn publish(&self, action: &'static str) {
		self.revision.send_modify(|revision| *revision += 1);
		debug!(action, revision = self.revision(), "Store updated");
	}

	fn update<R>(&self, action: &'static str, f: impl FnOnce(&mut State) -> R) -> R {
		let result = f(&mut self.write());
		self.publish(action);
		result
	}

	/// Runs `f` under the write lock and publishes a revision only if it
	/// reports a change.
	fn update_if(&self, action: &'static str, f: impl FnOnce(&mut State) -> bool) -> bool {
		let changed = f(&mut self.write());
		if changed {
			self.publish(action);
		}
		changed
	}

	// Actions

	pub fn connection_loaded(&self, network: NetworkInfo) {
		self.update("connection_loaded", |state| state.network = Some(network));
	}

	pub fn account_loaded(&self, account: Address) {
		self.update("account_loaded", |state| state.account = Some(account));
	}

	pub fn token_loaded(&self, token: ContractHandle) {
		self.update("token_loaded", |state| state.token = Some(token));
	}

	pub fn exchange_loaded(&self, exchange: ContractHandle) {
		self.update("exchange_loaded", |state| state.exchange = Some(exchange));
	}

	/// Replaces the order log with the bootstrap snapshot.
	pub fn orders_loaded(&self, orders: Vec<OrderRecord>) {
		self.update("orders_loaded", |state| {
			state.orders = orders;
			state.orders_loaded = true;
		});
	}

	/// Appends one live order event. Returns `false`, leaving the state
	/// untouched, if the snapshot is not loaded yet or the record is not
	/// strictly after the last applied one.
	pub fn order_event(&self, record: OrderRecord) -> bool {
		self.update_if("order_event", |state| {
			if !state.orders_loaded {
				warn!(id = %record.id, "Order event before snapshot, ignoring");
				return false;
			}
			if state.orders.last().is_some_and(|last| record.cursor <= last.cursor) {
				warn!(id = %record.id, cursor = %record.cursor, "Out-of-order order event, ignoring");
				return false;
			}
			state.orders.push(record);
			true
		})
	}

	// Selectors

	pub fn snapshot(&self) -> State {
		self.read().clone()
	}

	/// True only when both contract handles are present.
	pub fn contracts_loaded(&self) -> bool {
		let state = self.read();
		state.token.is_some() && state.exchange.is_some()
	}

	pub fn network(&self) -> Option<NetworkInfo> {
		self.read().network
	}

	pub fn account(&self) -> Option<Address> {
		self.read().account
	}

	pub fn token(&self) -> Option<ContractHandle> {
		self.read().token.clone()
	}

	pub fn exchange(&self) -> Option<ContractHandle> {
		self.read().exchange.clone()
	}

	pub fn orders_loaded_flag(&self) -> bool {
		self.read().orders_loaded
	}

	pub fn orders(&self) -> Vec<OrderRecord> {
		self.read().orders.clone()
	}

	fn with_status(&self, status: OrderStatus) -> Vec<OrderRecord> {
		self.read()
			.orders
			.iter()
			.filter(|record| record.status == status)
			.cloned()
			.collect()
	}

	pub fn filled_orders(&self) -> Vec<OrderRecord> {
		let mut trades = self.with_status(OrderStatus::Filled);
		trades.sort_by_key(|record| record.timestamp);
		trades
	}

	pub fn cancelled_orders(&self) -> Vec<OrderRecord> {
		self.with_status(OrderStatus::Cancelled)
	}

	/// Created orders that have neither been cancelled nor filled since.
	pub fn open_orders(&self) -> Vec<OrderRecord> {
		let state = self.read();
		let closed: HashSet<U256> = state
			.orders
			.iter()
			.filter(|record| record.status != OrderStatus::Open)
			.map(|record| record.id)
			.collect();
		state
			.orders
			.iter()
			.filter(|record| record.status == OrderStatus::Open && !closed.contains(&record.id))
			.cloned()
			.collect()
	}

	pub fn order_book(&self) -> OrderBook {
		let Some(token) = self.token() else {
			return OrderBook::default();
		};
		let (buy, sell) = self
			.open_orders()
			.into_iter()
			.partition(|record| record.side(token.address) == OrderSide::Buy);
		OrderBook { buy, sell }
	}

	pub fn my_open_orders(&self, account: Address) -> Vec<OrderRecord> {
		self.open_orders()
			.into_iter()
			.filter(|record| record.user == account)
			.collect()
	}

	pub fn my_filled_orders(&self, account: Address) -> Vec<OrderRecord> {
		self.filled_orders()
			.into_iter()
			.filter(|record| record.involves(account))
			.collect()
	}
}
