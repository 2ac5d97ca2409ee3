//! Order-book bootstrap and live event subscription.
//!
//! The initial book comes from a historical log query up to the current head.
//! Live logs come from a provider subscription that is opened *before* that
//! query, so nothing emitted during the fetch is lost. The live stream is not
//! polled until the snapshot has been written to the store; logs it queued
//! meanwhile that the snapshot already covers are dropped by cursor.

use crate::contracts::ContractHandle;
use crate::provider::{Connection, LogCursor, LogStream};
use crate::store::Store;
use crate::sync::events::OrderEventDecoder;
use crate::sync::progress_tracker::{SyncProgressTracker, SyncStats};
use crate::sync::types::{OrderRecord, SyncError};

use futures_util::StreamExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Applied events between two progress log lines.
const PROGRESS_LOG_EVERY: usize = 50;

/// Historical order events and the chain position they cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSnapshot {
	pub orders: Vec<OrderRecord>,
	pub cursor: LogCursor,
}

/// Fetch every order event of the exchange up to the current head.
pub async fn load_all_orders(
	provider: &Connection,
	exchange: &ContractHandle,
) -> Result<OrderSnapshot, SyncError> {
	let decoder = OrderEventDecoder::new(exchange)?;
	let head = provider.block_number().await?;
	let logs = provider
		.get_logs(&decoder.filter().from_block(0).to_block(head))
		.await?;

	let mut orders = Vec::with_capacity(logs.len());
	for log in logs.iter().filter(|log| !log.removed) {
		match decoder.decode(log) {
			Ok(record) => orders.push(record),
			Err(e) => warn!("Skipping undecodable order log in snapshot: {}", e),
		}
	}
	orders.sort_by_key(|record| record.cursor);

	info!(head, orders = orders.len(), "Loaded order book snapshot");
	Ok(OrderSnapshot {
		orders,
		cursor: LogCursor::end_of_block(head),
	})
}

/// An opened but not yet consumed live log stream.
pub struct LiveFeed {
	decoder: OrderEventDecoder,
	stream: LogStream,
}

impl LiveFeed {
	/// Open the provider subscription for the exchange's order events.
	pub async fn open(provider: &Connection, exchange: &ContractHandle) -> Result<Self, SyncError> {
		let decoder = OrderEventDecoder::new(exchange)?;
		let stream = provider.subscribe_logs(&decoder.filter()).await?;
		debug!(exchange = %exchange.address, "Opened order event stream");
		Ok(Self { decoder, stream })
	}

	/// Start applying live events to `store`, skipping anything at or before `after`.
	pub fn start(self, store: Store, after: LogCursor) -> Subscription {
		let (shutdown_tx, shutdown_rx) = oneshot::channel();
		let tracker = SyncProgressTracker::new(after);
		let task = tokio::spawn(pump(self.stream, self.decoder, store, tracker, shutdown_rx));
		Subscription {
			shutdown: Some(shutdown_tx),
			task: Some(task),
		}
	}
}

/// Handle to a running event subscription.
///
/// [`Subscription::unsubscribe`] stops the listener and waits for it to
/// finish. Dropping the handle also stops it.
pub struct Subscription {
	shutdown: Option<oneshot::Sender<()>>,
	task: Option<JoinHandle<SyncStats>>,
}

impl Subscription {
	pub fn is_active(&self) -> bool {
		self.task.as_ref().is_some_and(|task| !task.is_finished())
	}

	pub async fn unsubscribe(mut self) -> Result<SyncStats, SyncError> {
		if let Some(shutdown) = self.shutdown.take() {
			// The listener may already have ended on its own.
			let _ = shutdown.send(());
		}
		let task = self
			.task
			.take()
			.ok_or_else(|| SyncError::TaskError("subscription already released".to_string()))?;
		task.await.map_err(|e| SyncError::TaskError(e.to_string()))
	}
}

/// Open a live subscription and apply its events to `store` from `after` on.
pub async fn subscribe_to_events(
	provider: &Connection,
	exchange: &ContractHandle,
	store: &Store,
	after: LogCursor,
) -> Result<Subscription, SyncError> {
	let feed = LiveFeed::open(provider, exchange).await?;
	Ok(feed.start(store.clone(), after))
}

/// Load the snapshot into `store`, then keep it current from live events.
pub async fn bootstrap_order_book(
	provider: &Connection,
	exchange: &ContractHandle,
	store: &Store,
) -> Result<Subscription, SyncError> {
	let feed = LiveFeed::open(provider, exchange).await?;
	let snapshot = load_all_orders(provider, exchange).await?;
	let cursor = snapshot.cursor;
	store.orders_loaded(snapshot.orders);
	Ok(feed.start(store.clone(), cursor))
}

async fn pump(
	mut stream: LogStream,
	decoder: OrderEventDecoder,
	store: Store,
	mut tracker: SyncProgressTracker,
	mut shutdown: oneshot::Receiver<()>,
) -> SyncStats {
	info!("Listening for order events");

	loop {
		tokio::select! {
			biased;
			_ = &mut shutdown => {
				info!("Order event subscription released");
				break;
			}
			item = stream.next() => match item {
				Some(Ok(log)) => {
					if log.removed {
						warn!(tx = ?log.transaction_hash, "Ignoring log removed by reorg");
						continue;
					}
					let record = match decoder.decode(&log) {
						Ok(record) => record,
						Err(e) => {
							warn!("Skipping undecodable order log: {}", e);
							tracker.record_undecodable();
							continue;
						}
					};
					if !tracker.is_new(record.cursor) {
						tracker.record_duplicate(record.cursor);
						continue;
					}
					let (cursor, status) = (record.cursor, record.status);
					if store.order_event(record) {
						tracker.record_applied(cursor, status);
						tracker.log_progress(PROGRESS_LOG_EVERY, false);
					}
				}
				Some(Err(e)) => {
					error!("Error in order event subscription: {}", e);
					break;
				}
				None => {
					info!("Order event stream ended");
					break;
				}
			}
		}
	}

	tracker.log_progress(PROGRESS_LOG_EVERY, true);
	tracker.get_stats()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::contracts::abi::Exchange;
	use crate::provider::{
		CallRequest, Log, LogFilter, NetworkId, NetworkType, Provider, ProviderError, TxReceipt,
	};
	use crate::sync::OrderStatus;
	use crate::testing::DevChain;
	use crate::utils::tokens;
	use alloy_primitives::{Address, Bytes, U256};
	use alloy_sol_types::SolCall;
	use std::sync::Arc;
	use std::sync::atomic::{AtomicBool, Ordering};
	use std::time::Duration;

	/// When the racing order is placed relative to the snapshot read.
	#[derive(Clone, Copy, PartialEq, Eq)]
	enum Race {
		/// Before the head is read, so the snapshot and the stream both carry it.
		BeforeHead,
		/// After the head is read, so only the stream carries it.
		AfterHead,
	}

	/// Provider that places one order while the snapshot is being loaded.
	struct RacingChain {
		chain: Arc<DevChain>,
		race: Race,
		maker: Address,
		exchange: Address,
		token: Address,
		fired: AtomicBool,
	}

	impl RacingChain {
		async fn place_once(&self, race: Race) -> Result<(), ProviderError> {
			if self.race != race || self.fired.swap(true, Ordering::SeqCst) {
				return Ok(());
			}
			self.chain.send_transaction(&make_order(self.exchange, self.maker, self.token)).await?;
			Ok(())
		}
	}

	#[async_trait::async_trait]
	impl Provider for RacingChain {
		async fn network_type(&self) -> Result<NetworkType, ProviderError> {
			self.chain.network_type().await
		}

		async fn network_id(&self) -> Result<NetworkId, ProviderError> {
			self.chain.network_id().await
		}

		async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
			self.chain.accounts().await
		}

		async fn block_number(&self) -> Result<u64, ProviderError> {
			self.place_once(Race::BeforeHead).await?;
			self.chain.block_number().await
		}

		async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, ProviderError> {
			self.place_once(Race::AfterHead).await?;
			self.chain.get_logs(filter).await
		}

		async fn subscribe_logs(&self, filter: &LogFilter) -> Result<LogStream, ProviderError> {
			self.chain.subscribe_logs(filter).await
		}

		async fn call(&self, request: &CallRequest) -> Result<Bytes, ProviderError> {
			self.chain.call(request).await
		}

		async fn send_transaction(&self, request: &CallRequest) -> Result<TxReceipt, ProviderError> {
			self.chain.send_transaction(request).await
		}
	}

	fn make_order(exchange: Address, maker: Address, token: Address) -> CallRequest {
		let call = Exchange::makeOrderCall {
			tokenGet: token,
			amountGet: tokens(1),
			tokenGive: Address::ZERO,
			amountGive: tokens(1),
		};
		CallRequest::new(exchange, call.abi_encode().into()).from(maker)
	}

	struct Setup {
		chain: Arc<DevChain>,
		provider: Connection,
		handle: ContractHandle,
		maker: Address,
		exchange: Address,
		token: Address,
	}

	/// Chain with one order already placed, seen through a racing provider.
	async fn setup(race: Race) -> Setup {
		let chain = Arc::new(DevChain::new(5777, 2));
		let maker = chain.account_list()[0];
		let token = chain.deploy_token(maker, "DApp Token", "DAPP", tokens(1_000));
		let exchange = chain.deploy_exchange(chain.account_list()[1], 10);
		chain
			.send_transaction(&make_order(exchange, maker, token))
			.await
			.expect("first order");

		let handle = chain.handles(None, Some(exchange)).1.expect("exchange handle");
		let provider: Connection = Arc::new(RacingChain {
			chain: chain.clone(),
			race,
			maker,
			exchange,
			token,
			fired: AtomicBool::new(false),
		});
		Setup {
			chain,
			provider,
			handle,
			maker,
			exchange,
			token,
		}
	}

	async fn wait_for_orders(store: &Store, count: usize) {
		let mut changes = store.subscribe();
		tokio::time::timeout(Duration::from_secs(5), async {
			while store.orders().len() < count {
				changes.changed().await.expect("store alive");
			}
		})
		.await
		.expect("orders should arrive");
	}

	fn ids(store: &Store) -> Vec<U256> {
		store.orders().iter().map(|record| record.id).collect()
	}

	#[tokio::test]
	async fn snapshot_includes_existing_orders() {
		let s = setup(Race::AfterHead).await;
		let direct: Connection = s.chain.clone();
		let snapshot = load_all_orders(&direct, &s.handle).await.expect("snapshot");
		assert_eq!(snapshot.orders.len(), 1);
		assert_eq!(snapshot.orders[0].status, OrderStatus::Open);
		assert_eq!(
			snapshot.cursor,
			LogCursor::end_of_block(s.chain.block_number().await.unwrap())
		);
	}

	#[tokio::test]
	async fn event_during_snapshot_is_applied_after_it() {
		let s = setup(Race::AfterHead).await;
		let store = Store::new();
		let subscription = bootstrap_order_book(&s.provider, &s.handle, &store)
			.await
			.expect("bootstrap");

		wait_for_orders(&store, 2).await;
		assert_eq!(ids(&store), vec![U256::from(1u8), U256::from(2u8)]);

		let stats = subscription.unsubscribe().await.expect("unsubscribe");
		assert_eq!(stats.orders_created, 1);
		assert_eq!(stats.duplicates_skipped, 0);
	}

	#[tokio::test]
	async fn event_covered_by_snapshot_is_not_applied_twice() {
		let s = setup(Race::BeforeHead).await;
		let store = Store::new();
		let subscription = bootstrap_order_book(&s.provider, &s.handle, &store)
			.await
			.expect("bootstrap");
		assert_eq!(store.orders().len(), 2);

		// A later order proves the queued duplicate was consumed first.
		s.chain
			.send_transaction(&make_order(s.exchange, s.maker, s.token))
			.await
			.unwrap();
		wait_for_orders(&store, 3).await;
		assert_eq!(
			ids(&store),
			vec![U256::from(1u8), U256::from(2u8), U256::from(3u8)]
		);

		let stats = subscription.unsubscribe().await.expect("unsubscribe");
		assert_eq!(stats.duplicates_skipped, 1);
		assert_eq!(stats.orders_created, 1);
	}

	#[tokio::test]
	async fn status_changes_append_records() {
		let s = setup(Race::AfterHead).await;
		let store = Store::new();
		let subscription = bootstrap_order_book(&s.provider, &s.handle, &store)
			.await
			.expect("bootstrap");
		wait_for_orders(&store, 2).await;

		let exchange = s.chain.exchange_client(s.exchange);
		exchange.cancel_order(s.maker, U256::from(1u8)).await.unwrap();
		wait_for_orders(&store, 3).await;

		assert_eq!(store.cancelled_orders().len(), 1);
		let open: Vec<U256> = store.open_orders().iter().map(|record| record.id).collect();
		assert_eq!(open, vec![U256::from(2u8)]);

		let stats = subscription.unsubscribe().await.unwrap();
		assert_eq!(stats.orders_cancelled, 1);
	}

	#[tokio::test]
	async fn unsubscribe_stops_applying_events() {
		let s = setup(Race::AfterHead).await;
		let direct: Connection = s.chain.clone();
		let store = Store::new();
		let snapshot = load_all_orders(&direct, &s.handle).await.unwrap();
		let cursor = snapshot.cursor;
		store.orders_loaded(snapshot.orders);

		let subscription = subscribe_to_events(&direct, &s.handle, &store, cursor)
			.await
			.expect("subscribe");
		assert!(subscription.is_active());
		subscription.unsubscribe().await.expect("unsubscribe");

		let before = store.revision();
		s.chain
			.send_transaction(&make_order(s.exchange, s.maker, s.token))
			.await
			.unwrap();
		tokio::time::sleep(Duration::from_millis(50)).await;
		assert_eq!(store.revision(), before);
	}
}
