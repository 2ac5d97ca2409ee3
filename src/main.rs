use clap::Parser;
use dex_sync::config::Config;
use dex_sync::contracts::{ContractLoader, DeploymentRegistry, TOKEN_DECIMALS};
use dex_sync::provider::ProviderGateway;
use dex_sync::store::Store;
use dex_sync::sync::{Ready, Session, initialize};
use dex_sync::testing::DevChain;
use dex_sync::utils::{format_token_amount, tokens};

use alloy_primitives::{Address, U256};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	let config = Config::parse();
	info!("Starting dex-sync v{}", env!("CARGO_PKG_VERSION"));

	let (session, dev_chain) = if config.dev {
		let (session, chain) = dev_session().await;
		(session, Some(chain))
	} else {
		let registry = match DeploymentRegistry::from_dir(&config.abis_dir) {
			Ok(registry) => registry,
			Err(e) => {
				error!("Failed to load deployment metadata: {}", e);
				std::process::exit(1);
			}
		};
		let session = Session::new(
			ProviderGateway::new(config.provider_source()),
			ContractLoader::new(registry),
			Store::new(),
		);
		(session, None)
	};

	let ready = match initialize(session).await {
		Ok(ready) => ready,
		Err(e) => {
			error!("{}", e);
			std::process::exit(1);
		}
	};

	report(&ready).await;

	if dev_chain.is_some() {
		// Show one order travelling through the live subscription.
		match ready.exchange_contract() {
			Ok(exchange) => {
				if let Err(e) = exchange
					.make_order(ready.account, ready.token.address, tokens(5), Address::ZERO, tokens(1))
					.await
				{
					warn!("Demo order failed: {}", e);
				}
			}
			Err(e) => warn!("Exchange client unavailable: {}", e),
		}
	}

	info!("Listening for order events, press Ctrl-C to exit");
	let mut changes = ready.store.subscribe();
	loop {
		tokio::select! {
			_ = tokio::signal::ctrl_c() => break,
			changed = changes.changed() => {
				if changed.is_err() {
					break;
				}
				let book = ready.store.order_book();
				info!(buy = book.buy.len(), sell = book.sell.len(), "Order book updated");
			}
		}
	}

	if let Err(e) = ready.shutdown().await {
		error!("Failed to release subscription: {}", e);
		std::process::exit(1);
	}
}

async fn report(ready: &Ready) {
	let token = ready.token_contract();
	match (token.symbol().await, token.balance_of(ready.account).await) {
		(Ok(symbol), Ok(balance)) => info!(
			"Account {} holds {} {}",
			ready.account,
			format_token_amount(balance, TOKEN_DECIMALS),
			symbol
		),
		(Err(e), _) | (_, Err(e)) => warn!("Could not read token balance: {}", e),
	}

	let book = ready.store.order_book();
	info!(
		network_id = %ready.network.id,
		network_type = %ready.network.kind,
		buy = book.buy.len(),
		sell = book.sell.len(),
		trades = ready.store.filled_orders().len(),
		"Order book loaded"
	);
	for order in book.buy.iter().chain(&book.sell) {
		let side = order.side(ready.token.address);
		let (amount, price) = order_terms(order.token_get == ready.token.address, order.amount_get, order.amount_give);
		info!(
			id = %order.id,
			?side,
			"{} tokens at {} ETH",
			format_token_amount(amount, TOKEN_DECIMALS),
			price
		);
	}
}

/// Token amount and ether-per-token price of an order.
fn order_terms(buys_token: bool, amount_get: U256, amount_give: U256) -> (U256, String) {
	let (token_amount, ether_amount) = if buys_token {
		(amount_get, amount_give)
	} else {
		(amount_give, amount_get)
	};
	if token_amount.is_zero() {
		return (token_amount, "-".to_string());
	}
	// Price with 5 decimal places.
	let scale = U256::from(100_000u64);
	let price = ether_amount * scale / token_amount;
	(token_amount, format_token_amount(price, 5))
}

/// In-memory chain with both contracts deployed and a few demo orders.
async fn dev_session() -> (Session, Arc<DevChain>) {
	let chain = Arc::new(DevChain::new(5777, 3));
	let accounts = chain.account_list();
	let token = chain.deploy_token(accounts[0], "DApp Token", "DAPP", tokens(1_000_000));
	let exchange = chain.deploy_exchange(accounts[2], 10);

	let client = chain.exchange_client(exchange);
	let demo = [
		(accounts[0], token, tokens(10), Address::ZERO, tokens(1)),
		(accounts[1], Address::ZERO, tokens(2), token, tokens(20)),
		(accounts[0], token, tokens(4), Address::ZERO, tokens(1)),
	];
	for (maker, token_get, amount_get, token_give, amount_give) in demo {
		if let Err(e) = client
			.make_order(maker, token_get, amount_get, token_give, amount_give)
			.await
		{
			warn!("Demo order failed: {}", e);
		}
	}
	if let Err(e) = client.fill_order(accounts[1], U256::from(1u8)).await {
		warn!("Demo fill failed: {}", e);
	}

	let session = Session::new(
		ProviderGateway::injected(chain.clone()),
		ContractLoader::new(chain.registry(Some(token), Some(exchange))),
		Store::new(),
	);
	(session, chain)
}
