//! Command line and environment configuration.

use crate::provider::ProviderSource;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Order-book sync client for a token/exchange contract pair
#[derive(Parser, Debug, Clone)]
#[command(name = "dex-sync")]
#[command(version, about, long_about = None)]
pub struct Config {
	/// JSON-RPC HTTP endpoint of the node (e.g. http://127.0.0.1:7545)
	#[arg(long, env = "DEX_RPC_URL")]
	pub rpc_url: Option<String>,

	/// WebSocket endpoint for log subscriptions; derived from the RPC URL when omitted
	#[arg(long, env = "DEX_WS_URL")]
	pub ws_url: Option<String>,

	/// Directory holding the Token.json and Exchange.json build artifacts
	#[arg(long, env = "DEX_ABIS_DIR", default_value = "abis")]
	pub abis_dir: PathBuf,

	/// Interval between transaction receipt polls, in milliseconds
	#[arg(long, default_value_t = 500)]
	pub receipt_poll_ms: u64,

	/// Run against an in-memory development chain with demo orders
	#[arg(long, default_value = "false")]
	pub dev: bool,
}

impl Config {
	/// Provider source for a node-backed session.
	pub fn provider_source(&self) -> ProviderSource {
		ProviderSource::JsonRpc {
			rpc_url: self.rpc_url.clone(),
			ws_url: self.ws_url.clone(),
			receipt_poll_interval: Duration::from_millis(self.receipt_poll_ms),
		}
	}
}
