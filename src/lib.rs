//! Front-end sync core for a token/exchange DEX.
//!
//! Connects to a blockchain provider, resolves the token and exchange
//! contracts for the active network, loads the historical order book and keeps
//! a [`store::Store`] current from live exchange events.

/// Command line and environment configuration
pub mod config;
/// Contract interfaces, deployment metadata and contract clients
pub mod contracts;
/// Blockchain provider abstraction and JSON-RPC client
pub mod provider;
/// Application state and derived views
pub mod store;
/// Session bootstrap and order-book synchronization
pub mod sync;
/// In-memory development chain
pub mod testing;
/// Token amount helpers
pub mod utils;
