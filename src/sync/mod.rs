//! Session and order-book synchronization
//!
//! This module brings a session from "nothing connected" to "live order book":
//!
//! - `bootstrap`: The ordered startup sequence. Connects the provider, resolves network and account, loads both contracts, then hands over to the subscriber.
//! - `events`: Decodes raw exchange logs into order records.
//! - `subscriber`: Loads the historical order snapshot and keeps the store current from live events, joining both at a log cursor so no event is lost or applied twice.
//! - `progress_tracker`: Tracks the applied cursor and per-kind event counts of a live subscription.
//! - `types`: Order records and the sync error type.

/// Ordered session bootstrap
pub mod bootstrap;
/// Exchange log decoding
pub mod events;
/// Tracks subscription progress and statistics
pub mod progress_tracker;
/// Snapshot loading and live event subscription
pub mod subscriber;
/// Order records and sync errors
pub mod types;

pub use bootstrap::{BootstrapError, Ready, Session, initialize};
pub use events::{OrderEventDecoder, OrderEventKind};
pub use progress_tracker::{SyncProgressTracker, SyncStats};
pub use subscriber::{
	LiveFeed, OrderSnapshot, Subscription, bootstrap_order_book, load_all_orders,
	subscribe_to_events,
};
pub use types::{OrderRecord, OrderSide, OrderStatus, SyncError};
