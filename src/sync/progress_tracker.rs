//! Progress tracking for order-book synchronization.
//!
//! This module provides the `SyncProgressTracker`, which records the chain
//! position the order book has been applied up to and counts the events seen
//! per kind. The subscriber asks it whether a live log is new before applying
//! it, which is how logs already covered by the snapshot are dropped at the
//! snapshot/live seam.

use crate::provider::LogCursor;
use crate::sync::types::OrderStatus;
use tracing::{debug, info};

/// Service for tracking synchronization progress
#[derive(Debug, Clone)]
pub struct SyncProgressTracker {
	/// Position the snapshot covered
	snapshot_cursor: LogCursor,
	/// Highest position applied to the store
	highest_applied: LogCursor,
	/// Orders created
	orders_created: usize,
	/// Orders cancelled
	orders_cancelled: usize,
	/// Trades
	orders_filled: usize,
	/// Live logs dropped because the snapshot already held them
	duplicates_skipped: usize,
	/// Logs that could not be decoded
	undecodable: usize,
	/// Applied count at which progress was last logged
	last_logged: usize,
}

impl SyncProgressTracker {
	/// Create a tracker for a book whose snapshot covers everything up to `snapshot_cursor`.
	pub fn new(snapshot_cursor: LogCursor) -> Self {
		Self {
			snapshot_cursor,
			highest_applied: snapshot_cursor,
			orders_created: 0,
			orders_cancelled: 0,
			orders_filled: 0,
			duplicates_skipped: 0,
			undecodable: 0,
			last_logged: 0,
		}
	}

	/// Whether a log at `cursor` still has to be applied.
	pub fn is_new(&self, cursor: LogCursor) -> bool {
		cursor > self.highest_applied
	}

	/// Record an applied event
	pub fn record_applied(&mut self, cursor: LogCursor, status: OrderStatus) {
		self.highest_applied = self.highest_applied.max(cursor);
		match status {
			OrderStatus::Open => self.orders_created += 1,
			OrderStatus::Cancelled => self.orders_cancelled += 1,
			OrderStatus::Filled => self.orders_filled += 1,
		}
	}

	pub fn record_duplicate(&mut self, cursor: LogCursor) {
		debug!(%cursor, snapshot = %self.snapshot_cursor, "Skipping log already in snapshot");
		self.duplicates_skipped += 1;
	}

	pub fn record_undecodable(&mut self) {
		self.undecodable += 1;
	}

	fn applied(&self) -> usize {
		self.orders_created + self.orders_cancelled + self.orders_filled
	}

	/// Log progress every `every` applied events, or always when `force` is set.
	pub fn log_progress(&mut self, every: usize, force: bool) {
		let applied = self.applied();
		if force || applied >= self.last_logged + every.max(1) {
			info!("Order book progress: {}", self.get_stats().summary());
			self.last_logged = applied;
		}
	}

	/// Get sync statistics as a SyncStats struct
	pub fn get_stats(&self) -> SyncStats {
		SyncStats {
			snapshot_cursor: self.snapshot_cursor,
			highest_applied: self.highest_applied,
			orders_created: self.orders_created,
			orders_cancelled: self.orders_cancelled,
			orders_filled: self.orders_filled,
			duplicates_skipped: self.duplicates_skipped,
			undecodable: self.undecodable,
		}
	}
}

/// Statistics about the live subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStats {
	pub snapshot_cursor: LogCursor,
	pub highest_applied: LogCursor,
	pub orders_created: usize,
	pub orders_cancelled: usize,
	pub orders_filled: usize,
	pub duplicates_skipped: usize,
	pub undecodable: usize,
}

impl SyncStats {
	/// Get a human-readable summary of the sync statistics
	pub fn summary(&self) -> String {
		format!(
			"applied up to {}: {} created, {} cancelled, {} filled{}{}",
			self.highest_applied,
			self.orders_created,
			self.orders_cancelled,
			self.orders_filled,
			if self.duplicates_skipped == 0 {
				String::new()
			} else {
				format!(", {} duplicates skipped", self.duplicates_skipped)
			},
			if self.undecodable == 0 {
				String::new()
			} else {
				format!(", {} undecodable", self.undecodable)
			}
		)
	}
}
