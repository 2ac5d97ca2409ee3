//!
//! Utility module for the DEX client.
//!
//! Token amount helpers used by the contract clients, the tests and the binary.
/// Token amount conversion and display
pub mod index;

pub use index::{format_token_amount, parse_token_amount, tokens};
