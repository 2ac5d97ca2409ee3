//! Contract interfaces.
//!
//! Call encoding and event decoding come from the `sol!` declarations of the
//! token and exchange contracts. The JSON model below describes what a
//! deployment artifact declares, so a loaded contract can be checked against
//! those declarations before it is used.

use alloy_primitives::{B256, Bytes, LogData};
use alloy_sol_types::sol;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

sol! {
	/// ERC-20 token traded on the exchange.
	contract Token {
		event Transfer(address indexed from, address indexed to, uint256 value);
		event Approval(address indexed owner, address indexed spender, uint256 value);

		function name() external view returns (string);
		function symbol() external view returns (string);
		function decimals() external view returns (uint256);
		function totalSupply() external view returns (uint256);
		function balanceOf(address owner) external view returns (uint256);
		function allowance(address owner, address spender) external view returns (uint256);
		function transfer(address to, uint256 value) external returns (bool);
		function approve(address spender, uint256 value) external returns (bool);
		function transferFrom(address from, address to, uint256 value) external returns (bool);
	}

	/// Order-book exchange.
	contract Exchange {
		event Order(uint256 id, address user, address tokenGet, uint256 amountGet, address tokenGive, uint256 amountGive, uint256 timestamp);
		event Cancel(uint256 id, address user, address tokenGet, uint256 amountGet, address tokenGive, uint256 amountGive, uint256 timestamp);
		event Trade(uint256 id, address user, address tokenGet, uint256 amountGet, address tokenGive, uint256 amountGive, address userFill, uint256 timestamp);

		function feeAccount() external view returns (address);
		function feePercent() external view returns (uint256);
		function orderCount() external view returns (uint256);
		function makeOrder(address tokenGet, uint256 amountGet, address tokenGive, uint256 amountGive) external;
		function cancelOrder(uint256 id) external;
		function fillOrder(uint256 id) external;
	}
}

/// Raw topics and data in the shape the `sol!` event decoders take.
pub fn log_data(topics: &[B256], data: &Bytes) -> LogData {
	LogData::new_unchecked(topics.to_vec(), data.clone())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbiEntryKind {
	Function,
	Event,
	Constructor,
	Fallback,
	Receive,
	Error,
	#[serde(other)]
	Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
	#[serde(default)]
	pub name: String,
	#[serde(rename = "type")]
	pub ty: String,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub indexed: bool,
}

/// One entry of a contract ABI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiEntry {
	#[serde(rename = "type")]
	pub kind: AbiEntryKind,
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub inputs: Vec<AbiParam>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub outputs: Vec<AbiParam>,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub anonymous: bool,
}

impl AbiEntry {
	/// Canonical signature, e.g. `Transfer(address,address,uint256)`.
	pub fn signature(&self) -> String {
		format!(
			"{}({})",
			self.name,
			self.inputs.iter().map(|input| input.ty.as_str()).join(",")
		)
	}

	pub fn is_event(&self, name: &str) -> bool {
		self.kind == AbiEntryKind::Event && self.name == name
	}

	pub fn is_function(&self, name: &str) -> bool {
		self.kind == AbiEntryKind::Function && self.name == name
	}
}
