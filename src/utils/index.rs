use crate::contracts::TOKEN_DECIMALS;
use alloy_primitives::U256;

/// `10^decimals`, or `None` past 77 decimals where it no longer fits a U256.
fn unit(decimals: u32) -> Option<U256> {
	U256::from(10u8).checked_pow(U256::from(decimals))
}

/// Whole tokens expressed in base units of an 18-decimal token.
pub fn tokens(whole: u64) -> U256 {
	U256::from(whole) * U256::from(10u8).pow(U256::from(TOKEN_DECIMALS))
}

/// Formats a base-unit amount with `decimals` fractional digits, trimming
/// trailing zeros.
pub fn format_token_amount(amount: U256, decimals: u32) -> String {
	if decimals == 0 {
		return amount.to_string();
	}
	// Any U256 is below an unrepresentable unit, so it is all fraction.
	let (whole, fraction) = match unit(decimals) {
		Some(unit) => amount.div_rem(unit),
		None => (U256::ZERO, amount),
	};
	let fraction = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
	let fraction = fraction.trim_end_matches('0');
	if fraction.is_empty() {
		whole.to_string()
	} else {
		format!("{whole}.{fraction}")
	}
}

/// Parses a decimal amount such as `"1.5"` into base units.
pub fn parse_token_amount(text: &str, decimals: u32) -> Result<U256, String> {
	let text = text.trim();
	let unit = unit(decimals).ok_or_else(|| format!("{decimals} decimals exceed the range of a uint256"))?;
	let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
	if whole.is_empty() && fraction.is_empty() {
		return Err("empty amount".to_string());
	}
	if fraction.len() > decimals as usize {
		return Err(format!("{text:?} has more than {decimals} decimal places"));
	}
	let digits = |part: &str| -> Result<U256, String> {
		if part.is_empty() {
			return Ok(U256::ZERO);
		}
		if !part.bytes().all(|b| b.is_ascii_digit()) {
			return Err(format!("invalid amount {text:?}"));
		}
		U256::from_str_radix(part, 10).map_err(|e| format!("invalid amount {text:?}: {e}"))
	};
	let scale = U256::from(10u8).pow(U256::from(decimals - fraction.len() as u32));
	let whole = digits(whole)?
		.checked_mul(unit)
		.ok_or_else(|| format!("amount {text:?} overflows"))?;
	let fraction = digits(fraction)? * scale;
	whole
		.checked_add(fraction)
		.ok_or_else(|| format!("amount {text:?} overflows"))
}
