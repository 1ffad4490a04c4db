//! Checked fixed-point helpers - no wrapping, no panics

use alloy_primitives::U256;

use crate::error::LedgerError;

/// Amounts are wei-denominated (18 decimals)
pub type Amount = U256;

/// 1 ETH / 1 token in base units
pub const WEI_PER_UNIT: Amount = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Basis points denominator (10,000 bps = 100%)
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Maximum trade fee (30%)
pub const MAX_FEE_BPS: u64 = 3_000;

/// Add, failing on overflow
pub fn add(a: Amount, b: Amount) -> Result<Amount, LedgerError> {
    a.checked_add(b).ok_or(LedgerError::ArithmeticOverflow)
}

/// Subtract, failing with `InsufficientBalance` instead of wrapping
pub fn sub(a: Amount, b: Amount) -> Result<Amount, LedgerError> {
    a.checked_sub(b).ok_or(LedgerError::InsufficientBalance)
}

/// Multiply, failing on overflow
pub fn mul(a: Amount, b: Amount) -> Result<Amount, LedgerError> {
    a.checked_mul(b).ok_or(LedgerError::ArithmeticOverflow)
}

/// Floor division; a zero divisor is an invalid amount
pub fn div_floor(a: Amount, b: Amount) -> Result<Amount, LedgerError> {
    a.checked_div(b).ok_or(LedgerError::InvalidAmount)
}

/// Ceiling division; a zero divisor is an invalid amount
pub fn div_ceil(a: Amount, b: Amount) -> Result<Amount, LedgerError> {
    let q = div_floor(a, b)?;
    if (a % b).is_zero() {
        Ok(q)
    } else {
        add(q, U256::from(1u8))
    }
}

/// `amount * bps / 10_000`, truncating
pub fn bps_of(amount: Amount, bps: u64) -> Result<Amount, LedgerError> {
    div_floor(mul(amount, U256::from(bps))?, U256::from(BPS_DENOMINATOR))
}

/// Whole units (ETH or tokens) to base units
pub fn units(whole: u64) -> Amount {
    U256::from(whole) * WEI_PER_UNIT
}

/// Lossy conversion for display/charting only
pub fn to_f64(x: Amount) -> f64 {
    x.as_limbs()
        .iter()
        .rev()
        .fold(0.0, |acc, &limb| acc * 18_446_744_073_709_551_616.0 + limb as f64)
}

/// Ratio `num / den` as f64, 0 when den is zero
pub fn ratio_f64(num: Amount, den: Amount) -> f64 {
    if den.is_zero() {
        return 0.0;
    }
    to_f64(num) / to_f64(den)
}
