//! Monetary amounts.
//!
//! Balances and transaction amounts are `rust_decimal::Decimal` values in the
//! wallet currency's major unit, with at most [`MONEY_SCALE`] fractional digits.
//! Never floating point.

use rust_decimal::Decimal;

use crate::error::{Result, WalletError};

/// Maximum number of fractional digits a ledger amount may carry.
pub const MONEY_SCALE: u32 = 2;

/// Currency assigned to newly created wallets.
pub const DEFAULT_CURRENCY: &str = "NGN";

/// Validate an amount supplied to a ledger mutation.
///
/// # Errors
///
/// Returns `WalletError::Validation` if the amount is zero, negative, or has
/// more than [`MONEY_SCALE`] fractional digits.
pub fn validate_amount(amount: Decimal) -> Result<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::Validation(format!(
            "amount must be positive, got {amount}"
        )));
    }

    let normalized = amount.normalize();
    if normalized.scale() > MONEY_SCALE {
        return Err(WalletError::Validation(format!(
            "amount {amount} has more than {MONEY_SCALE} decimal places"
        )));
    }

    Ok(normalized)
}
