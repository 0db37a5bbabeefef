//! Protocol health derived from token supplies and the SOL reserve.
//!
//! All values are in SOL unless the name says USD. The stable token is
//! pegged to 1 USD, so its NAV in SOL is the inverse of the SOL price; the
//! leveraged token absorbs whatever the reserve holds beyond that.

use crate::amount::MAX_DECIMALS;
use crate::catalog::NATIVE_DECIMALS;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricsError {
    /// Reserve does not cover the stable supply
    #[error("Leveraged NAV is not positive: {0}")]
    NonPositiveNav(Decimal),

    #[error("Division by zero: {0}")]
    DivisionGuard(&'static str),

    #[error("Unsupported decimals: {0}")]
    UnsupportedDecimals(u8),

    #[error("Arithmetic overflow computing {0}")]
    Overflow(&'static str),
}

/// Supplies and reserve read at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolSnapshot {
    pub timestamp: i64,
    pub slot: u64,
    pub stable_supply_raw: u64,
    pub leveraged_supply_raw: u64,
    pub stable_decimals: u8,
    pub leveraged_decimals: u8,
    /// Total collateral in lamports
    pub reserve_lamports: u64,
    #[serde(with = "rust_decimal::serde::str")]
    pub native_usd_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    #[serde(with = "rust_decimal::serde::str")]
    pub stable_nav: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub leveraged_nav: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub collateral_ratio: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub effective_leverage: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub native_usd_price: Decimal,
}

impl DerivedMetrics {
    /// USD value of one leveraged token.
    pub fn leveraged_price_usd(&self) -> Decimal {
        (self.leveraged_nav * self.native_usd_price).round_dp(12).normalize()
    }

    /// USD value of one stable token; 1 up to rounding.
    pub fn stable_price_usd(&self) -> Decimal {
        (self.stable_nav * self.native_usd_price).round_dp(12).normalize()
    }
}

/// Whole-unit value of a raw amount.
fn to_units(raw: u64, decimals: u8) -> Result<Decimal, MetricsError> {
    if decimals > MAX_DECIMALS {
        return Err(MetricsError::UnsupportedDecimals(decimals));
    }
    Ok(Decimal::from_i128_with_scale(raw as i128, decimals as u32))
}

impl ProtocolSnapshot {
    /// Derive NAVs, collateral ratio and leverage, in that order.
    ///
    /// Any error means this snapshot cannot be used for pricing; the same
    /// computation on fresh inputs may succeed.
    pub fn derive(&self) -> Result<DerivedMetrics, MetricsError> {
        let stable_supply = to_units(self.stable_supply_raw, self.stable_decimals)?;
        let leveraged_supply = to_units(self.leveraged_supply_raw, self.leveraged_decimals)?;
        let reserve = to_units(self.reserve_lamports, NATIVE_DECIMALS)?;

        if self.native_usd_price <= Decimal::ZERO {
            return Err(MetricsError::DivisionGuard("native USD price"));
        }
        let stable_nav = Decimal::ONE
            .checked_div(self.native_usd_price)
            .ok_or(MetricsError::Overflow("stable NAV"))?;

        let stable_value = stable_nav
            .checked_mul(stable_supply)
            .ok_or(MetricsError::Overflow("stable value"))?;

        if leveraged_supply.is_zero() {
            return Err(MetricsError::DivisionGuard("leveraged supply"));
        }
        let leveraged_nav = (reserve - stable_value)
            .checked_div(leveraged_supply)
            .ok_or(MetricsError::Overflow("leveraged NAV"))?;
        if leveraged_nav <= Decimal::ZERO {
            return Err(MetricsError::NonPositiveNav(leveraged_nav));
        }

        if stable_value.is_zero() {
            return Err(MetricsError::DivisionGuard("stable value"));
        }
        let collateral_ratio = reserve
            .checked_div(stable_value)
            .ok_or(MetricsError::Overflow("collateral ratio"))?;

        let leveraged_value = leveraged_nav
            .checked_mul(leveraged_supply)
            .ok_or(MetricsError::Overflow("leveraged value"))?;
        if leveraged_value.is_zero() {
            return Err(MetricsError::DivisionGuard("leveraged value"));
        }
        let effective_leverage = reserve
            .checked_div(leveraged_value)
            .ok_or(MetricsError::Overflow("effective leverage"))?;

        debug!(
            "Slot {}: stable NAV {}, leveraged NAV {}, CR {}, leverage {}",
            self.slot, stable_nav, leveraged_nav, collateral_ratio, effective_leverage
        );

        Ok(DerivedMetrics {
            stable_nav: stable_nav.normalize(),
            leveraged_nav: leveraged_nav.normalize(),
            collateral_ratio: collateral_ratio.normalize(),
            effective_leverage: effective_leverage.normalize(),
            native_usd_price: self.native_usd_price,
        })
    }
}
