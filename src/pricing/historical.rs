//! Implied USD price of a trade settled in the stable unit.

use crate::catalog::AssetCatalog;
use crate::types::Trade;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use std::str::FromStr;
use tracing::debug;

/// Prices outside this band are parsing artefacts, not market prices.
pub const MIN_PRICE_USD: Decimal = dec!(1);
pub const MAX_PRICE_USD: Decimal = dec!(10000);

/// Fractional digits in the reported price.
pub const PRICE_SCALE: u32 = 3;

pub struct HistoricalPriceEstimator<'a> {
    catalog: &'a AssetCatalog,
}

impl<'a> HistoricalPriceEstimator<'a> {
    pub fn new(catalog: &'a AssetCatalog) -> Self {
        Self { catalog }
    }

    /// USD per tracked token, when the counter asset is the stable mint.
    pub fn estimate(&self, trade: &Trade) -> Option<String> {
        let counter_mint = trade.counter_mint.as_ref()?;
        if !self.catalog.is_stable_mint(counter_mint) {
            return None;
        }
        let counter_amount = trade.counter_amount.as_deref()?;

        let price = implied_price(counter_amount, &trade.xsol_amount)?;
        debug!("Implied price for {}: {}", trade.signature, price);
        Some(price)
    }
}

/// `counter / target` to three decimals, `None` when either side is not a
/// positive decimal or the result leaves the sanity band.
pub fn implied_price(counter_amount: &str, target_amount: &str) -> Option<String> {
    let counter = Decimal::from_str(counter_amount).ok()?;
    let target = Decimal::from_str(target_amount).ok()?;
    if counter <= Decimal::ZERO || target <= Decimal::ZERO {
        return None;
    }

    let price = counter.checked_div(target)?;
    if price < MIN_PRICE_USD || price > MAX_PRICE_USD {
        debug!("Price {} outside [{}, {}]", price, MIN_PRICE_USD, MAX_PRICE_USD);
        return None;
    }

    let mut rounded = price.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(PRICE_SCALE);
    Some(rounded.to_string())
}
