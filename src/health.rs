use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{LendingError, LendingResult};
use crate::store::MarketStore;
use crate::types::{Market, Position, SupplyEntry, TokenAmount};

/// USD value of a quantity of the market's asset. The only place a
/// `TokenAmount` must fit the `Decimal` range.
pub fn usd_value(amount: &TokenAmount, market: &Market) -> LendingResult<Decimal> {
    let quantity = amount.value().ok_or_else(|| {
        LendingError::invalid_amount(amount.as_str(), "outside the range that can be valued")
    })?;
    quantity
        .checked_mul(market.price_usd)
        .ok_or_else(|| LendingError::invalid_amount(amount.as_str(), "USD value overflows"))
}

/// Resolves a market for valuation and rejects records that break their own
/// invariants.
pub fn checked_market(market: Market) -> LendingResult<Market> {
    market
        .check()
        .map_err(|reason| LendingError::integrity(format!("market {}", market.id), reason))?;
    Ok(market)
}

/// Σ `amount_usd × weight(market)` over collateral supplies.
///
/// Supplies whose market no longer resolves contribute nothing. A resolved
/// but malformed market aborts the computation.
fn weighted_collateral<M, F>(
    supplies: &[SupplyEntry],
    markets: &M,
    weight: F,
) -> LendingResult<Decimal>
where
    M: MarketStore + ?Sized,
    F: Fn(&Market) -> Decimal,
{
    let mut total = Decimal::ZERO;
    for supply in supplies.iter().filter(|s| s.used_as_collateral) {
        let market = match markets.find_by_asset(&supply.asset_id)? {
            Some(m) => checked_market(m)?,
            None => {
                debug!(asset_id = %supply.asset_id, "collateral market missing, skipped");
                continue;
            }
        };
        total = supply
            .amount_usd
            .checked_mul(weight(&market))
            .and_then(|weighted| total.checked_add(weighted))
            .ok_or_else(|| {
                LendingError::invalid_amount(supply.amount.as_str(), "collateral value overflows")
            })?;
    }
    Ok(total)
}

/// Maximum USD debt the supplies can back.
pub fn borrow_limit_usd<M>(supplies: &[SupplyEntry], markets: &M) -> LendingResult<Decimal>
where
    M: MarketStore + ?Sized,
{
    weighted_collateral(supplies, markets, |m| m.collateral_factor)
}

/// Collateral value at which the position becomes eligible for liquidation.
pub fn liquidation_threshold_usd<M>(supplies: &[SupplyEntry], markets: &M) -> LendingResult<Decimal>
where
    M: MarketStore + ?Sized,
{
    weighted_collateral(supplies, markets, |m| m.liquidation_threshold)
}

/// Liquidatable when there is debt and it exceeds the threshold-weighted
/// collateral.
pub fn is_liquidatable(position: &Position, liquidation_threshold_usd: Decimal) -> bool {
    let debt = position.total_borrowed_usd();
    !debt.is_zero() && debt > liquidation_threshold_usd
}

/// Recomputes every derived field of the position against the catalogue.
pub fn refresh<M>(position: &mut Position, markets: &M) -> LendingResult<()>
where
    M: MarketStore + ?Sized,
{
    let limit = borrow_limit_usd(&position.supplies, markets)?;
    position.refresh(limit)
}
