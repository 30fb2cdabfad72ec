use std::cmp::Ordering;
use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::AnalyticsConfig;
use crate::error::{LendingError, LendingResult};
use crate::store::MarketStore;
use crate::types::{checked_sum, AssetId, Market, MarketId, TokenAmount};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopMarket {
    pub id: MarketId,
    pub asset_id: AssetId,
    pub name: String,
    pub total_supply: TokenAmount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarketOverview {
    pub total_supply_usd: Decimal,
    pub total_borrow_usd: Decimal,
    pub markets_count: usize,
    pub avg_supply_rate: Decimal,
    pub avg_borrow_rate: Decimal,
    pub top_markets: Vec<TopMarket>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SupplyOpportunity {
    pub id: MarketId,
    pub name: String,
    pub supply_apy: Decimal,
    pub total_supply: TokenAmount,
    pub liquidity: TokenAmount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BorrowOpportunity {
    pub id: MarketId,
    pub name: String,
    pub borrow_apy: Decimal,
    pub total_borrow: TokenAmount,
    pub liquidity: TokenAmount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SafeMarket {
    pub id: MarketId,
    pub name: String,
    pub collateral_factor: Decimal,
    pub supply_apy: Decimal,
    pub liquidity: TokenAmount,
}

/// Reading of current conditions from the average supply rate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MarketOutlook {
    FavorableToSupply,
    FavorableToAlternatives,
    Balanced,
}

impl MarketOutlook {
    pub fn classify(avg_supply_rate: Decimal, config: &AnalyticsConfig) -> Self {
        if avg_supply_rate > config.favorable_supply_rate {
            MarketOutlook::FavorableToSupply
        } else if avg_supply_rate < config.low_supply_rate {
            MarketOutlook::FavorableToAlternatives
        } else {
            MarketOutlook::Balanced
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            MarketOutlook::FavorableToSupply => {
                "Market supply rates are high - good time to supply assets"
            }
            MarketOutlook::FavorableToAlternatives => {
                "Market supply rates are low - might be better to look for other opportunities"
            }
            MarketOutlook::Balanced => {
                "Market conditions are balanced - consider both supply and borrow options"
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recommendations {
    pub best_supply_opportunities: Vec<SupplyOpportunity>,
    pub best_borrow_opportunities: Vec<BorrowOpportunity>,
    pub safest_supply_markets: Vec<SafeMarket>,
    pub overall_recommendation: Option<MarketOutlook>,
}

/// Rejects catalogues with malformed records or duplicated keys.
pub fn validate_catalogue(markets: &[Market]) -> LendingResult<()> {
    let mut ids = BTreeSet::new();
    let mut assets = BTreeSet::new();
    for market in markets {
        market
            .check()
            .map_err(|reason| LendingError::integrity(format!("market {}", market.id), reason))?;
        if !ids.insert(market.id.as_str()) {
            return Err(LendingError::integrity("catalogue", format!("duplicate id {}", market.id)));
        }
        if !assets.insert(market.asset_id.as_str()) {
            return Err(LendingError::integrity(
                "catalogue",
                format!("duplicate asset_id {}", market.asset_id),
            ));
        }
    }
    Ok(())
}

/// Σ `value` over the catalogue; overflow means a corrupt record.
fn catalogue_sum<F>(markets: &[Market], field: &str, value: F) -> LendingResult<Decimal>
where
    F: Fn(&Market) -> Decimal,
{
    checked_sum(markets.iter().map(value))
        .ok_or_else(|| LendingError::integrity("catalogue", format!("sum of {field} overflows")))
}

fn mean(values: &[Decimal], field: &str) -> LendingResult<Decimal> {
    if values.is_empty() {
        return Ok(Decimal::ZERO);
    }
    let total = checked_sum(values.iter().copied())
        .ok_or_else(|| LendingError::integrity("catalogue", format!("sum of {field} overflows")))?;
    Ok(total / Decimal::from(values.len()))
}

/// Mean supply APY over markets that have any supply.
fn avg_supply_rate(markets: &[Market]) -> LendingResult<Decimal> {
    let rates: Vec<Decimal> = markets
        .iter()
        .filter(|m| !m.total_supply.is_zero())
        .map(|m| m.supply_apy)
        .collect();
    mean(&rates, "supply_apy")
}

fn avg_borrow_rate(markets: &[Market]) -> LendingResult<Decimal> {
    let rates: Vec<Decimal> = markets
        .iter()
        .filter(|m| !m.total_borrow.is_zero())
        .map(|m| m.borrow_apy)
        .collect();
    mean(&rates, "borrow_apy")
}

pub fn overview(markets: &[Market], config: &AnalyticsConfig) -> LendingResult<MarketOverview> {
    validate_catalogue(markets)?;

    let mut by_supply: Vec<&Market> = markets.iter().collect();
    // Stable sort: equal supplies keep catalogue order.
    by_supply.sort_by(|a, b| b.total_supply.cmp_value(&a.total_supply));

    Ok(MarketOverview {
        total_supply_usd: catalogue_sum(markets, "total_supply_usd", |m| m.total_supply_usd)?,
        total_borrow_usd: catalogue_sum(markets, "total_borrow_usd", |m| m.total_borrow_usd)?,
        markets_count: markets.len(),
        avg_supply_rate: avg_supply_rate(markets)?,
        avg_borrow_rate: avg_borrow_rate(markets)?,
        top_markets: by_supply
            .into_iter()
            .take(config.top_markets_limit)
            .map(|m| TopMarket {
                id: m.id.clone(),
                asset_id: m.asset_id.clone(),
                name: m.name.clone(),
                total_supply: m.total_supply.clone(),
            })
            .collect(),
    })
}

/// Active markets passing `eligible`, ordered by `cmp`, truncated to `limit`.
fn ranked<'m, F, C>(markets: &'m [Market], limit: usize, eligible: F, cmp: C) -> Vec<&'m Market>
where
    F: Fn(&Market) -> bool,
    C: Fn(&Market, &Market) -> Ordering,
{
    let mut picked: Vec<&Market> = markets
        .iter()
        .filter(|m| m.is_active && eligible(m))
        .collect();
    picked.sort_by(|a, b| cmp(a, b));
    picked.truncate(limit);
    picked
}

pub fn recommendations(
    markets: &[Market],
    config: &AnalyticsConfig,
) -> LendingResult<Recommendations> {
    validate_catalogue(markets)?;

    if markets.is_empty() {
        return Ok(Recommendations {
            best_supply_opportunities: Vec::new(),
            best_borrow_opportunities: Vec::new(),
            safest_supply_markets: Vec::new(),
            overall_recommendation: None,
        });
    }

    let limit = config.recommendation_limit;
    let best_supply = ranked(markets, limit, |m| m.can_supply, |a, b| {
        b.supply_apy.cmp(&a.supply_apy)
    });
    let best_borrow = ranked(markets, limit, |m| m.can_borrow, |a, b| {
        a.borrow_apy.cmp(&b.borrow_apy)
    });
    let safest = ranked(markets, limit, |m| m.can_supply, |a, b| {
        b.collateral_factor.cmp(&a.collateral_factor)
    });

    Ok(Recommendations {
        best_supply_opportunities: best_supply
            .into_iter()
            .map(|m| SupplyOpportunity {
                id: m.id.clone(),
                name: m.name.clone(),
                supply_apy: m.supply_apy,
                total_supply: m.total_supply.clone(),
                liquidity: m.liquidity.clone(),
            })
            .collect(),
        best_borrow_opportunities: best_borrow
            .into_iter()
            .map(|m| BorrowOpportunity {
                id: m.id.clone(),
                name: m.name.clone(),
                borrow_apy: m.borrow_apy,
                total_borrow: m.total_borrow.clone(),
                liquidity: m.liquidity.clone(),
            })
            .collect(),
        safest_supply_markets: safest
            .into_iter()
            .map(|m| SafeMarket {
                id: m.id.clone(),
                name: m.name.clone(),
                collateral_factor: m.collateral_factor,
                supply_apy: m.supply_apy,
                liquidity: m.liquidity.clone(),
            })
            .collect(),
        overall_recommendation: Some(MarketOutlook::classify(
            avg_supply_rate(markets)?,
            config,
        )),
    })
}

/// Catalogue-level queries over a market store.
pub struct Aggregator<'a, M: ?Sized> {
    markets: &'a M,
    config: &'a AnalyticsConfig,
}

impl<'a, M> Aggregator<'a, M>
where
    M: MarketStore + ?Sized,
{
    pub fn new(markets: &'a M, config: &'a AnalyticsConfig) -> Self {
        Self { markets, config }
    }

    pub fn overview(&self) -> LendingResult<MarketOverview> {
        overview(&self.markets.list_markets()?, self.config)
    }

    pub fn recommendations(&self) -> LendingResult<Recommendations> {
        recommendations(&self.markets.list_markets()?, self.config)
    }
}
