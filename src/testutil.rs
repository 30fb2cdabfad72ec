use chrono::Utc;
use rust_decimal_macros::dec;

use crate::types::{Market, TokenAmount};

/// Valid, active market priced at 1 USD with a 0.75 collateral factor.
pub(crate) fn market(id: &str, asset_id: &str) -> Market {
    let now = Utc::now();
    Market {
        id: id.to_string(),
        asset_id: asset_id.to_string(),
        name: id.to_uppercase(),
        symbol: id.to_uppercase(),
        decimals: 6,
        logo_url: None,
        supply_apy: dec!(3),
        borrow_apy: dec!(5),
        total_supply: TokenAmount::parse("1000").unwrap(),
        total_supply_usd: dec!(1000),
        total_borrow: TokenAmount::parse("500").unwrap(),
        total_borrow_usd: dec!(500),
        liquidity: TokenAmount::parse("500").unwrap(),
        liquidity_usd: dec!(500),
        utilization_rate: dec!(0.5),
        collateral_factor: dec!(0.75),
        liquidation_threshold: dec!(0.8),
        liquidation_penalty: dec!(0.05),
        reserve_factor: dec!(0.1),
        is_active: true,
        can_supply: true,
        can_borrow: true,
        can_use_as_collateral: true,
        price_usd: dec!(1),
        price_oracle: "fixed".to_string(),
        created_at: now,
        updated_at: now,
    }
}
