#![allow(dead_code)]

use std::sync::Arc;

use lending_analytics::config::AnalyticsConfig;
use lending_analytics::store::MemoryStore;
use lending_analytics::types::{NewMarket, TokenAmount};
use lending_analytics::wallet::WalletInfo;
use lending_analytics::LendingEngine;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub type Engine<W> = LendingEngine<MemoryStore, MemoryStore, W>;

pub fn engine<W: WalletInfo>(wallet: W) -> (Arc<MemoryStore>, Engine<W>) {
    let store = Arc::new(MemoryStore::new());
    let engine = LendingEngine::new(
        store.clone(),
        store.clone(),
        wallet,
        AnalyticsConfig::default(),
    );
    (store, engine)
}

pub fn new_market(id: &str, asset_id: &str, price_usd: Decimal, collateral_factor: Decimal) -> NewMarket {
    NewMarket {
        id: Some(id.to_string()),
        asset_id: asset_id.to_string(),
        name: id.to_uppercase(),
        symbol: id.to_uppercase(),
        decimals: 6,
        logo_url: None,
        supply_apy: dec!(3),
        borrow_apy: dec!(5),
        total_supply: TokenAmount::parse("1000000").unwrap(),
        total_supply_usd: dec!(1000000) * price_usd,
        total_borrow: TokenAmount::parse("400000").unwrap(),
        total_borrow_usd: dec!(400000) * price_usd,
        liquidity: TokenAmount::parse("600000").unwrap(),
        liquidity_usd: dec!(600000) * price_usd,
        utilization_rate: dec!(0.4),
        collateral_factor,
        liquidation_threshold: (collateral_factor + dec!(0.05)).min(Decimal::ONE),
        liquidation_penalty: dec!(0.05),
        reserve_factor: dec!(0.1),
        is_active: true,
        can_supply: true,
        can_borrow: true,
        can_use_as_collateral: true,
        price_usd,
        price_oracle: "fixed".to_string(),
    }
}

/// ADA at 0.48 USD with a 0.75 collateral factor, DJED at 1 USD.
pub fn seeded<W: WalletInfo>(wallet: W) -> (Arc<MemoryStore>, Engine<W>) {
    let (store, engine) = engine(wallet);
    engine
        .create_market(new_market("ada", "lovelace", dec!(0.48), dec!(0.75)))
        .unwrap();
    engine
        .create_market(new_market("djed", "djed.token", dec!(1), dec!(0.9)))
        .unwrap();
    (store, engine)
}
