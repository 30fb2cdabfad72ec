mod common;

use lending_analytics::store::{MarketStore, PositionStore};
use lending_analytics::transaction::{Action, ActionRequest};
use lending_analytics::types::{HealthFactor, MarketUpdate, TokenAmount};
use lending_analytics::wallet::{AddressInfo, Balance, Offline, StaticWallet};
use lending_analytics::{ErrorKind, LendingError};
use rust_decimal_macros::dec;

use common::{new_market, seeded};

const USER: &str = "addr_test1vz";

#[test]
fn ada_collateral_scenario() {
    let (_, engine) = seeded(Offline);

    let supplied = engine.simulate_supply(USER, "lovelace", "1000").unwrap();
    assert_eq!(supplied.transaction.action, Action::Supply);
    assert_eq!(supplied.transaction.amount_usd, dec!(480));
    assert_eq!(supplied.simulated_position.borrow_limit_usd(), dec!(360));
    assert_eq!(supplied.simulated_position.total_supplied_usd(), dec!(480));

    let supply = ActionRequest::Supply {
        asset_id: "lovelace".into(),
        amount: "1000".into(),
    };
    let borrow = |amount: &str| ActionRequest::Borrow {
        asset_id: "djed.token".into(),
        amount: amount.into(),
    };

    let err = engine
        .simulate_actions(USER, &[supply.clone(), borrow("400")])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BusinessRule);
    assert!(!err.is_fault());

    let chain = engine
        .simulate_actions(USER, &[supply, borrow("300")])
        .unwrap();
    let position = &chain.simulated_position;
    assert_eq!(position.total_borrowed_usd(), dec!(300));
    assert_eq!(position.health_factor(), HealthFactor::Ratio(dec!(1.2)));
    assert_eq!(
        chain.transactions[1].health_factor_after,
        HealthFactor::Ratio(dec!(1.2))
    );
}

#[test]
fn simulations_are_never_persisted() {
    let (store, engine) = seeded(Offline);
    engine.simulate_supply(USER, "lovelace", "1000").unwrap();
    assert!(store.find_position(USER).unwrap().is_none());

    let fresh = engine.get_effective_position(USER).unwrap();
    assert!(fresh.position.supplies.is_empty());
    assert_eq!(fresh.position.health_factor(), HealthFactor::NoDebt);
}

#[test]
fn borrow_against_stored_position() {
    let (store, engine) = seeded(Offline);
    let projected = engine
        .simulate_supply(USER, "lovelace", "1000")
        .unwrap()
        .simulated_position;
    store.put_position(projected).unwrap();

    let err = engine.simulate_borrow(USER, "djed.token", "360.01").unwrap_err();
    assert!(matches!(err, LendingError::BorrowLimitExceeded { .. }));

    let sim = engine.simulate_borrow(USER, "djed.token", "360").unwrap();
    assert_eq!(sim.simulated_position.health_factor(), HealthFactor::Ratio(dec!(1)));
    assert_eq!(sim.transaction.health_factor_before, HealthFactor::NoDebt);
}

#[test]
fn limit_follows_current_collateral_factor() {
    let (store, engine) = seeded(Offline);
    let projected = engine
        .simulate_supply(USER, "lovelace", "1000")
        .unwrap()
        .simulated_position;
    store.put_position(projected).unwrap();

    engine
        .update_market(
            "ada",
            MarketUpdate {
                collateral_factor: Some(dec!(0.5)),
                ..Default::default()
            },
        )
        .unwrap();

    let effective = engine.get_effective_position(USER).unwrap();
    assert_eq!(effective.position.borrow_limit_usd(), dec!(240));
    assert!(engine.simulate_borrow(USER, "djed.token", "241").is_err());
}

#[test]
fn delisted_collateral_is_skipped() {
    let (store, engine) = seeded(Offline);
    engine
        .create_market(new_market("milk", "milk.token", dec!(0.12), dec!(0.5)))
        .unwrap();
    let projected = engine
        .simulate_actions(
            USER,
            &[
                ActionRequest::Supply {
                    asset_id: "lovelace".into(),
                    amount: "1000".into(),
                },
                ActionRequest::Supply {
                    asset_id: "milk.token".into(),
                    amount: "1000".into(),
                },
            ],
        )
        .unwrap()
        .simulated_position;
    assert_eq!(projected.borrow_limit_usd(), dec!(420));
    store.put_position(projected).unwrap();

    engine.delete_market("milk").unwrap();
    let effective = engine.get_effective_position(USER).unwrap();
    assert_eq!(effective.position.borrow_limit_usd(), dec!(360));
    assert_eq!(effective.position.total_supplied_usd(), dec!(600));
}

#[test]
fn position_view_degrades_when_explorer_fails() {
    let (_, engine) = seeded(Offline);
    let view = engine.get_position(USER).unwrap();
    assert_eq!(view.address_info, AddressInfo::placeholder(USER));
    assert_eq!(view.position.position.user_address, USER);
}

#[test]
fn position_view_uses_explorer_data() {
    let info = AddressInfo {
        address: USER.into(),
        balance: Balance::from_lovelace(12_345_678),
        transaction_count: 7,
        utxo_count: 3,
        stake_address: Some("stake_test1u".into()),
    };
    let (_, engine) = seeded(StaticWallet::new().with(info.clone()));
    let view = engine.get_position(USER).unwrap();
    assert_eq!(view.address_info, info);
    assert_eq!(view.address_info.balance.ada, dec!(12.345678));
}

#[test]
fn corrupt_stored_market_aborts_simulation() {
    let (store, engine) = seeded(Offline);
    let mut market = engine.get_market("ada").unwrap();
    market.liquidation_threshold = dec!(0.5);
    store.upsert_market(market).unwrap();

    let err = engine.simulate_supply(USER, "lovelace", "1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataIntegrity);
    assert!(matches!(
        engine.overview().unwrap_err(),
        LendingError::DataIntegrity { .. }
    ));
}

#[test]
fn market_id_equal_to_another_asset_does_not_hijack_it() {
    let (_, engine) = seeded(Offline);
    engine
        .create_market(new_market("lovelace", "foo.token", dec!(5), dec!(0.1)))
        .unwrap();

    let sim = engine.simulate_supply(USER, "lovelace", "1000").unwrap();
    assert_eq!(sim.transaction.amount_usd, dec!(480));
    assert_eq!(sim.simulated_position.borrow_limit_usd(), dec!(360));
    assert_eq!(engine.get_market("lovelace").unwrap().asset_id, "foo.token");
}

#[test]
fn eighteen_decimal_supply_is_accepted_and_ranked() {
    let (_, engine) = seeded(Offline);
    let mut weth = new_market("weth", "weth.token", dec!(3500), dec!(0.8));
    weth.total_supply = TokenAmount::parse("589000000000000000000000000000000").unwrap();
    engine.create_market(weth).unwrap();

    let overview = engine.overview().unwrap();
    assert_eq!(overview.top_markets[0].id, "weth");
    assert_eq!(overview.markets_count, 3);
    assert!(engine.recommendations().is_ok());
}

#[test]
fn seeding_reads_creation_records() {
    let (_, engine) = common::engine(Offline);
    let json = r#"[
        {"id": "ada", "asset_id": "lovelace", "name": "Cardano", "symbol": "ADA",
         "decimals": 6, "supply_apy": "3.25", "borrow_apy": "5.45",
         "total_supply": "25000000000000", "total_supply_usd": "12000000",
         "total_borrow": "15000000000000", "total_borrow_usd": "7200000",
         "liquidity": "10000000000000", "liquidity_usd": "4800000",
         "utilization_rate": "0.6", "collateral_factor": "0.75",
         "liquidation_threshold": "0.8", "liquidation_penalty": "0.05",
         "reserve_factor": "0.1", "price_usd": "0.48", "price_oracle": "chainlink"}
    ]"#;
    assert_eq!(engine.seed_markets(json).unwrap(), 1);
    let ada = engine.get_market("ada").unwrap();
    assert!(ada.is_active && ada.can_supply && ada.can_borrow && ada.can_use_as_collateral);
    assert_eq!(ada.total_supply.as_str(), "25000000000000");

    assert!(matches!(
        engine.seed_markets(json).unwrap_err(),
        LendingError::MarketAlreadyExists(_)
    ));
}
