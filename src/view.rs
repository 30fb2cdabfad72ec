use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LendingResult;
use crate::health;
use crate::store::MarketStore;
use crate::types::Position;
use crate::wallet::AddressInfo;

/// A position with its derived fields current, plus liquidation exposure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectivePosition {
    #[serde(flatten)]
    pub position: Position,
    pub liquidation_threshold_usd: Decimal,
    pub liquidatable: bool,
}

/// The combined user-facing read: position and on-chain wallet data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PositionView {
    pub position: EffectivePosition,
    pub address_info: AddressInfo,
}

/// Builds the read model from a refreshed position.
pub fn capture<M>(position: Position, markets: &M) -> LendingResult<EffectivePosition>
where
    M: MarketStore + ?Sized,
{
    let liquidation_threshold_usd = health::liquidation_threshold_usd(&position.supplies, markets)?;
    let liquidatable = health::is_liquidatable(&position, liquidation_threshold_usd);
    Ok(EffectivePosition {
        position,
        liquidation_threshold_usd,
        liquidatable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskEngine;
    use crate::store::MemoryStore;
    use crate::testutil::market;
    use rust_decimal_macros::dec;

    #[test]
    fn tightened_threshold_makes_position_liquidatable() {
        let mut ada = market("ada", "lovelace");
        ada.price_usd = dec!(0.48);
        let store = MemoryStore::with_markets([ada.clone(), market("djed", "djed")]).unwrap();
        let risk = RiskEngine::new(&store, &store);

        let supplied = risk.simulate_supply("u", "lovelace", "1000").unwrap();
        let market_djed = store.find_market("djed").unwrap().unwrap();
        let borrowed = risk
            .project_borrow(
                &supplied.simulated_position,
                &market_djed,
                &crate::risk::parse_amount("360").unwrap(),
                chrono::Utc::now(),
            )
            .unwrap();
        store.put_position(borrowed.simulated_position).unwrap();

        let healthy = risk.effective_position("u").unwrap();
        assert_eq!(healthy.liquidation_threshold_usd, dec!(384));
        assert!(!healthy.liquidatable);

        // Stored amount_usd values are not repriced; only the weights move.
        ada.collateral_factor = dec!(0.5);
        ada.liquidation_threshold = dec!(0.7);
        store.upsert_market(ada).unwrap();
        let effective = risk.effective_position("u").unwrap();
        assert_eq!(effective.liquidation_threshold_usd, dec!(336));
        assert_eq!(effective.position.borrow_limit_usd(), dec!(240));
        assert!(effective.liquidatable);
    }

    #[test]
    fn serializes_flat() {
        let store = MemoryStore::new();
        let risk = RiskEngine::new(&store, &store);
        let effective = risk.effective_position("u").unwrap();
        let json = serde_json::to_value(&effective).unwrap();
        assert_eq!(json["user_address"], "u");
        assert_eq!(json["health_factor"]["status"], "no_debt");
        assert_eq!(json["liquidatable"], false);
    }
}
