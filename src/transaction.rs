use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Address, AssetId, HealthFactor, Position, TokenAmount};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Supply,
    Borrow,
}

/// One requested step of a chained simulation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionRequest {
    Supply { asset_id: AssetId, amount: String },
    Borrow { asset_id: AssetId, amount: String },
}

impl ActionRequest {
    pub fn action(&self) -> Action {
        match self {
            ActionRequest::Supply { .. } => Action::Supply,
            ActionRequest::Borrow { .. } => Action::Borrow,
        }
    }
}

/// What a simulated action would have recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionRecord {
    pub action: Action,
    pub user_address: Address,
    pub asset_id: AssetId,
    pub amount: TokenAmount,
    pub amount_usd: Decimal,
    pub health_factor_before: HealthFactor,
    pub health_factor_after: HealthFactor,
    pub timestamp: DateTime<Utc>,
}

/// Projected position plus the record of the action that produced it. The
/// projection is never written back to the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Simulation {
    pub simulated_position: Position,
    pub transaction: TransactionRecord,
}

/// Result of a chained simulation: the final projection and one record per
/// step, in order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimulationChain {
    pub simulated_position: Position,
    pub transactions: Vec<TransactionRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_request_uses_action_tag() {
        let req: ActionRequest =
            serde_json::from_str(r#"{"action":"borrow","asset_id":"djed","amount":"300"}"#)
                .unwrap();
        assert_eq!(
            req,
            ActionRequest::Borrow {
                asset_id: "djed".into(),
                amount: "300".into()
            }
        );
        assert_eq!(req.action(), Action::Borrow);
    }
}
