use std::sync::Arc;

use crate::aggregator::{Aggregator, MarketOverview, Recommendations};
use crate::catalogue::Catalogue;
use crate::config::AnalyticsConfig;
use crate::error::{LendingError, LendingResult};
use crate::risk::RiskEngine;
use crate::store::{MarketStore, PositionStore};
use crate::transaction::{ActionRequest, Simulation, SimulationChain};
use crate::types::{Market, MarketUpdate, NewMarket};
use crate::view::{EffectivePosition, PositionView};
use crate::wallet::{self, WalletInfo};

/// Entry point for every core operation. Holds the injected collaborators;
/// each call reads through them and nothing it simulates is persisted.
pub struct LendingEngine<M, P, W> {
    markets: Arc<M>,
    positions: Arc<P>,
    wallet: W,
    config: AnalyticsConfig,
}

impl<M, P, W> LendingEngine<M, P, W>
where
    M: MarketStore,
    P: PositionStore,
    W: WalletInfo,
{
    pub fn new(markets: Arc<M>, positions: Arc<P>, wallet: W, config: AnalyticsConfig) -> Self {
        Self {
            markets,
            positions,
            wallet,
            config,
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    fn aggregator(&self) -> Aggregator<'_, M> {
        Aggregator::new(self.markets.as_ref(), &self.config)
    }

    fn risk(&self) -> RiskEngine<'_, M, P> {
        RiskEngine::new(self.markets.as_ref(), self.positions.as_ref())
    }

    fn catalogue(&self) -> Catalogue<'_, M> {
        Catalogue::new(self.markets.as_ref())
    }

    pub fn overview(&self) -> LendingResult<MarketOverview> {
        self.aggregator().overview()
    }

    pub fn recommendations(&self) -> LendingResult<Recommendations> {
        self.aggregator().recommendations()
    }

    pub fn simulate_supply(
        &self,
        address: &str,
        asset_id: &str,
        amount: &str,
    ) -> LendingResult<Simulation> {
        self.risk().simulate_supply(address, asset_id, amount)
    }

    pub fn simulate_borrow(
        &self,
        address: &str,
        asset_id: &str,
        amount: &str,
    ) -> LendingResult<Simulation> {
        self.risk().simulate_borrow(address, asset_id, amount)
    }

    pub fn simulate_actions(
        &self,
        address: &str,
        actions: &[ActionRequest],
    ) -> LendingResult<SimulationChain> {
        self.risk().simulate_actions(address, actions)
    }

    pub fn get_effective_position(&self, address: &str) -> LendingResult<EffectivePosition> {
        self.risk().effective_position(address)
    }

    /// Position plus wallet data. A failing wallet lookup is replaced by a
    /// zero-balance placeholder; store and integrity errors still propagate.
    pub fn get_position(&self, address: &str) -> LendingResult<PositionView> {
        let position = self.get_effective_position(address)?;
        let address_info = wallet::address_info_or_placeholder(&self.wallet, address);
        Ok(PositionView {
            position,
            address_info,
        })
    }

    pub fn list_markets(&self) -> LendingResult<Vec<Market>> {
        self.catalogue().list()
    }

    pub fn get_market(&self, id: &str) -> LendingResult<Market> {
        self.catalogue().get(id)
    }

    pub fn create_market(&self, new: NewMarket) -> LendingResult<Market> {
        self.catalogue().create(new)
    }

    pub fn update_market(&self, id: &str, update: MarketUpdate) -> LendingResult<Market> {
        self.catalogue().update(id, update)
    }

    pub fn delete_market(&self, id: &str) -> LendingResult<()> {
        self.catalogue().delete(id)
    }

    /// Creates every market in a JSON array of creation records. Stops at the
    /// first rejected record.
    pub fn seed_markets(&self, json: &str) -> LendingResult<usize> {
        let records: Vec<NewMarket> = serde_json::from_str(json)
            .map_err(|e| LendingError::InvalidMarket(format!("seed document: {e}")))?;
        let count = records.len();
        for record in records {
            self.create_market(record)?;
        }
        Ok(count)
    }
}
