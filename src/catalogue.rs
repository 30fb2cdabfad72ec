use chrono::Utc;
use tracing::info;

use crate::error::{LendingError, LendingResult};
use crate::store::MarketStore;
use crate::types::{Market, MarketUpdate, NewMarket};

/// Administrative writes to the market catalogue. Every record is validated
/// here, before it reaches the store.
pub struct Catalogue<'a, M: ?Sized> {
    markets: &'a M,
}

impl<'a, M> Catalogue<'a, M>
where
    M: MarketStore + ?Sized,
{
    pub fn new(markets: &'a M) -> Self {
        Self { markets }
    }

    pub fn list(&self) -> LendingResult<Vec<Market>> {
        self.markets.list_markets()
    }

    /// Lookup by internal id only.
    pub fn get(&self, id: &str) -> LendingResult<Market> {
        self.markets
            .find_market(id)?
            .ok_or_else(|| LendingError::MarketNotFound(id.to_string()))
    }

    pub fn create(&self, new: NewMarket) -> LendingResult<Market> {
        let market = new.into_market(Utc::now());
        market.check().map_err(LendingError::InvalidMarket)?;

        let existing = self.markets.list_markets()?;
        if existing.iter().any(|m| m.asset_id == market.asset_id) {
            return Err(LendingError::MarketAlreadyExists(market.asset_id));
        }
        if existing.iter().any(|m| m.id == market.id) {
            return Err(LendingError::InvalidMarket(format!(
                "id {} already in use",
                market.id
            )));
        }

        self.markets.upsert_market(market.clone())?;
        info!(id = %market.id, asset_id = %market.asset_id, "market created");
        Ok(market)
    }

    /// Writes only the fields present in `update`; the merged record must
    /// still be valid.
    pub fn update(&self, id: &str, update: MarketUpdate) -> LendingResult<Market> {
        let mut market = self.get(id)?;
        update.apply_to(&mut market, Utc::now());
        market.check().map_err(LendingError::InvalidMarket)?;

        self.markets.upsert_market(market.clone())?;
        info!(id = %market.id, "market updated");
        Ok(market)
    }

    pub fn delete(&self, id: &str) -> LendingResult<()> {
        if !self.markets.delete_market(id)? {
            return Err(LendingError::MarketNotFound(id.to_string()));
        }
        info!(%id, "market deleted");
        Ok(())
    }
}
