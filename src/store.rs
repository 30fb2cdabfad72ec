use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{LendingError, LendingResult};
use crate::types::{Address, Market, Position};

/// Market catalogue access. Implementations keep both `id` and `asset_id`
/// unique and return markets in catalogue order.
pub trait MarketStore: Send + Sync {
    fn list_markets(&self) -> LendingResult<Vec<Market>>;

    /// Looks up by internal id only.
    fn find_market(&self, id: &str) -> LendingResult<Option<Market>>;

    /// Looks up by asset id only. Never matches an internal id.
    fn find_by_asset(&self, asset_id: &str) -> LendingResult<Option<Market>>;

    fn upsert_market(&self, market: Market) -> LendingResult<()>;

    /// Returns false when no market had this id.
    fn delete_market(&self, id: &str) -> LendingResult<bool>;
}

pub trait PositionStore: Send + Sync {
    fn find_position(&self, address: &str) -> LendingResult<Option<Position>>;
}

/// In-memory catalogue and position store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    markets: RwLock<Vec<Market>>,
    positions: RwLock<BTreeMap<Address, Position>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_markets(markets: impl IntoIterator<Item = Market>) -> LendingResult<Self> {
        let store = Self::new();
        for market in markets {
            store.upsert_market(market)?;
        }
        Ok(store)
    }

    pub fn put_position(&self, position: Position) -> LendingResult<()> {
        self.positions_mut()?
            .insert(position.user_address.clone(), position);
        Ok(())
    }

    fn markets(&self) -> LendingResult<RwLockReadGuard<'_, Vec<Market>>> {
        self.markets
            .read()
            .map_err(|_| LendingError::Storage("market lock poisoned".to_string()))
    }

    fn markets_mut(&self) -> LendingResult<RwLockWriteGuard<'_, Vec<Market>>> {
        self.markets
            .write()
            .map_err(|_| LendingError::Storage("market lock poisoned".to_string()))
    }

    fn positions_mut(&self) -> LendingResult<RwLockWriteGuard<'_, BTreeMap<Address, Position>>> {
        self.positions
            .write()
            .map_err(|_| LendingError::Storage("position lock poisoned".to_string()))
    }
}

impl MarketStore for MemoryStore {
    fn list_markets(&self) -> LendingResult<Vec<Market>> {
        Ok(self.markets()?.clone())
    }

    fn find_market(&self, id: &str) -> LendingResult<Option<Market>> {
        Ok(self.markets()?.iter().find(|m| m.id == id).cloned())
    }

    fn find_by_asset(&self, asset_id: &str) -> LendingResult<Option<Market>> {
        Ok(self
            .markets()?
            .iter()
            .find(|m| m.asset_id == asset_id)
            .cloned())
    }

    fn upsert_market(&self, market: Market) -> LendingResult<()> {
        let mut markets = self.markets_mut()?;
        if markets
            .iter()
            .any(|m| m.asset_id == market.asset_id && m.id != market.id)
        {
            return Err(LendingError::MarketAlreadyExists(market.asset_id));
        }
        match markets.iter_mut().find(|m| m.id == market.id) {
            Some(slot) => *slot = market,
            None => markets.push(market),
        }
        Ok(())
    }

    fn delete_market(&self, id: &str) -> LendingResult<bool> {
        let mut markets = self.markets_mut()?;
        let before = markets.len();
        markets.retain(|m| m.id != id);
        Ok(markets.len() != before)
    }
}

impl PositionStore for MemoryStore {
    fn find_position(&self, address: &str) -> LendingResult<Option<Position>> {
        let positions = self
            .positions
            .read()
            .map_err(|_| LendingError::Storage("position lock poisoned".to_string()))?;
        Ok(positions.get(address).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::market;

    #[test]
    fn upsert_rejects_asset_owned_by_another_id() {
        let store = MemoryStore::with_markets([market("ada", "lovelace")]).unwrap();
        let err = store.upsert_market(market("ada2", "lovelace")).unwrap_err();
        assert_eq!(err, LendingError::MarketAlreadyExists("lovelace".into()));
    }

    #[test]
    fn upsert_replaces_in_place_and_keeps_order() {
        let store =
            MemoryStore::with_markets([market("a", "asset-a"), market("b", "asset-b")]).unwrap();
        let mut replaced = market("a", "asset-a");
        replaced.name = "renamed".into();
        store.upsert_market(replaced).unwrap();

        let ids: Vec<_> = store
            .list_markets()
            .unwrap()
            .into_iter()
            .map(|m| (m.id, m.name))
            .collect();
        assert_eq!(ids[0], ("a".to_string(), "renamed".to_string()));
        assert_eq!(ids[1].0, "b");
    }

    #[test]
    fn id_and_asset_lookups_are_separate() {
        let store = MemoryStore::with_markets([
            market("ada", "lovelace"),
            market("lovelace", "foo.token"),
        ])
        .unwrap();
        assert_eq!(store.find_market("ada").unwrap().unwrap().asset_id, "lovelace");
        assert_eq!(store.find_by_asset("lovelace").unwrap().unwrap().id, "ada");
        assert_eq!(store.find_market("lovelace").unwrap().unwrap().asset_id, "foo.token");
        assert!(store.find_by_asset("ada").unwrap().is_none());
        assert!(store.find_market("missing").unwrap().is_none());
        assert!(store.delete_market("ada").unwrap());
        assert!(!store.delete_market("ada").unwrap());
    }
}
