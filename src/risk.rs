use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::{LendingError, LendingResult};
use crate::health;
use crate::store::{MarketStore, PositionStore};
use crate::transaction::{Action, ActionRequest, Simulation, SimulationChain, TransactionRecord};
use crate::types::{BorrowEntry, Market, Position, SupplyEntry, TokenAmount};
use crate::view::{self, EffectivePosition};

/// Result of the pre-borrow solvency check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BorrowCheck {
    Accepted,
    Rejected {
        requested_total_usd: Decimal,
        borrow_limit_usd: Decimal,
    },
}

/// A borrow is accepted while total debt stays at or below the limit.
pub fn check_borrow(
    total_borrowed_usd: Decimal,
    amount_usd: Decimal,
    borrow_limit_usd: Decimal,
) -> LendingResult<BorrowCheck> {
    let requested_total_usd = total_borrowed_usd
        .checked_add(amount_usd)
        .ok_or_else(|| LendingError::invalid_amount(amount_usd.to_string(), "total debt overflows"))?;
    if requested_total_usd > borrow_limit_usd {
        Ok(BorrowCheck::Rejected {
            requested_total_usd,
            borrow_limit_usd,
        })
    } else {
        Ok(BorrowCheck::Accepted)
    }
}

/// Simulation amounts must be positive plain decimals.
pub fn parse_amount(raw: &str) -> LendingResult<TokenAmount> {
    let amount = TokenAmount::parse(raw)?;
    if amount.is_zero() {
        return Err(LendingError::invalid_amount(raw, "must be greater than zero"));
    }
    Ok(amount)
}

/// Adds `amount` to the entry's quantity, returning the new quantity and its
/// USD value.
fn increment(
    current: &TokenAmount,
    amount: &TokenAmount,
    market: &Market,
) -> LendingResult<(TokenAmount, Decimal)> {
    if !current.is_well_formed() {
        return Err(LendingError::integrity(
            format!("position entry for {}", market.asset_id),
            format!("stored amount {current:?} is not a valid amount"),
        ));
    }
    let total = current
        .checked_add(amount)
        .ok_or_else(|| LendingError::invalid_amount(amount.as_str(), "position amount overflows"))?;
    let total_usd = health::usd_value(&total, market)?;
    Ok((total, total_usd))
}

/// Appends or increments the supply entry for the market's asset. Returns the
/// USD value of `amount` alone.
pub fn apply_supply_to(
    supplies: &mut Vec<SupplyEntry>,
    market: &Market,
    amount: &TokenAmount,
) -> LendingResult<Decimal> {
    let amount_usd = health::usd_value(amount, market)?;
    match supplies.iter_mut().find(|s| s.asset_id == market.asset_id) {
        Some(entry) => {
            let (total, total_usd) = increment(&entry.amount, amount, market)?;
            entry.amount = total;
            entry.amount_usd = total_usd;
        }
        None => supplies.push(SupplyEntry {
            asset_id: market.asset_id.clone(),
            amount: amount.clone(),
            amount_usd,
            apy: market.supply_apy,
            used_as_collateral: market.can_use_as_collateral,
        }),
    }
    Ok(amount_usd)
}

/// Borrow-side counterpart of [`apply_supply_to`].
pub fn apply_borrow_to(
    borrows: &mut Vec<BorrowEntry>,
    market: &Market,
    amount: &TokenAmount,
) -> LendingResult<Decimal> {
    let amount_usd = health::usd_value(amount, market)?;
    match borrows.iter_mut().find(|b| b.asset_id == market.asset_id) {
        Some(entry) => {
            let (total, total_usd) = increment(&entry.amount, amount, market)?;
            entry.amount = total;
            entry.amount_usd = total_usd;
        }
        None => borrows.push(BorrowEntry {
            asset_id: market.asset_id.clone(),
            amount: amount.clone(),
            amount_usd,
            apy: market.borrow_apy,
        }),
    }
    Ok(amount_usd)
}

/// Evaluates hypothetical supply and borrow actions against the catalogue.
/// Reads only; nothing it computes is written back.
pub struct RiskEngine<'a, M: ?Sized, P: ?Sized> {
    markets: &'a M,
    positions: &'a P,
}

impl<'a, M, P> RiskEngine<'a, M, P>
where
    M: MarketStore + ?Sized,
    P: PositionStore + ?Sized,
{
    pub fn new(markets: &'a M, positions: &'a P) -> Self {
        Self { markets, positions }
    }

    /// Stored position, or an empty one, with every derived field recomputed.
    pub fn load_position(&self, address: &str) -> LendingResult<Position> {
        let mut position = match self.positions.find_position(address)? {
            Some(p) => {
                p.check().map_err(|reason| {
                    LendingError::integrity(format!("position {address}"), reason)
                })?;
                p
            }
            None => Position::new(address.to_string(), Utc::now()),
        };
        health::refresh(&mut position, self.markets).map_err(|e| stored_overflow(address, e))?;
        Ok(position)
    }

    /// Markets are addressed by asset id here; an internal id does not match.
    fn load_market(&self, asset_id: &str) -> LendingResult<Market> {
        match self.markets.find_by_asset(asset_id)? {
            Some(m) => health::checked_market(m),
            None => Err(LendingError::MarketNotFound(asset_id.to_string())),
        }
    }

    pub fn effective_position(&self, address: &str) -> LendingResult<EffectivePosition> {
        let position = self.load_position(address)?;
        view::capture(position, self.markets).map_err(|e| stored_overflow(address, e))
    }

    pub fn simulate_supply(
        &self,
        address: &str,
        asset_id: &str,
        amount: &str,
    ) -> LendingResult<Simulation> {
        let amount = parse_amount(amount)?;
        let market = self.load_market(asset_id)?;
        let position = self.load_position(address)?;
        self.project_supply(&position, &market, &amount, Utc::now())
    }

    pub fn simulate_borrow(
        &self,
        address: &str,
        asset_id: &str,
        amount: &str,
    ) -> LendingResult<Simulation> {
        let amount = parse_amount(amount)?;
        let market = self.load_market(asset_id)?;
        let position = self.load_position(address)?;
        self.project_borrow(&position, &market, &amount, Utc::now())
    }

    /// Applies the actions in order to one projected position. Each step sees
    /// the previous step's projection and recomputes the borrow limit from
    /// it; the first rejected step rejects the whole chain.
    pub fn simulate_actions(
        &self,
        address: &str,
        actions: &[ActionRequest],
    ) -> LendingResult<SimulationChain> {
        let mut position = self.load_position(address)?;
        let mut transactions = Vec::with_capacity(actions.len());
        for request in actions {
            let (asset_id, raw) = match request {
                ActionRequest::Supply { asset_id, amount }
                | ActionRequest::Borrow { asset_id, amount } => (asset_id, amount),
            };
            let amount = parse_amount(raw)?;
            let market = self.load_market(asset_id)?;
            let now = Utc::now();
            let step = match request.action() {
                Action::Supply => self.project_supply(&position, &market, &amount, now)?,
                Action::Borrow => self.project_borrow(&position, &market, &amount, now)?,
            };
            position = step.simulated_position;
            transactions.push(step.transaction);
        }
        Ok(SimulationChain {
            simulated_position: position,
            transactions,
        })
    }

    /// Supply projection on an already-refreshed position. The borrow limit
    /// is recomputed from the updated supply set.
    pub fn project_supply(
        &self,
        position: &Position,
        market: &Market,
        amount: &TokenAmount,
        now: DateTime<Utc>,
    ) -> LendingResult<Simulation> {
        let mut next = position.clone();
        let amount_usd = apply_supply_to(&mut next.supplies, market, amount)?;
        health::refresh(&mut next, self.markets)?;
        next.updated_at = now;

        debug!(
            user = %position.user_address,
            asset_id = %market.asset_id,
            %amount_usd,
            borrow_limit_usd = %next.borrow_limit_usd(),
            "supply simulated"
        );
        Ok(record(Action::Supply, position, next, market, amount, amount_usd, now))
    }

    /// Borrow projection on an already-refreshed position. The limit comes
    /// from the pre-action supply set and is not changed by borrowing.
    pub fn project_borrow(
        &self,
        position: &Position,
        market: &Market,
        amount: &TokenAmount,
        now: DateTime<Utc>,
    ) -> LendingResult<Simulation> {
        let borrow_limit_usd = health::borrow_limit_usd(&position.supplies, self.markets)?;
        let amount_usd = health::usd_value(amount, market)?;

        if let BorrowCheck::Rejected {
            requested_total_usd,
            borrow_limit_usd,
        } = check_borrow(position.total_borrowed_usd(), amount_usd, borrow_limit_usd)?
        {
            warn!(
                user = %position.user_address,
                asset_id = %market.asset_id,
                %requested_total_usd,
                %borrow_limit_usd,
                "borrow rejected"
            );
            return Err(LendingError::BorrowLimitExceeded {
                requested_total_usd,
                borrow_limit_usd,
            });
        }

        let mut next = position.clone();
        apply_borrow_to(&mut next.borrows, market, amount)?;
        next.refresh(borrow_limit_usd)?;
        next.updated_at = now;

        debug!(
            user = %position.user_address,
            asset_id = %market.asset_id,
            %amount_usd,
            total_borrowed_usd = %next.total_borrowed_usd(),
            "borrow simulated"
        );
        Ok(record(Action::Borrow, position, next, market, amount, amount_usd, now))
    }
}

/// Overflow while valuing a stored position means the record is corrupt.
fn stored_overflow(address: &str, err: LendingError) -> LendingError {
    match err {
        LendingError::InvalidAmount { reason, .. } => {
            LendingError::integrity(format!("position {address}"), reason)
        }
        other => other,
    }
}

fn record(
    action: Action,
    before: &Position,
    after: Position,
    market: &Market,
    amount: &TokenAmount,
    amount_usd: Decimal,
    now: DateTime<Utc>,
) -> Simulation {
    let transaction = TransactionRecord {
        action,
        user_address: before.user_address.clone(),
        asset_id: market.asset_id.clone(),
        amount: amount.clone(),
        amount_usd,
        health_factor_before: before.health_factor(),
        health_factor_after: after.health_factor(),
        timestamp: now,
    };
    Simulation {
        simulated_position: after,
        transaction,
    }
}
