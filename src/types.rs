use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{LendingError, LendingResult};

pub type MarketId = String;
pub type AssetId = String;
pub type Address = String;

/// On-chain quantity, kept exactly as written and of any length. Ordering and
/// zero checks work on the digits; conversion to `Decimal` happens only for
/// valuation and addition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct TokenAmount(String);

impl TokenAmount {
    pub fn zero() -> Self {
        Self("0".to_string())
    }

    /// Parses a non-negative plain decimal string (`"1000"`, `"12.5"`).
    pub fn parse(raw: &str) -> LendingResult<Self> {
        let amount = Self(raw.to_string());
        if !amount.is_well_formed() {
            return Err(LendingError::invalid_amount(raw, "not a plain decimal number"));
        }
        Ok(amount)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact `Decimal` value. `None` for malformed strings and for
    /// quantities beyond the 96-bit `Decimal` range.
    pub fn value(&self) -> Option<Decimal> {
        if !self.is_well_formed() {
            return None;
        }
        Decimal::from_str_exact(&self.0).ok()
    }

    pub fn checked_add(&self, other: &TokenAmount) -> Option<TokenAmount> {
        let sum = self.value()?.checked_add(other.value()?)?;
        Some(Self::from(sum))
    }

    pub fn is_zero(&self) -> bool {
        let (int, frac) = self.significant_digits();
        int.is_empty() && frac.is_empty()
    }

    /// Numeric ordering of two well-formed amounts.
    pub fn cmp_value(&self, other: &TokenAmount) -> Ordering {
        let (a_int, a_frac) = self.significant_digits();
        let (b_int, b_frac) = other.significant_digits();
        a_int
            .len()
            .cmp(&b_int.len())
            .then_with(|| a_int.cmp(b_int))
            .then_with(|| a_frac.cmp(b_frac))
    }

    /// Digits, optionally followed by `.` and more digits.
    pub fn is_well_formed(&self) -> bool {
        let digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
        match self.0.split_once('.') {
            None => digits(&self.0),
            Some((int, frac)) => digits(int) && digits(frac),
        }
    }

    /// Integer part without leading zeros, fraction without trailing zeros.
    fn significant_digits(&self) -> (&str, &str) {
        let (int, frac) = self.0.split_once('.').unwrap_or((self.0.as_str(), ""));
        (int.trim_start_matches('0'), frac.trim_end_matches('0'))
    }
}

impl From<Decimal> for TokenAmount {
    fn from(value: Decimal) -> Self {
        Self(value.normalize().to_string())
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Borrow limit over debt. There is no ratio without debt, so that case is a
/// separate variant rather than an infinite float.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", content = "ratio", rename_all = "snake_case")]
pub enum HealthFactor {
    NoDebt,
    Ratio(Decimal),
}

impl HealthFactor {
    /// `borrow_limit / debt`, or `NoDebt` when there is no debt. Fails when
    /// the quotient leaves the `Decimal` range.
    pub fn from_totals(
        borrow_limit_usd: Decimal,
        total_borrowed_usd: Decimal,
    ) -> LendingResult<Self> {
        if total_borrowed_usd.is_zero() {
            return Ok(HealthFactor::NoDebt);
        }
        borrow_limit_usd
            .checked_div(total_borrowed_usd)
            .map(HealthFactor::Ratio)
            .ok_or_else(|| {
                LendingError::invalid_amount(
                    total_borrowed_usd.to_string(),
                    "health factor out of range",
                )
            })
    }

    pub fn ratio(&self) -> Option<Decimal> {
        match self {
            HealthFactor::NoDebt => None,
            HealthFactor::Ratio(r) => Some(*r),
        }
    }

    /// No debt is always at least as healthy as any threshold.
    pub fn is_at_least(&self, threshold: Decimal) -> bool {
        match self {
            HealthFactor::NoDebt => true,
            HealthFactor::Ratio(r) => *r >= threshold,
        }
    }
}

/// Sum that reports overflow instead of panicking.
pub fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Market {
    pub id: MarketId,
    pub asset_id: AssetId,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,

    pub supply_apy: Decimal,
    pub borrow_apy: Decimal,
    pub total_supply: TokenAmount,
    pub total_supply_usd: Decimal,
    pub total_borrow: TokenAmount,
    pub total_borrow_usd: Decimal,
    pub liquidity: TokenAmount,
    pub liquidity_usd: Decimal,
    pub utilization_rate: Decimal,

    pub collateral_factor: Decimal,
    pub liquidation_threshold: Decimal,
    pub liquidation_penalty: Decimal,
    pub reserve_factor: Decimal,

    pub is_active: bool,
    pub can_supply: bool,
    pub can_borrow: bool,
    pub can_use_as_collateral: bool,

    pub price_usd: Decimal,
    pub price_oracle: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Market {
    /// Checks ranges and the `collateral_factor <= liquidation_threshold`
    /// invariant. Returns the first violation found.
    pub fn check(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("empty id".to_string());
        }
        if self.asset_id.is_empty() {
            return Err("empty asset_id".to_string());
        }
        non_negative("supply_apy", self.supply_apy)?;
        non_negative("borrow_apy", self.borrow_apy)?;
        non_negative("total_supply_usd", self.total_supply_usd)?;
        non_negative("total_borrow_usd", self.total_borrow_usd)?;
        non_negative("liquidity_usd", self.liquidity_usd)?;
        fraction("utilization_rate", self.utilization_rate)?;
        fraction("collateral_factor", self.collateral_factor)?;
        fraction("liquidation_threshold", self.liquidation_threshold)?;
        fraction("liquidation_penalty", self.liquidation_penalty)?;
        fraction("reserve_factor", self.reserve_factor)?;
        if self.collateral_factor > self.liquidation_threshold {
            return Err(format!(
                "collateral_factor {} exceeds liquidation_threshold {}",
                self.collateral_factor, self.liquidation_threshold
            ));
        }
        if self.price_usd <= Decimal::ZERO {
            return Err(format!("price_usd must be positive, got {}", self.price_usd));
        }
        for (name, amount) in [
            ("total_supply", &self.total_supply),
            ("total_borrow", &self.total_borrow),
            ("liquidity", &self.liquidity),
        ] {
            if !amount.is_well_formed() {
                return Err(format!("{name} is not a valid amount: {amount:?}"));
            }
        }
        Ok(())
    }
}

fn non_negative(name: &str, value: Decimal) -> Result<(), String> {
    if value < Decimal::ZERO {
        return Err(format!("{name} must be >= 0, got {value}"));
    }
    Ok(())
}

fn fraction(name: &str, value: Decimal) -> Result<(), String> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(format!("{name} must be within [0, 1], got {value}"));
    }
    Ok(())
}

/// Administrative creation payload. `id` is generated when omitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewMarket {
    #[serde(default)]
    pub id: Option<MarketId>,
    pub asset_id: AssetId,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(default)]
    pub logo_url: Option<String>,
    pub supply_apy: Decimal,
    pub borrow_apy: Decimal,
    pub total_supply: TokenAmount,
    pub total_supply_usd: Decimal,
    pub total_borrow: TokenAmount,
    pub total_borrow_usd: Decimal,
    pub liquidity: TokenAmount,
    pub liquidity_usd: Decimal,
    pub utilization_rate: Decimal,
    pub collateral_factor: Decimal,
    pub liquidation_threshold: Decimal,
    pub liquidation_penalty: Decimal,
    pub reserve_factor: Decimal,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub can_supply: bool,
    #[serde(default = "default_true")]
    pub can_borrow: bool,
    #[serde(default = "default_true")]
    pub can_use_as_collateral: bool,
    pub price_usd: Decimal,
    pub price_oracle: String,
}

impl NewMarket {
    pub fn into_market(self, now: DateTime<Utc>) -> Market {
        Market {
            id: self
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            asset_id: self.asset_id,
            name: self.name,
            symbol: self.symbol,
            decimals: self.decimals,
            logo_url: self.logo_url,
            supply_apy: self.supply_apy,
            borrow_apy: self.borrow_apy,
            total_supply: self.total_supply,
            total_supply_usd: self.total_supply_usd,
            total_borrow: self.total_borrow,
            total_borrow_usd: self.total_borrow_usd,
            liquidity: self.liquidity,
            liquidity_usd: self.liquidity_usd,
            utilization_rate: self.utilization_rate,
            collateral_factor: self.collateral_factor,
            liquidation_threshold: self.liquidation_threshold,
            liquidation_penalty: self.liquidation_penalty,
            reserve_factor: self.reserve_factor,
            is_active: self.is_active,
            can_supply: self.can_supply,
            can_borrow: self.can_borrow,
            can_use_as_collateral: self.can_use_as_collateral,
            price_usd: self.price_usd,
            price_oracle: self.price_oracle,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update: only `Some` fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MarketUpdate {
    pub supply_apy: Option<Decimal>,
    pub borrow_apy: Option<Decimal>,
    pub total_supply: Option<TokenAmount>,
    pub total_supply_usd: Option<Decimal>,
    pub total_borrow: Option<TokenAmount>,
    pub total_borrow_usd: Option<Decimal>,
    pub liquidity: Option<TokenAmount>,
    pub liquidity_usd: Option<Decimal>,
    pub utilization_rate: Option<Decimal>,
    pub collateral_factor: Option<Decimal>,
    pub liquidation_threshold: Option<Decimal>,
    pub liquidation_penalty: Option<Decimal>,
    pub reserve_factor: Option<Decimal>,
    pub is_active: Option<bool>,
    pub can_supply: Option<bool>,
    pub can_borrow: Option<bool>,
    pub can_use_as_collateral: Option<bool>,
    pub price_usd: Option<Decimal>,
    pub price_oracle: Option<String>,
}

impl MarketUpdate {
    pub fn apply_to(self, market: &mut Market, now: DateTime<Utc>) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *slot = v;
            }
        }
        set(&mut market.supply_apy, self.supply_apy);
        set(&mut market.borrow_apy, self.borrow_apy);
        set(&mut market.total_supply, self.total_supply);
        set(&mut market.total_supply_usd, self.total_supply_usd);
        set(&mut market.total_borrow, self.total_borrow);
        set(&mut market.total_borrow_usd, self.total_borrow_usd);
        set(&mut market.liquidity, self.liquidity);
        set(&mut market.liquidity_usd, self.liquidity_usd);
        set(&mut market.utilization_rate, self.utilization_rate);
        set(&mut market.collateral_factor, self.collateral_factor);
        set(&mut market.liquidation_threshold, self.liquidation_threshold);
        set(&mut market.liquidation_penalty, self.liquidation_penalty);
        set(&mut market.reserve_factor, self.reserve_factor);
        set(&mut market.is_active, self.is_active);
        set(&mut market.can_supply, self.can_supply);
        set(&mut market.can_borrow, self.can_borrow);
        set(&mut market.can_use_as_collateral, self.can_use_as_collateral);
        set(&mut market.price_usd, self.price_usd);
        set(&mut market.price_oracle, self.price_oracle);
        market.updated_at = now;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SupplyEntry {
    pub asset_id: AssetId,
    pub amount: TokenAmount,
    pub amount_usd: Decimal,
    pub apy: Decimal,
    pub used_as_collateral: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BorrowEntry {
    pub asset_id: AssetId,
    pub amount: TokenAmount,
    pub amount_usd: Decimal,
    pub apy: Decimal,
}

/// A user's supplies and borrows. The totals, borrow limit and health factor
/// are derived and only change through [`Position::refresh`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Position {
    pub user_address: Address,
    total_supplied_usd: Decimal,
    total_borrowed_usd: Decimal,
    borrow_limit_usd: Decimal,
    health_factor: HealthFactor,
    pub supplies: Vec<SupplyEntry>,
    pub borrows: Vec<BorrowEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    pub fn new(user_address: Address, now: DateTime<Utc>) -> Self {
        Self {
            user_address,
            total_supplied_usd: Decimal::ZERO,
            total_borrowed_usd: Decimal::ZERO,
            borrow_limit_usd: Decimal::ZERO,
            health_factor: HealthFactor::NoDebt,
            supplies: Vec::new(),
            borrows: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn total_supplied_usd(&self) -> Decimal {
        self.total_supplied_usd
    }

    pub fn total_borrowed_usd(&self) -> Decimal {
        self.total_borrowed_usd
    }

    pub fn borrow_limit_usd(&self) -> Decimal {
        self.borrow_limit_usd
    }

    pub fn health_factor(&self) -> HealthFactor {
        self.health_factor
    }

    pub fn supply(&self, asset_id: &str) -> Option<&SupplyEntry> {
        self.supplies.iter().find(|s| s.asset_id == asset_id)
    }

    pub fn borrow(&self, asset_id: &str) -> Option<&BorrowEntry> {
        self.borrows.iter().find(|b| b.asset_id == asset_id)
    }

    /// Re-derives totals from the entries and the health factor from the
    /// given borrow limit. Leaves the position unchanged on overflow.
    pub fn refresh(&mut self, borrow_limit_usd: Decimal) -> LendingResult<()> {
        let overflow = |field: &str| LendingError::invalid_amount(field, "USD total overflows");
        let supplied = checked_sum(self.supplies.iter().map(|s| s.amount_usd))
            .ok_or_else(|| overflow("total_supplied_usd"))?;
        let borrowed = checked_sum(self.borrows.iter().map(|b| b.amount_usd))
            .ok_or_else(|| overflow("total_borrowed_usd"))?;
        let health_factor = HealthFactor::from_totals(borrow_limit_usd, borrowed)?;

        self.total_supplied_usd = supplied;
        self.total_borrowed_usd = borrowed;
        self.borrow_limit_usd = borrow_limit_usd;
        self.health_factor = health_factor;
        Ok(())
    }

    /// At most one entry per asset on each side.
    pub fn check(&self) -> Result<(), String> {
        for (i, s) in self.supplies.iter().enumerate() {
            if self.supplies[..i].iter().any(|o| o.asset_id == s.asset_id) {
                return Err(format!("duplicate supply entry for {}", s.asset_id));
            }
        }
        for (i, b) in self.borrows.iter().enumerate() {
            if self.borrows[..i].iter().any(|o| o.asset_id == b.asset_id) {
                return Err(format!("duplicate borrow entry for {}", b.asset_id));
            }
        }
        Ok(())
    }
}
