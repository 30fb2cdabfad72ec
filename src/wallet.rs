use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::UpstreamError;
use crate::types::Address;

const LOVELACE_DECIMALS: u32 = 6;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Balance {
    pub lovelace: u64,
    pub ada: Decimal,
}

impl Balance {
    pub fn from_lovelace(lovelace: u64) -> Self {
        Self {
            lovelace,
            ada: Decimal::from(lovelace) / Decimal::from(10u64.pow(LOVELACE_DECIMALS)),
        }
    }
}

/// On-chain data for a wallet address as reported by the explorer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressInfo {
    pub address: Address,
    pub balance: Balance,
    pub transaction_count: u64,
    pub utxo_count: u64,
    pub stake_address: Option<String>,
}

impl AddressInfo {
    /// Zero-valued stand-in used when the explorer cannot be reached.
    pub fn placeholder(address: &str) -> Self {
        Self {
            address: address.to_string(),
            balance: Balance::from_lovelace(0),
            transaction_count: 0,
            utxo_count: 0,
            stake_address: None,
        }
    }
}

/// Blockchain-explorer lookup of a wallet address.
pub trait WalletInfo: Send + Sync {
    fn address_info(&self, address: &str) -> Result<AddressInfo, UpstreamError>;
}

/// Explorer lookup that degrades to [`AddressInfo::placeholder`] on failure.
pub fn address_info_or_placeholder<W>(wallet: &W, address: &str) -> AddressInfo
where
    W: WalletInfo + ?Sized,
{
    match wallet.address_info(address) {
        Ok(info) => info,
        Err(err) => {
            warn!(%address, error = %err, "could not get blockchain data, using placeholder");
            AddressInfo::placeholder(address)
        }
    }
}

/// Wallet source with no explorer behind it; every lookup fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

impl WalletInfo for Offline {
    fn address_info(&self, _address: &str) -> Result<AddressInfo, UpstreamError> {
        Err(UpstreamError::NotConfigured)
    }
}

/// Fixed address book, for demos and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticWallet {
    entries: BTreeMap<Address, AddressInfo>,
}

impl StaticWallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, info: AddressInfo) -> Self {
        self.entries.insert(info.address.clone(), info);
        self
    }
}

impl WalletInfo for StaticWallet {
    fn address_info(&self, address: &str) -> Result<AddressInfo, UpstreamError> {
        self.entries
            .get(address)
            .cloned()
            .ok_or_else(|| UpstreamError::UnknownAddress(address.to_string()))
    }
}
