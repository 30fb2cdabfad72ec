pub mod aggregator;
pub mod catalogue;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod risk;
pub mod store;
pub mod transaction;
pub mod types;
pub mod view;
pub mod wallet;

#[cfg(test)]
mod testutil;

pub use engine::LendingEngine;
pub use error::{ErrorKind, LendingError, LendingResult, UpstreamError};
