//! dGPU marketplace client core
//!
//! Client-side rental lifecycle for a GPU/AI-model rental marketplace:
//! balance reads against a remote ledger, payment submission through an
//! injected wallet, a durable rental record store with ledger
//! reconciliation, per-rental countdown timers and the orchestrator
//! tying them together. Truth lives in the local profile store and in
//! on-chain transaction history; there is no server-side rental ledger.

pub mod accounts;
pub mod catalog;
pub mod config;
pub mod ledger;
pub mod payment;
pub mod rental;
pub mod storage;
pub mod types;
pub mod wallet;

pub use config::MarketConfig;
pub use rental::{RentalManager, RentalRecord, RentalStatus, RentalStore};
pub use types::{ResourceKind, ResourceRef};
