//! Core marketplace types shared across modules

use serde::{Deserialize, Serialize};

/// Base units per native coin (lamport-style fixed point)
pub const UNITS_PER_COIN: u64 = 1_000_000_000;

/// Log tag attached to rental payment transactions on-chain
pub const RENTAL_TX_TAG: &str = "GPU_RENTAL";

/// Account address on the remote ledger (base58 text form)
pub type Address = String;

/// Transaction signature as returned by the ledger
pub type TxSignature = String;

/// Convert a native-unit amount to base units, flooring fractional dust
pub fn to_base_units(amount: f64) -> u64 {
    if amount <= 0.0 {
        return 0;
    }
    (amount * UNITS_PER_COIN as f64).floor() as u64
}

/// Convert base units back to the native fractional unit
pub fn from_base_units(units: u64) -> f64 {
    units as f64 / UNITS_PER_COIN as f64
}

/// What kind of listing a resource is
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Gpu,
    AiModel,
}

/// A rentable resource listing (GPU card or hosted AI model)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceRef {
    pub id: String,
    pub name: String,
    pub kind: ResourceKind,
    /// Price in native units per hour
    pub price_per_hour: f64,
    /// VRAM in GB (0 when unknown)
    pub vram_gb: u32,
    /// Relative performance score, 0-100
    pub performance: u32,
}

impl ResourceRef {
    /// Placeholder used when a reconciled transaction has no off-chain
    /// descriptor for the rented resource
    pub fn unknown_gpu(price_per_hour: f64) -> Self {
        Self {
            id: "unknown".to_string(),
            name: "Unknown GPU".to_string(),
            kind: ResourceKind::Gpu,
            price_per_hour,
            vram_gb: 0,
            performance: 0,
        }
    }
}
