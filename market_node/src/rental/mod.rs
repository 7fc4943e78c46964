//! Rental lifecycle core: records, durable store, countdown timers and
//! the orchestrator sequencing balance check, payment and persistence

use crate::types::{Address, ResourceRef, TxSignature};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub mod orchestrator;
pub mod store;
pub mod timer;

pub use orchestrator::{RentalError, RentalManager};
pub use store::{CreateOutcome, RentalStore, StoreError};
pub use timer::{format_hms, remaining_seconds, RentalTimer};

/// Lifecycle status of a rental record
///
/// Transitions only move forward: `Active -> Expired` (timer or manual
/// end) and `Active -> Completed` (externally confirmed finalization).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    Active,
    Completed,
    Expired,
}

impl RentalStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, RentalStatus::Active)
    }

    /// Whether moving to `next` represents forward progress
    pub fn can_transition_to(&self, next: RentalStatus) -> bool {
        matches!(
            (self, next),
            (RentalStatus::Active, RentalStatus::Completed)
                | (RentalStatus::Active, RentalStatus::Expired)
        )
    }
}

/// Synthetic utilization telemetry attached to a rental (cosmetic)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageStats {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub power_usage: f64,
    pub temperature: f64,
    pub gpu_usage: f64,
}

/// Synthetic performance telemetry attached to a rental (cosmetic)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceMetrics {
    pub throughput: String,
    pub latency: String,
    pub success_rate: f64,
}

pub fn generate_usage_stats() -> UsageStats {
    let mut rng = rand::thread_rng();
    UsageStats {
        cpu_usage: rng.gen_range(20.0..50.0),
        memory_usage: rng.gen_range(30.0..70.0),
        power_usage: rng.gen_range(150.0..250.0),
        temperature: rng.gen_range(50.0..70.0),
        gpu_usage: rng.gen_range(40.0..70.0),
    }
}

pub fn generate_performance_metrics() -> PerformanceMetrics {
    let mut rng = rand::thread_rng();
    PerformanceMetrics {
        throughput: format!("{} req/s", rng.gen_range(500..1500)),
        latency: format!("{}ms", rng.gen_range(10..60)),
        success_rate: rng.gen_range(90.0..100.0),
    }
}

/// One resource rental and its lifecycle state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RentalRecord {
    /// Payment signature, or a generated id for reconciled records
    pub id: String,
    pub resource: ResourceRef,
    /// Requested duration, hours >= 1
    pub hours: u32,
    /// Fixed at creation as price_per_hour * hours, never recomputed
    pub price: f64,
    pub renter_address: Address,
    pub status: RentalStatus,
    pub started_at: DateTime<Utc>,
    pub transaction_signature: Option<TxSignature>,
    pub usage_stats: Option<UsageStats>,
    pub performance_metrics: Option<PerformanceMetrics>,
}

impl RentalRecord {
    /// Build a freshly paid, active rental
    pub fn new_active(
        resource: ResourceRef,
        hours: u32,
        price: f64,
        renter_address: Address,
        signature: TxSignature,
    ) -> Self {
        Self {
            id: signature.clone(),
            resource,
            hours,
            price,
            renter_address,
            status: RentalStatus::Active,
            started_at: Utc::now(),
            transaction_signature: Some(signature),
            usage_stats: Some(generate_usage_stats()),
            performance_metrics: Some(generate_performance_metrics()),
        }
    }

    /// Authoritative end of the rental, derived and never stored
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.started_at + ChronoDuration::seconds(self.hours as i64 * 3600)
    }

    pub fn remaining_seconds_at(&self, now: DateTime<Utc>) -> u64 {
        remaining_seconds(self.ends_at(), now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceKind;

    fn gpu() -> ResourceRef {
        ResourceRef {
            id: "1".to_string(),
            name: "RTX 4090".to_string(),
            kind: ResourceKind::Gpu,
            price_per_hour: 0.05,
            vram_gb: 24,
            performance: 100,
        }
    }

    #[test]
    fn test_forward_only_transition_table() {
        use RentalStatus::*;
        assert!(Active.can_transition_to(Expired));
        assert!(Active.can_transition_to(Completed));
        assert!(!Active.can_transition_to(Active));
        assert!(!Expired.can_transition_to(Active));
        assert!(!Expired.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Completed.can_transition_to(Expired));
    }

    #[test]
    fn test_ends_at_derived_from_start_and_hours() {
        let record = RentalRecord::new_active(gpu(), 4, 0.2, "payer".to_string(), "sig".to_string());
        let expected = record.started_at + ChronoDuration::seconds(4 * 3600);
        assert_eq!(record.ends_at(), expected);
        assert_eq!(record.id, "sig");
        assert_eq!(record.transaction_signature.as_deref(), Some("sig"));
    }

    #[test]
    fn test_telemetry_in_documented_ranges() {
        let usage = generate_usage_stats();
        assert!((20.0..50.0).contains(&usage.cpu_usage));
        assert!((150.0..250.0).contains(&usage.power_usage));
        let perf = generate_performance_metrics();
        assert!(perf.throughput.ends_with(" req/s"));
        assert!((90.0..100.0).contains(&perf.success_rate));
    }
}
