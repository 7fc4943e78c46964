//! Record store invariants: eviction preference, forward-only status,
//! degraded-capacity fallback, fixed pricing

mod common;

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use common::*;
use dgpu_market_node::config::MarketConfig;
use dgpu_market_node::ledger::LedgerClient;
use dgpu_market_node::rental::{RentalRecord, RentalStatus, RentalStore, StoreError};
use dgpu_market_node::storage::{KvStorage, MemoryKvStorage};
use proptest::prelude::*;
use std::sync::Arc;

fn record(id: &str, status: RentalStatus, age_hours: i64) -> RentalRecord {
    let mut r = RentalRecord::new_active(gpu(0.5), 1, 0.5, PAYER.to_string(), id.to_string());
    r.status = status;
    r.started_at = Utc::now() - ChronoDuration::hours(age_hours);
    r
}

fn store_with(config: MarketConfig, storage: Arc<MemoryKvStorage>) -> RentalStore {
    let ledger: Arc<dyn LedgerClient> = Arc::new(MockLedger::with_balance(0.0));
    let storage_dyn: Arc<dyn KvStorage> = storage;
    RentalStore::new(storage_dyn, ledger, &config)
}

#[tokio::test]
async fn test_eviction_prefers_oldest_non_active() -> Result<()> {
    let config = MarketConfig {
        max_rentals: 5,
        ..MarketConfig::default()
    };
    let store = store_with(config, Arc::new(MemoryKvStorage::new()));

    store.create(record("r1-active", RentalStatus::Active, 50)).await?; // oldest
    store.create(record("r2-done", RentalStatus::Completed, 40)).await?;
    store.create(record("r3-active", RentalStatus::Active, 30)).await?;
    store.create(record("r4-done", RentalStatus::Expired, 20)).await?;
    store.create(record("r5-done", RentalStatus::Completed, 10)).await?;

    // at the cap: the oldest NON-active record goes, not the older active
    store.create(record("r6-new", RentalStatus::Active, 0)).await?;

    let ids: Vec<String> = store.list_all().await?.into_iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), 5);
    assert!(ids.contains(&"r1-active".to_string()));
    assert!(!ids.contains(&"r2-done".to_string()));
    assert!(ids.contains(&"r6-new".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_eviction_falls_back_to_oldest_active() -> Result<()> {
    let config = MarketConfig {
        max_rentals: 3,
        ..MarketConfig::default()
    };
    let store = store_with(config, Arc::new(MemoryKvStorage::new()));

    store.create(record("a1", RentalStatus::Active, 30)).await?;
    store.create(record("a2", RentalStatus::Active, 20)).await?;
    store.create(record("a3", RentalStatus::Active, 10)).await?;

    store.create(record("a4", RentalStatus::Active, 0)).await?;

    let ids: Vec<String> = store.list_all().await?.into_iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), 3);
    // only when every record is active does the oldest active go
    assert!(!ids.contains(&"a1".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_status_transitions_are_forward_only() -> Result<()> {
    let store = store_with(MarketConfig::default(), Arc::new(MemoryKvStorage::new()));
    store.create(record("r1", RentalStatus::Active, 1)).await?;

    assert!(store.update_status("r1", RentalStatus::Expired).await?);

    // no resurrection, no terminal-to-terminal hop
    assert!(!store.update_status("r1", RentalStatus::Active).await?);
    assert!(!store.update_status("r1", RentalStatus::Completed).await?);
    assert_eq!(
        store.get("r1").await?.unwrap().status,
        RentalStatus::Expired
    );

    // repeating the applied transition is a no-op as well
    assert!(!store.update_status("r1", RentalStatus::Expired).await?);
    Ok(())
}

#[tokio::test]
async fn test_update_status_unknown_record() {
    let store = store_with(MarketConfig::default(), Arc::new(MemoryKvStorage::new()));
    let err = store
        .update_status("missing", RentalStatus::Expired)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_quota_exhaustion_degrades_without_losing_new_rental() -> Result<()> {
    // storage only holds 3 entries; the store must shrink history to
    // land the in-flight rental instead of failing it
    let config = MarketConfig {
        max_rentals: 10,
        degraded_keep_records: 1,
        ..MarketConfig::default()
    };
    let store = store_with(config, Arc::new(MemoryKvStorage::with_capacity_limit(3)));

    store.create(record("old1", RentalStatus::Completed, 30)).await?;
    store.create(record("old2", RentalStatus::Completed, 20)).await?;
    store.create(record("old3", RentalStatus::Completed, 10)).await?;

    let outcome = store.create(record("fresh", RentalStatus::Active, 0)).await?;
    assert!(outcome.degraded, "write should have degraded storage");

    let ids: Vec<String> = store.list_all().await?.into_iter().map(|r| r.id).collect();
    assert!(ids.contains(&"fresh".to_string()));
    assert!(ids.len() <= 3);
    Ok(())
}

#[tokio::test]
async fn test_listing_is_newest_first_per_address() -> Result<()> {
    let store = store_with(MarketConfig::default(), Arc::new(MemoryKvStorage::new()));
    store.create(record("old", RentalStatus::Completed, 10)).await?;
    store.create(record("new", RentalStatus::Active, 1)).await?;

    let mut other = record("other", RentalStatus::Active, 0);
    other.renter_address = "someone-else".to_string();
    store.create(other).await?;

    let records = store.list_by_address(&PAYER.to_string()).await?;
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["new", "old"]);
    Ok(())
}

fn status_strategy() -> impl Strategy<Value = RentalStatus> {
    prop_oneof![
        Just(RentalStatus::Active),
        Just(RentalStatus::Completed),
        Just(RentalStatus::Expired),
    ]
}

proptest! {
    #[test]
    fn prop_price_is_exact_and_fixed(price_per_hour in 0.0f64..10.0, hours in 1u32..200) {
        let mut resource = gpu(price_per_hour);
        let price = resource.price_per_hour * hours as f64;
        let record = RentalRecord::new_active(
            resource.clone(),
            hours,
            price,
            PAYER.to_string(),
            "sig".to_string(),
        );
        prop_assert_eq!(record.price, price_per_hour * hours as f64);

        // a later catalog price change never reprices the record
        resource.price_per_hour *= 3.0;
        prop_assert_eq!(record.price, price_per_hour * hours as f64);
    }

    #[test]
    fn prop_terminal_states_never_move(from in status_strategy(), to in status_strategy()) {
        if from != RentalStatus::Active {
            prop_assert!(!from.can_transition_to(to));
        }
        // and nothing ever transitions to active
        prop_assert!(!from.can_transition_to(RentalStatus::Active));
    }
}
