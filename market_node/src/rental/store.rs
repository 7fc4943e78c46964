//! Durable rental record table with eviction and ledger reconciliation
//!
//! The store is the single authority over persisted rentals: every write
//! goes through `create`/`update_status`/`reconcile` so the dedup and
//! eviction invariants hold. Reconciliation is additive only; local
//! records are never deleted by it.

use super::{RentalRecord, RentalStatus};
use crate::config::MarketConfig;
use crate::ledger::{LedgerClient, LedgerError};
use crate::storage::{KvStorage, StorageError};
use crate::types::{Address, ResourceRef, TxSignature, RENTAL_TX_TAG};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

const RENTAL_KEY_PREFIX: &str = "rental:";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("Ledger failure: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Record {0} not found")]
    NotFound(String),

    #[error("Record encoding failed: {0}")]
    Serialization(String),
}

/// Result of a `create`, carrying the degraded-storage warning when the
/// write only succeeded after shrinking history
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub record: RentalRecord,
    pub degraded: bool,
}

pub struct RentalStore {
    storage: Arc<dyn KvStorage>,
    ledger: Arc<dyn LedgerClient>,
    max_rentals: usize,
    degraded_keep_records: usize,
    degraded_keep_window: ChronoDuration,
}

impl RentalStore {
    pub fn new(
        storage: Arc<dyn KvStorage>,
        ledger: Arc<dyn LedgerClient>,
        config: &MarketConfig,
    ) -> Self {
        Self {
            storage,
            ledger,
            max_rentals: config.max_rentals,
            degraded_keep_records: config.degraded_keep_records,
            degraded_keep_window: ChronoDuration::from_std(config.degraded_keep_window)
                .unwrap_or_else(|_| ChronoDuration::days(30)),
        }
    }

    fn key(id: &str) -> String {
        format!("{}{}", RENTAL_KEY_PREFIX, id)
    }

    /// Append a new rental, evicting old history at the capacity cap
    pub async fn create(&self, record: RentalRecord) -> Result<CreateOutcome, StoreError> {
        let mut existing = self.list_all().await?;
        if existing.len() >= self.max_rentals {
            let target = self.max_rentals.saturating_sub(1);
            self.evict_down_to(&mut existing, target).await?;
        }

        let mut degraded = false;
        if let Err(first_err) = self.write(&record).await {
            warn!("rental write failed ({}), evicting and retrying", first_err);
            let mut records = self.list_all().await?;
            let target = self.max_rentals.saturating_sub(1);
            self.evict_down_to(&mut records, target).await?;

            if self.write(&record).await.is_err() {
                // last resort: shrink to a recent window, keep the
                // in-flight rental at all costs
                self.shrink_to_recent_window().await?;
                self.write(&record).await?;
                degraded = true;
            }
        }

        debug!("rental {} created ({:?})", record.id, record.status);
        Ok(CreateOutcome { record, degraded })
    }

    pub async fn get(&self, id: &str) -> Result<Option<RentalRecord>, StoreError> {
        match self.storage.get(&Self::key(id)).await? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All records, newest first
    pub async fn list_all(&self) -> Result<Vec<RentalRecord>, StoreError> {
        let keys = self.storage.list_keys(RENTAL_KEY_PREFIX).await?;
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(bytes) = self.storage.get(&key).await? {
                records.push(Self::decode(&bytes)?);
            }
        }
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(records)
    }

    /// Records for one renter, newest first
    pub async fn list_by_address(&self, address: &Address) -> Result<Vec<RentalRecord>, StoreError> {
        let mut records = self.list_all().await?;
        records.retain(|r| &r.renter_address == address);
        Ok(records)
    }

    /// Forward-only status transition; returns whether anything changed
    pub async fn update_status(
        &self,
        id: &str,
        status: RentalStatus,
    ) -> Result<bool, StoreError> {
        let mut record = self
            .get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if !record.status.can_transition_to(status) {
            debug!(
                "ignoring status change {:?} -> {:?} for rental {}",
                record.status, status, id
            );
            return Ok(false);
        }

        record.status = status;
        self.write(&record).await?;
        info!("rental {} -> {:?}", id, status);
        Ok(true)
    }

    /// Import rental payments observed on-chain but missing locally
    ///
    /// Idempotent: records are deduplicated by transaction signature, so
    /// running the pass twice with no new activity changes nothing.
    pub async fn reconcile(&self, address: &Address) -> Result<usize, StoreError> {
        let signatures = self.ledger.get_signatures_for_address(address).await?;
        if signatures.is_empty() {
            return Ok(0);
        }
        let sig_list: Vec<TxSignature> =
            signatures.iter().map(|s| s.signature.clone()).collect();
        let transactions = self.ledger.get_parsed_transactions(&sig_list).await?;

        let mut known: HashSet<TxSignature> = self
            .list_by_address(address)
            .await?
            .into_iter()
            .filter_map(|r| r.transaction_signature)
            .collect();

        let mut imported = 0;
        for tx in transactions.into_iter().flatten() {
            if !tx.has_log_tag(RENTAL_TX_TAG) {
                continue;
            }
            let amount = tx.payer_spent();
            let signature = match tx.signatures.first() {
                Some(sig) if !sig.is_empty() => sig.clone(),
                _ => continue,
            };
            if amount <= 0.0 || known.contains(&signature) {
                continue;
            }

            let started_at = tx
                .block_time
                .and_then(|t| Utc.timestamp_opt(t, 0).single())
                .unwrap_or_else(Utc::now);
            let record = Self::synthesize_completed(address, &signature, amount, started_at);
            self.create(record).await?;
            known.insert(signature);
            imported += 1;
        }

        if imported > 0 {
            info!("reconcile imported {} rentals for {}", imported, address);
        }
        Ok(imported)
    }

    /// Best-effort record for an on-chain payment with no local descriptor
    fn synthesize_completed(
        address: &Address,
        signature: &TxSignature,
        amount: f64,
        started_at: DateTime<Utc>,
    ) -> RentalRecord {
        let hours = (amount * 10.0).ceil().max(1.0) as u32;
        RentalRecord {
            id: Uuid::new_v4().to_string(),
            resource: ResourceRef::unknown_gpu(amount / hours as f64),
            hours,
            price: amount,
            renter_address: address.clone(),
            status: RentalStatus::Completed,
            started_at,
            transaction_signature: Some(signature.clone()),
            usage_stats: None,
            performance_metrics: None,
        }
    }

    async fn write(&self, record: &RentalRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.storage.put(&Self::key(&record.id), &bytes).await?;
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<RentalRecord, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Delete records until at most `target` remain, oldest non-active
    /// first; an active rental is only evicted when nothing else is left
    async fn evict_down_to(
        &self,
        records: &mut Vec<RentalRecord>,
        target: usize,
    ) -> Result<(), StoreError> {
        while records.len() > target {
            let victim_idx = records
                .iter()
                .enumerate()
                .filter(|(_, r)| !r.status.is_active())
                .min_by_key(|(_, r)| r.started_at)
                .map(|(i, _)| i)
                .or_else(|| {
                    records
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, r)| r.started_at)
                        .map(|(i, _)| i)
                });

            let victim_idx = match victim_idx {
                Some(i) => i,
                None => break,
            };
            let victim = records.remove(victim_idx);
            warn!("evicting rental {} ({:?})", victim.id, victim.status);
            self.storage.delete(&Self::key(&victim.id)).await?;
        }
        Ok(())
    }

    /// Degraded mode: keep active rentals plus the newest recent history
    async fn shrink_to_recent_window(&self) -> Result<(), StoreError> {
        let records = self.list_all().await?;
        let cutoff = Utc::now() - self.degraded_keep_window;

        // active rentals are always kept; recent history fills the rest
        let mut keep_ids: HashSet<&str> = records
            .iter()
            .filter(|r| r.status.is_active())
            .map(|r| r.id.as_str())
            .collect();
        for record in &records {
            // newest-first already
            if keep_ids.len() >= self.degraded_keep_records {
                break;
            }
            if record.started_at > cutoff {
                keep_ids.insert(record.id.as_str());
            }
        }
        for record in &records {
            if !keep_ids.contains(record.id.as_str()) {
                self.storage.delete(&Self::key(&record.id)).await?;
            }
        }
        warn!(
            "storage degraded: pruned history to {} records",
            keep_ids.len()
        );
        Ok(())
    }
}
