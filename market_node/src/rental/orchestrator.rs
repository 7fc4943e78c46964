//! Lifecycle orchestrator: balance check -> payment -> persistence -> timer
//!
//! The steps of one rental are strictly sequential and all-or-nothing:
//! nothing is persisted until the payment confirms, so a failure at any
//! step leaves no partial record behind. Concurrent rent calls for the
//! same resource are rejected up front instead of racing one balance
//! reading.

use super::store::{RentalStore, StoreError};
use super::timer::{Expiration, RentalTimer};
use super::{RentalRecord, RentalStatus};
use crate::config::MarketConfig;
use crate::ledger::oracle::BalanceOracle;
use crate::ledger::LedgerError;
use crate::payment::{PaymentError, PaymentSubmitter};
use crate::types::{Address, ResourceRef};
use log::{error, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum RentalError {
    #[error("Rental duration must be at least 1 hour, got {hours}")]
    InvalidDuration { hours: u32 },

    #[error("Insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("A rental of {resource_id} is already in flight")]
    RentInFlight { resource_id: String },

    #[error("Balance unavailable: {0}")]
    BalanceUnavailable(#[from] LedgerError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Aggregate view over one renter's records, always derived on demand
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RentalSummary {
    pub total_spent: f64,
    pub active_count: usize,
    pub total_count: usize,
}

pub struct RentalManager {
    oracle: BalanceOracle,
    submitter: PaymentSubmitter,
    store: Arc<RentalStore>,
    tick_interval: std::time::Duration,
    timers: Mutex<HashMap<String, RentalTimer>>,
    in_flight: Mutex<HashSet<String>>,
    expiration_tx: mpsc::UnboundedSender<Expiration>,
    expiration_rx: Mutex<Option<mpsc::UnboundedReceiver<Expiration>>>,
}

impl RentalManager {
    pub fn new(
        oracle: BalanceOracle,
        submitter: PaymentSubmitter,
        store: Arc<RentalStore>,
        config: &MarketConfig,
    ) -> Self {
        let (expiration_tx, expiration_rx) = mpsc::unbounded_channel();
        Self {
            oracle,
            submitter,
            store,
            tick_interval: config.timer_tick_interval,
            timers: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
            expiration_tx,
            expiration_rx: Mutex::new(Some(expiration_rx)),
        }
    }

    pub fn store(&self) -> &Arc<RentalStore> {
        &self.store
    }

    /// Rent a resource for `hours`, paying from `payer`
    ///
    /// Sequence: duration check, balance pre-flight, payment, record
    /// creation, timer start. No record exists until the payment has
    /// confirmed.
    pub async fn rent(
        &self,
        resource: &ResourceRef,
        hours: u32,
        payer: &Address,
    ) -> Result<RentalRecord, RentalError> {
        if hours < 1 {
            return Err(RentalError::InvalidDuration { hours });
        }

        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if !in_flight.insert(resource.id.clone()) {
                return Err(RentalError::RentInFlight {
                    resource_id: resource.id.clone(),
                });
            }
        }

        let result = self.rent_inner(resource, hours, payer).await;

        self.in_flight.lock().unwrap().remove(&resource.id);
        result
    }

    async fn rent_inner(
        &self,
        resource: &ResourceRef,
        hours: u32,
        payer: &Address,
    ) -> Result<RentalRecord, RentalError> {
        // price is fixed here and never recomputed from the catalog
        let price = resource.price_per_hour * hours as f64;

        let available = self.oracle.fetch(payer).await?;
        if available < price {
            return Err(RentalError::InsufficientBalance {
                required: price,
                available,
            });
        }

        let receipt = self.submitter.submit_payment(payer, price).await?;
        info!(
            "rented {} for {}h at {} ({})",
            resource.name, hours, price, receipt.signature
        );

        let record = RentalRecord::new_active(
            resource.clone(),
            hours,
            price,
            payer.clone(),
            receipt.signature,
        );
        let outcome = self.store.create(record).await?;
        if outcome.degraded {
            warn!("rental {} persisted with degraded storage", outcome.record.id);
        }

        self.start_timer(&outcome.record);
        Ok(outcome.record)
    }

    /// Force an active rental to expired (timer callback or manual end)
    pub async fn expire(&self, id: &str) -> Result<bool, RentalError> {
        let changed = self.store.update_status(id, RentalStatus::Expired).await?;
        self.stop_timer(id);
        Ok(changed)
    }

    /// Restart timers for records that are still active, e.g. after a
    /// profile reload; already-elapsed rentals expire immediately
    pub async fn restore_timers(&self, address: &Address) -> Result<usize, RentalError> {
        let records = self.store.list_by_address(address).await?;
        let mut restored = 0;
        for record in records.iter().filter(|r| r.status.is_active()) {
            if record.remaining_seconds_at(chrono::Utc::now()) == 0 {
                self.expire(&record.id).await?;
            } else {
                self.start_timer(record);
                restored += 1;
            }
        }
        Ok(restored)
    }

    /// Remaining seconds for an active rental's countdown, if running
    pub fn remaining_seconds(&self, id: &str) -> Option<u64> {
        let timers = self.timers.lock().unwrap();
        timers.get(id).map(|t| t.remaining_seconds())
    }

    /// Derived totals over the store listing; no separately maintained
    /// counters that could drift
    pub async fn summary(&self, address: &Address) -> Result<RentalSummary, RentalError> {
        let records = self.store.list_by_address(address).await?;
        Ok(RentalSummary {
            total_spent: records.iter().map(|r| r.price).sum(),
            active_count: records.iter().filter(|r| r.status.is_active()).count(),
            total_count: records.len(),
        })
    }

    /// Import on-chain rental payments missing locally (see store docs)
    pub async fn reconcile(&self, address: &Address) -> Result<usize, RentalError> {
        Ok(self.store.reconcile(address).await?)
    }

    fn start_timer(&self, record: &RentalRecord) {
        let timer = RentalTimer::start(
            record.id.clone(),
            record.ends_at(),
            self.tick_interval,
            self.expiration_tx.clone(),
        );
        let mut timers = self.timers.lock().unwrap();
        timers.insert(record.id.clone(), timer);
    }

    fn stop_timer(&self, id: &str) {
        let mut timers = self.timers.lock().unwrap();
        if let Some(mut timer) = timers.remove(id) {
            timer.stop();
        }
    }

    /// Stop every countdown, e.g. when the owning view is torn down
    pub fn shutdown_timers(&self) {
        let mut timers = self.timers.lock().unwrap();
        for (_, mut timer) in timers.drain() {
            timer.stop();
        }
    }
}

/// Drive expiration signals from the timers into status transitions.
/// Call once; returns the listener task handle.
pub fn start_expiration_listener(manager: Arc<RentalManager>) -> JoinHandle<()> {
    let receiver = manager.expiration_rx.lock().unwrap().take();
    tokio::spawn(async move {
        let mut receiver = match receiver {
            Some(rx) => rx,
            None => return, // already listening
        };
        while let Some(expiration) = receiver.recv().await {
            if let Err(e) = manager.expire(&expiration.rental_id).await {
                error!("expiring rental {} failed: {}", expiration.rental_id, e);
            }
        }
    })
}
