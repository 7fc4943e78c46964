//! Balance oracle: spendable-balance reads plus a cancellable poller
//!
//! A failed read means the balance is unknown, never zero; spend-gated
//! callers must block conservatively on `Err`.

use super::rpc::{LedgerClient, LedgerError};
use crate::types::Address;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct BalanceOracle {
    client: Arc<dyn LedgerClient>,
}

impl BalanceOracle {
    pub fn new(client: Arc<dyn LedgerClient>) -> Self {
        Self { client }
    }

    /// One-shot balance read in native units
    pub async fn fetch(&self, address: &Address) -> Result<f64, LedgerError> {
        self.client.get_balance(address).await
    }

    /// Pre-flight check for a spend of `amount` native units
    pub async fn has_sufficient(
        &self,
        address: &Address,
        amount: f64,
    ) -> Result<bool, LedgerError> {
        let balance = self.fetch(address).await?;
        Ok(balance >= amount)
    }

    /// Start polling the address on a fixed interval
    ///
    /// The latest reading is published through the returned subscription;
    /// `None` means no successful read has happened yet. The poll task
    /// keeps the last known value on transient errors.
    pub fn subscribe(&self, address: Address, interval: Duration) -> BalanceSubscription {
        let (tx, rx) = watch::channel(None);
        let client = Arc::clone(&self.client);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match client.get_balance(&address).await {
                    Ok(balance) => {
                        debug!("balance {} = {}", address, balance);
                        if tx.send(Some(balance)).is_err() {
                            break; // subscriber gone
                        }
                    }
                    Err(e) => {
                        // keep the previous reading, do not publish zero
                        warn!("balance poll for {} failed: {}", address, e);
                        if tx.is_closed() {
                            break;
                        }
                    }
                }
            }
        });

        BalanceSubscription {
            receiver: rx,
            handle: Some(handle),
        }
    }
}

/// Handle to a running balance poll; dropping it stops the poller
pub struct BalanceSubscription {
    receiver: watch::Receiver<Option<f64>>,
    handle: Option<JoinHandle<()>>,
}

impl BalanceSubscription {
    /// Latest published reading (`None` until the first successful read)
    pub fn latest(&self) -> Option<f64> {
        *self.receiver.borrow()
    }

    /// Wait until the next published reading
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.receiver.changed().await
    }

    /// Stop the polling task
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for BalanceSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}
