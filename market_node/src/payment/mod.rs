//! Payment submission: transfer construction, wallet hand-off, confirmation
//!
//! A timed-out confirmation is ambiguous, not failed: the transfer may
//! still land. Callers must never resubmit blindly; the record store's
//! reconciliation pass resolves the true outcome.

use crate::ledger::{LedgerClient, LedgerError};
use crate::types::{to_base_units, Address, TxSignature};
use crate::wallet::{WalletAdapter, WalletError};
use base64::Engine;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("No wallet extension available")]
    WalletUnavailable,

    #[error("User rejected the signing request")]
    UserRejected,

    #[error("Wallet failure: {0}")]
    Wallet(String),

    #[error("Ledger unreachable: {0}")]
    Network(#[from] LedgerError),

    #[error("Confirmation of {signature} not observed within {waited:?}")]
    ConfirmationTimeout {
        signature: TxSignature,
        waited: Duration,
    },

    #[error("Transaction {signature} failed on-chain")]
    TransactionFailed { signature: TxSignature },

    #[error("Transaction encoding failed: {0}")]
    Encoding(String),
}

impl From<WalletError> for PaymentError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Unavailable => PaymentError::WalletUnavailable,
            WalletError::UserRejected => PaymentError::UserRejected,
            other => PaymentError::Wallet(other.to_string()),
        }
    }
}

/// System transfer moving `base_units` from `from` to `to`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferInstruction {
    pub from: Address,
    pub to: Address,
    pub base_units: u64,
}

/// Unsigned transaction handed to the wallet for signing and broadcast
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub fee_payer: Address,
    /// Anti-replay token fetched immediately before signing
    pub recent_blockhash: String,
    pub instructions: Vec<TransferInstruction>,
}

impl Transaction {
    /// Base64-encoded binary envelope for `sendTransaction`
    pub fn to_wire(&self) -> Result<String, PaymentError> {
        let bytes = bincode::serialize(self).map_err(|e| PaymentError::Encoding(e.to_string()))?;
        Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
    }
}

/// Confirmed payment outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub signature: TxSignature,
    pub payer: Address,
    /// Native units transferred
    pub amount: f64,
}

pub struct PaymentSubmitter {
    ledger: Arc<dyn LedgerClient>,
    wallet: Arc<dyn WalletAdapter>,
    platform_wallet: Address,
    confirmation_timeout: Duration,
}

impl PaymentSubmitter {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        wallet: Arc<dyn WalletAdapter>,
        platform_wallet: Address,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            wallet,
            platform_wallet,
            confirmation_timeout,
        }
    }

    /// Build the unsigned payment transaction for `amount` native units
    pub async fn build_payment_transaction(
        &self,
        payer: &Address,
        amount: f64,
    ) -> Result<Transaction, PaymentError> {
        let recent_blockhash = self.ledger.get_latest_blockhash().await?;
        Ok(Transaction {
            fee_payer: payer.clone(),
            recent_blockhash,
            instructions: vec![TransferInstruction {
                from: payer.clone(),
                to: self.platform_wallet.clone(),
                base_units: to_base_units(amount),
            }],
        })
    }

    /// Sign, broadcast and await confirmation of a payment
    ///
    /// Funds movement is irreversible on success. Idempotency is the
    /// caller's responsibility: on `ConfirmationTimeout` the remediation
    /// is a reconciliation read, not a resubmit.
    pub async fn submit_payment(
        &self,
        payer: &Address,
        amount: f64,
    ) -> Result<PaymentReceipt, PaymentError> {
        let transaction = self.build_payment_transaction(payer, amount).await?;
        let receipt = self.wallet.sign_and_send_transaction(&transaction).await?;
        let signature = receipt.signature;
        info!("payment {} broadcast by {}", signature, payer);

        let confirmed = tokio::time::timeout(
            self.confirmation_timeout,
            self.ledger.confirm_transaction(&signature),
        )
        .await;

        match confirmed {
            Ok(Ok(true)) => Ok(PaymentReceipt {
                signature,
                payer: payer.clone(),
                amount,
            }),
            Ok(Ok(false)) => Err(PaymentError::TransactionFailed { signature }),
            Ok(Err(e)) => {
                // broadcast went out; an unreachable ledger leaves the
                // outcome unknown, same as a timeout
                warn!("confirmation read for {} failed: {}", signature, e);
                Err(PaymentError::ConfirmationTimeout {
                    signature,
                    waited: self.confirmation_timeout,
                })
            }
            Err(_elapsed) => Err(PaymentError::ConfirmationTimeout {
                signature,
                waited: self.confirmation_timeout,
            }),
        }
    }
}
