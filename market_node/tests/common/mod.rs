//! Shared fixtures: in-memory ledger and wallet fakes

// not every test binary uses every fixture
#![allow(dead_code)]

use async_trait::async_trait;
use dgpu_market_node::config::MarketConfig;
use dgpu_market_node::ledger::oracle::BalanceOracle;
use dgpu_market_node::ledger::{LedgerClient, LedgerError, ParsedTransaction, SignatureInfo, TransactionMeta};
use dgpu_market_node::payment::{PaymentSubmitter, Transaction};
use dgpu_market_node::rental::{RentalManager, RentalStore};
use dgpu_market_node::storage::{KvStorage, MemoryKvStorage};
use dgpu_market_node::types::{to_base_units, Address, ResourceKind, ResourceRef, TxSignature};
use dgpu_market_node::wallet::{SignedReceipt, WalletAdapter, WalletError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const PAYER: &str = "payer-address";

/// Enable log output for a test run (`RUST_LOG=debug cargo test -- --nocapture`)
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub signature: TxSignature,
    pub amount: f64,
    pub tagged: bool,
    pub block_time: i64,
}

/// Ledger fake with a scriptable balance and transaction history
pub struct MockLedger {
    balance: Mutex<Option<f64>>,
    history: Mutex<Vec<HistoryEntry>>,
    pub confirm_delay: Duration,
    pub confirm_ok: bool,
}

impl MockLedger {
    pub fn with_balance(balance: f64) -> Self {
        Self {
            balance: Mutex::new(Some(balance)),
            history: Mutex::new(Vec::new()),
            confirm_delay: Duration::ZERO,
            confirm_ok: true,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            balance: Mutex::new(None),
            history: Mutex::new(Vec::new()),
            confirm_delay: Duration::ZERO,
            confirm_ok: true,
        }
    }

    pub fn set_balance(&self, balance: f64) {
        *self.balance.lock().unwrap() = Some(balance);
    }

    pub fn push_history(&self, signature: &str, amount: f64, tagged: bool, block_time: i64) {
        self.history.lock().unwrap().push(HistoryEntry {
            signature: signature.to_string(),
            amount,
            tagged,
            block_time,
        });
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn get_balance(&self, _address: &Address) -> Result<f64, LedgerError> {
        let balance = *self.balance.lock().unwrap();
        balance.ok_or_else(|| LedgerError::Network("mock ledger down".to_string()))
    }

    async fn get_latest_blockhash(&self) -> Result<String, LedgerError> {
        Ok("mock-blockhash".to_string())
    }

    async fn send_transaction(&self, _tx_base64: &str) -> Result<TxSignature, LedgerError> {
        Ok("broadcast-sig".to_string())
    }

    async fn confirm_transaction(&self, _signature: &TxSignature) -> Result<bool, LedgerError> {
        if self.confirm_delay > Duration::ZERO {
            tokio::time::sleep(self.confirm_delay).await;
        }
        Ok(self.confirm_ok)
    }

    async fn get_signatures_for_address(
        &self,
        _address: &Address,
    ) -> Result<Vec<SignatureInfo>, LedgerError> {
        Ok(self
            .history
            .lock()
            .unwrap()
            .iter()
            .map(|e| SignatureInfo {
                signature: e.signature.clone(),
                block_time: Some(e.block_time),
                err: None,
            })
            .collect())
    }

    async fn get_parsed_transactions(
        &self,
        signatures: &[TxSignature],
    ) -> Result<Vec<Option<ParsedTransaction>>, LedgerError> {
        let history = self.history.lock().unwrap();
        Ok(signatures
            .iter()
            .map(|sig| {
                history.iter().find(|e| &e.signature == sig).map(|e| {
                    let units = to_base_units(e.amount);
                    let logs = if e.tagged {
                        vec!["Program log: GPU_RENTAL payment".to_string()]
                    } else {
                        vec!["Program log: transfer".to_string()]
                    };
                    ParsedTransaction {
                        signatures: vec![e.signature.clone()],
                        block_time: Some(e.block_time),
                        meta: Some(TransactionMeta {
                            pre_balances: vec![units + 1_000_000, 0],
                            post_balances: vec![1_000_000, units],
                            log_messages: Some(logs),
                            err: None,
                        }),
                    }
                })
            })
            .collect())
    }

    async fn request_airdrop(
        &self,
        _address: &Address,
        _amount: f64,
    ) -> Result<TxSignature, LedgerError> {
        Ok("airdrop-sig".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletMode {
    Approve,
    Unavailable,
    Reject,
}

/// Wallet fake issuing sequential signatures
pub struct MockWallet {
    mode: WalletMode,
    sign_calls: AtomicU32,
    /// When set, signing blocks until `release` is notified
    gate: Option<Arc<Notify>>,
}

impl MockWallet {
    pub fn approving() -> Self {
        Self {
            mode: WalletMode::Approve,
            sign_calls: AtomicU32::new(0),
            gate: None,
        }
    }

    pub fn with_mode(mode: WalletMode) -> Self {
        Self {
            mode,
            sign_calls: AtomicU32::new(0),
            gate: None,
        }
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            mode: WalletMode::Approve,
            sign_calls: AtomicU32::new(0),
            gate: Some(gate),
        }
    }

    pub fn sign_calls(&self) -> u32 {
        self.sign_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletAdapter for MockWallet {
    async fn connect(&self) -> Result<Address, WalletError> {
        match self.mode {
            WalletMode::Unavailable => Err(WalletError::Unavailable),
            _ => Ok(PAYER.to_string()),
        }
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        Ok(())
    }

    async fn sign_and_send_transaction(
        &self,
        _transaction: &Transaction,
    ) -> Result<SignedReceipt, WalletError> {
        match self.mode {
            WalletMode::Unavailable => return Err(WalletError::Unavailable),
            WalletMode::Reject => return Err(WalletError::UserRejected),
            WalletMode::Approve => {}
        }
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let n = self.sign_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SignedReceipt {
            signature: format!("sig{}", n),
        })
    }
}

pub fn test_config() -> MarketConfig {
    MarketConfig {
        confirmation_timeout: Duration::from_millis(200),
        timer_tick_interval: Duration::from_millis(20),
        ..MarketConfig::default()
    }
}

pub fn gpu(price_per_hour: f64) -> ResourceRef {
    ResourceRef {
        id: "gpu-1".to_string(),
        name: "RTX 4090".to_string(),
        kind: ResourceKind::Gpu,
        price_per_hour,
        vram_gb: 24,
        performance: 100,
    }
}

pub struct Harness {
    pub manager: Arc<RentalManager>,
    pub ledger: Arc<MockLedger>,
    pub wallet: Arc<MockWallet>,
}

pub fn harness(config: MarketConfig, ledger: MockLedger, wallet: MockWallet) -> Harness {
    let ledger = Arc::new(ledger);
    let wallet = Arc::new(wallet);
    let ledger_dyn: Arc<dyn LedgerClient> = ledger.clone();
    let storage: Arc<dyn KvStorage> = Arc::new(MemoryKvStorage::new());
    let store = Arc::new(RentalStore::new(storage, ledger_dyn.clone(), &config));
    let oracle = BalanceOracle::new(ledger_dyn.clone());
    let submitter = PaymentSubmitter::new(
        ledger_dyn,
        wallet.clone(),
        config.platform_wallet.clone(),
        config.confirmation_timeout,
    );
    let manager = Arc::new(RentalManager::new(oracle, submitter, store, &config));
    Harness {
        manager,
        ledger,
        wallet,
    }
}
