//! JSON-RPC 2.0 client for the remote ledger
//!
//! Covers the handful of methods the marketplace needs: balance reads,
//! blockhash fetch, transaction broadcast/confirmation and the signature
//! history queries backing reconciliation.

use crate::types::{from_base_units, Address, TxSignature};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger unreachable: {0}")]
    Network(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Malformed RPC response: {0}")]
    InvalidResponse(String),
}

/// Signature entry from `getSignaturesForAddress`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub signature: TxSignature,
    #[serde(rename = "blockTime")]
    pub block_time: Option<i64>,
    pub err: Option<Value>,
}

/// Balance/log metadata of a parsed transaction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionMeta {
    #[serde(rename = "preBalances", default)]
    pub pre_balances: Vec<u64>,
    #[serde(rename = "postBalances", default)]
    pub post_balances: Vec<u64>,
    #[serde(rename = "logMessages", default)]
    pub log_messages: Option<Vec<String>>,
    #[serde(default)]
    pub err: Option<Value>,
}

/// Parsed transaction as returned by `getParsedTransactions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedTransaction {
    #[serde(default)]
    pub signatures: Vec<TxSignature>,
    #[serde(rename = "blockTime")]
    pub block_time: Option<i64>,
    pub meta: Option<TransactionMeta>,
}

impl ParsedTransaction {
    /// Whether any log line carries the given tag
    pub fn has_log_tag(&self, tag: &str) -> bool {
        self.meta
            .as_ref()
            .and_then(|m| m.log_messages.as_ref())
            .map(|logs| logs.iter().any(|msg| msg.contains(tag)))
            .unwrap_or(false)
    }

    /// Native units the fee payer spent in this transaction (0 if unknown)
    pub fn payer_spent(&self) -> f64 {
        let meta = match &self.meta {
            Some(meta) => meta,
            None => return 0.0,
        };
        let pre = meta.pre_balances.first().copied().unwrap_or(0);
        let post = meta.post_balances.first().copied().unwrap_or(0);
        from_base_units(pre.saturating_sub(post))
    }
}

/// Ledger operations the marketplace core depends on
///
/// The HTTP client below is the production implementation; tests inject
/// in-memory fakes through the same trait.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Spendable balance in native units
    async fn get_balance(&self, address: &Address) -> Result<f64, LedgerError>;
    /// Fresh anti-replay token for transaction construction
    async fn get_latest_blockhash(&self) -> Result<String, LedgerError>;
    /// Broadcast a base64-encoded signed transaction envelope
    async fn send_transaction(&self, tx_base64: &str) -> Result<TxSignature, LedgerError>;
    /// Wait for network confirmation of a signature
    async fn confirm_transaction(&self, signature: &TxSignature) -> Result<bool, LedgerError>;
    async fn get_signatures_for_address(
        &self,
        address: &Address,
    ) -> Result<Vec<SignatureInfo>, LedgerError>;
    async fn get_parsed_transactions(
        &self,
        signatures: &[TxSignature],
    ) -> Result<Vec<Option<ParsedTransaction>>, LedgerError>;
    /// Devnet faucet helper
    async fn request_airdrop(
        &self,
        address: &Address,
        amount: f64,
    ) -> Result<TxSignature, LedgerError>;
}

/// HTTP JSON-RPC implementation of [`LedgerClient`]
pub struct LedgerRpcClient {
    rpc_url: String,
    client: reqwest::Client,
}

impl LedgerRpcClient {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LedgerError::Network(format!("{} failed: {}", method, e)))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| LedgerError::Network(format!("{} response: {}", method, e)))?;

        if let Some(err) = body.get("error") {
            return Err(LedgerError::Rpc {
                code: err.get("code").and_then(Value::as_i64).unwrap_or(-32603),
                message: err
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
            });
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| LedgerError::InvalidResponse(format!("{}: no result field", method)))
    }
}

#[async_trait]
impl LedgerClient for LedgerRpcClient {
    async fn get_balance(&self, address: &Address) -> Result<f64, LedgerError> {
        let result = self
            .call(
                "getBalance",
                json!([address, {"commitment": "confirmed"}]),
            )
            .await?;
        let units = result
            .get("value")
            .and_then(Value::as_u64)
            .ok_or_else(|| LedgerError::InvalidResponse("getBalance: no value".to_string()))?;
        Ok(from_base_units(units))
    }

    async fn get_latest_blockhash(&self) -> Result<String, LedgerError> {
        let result = self
            .call("getLatestBlockhash", json!([{"commitment": "confirmed"}]))
            .await?;
        result
            .pointer("/value/blockhash")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                LedgerError::InvalidResponse("getLatestBlockhash: no blockhash".to_string())
            })
    }

    async fn send_transaction(&self, tx_base64: &str) -> Result<TxSignature, LedgerError> {
        let result = self
            .call(
                "sendTransaction",
                json!([tx_base64, {"encoding": "base64"}]),
            )
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LedgerError::InvalidResponse("sendTransaction: no signature".to_string()))
    }

    async fn confirm_transaction(&self, signature: &TxSignature) -> Result<bool, LedgerError> {
        let result = self
            .call(
                "confirmTransaction",
                json!([signature, {"commitment": "confirmed"}]),
            )
            .await?;
        // confirmed when the network reports no execution error
        Ok(result.pointer("/value/err").map_or(true, Value::is_null))
    }

    async fn get_signatures_for_address(
        &self,
        address: &Address,
    ) -> Result<Vec<SignatureInfo>, LedgerError> {
        let result = self
            .call("getSignaturesForAddress", json!([address]))
            .await?;
        serde_json::from_value(result)
            .map_err(|e| LedgerError::InvalidResponse(format!("getSignaturesForAddress: {}", e)))
    }

    async fn get_parsed_transactions(
        &self,
        signatures: &[TxSignature],
    ) -> Result<Vec<Option<ParsedTransaction>>, LedgerError> {
        let mut transactions = Vec::with_capacity(signatures.len());
        for signature in signatures {
            let result = self
                .call(
                    "getParsedTransaction",
                    json!([signature, {"commitment": "confirmed"}]),
                )
                .await?;
            if result.is_null() {
                transactions.push(None);
                continue;
            }
            let parsed = serde_json::from_value(result).map_err(|e| {
                LedgerError::InvalidResponse(format!("getParsedTransaction: {}", e))
            })?;
            transactions.push(Some(parsed));
        }
        Ok(transactions)
    }

    async fn request_airdrop(
        &self,
        address: &Address,
        amount: f64,
    ) -> Result<TxSignature, LedgerError> {
        let units = crate::types::to_base_units(amount);
        let result = self.call("requestAirdrop", json!([address, units])).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LedgerError::InvalidResponse("requestAirdrop: no signature".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payer_spent_from_balance_delta() {
        let tx = ParsedTransaction {
            signatures: vec!["sig1".to_string()],
            block_time: Some(1_700_000_000),
            meta: Some(TransactionMeta {
                pre_balances: vec![5_000_000_000, 0],
                post_balances: vec![3_000_000_000, 2_000_000_000],
                log_messages: Some(vec!["Program log: GPU_RENTAL payment".to_string()]),
                err: None,
            }),
        };
        assert!((tx.payer_spent() - 2.0).abs() < 1e-9);
        assert!(tx.has_log_tag("GPU_RENTAL"));
        assert!(!tx.has_log_tag("OTHER"));
    }

    #[test]
    fn test_payer_spent_without_meta() {
        let tx = ParsedTransaction {
            signatures: vec![],
            block_time: None,
            meta: None,
        };
        assert_eq!(tx.payer_spent(), 0.0);
        assert!(!tx.has_log_tag("GPU_RENTAL"));
    }
}
