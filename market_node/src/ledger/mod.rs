//! Remote ledger access: JSON-RPC client and the balance oracle

pub mod oracle;
pub mod rpc;

pub use oracle::{BalanceOracle, BalanceSubscription};
pub use rpc::{
    LedgerClient, LedgerError, LedgerRpcClient, ParsedTransaction, SignatureInfo, TransactionMeta,
};
