//! Runtime configuration for the marketplace client core

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Platform treasury that receives rental payments (devnet)
pub const PLATFORM_WALLET: &str = "DZKzDMbq3HpwAqP3H9UwKqpgUteLFxGKHVVuFjqoqkXk";

/// Marketplace client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// JSON-RPC endpoint of the remote ledger
    pub rpc_url: String,
    /// Address receiving rental payments
    pub platform_wallet: String,
    /// Bounded wait for payment confirmation
    pub confirmation_timeout: Duration,
    /// Balance oracle polling interval
    pub balance_poll_interval: Duration,
    /// Rental timer tick interval
    pub timer_tick_interval: Duration,
    /// Maximum rentals kept before eviction kicks in
    pub max_rentals: usize,
    /// Record count retained when storage degrades
    pub degraded_keep_records: usize,
    /// History window retained when storage degrades
    pub degraded_keep_window: Duration,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.devnet.solana.com".to_string(),
            platform_wallet: PLATFORM_WALLET.to_string(),
            confirmation_timeout: Duration::from_secs(30),
            balance_poll_interval: Duration::from_secs(10),
            timer_tick_interval: Duration::from_secs(1),
            max_rentals: 100,
            degraded_keep_records: 50,
            degraded_keep_window: Duration::from_secs(30 * 24 * 3600), // 30 days
        }
    }
}

impl MarketConfig {
    /// Build a config from the environment, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("DGPU_RPC_URL") {
            config.rpc_url = url;
        }
        if let Ok(wallet) = std::env::var("DGPU_PLATFORM_WALLET") {
            config.platform_wallet = wallet;
        }
        if let Ok(secs) = std::env::var("DGPU_CONFIRM_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                config.confirmation_timeout = Duration::from_secs(secs);
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MarketConfig::default();
        assert_eq!(config.max_rentals, 100);
        assert_eq!(config.confirmation_timeout, Duration::from_secs(30));
        assert_eq!(config.platform_wallet, PLATFORM_WALLET);
    }
}
