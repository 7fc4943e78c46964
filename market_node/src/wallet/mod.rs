//! Injected wallet capability and its connection state machine
//!
//! The marketplace never touches key material: signing and broadcast are
//! delegated to an externally injected [`WalletAdapter`], typically a
//! browser wallet extension. Connection state is tracked as an explicit
//! finite-state machine with typed transition events instead of ad hoc
//! event-name strings.

use crate::payment::Transaction;
use crate::types::{Address, TxSignature};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Error, Debug, Clone)]
pub enum WalletError {
    #[error("No wallet extension available")]
    Unavailable,

    #[error("User rejected the signing request")]
    UserRejected,

    #[error("Invalid wallet state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Wallet failure: {0}")]
    Other(String),
}

/// Result of a successful sign-and-broadcast
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedReceipt {
    pub signature: TxSignature,
}

/// Externally injected signing capability
#[async_trait]
pub trait WalletAdapter: Send + Sync {
    /// Connect and return the active account address
    async fn connect(&self) -> Result<Address, WalletError>;
    async fn disconnect(&self) -> Result<(), WalletError>;
    /// Sign the unsigned transaction and broadcast it in one step
    async fn sign_and_send_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<SignedReceipt, WalletError>;
}

/// Connection lifecycle of the injected wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletState {
    Disconnected,
    Connecting,
    Connected(Address),
}

impl WalletState {
    fn name(&self) -> &'static str {
        match self {
            WalletState::Disconnected => "disconnected",
            WalletState::Connecting => "connecting",
            WalletState::Connected(_) => "connected",
        }
    }
}

/// Typed transition events published to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    Connected(Address),
    AccountChanged(Address),
    Disconnected,
}

/// Tracks wallet connection state and fans out transition events
pub struct WalletNotifier {
    state: RwLock<WalletState>,
    events: broadcast::Sender<WalletEvent>,
}

impl Default for WalletNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletNotifier {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            state: RwLock::new(WalletState::Disconnected),
            events,
        }
    }

    pub fn state(&self) -> WalletState {
        self.state.read().unwrap().clone()
    }

    /// Subscribe to transition events; drop the receiver to unsubscribe
    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }

    /// Disconnected -> Connecting
    pub fn begin_connect(&self) -> Result<(), WalletError> {
        let mut state = self.state.write().unwrap();
        match *state {
            WalletState::Disconnected => {
                *state = WalletState::Connecting;
                Ok(())
            }
            ref from => Err(WalletError::InvalidTransition {
                from: from.name().to_string(),
                to: "connecting".to_string(),
            }),
        }
    }

    /// Connecting -> Connected
    pub fn complete_connect(&self, address: Address) -> Result<(), WalletError> {
        let mut state = self.state.write().unwrap();
        match *state {
            WalletState::Connecting => {
                *state = WalletState::Connected(address.clone());
                let _ = self.events.send(WalletEvent::Connected(address));
                Ok(())
            }
            ref from => Err(WalletError::InvalidTransition {
                from: from.name().to_string(),
                to: "connected".to_string(),
            }),
        }
    }

    /// Connected -> Connected with a different active account
    pub fn account_changed(&self, address: Address) -> Result<(), WalletError> {
        let mut state = self.state.write().unwrap();
        match *state {
            WalletState::Connected(_) => {
                *state = WalletState::Connected(address.clone());
                let _ = self.events.send(WalletEvent::AccountChanged(address));
                Ok(())
            }
            ref from => Err(WalletError::InvalidTransition {
                from: from.name().to_string(),
                to: "connected".to_string(),
            }),
        }
    }

    /// Any state -> Disconnected (also cancels a pending connect)
    pub fn disconnected(&self) {
        let mut state = self.state.write().unwrap();
        if *state != WalletState::Disconnected {
            *state = WalletState::Disconnected;
            let _ = self.events.send(WalletEvent::Disconnected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_flow() {
        let notifier = WalletNotifier::new();
        let mut events = notifier.subscribe();

        notifier.begin_connect().unwrap();
        assert_eq!(notifier.state(), WalletState::Connecting);
        notifier.complete_connect("addr1".to_string()).unwrap();
        assert_eq!(notifier.state(), WalletState::Connected("addr1".to_string()));

        assert_eq!(
            events.try_recv().unwrap(),
            WalletEvent::Connected("addr1".to_string())
        );
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        let notifier = WalletNotifier::new();
        // cannot complete a connect that never began
        assert!(notifier.complete_connect("addr".to_string()).is_err());
        // cannot change account while disconnected
        assert!(notifier.account_changed("addr".to_string()).is_err());
        // double begin_connect is rejected
        notifier.begin_connect().unwrap();
        assert!(notifier.begin_connect().is_err());
    }

    #[test]
    fn test_disconnect_from_any_state() {
        let notifier = WalletNotifier::new();
        notifier.begin_connect().unwrap();
        notifier.disconnected();
        assert_eq!(notifier.state(), WalletState::Disconnected);
        // idempotent: no event when already disconnected
        let mut events = notifier.subscribe();
        notifier.disconnected();
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_account_changed_event() {
        let notifier = WalletNotifier::new();
        notifier.begin_connect().unwrap();
        notifier.complete_connect("addr1".to_string()).unwrap();
        let mut events = notifier.subscribe();
        notifier.account_changed("addr2".to_string()).unwrap();
        assert_eq!(
            events.try_recv().unwrap(),
            WalletEvent::AccountChanged("addr2".to_string())
        );
    }
}
