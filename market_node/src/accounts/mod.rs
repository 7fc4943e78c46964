//! Account profiles: persisted per-address identity, reputation and
//! activity history

use crate::storage::KvStorage;
use crate::types::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub mod reputation;

pub use reputation::{calculate_level, calculate_score, ReputationLevel, BADGES};

const ACCOUNT_KEY_PREFIX: &str = "account:";

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Account {0} not found")]
    NotFound(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("Profile encoding failed: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reputation {
    pub score: u32,
    pub level: ReputationLevel,
    pub total_rentals: u32,
    pub total_listed: u32,
    pub reviews: u32,
    pub success_rate: f64,
}

impl Default for Reputation {
    fn default() -> Self {
        Self {
            score: 0,
            level: ReputationLevel::Newcomer,
            total_rentals: 0,
            total_listed: 0,
            reviews: 0,
            success_rate: 100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub earned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Rental,
    Review,
    Listing,
    Badge,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEntry {
    pub id: String,
    pub kind: ActivityKind,
    pub timestamp: DateTime<Utc>,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AccountTotals {
    pub total_spent: f64,
    pub total_earned: f64,
    pub average_rating: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountProfile {
    pub address: Address,
    pub username: Option<String>,
    pub joined_at: DateTime<Utc>,
    pub reputation: Reputation,
    pub badges: Vec<Badge>,
    pub stats: AccountTotals,
    pub activity: Vec<ActivityEntry>,
}

impl AccountProfile {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            username: None,
            joined_at: Utc::now(),
            reputation: Reputation::default(),
            badges: Vec::new(),
            stats: AccountTotals::default(),
            activity: Vec::new(),
        }
    }

    fn push_activity(&mut self, kind: ActivityKind, detail: String) {
        self.activity.insert(
            0,
            ActivityEntry {
                id: Uuid::new_v4().to_string(),
                kind,
                timestamp: Utc::now(),
                detail,
            },
        );
    }

    /// Fold a completed rental payment into reputation and totals
    pub fn record_rental(&mut self, amount: f64) {
        self.reputation.total_rentals += 1;
        self.stats.total_spent += amount;
        self.push_activity(ActivityKind::Rental, format!("rented for {}", amount));
        self.refresh_reputation();
    }

    pub fn record_listing(&mut self) {
        self.reputation.total_listed += 1;
        self.push_activity(ActivityKind::Listing, "listed a resource".to_string());
        self.refresh_reputation();
    }

    pub fn record_review(&mut self, rating: f64) {
        self.reputation.reviews += 1;
        let total =
            self.stats.average_rating * (self.reputation.reviews - 1) as f64 + rating;
        self.stats.average_rating = total / self.reputation.reviews as f64;
        self.push_activity(ActivityKind::Review, format!("review {:.1}", rating));
        self.refresh_reputation();
    }

    fn refresh_reputation(&mut self) {
        self.reputation.score = calculate_score(self);
        self.reputation.level = calculate_level(self.reputation.score);

        for badge in reputation::earned_badges(self) {
            self.push_activity(ActivityKind::Badge, badge.name.clone());
            self.badges.push(badge);
        }
    }
}

/// Persisted accounts table keyed by address
pub struct AccountStore {
    storage: Arc<dyn KvStorage>,
}

impl AccountStore {
    pub fn new(storage: Arc<dyn KvStorage>) -> Self {
        Self { storage }
    }

    fn key(address: &Address) -> String {
        format!("{}{}", ACCOUNT_KEY_PREFIX, address)
    }

    /// Fetch the profile for an address, creating it on first sight
    pub async fn initialize(&self, address: &Address) -> Result<AccountProfile, AccountError> {
        if let Some(profile) = self.get(address).await? {
            return Ok(profile);
        }
        let profile = AccountProfile::new(address.clone());
        self.save(&profile).await?;
        Ok(profile)
    }

    pub async fn get(&self, address: &Address) -> Result<Option<AccountProfile>, AccountError> {
        match self.storage.get(&Self::key(address)).await? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes)
                    .map_err(|e| AccountError::Serialization(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    pub async fn save(&self, profile: &AccountProfile) -> Result<(), AccountError> {
        let bytes = serde_json::to_vec(profile)
            .map_err(|e| AccountError::Serialization(e.to_string()))?;
        self.storage.put(&Self::key(&profile.address), &bytes).await?;
        Ok(())
    }

    pub async fn all(&self) -> Result<Vec<AccountProfile>, AccountError> {
        let keys = self.storage.list_keys(ACCOUNT_KEY_PREFIX).await?;
        let mut profiles = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(bytes) = self.storage.get(&key).await? {
                profiles.push(
                    serde_json::from_slice(&bytes)
                        .map_err(|e| AccountError::Serialization(e.to_string()))?,
                );
            }
        }
        Ok(profiles)
    }

    /// Case-insensitive search over addresses and usernames
    pub async fn search(&self, query: &str) -> Result<Vec<AccountProfile>, AccountError> {
        let query = query.to_lowercase();
        let mut profiles = self.all().await?;
        profiles.retain(|p| {
            p.address.to_lowercase().contains(&query)
                || p.username
                    .as_ref()
                    .map(|u| u.to_lowercase().contains(&query))
                    .unwrap_or(false)
        });
        Ok(profiles)
    }
}
