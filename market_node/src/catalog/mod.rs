//! Rentable-resource catalog: seed listings plus a subscribable store
//!
//! The store replaces an ad hoc module-level cache with an explicit
//! object owning its data and change notifications; subscribers receive
//! the full listing snapshot on every mutation and unsubscribe by
//! dropping the receiver.

use crate::types::{ResourceKind, ResourceRef};
use lazy_static::lazy_static;
use std::sync::RwLock;
use tokio::sync::broadcast;
use uuid::Uuid;

lazy_static! {
    /// Built-in GPU listings
    pub static ref SEED_GPUS: Vec<ResourceRef> = vec![
        ResourceRef {
            id: "1".to_string(),
            name: "RTX 4090".to_string(),
            kind: ResourceKind::Gpu,
            price_per_hour: 0.05,
            vram_gb: 24,
            performance: 100,
        },
        ResourceRef {
            id: "2".to_string(),
            name: "RTX 4080".to_string(),
            kind: ResourceKind::Gpu,
            price_per_hour: 0.035,
            vram_gb: 16,
            performance: 85,
        },
        ResourceRef {
            id: "3".to_string(),
            name: "RTX 3080".to_string(),
            kind: ResourceKind::Gpu,
            price_per_hour: 0.025,
            vram_gb: 10,
            performance: 70,
        },
    ];

    /// Built-in AI model listings
    pub static ref SEED_AI_MODELS: Vec<ResourceRef> = vec![
        ResourceRef {
            id: "gpt-4".to_string(),
            name: "GPT-4 Training".to_string(),
            kind: ResourceKind::AiModel,
            price_per_hour: 0.08,
            vram_gb: 48,
            performance: 100,
        },
        ResourceRef {
            id: "stable-xl".to_string(),
            name: "Stable Diffusion XL".to_string(),
            kind: ResourceKind::AiModel,
            price_per_hour: 0.06,
            vram_gb: 24,
            performance: 90,
        },
        ResourceRef {
            id: "llama-2".to_string(),
            name: "Llama 2 70B".to_string(),
            kind: ResourceKind::AiModel,
            price_per_hour: 0.05,
            vram_gb: 32,
            performance: 85,
        },
    ];
}

/// In-memory listing store with change notifications
pub struct CatalogStore {
    listings: RwLock<Vec<ResourceRef>>,
    events: broadcast::Sender<Vec<ResourceRef>>,
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::with_seed()
    }
}

impl CatalogStore {
    pub fn empty() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            listings: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Store preloaded with the built-in GPU and AI-model listings
    pub fn with_seed() -> Self {
        let store = Self::empty();
        {
            let mut listings = store.listings.write().unwrap();
            listings.extend(SEED_GPUS.iter().cloned());
            listings.extend(SEED_AI_MODELS.iter().cloned());
        }
        store
    }

    pub fn list(&self) -> Vec<ResourceRef> {
        self.listings.read().unwrap().clone()
    }

    pub fn list_kind(&self, kind: ResourceKind) -> Vec<ResourceRef> {
        self.listings
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<ResourceRef> {
        self.listings
            .read()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Subscribe to listing snapshots; drop the receiver to unsubscribe
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<ResourceRef>> {
        self.events.subscribe()
    }

    /// Add a listing, assigning a fresh id
    pub fn add(&self, mut resource: ResourceRef) -> ResourceRef {
        resource.id = Uuid::new_v4().to_string();
        let snapshot = {
            let mut listings = self.listings.write().unwrap();
            listings.push(resource.clone());
            listings.clone()
        };
        let _ = self.events.send(snapshot);
        resource
    }

    pub fn remove(&self, id: &str) -> bool {
        let (removed, snapshot) = {
            let mut listings = self.listings.write().unwrap();
            let before = listings.len();
            listings.retain(|r| r.id != id);
            (listings.len() != before, listings.clone())
        };
        if removed {
            let _ = self.events.send(snapshot);
        }
        removed
    }
}
