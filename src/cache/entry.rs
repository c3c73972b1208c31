use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Pure function applied to a cached value by an optimistic layer
pub type Speculation = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Monotonic per-key fetch tag; responses carrying an older tag are dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub(crate) u64);

impl Generation {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// One transaction's speculative write on one key
#[derive(Clone)]
pub(crate) struct Layer {
    pub tx_id: Uuid,
    pub apply: Speculation,
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer").field("tx_id", &self.tx_id).finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct CacheEntry {
    /// Last server-sourced value
    pub confirmed: Option<Value>,
    /// Open optimistic layers in begin order
    pub layers: Vec<Layer>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub stale: bool,
    pub generation: u64,
}

impl CacheEntry {
    /// Confirmed value with every open layer applied in begin order
    pub fn observed(&self) -> Option<Value> {
        let base = self.confirmed.as_ref()?;
        if self.layers.is_empty() {
            return Some(base.clone());
        }
        Some(self.layers.iter().fold(base.clone(), |value, layer| (layer.apply)(&value)))
    }

    pub fn bump_generation(&mut self) -> Generation {
        self.generation += 1;
        Generation(self.generation)
    }

    pub fn is_stale(&self, stale_time: chrono::Duration, now: DateTime<Utc>) -> bool {
        if self.stale {
            return true;
        }
        match self.fetched_at {
            Some(fetched_at) => now - fetched_at >= stale_time,
            None => true,
        }
    }

    /// Drop `tx_id`'s layer and write its server form straight into the
    /// confirmed value. Confirmations land in arrival order; layers still
    /// open stay applied on top.
    pub fn confirm(&mut self, tx_id: Uuid, confirm: &Speculation) -> bool {
        let Some(index) = self.layers.iter().position(|layer| layer.tx_id == tx_id) else {
            return false;
        };
        self.layers.remove(index);
        if let Some(confirmed) = self.confirmed.take() {
            self.confirmed = Some(confirm(&confirmed));
        }
        self.fetched_at = Some(Utc::now());
        self.stale = false;
        true
    }
}

/// Point-in-time read of an entry
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue {
    pub value: Value,
    pub fetched_at: Option<DateTime<Utc>>,
    pub stale: bool,
    pub pending_mutations: usize,
}
