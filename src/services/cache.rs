// src/services/cache.rs
use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Time-bounded store of serialized results.
///
/// Entries are whole JSON documents; a `set` replaces the previous value for
/// the key in one step. Expiry is checked lazily on `get`, and `purge_expired`
/// can be run periodically to release memory.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str, now: DateTime<Utc>) -> Option<T> {
        let raw = {
            let entries = self.entries.read().ok()?;
            let entry = entries.get(key)?;
            if now > entry.expires_at {
                debug!("Cache entry {} expired at {}", key, entry.expires_at);
                return None;
            }
            entry.value.clone()
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Discarding unreadable cache entry {}: {}", key, e);
                None
            }
        }
    }

    pub fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
        now: DateTime<Utc>,
    ) -> Result<(), serde_json::Error> {
        let entry = CacheEntry {
            value: serde_json::to_string(value)?,
            expires_at: expiry(now, ttl_seconds),
        };
        match self.entries.write() {
            Ok(mut entries) => {
                entries.insert(key.to_string(), entry);
            }
            Err(_) => warn!("Cache lock poisoned, not storing {}", key),
        }
        Ok(())
    }

    /// Drops expired entries and returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, entry| now <= entry.expires_at);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `now + ttl`, saturating at the latest representable instant.
fn expiry(now: DateTime<Utc>, ttl_seconds: u64) -> DateTime<Utc> {
    Duration::from_std(std::time::Duration::from_secs(ttl_seconds))
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub mod keys {
    use crate::models::AgentId;

    /// Whole current-month report: profile plus that month's metrics.
    pub fn current_performance(agent_id: AgentId, year: i32, month: u32) -> String {
        format!("performance_{}_{}_{}", agent_id, year, month)
    }

    /// One month of metrics on the year-to-date path.
    pub fn monthly_performance(agent_id: AgentId, year: i32, month: u32) -> String {
        format!("performance_month_{}_{}_{}", agent_id, year, month)
    }

    pub fn ranking(agent_id: AgentId) -> String {
        format!("ranking_{}", agent_id)
    }
}
