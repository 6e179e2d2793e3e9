//! Cache for assembled system prompts.
//!
//! Persona and policy layers change rarely relative to turn volume, so
//! the assembled prompt is cached under a digest of its four inputs.
//! Bounded by entry count and age; eviction drops the oldest insert.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

struct CacheEntry {
    value: String,
    inserted_at: Instant,
}

pub struct PromptCache {
    max_items: usize,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Default for PromptCache {
    fn default() -> Self {
        Self::new(256, Duration::from_secs(3600))
    }
}

impl PromptCache {
    pub fn new(max_items: usize, ttl: Duration) -> Self {
        Self {
            max_items,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn key(core: &str, user: &str, server: &str, policy: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(core.as_bytes());
        hasher.update(b"|");
        hasher.update(user.as_bytes());
        hasher.update(b"|");
        hasher.update(server.as_bytes());
        hasher.update(b"|");
        hasher.update(policy.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, core: &str, user: &str, server: &str, policy: &str) -> Option<String> {
        let key = Self::key(core, user, server, policy);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, core: &str, user: &str, server: &str, policy: &str, value: String) {
        let key = Self::key(core, user, server, policy);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() >= self.max_items && !entries.contains_key(&key) {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }
        entries.insert(key, CacheEntry { value, inserted_at: Instant::now() });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
