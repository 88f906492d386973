use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use dashmap::DashMap;

use super::CacheStore;
use crate::core::GatewayResult;

/// Writes between two sweeps of expired entries.
const SWEEP_EVERY: usize = 256;

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// In-process store. Expired entries are dropped when read and swept out
/// every [`SWEEP_EVERY`] writes.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sweep(&self) {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        log::debug!(
            "memory cache sweep dropped {} expired entries",
            before.saturating_sub(self.entries.len())
        );
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> GatewayResult<Option<Vec<u8>>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.value.clone()));
            }
        }
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> GatewayResult<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_EVERY == 0 {
            self.sweep();
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> GatewayResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn ping(&self) -> GatewayResult<()> {
        Ok(())
    }
}
