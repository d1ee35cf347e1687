//! Key/value storage for encoded meal images.
//!
//! Every backend has a byte capacity (`len(key) + len(payload)` per entry)
//! and an explicit [`OverflowPolicy`]. There is no expiry.

use async_trait::async_trait;
use clap::ValueEnum;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::debug;

pub const DEFAULT_CAPACITY_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Serialize, ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Refuse the incoming write; existing entries stay.
    #[default]
    Reject,
    /// Drop the oldest writes until the incoming entry fits.
    EvictOldest,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("image cache full: entry needs {needed} bytes, {available} of {capacity} available")]
    CapacityExceeded {
        needed: u64,
        available: u64,
        capacity: u64,
    },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Backend(e.into())
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct StoreStats {
    pub backend: &'static str,
    pub entries: u64,
    pub bytes: u64,
    pub capacity: u64,
    pub policy: OverflowPolicy,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// # Errors
    ///
    /// Backend failures only; a missing key is `Ok(None)`.
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// # Errors
    ///
    /// [`StoreError::CapacityExceeded`] when the overflow policy refuses the write.
    async fn put(&self, key: &str, payload: &str) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// Backend failures.
    async fn stats(&self) -> anyhow::Result<StoreStats>;
}

fn entry_size(key: &str, payload: &str) -> u64 {
    (key.len() + payload.len()) as u64
}

/* ---------- In-memory ---------- */

#[derive(Default)]
struct MemoryInner {
    entries: HashMap<String, String>,
    order: VecDeque<String>,
    bytes: u64,
}

impl MemoryInner {
    fn remove(&mut self, key: &str) {
        if let Some(old) = self.entries.remove(key) {
            self.bytes -= entry_size(key, &old);
            self.order.retain(|k| k != key);
        }
    }
}

pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    capacity: u64,
    policy: OverflowPolicy,
}

impl MemoryStore {
    #[must_use]
    pub fn new(capacity: u64, policy: OverflowPolicy) -> Self {
        Self {
            inner: Mutex::new(MemoryInner::default()),
            capacity,
            policy,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // a panic mid-update leaves sizes consistent enough to keep serving
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY_BYTES, OverflowPolicy::Reject)
    }
}

#[async_trait]
impl ImageStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.lock().entries.get(key).cloned())
    }

    async fn put(&self, key: &str, payload: &str) -> Result<(), StoreError> {
        let needed = entry_size(key, payload);
        let mut inner = self.lock();

        let existing = inner
            .entries
            .get(key)
            .map_or(0, |old| entry_size(key, old));
        let used = inner.bytes - existing;

        if needed > self.capacity {
            return Err(StoreError::CapacityExceeded {
                needed,
                available: self.capacity.saturating_sub(used),
                capacity: self.capacity,
            });
        }

        if used + needed > self.capacity {
            match self.policy {
                OverflowPolicy::Reject => {
                    return Err(StoreError::CapacityExceeded {
                        needed,
                        available: self.capacity.saturating_sub(used),
                        capacity: self.capacity,
                    });
                }
                OverflowPolicy::EvictOldest => {
                    inner.remove(key);
                    while inner.bytes + needed > self.capacity {
                        let Some(oldest) = inner.order.front().cloned() else {
                            break;
                        };
                        debug!(key = %oldest, "evicting cached image");
                        inner.remove(&oldest);
                    }
                }
            }
        }

        inner.remove(key);
        inner.bytes += needed;
        inner.order.push_back(key.to_string());
        inner.entries.insert(key.to_string(), payload.to_string());
        Ok(())
    }

    async fn stats(&self) -> anyhow::Result<StoreStats> {
        let inner = self.lock();
        Ok(StoreStats {
            backend: "memory",
            entries: inner.entries.len() as u64,
            bytes: inner.bytes,
            capacity: self.capacity,
            policy: self.policy,
        })
    }
}

/* ---------- SQLite ---------- */

pub struct SqliteStore {
    pool: SqlitePool,
    capacity: u64,
    policy: OverflowPolicy,
}

impl SqliteStore {
    #[must_use]
    pub const fn new(pool: SqlitePool, capacity: u64, policy: OverflowPolicy) -> Self {
        Self {
            pool,
            capacity,
            policy,
        }
    }
}

fn as_u64(v: i64) -> u64 {
    u64::try_from(v).unwrap_or_default()
}

fn as_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

#[async_trait]
impl ImageStore for SqliteStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let payload: Option<String> =
            sqlx::query_scalar(r"SELECT payload FROM image_cache WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(payload)
    }

    async fn put(&self, key: &str, payload: &str) -> Result<(), StoreError> {
        let needed = entry_size(key, payload);
        let mut tx = self.pool.begin().await?;

        let used: i64 = sqlx::query_scalar(
            r"SELECT COALESCE(SUM(bytes), 0) FROM image_cache WHERE key <> ?",
        )
        .bind(key)
        .fetch_one(&mut *tx)
        .await?;
        let mut used = as_u64(used);

        let refuse = |used: u64| StoreError::CapacityExceeded {
            needed,
            available: self.capacity.saturating_sub(used),
            capacity: self.capacity,
        };

        if needed > self.capacity {
            return Err(refuse(used));
        }

        if used + needed > self.capacity {
            if self.policy == OverflowPolicy::Reject {
                return Err(refuse(used));
            }
            while used + needed > self.capacity {
                let oldest: Option<(String, i64)> = sqlx::query_as(
                    r"SELECT key, bytes FROM image_cache WHERE key <> ? ORDER BY seq LIMIT 1",
                )
                .bind(key)
                .fetch_optional(&mut *tx)
                .await?;
                let Some((oldest, bytes)) = oldest else { break };
                debug!(key = %oldest, "evicting cached image");
                sqlx::query(r"DELETE FROM image_cache WHERE key = ?")
                    .bind(&oldest)
                    .execute(&mut *tx)
                    .await?;
                used = used.saturating_sub(as_u64(bytes));
            }
        }

        // delete + insert so the entry moves to the newest position
        sqlx::query(r"DELETE FROM image_cache WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r"
            INSERT INTO image_cache (key, payload, bytes, created_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP)
            ",
        )
        .bind(key)
        .bind(payload)
        .bind(as_i64(needed))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn stats(&self) -> anyhow::Result<StoreStats> {
        let (entries, bytes): (i64, i64) =
            sqlx::query_as(r"SELECT COUNT(*), COALESCE(SUM(bytes), 0) FROM image_cache")
                .fetch_one(&self.pool)
                .await?;
        Ok(StoreStats {
            backend: "sqlite",
            entries: as_u64(entries),
            bytes: as_u64(bytes),
            capacity: self.capacity,
            policy: self.policy,
        })
    }
}
