use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::time::{timeout, Duration};

use crate::models::PositionRecord;

/// Position snapshot storage, loaded at startup and saved once per cycle
///
/// Snapshots are a cache of the last known state, not ground truth; the
/// reconciler overwrites them from the exchange every cycle. Losing the
/// snapshot only loses entry timestamps and debounce state.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load_all(&self) -> anyhow::Result<HashMap<String, PositionRecord>>;
    async fn save_all(&self, records: &HashMap<String, PositionRecord>) -> anyhow::Result<()>;
}

const SNAPSHOT_KEY: &str = "perpbot:positions";

/// Redis-backed snapshot store: one hash, field per symbol, JSON values
pub struct RedisSnapshotStore {
    conn: ConnectionManager,
}

impl RedisSnapshotStore {
    /// Connect to Redis
    ///
    /// # Arguments
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub async fn new(redis_url: &str) -> anyhow::Result<Self> {
        let client = Client::open(redis_url)?;

        // 5 second cap on the connection attempt
        let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
            .await
            .map_err(|_| anyhow::anyhow!("Redis connection timeout after 5 seconds"))??;

        tracing::info!("Connected to Redis at {}", redis_url);

        Ok(Self { conn })
    }
}

#[async_trait]
impl SnapshotStore for RedisSnapshotStore {
    async fn load_all(&self) -> anyhow::Result<HashMap<String, PositionRecord>> {
        let mut conn = self.conn.clone();
        let raw: HashMap<String, String> = conn.hgetall(SNAPSHOT_KEY).await?;

        let mut records = HashMap::new();
        for (symbol, json) in raw {
            match serde_json::from_str::<PositionRecord>(&json) {
                Ok(record) => {
                    records.insert(symbol, record);
                }
                Err(e) => {
                    // Corrupt field: drop it, the reconciler rebuilds from the
                    // exchange on the next cycle
                    tracing::warn!("Discarding unreadable snapshot for {}: {}", symbol, e);
                }
            }
        }

        tracing::info!("Loaded {} position snapshots from Redis", records.len());
        Ok(records)
    }

    async fn save_all(&self, records: &HashMap<String, PositionRecord>) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();

        let mut fields = Vec::with_capacity(records.len());
        for (symbol, record) in records {
            fields.push((symbol.clone(), serde_json::to_string(record)?));
        }

        if fields.is_empty() {
            return Ok(());
        }

        conn.hset_multiple::<_, _, _, ()>(SNAPSHOT_KEY, &fields)
            .await?;
        tracing::debug!("Saved {} position snapshots to Redis", fields.len());

        Ok(())
    }
}

/// In-memory store for running without Redis
pub struct MemorySnapshotStore {
    records: std::sync::Mutex<HashMap<String, PositionRecord>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self {
            records: std::sync::Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load_all(&self) -> anyhow::Result<HashMap<String, PositionRecord>> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn save_all(&self, records: &HashMap<String, PositionRecord>) -> anyhow::Result<()> {
        *self.records.lock().unwrap() = records.clone();
        Ok(())
    }
}
