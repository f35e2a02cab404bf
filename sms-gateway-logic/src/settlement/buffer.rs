use redis::AsyncCommands;
use std::num::NonZeroUsize;

use super::SettlementRecord;
use crate::{error::ServiceError, settings::BufferSettings};

/// Write-behind list of settlement records. Pushes go to one end, the settler
/// pops bounded batches from the other, so the list drains in FIFO order.
/// The buffer is not durable storage: losing it leaves the affected messages
/// PENDING until reconciled out of band.
#[derive(Clone)]
pub struct SettlementBuffer {
    redis: redis::aio::ConnectionManager,
    key: String,
}

impl SettlementBuffer {
    pub async fn new(settings: &BufferSettings) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(settings.url.as_str())?;
        let redis = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self {
            redis,
            key: settings.key.clone(),
        })
    }

    pub async fn push(&self, record: &SettlementRecord) -> Result<(), ServiceError> {
        let payload = serde_json::to_string(record)?;
        let mut conn = self.redis.clone();
        conn.lpush::<_, _, ()>(&self.key, payload).await?;
        Ok(())
    }

    /// Pops up to `max_n` records in one atomic RPOP. Records that fail to
    /// decode are dropped with an error log instead of wedging the batch.
    pub async fn drain(&self, max_n: usize) -> Result<Vec<SettlementRecord>, ServiceError> {
        let Some(count) = NonZeroUsize::new(max_n) else {
            return Ok(Vec::new());
        };
        let mut conn = self.redis.clone();
        let raw: Option<Vec<String>> = conn.rpop(&self.key, Some(count)).await?;
        let mut records = Vec::new();
        for item in raw.unwrap_or_default() {
            match serde_json::from_str(&item) {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::error!(error = %err, raw = %item, "dropping undecodable settlement record")
                }
            }
        }
        Ok(records)
    }
}
