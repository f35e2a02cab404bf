use chrono::NaiveDateTime;
use redis::AsyncCommands;
use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};
use sms_gateway_entity::accounts;
use std::time::Duration;
use uuid::Uuid;

use crate::{error::ServiceError, repository, settings::CacheSettings};

/// Snapshot of an account stored in the cache. The balance in here may be up
/// to the TTL stale; debits never consult it.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedAccount {
    id: Uuid,
    api_key: String,
    balance: i32,
    created_at: NaiveDateTime,
}

impl From<&accounts::Model> for CachedAccount {
    fn from(account: &accounts::Model) -> Self {
        Self {
            id: account.id,
            api_key: account.api_key.clone(),
            balance: account.balance,
            created_at: account.created_at,
        }
    }
}

impl From<CachedAccount> for accounts::Model {
    fn from(cached: CachedAccount) -> Self {
        Self {
            id: cached.id,
            api_key: cached.api_key,
            balance: cached.balance,
            created_at: cached.created_at,
        }
    }
}

/// api_key -> account cache in front of the account store.
#[derive(Clone)]
pub struct AuthCache {
    redis: redis::aio::ConnectionManager,
    ttl: Duration,
}

impl AuthCache {
    pub async fn new(settings: &CacheSettings) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(settings.url.as_str())?;
        let redis = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self {
            redis,
            ttl: settings.auth_ttl,
        })
    }

    fn cache_key(api_key: &str) -> String {
        format!("account:apikey:{api_key}")
    }

    /// Resolves an API key to an account: cache probe first, then the store.
    /// A missing key is `Unauthorized`; cache failures degrade to the store
    /// lookup since the cache is never authoritative.
    pub async fn authenticate<C: ConnectionTrait>(
        &self,
        db: &C,
        api_key: &str,
    ) -> Result<accounts::Model, ServiceError> {
        let key = Self::cache_key(api_key);
        let mut conn = self.redis.clone();

        match conn.get::<_, Option<String>>(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<CachedAccount>(&raw) {
                Ok(cached) => return Ok(cached.into()),
                Err(err) => {
                    tracing::warn!(error = %err, "discarding undecodable auth cache entry")
                }
            },
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(error = %err, "auth cache unavailable, falling back to the store")
            }
        }

        let account = repository::accounts::get_by_api_key(db, api_key)
            .await?
            .ok_or(ServiceError::Unauthorized)?;

        match serde_json::to_string(&CachedAccount::from(&account)) {
            Ok(raw) => {
                if let Err(err) = conn
                    .set_ex::<_, _, ()>(&key, raw, self.ttl.as_secs())
                    .await
                {
                    tracing::warn!(error = %err, "failed to cache account snapshot");
                }
            }
            Err(err) => tracing::warn!(error = %err, "failed to encode account snapshot"),
        }

        Ok(account)
    }
}
