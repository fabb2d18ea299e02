use crate::config::CacheSettings;
use redis::aio::ConnectionManager;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Stored value together with the hash of the request that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    request_hash: String,
    payload: serde_json::Value,
}

/// Deterministic hex digest of a request payload
///
/// Serializes through `serde_json::Value`, whose maps are key-sorted, so field
/// order in the source struct does not change the digest.
pub fn request_hash<T: Serialize>(payload: &T) -> Result<String, CacheError> {
    let canonical = serde_json::to_string(&serde_json::to_value(payload)?)?;
    Ok(blake3::hash(canonical.as_bytes()).to_hex().to_string())
}

/// Build the cache key of one talent/job pair
pub fn explanation_key(talent_id: &str, job_id: &str) -> String {
    format!("explain:{}:{}", talent_id, job_id)
}

/// Two-tier cache of generated match explanations
///
/// L1 is in-process; L2 is Redis when configured. One entry is kept per
/// talent/job pair and is only served while the request hash still matches.
pub struct ExplanationCache {
    redis: Option<Arc<tokio::sync::Mutex<ConnectionManager>>>,
    l1_cache: moka::future::Cache<String, Vec<u8>>,
    ttl_secs: u64,
}

impl ExplanationCache {
    /// In-memory cache without an L2 tier
    pub fn in_memory(l1_size: u64, ttl_secs: u64) -> Self {
        let l1_cache = moka::future::CacheBuilder::new(l1_size)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self {
            redis: None,
            l1_cache,
            ttl_secs,
        }
    }

    /// Cache backed by Redis as well as memory
    pub async fn with_redis(
        redis_url: &str,
        l1_size: u64,
        ttl_secs: u64,
    ) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;

        let mut cache = Self::in_memory(l1_size, ttl_secs);
        cache.redis = Some(Arc::new(tokio::sync::Mutex::new(redis)));
        Ok(cache)
    }

    pub async fn from_settings(settings: &CacheSettings) -> Result<Self, CacheError> {
        match &settings.redis_url {
            Some(url) => Self::with_redis(url, settings.l1_cache_size, settings.ttl_secs).await,
            None => Ok(Self::in_memory(settings.l1_cache_size, settings.ttl_secs)),
        }
    }

    async fn load(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        if let Some(bytes) = self.l1_cache.get(key).await {
            tracing::trace!("L1 cache hit: {}", key);
            return Ok(Some(serde_json::from_slice(&bytes)?));
        }

        let Some(redis) = &self.redis else {
            return Ok(None);
        };

        let mut conn = redis.lock().await;
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut *conn)
            .await?;
        drop(conn);

        match value {
            Some(json) => {
                tracing::trace!("L2 cache hit: {}", key);
                let entry = serde_json::from_str(&json)?;
                self.l1_cache.insert(key.to_string(), json.into_bytes()).await;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Cached explanation for a pair, if it was built from the same request
    pub async fn get<T: DeserializeOwned>(
        &self,
        talent_id: &str,
        job_id: &str,
        hash: &str,
    ) -> Result<Option<T>, CacheError> {
        let key = explanation_key(talent_id, job_id);

        match self.load(&key).await? {
            Some(entry) if entry.request_hash == hash => {
                Ok(Some(serde_json::from_value(entry.payload)?))
            }
            Some(_) => {
                tracing::trace!("Stale cache entry: {}", key);
                Ok(None)
            }
            None => {
                tracing::trace!("Cache miss: {}", key);
                Ok(None)
            }
        }
    }

    /// Store an explanation, replacing any older entry for the pair
    pub async fn put<T: Serialize>(
        &self,
        talent_id: &str,
        job_id: &str,
        hash: &str,
        value: &T,
    ) -> Result<(), CacheError> {
        let key = explanation_key(talent_id, job_id);
        let entry = CacheEntry {
            request_hash: hash.to_string(),
            payload: serde_json::to_value(value)?,
        };
        let json = serde_json::to_string(&entry)?;

        self.l1_cache.insert(key.clone(), json.as_bytes().to_vec()).await;

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            redis::cmd("SETEX")
                .arg(&key)
                .arg(self.ttl_secs)
                .arg(json)
                .query_async::<()>(&mut *conn)
                .await?;
        }

        tracing::trace!("Cache set: {}", key);
        Ok(())
    }

    /// Drop the entry of one pair from both tiers
    pub async fn invalidate(&self, talent_id: &str, job_id: &str) -> Result<(), CacheError> {
        let key = explanation_key(talent_id, job_id);
        self.l1_cache.invalidate(&key).await;

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            redis::cmd("DEL")
                .arg(&key)
                .query_async::<()>(&mut *conn)
                .await?;
        }
        Ok(())
    }

    pub fn entry_count(&self) -> u64 {
        self.l1_cache.entry_count()
    }
}
