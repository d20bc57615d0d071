use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Weak;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

use super::SessionData;
use crate::errors::ServiceError;

/// Persistence for session objects keyed by session id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the stored object, or `None` for unknown or expired ids.
    async fn load(&self, id: &str) -> Result<Option<SessionData>, ServiceError>;

    /// Stores the object and (re)starts its expiry clock.
    async fn save(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<(), ServiceError>;

    async fn delete(&self, id: &str) -> Result<(), ServiceError>;
}

#[derive(Debug, Clone)]
struct Entry {
    data: SessionData,
    expires_at: Instant,
}

/// Process-local store. Sessions vanish on restart.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Entry>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drops expired entries and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.sessions.len();
        let now = Instant::now();
        self.sessions.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.sessions.len())
    }
}

/// Purges expired in-memory sessions every `interval` until the store is dropped.
pub async fn start_cleanup_task(store: Weak<InMemorySessionStore>, interval: Duration) {
    let mut interval_timer = tokio::time::interval(interval);

    loop {
        interval_timer.tick().await;
        let Some(store) = store.upgrade() else {
            debug!("Session store dropped; stopping cleanup");
            return;
        };
        let removed = store.purge_expired();
        if removed > 0 {
            debug!(removed, remaining = store.len(), "Expired sessions purged");
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &str) -> Result<Option<SessionData>, ServiceError> {
        let expired = match self.sessions.get(id) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.data.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.sessions.remove(id);
        }
        Ok(None)
    }

    async fn save(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<(), ServiceError> {
        self.sessions.insert(
            id.to_string(),
            Entry {
                data: data.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.sessions.remove(id);
        Ok(())
    }
}

/// Redis-backed store; each session is one JSON string under `{namespace}:{id}`.
#[derive(Clone)]
pub struct RedisSessionStore {
    client: redis::Client,
    namespace: String,
}

impl RedisSessionStore {
    pub fn new(redis_url: &str, namespace: String) -> Result<Self, ServiceError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| ServiceError::SessionError(format!("invalid redis url: {e}")))?;
        Ok(Self { client, namespace })
    }

    fn key(&self, id: &str) -> String {
        format!("{}:{}", self.namespace, id)
    }

    async fn connection(&self) -> Result<redis::aio::Connection, ServiceError> {
        self.client
            .get_async_connection()
            .await
            .map_err(redis_error)
    }
}

fn redis_error(e: redis::RedisError) -> ServiceError {
    ServiceError::SessionError(format!("redis: {e}"))
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    #[instrument(skip(self, id))]
    async fn load(&self, id: &str) -> Result<Option<SessionData>, ServiceError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(self.key(id))
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;
        match raw {
            Some(raw) => match serde_json::from_str::<SessionData>(&raw) {
                Ok(data) => Ok(Some(data)),
                Err(e) => {
                    debug!(error = %e, "Discarding undecodable session payload");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    #[instrument(skip(self, id, data))]
    async fn save(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<(), ServiceError> {
        let payload = serde_json::to_string(data)?;
        let mut conn = self.connection().await?;
        redis::cmd("SET")
            .arg(self.key(id))
            .arg(payload)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(redis_error)
    }

    #[instrument(skip(self, id))]
    async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let mut conn = self.connection().await?;
        redis::cmd("DEL")
            .arg(self.key(id))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(redis_error)
    }
}
