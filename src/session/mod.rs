//! Cookie-backed server-side sessions.
//!
//! The middleware resolves the session cookie to a JSON object held by a
//! [`SessionStore`], hands handlers a [`Session`] through request extensions,
//! and persists the object afterwards if a handler changed it.

pub mod messages;
pub mod store;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::config::AppConfig;
use crate::errors::ServiceError;
pub use store::{InMemorySessionStore, RedisSessionStore, SessionStore};

pub type SessionData = Map<String, Value>;

const SESSION_ID_BYTES: usize = 32;

#[derive(Debug)]
struct SessionState {
    data: SessionData,
    modified: bool,
}

/// A visitor's session. Clones share the same state.
#[derive(Debug, Clone)]
pub struct Session {
    id: Arc<str>,
    is_new: bool,
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    fn from_parts(id: String, data: SessionData, is_new: bool) -> Self {
        Self {
            id: id.into(),
            is_new,
            state: Arc::new(Mutex::new(SessionState {
                data,
                modified: false,
            })),
        }
    }

    /// A fresh session with a newly generated id.
    pub fn fresh() -> Self {
        Self::from_parts(generate_session_id(), SessionData::new(), true)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ServiceError> {
        let state = self.state.lock().await;
        state
            .data
            .get(key)
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(ServiceError::from)
    }

    pub async fn insert<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ServiceError> {
        let value = serde_json::to_value(value)?;
        let mut state = self.state.lock().await;
        state.data.insert(key.to_string(), value);
        state.modified = true;
        Ok(())
    }

    /// Removes `key`, returning whether it was present.
    pub async fn remove(&self, key: &str) -> bool {
        let mut state = self.state.lock().await;
        let removed = state.data.remove(key).is_some();
        if removed {
            state.modified = true;
        }
        removed
    }

    pub async fn is_modified(&self) -> bool {
        self.state.lock().await.modified
    }

    async fn snapshot(&self) -> (SessionData, bool) {
        let state = self.state.lock().await;
        (state.data.clone(), state.modified)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| ServiceError::SessionError("session layer is not installed".into()))
    }
}

/// Cookie settings for the session layer.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub ttl: Duration,
    pub secure: bool,
}

impl From<&AppConfig> for SessionConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            cookie_name: cfg.session_cookie_name.clone(),
            ttl: Duration::from_secs(cfg.session_ttl_secs),
            secure: cfg.session_cookie_secure,
        }
    }
}

fn spawn_cleanup(store: &Arc<InMemorySessionStore>, interval: Duration) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(store::start_cleanup_task(Arc::downgrade(store), interval));
        }
        Err(_) => warn!("No async runtime; expired in-memory sessions are only dropped on reload"),
    }
}

/// Store plus cookie settings, shared by the middleware.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    /// Builds the backend named by `session_backend`.
    pub fn from_app_config(cfg: &AppConfig) -> Result<Self, ServiceError> {
        let store: Arc<dyn SessionStore> = if cfg.uses_redis_sessions() {
            Arc::new(RedisSessionStore::new(
                &cfg.redis_url,
                cfg.session_namespace.clone(),
            )?)
        } else {
            let memory = Arc::new(InMemorySessionStore::new());
            spawn_cleanup(&memory, Duration::from_secs(cfg.session_cleanup_interval_secs));
            memory
        };
        Ok(Self::new(store, SessionConfig::from(cfg)))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Resolves the request's session, starting a fresh one for unknown ids.
    pub async fn load(&self, headers: &HeaderMap) -> Session {
        let Some(id) = session_cookie(headers, &self.config.cookie_name) else {
            return Session::fresh();
        };
        if !is_well_formed_id(&id) {
            debug!("Ignoring malformed session cookie");
            return Session::fresh();
        }
        match self.store.load(&id).await {
            Ok(Some(data)) => Session::from_parts(id, data, false),
            Ok(None) => Session::fresh(),
            Err(e) => {
                error!(error = %e, "Session store unavailable; starting a fresh session");
                Session::fresh()
            }
        }
    }

    /// Persists a modified session and returns the `Set-Cookie` value to send.
    pub async fn commit(&self, session: &Session) -> Result<Option<HeaderValue>, ServiceError> {
        let (data, modified) = session.snapshot().await;
        if !modified {
            return Ok(None);
        }

        if data.is_empty() {
            if session.is_new() {
                return Ok(None);
            }
            self.store.delete(session.id()).await?;
            return Ok(Some(self.cookie_header(session.id(), Duration::ZERO)?));
        }

        self.store.save(session.id(), &data, self.config.ttl).await?;
        Ok(Some(self.cookie_header(session.id(), self.config.ttl)?))
    }

    fn cookie_header(&self, id: &str, max_age: Duration) -> Result<HeaderValue, ServiceError> {
        let mut cookie = format!(
            "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
            self.config.cookie_name,
            id,
            max_age.as_secs()
        );
        if self.config.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
            .map_err(|e| ServiceError::SessionError(format!("invalid cookie header: {e}")))
    }
}

/// Loads the session before the handler runs and saves it afterwards.
pub async fn session_middleware(
    State(manager): State<SessionManager>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = manager.load(request.headers()).await;
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    match manager.commit(&session).await {
        Ok(Some(cookie)) => {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Failed to persist session"),
    }

    response
}

fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn is_well_formed_id(id: &str) -> bool {
    id.len() == SESSION_ID_BYTES * 2 && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Finds `name` among the request's `Cookie` headers.
pub fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
}
