//! Session handle abstraction and an in-memory, cookie-keyed store.
//!
//! ARCHITECTURE
//! ============
//! The relay never touches global state: it reads and writes through the
//! `Session` trait, a string-keyed map of JSON values scoped to one user.
//! A request "has a session" when a `SessionHandle` sits in its extensions;
//! hosts with their own session layer insert one themselves, everyone else
//! can use `MemorySessionStore` + `session_middleware`.
//!
//! TRADE-OFFS
//! ==========
//! Each handle wraps a `tokio::sync::Mutex`, so concurrent requests of one
//! user (a page and its AJAX calls) serialize on the session the way a
//! locking session backend would. The relay relies on this and does no
//! locking of its own. Idle sessions are pruned lazily when new ones start.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rand::Rng;
use serde_json::Value;
use tokio::sync::MutexGuard;

pub const SESSION_COOKIE_NAME: &str = "debug_bar_session";
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

// =============================================================================
// SESSION TRAIT
// =============================================================================

/// Per-user key/value storage that survives across requests.
pub trait Session {
    fn get(&self, key: &str) -> Option<&Value>;

    fn insert(&mut self, key: &str, value: Value);

    fn remove(&mut self, key: &str) -> Option<Value>;
}

/// In-memory session contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionData {
    values: HashMap<String, Value>,
}

impl SessionData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Session for SessionData {
    fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    fn insert(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_owned(), value);
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }
}

// =============================================================================
// SESSION HANDLE
// =============================================================================

/// Shared, lockable session. Present in request extensions once a session
/// has been started.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<tokio::sync::Mutex<SessionData>>,
}

impl SessionHandle {
    #[must_use]
    pub fn new(data: SessionData) -> Self {
        Self { inner: Arc::new(tokio::sync::Mutex::new(data)) }
    }

    pub async fn lock(&self) -> MutexGuard<'_, SessionData> {
        self.inner.lock().await
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

struct StoredSession {
    handle: SessionHandle,
    last_seen: Instant,
}

/// Process-wide session map keyed by cookie token.
#[derive(Clone)]
pub struct MemorySessionStore {
    inner: Arc<Mutex<HashMap<String, StoredSession>>>,
    idle_timeout: Duration,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }

    #[must_use]
    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())), idle_timeout }
    }

    /// Resume the session for `token`, or start a new one.
    ///
    /// Returns the token the session lives under and whether it was created.
    pub fn start(&self, token: Option<&str>) -> (String, SessionHandle, bool) {
        self.start_at(token, Instant::now())
    }

    fn start_at(&self, token: Option<&str>, now: Instant) -> (String, SessionHandle, bool) {
        let mut sessions = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let idle_timeout = self.idle_timeout;
        sessions.retain(|_, s| now.duration_since(s.last_seen) <= idle_timeout);

        if let Some(token) = token {
            if let Some(stored) = sessions.get_mut(token) {
                stored.last_seen = now;
                return (token.to_owned(), stored.handle.clone(), false);
            }
        }

        let token = generate_token();
        let handle = SessionHandle::default();
        sessions.insert(token.clone(), StoredSession { handle: handle.clone(), last_seen: now });
        tracing::debug!(active = sessions.len(), "debug bar session started");
        (token, handle, true)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Middleware that attaches a `SessionHandle` to every request, issuing a
/// session cookie when the browser does not present a live one.
pub async fn session_middleware(
    State(store): State<MemorySessionStore>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let presented = jar.get(SESSION_COOKIE_NAME).map(Cookie::value);
    let (token, handle, created) = store.start(presented);
    req.extensions_mut().insert(handle);

    let response = next.run(req).await;
    if !created {
        return response;
    }

    let cookie = Cookie::build((SESSION_COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (jar.add(cookie), response).into_response()
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
