//! Browser sessions.
//!
//! The `woof_session` cookie carries an HMAC-signed token naming the
//! caller's batch. The ordered list of uploaded image URLs lives server side
//! in [`SessionStore`], keyed by batch id.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use woof_models::BatchId;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "woof_session";

type HmacSha256 = Hmac<Sha256>;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Signed cookie payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    /// Batch id.
    pub bid: String,
    /// Expiry timestamp (Unix seconds).
    pub exp: u64,
}

impl SessionToken {
    pub fn new(batch_id: &BatchId, ttl: Duration) -> Self {
        Self {
            bid: batch_id.to_string(),
            exp: now_secs() + ttl.as_secs(),
        }
    }

    pub fn is_expired(&self) -> bool {
        now_secs() >= self.exp
    }

    /// The batch id, if it is well formed.
    pub fn batch_id(&self) -> Option<BatchId> {
        BatchId::parse(&self.bid).ok()
    }

    fn encode(&self) -> ApiResult<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| ApiError::internal(format!("Failed to serialize session token: {}", e)))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    fn decode(encoded: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn mac(secret: &str) -> ApiResult<HmacSha256> {
        HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| ApiError::internal(format!("Invalid HMAC key: {}", e)))
    }

    /// Sign as `payload.signature`.
    pub fn sign(&self, secret: &str) -> ApiResult<String> {
        let payload = self.encode()?;
        let mut mac = Self::mac(secret)?;
        mac.update(payload.as_bytes());
        let signature = mac.finalize().into_bytes();
        Ok(format!("{}.{}", payload, URL_SAFE_NO_PAD.encode(signature)))
    }

    /// Verify a signed token.
    ///
    /// Returns `None` for malformed, tampered or expired tokens.
    pub fn verify(signed: &str, secret: &str) -> ApiResult<Option<Self>> {
        let Some((payload, sig_encoded)) = signed.split_once('.') else {
            return Ok(None);
        };
        let Ok(sig_bytes) = URL_SAFE_NO_PAD.decode(sig_encoded) else {
            return Ok(None);
        };

        let mut mac = Self::mac(secret)?;
        mac.update(payload.as_bytes());
        if mac.verify_slice(&sig_bytes).is_err() {
            return Ok(None);
        }

        Ok(Self::decode(payload).filter(|token| !token.is_expired()))
    }
}

/// Session of the current request, inserted by [`session_middleware`].
#[derive(Debug, Clone)]
pub struct Session {
    pub batch_id: BatchId,
}

#[derive(Debug)]
struct SessionEntry {
    urls: Vec<String>,
    last_seen: Instant,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            urls: Vec::new(),
            last_seen: Instant::now(),
        }
    }
}

/// In-memory URL lists per batch.
#[derive(Debug, Default)]
pub struct SessionStore {
    entries: RwLock<HashMap<BatchId, SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh the idle timer of a known session. Unknown ids are ignored:
    /// entries only come into existence through an upload.
    pub async fn touch(&self, batch_id: &BatchId) {
        if let Some(entry) = self.entries.write().await.get_mut(batch_id) {
            entry.last_seen = Instant::now();
        }
    }

    /// Append an uploaded image URL, creating the session entry if needed.
    pub async fn push_url(&self, batch_id: &BatchId, url: String) {
        self.extend_urls(batch_id, [url]).await;
    }

    /// Append several URLs at once, keeping their order.
    pub async fn extend_urls(&self, batch_id: &BatchId, urls: impl IntoIterator<Item = String>) {
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(batch_id.clone())
            .or_insert_with(SessionEntry::new);
        entry.urls.extend(urls);
        entry.last_seen = Instant::now();
    }

    /// Current URL list (empty when the session is unknown).
    pub async fn urls(&self, batch_id: &BatchId) -> Vec<String> {
        self.entries
            .read()
            .await
            .get(batch_id)
            .map(|e| e.urls.clone())
            .unwrap_or_default()
    }

    /// Remove and return the URL list.
    pub async fn take_urls(&self, batch_id: &BatchId) -> Vec<String> {
        self.entries
            .write()
            .await
            .get_mut(batch_id)
            .map(|e| std::mem::take(&mut e.urls))
            .unwrap_or_default()
    }

    /// Drop sessions idle for at least `ttl` and return their ids.
    pub async fn remove_expired(&self, ttl: Duration) -> Vec<BatchId> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let expired: Vec<BatchId> = entries
            .iter()
            .filter(|(_, e)| now.duration_since(e.last_seen) >= ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            entries.remove(id);
        }
        expired
    }

    /// Ids of all known sessions.
    pub async fn ids(&self) -> HashSet<BatchId> {
        self.entries.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Build the cookie for a batch.
pub fn session_cookie(
    batch_id: &BatchId,
    secret: &str,
    ttl: Duration,
    secure: bool,
) -> ApiResult<Cookie<'static>> {
    let signed = SessionToken::new(batch_id, ttl).sign(secret)?;
    Ok(Cookie::build((SESSION_COOKIE, signed))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build())
}

/// Resolve (or start) the caller's session and refresh its cookie.
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let secret = &state.config.session_secret;

    let existing = jar.get(SESSION_COOKIE).and_then(|cookie| {
        match SessionToken::verify(cookie.value(), secret) {
            Ok(token) => token.and_then(|t| t.batch_id()),
            Err(e) => {
                warn!(error = %e, "Session cookie verification failed");
                None
            }
        }
    });

    let batch_id = existing.unwrap_or_else(|| {
        let batch_id = BatchId::new();
        debug!(batch_id = %batch_id, "Started new session");
        batch_id
    });
    let session = Session { batch_id };
    state.sessions.touch(&session.batch_id).await;

    let batch_id = session.batch_id.clone();
    request.extensions_mut().insert(session);
    let response = next.run(request).await;

    match session_cookie(
        &batch_id,
        secret,
        state.config.session_ttl,
        state.config.is_production(),
    ) {
        Ok(cookie) => (jar.add(cookie), response).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to issue session cookie");
            response
        }
    }
}
