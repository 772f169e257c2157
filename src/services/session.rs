// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-side session store.
//!
//! A session token is 32 random bytes, base64url encoded, followed by an
//! HMAC-SHA256 tag: `<token>.<hex tag>`. The tag lets us reject forged or
//! mangled cookies before touching the store. Sessions are keyed by the
//! SHA-256 digest of the raw token so the map never holds a usable bearer
//! credential.
//!
//! Lifecycle: `Active` until `expires_at` (then `Expired`) or until
//! `invalidate` removes it. Both terminal states resolve to `None`.

use crate::config::Config;
use crate::error::AppError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "fitness_session";

const TOKEN_BYTES: usize = 32;
const HKDF_SALT: &[u8] = b"fitness-tracker/session/v1";
const HKDF_INFO: &[u8] = b"session-cookie-mac";

/// An opaque, signed session token as handed to the client.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Server-held session state.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Issues, resolves and invalidates sessions.
///
/// Cloning is cheap and clones share the same store.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<DashMap<[u8; 32], Session>>,
    mac_key: Arc<[u8; 32]>,
    ttl: Duration,
    rng: SystemRandom,
}

impl SessionManager {
    /// Create a manager whose cookie MAC key is derived from `secret`.
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, AppError> {
        let mut mac_key = [0u8; 32];
        Hkdf::<Sha256>::new(Some(HKDF_SALT), secret)
            .expand(HKDF_INFO, &mut mac_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HKDF expand failed: {}", e)))?;

        Ok(Self {
            sessions: Arc::new(DashMap::new()),
            mac_key: Arc::new(mac_key),
            ttl,
            rng: SystemRandom::new(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let ttl = i64::try_from(config.session_ttl_seconds)
            .map(Duration::seconds)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Session TTL out of range")))?;
        Self::new(&config.session_secret, ttl)
    }

    /// Start a session for `user_id` and return its token.
    pub fn create(&self, user_id: Uuid) -> Result<SessionToken, AppError> {
        let mut raw = [0u8; TOKEN_BYTES];
        self.rng
            .fill(&mut raw)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG failure")))?;

        let encoded = URL_SAFE_NO_PAD.encode(raw);
        let tag = hex::encode(self.sign(encoded.as_bytes())?);

        let now = Utc::now();
        self.sessions.insert(
            digest(&raw),
            Session {
                user_id,
                created_at: now,
                expires_at: now + self.ttl,
            },
        );

        tracing::debug!(%user_id, "Session created");
        Ok(SessionToken(format!("{}.{}", encoded, tag)))
    }

    /// Owner of an active session, or `None` for unknown, tampered, expired
    /// or invalidated tokens.
    pub fn resolve(&self, token: &str) -> Option<Uuid> {
        let key = self.session_key(token)?;
        let now = Utc::now();

        let session = self.sessions.get(&key).map(|entry| entry.value().clone())?;
        if session.is_expired(now) {
            self.sessions.remove_if(&key, |_, s| s.is_expired(now));
            tracing::debug!(user_id = %session.user_id, "Session expired");
            return None;
        }

        Some(session.user_id)
    }

    /// End a session. Returns whether an active entry was removed; calling
    /// it again (or with garbage) is a no-op.
    pub fn invalidate(&self, token: &str) -> bool {
        let Some(key) = self.session_key(token) else {
            return false;
        };

        match self.sessions.remove(&key) {
            Some((_, session)) => {
                tracing::debug!(user_id = %session.user_id, "Session invalidated");
                true
            }
            None => false,
        }
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut purged = 0;
        self.sessions.retain(|_, session| {
            let keep = !session.is_expired(now);
            if !keep {
                purged += 1;
            }
            keep
        });
        purged
    }

    /// Number of stored sessions, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Periodically purge expired sessions in the background.
    pub fn spawn_cleanup(&self, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let purged = manager.purge_expired();
                if purged > 0 {
                    tracing::info!(purged, remaining = manager.len(), "Purged expired sessions");
                }
            }
        })
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, AppError> {
        let mut mac = HmacSha256::new_from_slice(self.mac_key.as_ref())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Verify the tag and map a token to its store key.
    fn session_key(&self, token: &str) -> Option<[u8; 32]> {
        let (encoded, tag_hex) = token.split_once('.')?;
        let provided = hex::decode(tag_hex).ok()?;
        let expected = self.sign(encoded.as_bytes()).ok()?;

        if !bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
            tracing::warn!("Session token signature mismatch");
            return None;
        }

        let raw = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        if raw.len() != TOKEN_BYTES {
            return None;
        }
        Some(digest(&raw))
    }
}

fn digest(raw: &[u8]) -> [u8; 32] {
    Sha256::digest(raw).into()
}
