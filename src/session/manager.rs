// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session creation, lookup and cookie rendering.

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue};
use chrono::{Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::debug;

use super::cookie::{find_cookie, CookieSigner, SESSION_COOKIE};
use super::{Session, SessionData, SessionError, SessionId, SessionStore};

/// Random bytes in a session id.
const SESSION_ID_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Absolute session lifetime in seconds.
    pub ttl_secs: u64,
    /// Add the `Secure` attribute to the cookie.
    pub secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 1800,
            secure: false,
        }
    }
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    signer: Arc<CookieSigner>,
    config: SessionConfig,
    rng: SystemRandom,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, secret: &[u8], config: SessionConfig) -> Self {
        Self {
            store,
            signer: Arc::new(CookieSigner::new(secret)),
            config,
            rng: SystemRandom::new(),
        }
    }

    pub fn store(&self) -> Arc<dyn SessionStore> {
        self.store.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn new_id(&self) -> Result<SessionId, SessionError> {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| SessionError::Entropy)?;
        Ok(SessionId::from_raw(hex::encode(bytes)))
    }

    /// Create and persist a fresh session.
    pub async fn start(&self, data: SessionData) -> Result<Session, SessionError> {
        let ttl = i64::try_from(self.config.ttl_secs).unwrap_or(i64::MAX);
        let expires_at = Utc::now() + Duration::seconds(ttl);
        let session = Session::new(self.new_id()?, data, expires_at);
        self.store.save(&session).await?;
        debug!(session_id = %session.id(), "Session started");
        Ok(session)
    }

    /// Resolve the session referenced by the request cookie.
    ///
    /// Returns `None` for a missing, forged or expired cookie. Expired
    /// sessions are destroyed on sight.
    pub async fn from_headers(&self, headers: &HeaderMap) -> Result<Option<Session>, SessionError> {
        match self.session_id(headers) {
            Some(id) => self.load(&id).await,
            None => Ok(None),
        }
    }

    /// Session id from a correctly signed cookie, without touching the store.
    pub fn session_id(&self, headers: &HeaderMap) -> Option<SessionId> {
        let value = find_cookie(headers, SESSION_COOKIE)?;
        let id = self.signer.verify(value);
        if id.is_none() {
            debug!("Session cookie failed verification");
        }
        id
    }

    /// Load a live session by id.
    pub async fn load(&self, id: &SessionId) -> Result<Option<Session>, SessionError> {
        let Some(session) = self.store.load(id).await? else {
            return Ok(None);
        };
        if session.is_expired_at(Utc::now()) {
            self.store.destroy(id).await?;
            debug!(session_id = %id, "Session expired");
            return Ok(None);
        }
        Ok(Some(session))
    }

    pub async fn save(&self, session: &Session) -> Result<(), SessionError> {
        self.store.save(session).await
    }

    pub async fn destroy(&self, id: &SessionId) -> Result<(), SessionError> {
        self.store.destroy(id).await?;
        debug!(session_id = %id, "Session destroyed");
        Ok(())
    }

    /// `Set-Cookie` value carrying the signed session id.
    pub fn set_cookie(&self, session: &Session) -> Result<HeaderValue, SessionError> {
        let remaining = (session.expires_at() - Utc::now()).num_seconds().max(0);
        self.render(&self.signer.sign(session.id()), remaining)
    }

    /// `Set-Cookie` value that removes the session cookie.
    pub fn clear_cookie(&self) -> Result<HeaderValue, SessionError> {
        self.render("", 0)
    }

    fn render(&self, value: &str, max_age: i64) -> Result<HeaderValue, SessionError> {
        let mut cookie =
            format!("{SESSION_COOKIE}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
        if self.config.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).map_err(|e| SessionError::InvalidHeader(e.to_string()))
    }
}
