// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # HTTP Sessions
//!
//! Server-held sessions keyed by a signed cookie.
//!
//! ## Lifecycle
//!
//! - Created on sign-in with the access key, user id and paymail.
//! - Absolute expiry (default 1800 s) fixed at creation.
//! - Destroyed on sign-out, on expiry, or once the wallet service rejects the
//!   stored access key.
//!
//! The decrypted xpriv is never a session field. It lives only in the request
//! that unlocked it.

pub mod cookie;
pub mod manager;
pub mod store;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::users::UserId;

pub use cookie::{CookieSigner, SESSION_COOKIE};
pub use manager::{SessionConfig, SessionManager};
pub use store::{InMemorySessionStore, SessionReaper, SessionStore};

/// Opaque session identifier (64 hex chars).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub(crate) fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session store failure: {0}")]
    Store(String),

    #[error("system random source unavailable")]
    Entropy,

    #[error("invalid cookie header: {0}")]
    InvalidHeader(String),
}

/// Typed session fields.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    access_key_id: Option<String>,
    access_key: Option<String>,
    user_id: Option<UserId>,
    paymail: Option<String>,
}

impl SessionData {
    /// Fields of a freshly signed-in session.
    pub fn signed_in(
        access_key_id: impl Into<String>,
        access_key: impl Into<String>,
        user_id: UserId,
        paymail: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: Some(access_key_id.into()),
            access_key: Some(access_key.into()),
            user_id: Some(user_id),
            paymail: Some(paymail.into()),
        }
    }
}

impl fmt::Debug for SessionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionData")
            .field("access_key_id", &self.access_key_id)
            .field("access_key", &self.access_key.as_ref().map(|_| "<redacted>"))
            .field("user_id", &self.user_id)
            .field("paymail", &self.paymail)
            .finish()
    }
}

/// The four fields an authenticated session must carry.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub access_key_id: String,
    pub access_key: String,
    pub user_id: UserId,
    pub paymail: String,
}

/// A loaded session.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    data: SessionData,
    expires_at: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(id: SessionId, data: SessionData, expires_at: DateTime<Utc>) -> Self {
        Self {
            id,
            data,
            expires_at,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    pub fn access_key_id(&self) -> Option<&str> {
        self.data.access_key_id.as_deref()
    }

    pub fn set_access_key_id(&mut self, value: impl Into<String>) {
        self.data.access_key_id = Some(value.into());
    }

    pub fn access_key(&self) -> Option<&str> {
        self.data.access_key.as_deref()
    }

    pub fn set_access_key(&mut self, value: impl Into<String>) {
        self.data.access_key = Some(value.into());
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.data.user_id
    }

    pub fn set_user_id(&mut self, value: UserId) {
        self.data.user_id = Some(value);
    }

    pub fn paymail(&self) -> Option<&str> {
        self.data.paymail.as_deref()
    }

    pub fn set_paymail(&mut self, value: impl Into<String>) {
        self.data.paymail = Some(value.into());
    }

    pub fn clear(&mut self) {
        self.data = SessionData::default();
    }

    /// All four identity fields, or `None` if any is missing or empty.
    pub fn identity(&self) -> Option<SessionIdentity> {
        let non_empty = |v: &Option<String>| v.as_ref().filter(|s| !s.is_empty()).cloned();
        Some(SessionIdentity {
            access_key_id: non_empty(&self.data.access_key_id)?,
            access_key: non_empty(&self.data.access_key)?,
            user_id: self.data.user_id?,
            paymail: non_empty(&self.data.paymail)?,
        })
    }
}
