// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Users
//!
//! A user owns one wallet. The wallet's xpriv is stored only as an
//! [`EncryptedSecret`] created at registration and never mutated.
//!
//! The relational user database lives outside this crate; [`UserStore`] is
//! the seam, and [`InMemoryUserStore`] is the implementation wired in by
//! default.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::crypto::EncryptedSecret;

/// Numeric user identity.
pub type UserId = u64;

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub paymail: String,
    pub encrypted_xpriv: EncryptedSecret,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub paymail: String,
    pub encrypted_xpriv: EncryptedSecret,
}

#[derive(Debug, thiserror::Error)]
pub enum UserStoreError {
    #[error("user with email {0} already exists")]
    AlreadyExists(String),

    #[error("user store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: NewUser) -> Result<User, UserStoreError>;

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, UserStoreError>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError>;
}

/// Process-local user store. Emails compare case-insensitively.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<UserId, User>>,
    next_id: AtomicU64,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, user: NewUser) -> Result<User, UserStoreError> {
        let mut users = self.users.write().await;

        if users
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(UserStoreError::AlreadyExists(user.email));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let created = User {
            id,
            email: user.email,
            paymail: user.paymail,
            encrypted_xpriv: user.encrypted_xpriv,
            created_at: Utc::now(),
        };
        users.insert(id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, UserStoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}
