// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Authentication
//!
//! Every protected API route and the WebSocket upgrade pass through
//! [`middleware::session_auth`].
//!
//! ## Auth Flow
//!
//! 1. Browser sends the signed `wallet_session` cookie set at sign-in
//! 2. Guard:
//!    - Verifies the cookie signature and loads the session
//!    - Requires access key id, access key, user id and paymail
//!    - Asks the wallet service whether the access key is still valid
//! 3. On success an [`AuthenticatedUser`] is placed in request extensions and
//!    handlers read it through the [`Auth`] extractor
//!
//! ## Failure
//!
//! Every failure aborts with 401. A revoked or rejected access key also
//! destroys the session. No retries.

pub mod error;
pub mod extractor;
pub mod middleware;

use std::fmt;

use chrono::{DateTime, Utc};

use crate::session::SessionId;
use crate::users::UserId;

pub use error::AuthError;
pub use extractor::Auth;
pub use middleware::{authenticate, session_auth};

/// Request-scoped identity established by the session guard.
#[derive(Clone)]
pub struct AuthenticatedUser {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub paymail: String,
    pub access_key_id: String,
    pub access_key: String,
    /// Absolute expiry of the backing session.
    pub session_expires_at: DateTime<Utc>,
}

impl fmt::Debug for AuthenticatedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedUser")
            .field("session_id", &self.session_id)
            .field("user_id", &self.user_id)
            .field("paymail", &self.paymail)
            .field("access_key_id", &self.access_key_id)
            .field("access_key", &"<redacted>")
            .field("session_expires_at", &self.session_expires_at)
            .finish()
    }
}
