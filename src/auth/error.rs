// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Reasons a request fails the session guard.
#[derive(Debug)]
pub enum AuthError {
    /// No session cookie, or the cookie signature did not verify
    MissingSession,
    /// Cookie verified but the session is gone or expired
    SessionExpired,
    /// Session lacks one of access key id, access key, user id, paymail
    IncompleteSession,
    /// Wallet service rejected or revoked the stored access key
    AccessKeyRevoked,
    /// Wallet service could not be reached to validate the access key
    WalletUnavailable(String),
    /// Session store failure
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingSession => "missing_session",
            AuthError::SessionExpired => "session_expired",
            AuthError::IncompleteSession => "incomplete_session",
            AuthError::AccessKeyRevoked => "access_key_revoked",
            AuthError::WalletUnavailable(_) => "wallet_unavailable",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    ///
    /// A wallet outage during validation still fails closed with 401.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingSession
            | AuthError::SessionExpired
            | AuthError::IncompleteSession
            | AuthError::AccessKeyRevoked
            | AuthError::WalletUnavailable(_) => StatusCode::UNAUTHORIZED,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the session should be destroyed after this failure.
    ///
    /// Only a rejected access key qualifies; every other failure leaves the
    /// session untouched.
    pub fn is_definitive(&self) -> bool {
        matches!(self, AuthError::AccessKeyRevoked)
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingSession => write!(f, "Sign in required"),
            AuthError::SessionExpired => write!(f, "Session has expired"),
            AuthError::IncompleteSession => write!(f, "Session is not authenticated"),
            AuthError::AccessKeyRevoked => write!(f, "Access key is no longer valid"),
            AuthError::WalletUnavailable(msg) => {
                write!(f, "Could not validate access key: {msg}")
            }
            AuthError::InternalError(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
