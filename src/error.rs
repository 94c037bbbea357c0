// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::crypto::CryptoError;
use crate::dispatch::DispatchError;
use crate::session::SessionError;
use crate::users::UserStoreError;
use crate::wallet::WalletError;

/// Message for any failed password check. Never says which part was wrong.
pub const INVALID_CREDENTIALS: &str = "invalid credentials";

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// Log `detail` and return an opaque 500.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        error!(error = %detail, "Internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Unauthorized => Self::unauthorized("wallet service rejected the credential"),
            WalletError::InvalidInput(msg) => Self::bad_request(msg),
            WalletError::Rejected { status, message } if (400..500).contains(&status) => {
                Self::unprocessable(message)
            }
            WalletError::Transport(_) => Self::service_unavailable(err.to_string()),
            WalletError::Rejected { .. } | WalletError::Decode(_) => Self::bad_gateway(err.to_string()),
        }
    }
}

impl From<CryptoError> for ApiError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::DecryptionFailed | CryptoError::NotUtf8 => {
                Self::unauthorized(INVALID_CREDENTIALS)
            }
            other => Self::internal(other),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::InvalidAmount | DispatchError::MissingRecipient => {
                Self::bad_request(err.to_string())
            }
            DispatchError::Wallet(e) => e.into(),
            DispatchError::QueueClosed => Self::service_unavailable(err.to_string()),
        }
    }
}

impl From<UserStoreError> for ApiError {
    fn from(err: UserStoreError) -> Self {
        match err {
            UserStoreError::AlreadyExists(_) => Self::conflict("user already exists"),
            UserStoreError::Unavailable(_) => Self::internal(err),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self::internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "bad");

        let conflict = ApiError::conflict("taken");
        assert_eq!(conflict.status, StatusCode::CONFLICT);

        let unp = ApiError::unprocessable("oops");
        assert_eq!(unp.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(unp.message, "oops");
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data"}"#);
    }

    #[test]
    fn internal_hides_detail() {
        let err = ApiError::internal("db password is hunter2");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "internal error");
    }

    #[test]
    fn wallet_errors_map_to_statuses() {
        let cases = [
            (WalletError::Unauthorized, StatusCode::UNAUTHORIZED),
            (WalletError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (
                WalletError::Rejected {
                    status: 422,
                    message: "not enough funds".into(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                WalletError::Rejected {
                    status: 500,
                    message: "boom".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (WalletError::Transport("refused".into()), StatusCode::SERVICE_UNAVAILABLE),
            (WalletError::Decode("eof".into()), StatusCode::BAD_GATEWAY),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn decryption_failure_is_invalid_credentials() {
        let err = ApiError::from(CryptoError::DecryptionFailed);
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, INVALID_CREDENTIALS);
    }

    #[test]
    fn duplicate_user_is_conflict() {
        let err = ApiError::from(UserStoreError::AlreadyExists("a@b.c".into()));
        assert_eq!(err.status, StatusCode::CONFLICT);
    }
}
