// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session guard middleware for Axum.
//!
//! # Usage
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/api/v1/user", get(me))
//!     .route_layer(axum::middleware::from_fn_with_state(state.clone(), session_auth));
//! ```

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::{AuthError, AuthenticatedUser};
use crate::session::Session;
use crate::state::AppState;
use crate::wallet::WalletError;

/// Authentication middleware function.
pub async fn session_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            debug!(error_code = e.error_code(), path = %request.uri().path(), "Request rejected by session guard");
            e.into_response()
        }
    }
}

/// Resolve and validate the caller's session.
///
/// Sessions failing with a definitive error are destroyed before returning.
pub async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, AuthError> {
    let id = state
        .sessions
        .session_id(headers)
        .ok_or(AuthError::MissingSession)?;

    let session = state
        .sessions
        .load(&id)
        .await
        .map_err(|e| AuthError::InternalError(e.to_string()))?
        .ok_or(AuthError::SessionExpired)?;

    let result = validate(state, &session).await;

    if let Err(e) = &result {
        if e.is_definitive() {
            warn!(session_id = %id, error_code = e.error_code(), "Destroying session after failed validation");
            if let Err(store_err) = state.sessions.destroy(&id).await {
                warn!(error = %store_err, "Failed to destroy session");
            }
        }
    }

    result
}

async fn validate(state: &AppState, session: &Session) -> Result<AuthenticatedUser, AuthError> {
    let identity = session.identity().ok_or(AuthError::IncompleteSession)?;

    let client = state
        .wallet
        .client_for_access_key(&identity.access_key)
        .map_err(classify)?;

    let key = client
        .get_access_key(&identity.access_key_id)
        .await
        .map_err(classify)?;

    if key.is_revoked() {
        return Err(AuthError::AccessKeyRevoked);
    }

    Ok(AuthenticatedUser {
        session_id: session.id().clone(),
        user_id: identity.user_id,
        paymail: identity.paymail,
        access_key_id: identity.access_key_id,
        access_key: identity.access_key,
        session_expires_at: session.expires_at(),
    })
}

/// Map a wallet failure during validation to a guard outcome.
fn classify(err: WalletError) -> AuthError {
    match err {
        WalletError::Unauthorized | WalletError::InvalidInput(_) => AuthError::AccessKeyRevoked,
        WalletError::Rejected { status: 404, .. } => AuthError::AccessKeyRevoked,
        WalletError::Rejected { .. } | WalletError::Transport(_) | WalletError::Decode(_) => {
            AuthError::WalletUnavailable(err.to_string())
        }
    }
}
