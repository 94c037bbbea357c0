// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sign-in and sign-out.

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap},
    response::{AppendHeaders, IntoResponse},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use super::users::{validate_email, validate_password};
use crate::{
    auth::Auth,
    error::{ApiError, INVALID_CREDENTIALS},
    session::SessionData,
    state::AppState,
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub user_id: u64,
    pub paymail: String,
}

/// Empty JSON object body.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct EmptyResponse {}

/// Sign in with email and password.
///
/// The password is checked by decrypting the stored wallet key. On success a
/// new access key is issued and stored in a fresh session.
#[utoipa::path(
    post,
    path = "/api/v1/sign-in",
    tag = "Sessions",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in; session cookie set", body = SignInResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Invalid credentials"),
        (status = 503, description = "Wallet service unavailable")
    )
)]
pub async fn sign_in(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SignInRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = request.email.trim();
    validate_email(email)?;
    validate_password(&request.password)?;

    let user = state
        .users
        .get_by_email(email)
        .await?
        .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS))?;

    let access_key = {
        let xpriv = state
            .unlock_secret(&request.password, &user.encrypted_xpriv)
            .await?;
        state.wallet.client_for_xpriv(&xpriv)?.create_access_key().await?
    };
    let key = access_key
        .key
        .clone()
        .ok_or_else(|| ApiError::bad_gateway("wallet service returned no access key"))?;

    // Never reuse a session id across sign-ins.
    if let Some(previous) = state.sessions.session_id(&headers) {
        state.sessions.destroy(&previous).await?;
    }

    let session = state
        .sessions
        .start(SessionData::signed_in(
            access_key.id.clone(),
            key,
            user.id,
            user.paymail.clone(),
        ))
        .await?;
    let cookie = state.sessions.set_cookie(&session)?;

    info!(user_id = user.id, access_key_id = %access_key.id, "User signed in");

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(SignInResponse {
            user_id: user.id,
            paymail: user.paymail,
        }),
    ))
}

/// Sign out: revoke the access key and destroy the session.
#[utoipa::path(
    post,
    path = "/api/v1/sign-out",
    tag = "Sessions",
    responses(
        (status = 200, description = "Signed out; session cookie cleared", body = EmptyResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn sign_out(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let revoked = match state.wallet.client_for_access_key(&user.access_key) {
        Ok(client) => client.revoke_access_key(&user.access_key_id).await.map(|_| ()),
        Err(e) => Err(e),
    };
    if let Err(e) = revoked {
        warn!(user_id = user.user_id, error = %e, "Access key revocation failed");
    }

    state.sessions.destroy(&user.session_id).await?;
    info!(user_id = user.user_id, "User signed out");

    Ok((
        AppendHeaders([(SET_COOKIE, state.sessions.clear_cookie()?)]),
        Json(EmptyResponse::default()),
    ))
}
