// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registration and current-user endpoints.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::{auth::Auth, error::ApiError, state::AppState, users::NewUser};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: u64,
    pub email: String,
    pub paymail: String,
    pub created_at: DateTime<Utc>,
    /// Spendable satoshis; present on the current-user endpoint only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<u64>,
}

// =============================================================================
// Validation
// =============================================================================

/// Exactly one `@` with non-empty local part and domain.
pub(crate) fn validate_email(email: &str) -> Result<(), ApiError> {
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace) =>
        {
            Ok(())
        }
        _ => Err(ApiError::bad_request("Invalid email address")),
    }
}

pub(crate) fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.is_empty() {
        return Err(ApiError::bad_request("Password is required"));
    }
    Ok(())
}

/// Paymail alias from the email local part: lowercase, keeping only
/// characters valid in an alias.
fn paymail_alias(email: &str) -> Option<String> {
    let local = email.split('@').next()?;
    let alias: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .map(|c| c.to_ascii_lowercase())
        .collect();
    (!alias.is_empty()).then_some(alias)
}

// =============================================================================
// Handlers
// =============================================================================

/// Register a new user.
///
/// Provisions a wallet and paymail, then stores the wallet key encrypted
/// under the user's password.
#[utoipa::path(
    post,
    path = "/api/v1/user",
    tag = "Users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 400, description = "Invalid email or password"),
        (status = 409, description = "Email already registered"),
        (status = 503, description = "Wallet service unavailable")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let email = request.email.trim().to_string();
    validate_email(&email)?;
    validate_password(&request.password)?;

    if state.users.get_by_email(&email).await?.is_some() {
        return Err(ApiError::conflict("user already exists"));
    }

    let alias = paymail_alias(&email)
        .ok_or_else(|| ApiError::bad_request("Email cannot be turned into a paymail alias"))?;
    let paymail = format!("{alias}@{}", state.paymail_domain);

    let wallet = state.wallet.register_wallet(&paymail).await?;
    let encrypted_xpriv = state.seal_secret(&request.password, wallet.xpriv).await?;

    let user = state
        .users
        .insert(NewUser {
            email,
            paymail: wallet.paymail,
            encrypted_xpriv,
        })
        .await?;

    info!(user_id = user.id, paymail = %user.paymail, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            id: user.id,
            email: user.email,
            paymail: user.paymail,
            created_at: user.created_at,
            balance: None,
        }),
    ))
}

/// Get the signed-in user with their balance.
#[utoipa::path(
    get,
    path = "/api/v1/user",
    tag = "Users",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn current_user(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let stored = state
        .users
        .get_by_id(user.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("user no longer exists"))?;

    let balance = state
        .wallet
        .client_for_access_key(&user.access_key)?
        .get_balance()
        .await?;

    Ok(Json(UserResponse {
        id: stored.id,
        email: stored.email,
        paymail: stored.paymail,
        created_at: stored.created_at,
        balance: Some(balance.satoshis),
    }))
}
