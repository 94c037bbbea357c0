// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::sessions::EmptyResponse;
use super::users::validate_password;
use crate::{
    auth::Auth,
    dispatch::CreateTransaction,
    error::ApiError,
    notify::TransactionSummary,
    state::AppState,
};

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Request to send satoshis to a paymail.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateTransactionRequest {
    /// Account password; unlocks the wallet key for this request only
    pub password: String,
    /// Recipient paymail (`alias@domain`)
    pub recipient: String,
    pub satoshis: u64,
}

/// Query parameters for the transaction list.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct TransactionListQuery {
    /// 1-based page number
    #[param(default = 1)]
    pub page: Option<u32>,
    #[param(default = 10, maximum = 100)]
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionListResponse {
    pub transactions: Vec<TransactionSummary>,
}

// =============================================================================
// Helper Functions
// =============================================================================

/// A paymail is `alias@domain` with a dotted domain.
fn validate_paymail(paymail: &str) -> Result<(), ApiError> {
    let Some((alias, domain)) = paymail.split_once('@') else {
        return Err(ApiError::bad_request("Recipient must be a paymail address"));
    };
    let alias_ok = !alias.is_empty()
        && alias
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+'));
    let domain_ok = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'));

    if !alias_ok || !domain_ok {
        return Err(ApiError::bad_request("Recipient must be a paymail address"));
    }
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

/// Send a transaction.
///
/// Returns as soon as the transaction is drafted and finalized. Recording
/// happens in the background and its outcome is pushed over the
/// notification socket as a `create_transaction` event.
#[utoipa::path(
    post,
    path = "/api/v1/transaction",
    tag = "Transactions",
    request_body = CreateTransactionRequest,
    responses(
        (status = 200, description = "Transaction accepted", body = EmptyResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized or wrong password"),
        (status = 422, description = "Rejected by the wallet service"),
        (status = 503, description = "Wallet service unavailable")
    )
)]
pub async fn create_transaction(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<Json<EmptyResponse>, ApiError> {
    validate_password(&request.password)?;
    let recipient = request.recipient.trim().to_ascii_lowercase();
    validate_paymail(&recipient)?;
    if request.satoshis == 0 {
        return Err(ApiError::bad_request("Amount must be greater than zero"));
    }

    let stored = state
        .users
        .get_by_id(user.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("user no longer exists"))?;

    let xpriv = state
        .unlock_secret(&request.password, &stored.encrypted_xpriv)
        .await?;

    state
        .dispatcher
        .create_transaction(CreateTransaction {
            user_id: user.user_id,
            sender_paymail: user.paymail,
            xpriv,
            recipient,
            satoshis: request.satoshis,
        })
        .await?;

    Ok(Json(EmptyResponse::default()))
}

/// List the signed-in user's transactions, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/transaction",
    tag = "Transactions",
    params(TransactionListQuery),
    responses(
        (status = 200, description = "Transactions", body = TransactionListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 503, description = "Wallet service unavailable")
    )
)]
pub async fn list_transactions(
    Auth(user): Auth,
    State(state): State<AppState>,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<TransactionListResponse>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let transactions = state
        .wallet
        .client_for_access_key(&user.access_key)?
        .get_transactions(page, page_size)
        .await?;

    Ok(Json(TransactionListResponse {
        transactions: transactions.iter().map(TransactionSummary::from).collect(),
    }))
}
