// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Wallet Service Integration
//!
//! The wallet service holds UTXOs, builds drafts and records transactions.
//! This module defines the narrow seam the rest of the crate talks to:
//!
//! - [`WalletProvider`] is process-wide and hands out credential-scoped
//!   clients.
//! - [`WalletClient`] performs calls on behalf of one credential (either the
//!   user's xpriv or a session access key).
//!
//! [`HttpWalletProvider`] implements the seam over HTTP. Every call is a
//! network round trip that may fail.

use std::sync::Arc;

use async_trait::async_trait;

pub mod http;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use http::HttpWalletProvider;
pub use types::*;

/// Errors returned by the wallet service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WalletError {
    #[error("wallet service unreachable: {0}")]
    Transport(String),

    #[error("wallet service rejected the credential")]
    Unauthorized,

    #[error("wallet service error ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected wallet service response: {0}")]
    Decode(String),

    #[error("invalid wallet request: {0}")]
    InvalidInput(String),
}

/// Calls made on behalf of a single credential.
#[async_trait]
pub trait WalletClient: Send + Sync {
    async fn get_access_key(&self, id: &str) -> Result<AccessKey, WalletError>;

    async fn create_access_key(&self) -> Result<AccessKey, WalletError>;

    async fn revoke_access_key(&self, id: &str) -> Result<AccessKey, WalletError>;

    async fn draft_transaction(
        &self,
        recipients: &[Recipient],
        metadata: &TransactionMetadata,
    ) -> Result<DraftTransaction, WalletError>;

    async fn finalize_transaction(
        &self,
        draft: &DraftTransaction,
    ) -> Result<FinalizedTransaction, WalletError>;

    async fn record_transaction(
        &self,
        finalized: &FinalizedTransaction,
        metadata: &TransactionMetadata,
    ) -> Result<Transaction, WalletError>;

    async fn get_transactions(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Transaction>, WalletError>;

    async fn get_balance(&self) -> Result<Balance, WalletError>;
}

/// Factory for credential-scoped clients plus admin operations.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    fn client_for_xpriv(&self, xpriv: &str) -> Result<Arc<dyn WalletClient>, WalletError>;

    fn client_for_access_key(&self, access_key: &str)
        -> Result<Arc<dyn WalletClient>, WalletError>;

    /// Provision a new wallet and its paymail address.
    async fn register_wallet(&self, paymail: &str) -> Result<NewWallet, WalletError>;
}
