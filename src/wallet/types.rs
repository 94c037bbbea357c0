// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet service types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use zeroize::Zeroizing;

/// Access key as reported by the wallet service.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessKey {
    pub id: String,
    /// Only returned when the key is created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl AccessKey {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

impl fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessKey")
            .field("id", &self.id)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("revoked_at", &self.revoked_at)
            .finish()
    }
}

/// One transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub to: String,
    pub satoshis: u64,
}

/// Metadata attached to drafted and recorded transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    pub sender: String,
    pub receiver: String,
}

/// A drafted, not yet signed transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftTransaction {
    pub id: String,
    #[serde(default)]
    pub hex: String,
}

/// A signed transaction ready to be recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedTransaction {
    pub draft_id: String,
    pub hex: String,
}

/// Transaction direction relative to the wallet owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
    Reconcile,
    Unknown,
}

/// A recorded transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(default)]
    pub block_height: u64,
    pub direction: Direction,
    pub total_value: u64,
    #[serde(default)]
    pub fee: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<TransactionMetadata>,
}

impl Transaction {
    /// A transaction counts as confirmed once it has been mined.
    pub fn is_confirmed(&self) -> bool {
        self.block_height > 0
    }
}

/// Spendable balance of a wallet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub satoshis: u64,
}

/// A freshly provisioned wallet. The xpriv is wiped on drop.
pub struct NewWallet {
    pub xpriv: Zeroizing<String>,
    pub paymail: String,
}

impl fmt::Debug for NewWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewWallet")
            .field("paymail", &self.paymail)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_key_debug_redacts_key() {
        let key = AccessKey {
            id: "ak_1".to_string(),
            key: Some("very-secret".to_string()),
            created_at: None,
            revoked_at: None,
        };
        let rendered = format!("{key:?}");
        assert!(rendered.contains("ak_1"));
        assert!(!rendered.contains("very-secret"));
    }

    #[test]
    fn transaction_confirmation_follows_block_height() {
        let mut tx: Transaction = serde_json::from_value(serde_json::json!({
            "id": "tx1",
            "direction": "outgoing",
            "totalValue": 1500,
            "createdAt": "2026-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(!tx.is_confirmed());
        assert_eq!(tx.fee, 0);

        tx.block_height = 812_000;
        assert!(tx.is_confirmed());
    }
}
