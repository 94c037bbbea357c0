// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Events pushed to live connections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use utoipa::ToSchema;

use crate::wallet::{Direction, Transaction};

/// `eventType` of the terminal transaction-creation event.
pub const CREATE_TRANSACTION_EVENT: &str = "create_transaction";

/// Confirmation state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Confirmed,
    Unconfirmed,
}

/// Client-facing view of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    pub id: String,
    pub sender: String,
    pub receiver: String,
    pub direction: Direction,
    pub status: TransactionStatus,
    pub total_value: u64,
    pub fee: u64,
    pub created_at: DateTime<Utc>,
}

impl From<&Transaction> for TransactionSummary {
    fn from(tx: &Transaction) -> Self {
        let (sender, receiver) = tx
            .metadata
            .as_ref()
            .map(|m| (m.sender.clone(), m.receiver.clone()))
            .unwrap_or_default();

        Self {
            id: tx.id.clone(),
            sender,
            receiver,
            direction: tx.direction,
            status: if tx.is_confirmed() {
                TransactionStatus::Confirmed
            } else {
                TransactionStatus::Unconfirmed
            },
            total_value: tx.total_value,
            fee: tx.fee,
            created_at: tx.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum EventStatus {
    Success,
    Error,
}

/// Terminal outcome of an asynchronous transaction.
///
/// Serialises to `{"status", "error", "eventType", "transaction"}`; `error`
/// is null on success and `transaction` is null on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionEvent {
    Success(TransactionSummary),
    Error(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionEventWire<'a> {
    status: EventStatus,
    error: Option<&'a str>,
    event_type: &'static str,
    transaction: Option<&'a TransactionSummary>,
}

impl TransactionEvent {
    pub fn event_type(&self) -> &'static str {
        CREATE_TRANSACTION_EVENT
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TransactionEvent::Success(_))
    }
}

impl Serialize for TransactionEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            TransactionEvent::Success(summary) => TransactionEventWire {
                status: EventStatus::Success,
                error: None,
                event_type: self.event_type(),
                transaction: Some(summary),
            },
            TransactionEvent::Error(message) => TransactionEventWire {
                status: EventStatus::Error,
                error: Some(message),
                event_type: self.event_type(),
                transaction: None,
            },
        };
        wire.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::TransactionMetadata;
    use serde_json::json;

    fn transaction(block_height: u64) -> Transaction {
        Transaction {
            id: "tx-1".into(),
            block_height,
            direction: Direction::Outgoing,
            total_value: 1500,
            fee: 2,
            created_at: "2026-01-02T03:04:05Z".parse().unwrap(),
            metadata: Some(TransactionMetadata {
                sender: "alice@example.com".into(),
                receiver: "bob@example.com".into(),
            }),
        }
    }

    #[test]
    fn status_follows_block_height() {
        assert_eq!(
            TransactionSummary::from(&transaction(0)).status,
            TransactionStatus::Unconfirmed
        );
        assert_eq!(
            TransactionSummary::from(&transaction(812_000)).status,
            TransactionStatus::Confirmed
        );
    }

    #[test]
    fn missing_metadata_gives_empty_parties() {
        let mut tx = transaction(0);
        tx.metadata = None;
        let summary = TransactionSummary::from(&tx);
        assert_eq!(summary.sender, "");
        assert_eq!(summary.receiver, "");
    }

    #[test]
    fn success_wire_format() {
        let event = TransactionEvent::Success(TransactionSummary::from(&transaction(0)));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "status": "success",
                "error": null,
                "eventType": "create_transaction",
                "transaction": {
                    "id": "tx-1",
                    "sender": "alice@example.com",
                    "receiver": "bob@example.com",
                    "direction": "outgoing",
                    "status": "unconfirmed",
                    "totalValue": 1500,
                    "fee": 2,
                    "createdAt": "2026-01-02T03:04:05Z"
                }
            })
        );
    }

    #[test]
    fn error_wire_format() {
        let event = TransactionEvent::Error("broadcast failed".into());
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "status": "error",
                "error": "broadcast failed",
                "eventType": "create_transaction",
                "transaction": null
            })
        );
        assert!(!event.is_success());
    }
}
