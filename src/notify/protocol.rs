// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Notification socket message types.
//!
//! JSON text frames tagged by `type`. Transaction events are not wrapped:
//! they go out as the bare event object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::UserId;

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to the personal channel `#<userId>` with presence.
    Subscribe { channel: String },

    /// Extend the connection's liveness window.
    Refresh,

    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        connection_id: Uuid,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    },

    Subscribed {
        channel: String,
        presence: Vec<UserId>,
    },

    Refreshed { expires_at: DateTime<Utc> },

    Pong,

    Error { message: String },
}

/// Personal channel name for a user.
pub fn user_channel(user_id: UserId) -> String {
    format!("#{user_id}")
}
