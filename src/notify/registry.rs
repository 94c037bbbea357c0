// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Live connection registry.
//!
//! At most one connection per user. A later registration replaces the earlier
//! one; removal compares the connection id so a stale connection closing
//! never evicts its replacement.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::Span;
use uuid::Uuid;

use crate::users::UserId;

pub type ConnectionId = Uuid;

/// Why a push did not reach the connection's outbound buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    #[error("connection outbound buffer is full")]
    Full,

    #[error("connection is closed")]
    Closed,
}

/// Identity of one live connection, shared by its registry entry and its
/// socket task.
#[derive(Clone)]
pub struct ConnectionInfo {
    id: ConnectionId,
    user_id: UserId,
    span: Span,
    presence: Arc<AtomicBool>,
}

impl ConnectionInfo {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Logging span of this connection.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn set_presence(&self, tracked: bool) {
        self.presence.store(tracked, Ordering::Relaxed);
    }

    pub fn tracks_presence(&self) -> bool {
        self.presence.load(Ordering::Relaxed)
    }
}

/// Push-capable handle for one live connection.
///
/// The registry entry holds the only sender, so dropping a replaced entry
/// closes that connection's outbound channel.
pub struct ConnectionHandle {
    info: ConnectionInfo,
    sender: mpsc::Sender<String>,
}

impl ConnectionHandle {
    pub fn new(user_id: UserId, sender: mpsc::Sender<String>, span: Span) -> Self {
        Self {
            info: ConnectionInfo {
                id: Uuid::new_v4(),
                user_id,
                span,
                presence: Arc::new(AtomicBool::new(false)),
            },
            sender,
        }
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub fn id(&self) -> ConnectionId {
        self.info.id
    }

    pub fn user_id(&self) -> UserId {
        self.info.user_id
    }

    pub fn tracks_presence(&self) -> bool {
        self.info.tracks_presence()
    }

    /// Queue a text frame without waiting for buffer space.
    pub fn push(&self, payload: String) -> Result<(), PushError> {
        self.sender.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => PushError::Full,
            TrySendError::Closed(_) => PushError::Closed,
        })
    }
}

/// User id → live connection.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<UserId, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle`, returning the connection it replaced, if any.
    pub fn register(&self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.connections.insert(handle.user_id(), handle)
    }

    /// Remove the entry for `user_id` only if it is still `connection_id`.
    pub fn deregister(&self, user_id: UserId, connection_id: ConnectionId) -> bool {
        self.connections
            .remove_if(&user_id, |_, handle| handle.id() == connection_id)
            .is_some()
    }

    pub fn lookup(&self, user_id: UserId) -> Option<ConnectionInfo> {
        self.connections.get(&user_id).map(|entry| entry.info().clone())
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.connections.contains_key(&user_id)
    }

    /// Push under the entry's shard lock.
    ///
    /// Returns `None` when the user has no connection.
    pub fn push(&self, user_id: UserId, payload: String) -> Option<Result<ConnectionId, PushError>> {
        self.connections
            .get(&user_id)
            .map(|entry| entry.push(payload).map(|()| entry.id()))
    }

    /// Users whose connection subscribed with presence tracking.
    pub fn presence(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self
            .connections
            .iter()
            .filter(|entry| entry.tracks_presence())
            .map(|entry| *entry.key())
            .collect();
        users.sort_unstable();
        users
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
