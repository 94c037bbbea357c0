// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Real-time Notifications
//!
//! One WebSocket per user, upgraded from a request that already passed the
//! session guard. The socket's identity is the guard's identity; there is no
//! second credential exchange.
//!
//! ## Connection lifecycle
//!
//! `Connecting → Authenticated → Notifiable → Disconnected`
//!
//! - Upgrade carries the [`crate::auth::AuthenticatedUser`] from the guard
//! - [`NotificationGateway::connect`] registers the connection (last writer
//!   wins per user)
//! - The client must send `refresh` within the liveness window or the socket
//!   is closed
//! - On close the entry is removed only if it still belongs to this
//!   connection
//!
//! Delivery is best effort. Events for users without a live connection are
//! dropped and never replayed.

pub mod event;
pub mod gateway;
pub mod protocol;
pub mod registry;

pub use event::{
    TransactionEvent, TransactionStatus, TransactionSummary, CREATE_TRANSACTION_EVENT,
};
pub use gateway::{Connection, GatewayConfig, GatewayError, NotificationGateway};
pub use protocol::{ClientMessage, ServerMessage};
pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, PushError};
