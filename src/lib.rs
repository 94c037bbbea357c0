// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Custodial Wallet Backend
//!
//! Backend-for-frontend of a custodial paymail wallet. Users hold a cookie
//! session; their wallet key is stored encrypted under their password and
//! only unlocked for the request that needs it. Transaction outcomes are
//! pushed to the browser over a session-authenticated WebSocket.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Session guard and authenticated identity
//! - `crypto` - Password hashing and secret encryption
//! - `dispatch` - Background transaction recording
//! - `notify` - Connection registry and WebSocket gateway
//! - `session` - Signed-cookie sessions
//! - `users` - User records
//! - `wallet` - Wallet service client

pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod notify;
pub mod session;
pub mod state;
pub mod users;
pub mod wallet;
