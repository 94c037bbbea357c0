// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

use crate::{auth::Auth, state::AppState};

/// Upgrade to the notification socket.
///
/// The socket inherits the identity established by the session guard for
/// this request.
#[utoipa::path(
    get,
    path = "/api/websocket",
    tag = "Notifications",
    responses(
        (status = 101, description = "Switching to WebSocket"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn connect(
    Auth(user): Auth,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    let gateway = state.gateway.clone();
    ws.on_upgrade(move |socket| gateway.serve(socket, user))
}
