// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::session_auth,
    notify::{TransactionStatus, TransactionSummary},
    state::AppState,
    wallet::Direction,
};

pub mod health;
pub mod sessions;
pub mod transactions;
pub mod users;
pub mod websocket;

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    let guard = from_fn_with_state(state.clone(), session_auth);

    let v1_routes = Router::new()
        .route(
            "/user",
            get(users::current_user)
                .route_layer(guard.clone())
                .post(users::register),
        )
        .route("/sign-in", post(sessions::sign_in))
        .route(
            "/sign-out",
            post(sessions::sign_out).route_layer(guard.clone()),
        )
        .route(
            "/transaction",
            get(transactions::list_transactions)
                .post(transactions::create_transaction)
                .route_layer(guard.clone()),
        );

    Router::new()
        .nest("/api/v1", v1_routes)
        .route("/api/websocket", get(websocket::connect).route_layer(guard))
        .route("/health", get(health::health))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors(cors_origins))
}

/// Credentialed CORS for the configured origins, permissive when none are set.
fn cors(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        users::register,
        users::current_user,
        sessions::sign_in,
        sessions::sign_out,
        transactions::create_transaction,
        transactions::list_transactions,
        websocket::connect
    ),
    components(
        schemas(
            health::HealthResponse,
            users::RegisterRequest,
            users::UserResponse,
            sessions::SignInRequest,
            sessions::SignInResponse,
            sessions::EmptyResponse,
            transactions::CreateTransactionRequest,
            transactions::TransactionListResponse,
            TransactionSummary,
            TransactionStatus,
            Direction
        )
    ),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Users", description = "Registration and profile"),
        (name = "Sessions", description = "Cookie session sign-in and sign-out"),
        (name = "Transactions", description = "Sending and listing transactions"),
        (name = "Notifications", description = "Real-time WebSocket events")
    )
)]
struct ApiDoc;
