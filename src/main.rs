// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use custodial_wallet_backend::{
    api::router,
    config::AppConfig,
    logging,
    session::{InMemorySessionStore, SessionReaper, SessionStore},
    state::AppState,
    users::InMemoryUserStore,
    wallet::HttpWalletProvider,
};

/// Time given to in-flight requests after a shutdown signal.
const GRACEFUL_SHUTDOWN: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    logging::init(config.log_format);

    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let wallet = HttpWalletProvider::new(
        config.wallet_url.clone(),
        config.wallet_admin_key.as_str(),
    )
    .expect("Failed to build wallet service client");

    let session_store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let (state, workers) = AppState::new(
        &config,
        Arc::new(wallet),
        Arc::new(InMemoryUserStore::new()),
        session_store.clone(),
    );
    let app = router(state, &config.cors_allowed_origins);

    let shutdown = CancellationToken::new();
    let reaper = tokio::spawn(SessionReaper::new(session_store).run(shutdown.clone()));

    let handle: Handle<std::net::SocketAddr> = Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
            handle.graceful_shutdown(Some(GRACEFUL_SHUTDOWN));
        }
    });

    let addr = config.bind_addr;
    let served = match &config.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .expect("Failed to load TLS certificate and key");
            info!(%addr, "Wallet backend listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
        None => {
            warn!(%addr, "TLS not configured; serving plain http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
    };
    if let Err(e) = served {
        error!(error = %e, "Server failed");
    }

    // Also reached when the server fails without a signal.
    shutdown.cancel();
    workers.shutdown().await;
    let _ = reaper.await;
    info!("Shutdown complete");
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("Ctrl+C handler");
        info!("Received Ctrl+C");
    }
}
