// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{process::ExitCode, sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;

use ledger_gateway_proxy::{
    api::router,
    config::ProxyConfig,
    error::ErrorTranslator,
    session::Session,
    startup::{session_config, Startup},
    state::AppState,
    telemetry,
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> ExitCode {
    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = match ProxyConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("invalid configuration: {error}");
            return ExitCode::FAILURE;
        }
    };
    telemetry::init(config.log_format);

    let addr = match config.bind_address() {
        Ok(addr) => addr,
        Err(error) => {
            tracing::error!(error = %error, "Invalid bind address");
            return ExitCode::FAILURE;
        }
    };

    let session = Arc::new(Session::new(session_config(&config)));
    let state = AppState::new(session.clone(), ErrorTranslator::new(config.status_policy));
    let app = router(state);

    // Provisioning runs alongside the listener; requests answer NotReady
    // until the session is connected.
    let shutdown = CancellationToken::new();
    let startup = match Startup::from_config(&config, session.clone()) {
        Ok(startup) => Some(tokio::spawn(startup.run(shutdown.clone()))),
        Err(error) => {
            tracing::error!(error = %error, "Startup configuration failed; serving without a ledger session");
            None
        }
    };

    let served = match &config.tls {
        Some(tls) => {
            let tls_config = match RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await
            {
                Ok(tls_config) => tls_config,
                Err(error) => {
                    tracing::error!(error = %error, "Failed to load TLS certificate");
                    return ExitCode::FAILURE;
                }
            };
            tracing::info!(%addr, mode = ?config.ledger_mode, "Ledger gateway proxy listening on https (docs at /docs)");

            let handle = Handle::new();
            let signal_handle = handle.clone();
            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                signal_token.cancel();
                signal_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
            });

            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
        None => {
            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(error) => {
                    tracing::error!(%addr, error = %error, "Failed to bind listener");
                    return ExitCode::FAILURE;
                }
            };
            tracing::info!(%addr, mode = ?config.ledger_mode, "Ledger gateway proxy listening on http (docs at /docs)");

            let signal_token = shutdown.clone();
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_signal().await;
                    signal_token.cancel();
                })
                .await
        }
    };

    shutdown.cancel();
    if let Some(task) = startup {
        let _ = task.await;
    }
    if let Some(init) = session.take_init_task() {
        init.abort();
    }

    match served {
        Ok(()) => {
            tracing::info!("Ledger gateway proxy stopped");
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(error = %error, "Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %error, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                tracing::warn!(error = %error, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
