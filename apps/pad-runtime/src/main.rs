// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

use std::{process::ExitCode, sync::Arc, time::Duration};

use axum_server::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cipherpad_runtime::{
    api::router,
    audit_log,
    config::{LogFormat, RuntimeConfig, DEFAULT_LOG_FILTER},
    contracts::default_registry,
    crypto::{KeyError, WorkerIdentity},
    runtime::{Runtime, RuntimeError},
    state::AppState,
    storage::{
        AuditEvent, AuditEventType, EncryptedStorage, ReceiptDatabase, ReceiptDbError,
        StorageError, StoragePaths,
    },
    tls::{self, TlsError},
};

/// Time given to in-flight requests once shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);
/// Timeout for outbound HTTP made by side tasks.
const HTTP_CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("worker key: {0}")]
    Key(#[from] KeyError),
    #[error("receipt database: {0}")]
    Receipts(#[from] ReceiptDbError),
    #[error("runtime: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("tls: {0}")]
    Tls(#[from] TlsError),
    #[error("http client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("server: {0}")]
    Server(#[from] std::io::Error),
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match RuntimeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.log_format);

    // Must happen before any TLS operation.
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed");
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Runtime failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: RuntimeConfig) -> Result<(), StartupError> {
    let mut storage = EncryptedStorage::new(StoragePaths::new(&config.data_dir));
    storage.initialize()?;
    storage.health_check()?;
    let storage = Arc::new(storage);
    info!(data_dir = %config.data_dir.display(), "Encrypted storage ready");

    let (identity, created) = WorkerIdentity::load_or_create(&storage)?;
    if created {
        audit_log!(
            storage.as_ref(),
            AuditEvent::new(AuditEventType::WorkerKeyCreated)
                .with_actor(identity.account_id().to_hex())
        );
    }
    info!(
        public_key = %identity.public_key_hex(),
        account = %identity.account_id(),
        created,
        "Worker identity loaded"
    );

    let receipts = Arc::new(ReceiptDatabase::open(&storage.paths().receipts_db())?);

    let client = reqwest::Client::builder()
        .timeout(HTTP_CLIENT_TIMEOUT)
        .build()?;
    let registry = default_registry(&config.contracts, client);
    let mut runtime = Runtime::new(identity, config.contracts.root, registry)
        .with_storage(storage.clone())
        .with_receipts(receipts.clone());
    if !runtime.restore()? {
        info!("No sealed snapshot found, starting at genesis");
    }

    if config.auth.jwt_secret.is_none() {
        warn!("RELAYER_JWT_SECRET not set: operator tokens are NOT verified (development mode)");
    }
    let state = AppState::new(runtime, storage, receipts).with_auth_config(config.auth.clone());
    let app = router(state.clone());

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));
    let handle = Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        let shutdown = shutdown.clone();
        async move {
            shutdown.cancelled().await;
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        }
    });

    match &config.tls {
        Some(paths) => {
            let tls_config = tls::server_config(paths)?;
            info!(addr = %config.bind_addr, "Cipherpad runtime listening on https (docs at /docs)");
            axum_server::bind_rustls(config.bind_addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            warn!(addr = %config.bind_addr, "TLS not configured, serving plain HTTP (docs at /docs)");
            axum_server::bind(config.bind_addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    let mut runtime = state.runtime.write().await;
    runtime.shutdown();
    if let Err(e) = runtime.persist() {
        warn!(error = %e, "Failed to seal final snapshot");
    }
    info!(block_number = runtime.block_number(), "Runtime stopped");
    Ok(())
}

/// Cancel `token` on SIGINT or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
        _ = token.cancelled() => {}
    }
    token.cancel();
}
