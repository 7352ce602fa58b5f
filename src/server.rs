//! Web server

use crate::cli;

use std::{net::SocketAddr, str::FromStr, time::Duration};

use axum::ServiceExt;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use expanduser::expanduser;
use thiserror::Error;
use tokio::signal;

/// Errors preventing the server from starting or running.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be parsed
    #[error("invalid host name, IP address or port number {0}")]
    Address(String),

    /// A TLS file path could not be resolved
    #[error("TLS {kind} file expected at '{path}' but not found")]
    TlsFile {
        kind: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error loading TLS files or serving requests
    #[error("server error")]
    Io(#[from] std::io::Error),
}

/// Resolve a TLS file path, expanding `~`.
fn tls_file(kind: &'static str, path: &str) -> Result<std::path::PathBuf, ServerError> {
    expanduser(path)
        .and_then(|path| path.canonicalize())
        .map_err(|source| ServerError::TlsFile {
            kind,
            path: path.to_string(),
            source,
        })
}

/// Serve the diet insights service
///
/// # Arguments
///
/// * `args`: Command line arguments
/// * `service`: The [crate::app::Service] to serve
pub async fn serve(
    args: &cli::CommandLineArgs,
    service: crate::app::Service,
) -> Result<(), ServerError> {
    let address = format!("{}:{}", args.host, args.port);
    let addr = SocketAddr::from_str(&address).map_err(|_| ServerError::Address(address))?;

    // Catch ctrl+c and try to shutdown gracefully
    let handle = Handle::new();
    tokio::spawn(shutdown_signal(
        handle.clone(),
        args.graceful_shutdown_timeout,
    ));

    if args.https {
        let abs_cert_file = tls_file("certificate", &args.cert_file)?;
        let abs_key_file = tls_file("key", &args.key_file)?;
        let tls_config = RustlsConfig::from_pem_file(abs_cert_file, abs_key_file).await?;
        tracing::info!("listening on https://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(service.into_make_service())
            .await?;
    } else {
        tracing::info!("listening on http://{}", addr);
        axum_server::bind(addr)
            .handle(handle)
            .serve(service.into_make_service())
            .await?;
    }
    Ok(())
}

/// Graceful shutdown handler
///
/// Installs signal handlers to catch Ctrl-C or SIGTERM and trigger a graceful shutdown.
async fn shutdown_signal(handle: Handle, timeout: u64) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", error);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install SIGTERM handler: {}", error);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
    // Force shutdown if graceful shutdown takes longer than the timeout
    handle.graceful_shutdown(Some(Duration::from_secs(timeout)));
}
