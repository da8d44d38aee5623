//! Echo server: configuration, the gated service and the listener wiring.

use std::future::Future;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic_health::server::{health_reporter, HealthReporter};
use tracing::{info, warn};

use crate::auth::{AuthGate, CredentialStore};
use crate::proto::echo_service_server::EchoServiceServer;
use crate::{tls, Error, Result};

/// Server configuration.
pub mod config;

/// gRPC service implementation.
pub mod service;

pub use config::{MetricsSettings, ServerConfig, TlsSettings};
pub use service::EchoServiceImpl;

/// How long in-flight calls get to finish once shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// A configured echo server, ready to accept connections.
#[derive(Debug)]
pub struct EchoServer {
    config: ServerConfig,
    gate: AuthGate,
}

impl EchoServer {
    /// Validates `config` and builds the gate from its secret and policy.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the configuration is unusable.
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let gate = AuthGate::new(
            CredentialStore::new(config.secret.clone()),
            config.auth.clone(),
        );

        Ok(Self { config, gate })
    }

    /// The server's configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the configured address and serves until `signal` resolves.
    pub async fn run<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let addr = self.config.addr()?;
        let listener = TcpListener::bind(addr).await.map_err(|source| Error::Io {
            path: addr.to_string(),
            source,
        })?;

        self.serve(listener, signal).await
    }

    /// Serves on an already bound listener until `signal` resolves, then reports
    /// `NOT_SERVING` and gives in-flight calls a short grace period.
    ///
    /// The echo service is only reachable through the [`AuthGate`]. The standard health
    /// service is registered alongside it, ungated.
    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let local_addr = listener.local_addr().ok();

        let mut builder = Server::builder();
        if self.config.tls.enabled {
            let tls = tls::server_tls_config(
                &self.config.tls.cert_path,
                &self.config.tls.key_path,
                self.config.tls.client_ca_path.as_deref(),
                self.config.auth.require_verified_chain,
            )?;
            builder = builder.tls_config(tls)?;
        } else {
            warn!("TLS disabled: every echo call will be rejected");
        }

        let (mut reporter, health_service) = health_reporter();
        reporter
            .set_serving::<EchoServiceServer<EchoServiceImpl>>()
            .await;

        let echo = EchoServiceServer::with_interceptor(EchoServiceImpl::new(), self.gate);

        info!(
            addr = ?local_addr,
            tls = self.config.tls.enabled,
            mutual_tls = self.config.tls.client_ca_path.is_some(),
            "echo server listening"
        );

        builder
            .add_service(health_service)
            .add_service(echo)
            .serve_with_incoming_shutdown(
                TcpListenerStream::new(listener),
                drain(reporter, signal),
            )
            .await?;

        info!("echo server stopped");
        Ok(())
    }
}

async fn drain<F>(mut reporter: HealthReporter, signal: F)
where
    F: Future<Output = ()>,
{
    signal.await;

    reporter
        .set_not_serving::<EchoServiceServer<EchoServiceImpl>>()
        .await;

    info!("Initiating graceful shutdown (allowing in-flight requests to complete)");
    tokio::time::sleep(SHUTDOWN_GRACE).await;
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
