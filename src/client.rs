//! Client for the echo service.
//!
//! Every call goes out with bearer credentials attached and a bounded deadline. The
//! credentials refuse to travel over a channel that is not TLS-encrypted.

use std::path::PathBuf;
use std::time::Duration;

use tonic::service::interceptor::InterceptedService;
use tonic::transport::{Channel, Endpoint};
use tonic::Request;
use tracing::debug;

use crate::auth::{BearerCredentials, Secret, TransportSecurity};
use crate::proto::echo_service_client::EchoServiceClient;
use crate::proto::EchoRequest;
use crate::{tls, Error, Result};

/// Default per-call deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Client certificate and key presented for mutual TLS.
#[derive(Clone, Debug)]
pub struct ClientIdentity {
    /// Certificate chain (PEM).
    pub cert_path: PathBuf,
    /// Private key (PEM).
    pub key_path: PathBuf,
}

/// Connection settings for [`EchoClient`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Server URI, e.g. `https://localhost:50051`.
    pub address: String,
    /// Trusted root for the server certificate. `None` means plaintext, which the bearer
    /// credentials will refuse to use.
    pub ca_path: Option<PathBuf>,
    /// Name the server certificate must be valid for.
    pub domain: String,
    /// Optional client identity for mutual TLS.
    pub identity: Option<ClientIdentity>,
    /// Shared bearer secret.
    pub secret: Secret,
    /// Deadline applied to connecting and to every call.
    pub timeout: Duration,
}

impl ClientConfig {
    /// TLS settings for `address`, trusting `ca_path` and expecting `domain`.
    pub fn new(
        address: impl Into<String>,
        ca_path: impl Into<PathBuf>,
        domain: impl Into<String>,
        secret: Secret,
    ) -> Self {
        Self {
            address: address.into(),
            ca_path: Some(ca_path.into()),
            domain: domain.into(),
            identity: None,
            secret,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Adds a client certificate for mutual TLS.
    pub fn with_identity(mut self, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        self.identity = Some(ClientIdentity {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        });
        self
    }

    /// Overrides the per-call deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Authenticated echo client.
#[derive(Debug, Clone)]
pub struct EchoClient {
    inner: EchoServiceClient<InterceptedService<Channel, BearerCredentials>>,
    timeout: Duration,
}

impl EchoClient {
    /// Connects to the server described by `config`.
    ///
    /// Handshake, DNS and connect failures are reported as [`Error::Transport`] and are not
    /// retried. A connection that is not established within the configured timeout,
    /// including a stalled TLS handshake, yields [`Error::Timeout`].
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let (endpoint, transport) = endpoint(&config)?;
        let credentials = BearerCredentials::new(&config.secret, transport)?;

        // connect_timeout only bounds TCP; a peer can still stall the TLS handshake.
        let channel = tokio::time::timeout(config.timeout, endpoint.connect())
            .await
            .map_err(|_| Error::Timeout(config.timeout))??;
        debug!(
            address = %config.address,
            transport = ?credentials.transport(),
            "connected"
        );

        Ok(Self {
            inner: EchoServiceClient::with_interceptor(channel, credentials),
            timeout: config.timeout,
        })
    }

    /// Calls `Echo` and returns the greeting.
    ///
    /// The deadline is sent to the server as `grpc-timeout` and enforced locally; when it
    /// elapses the call is dropped and [`Error::Timeout`] returned.
    pub async fn echo(&mut self, text: impl Into<String>) -> Result<String> {
        let mut request = Request::new(EchoRequest { text: text.into() });
        request.set_timeout(self.timeout);

        match tokio::time::timeout(self.timeout, self.inner.echo(request)).await {
            Ok(Ok(response)) => Ok(response.into_inner().text),
            Ok(Err(status)) => Err(Error::Rpc(status)),
            Err(_) => Err(Error::Timeout(self.timeout)),
        }
    }
}

fn endpoint(config: &ClientConfig) -> Result<(Endpoint, TransportSecurity)> {
    let endpoint = Endpoint::from_shared(config.address.clone())?
        .connect_timeout(config.timeout);
    let https = endpoint.uri().scheme_str() == Some("https");

    let Some(ca_path) = &config.ca_path else {
        return Ok((endpoint, TransportSecurity::Plaintext));
    };

    // tonic only wraps https:// URIs in TLS, even when a TLS config is present.
    if !https {
        return Err(Error::Config(format!(
            "TLS requires an https:// address, got {}",
            config.address
        )));
    }

    let identity = config
        .identity
        .as_ref()
        .map(|id| (id.cert_path.as_path(), id.key_path.as_path()));
    let tls = tls::client_tls_config(ca_path, &config.domain, identity)?;

    Ok((endpoint.tls_config(tls)?, TransportSecurity::Tls))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> Secret {
        Secret::new("the-secret-token").unwrap()
    }

    #[test]
    fn plaintext_config_builds_plaintext_endpoint() {
        let mut config = ClientConfig::new("http://127.0.0.1:50051", "ca.pem", "localhost", secret());
        config.ca_path = None;

        let (_, transport) = endpoint(&config).unwrap();
        assert_eq!(transport, TransportSecurity::Plaintext);
    }

    #[test]
    fn tls_over_http_scheme_is_rejected() {
        let config = ClientConfig::new("http://127.0.0.1:50051", "ca.pem", "localhost", secret());
        assert!(matches!(endpoint(&config), Err(Error::Config(_))));
    }

    #[test]
    fn missing_trust_root_is_an_io_error() {
        let config = ClientConfig::new("https://127.0.0.1:50051", "no/such/ca.pem", "localhost", secret());
        assert!(matches!(endpoint(&config), Err(Error::Io { .. })));
    }

    #[test]
    fn builder_defaults() {
        let config = ClientConfig::new("https://localhost:50051", "ca.pem", "localhost", secret())
            .with_identity("c.pem", "c.key")
            .with_timeout(Duration::from_millis(250));

        assert_eq!(config.timeout, Duration::from_millis(250));
        assert!(config.identity.is_some());
    }
}
