use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::auth::{GatePolicy, Secret};
use crate::{Error, Result};

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname or IP address to bind to.
    pub host: String,
    /// Port number to listen on.
    pub port: u16,
    /// Shared bearer secret expected from clients.
    pub secret: Secret,
    /// TLS configuration.
    pub tls: TlsSettings,
    /// Certificate checks applied by the gate.
    #[serde(default)]
    pub auth: GatePolicy,
    /// Metrics exporter configuration.
    pub metrics: MetricsSettings,
}

/// TLS configuration settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TlsSettings {
    /// Whether TLS is enabled. Without it the gate rejects every call.
    pub enabled: bool,
    /// Path to TLS certificate file (PEM format).
    pub cert_path: PathBuf,
    /// Path to TLS private key file (PEM format).
    pub key_path: PathBuf,
    /// Root used to verify client certificates. Enables mutual TLS.
    #[serde(default)]
    pub client_ca_path: Option<PathBuf>,
}

/// Metrics exporter settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// Whether metrics export is enabled.
    pub enabled: bool,
    /// Hostname or IP address for metrics server.
    pub host: String,
    /// Port number for metrics server.
    pub port: u16,
}

impl MetricsSettings {
    /// Converts host and port into a socket address for the metrics listener.
    pub fn addr(&self) -> Result<SocketAddr> {
        parse_addr(&self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 50051,
            secret: Secret::new("secret").unwrap_or_else(|_| unreachable!("literal is non-empty")),
            tls: TlsSettings {
                enabled: true,
                cert_path: PathBuf::from("secrets/cert.pem"),
                key_path: PathBuf::from("secrets/key.pem"),
                client_ca_path: None,
            },
            auth: GatePolicy::default(),
            metrics: MetricsSettings {
                enabled: false,
                host: "127.0.0.1".to_string(),
                port: 9090,
            },
        }
    }
}

impl ServerConfig {
    /// Converts host and port into a socket address.
    pub fn addr(&self) -> Result<SocketAddr> {
        parse_addr(&self.host, self.port)
    }

    /// Loads configuration from `.env` file, TOML file, and environment variables.
    ///
    /// Configuration priority (highest to lowest):
    /// 1. Environment variables with `SERVER_` prefix
    /// 2. TOML configuration file (if exists)
    /// 3. `.env` file (if exists)
    /// 4. Built-in defaults
    ///
    /// The TOML file path can be set via `SERVER_CONFIG_PATH`, defaulting to
    /// `./config/server.toml`. A missing file is skipped.
    ///
    /// Nested keys are separated by a double underscore:
    /// ```bash
    /// SERVER_PORT=50051
    /// SERVER_SECRET=the-secret-token
    /// SERVER_TLS__CERT_PATH=/etc/certs/server.crt
    /// SERVER_TLS__KEY_PATH=/etc/certs/server.key
    /// SERVER_TLS__CLIENT_CA_PATH=/etc/certs/clients.pem
    /// SERVER_AUTH__REQUIRE_VERIFIED_CHAIN=true
    /// SERVER_METRICS__ENABLED=true
    /// ```
    ///
    /// # Errors
    /// Returns an error if the configuration is malformed or contains invalid values.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let config_path = std::env::var("SERVER_CONFIG_PATH")
            .unwrap_or_else(|_| "config/server.toml".to_string());

        Self::load(&config_path)
    }

    /// Loads defaults, then `path`, then `SERVER_` environment variables.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        use figment::providers::{Env, Format, Serialized, Toml};
        use figment::Figment;

        Figment::from(Serialized::defaults(ServerConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(
                Env::prefixed("SERVER_")
                    .ignore(&["CONFIG_PATH"])
                    .split("__"),
            )
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Validates the configuration before the server starts.
    ///
    /// # Errors
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.addr()?;

        if self.tls.enabled {
            check_file("TLS certificate", &self.tls.cert_path)?;
            check_file("TLS key", &self.tls.key_path)?;
            if let Some(ca) = &self.tls.client_ca_path {
                check_file("client CA", ca)?;
            }
        }

        if (self.auth.require_verified_chain || self.auth.expected_subject_cn.is_some())
            && (!self.tls.enabled || self.tls.client_ca_path.is_none())
        {
            return Err(Error::Config(
                "client certificate checks need tls.enabled and tls.client_ca_path".to_string(),
            ));
        }

        if self.metrics.enabled {
            self.metrics.addr()?;
        }

        Ok(())
    }
}

fn parse_addr(host: &str, port: u16) -> Result<SocketAddr> {
    format!("{host}:{port}")
        .parse()
        .map_err(|e| Error::Config(format!("invalid address {host}:{port}: {e}")))
}

fn check_file(what: &str, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::Config(format!("{what} path is empty")));
    }
    if !path.exists() {
        return Err(Error::Config(format!(
            "{what} file does not exist: {}",
            path.display()
        )));
    }
    Ok(())
}
