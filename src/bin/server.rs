use std::path::PathBuf;

use clap::Parser;
use secure_echo::auth::Secret;
use secure_echo::server::{shutdown_signal, EchoServer, ServerConfig};
use secure_echo::telemetry;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Echo server gated by TLS and a bearer token", long_about = None)]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Shared bearer token clients must present
    #[arg(long, env = "ECHO_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Server certificate (PEM)
    #[arg(long = "cert", alias = "pub")]
    cert: Option<PathBuf>,

    /// Server private key (PEM)
    #[arg(long = "key", alias = "priv")]
    key: Option<PathBuf>,

    /// Root used to verify client certificates; enables mutual TLS
    #[arg(long)]
    client_ca: Option<PathBuf>,

    /// Reject clients that do not present a verified certificate chain
    #[arg(long)]
    require_verified_chain: bool,

    /// Required common name on client certificates
    #[arg(long)]
    expected_cn: Option<String>,

    /// Serve without TLS (every call will be rejected)
    #[arg(long)]
    insecure: bool,

    /// Enable the Prometheus metrics endpoint
    #[arg(long)]
    metrics: bool,

    /// Metrics port
    #[arg(long)]
    metrics_port: Option<u16>,
}

impl Args {
    fn apply(self, config: &mut ServerConfig) -> Result<(), secure_echo::Error> {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(token) = self.token {
            config.secret = Secret::new(token)?;
        }
        if let Some(cert) = self.cert {
            config.tls.cert_path = cert;
        }
        if let Some(key) = self.key {
            config.tls.key_path = key;
        }
        if self.client_ca.is_some() {
            config.tls.client_ca_path = self.client_ca;
        }
        if self.require_verified_chain {
            config.auth.require_verified_chain = true;
        }
        if self.expected_cn.is_some() {
            config.auth.expected_subject_cn = self.expected_cn;
        }
        if self.insecure {
            config.tls.enabled = false;
        }
        if self.metrics {
            config.metrics.enabled = true;
        }
        if let Some(port) = self.metrics_port {
            config.metrics.port = port;
        }
        Ok(())
    }
}

/// Loads the layered configuration and applies command-line overrides on top.
///
/// A configuration that fails to load stops startup instead of falling back to defaults.
fn load_config(args: Args) -> Result<ServerConfig, secure_echo::Error> {
    let mut config = ServerConfig::from_env()?;
    args.apply(&mut config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    telemetry::init_tracing();

    let config = load_config(args).map_err(|e| {
        error!("Failed to load configuration: {e}");
        e
    })?;

    let server = EchoServer::new(config)?;

    let metrics = &server.config().metrics;
    if metrics.enabled {
        let metrics_addr = metrics.addr()?;
        telemetry::install_metrics_exporter(metrics_addr)?;
        info!("Metrics server started on {metrics_addr}");
    }

    if let Err(e) = server.run(shutdown_signal()).await {
        error!("Server error: {e}");
        return Err(e.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn invalid_environment_stops_startup() {
        Jail::expect_with(|jail| {
            jail.set_env("SERVER_CONFIG_PATH", "absent.toml");
            jail.set_env("SERVER_SECRET", "");

            let args = Args::parse_from(["server", "--insecure"]);
            let err = load_config(args).expect_err("empty secret must not fall back to defaults");
            assert!(err.to_string().contains("secret cannot be empty"), "{err}");
            Ok(())
        });
    }

    #[test]
    fn malformed_file_stops_startup() {
        Jail::expect_with(|jail| {
            jail.create_file("server.toml", "port = \"not a port\"")?;
            jail.set_env("SERVER_CONFIG_PATH", "server.toml");

            let args = Args::parse_from(["server", "--insecure"]);
            assert!(load_config(args).is_err());
            Ok(())
        });
    }

    #[test]
    fn flags_override_loaded_config() {
        Jail::expect_with(|jail| {
            jail.create_file("server.toml", "port = 6000")?;
            jail.set_env("SERVER_CONFIG_PATH", "server.toml");

            let args = Args::parse_from(["server", "--insecure", "--port", "7000"]);
            let config = load_config(args).expect("config loads");
            assert_eq!(config.port, 7000);
            assert!(!config.tls.enabled);
            Ok(())
        });
    }
}
