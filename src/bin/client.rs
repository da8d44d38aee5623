use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use secure_echo::auth::Secret;
use secure_echo::client::{ClientConfig, EchoClient};
use secure_echo::telemetry;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "client")]
#[command(about = "Echo client presenting a bearer token over TLS", long_about = None)]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "https://localhost:50051")]
    address: String,

    /// Trusted root certificate for the server (PEM)
    #[arg(long, alias = "pub", default_value = "secrets/cert.pem")]
    ca: PathBuf,

    /// Name the server certificate must be valid for
    #[arg(short, long, default_value = "localhost")]
    domain: String,

    /// Bearer token to present
    #[arg(short, long, env = "ECHO_TOKEN", hide_env_values = true, default_value = "secret")]
    token: String,

    /// Client certificate for mutual TLS (PEM)
    #[arg(long, requires = "key")]
    cert: Option<PathBuf>,

    /// Client private key for mutual TLS (PEM)
    #[arg(long, requires = "cert")]
    key: Option<PathBuf>,

    /// Per-call deadline in milliseconds
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// Text to send
    #[arg(default_value = "world")]
    text: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    telemetry::init_tracing();

    let secret = Secret::new(cli.token)?;
    let mut config = ClientConfig::new(cli.address, cli.ca, cli.domain, secret)
        .with_timeout(Duration::from_millis(cli.timeout_ms));
    if let (Some(cert), Some(key)) = (cli.cert, cli.key) {
        config = config.with_identity(cert, key);
    }

    let mut client = EchoClient::connect(config).await.map_err(|e| {
        error!("did not connect: {e}");
        e
    })?;

    let greeting = client.echo(cli.text).await.map_err(|e| {
        error!("could not greet: {e}");
        e
    })?;

    println!("Greeting: {greeting}");

    Ok(())
}
