//! gRPC echo service protected by transport security and a bearer token.
//!
//! The server admits a call only if it arrived over TLS and carries exactly one
//! `authorization: Bearer <secret>` entry matching the shared secret. The check lives in
//! [`auth::AuthGate`], a tonic interceptor in front of the echo handler. Clients attach the
//! token with [`auth::BearerCredentials`], which refuses to do so over a plaintext channel.
//!
//! ```rust,no_run
//! use secure_echo::auth::Secret;
//! use secure_echo::client::{ClientConfig, EchoClient};
//!
//! # async fn run() -> secure_echo::Result<()> {
//! let secret = Secret::new("the-secret-token")?;
//! let config = ClientConfig::new("https://localhost:50051", "secrets/cert.pem", "localhost", secret);
//! let mut client = EchoClient::connect(config).await?;
//! assert_eq!(client.echo("world").await?, "Hello world");
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod proto;
pub mod server;
pub mod telemetry;
pub mod tls;

pub use error::{Error, Result};
