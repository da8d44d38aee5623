use std::time::Instant;

use metrics::{counter, histogram};
use tonic::{Request, Response, Status};
use tracing::info;

use crate::auth::{PeerIdentity, UNAUTHENTICATED_MESSAGE};
use crate::proto::echo_service_server::EchoService;
use crate::proto::{EchoRequest, EchoResponse};

/// Builds the greeting returned by `Echo`.
pub fn greet(text: &str) -> String {
    format!("Hello {text}")
}

/// gRPC implementation of `echo.EchoService`.
///
/// Expects to sit behind [`AuthGate`](crate::auth::AuthGate): requests that did not pass
/// through it carry no [`PeerIdentity`] and are refused.
#[derive(Debug, Default, Clone)]
pub struct EchoServiceImpl;

impl EchoServiceImpl {
    /// Creates the service.
    pub fn new() -> Self {
        Self
    }
}

#[tonic::async_trait]
impl EchoService for EchoServiceImpl {
    async fn echo(&self, request: Request<EchoRequest>) -> Result<Response<EchoResponse>, Status> {
        let start = Instant::now();
        counter!("echo.requests").increment(1);

        let caller = request
            .extensions()
            .get::<PeerIdentity>()
            .map(PeerIdentity::remote_addr)
            .ok_or_else(|| Status::unauthenticated(UNAUTHENTICATED_MESSAGE))?;

        let text = request.into_inner().text;
        info!(caller = ?caller, "Received: {text}");

        let response = EchoResponse { text: greet(&text) };

        histogram!("echo.duration").record(start.elapsed().as_secs_f64());

        Ok(Response::new(response))
    }
}
