use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::Interceptor;
use tonic::{Request, Status};

use super::{Secret, AUTHORIZATION_HEADER, BEARER_PREFIX};
use crate::{Error, Result};

/// Whether the channel a client talks over is encrypted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportSecurity {
    /// TLS is configured on the channel.
    Tls,
    /// Plain HTTP/2.
    Plaintext,
}

/// Per-call credentials: adds `authorization: Bearer <secret>` to every outgoing call.
///
/// Refuses to attach anything when the channel is not encrypted, failing the call before
/// it is sent.
#[derive(Clone, Debug)]
pub struct BearerCredentials {
    value: MetadataValue<Ascii>,
    transport: TransportSecurity,
}

impl BearerCredentials {
    /// Builds credentials for `secret` on a channel with the given security.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the secret cannot be carried in a metadata value.
    pub fn new(secret: &Secret, transport: TransportSecurity) -> Result<Self> {
        let mut value: MetadataValue<Ascii> = format!("{BEARER_PREFIX}{}", secret.expose())
            .parse()
            .map_err(|_| {
                Error::Config("secret contains characters not allowed in metadata".to_string())
            })?;
        value.set_sensitive(true);

        Ok(Self { value, transport })
    }

    /// Security of the channel these credentials were built for.
    pub fn transport(&self) -> TransportSecurity {
        self.transport
    }

    /// Attaches the header to `request`.
    pub fn apply<T>(&self, request: &mut Request<T>) -> std::result::Result<(), Status> {
        if self.transport != TransportSecurity::Tls {
            return Err(Status::failed_precondition(
                "refusing to send bearer token over an insecure transport",
            ));
        }

        request
            .metadata_mut()
            .insert(AUTHORIZATION_HEADER, self.value.clone());
        Ok(())
    }
}

impl Interceptor for BearerCredentials {
    fn call(&mut self, mut request: Request<()>) -> std::result::Result<Request<()>, Status> {
        self.apply(&mut request)?;
        Ok(request)
    }
}
