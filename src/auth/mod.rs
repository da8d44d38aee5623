//! Call authentication: the server-side gate, the client-side bearer attacher and the
//! shared secret they both rely on.
//!
//! The server never trusts a call on its bearer token alone. The gate first insists on a
//! TLS-secured peer, then on exactly one `authorization: Bearer <token>` entry, and only
//! then compares the token. Admitted calls reach the handler with the header removed.

use tonic::Status;

/// Client-side credential attachment.
pub mod attacher;

/// Shared secret and fixed-time verification.
pub mod credentials;

/// Server interceptor deciding admit or reject.
pub mod gate;

/// Transport-level identity of the caller.
pub mod peer;

pub use attacher::{BearerCredentials, TransportSecurity};
pub use credentials::{CredentialStore, Secret};
pub use gate::{AuthGate, GatePolicy};
pub use peer::PeerIdentity;

/// Metadata key carrying the bearer token.
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Scheme prefix expected in front of the token.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Message returned to callers for every authentication failure.
pub const UNAUTHENTICATED_MESSAGE: &str = "unauthenticated";

/// Reasons the gate rejects a call.
///
/// The variant is logged server-side; callers only ever see
/// [`UNAUTHENTICATED_MESSAGE`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The transport did not attach any connection info to the call.
    #[error("no peer found")]
    NoPeerIdentity,

    /// The connection did not go through a TLS handshake.
    #[error("unexpected peer transport credentials")]
    TransportNotSecured,

    /// A verified client certificate chain was required but none was presented.
    #[error("could not verify peer certificate")]
    UnverifiedPeerChain,

    /// The client certificate's subject common name is not the configured one.
    #[error("invalid subject common name")]
    SubjectMismatch,

    /// The call carried no metadata at all.
    #[error("no headers in request")]
    MetadataMissing,

    /// No `authorization` entry.
    #[error("no authorization header in request")]
    HeaderAbsent,

    /// More than one `authorization` entry.
    #[error("more than 1 authorization header in request")]
    HeaderDuplicated,

    /// The header value does not start with `Bearer `.
    #[error("missing \"Bearer \" prefix in \"authorization\" header")]
    PrefixMissing,

    /// The token does not match the shared secret.
    #[error("invalid token")]
    TokenMismatch,
}

impl AuthError {
    /// Short stable identifier used in logs and metric labels.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NoPeerIdentity => "no_peer_identity",
            Self::TransportNotSecured => "transport_not_secured",
            Self::UnverifiedPeerChain => "unverified_peer_chain",
            Self::SubjectMismatch => "subject_mismatch",
            Self::MetadataMissing => "metadata_missing",
            Self::HeaderAbsent => "header_absent",
            Self::HeaderDuplicated => "header_duplicated",
            Self::PrefixMissing => "prefix_missing",
            Self::TokenMismatch => "token_mismatch",
        }
    }
}

impl From<AuthError> for Status {
    fn from(_: AuthError) -> Self {
        Status::unauthenticated(UNAUTHENTICATED_MESSAGE)
    }
}
