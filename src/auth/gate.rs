use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tonic::metadata::MetadataMap;
use tonic::service::Interceptor;
use tonic::{Request, Status};
use tracing::{debug, warn};

use super::{AuthError, CredentialStore, PeerIdentity, AUTHORIZATION_HEADER, BEARER_PREFIX};

/// Optional certificate checks layered on top of the TLS requirement.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePolicy {
    /// Reject callers that did not present a client certificate chain.
    ///
    /// Only meaningful when the server requests client certificates, since that is the
    /// only case in which a chain reaches the gate.
    #[serde(default)]
    pub require_verified_chain: bool,
    /// Required common name on the leaf client certificate.
    #[serde(default)]
    pub expected_subject_cn: Option<String>,
}

/// Server interceptor that admits or rejects every call before dispatch.
///
/// Holds only read-only state, so clones share the same store and policy and can run on
/// any number of tasks at once.
#[derive(Clone, Debug)]
pub struct AuthGate {
    store: Arc<CredentialStore>,
    policy: Arc<GatePolicy>,
}

impl AuthGate {
    /// Creates a gate checking tokens against `store`.
    pub fn new(store: CredentialStore, policy: GatePolicy) -> Self {
        Self {
            store: Arc::new(store),
            policy: Arc::new(policy),
        }
    }

    /// Decides whether a call from `peer` carrying `metadata` may proceed.
    ///
    /// Checks run in a fixed order and stop at the first failure: peer present, TLS,
    /// certificate policy, header count, `Bearer ` prefix, token.
    pub fn check(
        &self,
        peer: Option<&PeerIdentity>,
        metadata: &MetadataMap,
    ) -> Result<(), AuthError> {
        let peer = peer.ok_or(AuthError::NoPeerIdentity)?;

        if !peer.is_secured() {
            return Err(AuthError::TransportNotSecured);
        }

        self.check_certificates(peer)?;

        let header = extract_authorization(metadata)?;
        let token = header
            .strip_prefix(BEARER_PREFIX)
            .ok_or(AuthError::PrefixMissing)?;

        self.store.verify(token)
    }

    /// Runs [`check`](Self::check) and, on success, turns the request into its
    /// authenticated form: `authorization` removed and the peer stored in the extensions.
    pub fn admit(
        &self,
        mut request: Request<()>,
        peer: Option<PeerIdentity>,
    ) -> Result<Request<()>, AuthError> {
        self.check(peer.as_ref(), request.metadata())?;

        request.metadata_mut().remove(AUTHORIZATION_HEADER);
        if let Some(peer) = peer {
            request.extensions_mut().insert(peer);
        }

        Ok(request)
    }

    fn check_certificates(&self, peer: &PeerIdentity) -> Result<(), AuthError> {
        if self.policy.require_verified_chain && peer.certificates().is_empty() {
            return Err(AuthError::UnverifiedPeerChain);
        }

        if let Some(expected) = &self.policy.expected_subject_cn {
            match peer.leaf_common_name() {
                Some(cn) if cn == *expected => {}
                Some(_) => return Err(AuthError::SubjectMismatch),
                None if peer.certificates().is_empty() => {
                    return Err(AuthError::UnverifiedPeerChain)
                }
                None => return Err(AuthError::SubjectMismatch),
            }
        }

        Ok(())
    }
}

fn extract_authorization(metadata: &MetadataMap) -> Result<&str, AuthError> {
    if metadata.is_empty() {
        return Err(AuthError::MetadataMissing);
    }

    let mut values = metadata.get_all(AUTHORIZATION_HEADER).iter();
    let value = values.next().ok_or(AuthError::HeaderAbsent)?;
    if values.next().is_some() {
        return Err(AuthError::HeaderDuplicated);
    }

    value.to_str().map_err(|_| AuthError::PrefixMissing)
}

fn log_peer(peer: Option<&PeerIdentity>) {
    let Some(peer) = peer else {
        debug!("call without connection info");
        return;
    };

    debug!(
        remote_addr = ?peer.remote_addr(),
        tls = peer.is_secured(),
        certificates = peer.certificates().len(),
        subject = peer.leaf_subject().as_deref().unwrap_or("-"),
        "inbound call"
    );
}

impl Interceptor for AuthGate {
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        let peer = PeerIdentity::from_extensions(request.extensions());
        log_peer(peer.as_ref());

        let remote_addr = peer.as_ref().and_then(PeerIdentity::remote_addr);
        match self.admit(request, peer) {
            Ok(request) => {
                counter!("echo.auth.admitted").increment(1);
                Ok(request)
            }
            Err(e) => {
                counter!("echo.auth.rejected", "reason" => e.reason()).increment(1);
                warn!(reason = e.reason(), remote_addr = ?remote_addr, "rejected call: {e}");
                Err(e.into())
            }
        }
    }
}
