use std::net::SocketAddr;

use tonic::transport::server::{TcpConnectInfo, TlsConnectInfo};
use tonic::Extensions;

/// What the server knows about the other end of a connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerIdentity {
    remote_addr: Option<SocketAddr>,
    secured: bool,
    certificates: Vec<Vec<u8>>,
}

impl PeerIdentity {
    /// Peer reached over a plain TCP connection.
    pub fn plaintext(remote_addr: Option<SocketAddr>) -> Self {
        Self {
            remote_addr,
            secured: false,
            certificates: Vec::new(),
        }
    }

    /// Peer reached over TLS, with the DER chain it presented (leaf first, possibly empty).
    pub fn tls(remote_addr: Option<SocketAddr>, certificates: Vec<Vec<u8>>) -> Self {
        Self {
            remote_addr,
            secured: true,
            certificates,
        }
    }

    /// Reads the connection info tonic stores in the request extensions.
    ///
    /// Returns `None` when the transport supplied nothing, e.g. an in-memory channel.
    pub fn from_extensions(extensions: &Extensions) -> Option<Self> {
        if let Some(tls) = extensions.get::<TlsConnectInfo<TcpConnectInfo>>() {
            let certificates = tls
                .peer_certs()
                .map(|certs| certs.iter().map(|c| c.as_ref().to_vec()).collect())
                .unwrap_or_default();
            return Some(Self::tls(tls.get_ref().remote_addr(), certificates));
        }

        extensions
            .get::<TcpConnectInfo>()
            .map(|tcp| Self::plaintext(tcp.remote_addr()))
    }

    /// Remote socket address, if the transport reported one.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Whether the connection completed a TLS handshake.
    pub fn is_secured(&self) -> bool {
        self.secured
    }

    /// Certificates presented by the client. Only populated when the server requested
    /// client authentication, in which case rustls already verified them against the
    /// configured client CA.
    pub fn certificates(&self) -> &[Vec<u8>] {
        &self.certificates
    }

    /// Subject of the leaf certificate, rendered as a distinguished name.
    pub fn leaf_subject(&self) -> Option<String> {
        let der = self.certificates.first()?;
        let (_, cert) = x509_parser::parse_x509_certificate(der).ok()?;
        Some(cert.subject().to_string())
    }

    /// Common name of the leaf certificate's subject.
    pub fn leaf_common_name(&self) -> Option<String> {
        let der = self.certificates.first()?;
        let (_, cert) = x509_parser::parse_x509_certificate(der).ok()?;
        let cn = cert.subject().iter_common_name().next()?;
        cn.as_str().ok().map(str::to_owned)
    }
}
