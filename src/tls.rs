//! Loading PEM material into tonic TLS configurations.

use std::path::Path;

use tonic::transport::{Certificate, ClientTlsConfig, Identity, ServerTlsConfig};

use crate::{Error, Result};

/// Reads a PEM file, reporting the path on failure.
pub fn read_pem(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Builds the server side of the handshake.
///
/// With `client_ca` set the server asks for client certificates and verifies them against
/// that root; `require_client_cert` turns a missing certificate into a handshake failure.
pub fn server_tls_config(
    cert_path: &Path,
    key_path: &Path,
    client_ca: Option<&Path>,
    require_client_cert: bool,
) -> Result<ServerTlsConfig> {
    let identity = Identity::from_pem(read_pem(cert_path)?, read_pem(key_path)?);
    let mut tls = ServerTlsConfig::new().identity(identity);

    if let Some(ca_path) = client_ca {
        tls = tls
            .client_ca_root(Certificate::from_pem(read_pem(ca_path)?))
            .client_auth_optional(!require_client_cert);
    }

    Ok(tls)
}

/// Builds the client side of the handshake: trusted root, expected server name and an
/// optional client identity for mutual TLS.
pub fn client_tls_config(
    ca_path: &Path,
    domain: &str,
    identity: Option<(&Path, &Path)>,
) -> Result<ClientTlsConfig> {
    let mut tls = ClientTlsConfig::new()
        .ca_certificate(Certificate::from_pem(read_pem(ca_path)?))
        .domain_name(domain);

    if let Some((cert_path, key_path)) = identity {
        tls = tls.identity(Identity::from_pem(read_pem(cert_path)?, read_pem(key_path)?));
    }

    Ok(tls)
}
