//! Common test utilities shared across integration tests.
#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose,
};
use secure_echo::auth::{GatePolicy, Secret};
use secure_echo::client::ClientConfig;
use secure_echo::server::{EchoServer, MetricsSettings, ServerConfig, TlsSettings};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tonic::transport::{Channel, Endpoint};

/// Shared secret used by every test server.
pub const SECRET: &str = "the-secret-token";

/// Initialize test tracing (call once at the beginning of tests).
///
/// Subsequent calls are safe and will be ignored.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new("secure_echo=debug");

    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(filter)
        .try_init();
}

/// Log output captured for the current thread.
///
/// Tokio tests run on a single-threaded runtime, so server tasks spawned by the test log
/// into the same buffer.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Routes this thread's events into the buffer until the guard is dropped.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        use tracing_subscriber::EnvFilter;

        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_env_filter(EnvFilter::new("secure_echo=debug"))
            .finish();

        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Throwaway PKI written to a temporary directory.
///
/// One CA signs the server certificate (valid for `localhost`) and two client
/// certificates with common names `username` and `intruder`. A second, unrelated CA is
/// available for trust-root failures.
pub struct Pki {
    dir: TempDir,
}

impl Pki {
    pub fn generate() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let pki = Self { dir };

        let (ca_cert, ca_key) = ca("echo test ca");
        pki.write("ca.pem", &ca_cert.pem());

        let (server_cert, server_key) = leaf(
            &ca_cert,
            &ca_key,
            "localhost",
            vec!["localhost".to_string()],
            ExtendedKeyUsagePurpose::ServerAuth,
        );
        pki.write("server.pem", &server_cert);
        pki.write("server.key", &server_key);

        for name in ["username", "intruder"] {
            let (cert, key) = leaf(
                &ca_cert,
                &ca_key,
                name,
                Vec::new(),
                ExtendedKeyUsagePurpose::ClientAuth,
            );
            pki.write(&format!("{name}.pem"), &cert);
            pki.write(&format!("{name}.key"), &key);
        }

        let (other_ca, _) = ca("untrusted ca");
        pki.write("other-ca.pem", &other_ca.pem());

        pki
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, contents: &str) {
        std::fs::write(self.path(name), contents).expect("write pem");
    }

    /// Server configuration using this PKI, listening on an ephemeral port.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            secret: Secret::new(SECRET).unwrap(),
            tls: TlsSettings {
                enabled: true,
                cert_path: self.path("server.pem"),
                key_path: self.path("server.key"),
                client_ca_path: None,
            },
            auth: GatePolicy::default(),
            metrics: MetricsSettings {
                enabled: false,
                host: "127.0.0.1".to_string(),
                port: 0,
            },
        }
    }

    /// Same as [`server_config`](Self::server_config) with client certificates requested.
    pub fn mutual_tls_config(&self, policy: GatePolicy) -> ServerConfig {
        let mut config = self.server_config();
        config.tls.client_ca_path = Some(self.path("ca.pem"));
        config.auth = policy;
        config
    }

    /// Client configuration trusting this PKI's CA.
    pub fn client_config(&self, addr: SocketAddr, token: &str) -> ClientConfig {
        ClientConfig::new(
            format!("https://{addr}"),
            self.path("ca.pem"),
            "localhost",
            Secret::new(token).unwrap(),
        )
    }

    /// TLS channel without any credentials attached, for hand-crafted metadata.
    pub async fn raw_channel(&self, addr: SocketAddr) -> Channel {
        let tls = secure_echo::tls::client_tls_config(&self.path("ca.pem"), "localhost", None)
            .expect("client tls config");

        Endpoint::from_shared(format!("https://{addr}"))
            .unwrap()
            .tls_config(tls)
            .unwrap()
            .connect()
            .await
            .expect("Failed to connect to server")
    }
}

fn ca(common_name: &str) -> (Certificate, KeyPair) {
    let key = KeyPair::generate().expect("ca key");
    let mut params = CertificateParams::new(Vec::<String>::new()).expect("ca params");
    params.distinguished_name.push(DnType::CommonName, common_name);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    let cert = params.self_signed(&key).expect("self-signed ca");
    (cert, key)
}

fn leaf(
    issuer: &Certificate,
    issuer_key: &KeyPair,
    common_name: &str,
    subject_alt_names: Vec<String>,
    usage: ExtendedKeyUsagePurpose,
) -> (String, String) {
    let key = KeyPair::generate().expect("leaf key");
    let mut params = CertificateParams::new(subject_alt_names).expect("leaf params");
    params.distinguished_name.push(DnType::CommonName, common_name);
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    params.extended_key_usages = vec![usage];
    let cert = params
        .signed_by(&key, issuer, issuer_key)
        .expect("signed leaf");
    (cert.pem(), key.serialize_pem())
}

/// Starts a server for `config` on an ephemeral port.
pub async fn start_server(config: ServerConfig) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = EchoServer::new(config).expect("valid server config");

    let handle = tokio::spawn(async move {
        server
            .serve(listener, std::future::pending())
            .await
            .unwrap();
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    (addr, handle)
}
