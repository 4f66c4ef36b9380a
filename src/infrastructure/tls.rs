use std::sync::Arc;
use tokio_rustls::TlsConnector;
use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use crate::domain::{ProbeError, TlsSummary};
use crate::ports::{BoxedIoStream, TlsHandshaker, TlsSession};

pub struct RustlsTlsHandshaker {
    connector: TlsConnector,
}

impl RustlsTlsHandshaker {
    pub fn new() -> Result<Self, ProbeError> {
        let root_store = rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let mut config = ClientConfig::builder().with_root_certificates(root_store).with_no_client_auth();
        config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
        Ok(Self { connector: TlsConnector::from(Arc::new(config)) })
    }
}

impl TlsHandshaker for RustlsTlsHandshaker {
    async fn handshake(&self, stream: BoxedIoStream, host: &str) -> Result<TlsSession, ProbeError> {
        let server_name = ServerName::try_from(host.trim_start_matches('[').trim_end_matches(']').to_string())
            .map_err(|_| ProbeError::connect(format!("invalid server name: {}", host)))?;

        let tls_stream = self.connector.connect(server_name, stream).await
            .map_err(|e| ProbeError::connect(format!("TLS handshake failed: {}", e)))?;

        let (_, conn) = tls_stream.get_ref();
        let version = match conn.protocol_version() {
            Some(rustls::ProtocolVersion::TLSv1_2) => "TLS1.2".to_string(),
            Some(rustls::ProtocolVersion::TLSv1_3) => "TLS1.3".to_string(),
            Some(v) => format!("{:?}", v),
            None => "unknown".to_string(),
        };
        let alpn = conn.alpn_protocol().map(|p| String::from_utf8_lossy(p).to_string());
        let cipher = conn.negotiated_cipher_suite().map(|cs| format!("{:?}", cs.suite())).unwrap_or_else(|| "unknown".to_string());
        tracing::debug!(%version, alpn = alpn.as_deref().unwrap_or("-"), "tls established");

        Ok(TlsSession {
            stream: BoxedIoStream::new(tls_stream),
            summary: TlsSummary::new(version, alpn, cipher),
        })
    }
}
