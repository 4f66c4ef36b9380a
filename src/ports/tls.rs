use crate::domain::{ProbeError, TlsSummary};
use super::io::BoxedIoStream;

pub struct TlsSession {
    pub stream: BoxedIoStream,
    pub summary: TlsSummary,
}

pub trait TlsHandshaker: Send + Sync {
    fn handshake(&self, stream: BoxedIoStream, host: &str) -> impl std::future::Future<Output = Result<TlsSession, ProbeError>> + Send;
}
