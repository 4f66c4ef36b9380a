use bytes::Bytes;
use crate::domain::{HttpSummary, ProbeError};
use super::io::BoxedIoStream;

#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub is_https: bool,
    /// Extra headers. Values may be secrets and must not be logged.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl OutboundRequest {
    pub fn host_header(&self) -> String {
        if (self.is_https && self.port == 443) || (!self.is_https && self.port == 80) {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// `head` must be awaited before `next_chunk`.
pub trait HttpExchange: Send {
    fn head(&mut self) -> impl std::future::Future<Output = Result<HttpSummary, ProbeError>> + Send;

    fn next_chunk(&mut self) -> impl std::future::Future<Output = Result<Option<Bytes>, ProbeError>> + Send;
}

pub trait HttpClient: Send + Sync {
    type Exchange: HttpExchange;

    fn send(&self, stream: BoxedIoStream, request: &OutboundRequest, h2: bool)
        -> impl std::future::Future<Output = Result<Self::Exchange, ProbeError>> + Send;
}
