use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpStream;
use crate::domain::ProbeError;
use crate::ports::{BoxedIoStream, TcpDialer};

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioTcpDialer;

impl TokioTcpDialer {
    pub fn new() -> Self { Self }
}

impl TcpDialer for TokioTcpDialer {
    async fn connect(&self, ip: IpAddr, port: u16) -> Result<BoxedIoStream, ProbeError> {
        let addr = SocketAddr::new(ip, port);
        let stream = TcpStream::connect(addr).await.map_err(|e| {
            let msg = match e.kind() {
                std::io::ErrorKind::ConnectionRefused => format!("connection refused: {}", addr),
                std::io::ErrorKind::TimedOut => format!("connection timed out: {}", addr),
                _ => format!("TCP connect failed to {}: {}", addr, e),
            };
            ProbeError::connect(msg)
        })?;
        stream.set_nodelay(true).map_err(|e| ProbeError::connect(format!("set_nodelay failed: {}", e)))?;
        Ok(BoxedIoStream::new(stream))
    }
}
