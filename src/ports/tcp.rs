use std::net::IpAddr;
use crate::domain::ProbeError;
use super::io::BoxedIoStream;

pub trait TcpDialer: Send + Sync {
    fn connect(&self, ip: IpAddr, port: u16) -> impl std::future::Future<Output = Result<BoxedIoStream, ProbeError>> + Send;
}
