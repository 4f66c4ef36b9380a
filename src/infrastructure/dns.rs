use std::net::IpAddr;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use crate::domain::ProbeError;
use crate::ports::DnsResolver;

pub struct HickoryDnsResolver {
    resolver: TokioAsyncResolver,
}

impl HickoryDnsResolver {
    pub fn new() -> Result<Self, ProbeError> {
        Ok(Self { resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()) })
    }
}

impl DnsResolver for HickoryDnsResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ProbeError> {
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }
        let response = self.resolver.lookup_ip(host).await
            .map_err(|e| ProbeError::resolution(format!("DNS lookup failed for '{}': {}", host, e)))?;
        let ips: Vec<IpAddr> = response.iter().collect();
        if ips.is_empty() {
            return Err(ProbeError::resolution(format!("no DNS records for '{}'", host)));
        }
        tracing::debug!(host, count = ips.len(), "resolved");
        Ok(ips)
    }
}
