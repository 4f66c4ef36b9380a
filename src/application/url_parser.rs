use url::Url;
use crate::domain::ProbeError;

#[derive(Debug, Clone)]
pub struct ParsedUrl {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path_and_query: String,
    pub full: String,
}

impl ParsedUrl {
    pub fn parse(input: &str) -> Result<Self, ProbeError> {
        let url = Url::parse(input).map_err(|e| ProbeError::input(format!("invalid URL: {}", e)))?;

        let scheme = url.scheme().to_string();
        if scheme != "http" && scheme != "https" {
            return Err(ProbeError::input(format!("unsupported scheme '{}', expected http or https", scheme)));
        }

        let host = url.host_str().ok_or_else(|| ProbeError::input("missing host"))?.to_string();
        let port = url.port_or_known_default().unwrap_or(if scheme == "https" { 443 } else { 80 });

        let path = url.path();
        let path_and_query = match url.query() {
            Some(q) => format!("{}?{}", path, q),
            None => path.to_string(),
        };
        let path_and_query = if path_and_query.is_empty() { "/".to_string() } else { path_and_query };

        Ok(Self { scheme, host, port, path_and_query, full: url.to_string() })
    }

    pub fn is_https(&self) -> bool {
        self.scheme == "https"
    }
}
