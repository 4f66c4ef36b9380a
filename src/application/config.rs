use std::time::Duration;
use crate::domain::DEFAULT_MAX_FRAME_BYTES;

#[derive(Debug, Clone)]
pub struct Config {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_frame_bytes: usize,
    pub error_body_limit: usize,
    pub preview_limit: usize,
    pub json_output: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            timeout: parse_duration_env("SPROBE_TIMEOUT", Duration::from_secs(30)),
            connect_timeout: parse_duration_env("SPROBE_CONNECT_TIMEOUT", Duration::from_secs(10)),
            max_frame_bytes: parse_usize_env("SPROBE_MAX_FRAME_BYTES", DEFAULT_MAX_FRAME_BYTES),
            error_body_limit: parse_usize_env("SPROBE_ERROR_BODY_LIMIT", 32 * 1024),
            preview_limit: parse_usize_env("SPROBE_PREVIEW_LIMIT", 500),
            json_output: false,
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json_output = json;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_frame_bytes(mut self, max: usize) -> Self {
        self.max_frame_bytes = max;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Parses `5s`, `3000ms` or bare seconds.
pub fn parse_duration(v: &str) -> Result<Duration, String> {
    let v = v.trim();
    let parsed = if let Some(s) = v.strip_suffix("ms") {
        s.trim().parse::<u64>().map(Duration::from_millis)
    } else if let Some(s) = v.strip_suffix('s') {
        s.trim().parse::<u64>().map(Duration::from_secs)
    } else {
        v.parse::<u64>().map(Duration::from_secs)
    };
    parsed.map_err(|_| format!("invalid duration '{}', expected e.g. 5s or 3000ms", v))
}

fn parse_duration_env(key: &str, default: Duration) -> Duration {
    std::env::var(key).ok().and_then(|v| parse_duration(&v).ok()).unwrap_or(default)
}

fn parse_usize_env(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
