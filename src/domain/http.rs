use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct HttpSummary {
    pub status: u16,
    pub reason: Option<String>,
    pub version: String,
    pub content_type: Option<String>,
}

impl HttpSummary {
    pub fn new(status: u16, reason: Option<String>, version: String, content_type: Option<String>) -> Self {
        Self { status, reason, version, content_type }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_event_stream(&self) -> bool {
        self.content_type.as_deref().map(|c| c.to_ascii_lowercase().starts_with("text/event-stream")).unwrap_or(false)
    }

    pub fn status_line(&self) -> String {
        match &self.reason {
            Some(r) if !r.is_empty() => format!("{} {}", self.status, r),
            _ => self.status.to_string(),
        }
    }
}
