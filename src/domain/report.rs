use serde::Serialize;
use super::{AccumulatedMessage, ChunkTiming, HttpSummary, PhaseTiming, ResolvedTarget, TlsSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEnd {
    TransportClosed,
    Timeout,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub url: String,
    pub host: String,
    pub resolved: Option<ResolvedTarget>,
    pub http: Option<HttpSummary>,
    pub tls: Option<TlsSummary>,

    pub dns_ms: Option<f64>,
    pub connect_ms: Option<f64>,
    pub tls_ms: Option<f64>,
    pub ttfb_ms: Option<f64>,
    pub ttft_ms: Option<f64>,
    pub first_content_ms: Option<f64>,
    pub total_ms: f64,

    pub phases: Vec<PhaseTiming>,
    pub chunk_timeline: Vec<ChunkTiming>,
    pub total_bytes: u64,
    pub frame_count: usize,
    pub first_chunk_preview: Option<String>,

    pub final_message: AccumulatedMessage,
    pub done_seen: bool,
    pub done_frame: Option<usize>,
    pub finish_reason: Option<String>,
    pub unrecognized: Vec<String>,
    pub control_frames: usize,
    pub error_body: Option<String>,
    pub stream_end: StreamEnd,
}

impl ProbeReport {
    pub fn chunk_count(&self) -> usize {
        self.chunk_timeline.len()
    }

    pub fn has_unrecognized(&self) -> bool {
        !self.unrecognized.is_empty()
    }

    pub fn ttft_ratio(&self) -> Option<f64> {
        let ttft = self.ttft_ms?;
        if self.total_ms <= 0.0 {
            return None;
        }
        Some(ttft * 100.0 / self.total_ms)
    }

    pub fn terminated_cleanly(&self) -> bool {
        self.done_seen || self.finish_reason.is_some()
    }

    pub fn slowest_gap(&self) -> Option<&ChunkTiming> {
        self.chunk_timeline.iter().max_by(|a, b| a.inter_arrival_ms.total_cmp(&b.inter_arrival_ms))
    }
}

/// A run that failed, with whatever was measured before the failure.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct ProbeFailure {
    pub error: super::ProbeError,
    pub partial: Box<ProbeReport>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn report() -> ProbeReport {
        ProbeReport {
            url: "https://api.example.com/v1/chat/completions".into(),
            host: "api.example.com".into(),
            resolved: None,
            http: None,
            tls: None,
            dns_ms: Some(3.0),
            connect_ms: Some(10.0),
            tls_ms: Some(20.0),
            ttfb_ms: Some(150.0),
            ttft_ms: Some(40.0),
            first_content_ms: Some(40.0),
            total_ms: 400.0,
            phases: Vec::new(),
            chunk_timeline: vec![
                ChunkTiming { index: 0, elapsed_ms: 223.0, inter_arrival_ms: 40.0, byte_length: 60 },
                ChunkTiming { index: 1, elapsed_ms: 390.0, inter_arrival_ms: 167.0, byte_length: 64 },
            ],
            total_bytes: 124,
            frame_count: 2,
            first_chunk_preview: Some("data: {}".into()),
            final_message: AccumulatedMessage { content: "Hi there".into(), reasoning: String::new() },
            done_seen: true,
            done_frame: Some(1),
            finish_reason: None,
            unrecognized: Vec::new(),
            control_frames: 0,
            error_body: None,
            stream_end: StreamEnd::TransportClosed,
        }
    }
}
