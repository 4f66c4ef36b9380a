use std::time::{Duration, Instant};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    DnsResolved,
    TcpConnected,
    TlsEstablished,
    RequestSent,
    HeadersReceived,
    ChunkReceived,
    StreamEnded,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::DnsResolved => "dns_resolved",
            Phase::TcpConnected => "tcp_connected",
            Phase::TlsEstablished => "tls_established",
            Phase::RequestSent => "request_sent",
            Phase::HeadersReceived => "headers_received",
            Phase::ChunkReceived => "chunk_received",
            Phase::StreamEnded => "stream_ended",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseMark {
    pub phase: Phase,
    pub elapsed: Duration,
    pub sequence: Option<usize>,
    pub bytes: Option<usize>,
}

impl PhaseMark {
    pub fn elapsed_ms(&self) -> f64 {
        as_ms(self.elapsed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseTiming {
    pub phase: Phase,
    pub elapsed_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<usize>,
}

impl From<&PhaseMark> for PhaseTiming {
    fn from(m: &PhaseMark) -> Self {
        Self { phase: m.phase, elapsed_ms: m.elapsed_ms(), sequence: m.sequence }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkTiming {
    pub index: usize,
    pub elapsed_ms: f64,
    pub inter_arrival_ms: f64,
    pub byte_length: usize,
}

#[derive(Debug, Clone)]
pub struct PhaseTracker {
    origin: Instant,
    marks: Vec<PhaseMark>,
    chunks: usize,
}

impl PhaseTracker {
    pub fn new(origin: Instant) -> Self {
        Self { origin, marks: Vec::new(), chunks: 0 }
    }

    pub fn origin(&self) -> Instant {
        self.origin
    }

    pub fn marks(&self) -> &[PhaseMark] {
        &self.marks
    }

    pub fn mark(&mut self, phase: Phase, at: Instant) -> PhaseMark {
        self.push(phase, at, None, None)
    }

    pub fn mark_chunk(&mut self, at: Instant, bytes: usize) -> PhaseMark {
        let sequence = self.chunks;
        self.chunks += 1;
        self.push(Phase::ChunkReceived, at, Some(sequence), Some(bytes))
    }

    fn push(&mut self, phase: Phase, at: Instant, sequence: Option<usize>, bytes: Option<usize>) -> PhaseMark {
        // Clamped so marks never move backwards.
        let mut elapsed = at.saturating_duration_since(self.origin);
        if let Some(last) = self.marks.last() {
            elapsed = elapsed.max(last.elapsed);
        }
        let mark = PhaseMark { phase, elapsed, sequence, bytes };
        self.marks.push(mark);
        mark
    }

    pub fn first(&self, phase: Phase) -> Option<&PhaseMark> {
        self.marks.iter().find(|m| m.phase == phase)
    }

    pub fn chunk(&self, index: usize) -> Option<&PhaseMark> {
        self.marks.iter().find(|m| m.phase == Phase::ChunkReceived && m.sequence == Some(index))
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    pub fn elapsed_between(&self, from: Phase, to: Phase) -> Option<Duration> {
        let a = self.first(from)?;
        let b = self.first(to)?;
        Some(b.elapsed.saturating_sub(a.elapsed))
    }

    pub fn last_elapsed(&self) -> Duration {
        self.marks.last().map(|m| m.elapsed).unwrap_or_default()
    }

    pub fn ttfb(&self) -> Option<Duration> {
        self.elapsed_between(Phase::RequestSent, Phase::HeadersReceived)
    }

    pub fn ttft(&self) -> Option<Duration> {
        self.elapsed_between(Phase::HeadersReceived, Phase::ChunkReceived)
    }

    /// Gap between chunk `n` and the previous boundary (headers for chunk 0).
    pub fn inter_arrival(&self, n: usize) -> Option<Duration> {
        let current = self.chunk(n)?;
        let previous = if n == 0 {
            self.first(Phase::HeadersReceived)?.elapsed
        } else {
            self.chunk(n - 1)?.elapsed
        };
        Some(current.elapsed.saturating_sub(previous))
    }

    pub fn phase_timeline(&self) -> Vec<PhaseTiming> {
        self.marks.iter().map(PhaseTiming::from).collect()
    }

    pub fn chunk_timeline(&self) -> Vec<ChunkTiming> {
        let headers = self.first(Phase::HeadersReceived).map(|m| m.elapsed).unwrap_or_default();
        let mut previous = headers;
        self.marks
            .iter()
            .filter(|m| m.phase == Phase::ChunkReceived)
            .map(|m| {
                let timing = ChunkTiming {
                    index: m.sequence.unwrap_or_default(),
                    elapsed_ms: as_ms(m.elapsed),
                    inter_arrival_ms: as_ms(m.elapsed.saturating_sub(previous)),
                    byte_length: m.bytes.unwrap_or_default(),
                };
                previous = m.elapsed;
                timing
            })
            .collect()
    }
}

pub fn as_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_with_chunks() -> (PhaseTracker, Instant) {
        let origin = Instant::now();
        let mut t = PhaseTracker::new(origin);
        t.mark(Phase::DnsResolved, origin + Duration::from_millis(2));
        t.mark(Phase::TcpConnected, origin + Duration::from_millis(5));
        t.mark(Phase::RequestSent, origin + Duration::from_millis(6));
        t.mark(Phase::HeadersReceived, origin + Duration::from_millis(40));
        t.mark_chunk(origin + Duration::from_millis(55), 120);
        t.mark_chunk(origin + Duration::from_millis(70), 80);
        t.mark(Phase::StreamEnded, origin + Duration::from_millis(71));
        (t, origin)
    }

    #[test]
    fn derived_intervals() {
        let (t, _) = tracker_with_chunks();
        assert_eq!(t.ttfb(), Some(Duration::from_millis(34)));
        assert_eq!(t.ttft(), Some(Duration::from_millis(15)));
        assert_eq!(t.inter_arrival(0), Some(Duration::from_millis(15)));
        assert_eq!(t.inter_arrival(1), Some(Duration::from_millis(15)));
        assert_eq!(t.inter_arrival(2), None);
        assert_eq!(t.elapsed_between(Phase::DnsResolved, Phase::StreamEnded), Some(Duration::from_millis(69)));
    }

    #[test]
    fn chunk_marks_are_sequenced() {
        let (t, _) = tracker_with_chunks();
        assert_eq!(t.chunk_count(), 2);
        assert_eq!(t.chunk(1).and_then(|m| m.bytes), Some(80));

        let timeline = t.chunk_timeline();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].index, 0);
        assert_eq!(timeline[0].byte_length, 120);
        assert!((timeline[1].inter_arrival_ms - 15.0).abs() < 1e-6);
    }

    #[test]
    fn marks_never_go_backwards() {
        let origin = Instant::now();
        let mut t = PhaseTracker::new(origin);
        t.mark(Phase::RequestSent, origin + Duration::from_millis(10));
        let late = t.mark(Phase::HeadersReceived, origin + Duration::from_millis(3));
        assert_eq!(late.elapsed, Duration::from_millis(10));

        let before_origin = PhaseTracker::new(origin + Duration::from_secs(1)).mark(Phase::DnsResolved, origin);
        assert_eq!(before_origin.elapsed, Duration::ZERO);
    }

    #[test]
    fn missing_phases_yield_none() {
        let t = PhaseTracker::new(Instant::now());
        assert_eq!(t.ttfb(), None);
        assert_eq!(t.ttft(), None);
        assert!(t.chunk_timeline().is_empty());
        assert_eq!(t.last_elapsed(), Duration::ZERO);
    }
}
