use std::future::Future;
use std::time::{Duration, Instant};
use bytes::Bytes;
use crate::domain::*;
use crate::ports::*;
use super::{Config, ParsedUrl};

pub struct ProbeRunner<D, T, L, H, C>
where
    D: DnsResolver,
    T: TcpDialer,
    L: TlsHandshaker,
    H: HttpClient,
    C: Clock,
{
    dns: D,
    tcp: T,
    tls: L,
    http: H,
    clock: C,
    config: Config,
}

impl<D, T, L, H, C> ProbeRunner<D, T, L, H, C>
where
    D: DnsResolver,
    T: TcpDialer,
    L: TlsHandshaker,
    H: HttpClient,
    C: Clock,
{
    pub fn new(dns: D, tcp: T, tls: L, http: H, clock: C, config: Config) -> Self {
        Self { dns, tcp, tls, http, clock, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn run(&self, request: &ProbeRequest) -> Result<ProbeReport, ProbeFailure> {
        let origin = self.clock.now();
        let deadline = origin + self.config.timeout;
        let mut run = RunState::new(origin, request, &self.config);

        let outcome = self.drive(&mut run, request, deadline).await;
        let end = match &outcome {
            Ok(()) => StreamEnd::TransportClosed,
            Err(e) if e.class == ErrorClass::Timeout => StreamEnd::Timeout,
            Err(_) => StreamEnd::Failed,
        };
        let report = run.finish(self.clock.now(), end);

        match outcome {
            Ok(()) => {
                tracing::info!(url = %report.url, total_ms = report.total_ms, chunks = report.chunk_count(), "probe finished");
                Ok(report)
            }
            Err(error) => {
                tracing::warn!(url = %report.url, %error, "probe failed");
                Err(ProbeFailure { error, partial: Box::new(report) })
            }
        }
    }

    async fn drive(&self, run: &mut RunState, request: &ProbeRequest, deadline: Instant) -> Result<(), ProbeError> {
        let url = ParsedUrl::parse(&request.url)?;
        run.url = url.full.clone();
        run.host = url.host.clone();

        let ips = self.within(deadline, "resolving host", self.dns.resolve(&url.host)).await?;
        run.mark(Phase::DnsResolved, self.clock.now());
        let ip = ips.first().copied().ok_or_else(|| ProbeError::resolution(format!("no IP addresses for {}", url.host)))?;
        run.resolved = Some(ResolvedTarget::new(ip, url.port, ips));

        let stream = self.connect_stage(deadline, "connecting", self.tcp.connect(ip, url.port)).await?;
        run.mark(Phase::TcpConnected, self.clock.now());

        let (stream, h2) = if url.is_https() {
            let session = self.connect_stage(deadline, "TLS handshake", self.tls.handshake(stream, &url.host)).await?;
            run.mark(Phase::TlsEstablished, self.clock.now());
            let h2 = session.summary.is_h2();
            run.tls = Some(session.summary);
            (session.stream, h2)
        } else {
            (stream, false)
        };

        let outbound = build_outbound(&url, request)?;
        let mut exchange = self.within(deadline, "sending request", self.http.send(stream, &outbound, h2)).await?;
        run.mark(Phase::RequestSent, self.clock.now());

        let head = self.within(deadline, "awaiting response headers", exchange.head()).await
            .map_err(|e| if e.class == ErrorClass::Timeout { e.with_class(ErrorClass::Response) } else { e })?;
        run.mark(Phase::HeadersReceived, self.clock.now());
        let success = head.is_success();
        let status_line = head.status_line();
        if !head.is_event_stream() {
            tracing::debug!(content_type = head.content_type.as_deref().unwrap_or("-"), "response is not an event stream");
        }
        run.http = Some(head);

        if !success {
            tracing::warn!(status = %status_line, "upstream returned an error status");
            run.error_body = Some(self.capture_error_body(&mut exchange, deadline).await);
            return Err(ProbeError::response(format!("upstream returned {}", status_line)));
        }

        loop {
            let next = self.within(deadline, "reading stream", exchange.next_chunk()).await?;
            let arrival = self.clock.now();
            match next {
                Some(bytes) => run.on_chunk(RawChunk::new(bytes, arrival))?,
                None => break,
            }
        }
        run.flush();
        Ok(())
    }

    async fn within<F, R>(&self, deadline: Instant, stage: &str, future: F) -> Result<R, ProbeError>
    where
        F: Future<Output = Result<R, ProbeError>> + Send,
        R: Send,
    {
        let expired = || ProbeError::timeout(format!("run deadline of {:?} exceeded while {}", self.config.timeout, stage));
        // Checked up front: tokio's timeout polls the inner future before its timer.
        let now = self.clock.now();
        if now >= deadline {
            return Err(expired());
        }
        self.clock.timeout(deadline - now, future).await.map_err(|_| expired())?
    }

    /// Like `within`, but bounded by the connect timeout as well. Hitting the
    /// connect timeout before the run deadline is a connect failure.
    async fn connect_stage<F, R>(&self, deadline: Instant, stage: &str, future: F) -> Result<R, ProbeError>
    where
        F: Future<Output = Result<R, ProbeError>> + Send,
        R: Send,
    {
        let now = self.clock.now();
        let remaining = deadline.saturating_duration_since(now);
        if self.config.connect_timeout >= remaining {
            return self.within(deadline, stage, future).await;
        }
        self.clock.timeout(self.config.connect_timeout, future).await
            .map_err(|_| ProbeError::connect(format!("{} timed out after {:?}", stage, self.config.connect_timeout)))?
    }

    async fn capture_error_body(&self, exchange: &mut H::Exchange, deadline: Instant) -> String {
        let limit = self.config.error_body_limit;
        let mut body = Vec::new();
        while body.len() < limit {
            match self.within(deadline, "reading error body", exchange.next_chunk()).await {
                Ok(Some(chunk)) => {
                    let take = chunk.len().min(limit - body.len());
                    body.extend_from_slice(&chunk[..take]);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(error = %e, "error body truncated");
                    break;
                }
            }
        }
        String::from_utf8_lossy(&body).into_owned()
    }
}

fn build_outbound(url: &ParsedUrl, request: &ProbeRequest) -> Result<OutboundRequest, ProbeError> {
    let body = request.body.to_json().map_err(|e| ProbeError::input(format!("failed to encode request body: {}", e)))?;
    let mut headers = Vec::new();
    if let Some(key) = &request.api_key {
        headers.push(("Authorization".to_string(), key.bearer()));
    }
    Ok(OutboundRequest {
        host: url.host.clone(),
        port: url.port,
        path: url.path_and_query.clone(),
        is_https: url.is_https(),
        headers,
        body: Bytes::from(body),
    })
}

struct RunState {
    tracker: PhaseTracker,
    demux: FrameDemuxer,
    message: AccumulatedMessage,
    preview_limit: usize,

    url: String,
    host: String,
    resolved: Option<ResolvedTarget>,
    http: Option<HttpSummary>,
    tls: Option<TlsSummary>,

    total_bytes: u64,
    frame_count: usize,
    first_chunk_preview: Option<String>,
    first_content: Option<Duration>,
    done_frame: Option<usize>,
    finish_reason: Option<String>,
    unrecognized: Vec<String>,
    control_frames: usize,
    error_body: Option<String>,
}

impl RunState {
    fn new(origin: Instant, request: &ProbeRequest, config: &Config) -> Self {
        Self {
            tracker: PhaseTracker::new(origin),
            demux: FrameDemuxer::new(config.max_frame_bytes),
            message: AccumulatedMessage::default(),
            preview_limit: config.preview_limit,
            url: request.url.clone(),
            host: String::new(),
            resolved: None,
            http: None,
            tls: None,
            total_bytes: 0,
            frame_count: 0,
            first_chunk_preview: None,
            first_content: None,
            done_frame: None,
            finish_reason: None,
            unrecognized: Vec::new(),
            control_frames: 0,
            error_body: None,
        }
    }

    fn mark(&mut self, phase: Phase, at: Instant) {
        let mark = self.tracker.mark(phase, at);
        tracing::debug!(phase = phase.label(), elapsed_ms = mark.elapsed_ms(), "phase");
    }

    fn on_chunk(&mut self, chunk: RawChunk) -> Result<(), ProbeError> {
        let mark = self.tracker.mark_chunk(chunk.arrival, chunk.len());
        tracing::trace!(seq = ?mark.sequence, bytes = chunk.len(), elapsed_ms = mark.elapsed_ms(), "chunk");
        self.total_bytes += chunk.len() as u64;
        if self.first_chunk_preview.is_none() {
            let end = chunk.len().min(self.preview_limit);
            self.first_chunk_preview = Some(String::from_utf8_lossy(&chunk.bytes[..end]).into_owned());
        }

        for frame in self.demux.feed(&chunk.bytes)? {
            self.apply_frame(&frame, mark.elapsed);
        }
        Ok(())
    }

    fn apply_frame(&mut self, frame: &Frame, arrived: Duration) {
        let index = self.frame_count;
        self.frame_count += 1;
        tracing::trace!(frame = index, bytes = frame.as_bytes().len(), "frame");
        for event in decode(frame) {
            match &event {
                StreamEvent::Done => {
                    tracing::debug!(frame = index, "termination sentinel");
                    self.done_frame.get_or_insert(index);
                }
                StreamEvent::Finish(reason) => {
                    tracing::debug!(frame = index, reason = %reason, "finish reason");
                    self.finish_reason = Some(reason.clone());
                }
                StreamEvent::Unrecognized(raw) => {
                    tracing::warn!(frame = index, raw = %raw, "unrecognized frame");
                    self.unrecognized.push(raw.clone());
                }
                StreamEvent::Control(_) => self.control_frames += 1,
                StreamEvent::ContentDelta(_) | StreamEvent::ReasoningDelta(_) => {
                    if self.done_frame.is_some() {
                        tracing::debug!(frame = index, "delta after termination sentinel");
                    }
                    if self.message.apply(&event) && self.first_content.is_none() {
                        self.first_content = Some(arrived);
                    }
                }
            }
        }
    }

    fn flush(&mut self) {
        let arrived = self.tracker.last_elapsed();
        if let Some(frame) = self.demux.finish() {
            self.apply_frame(&frame, arrived);
        }
    }

    fn finish(mut self, at: Instant, end: StreamEnd) -> ProbeReport {
        let ended = self.tracker.mark(Phase::StreamEnded, at);
        let t = &self.tracker;
        let headers = t.first(Phase::HeadersReceived).map(|m| m.elapsed);

        ProbeReport {
            url: self.url,
            host: self.host,
            resolved: self.resolved,
            http: self.http,
            tls: self.tls,
            dns_ms: t.first(Phase::DnsResolved).map(|m| m.elapsed_ms()),
            connect_ms: t.elapsed_between(Phase::DnsResolved, Phase::TcpConnected).map(as_ms),
            tls_ms: t.elapsed_between(Phase::TcpConnected, Phase::TlsEstablished).map(as_ms),
            ttfb_ms: t.ttfb().map(as_ms),
            ttft_ms: t.ttft().map(as_ms),
            first_content_ms: match (self.first_content, headers) {
                (Some(c), Some(h)) => Some(as_ms(c.saturating_sub(h))),
                _ => None,
            },
            total_ms: ended.elapsed_ms(),
            phases: t.phase_timeline(),
            chunk_timeline: t.chunk_timeline(),
            total_bytes: self.total_bytes,
            frame_count: self.frame_count,
            first_chunk_preview: self.first_chunk_preview,
            final_message: self.message,
            done_seen: self.done_frame.is_some(),
            done_frame: self.done_frame,
            finish_reason: self.finish_reason,
            unrecognized: self.unrecognized,
            control_frames: self.control_frames,
            error_body: self.error_body,
            stream_end: end,
        }
    }
}
