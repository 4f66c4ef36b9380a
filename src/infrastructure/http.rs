use std::future::Future;
use std::pin::Pin;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::client::conn::http2;
use hyper_util::rt::{TokioExecutor, TokioIo};
use crate::domain::{HttpSummary, ProbeError};
use crate::ports::{BoxedIoStream, HttpClient, HttpExchange, OutboundRequest};
use super::body::{BodyDecoder, BodyFraming};

const HEADER_LIMIT: usize = 32 * 1024;
const READ_BUF: usize = 16 * 1024;
const USER_AGENT: &str = concat!("streamprobe/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Default, Clone, Copy)]
pub struct HybridHttpClient;

impl HybridHttpClient {
    pub fn new() -> Self { Self }
}

pub enum HybridExchange {
    H1(H1Exchange),
    H2(H2Exchange),
}

impl HttpClient for HybridHttpClient {
    type Exchange = HybridExchange;

    async fn send(&self, stream: BoxedIoStream, request: &OutboundRequest, h2: bool) -> Result<HybridExchange, ProbeError> {
        if h2 {
            Ok(HybridExchange::H2(H2Exchange::send(stream, request).await?))
        } else {
            Ok(HybridExchange::H1(H1Exchange::send(stream, request).await?))
        }
    }
}

impl HttpExchange for HybridExchange {
    async fn head(&mut self) -> Result<HttpSummary, ProbeError> {
        match self {
            HybridExchange::H1(x) => x.head().await,
            HybridExchange::H2(x) => x.head().await,
        }
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>, ProbeError> {
        match self {
            HybridExchange::H1(x) => x.next_chunk().await,
            HybridExchange::H2(x) => x.next_chunk().await,
        }
    }
}

pub struct H1Exchange {
    stream: BoxedIoStream,
    pending: Vec<u8>,
    decoder: Option<BodyDecoder>,
    eof: bool,
}

impl H1Exchange {
    async fn send(mut stream: BoxedIoStream, request: &OutboundRequest) -> Result<Self, ProbeError> {
        let mut head = format!(
            "POST {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: {}\r\nAccept: text/event-stream\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
            request.path, request.host_header(), USER_AGENT, request.body.len()
        );
        for (name, value) in &request.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        head.push_str("\r\n");

        stream.write_all(head.as_bytes()).await.map_err(|e| ProbeError::response(format!("failed to send request: {}", e)))?;
        stream.write_all(&request.body).await.map_err(|e| ProbeError::response(format!("failed to send request body: {}", e)))?;
        stream.flush().await.map_err(|e| ProbeError::response(format!("failed to flush request: {}", e)))?;

        Ok(Self { stream, pending: Vec::new(), decoder: None, eof: false })
    }

    async fn read_more(&mut self) -> Result<usize, ProbeError> {
        let mut buf = [0u8; READ_BUF];
        let n = self.stream.read(&mut buf).await.map_err(|e| ProbeError::response(format!("failed to read response: {}", e)))?;
        if n == 0 {
            self.eof = true;
        }
        self.pending.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    async fn head(&mut self) -> Result<HttpSummary, ProbeError> {
        loop {
            if let Some(end) = find_header_end(&self.pending) {
                let (summary, framing) = parse_headers(&self.pending[..end])?;
                self.pending.drain(..end + 4);
                if (100..200).contains(&summary.status) {
                    continue;
                }
                let framing = if summary.status == 204 || summary.status == 304 { BodyFraming::Length(0) } else { framing };
                self.decoder = Some(BodyDecoder::new(framing));
                return Ok(summary);
            }
            if self.pending.len() > HEADER_LIMIT {
                return Err(ProbeError::response(format!("response headers exceed {} bytes", HEADER_LIMIT)));
            }
            if self.read_more().await? == 0 {
                return Err(ProbeError::response("connection closed before response headers"));
            }
        }
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>, ProbeError> {
        loop {
            let decoder = self.decoder.as_mut().ok_or_else(|| ProbeError::other("body read before response head"))?;
            if !self.pending.is_empty() {
                let raw = std::mem::take(&mut self.pending);
                let mut out = Vec::with_capacity(raw.len());
                decoder.decode(&raw, &mut out)?;
                if !out.is_empty() {
                    return Ok(Some(Bytes::from(out)));
                }
                continue;
            }
            if decoder.is_done() || self.eof {
                return Ok(None);
            }
            if self.read_more().await? == 0 {
                tracing::debug!("connection closed by peer");
                return Ok(None);
            }
        }
    }
}

type ResponseFuture = Pin<Box<dyn Future<Output = hyper::Result<hyper::Response<Incoming>>> + Send>>;

pub struct H2Exchange {
    _sender: http2::SendRequest<Full<Bytes>>,
    response: Option<ResponseFuture>,
    body: Option<Incoming>,
}

impl H2Exchange {
    async fn send(stream: BoxedIoStream, request: &OutboundRequest) -> Result<Self, ProbeError> {
        let (mut sender, conn) = http2::handshake(TokioExecutor::new(), TokioIo::new(stream)).await
            .map_err(|e| ProbeError::connect(format!("h2 handshake failed: {}", e)))?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "h2 connection ended");
            }
        });

        let mut builder = hyper::Request::builder()
            .method("POST")
            .uri(format!("https://{}{}", request.host_header(), request.path))
            .header("user-agent", USER_AGENT)
            .header("accept", "text/event-stream")
            .header("content-type", "application/json")
            .header("content-length", request.body.len());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let req = builder.body(Full::new(request.body.clone()))
            .map_err(|e| ProbeError::input(format!("failed to build request: {}", e)))?;

        let response: ResponseFuture = Box::pin(sender.send_request(req));
        Ok(Self { _sender: sender, response: Some(response), body: None })
    }

    async fn head(&mut self) -> Result<HttpSummary, ProbeError> {
        let pending = self.response.take().ok_or_else(|| ProbeError::other("response head already taken"))?;
        let res = pending.await.map_err(|e| ProbeError::response(format!("h2 request failed: {}", e)))?;

        let status = res.status();
        let content_type = res.headers().get("content-type").and_then(|v| v.to_str().ok()).map(|s| s.to_string());
        let summary = HttpSummary::new(status.as_u16(), status.canonical_reason().map(|s| s.to_string()), "h2".to_string(), content_type);
        self.body = Some(res.into_body());
        Ok(summary)
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>, ProbeError> {
        let body = self.body.as_mut().ok_or_else(|| ProbeError::other("body read before response head"))?;
        loop {
            match body.frame().await {
                Some(Ok(frame)) => {
                    if let Ok(data) = frame.into_data() {
                        if !data.is_empty() {
                            return Ok(Some(data));
                        }
                    }
                }
                Some(Err(e)) => return Err(ProbeError::response(format!("failed to read h2 body: {}", e))),
                None => return Ok(None),
            }
        }
    }
}

fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_headers(header_bytes: &[u8]) -> Result<(HttpSummary, BodyFraming), ProbeError> {
    let mut lines = header_bytes.split(|&b| b == b'\n');
    let status_line = lines.next().ok_or_else(|| ProbeError::response("missing status line"))?;
    let status_line = std::str::from_utf8(status_line).map_err(|_| ProbeError::response("invalid status line encoding"))?;
    let status_line = status_line.trim_end_matches('\r');

    let parts: Vec<&str> = status_line.splitn(3, ' ').collect();
    if parts.len() < 2 || !parts[0].starts_with("HTTP/") {
        return Err(ProbeError::response(format!("invalid status line: {}", status_line)));
    }

    let version = if parts[0].contains("1.0") { "http/1.0" } else { "http/1.1" }.to_string();
    let status: u16 = parts[1].parse().map_err(|_| ProbeError::response(format!("invalid status code: {}", parts[1])))?;
    let reason = parts.get(2).map(|s| s.to_string());

    let mut content_type = None;
    let mut content_length = None;
    let mut chunked = false;
    for line in lines {
        let line = std::str::from_utf8(line).unwrap_or("");
        let line = line.trim_end_matches('\r');
        if let Some((key, value)) = line.split_once(':') {
            let value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "content-type" => content_type = Some(value.to_string()),
                "content-length" => content_length = value.parse::<u64>().ok(),
                "transfer-encoding" => chunked = value.to_ascii_lowercase().contains("chunked"),
                _ => {}
            }
        }
    }

    let framing = if chunked {
        BodyFraming::Chunked
    } else if let Some(n) = content_length {
        BodyFraming::Length(n)
    } else {
        BodyFraming::UntilClose
    };
    Ok((HttpSummary::new(status, reason, version, content_type), framing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt as _, AsyncWriteExt as _};

    fn request() -> OutboundRequest {
        OutboundRequest {
            host: "127.0.0.1".into(),
            port: 8080,
            path: "/v1/chat/completions".into(),
            is_https: false,
            headers: vec![("Authorization".into(), "Bearer k".into())],
            body: Bytes::from_static(b"{\"stream\":true}"),
        }
    }

    #[test]
    fn parses_status_and_framing() {
        let (s, f) = parse_headers(b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked").unwrap();
        assert_eq!(s.status, 200);
        assert!(s.is_event_stream());
        assert_eq!(f, BodyFraming::Chunked);

        let (_, f) = parse_headers(b"HTTP/1.0 401 Unauthorized\r\nContent-Length: 12").unwrap();
        assert_eq!(f, BodyFraming::Length(12));

        assert!(parse_headers(b"garbage").is_err());
    }

    #[tokio::test]
    async fn h1_exchange_over_duplex() {
        let (client, mut server) = duplex(64 * 1024);
        let server_task = tokio::spawn(async move {
            let mut raw = Vec::new();
            let mut buf = vec![0u8; 4096];
            while !raw.ends_with(b"{\"stream\":true}") {
                let n = server.read(&mut buf).await.unwrap();
                assert!(n > 0, "client closed before the body was sent");
                raw.extend_from_slice(&buf[..n]);
            }
            let req = String::from_utf8_lossy(&raw).to_string();
            server.write_all(b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\n\r\n").await.unwrap();
            server.write_all(b"9\r\ndata: hi\n\r\n").await.unwrap();
            server.write_all(b"0\r\n\r\n").await.unwrap();
            req
        });

        let mut exchange = H1Exchange::send(BoxedIoStream::new(client), &request()).await.unwrap();
        let head = exchange.head().await.unwrap();
        assert_eq!(head.status, 200);

        let mut body = Vec::new();
        while let Some(chunk) = exchange.next_chunk().await.unwrap() {
            body.extend_from_slice(&chunk);
        }
        assert_eq!(body, b"data: hi\n");

        let req = server_task.await.unwrap();
        assert!(req.starts_with("POST /v1/chat/completions HTTP/1.1\r\n"));
        assert!(req.contains("Host: 127.0.0.1:8080\r\n"));
        assert!(req.contains("Content-Length: 15\r\n"));
        assert!(req.ends_with("\r\n\r\n{\"stream\":true}"));
    }

    struct DataFrames(std::collections::VecDeque<Bytes>);

    impl hyper::body::Body for DataFrames {
        type Data = Bytes;
        type Error = std::convert::Infallible;

        fn poll_frame(
            mut self: Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Option<Result<hyper::body::Frame<Bytes>, Self::Error>>> {
            std::task::Poll::Ready(self.0.pop_front().map(|b| Ok(hyper::body::Frame::data(b))))
        }
    }

    #[tokio::test]
    async fn h2_exchange_over_duplex() {
        let (client, server) = duplex(64 * 1024);
        tokio::spawn(async move {
            let service = hyper::service::service_fn(|req: hyper::Request<Incoming>| async move {
                assert_eq!(req.method(), "POST");
                assert_eq!(req.uri().path(), "/v1/chat/completions");
                assert_eq!(req.headers()["authorization"], "Bearer k");
                let frames = DataFrames(
                    vec![Bytes::from_static(b"data: {\"a\":"), Bytes::from_static(b"1}\n\n"), Bytes::from_static(b"data: [DONE]\n\n")].into(),
                );
                let res = hyper::Response::builder().status(200).header("content-type", "text/event-stream").body(frames).unwrap();
                Ok::<_, std::convert::Infallible>(res)
            });
            hyper::server::conn::http2::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(server), service)
                .await
                .ok();
        });

        let mut exchange = H2Exchange::send(BoxedIoStream::new(client), &request()).await.unwrap();
        let head = exchange.head().await.unwrap();
        assert_eq!(head.status, 200);
        assert_eq!(head.version, "h2");
        assert!(head.is_event_stream());

        let mut chunks = Vec::new();
        while let Some(chunk) = exchange.next_chunk().await.unwrap() {
            assert!(!chunk.is_empty());
            chunks.push(chunk);
        }
        assert!(!chunks.is_empty());
        assert_eq!(chunks.concat(), b"data: {\"a\":1}\n\ndata: [DONE]\n\n");
    }

    #[tokio::test]
    async fn h1_closed_before_headers() {
        let (client, server) = duplex(1024);
        drop(server);
        let err = match H1Exchange::send(BoxedIoStream::new(client), &request()).await {
            Ok(mut x) => x.head().await.unwrap_err(),
            Err(e) => e,
        };
        assert_eq!(err.class, crate::domain::ErrorClass::Response);
    }
}
