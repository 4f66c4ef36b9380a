use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use streamprobe::application::{Config, ProbeRunner};
use streamprobe::domain::{ApiKey, ChatMessage, ChatRequest, ErrorClass, ProbeRequest, StreamEnd};
use streamprobe::infrastructure::{HickoryDnsResolver, HybridHttpClient, JsonRenderer, RustlsTlsHandshaker, TokioClock, TokioTcpDialer};
use streamprobe::ports::Renderer;

const SSE_HEAD: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\n\r\n";

/// Serves one connection: reads the request, then writes `head` followed by
/// each body part with `gap` between writes. Returns the raw request text.
async fn serve_once(head: &'static [u8], parts: Vec<&'static [u8]>, gap: Duration) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = sock.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
            if n == 0 || request_complete(&request) {
                break;
            }
        }
        sock.write_all(head).await.unwrap();
        for part in parts {
            tokio::time::sleep(gap).await;
            sock.write_all(part).await.unwrap();
            sock.flush().await.unwrap();
        }
        String::from_utf8_lossy(&request).into_owned()
    });
    (format!("http://{}/v1/chat/completions", addr), handle)
}

fn request_complete(raw: &[u8]) -> bool {
    let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") else { return false };
    let head = String::from_utf8_lossy(&raw[..end]).to_ascii_lowercase();
    let length = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    raw.len() >= end + 4 + length
}

fn runner(config: Config) -> ProbeRunner<HickoryDnsResolver, TokioTcpDialer, RustlsTlsHandshaker, HybridHttpClient, TokioClock> {
    rustls::crypto::ring::default_provider().install_default().ok();
    ProbeRunner::new(
        HickoryDnsResolver::new().unwrap(),
        TokioTcpDialer::new(),
        RustlsTlsHandshaker::new().unwrap(),
        HybridHttpClient::new(),
        TokioClock::new(),
        config,
    )
}

fn chat(url: &str) -> ProbeRequest {
    ProbeRequest::new(url, ChatRequest::new("test-model", vec![ChatMessage::user("hello")])).with_api_key(ApiKey::new("sk-test"))
}

#[tokio::test]
async fn streams_over_chunked_http1() {
    let parts: Vec<&'static [u8]> = vec![
        b"30\r\ndata: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n\r\n",
        b"34\r\ndata: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\n\r\n",
        b"e\r\ndata: [DONE]\n\n\r\n",
        b"0\r\n\r\n",
    ];
    let (url, server) = serve_once(SSE_HEAD, parts, Duration::from_millis(10)).await;

    let report = runner(Config::from_env().with_timeout(Duration::from_secs(5))).run(&chat(&url)).await.unwrap();
    let raw_request = server.await.unwrap();

    assert!(raw_request.starts_with("POST /v1/chat/completions HTTP/1.1\r\n"));
    assert!(raw_request.contains("Authorization: Bearer sk-test"));
    assert!(raw_request.contains("\"stream\":true"));

    assert_eq!(report.final_message.content, "Hi there");
    assert!(report.done_seen);
    assert_eq!(report.stream_end, StreamEnd::TransportClosed);
    assert_eq!(report.http.as_ref().map(|h| h.status), Some(200));
    assert!(report.tls.is_none());
    assert!(report.chunk_count() >= 1);
    assert!(report.ttfb_ms.is_some() && report.ttft_ms.is_some());
    assert!(report.phases.windows(2).all(|w| w[0].elapsed_ms <= w[1].elapsed_ms));

    let json: serde_json::Value = serde_json::from_str(&JsonRenderer::new().render(&report)).unwrap();
    assert_eq!(json["final_message"]["content"], "Hi there");
}

#[tokio::test]
async fn error_status_reports_body() {
    let head: &'static [u8] = b"HTTP/1.1 429 Too Many Requests\r\nContent-Type: application/json\r\nContent-Length: 22\r\n\r\n";
    let (url, server) = serve_once(head, vec![b"{\"error\":\"rate limit\"}"], Duration::ZERO).await;

    let failure = runner(Config::from_env().with_timeout(Duration::from_secs(5))).run(&chat(&url)).await.unwrap_err();
    server.await.unwrap();

    assert_eq!(failure.error.class, ErrorClass::Response);
    assert_eq!(failure.partial.error_body.as_deref(), Some("{\"error\":\"rate limit\"}"));
    assert_eq!(failure.partial.chunk_count(), 0);
}

#[tokio::test]
async fn refused_connection_is_a_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = format!("http://{}/v1/chat/completions", addr);
    let failure = runner(Config::from_env()).run(&chat(&url)).await.unwrap_err();
    assert_eq!(failure.error.class, ErrorClass::Connect);
    assert!(failure.partial.dns_ms.is_some());
}
