use crate::domain::ProbeReport;
use crate::ports::Renderer;

#[derive(Debug, Default, Clone, Copy)]
pub struct PrettyRenderer;

impl PrettyRenderer {
    pub fn new() -> Self { Self }
}

impl Renderer for PrettyRenderer {
    fn render(&self, report: &ProbeReport) -> String {
        let mut out = String::new();

        let status = report.http.as_ref().map(|h| h.status_line()).unwrap_or_else(|| "-".to_string());
        let version = report.http.as_ref().map(|h| h.version.as_str()).unwrap_or("-");
        out.push_str(&format!(
            "{}  {}  total={:.1}ms  ttfb={}  ttft={}  chunks={}  end={}\n",
            status,
            version,
            report.total_ms,
            opt_ms(report.ttfb_ms),
            opt_ms(report.ttft_ms),
            report.chunk_count(),
            end_label(report),
        ));

        if report.has_unrecognized() {
            out.push_str(&format!("⚠ {} unrecognized frame(s) in stream\n", report.unrecognized.len()));
        }
        if let Some(http) = &report.http {
            if http.is_success() && !http.is_event_stream() {
                out.push_str(&format!("⚠ content-type is {}, not text/event-stream\n", http.content_type.as_deref().unwrap_or("unset")));
            }
        }

        out.push('\n');
        out.push_str("TARGET\n");
        out.push_str(&format!("  url:    {}\n", report.url));
        out.push_str(&format!("  host:   {}\n", report.host));
        if let Some(resolved) = &report.resolved {
            out.push_str(&format!("  ip:     {}   ({})\n", resolved.as_socket_str(), resolved.family));
            if resolved.all_ips.len() > 1 {
                out.push_str(&format!("  ips:    {}\n", resolved.ips_short()));
            }
        }
        if let Some(tls) = &report.tls {
            out.push_str(&format!("  tls:    {}  alpn={}\n", tls.version, tls.alpn.as_deref().unwrap_or("-")));
        }

        out.push('\n');
        out.push_str("TIMINGS\n");
        out.push_str(&format!("  dns:     {:>10}\n", opt_ms(report.dns_ms)));
        out.push_str(&format!("  connect: {:>10}\n", opt_ms(report.connect_ms)));
        if report.tls_ms.is_some() {
            out.push_str(&format!("  tls:     {:>10}\n", opt_ms(report.tls_ms)));
        }
        out.push_str(&format!("  ttfb:    {:>10}\n", opt_ms(report.ttfb_ms)));
        out.push_str(&format!("  ttft:    {:>10}", opt_ms(report.ttft_ms)));
        match report.ttft_ratio() {
            Some(ratio) => out.push_str(&format!("  ({:.1}% of total)\n", ratio)),
            None => out.push('\n'),
        }
        if report.first_content_ms != report.ttft_ms {
            out.push_str(&format!("  content: {:>10}\n", opt_ms(report.first_content_ms)));
        }
        out.push_str(&format!("  total:   {:>10}\n", format!("{:.1} ms", report.total_ms)));

        if !report.chunk_timeline.is_empty() {
            out.push('\n');
            out.push_str(&format!("CHUNKS ({}, {} bytes, {} frames)\n", report.chunk_count(), report.total_bytes, report.frame_count));
            for chunk in &report.chunk_timeline {
                out.push_str(&format!(
                    "  #{:>3}: +{:>8.1}ms  @{:>9.1}ms  ({} bytes)\n",
                    chunk.index, chunk.inter_arrival_ms, chunk.elapsed_ms, chunk.byte_length
                ));
            }
            if let Some(gap) = report.slowest_gap() {
                out.push_str(&format!("  slowest gap: {:.1} ms before #{}\n", gap.inter_arrival_ms, gap.index));
            }
        }

        out.push('\n');
        out.push_str("MESSAGE\n");
        if !report.final_message.reasoning.is_empty() {
            out.push_str(&format!("  reasoning: {}\n", escape_newlines(&report.final_message.reasoning)));
        }
        out.push_str(&format!("  content:   {}\n", escape_newlines(&report.final_message.content)));
        if let Some(reason) = &report.finish_reason {
            out.push_str(&format!("  finish:    {}\n", reason));
        }
        match report.done_frame {
            Some(frame) => out.push_str(&format!("  [DONE]:    yes (frame {})\n", frame)),
            None => out.push_str("  [DONE]:    no\n"),
        }
        if report.control_frames > 0 {
            out.push_str(&format!("  control:   {} frame(s)\n", report.control_frames));
        }

        if report.has_unrecognized() {
            out.push('\n');
            out.push_str("UNRECOGNIZED\n");
            for raw in &report.unrecognized {
                out.push_str(&format!("  {}\n", shorten(raw, 120)));
            }
        }

        if let Some(body) = &report.error_body {
            out.push('\n');
            out.push_str("ERROR BODY\n");
            out.push_str(&format!("  {}\n", shorten(body, 500)));
        }

        out
    }
}

fn opt_ms(v: Option<f64>) -> String {
    v.map(|ms| format!("{:.1} ms", ms)).unwrap_or_else(|| "-".to_string())
}

fn end_label(report: &ProbeReport) -> &'static str {
    use crate::domain::StreamEnd;
    match report.stream_end {
        StreamEnd::TransportClosed if report.terminated_cleanly() => "done",
        StreamEnd::TransportClosed => "closed",
        StreamEnd::Timeout => "timeout",
        StreamEnd::Failed => "failed",
    }
}

fn escape_newlines(s: &str) -> String {
    s.replace('\n', "\\n")
}

fn shorten(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRenderer;

impl JsonRenderer {
    pub fn new() -> Self { Self }
}

impl Renderer for JsonRenderer {
    fn render(&self, report: &ProbeReport) -> String {
        let mut value = match serde_json::to_value(report) {
            Ok(v) => v,
            Err(e) => return format!("{{\"error\": {:?}}}\n", e.to_string()),
        };
        if let Some(obj) = value.as_object_mut() {
            obj.insert("chunk_count".into(), report.chunk_count().into());
            obj.insert("ttft_ratio".into(), report.ttft_ratio().into());
            obj.insert("has_unrecognized".into(), report.has_unrecognized().into());
        }
        let mut out = serde_json::to_string_pretty(&value).unwrap_or_default();
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::report;

    #[test]
    fn pretty_shows_headline_durations_and_timeline() {
        let out = PrettyRenderer::new().render(&report());
        assert!(out.contains("  dns:         3.0 ms"));
        assert!(out.contains("  ttfb:      150.0 ms"));
        assert!(out.contains("  ttft:       40.0 ms  (10.0% of total)"));
        assert!(out.contains("CHUNKS (2, 124 bytes, 2 frames)"));
        assert!(out.contains("#  1: +   167.0ms"));
        assert!(out.contains("content:   Hi there"));
        assert!(out.contains("slowest gap: 167.0 ms before #1"));
        assert!(out.contains("[DONE]:    yes (frame 1)"));
        assert!(!out.contains("UNRECOGNIZED"));
    }

    #[test]
    fn pretty_flags_unrecognized_frames() {
        let mut r = report();
        r.unrecognized.push("{bad json".into());
        let out = PrettyRenderer::new().render(&r);
        assert!(out.contains("1 unrecognized frame(s)"));
        assert!(out.contains("UNRECOGNIZED\n  {bad json"));
    }

    #[test]
    fn json_is_parseable_and_complete() {
        let out = JsonRenderer::new().render(&report());
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["ttfb_ms"], 150.0);
        assert_eq!(v["chunk_count"], 2);
        assert_eq!(v["chunk_timeline"][1]["inter_arrival_ms"], 167.0);
        assert_eq!(v["final_message"]["content"], "Hi there");
        assert_eq!(v["has_unrecognized"], false);
        assert_eq!(v["stream_end"], "transport_closed");
    }

    #[test]
    fn shorten_respects_char_boundaries() {
        assert_eq!(shorten("你好世界你好", 5), "你好...");
        assert_eq!(shorten("abc", 5), "abc");
    }
}
