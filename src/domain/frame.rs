use std::time::Instant;
use bytes::Bytes;
use crate::domain::ProbeError;

pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct RawChunk {
    pub bytes: Bytes,
    pub arrival: Instant,
}

impl RawChunk {
    pub fn new(bytes: Bytes, arrival: Instant) -> Self {
        Self { bytes, arrival }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Vec<u8>);

impl Frame {
    pub fn new(line: impl Into<Vec<u8>>) -> Self {
        Self(line.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

#[derive(Debug)]
pub struct FrameDemuxer {
    buffer: Vec<u8>,
    max_frame_bytes: usize,
    bytes_in: u64,
    bytes_framed: u64,
}

impl FrameDemuxer {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self { buffer: Vec::new(), max_frame_bytes, bytes_in: 0, bytes_framed: 0 }
    }

    /// Fails with a protocol error once the unterminated remainder exceeds the frame cap.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Frame>, ProbeError> {
        let scan_from = self.buffer.len();
        self.buffer.extend_from_slice(chunk);
        self.bytes_in += chunk.len() as u64;

        let mut frames = Vec::new();
        let mut start = 0;
        let mut cursor = scan_from;
        while let Some(pos) = self.buffer[cursor..].iter().position(|&b| b == b'\n') {
            let end = cursor + pos;
            let line = &self.buffer[start..end];
            if let Some(frame) = to_frame(line) {
                frames.push(frame);
            }
            self.bytes_framed += (end + 1 - start) as u64;
            start = end + 1;
            cursor = start;
        }
        self.buffer.drain(..start);

        if self.buffer.len() > self.max_frame_bytes {
            return Err(ProbeError::protocol(format!(
                "unterminated frame exceeds {} bytes ({} buffered)",
                self.max_frame_bytes,
                self.buffer.len()
            )));
        }
        Ok(frames)
    }

    pub fn finish(&mut self) -> Option<Frame> {
        let rest = std::mem::take(&mut self.buffer);
        self.bytes_framed += rest.len() as u64;
        to_frame(&rest)
    }

    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    pub fn byte_counts(&self) -> (u64, u64) {
        (self.bytes_in, self.bytes_framed)
    }
}

impl Default for FrameDemuxer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

fn to_frame(line: &[u8]) -> Option<Frame> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if line.iter().all(|b| b.is_ascii_whitespace()) {
        return None;
    }
    Some(Frame::new(line))
}
