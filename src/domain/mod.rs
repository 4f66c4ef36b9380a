mod error;
mod event;
mod frame;
mod http;
mod report;
mod request;
mod target;
mod timing;
mod tls;

pub use error::{ErrorClass, ProbeError};
pub use event::{decode, AccumulatedMessage, StreamEvent, DONE_SENTINEL};
pub use frame::{Frame, FrameDemuxer, RawChunk, DEFAULT_MAX_FRAME_BYTES};
pub use http::HttpSummary;
pub use report::{ProbeFailure, ProbeReport, StreamEnd};
pub use request::{ApiKey, ChatMessage, ChatRequest, ProbeRequest, ReasoningOptions};
pub use target::{IpFamily, ResolvedTarget};
pub use timing::{as_ms, ChunkTiming, Phase, PhaseMark, PhaseTiming, PhaseTracker};
pub use tls::TlsSummary;

#[cfg(test)]
pub(crate) use report::fixtures;
