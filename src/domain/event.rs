use serde::{Deserialize, Serialize};
use serde_json::Value;
use super::frame::Frame;

pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    ContentDelta(String),
    ReasoningDelta(String),
    Finish(String),
    Done,
    Control(String),
    Unrecognized(String),
}

#[derive(Debug, Deserialize)]
struct Chunk {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Option<Delta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    reasoning: Option<Value>,
}

/// Events come out in order: reasoning, content, finish.
pub fn decode(frame: &Frame) -> Vec<StreamEvent> {
    let line = frame.text();
    let payload = match line.strip_prefix("data:") {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest).trim_end(),
        None => {
            if is_control_line(&line) {
                return vec![StreamEvent::Control(line.into_owned())];
            }
            return vec![StreamEvent::Unrecognized(line.into_owned())];
        }
    };

    if payload.trim().is_empty() {
        return vec![StreamEvent::Control(line.into_owned())];
    }
    if payload.trim() == DONE_SENTINEL {
        return vec![StreamEvent::Done];
    }

    let chunk: Chunk = match serde_json::from_str(payload) {
        Ok(c) => c,
        Err(_) => return vec![StreamEvent::Unrecognized(payload.to_string())],
    };
    if chunk.error.is_some() {
        return vec![StreamEvent::Unrecognized(payload.to_string())];
    }

    let mut events = Vec::with_capacity(2);
    let Some(choice) = chunk.choices.into_iter().next() else {
        events.push(StreamEvent::ContentDelta(String::new()));
        return events;
    };
    let delta = choice.delta.unwrap_or_default();

    let reasoning = delta.reasoning_content.or_else(|| match delta.reasoning {
        Some(Value::String(s)) => Some(s),
        _ => None,
    });
    let has_reasoning = reasoning.as_deref().is_some_and(|r| !r.is_empty());
    if let Some(r) = reasoning.filter(|r| !r.is_empty()) {
        events.push(StreamEvent::ReasoningDelta(r));
    }
    match delta.content {
        Some(c) if !c.is_empty() => events.push(StreamEvent::ContentDelta(c)),
        _ if !has_reasoning => events.push(StreamEvent::ContentDelta(String::new())),
        _ => {}
    }
    if let Some(reason) = choice.finish_reason {
        events.push(StreamEvent::Finish(reason));
    }
    events
}

fn is_control_line(line: &str) -> bool {
    line.starts_with(':')
        || line.starts_with("event:")
        || line.starts_with("id:")
        || line.starts_with("retry:")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccumulatedMessage {
    pub content: String,
    pub reasoning: String,
}

impl AccumulatedMessage {
    pub fn apply(&mut self, event: &StreamEvent) -> bool {
        match event {
            StreamEvent::ContentDelta(text) => {
                self.content.push_str(text);
                !text.is_empty()
            }
            StreamEvent::ReasoningDelta(text) => {
                self.reasoning.push_str(text);
                !text.is_empty()
            }
            _ => false,
        }
    }
}
