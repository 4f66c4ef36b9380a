use crate::domain::ProbeError;

const MAX_CONTROL_LINE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    Chunked,
    Length(u64),
    UntilClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    Size,
    Data,
    DataEnd,
    Trailer,
    Done,
}

#[derive(Debug)]
pub struct BodyDecoder {
    framing: BodyFraming,
    state: ChunkState,
    remaining: u64,
    line: Vec<u8>,
}

impl BodyDecoder {
    pub fn new(framing: BodyFraming) -> Self {
        let (state, remaining) = match framing {
            BodyFraming::Length(0) => (ChunkState::Done, 0),
            BodyFraming::Length(n) => (ChunkState::Data, n),
            BodyFraming::Chunked => (ChunkState::Size, 0),
            BodyFraming::UntilClose => (ChunkState::Data, u64::MAX),
        };
        Self { framing, state, remaining, line: Vec::new() }
    }

    pub fn is_done(&self) -> bool {
        self.state == ChunkState::Done
    }

    pub fn decode(&mut self, mut input: &[u8], out: &mut Vec<u8>) -> Result<(), ProbeError> {
        while !input.is_empty() {
            match self.state {
                ChunkState::Done => return Ok(()),
                ChunkState::Data => {
                    let n = (self.remaining.min(input.len() as u64)) as usize;
                    out.extend_from_slice(&input[..n]);
                    input = &input[n..];
                    if self.framing != BodyFraming::UntilClose {
                        self.remaining -= n as u64;
                    }
                    if self.remaining == 0 {
                        self.state = match self.framing {
                            BodyFraming::Chunked => ChunkState::DataEnd,
                            _ => ChunkState::Done,
                        };
                    }
                }
                ChunkState::Size | ChunkState::DataEnd | ChunkState::Trailer => {
                    let Some(line) = self.take_line(&mut input)? else { return Ok(()) };
                    self.on_line(&line)?;
                }
            }
        }
        Ok(())
    }

    fn take_line(&mut self, input: &mut &[u8]) -> Result<Option<Vec<u8>>, ProbeError> {
        match input.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                self.line.extend_from_slice(&input[..pos]);
                *input = &input[pos + 1..];
                let mut line = std::mem::take(&mut self.line);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                Ok(Some(line))
            }
            None => {
                self.line.extend_from_slice(input);
                *input = &[];
                if self.line.len() > MAX_CONTROL_LINE {
                    return Err(ProbeError::protocol("chunked encoding control line too long"));
                }
                Ok(None)
            }
        }
    }

    fn on_line(&mut self, line: &[u8]) -> Result<(), ProbeError> {
        match self.state {
            ChunkState::Size => {
                let text = std::str::from_utf8(line).map_err(|_| ProbeError::protocol("invalid chunk size encoding"))?;
                let size_str = text.split(';').next().unwrap_or("").trim();
                let size = u64::from_str_radix(size_str, 16)
                    .map_err(|_| ProbeError::protocol(format!("invalid chunk size: {:?}", size_str)))?;
                if size == 0 {
                    self.state = ChunkState::Trailer;
                } else {
                    self.remaining = size;
                    self.state = ChunkState::Data;
                }
            }
            ChunkState::DataEnd => self.state = ChunkState::Size,
            ChunkState::Trailer => {
                if line.is_empty() {
                    self.state = ChunkState::Done;
                }
            }
            ChunkState::Data | ChunkState::Done => {}
        }
        Ok(())
    }
}
