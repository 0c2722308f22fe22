//! Incremental decoder for `text/event-stream` bodies.
//!
//! Only the `data` field matters to the providers we talk to, so event names,
//! ids and retry hints are dropped. Bytes may arrive split at arbitrary
//! positions, including inside a multi-byte UTF-8 sequence.

use super::provider::{ProviderError, ProviderResult};

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one network chunk and returns the data payloads it completed.
    pub fn push(&mut self, chunk: &[u8]) -> ProviderResult<Vec<String>> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let mut line = self.buffer.drain(..=newline).collect::<Vec<_>>();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            let line = String::from_utf8(line).map_err(|error| {
                ProviderError::InvalidEventStream {
                    stage: "sse-decode-line",
                    details: error.to_string(),
                }
            })?;

            if let Some(event) = self.accept_line(&line) {
                events.push(event);
            }
        }

        Ok(events)
    }

    /// Flushes whatever is left once the body has ended.
    pub fn finish(&mut self) -> ProviderResult<Option<String>> {
        if !self.buffer.is_empty() {
            let tail = std::mem::take(&mut self.buffer);
            let line = String::from_utf8(tail).map_err(|error| {
                ProviderError::InvalidEventStream {
                    stage: "sse-decode-tail",
                    details: error.to_string(),
                }
            })?;
            let line = line.strip_suffix('\r').unwrap_or(&line).to_string();
            if let Some(event) = self.accept_line(&line) {
                return Ok(Some(event));
            }
        }

        Ok(self.dispatch())
    }

    fn accept_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        if field == "data" {
            self.data_lines.push(value.to_string());
        }

        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data_lines.is_empty() {
            return None;
        }

        let data = self.data_lines.join("\n");
        self.data_lines.clear();
        Some(data)
    }
}
