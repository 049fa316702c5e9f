//! Newline-delimited JSON decoding for the generate stream.
//!
//! Network chunks do not respect record boundaries, so the decoder keeps the
//! trailing partial line of each chunk and prepends it to the next one.

use serde::Deserialize;

/// One record of the generate stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GenerateChunk {
    /// Incremental text token
    #[serde(default)]
    pub response: Option<String>,
    /// Set on the final record
    #[serde(default)]
    pub done: bool,
}

/// Outcome of decoding one non-blank line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLine {
    Parsed(GenerateChunk),
    /// The line was not a JSON record; carries the raw text
    Unparsed(String),
}

impl StreamLine {
    fn decode(line: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(line);
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(match serde_json::from_str::<GenerateChunk>(text) {
            Ok(chunk) => StreamLine::Parsed(chunk),
            Err(_) => StreamLine::Unparsed(text.to_string()),
        })
    }
}

/// Incremental line splitter over raw body bytes.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    pending: Vec<u8>,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns every line completed by it, in order.
    ///
    /// Splitting happens on raw bytes, so a multi-byte character cut by the
    /// chunk boundary is reassembled before decoding.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamLine> {
        self.pending.extend_from_slice(chunk);

        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };
        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete
            .split(|b| *b == b'\n')
            .filter_map(|line| StreamLine::decode(line.strip_suffix(b"\r").unwrap_or(line)))
            .collect()
    }

    /// Flush whatever is left once the body has ended.
    pub fn finish(&mut self) -> Option<StreamLine> {
        let rest = std::mem::take(&mut self.pending);
        StreamLine::decode(&rest)
    }
}
