//! Frame extraction from the per-connection receive buffer
//!
//! Wiffi modules send one JSON object per datagram, usually terminated by
//! ETX (0x03) or EOT (0x04) but sometimes unterminated or split across reads.
//! The extractor accumulates bytes and tries a fixed cascade of parse
//! strategies after every read; the first strategy that yields a JSON object
//! wins and the buffer is cleared.

use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

/// Default upper bound for the receive buffer in bytes
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 100_000;

const ETX: char = '\u{3}';
const EOT: char = '\u{4}';
const START_ANCHOR: &str = "{\"modultyp\"";
const END_ANCHOR: &str = "}}";

/// A parse strategy: buffer contents in, JSON object out
type Strategy = fn(&str) -> Option<Map<String, Value>>;

/// Strategies in the order they are tried
const STRATEGIES: &[(&str, Strategy)] = &[
    ("etx", parse_etx_segments),
    ("eot", parse_eot_segments),
    ("whole", parse_whole),
    ("anchors", parse_between_anchors),
];

/// One extracted datagram
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Parsed JSON object
    pub payload: Map<String, Value>,
    /// Buffer contents the object was extracted from
    pub raw: String,
}

/// Accumulates received bytes and extracts at most one frame per read
#[derive(Debug)]
pub struct FrameExtractor {
    buffer: String,
    /// Trailing bytes of a UTF-8 sequence cut off by the last read
    pending: Vec<u8>,
    max_size: usize,
}

impl FrameExtractor {
    pub fn new(max_size: usize) -> Self {
        Self {
            buffer: String::new(),
            pending: Vec::new(),
            max_size,
        }
    }

    /// Append newly received bytes and try to extract a frame
    ///
    /// Returns `None` when more data is needed or when the buffer overflowed
    /// and was discarded.
    pub fn push(&mut self, bytes: &[u8]) -> Option<Frame> {
        let mut data = std::mem::take(&mut self.pending);
        data.extend_from_slice(bytes);
        let complete = data.len() - incomplete_tail(&data);
        self.pending = data.split_off(complete);

        self.buffer.push_str(&String::from_utf8_lossy(&data));
        self.buffer = replace_bare_nan(&self.buffer);

        if self.buffer.len() > self.max_size {
            warn!(
                "JSON larger than allowed size of {}, clearing buffer",
                self.max_size
            );
            debug!("Discarded datagram: {}", self.buffer);
            self.buffer.clear();
            self.pending.clear();
            return None;
        }

        let payload = extract(&self.buffer)?;
        Some(Frame {
            payload,
            raw: std::mem::take(&mut self.buffer),
        })
    }

    /// Number of buffered bytes
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.pending.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl Default for FrameExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFER_SIZE)
    }
}

/// Run the strategy cascade over a buffer
pub fn extract(buffer: &str) -> Option<Map<String, Value>> {
    STRATEGIES.iter().find_map(|(name, strategy)| {
        let found = strategy(buffer);
        if found.is_some() {
            trace!("Frame matched by {} strategy", name);
        }
        found
    })
}

/// Length of a truncated multi-byte UTF-8 sequence at the end of `data`
fn incomplete_tail(data: &[u8]) -> usize {
    for back in 1..=data.len().min(3) {
        let byte = data[data.len() - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let needed = match byte {
            0xF0..=0xF7 => 4,
            0xE0..=0xEF => 3,
            0xC0..=0xDF => 2,
            _ => 1,
        };
        return if needed > back { back } else { 0 };
    }
    0
}

/// Firmware sends `nan` unquoted for missing sensor readings
pub fn replace_bare_nan(buffer: &str) -> String {
    buffer
        .replace(":nan", ":\"nan\"")
        .replace(":'nan'", ":\"nan\"")
}

fn strip_whitespace(buffer: &str) -> String {
    buffer.chars().filter(|c| !c.is_whitespace()).collect()
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn parse_segments(buffer: &str, terminator: char) -> Option<Map<String, Value>> {
    strip_whitespace(buffer)
        .split(terminator)
        .find_map(|segment| parse_object(segment.trim()))
}

fn parse_etx_segments(buffer: &str) -> Option<Map<String, Value>> {
    parse_segments(buffer, ETX)
}

fn parse_eot_segments(buffer: &str) -> Option<Map<String, Value>> {
    parse_segments(buffer, EOT)
}

fn parse_whole(buffer: &str) -> Option<Map<String, Value>> {
    parse_object(&strip_whitespace(buffer))
}

/// Last resort: `{"modultyp"` up to the first `}}` after it in the raw buffer
fn parse_between_anchors(buffer: &str) -> Option<Map<String, Value>> {
    let start = buffer.find(START_ANCHOR)?;
    let end = start + buffer[start..].find(END_ANCHOR)? + END_ANCHOR.len();
    parse_object(&buffer[start..end])
}
