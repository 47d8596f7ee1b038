//! SSE wire codec.
//!
//! Records are written as `event:`, `data:`, `id:`, `retry:` lines (unset
//! fields omitted) followed by a blank-line terminator. Reading is line based:
//! an empty line closes the pending record, which is emitted only when it
//! carries data. Successive `data:` lines are concatenated as-is, without a
//! separating newline.

use crate::Event;
use futures_util::{Stream, StreamExt};
use std::error::Error as StdError;
use std::fmt;

/// Longest line the decoder buffers before giving up on the stream.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

const RECORD_TERMINATOR: &str = "\n\n";

#[derive(Debug)]
pub enum DecodeError {
    /// The underlying byte stream failed.
    Read(Box<dyn StdError + Send + Sync>),
    LineTooLong { limit: usize },
}

impl DecodeError {
    fn read<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        DecodeError::Read(err.into())
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::Read(source) => write!(f, "error reading SSE stream: {source}"),
            DecodeError::LineTooLong { limit } => {
                write!(f, "error reading SSE stream: line exceeds {limit} bytes")
            }
        }
    }
}

impl StdError for DecodeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            DecodeError::Read(source) => Some(source.as_ref() as &(dyn StdError + 'static)),
            DecodeError::LineTooLong { .. } => None,
        }
    }
}

impl Event {
    /// Writes the wire form of this event into `writer`.
    ///
    /// `data` is written as a single `data:` line. Multi-line payloads are
    /// not framed: a `\n` inside `data` ends the line early on the wire.
    ///
    /// Fails only when the writer itself fails.
    pub fn write_to<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        if let Some(name) = self.event_type() {
            writeln!(writer, "event: {name}")?;
        }
        writeln!(writer, "data: {}", self.data)?;
        if let Some(id) = &self.id {
            writeln!(writer, "id: {id}")?;
        }
        if let Some(retry) = self.retry_ms {
            writeln!(writer, "retry: {retry}")?;
        }
        writer.write_str(RECORD_TERMINATOR)
    }

    /// Wire form of this event as an owned string.
    pub fn encode(&self) -> String {
        let mut encoded = String::with_capacity(self.data.len() + 32);
        // Writing into a String cannot fail.
        let _ = self.write_to(&mut encoded);
        encoded
    }
}

/// Incremental SSE decoder.
///
/// Bytes may arrive split at arbitrary points; incomplete lines are kept
/// until the next `feed`.
#[derive(Debug, Default)]
pub struct Decoder {
    buffer: Vec<u8>,
    pending: Event,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes `chunk` and returns every record it completed, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Event>, DecodeError> {
        self.buffer.extend_from_slice(chunk);

        let mut decoded = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.buffer[consumed..].iter().position(|b| *b == b'\n') {
            let end = consumed + offset;
            let line = self.buffer[consumed..end].to_vec();
            let line = line.strip_suffix(b"\r").unwrap_or(&line);
            if let Some(event) = self.process_line(line) {
                decoded.push(event);
            }
            consumed = end + 1;
        }
        self.buffer.drain(..consumed);

        if self.buffer.len() > MAX_LINE_LENGTH {
            return Err(DecodeError::LineTooLong {
                limit: MAX_LINE_LENGTH,
            });
        }

        Ok(decoded)
    }

    fn process_line(&mut self, line: &[u8]) -> Option<Event> {
        if line.is_empty() {
            let event = std::mem::take(&mut self.pending);
            return event.has_data().then_some(event);
        }

        let line = String::from_utf8_lossy(line);
        if let Some(id) = line.strip_prefix("id: ") {
            self.pending.id = Some(id.to_string());
        } else if let Some(name) = line.strip_prefix("event: ") {
            self.pending.name = (!name.is_empty()).then(|| name.to_string());
        } else if let Some(data) = line.strip_prefix("data: ") {
            self.pending.data.push_str(data);
        } else if let Some(retry) = line.strip_prefix("retry: ") {
            // Non-numeric retry values are ignored, as browsers do.
            if let Ok(retry_ms) = retry.trim().parse() {
                self.pending.retry_ms = Some(retry_ms);
            }
        }

        None
    }
}

/// Decodes a byte stream (typically an HTTP response body) into events.
///
/// The returned stream ends when the input ends; a record that was never
/// terminated by a blank line is discarded. Read failures are yielded once as
/// `DecodeError::Read` and end the stream.
pub fn decode<S, B, E>(bytes: S) -> impl Stream<Item = Result<Event, DecodeError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    async_stream::try_stream! {
        let mut decoder = Decoder::new();
        let mut bytes = Box::pin(bytes);

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(DecodeError::read)?;
            for event in decoder.feed(chunk.as_ref())? {
                yield event;
            }
        }
    }
}
