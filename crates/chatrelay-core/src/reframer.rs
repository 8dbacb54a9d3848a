//! Re-chunking of the upstream token stream into NDJSON frames.
//!
//! The text-generation server streams one JSON object per line, but the HTTP
//! body reaches us in network-sized fragments that do not respect those
//! lines:
//! ```text
//! fragment 1: {"response":"Hel
//! fragment 2: lo","done":false}\n{"resp
//! fragment 3: onse":" world","done":true}
//! ```
//! [`Reframer`] restores the object boundaries. It is a synchronous state
//! machine driven one fragment at a time; [`reframe`] wraps it around an
//! async fragment stream.

use futures::{Stream, StreamExt};
use serde_json::{Map, Value};
use strum::{Display, EnumString};
use tracing::{debug, warn};

use crate::error::UpstreamError;
use crate::frame::Frame;

/// How upstream fragments map onto frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ReframeMode {
    /// Fragments are already whole JSON lines; each line is one frame.
    Passthrough,
    /// Fragments are arbitrary slices of the body and must be buffered.
    #[default]
    Repair,
}

#[derive(Debug, Default)]
enum State {
    /// Nothing buffered; the next fragment may be a frame on its own.
    #[default]
    Empty,
    /// Raw text received since the last emitted frame: an incomplete object,
    /// or malformed bytes waiting for a line break or `{` to resync on.
    /// Never holds a whitespace-only string.
    Accumulating(String),
}

/// Incremental fragment → frame converter.
#[derive(Debug, Default)]
pub struct Reframer {
    mode: ReframeMode,
    state: State,
}

impl Reframer {
    pub fn new(mode: ReframeMode) -> Self {
        Self {
            mode,
            state: State::Empty,
        }
    }

    pub fn mode(&self) -> ReframeMode {
        self.mode
    }

    /// `true` while part of an object is waiting for more input.
    pub fn is_accumulating(&self) -> bool {
        matches!(self.state, State::Accumulating(_))
    }

    /// Feed one fragment; returns the frames it completed, in order.
    pub fn push(&mut self, fragment: &str) -> Vec<Frame> {
        match self.mode {
            ReframeMode::Passthrough => passthrough_lines(fragment),
            ReframeMode::Repair => self.push_repair(fragment),
        }
    }

    fn push_repair(&mut self, fragment: &str) -> Vec<Frame> {
        let mut buffer = match std::mem::take(&mut self.state) {
            State::Empty => {
                // Aligned chunking: the fragment is a frame by itself.
                if let Some(frame) = Frame::parse(fragment.trim()) {
                    return vec![frame];
                }
                String::with_capacity(fragment.len())
            }
            // A fragment that parses alone here could still be a nested value
            // of the buffered object, so it always joins the buffer. Malformed
            // buffered bytes are skipped by `drain_objects`, so an aligned
            // fragment behind them is still emitted on arrival.
            State::Accumulating(buffer) => buffer,
        };

        // Untrimmed: whitespace may sit inside a still-open string value.
        buffer.push_str(fragment);

        let (frames, consumed) = drain_objects(&buffer);
        self.state = if buffer[consumed..].trim().is_empty() {
            State::Empty
        } else if consumed == 0 {
            State::Accumulating(buffer)
        } else {
            State::Accumulating(buffer[consumed..].to_owned())
        };
        frames
    }

    /// Signal end of input. Returns a frame for any buffered residue: the
    /// parsed object if it is complete, otherwise a recovery frame carrying the
    /// raw text with `done: true`.
    pub fn finish(self) -> Option<Frame> {
        match self.state {
            State::Empty => None,
            State::Accumulating(residue) => {
                if let Some(frame) = Frame::parse(residue.trim()) {
                    return Some(frame);
                }
                warn!(
                    residue_len = residue.len(),
                    "upstream stream ended inside an object; emitting recovery frame"
                );
                Some(Frame::recovery(residue))
            }
        }
    }
}

/// Pull every complete JSON object off the front of `buffer`.
///
/// Returns the frames and the byte offset just past the last one. An
/// incomplete object stops parsing; that is the normal state of a buffer
/// mid-object and is not reported. Anything else that fails to parse (stray
/// text, a bare scalar, an extra `}`) is skipped up to the next line break or
/// `{`. When no such boundary has arrived yet, the bytes stay buffered.
fn drain_objects(buffer: &str) -> (Vec<Frame>, usize) {
    let mut frames = Vec::new();
    let mut consumed = 0;
    'resync: loop {
        let base = consumed;
        let mut objects =
            serde_json::Deserializer::from_str(&buffer[base..]).into_iter::<Map<String, Value>>();
        loop {
            match objects.next() {
                Some(Ok(object)) => {
                    consumed = base + objects.byte_offset();
                    frames.push(Frame::from(object));
                }
                Some(Err(e)) if !e.is_eof() => match next_boundary(buffer, consumed) {
                    Some(next) => {
                        debug!(
                            skipped = next - consumed,
                            error = %e,
                            "repair: skipping malformed upstream bytes"
                        );
                        consumed = next;
                        continue 'resync;
                    }
                    None => break 'resync,
                },
                _ => break 'resync,
            }
        }
    }
    (frames, consumed)
}

/// Offset at which parsing can restart after malformed text beginning at or
/// after `from`: just past the next line break, or at the next `{`. The first
/// non-blank byte is never a candidate, so every resync makes progress.
fn next_boundary(buffer: &str, from: usize) -> Option<usize> {
    let tail = &buffer[from..];
    let start = from + (tail.len() - tail.trim_start().len());
    buffer[start..]
        .char_indices()
        .skip(1)
        .find(|&(_, c)| c == '\n' || c == '{')
        .map(|(i, c)| start + i + usize::from(c == '\n'))
}

fn passthrough_lines(fragment: &str) -> Vec<Frame> {
    fragment
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let frame = Frame::parse(line);
            if frame.is_none() {
                debug!(line_len = line.len(), "passthrough: dropping non-JSON line");
            }
            frame
        })
        .collect()
}

/// Drive `fragments` through a [`Reframer`].
///
/// Frames are yielded as soon as they complete. An upstream error yields a
/// single `{"error": ...}` frame and ends the stream; buffered residue is
/// discarded in that case. On a clean end, residue is flushed through
/// [`Reframer::finish`].
pub fn reframe<S>(fragments: S, mode: ReframeMode) -> impl Stream<Item = Frame> + Send + 'static
where
    S: Stream<Item = Result<String, UpstreamError>> + Send + 'static,
{
    async_stream::stream! {
        let mut reframer = Reframer::new(mode);
        let mut fragments = std::pin::pin!(fragments);

        while let Some(fragment) = fragments.next().await {
            match fragment {
                Ok(text) => {
                    for frame in reframer.push(&text) {
                        yield frame;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "upstream stream failed");
                    yield Frame::error(e.to_string());
                    return;
                }
            }
        }

        if let Some(frame) = reframer.finish() {
            yield frame;
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
