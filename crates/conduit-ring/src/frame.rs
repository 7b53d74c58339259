//! Length-prefixed frame codec.
//!
//! Wire layout, shared by the TCP and IPC-ring wire formats: a 4-byte
//! little-endian unsigned length `L`, then `L` bytes of payload, no
//! trailer. `FrameParser` is the decode half — a state machine that
//! accumulates bytes across arbitrary chunk boundaries, including a header
//! or body split across multiple `feed()` calls, and hands back complete
//! frames via callback, aliasing its own scratch buffer rather than
//! copying.

use thiserror::Error;

/// Default upper bound on a single frame's payload — matches the default
/// pooled slice size, so a frame fits one [`crate::PooledSlice`] without a
/// second allocation.
pub const MAX_FRAME_DEFAULT: usize = 8192;

const HEADER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The length prefix exceeds `max_frame - 4`.
    #[error("frame length {len} exceeds maximum {max}")]
    Overflow { len: u32, max: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NeedHeader,
    NeedBody { len: u32 },
    Errored,
}

/// Incremental decoder for the length-prefixed frame format.
///
/// Call [`feed`](FrameParser::feed) with each chunk of bytes as it arrives
/// off the wire. Complete frames are reported through the `on_frame`
/// closure passed to `feed`; decode failures through `on_error`. Once
/// `on_error` fires the parser is terminally errored: every subsequent
/// `feed` call returns `false` without invoking either callback.
pub struct FrameParser {
    max_frame: usize,
    state: State,
    /// Scratch accumulation buffer. Holds whatever prefix of the current
    /// header or body has arrived so far; a complete header/body is sliced
    /// out of this and the remainder is shifted down.
    scratch: Vec<u8>,
}

impl FrameParser {
    /// Creates a parser that rejects any frame whose payload would exceed
    /// `max_frame` bytes.
    pub fn new(max_frame: usize) -> Self {
        Self {
            max_frame,
            state: State::NeedHeader,
            scratch: Vec::with_capacity(HEADER_LEN.max(64)),
        }
    }

    /// Maximum payload length this parser accepts.
    pub fn max_frame(&self) -> usize {
        self.max_frame
    }

    /// Returns `true` if the parser has hit a terminal decode error.
    pub fn is_errored(&self) -> bool {
        matches!(self.state, State::Errored)
    }

    /// Feeds `bytes` into the decoder, invoking `on_frame(payload)` for
    /// every complete frame produced and `on_error(kind)` on a terminal
    /// decode failure.
    ///
    /// `payload` passed to `on_frame` aliases the parser's internal scratch
    /// buffer and is valid only for the duration of that call — it is a
    /// plain `&[u8]` borrow, so a caller that needs to keep the bytes must
    /// copy them before returning from the callback.
    ///
    /// Returns `false` if the parser was already errored, or becomes
    /// errored while processing `bytes`; `true` otherwise (including the
    /// empty-input case).
    pub fn feed<F, E>(&mut self, bytes: &[u8], mut on_frame: F, mut on_error: E) -> bool
    where
        F: FnMut(&[u8]),
        E: FnMut(FrameError),
    {
        if self.state == State::Errored {
            return false;
        }

        self.scratch.extend_from_slice(bytes);
        let mut cursor = 0usize;

        loop {
            match self.state {
                State::Errored => return false,
                State::NeedHeader => {
                    if self.scratch.len() - cursor < HEADER_LEN {
                        break;
                    }
                    let len = u32::from_le_bytes([
                        self.scratch[cursor],
                        self.scratch[cursor + 1],
                        self.scratch[cursor + 2],
                        self.scratch[cursor + 3],
                    ]);
                    cursor += HEADER_LEN;

                    let max_payload = self.max_frame.saturating_sub(HEADER_LEN) as u32;
                    if len > max_payload {
                        self.state = State::Errored;
                        self.scratch.clear();
                        on_error(FrameError::Overflow {
                            len,
                            max: self.max_frame,
                        });
                        return false;
                    }

                    if len == 0 {
                        on_frame(&[]);
                        // stay in NeedHeader
                    } else {
                        self.state = State::NeedBody { len };
                    }
                }
                State::NeedBody { len } => {
                    let len = len as usize;
                    if self.scratch.len() - cursor < len {
                        break;
                    }
                    on_frame(&self.scratch[cursor..cursor + len]);
                    cursor += len;
                    self.state = State::NeedHeader;
                }
            }
        }

        self.scratch.drain(0..cursor);
        true
    }

    /// Encodes `payload` as one frame (length prefix + body) into `out`.
    ///
    /// Returns `Err` without touching `out` if `payload` would exceed this
    /// parser's configured maximum.
    pub fn encode(max_frame: usize, payload: &[u8], out: &mut Vec<u8>) -> Result<(), FrameError> {
        let max_payload = max_frame.saturating_sub(HEADER_LEN);
        if payload.len() > max_payload {
            return Err(FrameError::Overflow {
                len: payload.len() as u32,
                max: max_frame,
            });
        }
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_of(payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        FrameParser::encode(MAX_FRAME_DEFAULT, payload, &mut out).unwrap();
        out
    }

    #[test]
    fn single_frame_one_chunk() {
        let mut parser = FrameParser::new(MAX_FRAME_DEFAULT);
        let wire = frame_of(b"hello");
        let mut seen = Vec::new();
        let ok = parser.feed(&wire, |p| seen.push(p.to_vec()), |_| panic!("no error expected"));
        assert!(ok);
        assert_eq!(seen, vec![b"hello".to_vec()]);
    }

    #[test]
    fn multiple_frames_in_one_chunk() {
        let mut parser = FrameParser::new(MAX_FRAME_DEFAULT);
        let mut wire = frame_of(b"one");
        wire.extend(frame_of(b"two"));
        wire.extend(frame_of(b"three"));
        let mut seen = Vec::new();
        parser.feed(&wire, |p| seen.push(p.to_vec()), |_| panic!());
        assert_eq!(
            seen,
            vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]
        );
    }

    #[test]
    fn frame_spanning_multiple_chunks() {
        let mut parser = FrameParser::new(MAX_FRAME_DEFAULT);
        let wire = frame_of(b"split across chunks");
        let mut seen = Vec::new();
        let (a, b) = wire.split_at(3);
        parser.feed(a, |p| seen.push(p.to_vec()), |_| panic!());
        assert!(seen.is_empty());
        parser.feed(b, |p| seen.push(p.to_vec()), |_| panic!());
        assert_eq!(seen, vec![b"split across chunks".to_vec()]);
    }

    #[test]
    fn partial_header_then_completion() {
        let mut parser = FrameParser::new(MAX_FRAME_DEFAULT);
        let wire = frame_of(b"ab");
        let mut seen = Vec::new();
        parser.feed(&wire[..2], |p| seen.push(p.to_vec()), |_| panic!());
        assert!(seen.is_empty());
        parser.feed(&wire[2..], |p| seen.push(p.to_vec()), |_| panic!());
        assert_eq!(seen, vec![b"ab".to_vec()]);
    }

    #[test]
    fn empty_frame_is_delivered_and_parser_stays_in_need_header() {
        let mut parser = FrameParser::new(MAX_FRAME_DEFAULT);
        let mut wire = frame_of(b"");
        wire.extend(frame_of(b"next"));
        let mut seen = Vec::new();
        parser.feed(&wire, |p| seen.push(p.to_vec()), |_| panic!());
        assert_eq!(seen, vec![Vec::new(), b"next".to_vec()]);
    }

    #[test]
    fn overflowing_length_errors_exactly_once_then_latches() {
        let max = 16;
        let mut parser = FrameParser::new(max);
        let mut wire = Vec::new();
        wire.extend_from_slice(&((max as u32)).to_le_bytes()); // max - 4 + 1 would overflow; use max directly
        let mut errors = 0;
        let ok = parser.feed(&wire, |_| panic!("no frame expected"), |_| errors += 1);
        assert!(!ok);
        assert_eq!(errors, 1);
        assert!(parser.is_errored());

        // Further feeds return false without invoking callbacks again.
        let ok2 = parser.feed(b"anything", |_| panic!(), |_| panic!("no second error"));
        assert!(!ok2);
    }

    #[test]
    fn round_trip_many_payloads_any_chunking() {
        let payloads: Vec<Vec<u8>> = vec![
            b"a".to_vec(),
            vec![0x2A; 1000],
            Vec::new(),
            b"final".to_vec(),
        ];
        let mut wire = Vec::new();
        for p in &payloads {
            wire.extend(frame_of(p));
        }

        // Chunk the wire bytes into small irregular pieces.
        let mut parser = FrameParser::new(MAX_FRAME_DEFAULT);
        let mut seen = Vec::new();
        for chunk in wire.chunks(7) {
            let ok = parser.feed(chunk, |p| seen.push(p.to_vec()), |_| panic!());
            assert!(ok);
        }
        assert_eq!(seen, payloads);
    }
}
