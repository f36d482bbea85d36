//! Incremental record framing for chunked response streams.
//!
//! Endpoints stream delimiter-separated JSON records, but the transport
//! delivers arbitrarily sized chunks: one network read may carry several
//! records, half a record, or a delimiter split across reads. The decoder
//! accumulates bytes and hands back complete records one at a time; the
//! record sequence is independent of how the bytes were chunked.
//!
//! One decoder instance is bound to exactly one byte stream. It is created
//! when the stream opens and discarded after [`DecoderState::Closed`];
//! there is no pooling or cross-request reuse.

use crate::error::InvokeError;

/// Decoder lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// The buffer holds no complete record yet.
    Accumulating,
    /// The buffer holds at least one complete record.
    Ready,
    /// Upstream signaled end-of-stream; the decoder is spent.
    Closed,
}

/// Byte-stream-to-record state machine.
#[derive(Debug)]
pub struct FrameDecoder {
    /// Arena for bytes received so far, compacted when drained.
    buf: Vec<u8>,
    /// Start of the first unconsumed byte in `buf`.
    read_pos: usize,
    delimiter: Vec<u8>,
    state: DecoderState,
}

impl FrameDecoder {
    /// A decoder cutting records at `delimiter`, which must be non-empty.
    pub fn new(delimiter: impl Into<Vec<u8>>) -> Self {
        let delimiter = delimiter.into();
        assert!(!delimiter.is_empty(), "record delimiter must be non-empty");
        Self {
            buf: Vec::new(),
            read_pos: 0,
            delimiter,
            state: DecoderState::Accumulating,
        }
    }

    /// The newline-delimited dialect every current backend speaks.
    pub fn newline() -> Self {
        Self::new(&b"\n"[..])
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Append one transport chunk. No-op once closed.
    pub fn push(&mut self, chunk: &[u8]) {
        if self.state == DecoderState::Closed {
            debug_assert!(false, "push after end-of-stream");
            return;
        }
        self.buf.extend_from_slice(chunk);
        self.state = if self.find_delimiter().is_some() {
            DecoderState::Ready
        } else {
            DecoderState::Accumulating
        };
    }

    /// Cut the next complete record off the buffer, without its delimiter.
    /// Returns `None` while the buffer holds no complete record.
    pub fn next_record(&mut self) -> Option<Vec<u8>> {
        if self.state == DecoderState::Closed {
            return None;
        }
        let at = match self.find_delimiter() {
            Some(at) => at,
            None => {
                self.state = DecoderState::Accumulating;
                return None;
            }
        };
        let record = self.buf[self.read_pos..at].to_vec();
        self.read_pos = at + self.delimiter.len();
        if self.find_delimiter().is_none() {
            // No further record pending: compact the arena so the buffer
            // never grows past one partial record between reads.
            self.buf.drain(..self.read_pos);
            self.read_pos = 0;
            self.state = DecoderState::Accumulating;
        }
        Some(record)
    }

    /// Signal end-of-stream. A non-empty residual without a trailing
    /// delimiter is yielded as the final record, exactly once. Complete
    /// records still buffered must be drained with [`Self::next_record`]
    /// first.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.state == DecoderState::Closed {
            return None;
        }
        let residual = self.buf[self.read_pos..].to_vec();
        self.buf.clear();
        self.read_pos = 0;
        self.state = DecoderState::Closed;
        if residual.is_empty() {
            None
        } else {
            Some(residual)
        }
    }

    fn find_delimiter(&self) -> Option<usize> {
        find_subsequence(&self.buf[self.read_pos..], &self.delimiter)
            .map(|offset| self.read_pos + offset)
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Structured decode of one record's bytes. Failure is localized to the
/// record: the caller reports it and keeps consuming the stream.
pub fn parse_record(raw: &[u8]) -> Result<serde_json::Value, InvokeError> {
    serde_json::from_slice(raw).map_err(|e| InvokeError::Decode {
        reason: e.to_string(),
        record: String::from_utf8_lossy(raw).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(decoder: &mut FrameDecoder) -> Vec<Vec<u8>> {
        let mut records = Vec::new();
        while let Some(r) = decoder.next_record() {
            records.push(r);
        }
        records
    }

    fn decode_with_chunks(input: &[u8], chunk_len: usize) -> Vec<Vec<u8>> {
        let mut decoder = FrameDecoder::newline();
        let mut records = Vec::new();
        for chunk in input.chunks(chunk_len.max(1)) {
            decoder.push(chunk);
            records.extend(drain(&mut decoder));
        }
        records.extend(decoder.finish());
        assert_eq!(decoder.state(), DecoderState::Closed);
        records
    }

    #[test]
    fn one_chunk_and_per_byte_chunking_agree() {
        let input = b"{\"a\":1}\n{\"b\":2}\n{\"c\":3}\n";
        let whole = decode_with_chunks(input, input.len());
        assert_eq!(whole.len(), 3);
        for chunk_len in 1..input.len() {
            assert_eq!(decode_with_chunks(input, chunk_len), whole);
        }
    }

    #[test]
    fn record_split_across_chunks_is_reassembled() {
        let mut decoder = FrameDecoder::newline();
        decoder.push(b"{\"outputs\": ");
        assert_eq!(decoder.state(), DecoderState::Accumulating);
        assert!(decoder.next_record().is_none());
        decoder.push(b"[\" problem\"]}\n");
        assert_eq!(decoder.state(), DecoderState::Ready);
        assert_eq!(
            decoder.next_record().unwrap(),
            b"{\"outputs\": [\" problem\"]}".to_vec()
        );
    }

    #[test]
    fn residual_without_trailing_delimiter_is_flushed_once() {
        let mut decoder = FrameDecoder::newline();
        decoder.push(b"{\"a\":1}\n{\"b\":2}");
        assert_eq!(decoder.next_record().unwrap(), b"{\"a\":1}".to_vec());
        assert!(decoder.next_record().is_none());
        assert_eq!(decoder.finish().unwrap(), b"{\"b\":2}".to_vec());
        assert!(decoder.finish().is_none());
        assert_eq!(decoder.state(), DecoderState::Closed);
    }

    #[test]
    fn empty_stream_closes_without_records() {
        let mut decoder = FrameDecoder::newline();
        assert!(decoder.finish().is_none());
        assert_eq!(decoder.state(), DecoderState::Closed);
    }

    #[test]
    fn nul_delimited_stream_with_malformed_tail() {
        // b'{"a":1}\0{"a":2}\0{bad' -> two values, then the raw residual
        // which fails structured decode.
        let mut decoder = FrameDecoder::new(&b"\0"[..]);
        decoder.push(b"{\"a\":1}\0{\"a\":2}\0{bad");
        let first = decoder.next_record().unwrap();
        let second = decoder.next_record().unwrap();
        assert_eq!(parse_record(&first).unwrap()["a"], 1);
        assert_eq!(parse_record(&second).unwrap()["a"], 2);
        assert!(decoder.next_record().is_none());
        let tail = decoder.finish().unwrap();
        assert_eq!(tail, b"{bad".to_vec());
        assert!(matches!(
            parse_record(&tail),
            Err(InvokeError::Decode { .. })
        ));
    }

    #[test]
    fn multi_byte_delimiter_split_across_chunks() {
        let mut decoder = FrameDecoder::new(&b"\r\n"[..]);
        decoder.push(b"first\r");
        assert!(decoder.next_record().is_none());
        decoder.push(b"\nsecond\r\n");
        assert_eq!(decoder.next_record().unwrap(), b"first".to_vec());
        assert_eq!(decoder.next_record().unwrap(), b"second".to_vec());
        assert!(decoder.next_record().is_none());
    }

    #[test]
    fn state_tracks_pending_records() {
        let mut decoder = FrameDecoder::newline();
        decoder.push(b"a\nb\n");
        assert_eq!(decoder.state(), DecoderState::Ready);
        assert_eq!(decoder.next_record().unwrap(), b"a".to_vec());
        assert_eq!(decoder.state(), DecoderState::Ready);
        assert_eq!(decoder.next_record().unwrap(), b"b".to_vec());
        assert_eq!(decoder.state(), DecoderState::Accumulating);
    }
}
