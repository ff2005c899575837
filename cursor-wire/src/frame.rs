//! Length-prefixed framing over the HTTP streaming body: a 5-byte header
//! (`flags:u8`, `length:u32` big-endian) followed by `length` payload bytes.
//! This is the gRPC-Web wire shape Cursor's bidi transport piggybacks on,
//! including trailer frames that carry ASCII status headers instead of a
//! protobuf-encoded message.

use crate::error::Result;
use crate::error::WireError;

const HEADER_LEN: usize = 5;
const TRAILER_FLAG: u8 = 0x80;

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub is_trailer: bool,
    pub payload: Vec<u8>,
}

/// Encodes one frame: `[flags, length_be_u32] ++ payload`. `flags` is always
/// `0x00` for data frames produced by this client; trailer frames only ever
/// arrive from the server, so there is no encoder for them.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.push(0x00);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Incremental frame reader. Bytes are pushed in as they arrive off the HTTP
/// body; `next_frame` pops one complete frame at a time and leaves any
/// leftover bytes buffered for the next call. The reader is indifferent to
/// how the underlying stream chooses to chunk bytes across reads: feeding it
/// one byte at a time or the whole buffer at once yields the same sequence
/// of frames (see the `fuzz_arbitrary_splits` test).
#[derive(Debug, Default)]
pub struct FrameReader {
    buf: Vec<u8>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pops the next complete frame, if the buffer holds one yet.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }
        let flags = self.buf[0];
        let length = u32::from_be_bytes([self.buf[1], self.buf[2], self.buf[3], self.buf[4]]) as usize;
        if self.buf.len() < HEADER_LEN + length {
            return Ok(None);
        }
        let payload = self.buf[HEADER_LEN..HEADER_LEN + length].to_vec();
        self.buf.drain(0..HEADER_LEN + length);
        Ok(Some(Frame {
            is_trailer: flags & TRAILER_FLAG != 0,
            payload,
        }))
    }
}

/// Parses a trailer frame's ASCII payload (`\r\n`-separated `key: value`
/// headers) and raises a protocol error if `grpc-status` is present and
/// non-zero. The `grpc-message` header is percent-decoded per the gRPC-Web
/// convention Cursor's server uses to carry human-readable error text.
pub fn check_trailer(payload: &[u8]) -> Result<()> {
    let text = std::str::from_utf8(payload).map_err(|_| WireError::InvalidUtf8)?;
    let mut status: Option<i64> = None;
    let mut message = String::new();

    for line in text.split("\r\n") {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        match key {
            "grpc-status" => {
                status = Some(value.parse().map_err(|_| {
                    WireError::MalformedTrailer(format!("non-numeric grpc-status: {value}"))
                })?);
            }
            "grpc-message" => {
                message = urlencoding::decode(value)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| value.to_string());
            }
            _ => {}
        }
    }

    match status {
        Some(0) | None => Ok(()),
        Some(status) => Err(WireError::TrailerStatus { status, message }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn frame_round_trip() {
        let payload = b"hello world";
        let encoded = encode_frame(payload);
        let mut reader = FrameReader::new();
        reader.push(&encoded);
        let frame = reader.next_frame().unwrap().unwrap();
        assert!(!frame.is_trailer);
        assert_eq!(frame.payload, payload);
        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn reader_buffers_partial_frames() {
        let encoded = encode_frame(b"abc");
        let mut reader = FrameReader::new();
        reader.push(&encoded[..3]);
        assert!(reader.next_frame().unwrap().is_none());
        reader.push(&encoded[3..]);
        let frame = reader.next_frame().unwrap().unwrap();
        assert_eq!(frame.payload, b"abc");
    }

    #[test]
    fn fuzz_arbitrary_splits() {
        let frames: Vec<Vec<u8>> = vec![
            encode_frame(b""),
            encode_frame(b"one"),
            encode_frame(b"a longer payload with more bytes in it"),
        ];
        let mut stream = Vec::new();
        for f in &frames {
            stream.extend_from_slice(f);
        }

        for split in 0..=stream.len() {
            let (first, second) = stream.split_at(split);
            let mut reader = FrameReader::new();
            reader.push(first);
            reader.push(second);
            let mut got = Vec::new();
            while let Some(frame) = reader.next_frame().unwrap() {
                got.push(frame.payload);
            }
            let want: Vec<Vec<u8>> = frames.iter().map(|f| f[5..].to_vec()).collect();
            assert_eq!(got, want, "split at {split} produced a different frame sequence");
        }
    }

    #[test]
    fn s6_trailer_error_is_url_decoded() {
        let payload = b"grpc-status: 13\r\ngrpc-message: foo%20bar\r\n";
        let err = check_trailer(payload).unwrap_err();
        match err {
            WireError::TrailerStatus { status, message } => {
                assert_eq!(status, 13);
                assert_eq!(message, "foo bar");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn trailer_with_zero_status_is_ok() {
        let payload = b"grpc-status: 0\r\n";
        assert!(check_trailer(payload).is_ok());
    }

    #[test]
    fn trailer_without_status_is_ok() {
        let payload = b"some-other-header: value\r\n";
        assert!(check_trailer(payload).is_ok());
    }
}
