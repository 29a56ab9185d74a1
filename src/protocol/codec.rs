//! Length-prefixed frame codec.
//!
//! Every wire message is `[u32 big-endian length N][N bytes MessagePack]`.
//! Frames are self-delimiting; a single socket read may deliver a partial
//! frame, exactly one frame, or several concatenated frames. `FrameDecoder`
//! accumulates chunks and is drained in a loop after each read.

use bytes::{Buf, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::ProtocolError;

/// Hard bound on a single payload. A length outside `[1, MAX_FRAME_SIZE]` is
/// a framing violation and the connection must be closed.
pub const MAX_FRAME_SIZE: usize = 1_000_000;

/// Size of the length prefix.
pub const LENGTH_PREFIX: usize = 4;

/// Serialize a message and prepend the length prefix.
///
/// Uses named-field MessagePack so the field names act as the schema tags;
/// they are part of the protocol.
pub fn encode_frame<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    let payload = rmp_serde::to_vec_named(msg)?;
    if payload.is_empty() {
        return Err(ProtocolError::InvalidLength(0));
    }
    if payload.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }
    let mut buf = Vec::with_capacity(LENGTH_PREFIX + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Deserialize one frame payload.
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ProtocolError> {
    Ok(rmp_serde::from_slice(payload)?)
}

/// Incremental frame extractor.
///
/// Owns the receive accumulator for one connection. `extend` appends raw
/// socket bytes, `try_decode` pops at most one complete payload, leaving any
/// remainder (including the bytes of a following frame) untouched.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
    /// Parsed length of the frame currently being assembled. `None` until
    /// the four prefix bytes have arrived.
    expected: Option<usize>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(8 * 1024),
            expected: None,
        }
    }

    /// Append a chunk read from the socket.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Try to extract one complete payload.
    ///
    /// Returns `Ok(None)` when more bytes are needed, and
    /// `Err(ProtocolError::InvalidLength)` before consuming any payload byte
    /// when the prefix is out of bounds.
    pub fn try_decode(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        if self.expected.is_none() {
            if self.buf.len() < LENGTH_PREFIX {
                return Ok(None);
            }
            let len = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]])
                as usize;
            if len == 0 || len > MAX_FRAME_SIZE {
                return Err(ProtocolError::InvalidLength(len));
            }
            self.buf.advance(LENGTH_PREFIX);
            self.expected = Some(len);
        }

        match self.expected {
            Some(len) if self.buf.len() >= len => {
                self.expected = None;
                Ok(Some(self.buf.split_to(len).freeze()))
            }
            _ => Ok(None),
        }
    }

    /// Bytes currently buffered (undelivered partial frames).
    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partially assembled frame. The client uses this when it
    /// abandons an exchange (timeout) so stale bytes are not misread as the
    /// next response.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.expected = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_prepends_big_endian_length() {
        let frame = encode_frame(&"hi".to_string()).unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - LENGTH_PREFIX);
    }

    #[test]
    fn decoder_reports_need_more_on_empty_input() {
        let mut dec = FrameDecoder::new();
        assert!(dec.try_decode().unwrap().is_none());
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let blob = vec![0u8; MAX_FRAME_SIZE + 8];
        assert!(matches!(
            encode_frame(&blob),
            Err(ProtocolError::FrameTooLarge(_))
        ));
    }

    #[test]
    fn decoder_rejects_zero_length() {
        let mut dec = FrameDecoder::new();
        dec.extend(&0u32.to_be_bytes());
        assert!(matches!(
            dec.try_decode(),
            Err(ProtocolError::InvalidLength(0))
        ));
    }
}
