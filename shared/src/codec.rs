//! Length-prefixed framing for control envelopes on stream transports
//!
//! ```text
//! [ u32 big-endian payload length ][ protobuf payload ]
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use prost::Message;
use thiserror::Error;

use crate::Envelope;

/// Largest accepted payload; control events are a few dozen bytes
pub const MAX_MESSAGE_SIZE: u32 = 64 * 1024;

const PREFIX_LEN: usize = 4;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Frame payload of {0} bytes exceeds {MAX_MESSAGE_SIZE}")]
    MessageTooLarge(usize),

    #[error("Length prefix {0} exceeds {MAX_MESSAGE_SIZE}")]
    InvalidLength(u32),

    #[error("Malformed frame payload: {0}")]
    DecodeError(#[from] prost::DecodeError),

    #[error("Failed to encode frame payload: {0}")]
    EncodeError(#[from] prost::EncodeError),
}

/// Frame one envelope
pub fn encode(envelope: &Envelope) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::new();
    encode_into(envelope, &mut buf)?;
    Ok(buf.freeze())
}

/// Append one framed envelope to `buf`
pub fn encode_into(envelope: &Envelope, buf: &mut BytesMut) -> Result<(), CodecError> {
    let payload_len = envelope.encoded_len();
    if payload_len > MAX_MESSAGE_SIZE as usize {
        return Err(CodecError::MessageTooLarge(payload_len));
    }

    buf.reserve(PREFIX_LEN + payload_len);
    buf.put_u32(payload_len as u32);
    envelope.encode(buf)?;
    Ok(())
}

/// Decode the first complete frame in `buf`, consuming it
///
/// `Ok(None)` means the frame is not complete yet and nothing was consumed.
pub fn decode(buf: &mut BytesMut) -> Result<Option<Envelope>, CodecError> {
    let Some(payload_len) = peek_length(&buf[..])? else {
        return Ok(None);
    };
    if buf.len() < PREFIX_LEN + payload_len {
        return Ok(None);
    }

    buf.advance(PREFIX_LEN);
    let payload = buf.split_to(payload_len);
    Ok(Some(Envelope::decode(payload)?))
}

fn peek_length(buf: &[u8]) -> Result<Option<usize>, CodecError> {
    let Some(mut prefix) = buf.get(..PREFIX_LEN) else {
        return Ok(None);
    };

    let len = prefix.get_u32();
    if len > MAX_MESSAGE_SIZE {
        return Err(CodecError::InvalidLength(len));
    }
    Ok(Some(len as usize))
}

/// Reassembles envelopes from arbitrarily split reads
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
        }
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Next complete envelope; call until `Ok(None)` to drain
    pub fn decode_next(&mut self) -> Result<Option<Envelope>, CodecError> {
        decode(&mut self.buffer)
    }

    /// Bytes held back waiting for the rest of a frame
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}
