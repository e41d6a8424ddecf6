//! # Frame Codec
//!
//! Transport-level framing: a big-endian `u16` length followed by exactly that
//! many payload bytes.
//!
//! ```text
//! [Length(u16)] [Payload(Length)]
//! ```
//!
//! Used with `FramedRead` on raw streams and to build WebSocket message bodies,
//! which carry the same prefix for symmetry with the stream transport.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::MAX_FRAME_SIZE;
use crate::error::{GatewayError, Result};

/// Size of the length prefix
pub const LENGTH_PREFIX: usize = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = GatewayError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < LENGTH_PREFIX {
            return Ok(None);
        }

        let len = u16::from_be_bytes([src[0], src[1]]) as usize;
        if src.len() < LENGTH_PREFIX + len {
            src.reserve(LENGTH_PREFIX + len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX);
        Ok(Some(src.split_to(len).freeze()))
    }
}

impl Encoder<&[u8]> for FrameCodec {
    type Error = GatewayError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<()> {
        if item.len() > MAX_FRAME_SIZE {
            return Err(GatewayError::OversizedFrame(item.len()));
        }
        dst.reserve(LENGTH_PREFIX + item.len());
        dst.put_u16(item.len() as u16);
        dst.put_slice(item);
        Ok(())
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = GatewayError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        Encoder::<&[u8]>::encode(self, &item[..], dst)
    }
}

/// Strip and check the length prefix of a WebSocket message body
pub fn strip_prefix(message: &[u8]) -> Result<&[u8]> {
    if message.len() < LENGTH_PREFIX {
        return Err(GatewayError::UnexpectedEof);
    }
    let len = u16::from_be_bytes([message[0], message[1]]) as usize;
    let body = &message[LENGTH_PREFIX..];
    if body.len() < len {
        return Err(GatewayError::UnexpectedEof);
    }
    Ok(&body[..len])
}
