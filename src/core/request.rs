//! # Request Frames
//!
//! Application frame layout, shared by requests and responses:
//!
//! ```text
//! [Version(i8)] [SequenceId(u32)] [Command(i16)] [SubCommand(i16)] [Payload(N)]
//! ```
//!
//! All header fields are big-endian. The payload is written as a raw tail; its
//! length is implied by the transport-level `u16` length prefix.

use bytes::Bytes;

use crate::config::PROTOCOL_VERSION;
use crate::core::buffer::ByteBuffer;
use crate::core::command::Command;
use crate::error::{constants, GatewayError, Result};

/// Fixed header size in bytes (version + sequence id + command + sub-command)
pub const HEADER_LEN: usize = 1 + 4 + 2 + 2;

/// Decoded header fields shared by requests and responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    pub version: i8,
    pub seq_id: u32,
    pub command: Command,
    pub sub_command: Command,
}

impl Header {
    pub(crate) fn validate(&self, payload: &[u8]) -> Result<()> {
        if self.seq_id == 0 {
            return Err(GatewayError::InvalidFrame(constants::ERR_ZERO_SEQUENCE));
        }
        if !self.command.is_valid() || !self.sub_command.is_valid() {
            return Err(GatewayError::InvalidFrame(constants::ERR_BAD_COMMAND));
        }
        if payload.is_empty() {
            return Err(GatewayError::InvalidFrame(constants::ERR_EMPTY_PAYLOAD));
        }
        Ok(())
    }

    pub(crate) fn encode(&self, payload: &[u8]) -> Result<Bytes> {
        self.validate(payload)?;
        let mut w = ByteBuffer::with_capacity(HEADER_LEN + payload.len());
        w.write_i8(self.version);
        w.write_u32(self.seq_id);
        w.write_i16(self.command.as_i16());
        w.write_i16(self.sub_command.as_i16());
        w.write_bytes(payload);
        Ok(w.freeze())
    }

    pub(crate) fn decode(frame: &[u8]) -> Result<(Self, Bytes)> {
        let mut rd = ByteBuffer::from_slice(frame);
        let version = rd.read_i8()?;
        let seq_id = rd.read_u32()?;
        let command = Command(rd.read_i16()?);
        let sub_command = Command(rd.read_i16()?);
        let header = Header {
            version,
            seq_id,
            command,
            sub_command,
        };
        Ok((header, rd.take_remaining()))
    }
}

/// A client request frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub version: i8,
    pub seq_id: u32,
    pub command: Command,
    pub sub_command: Command,
    pub payload: Bytes,
}

impl Request {
    /// Build a request at the current protocol version
    pub fn new(
        seq_id: u32,
        command: impl Into<Command>,
        sub_command: impl Into<Command>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            seq_id,
            command: command.into(),
            sub_command: sub_command.into(),
            payload: payload.into(),
        }
    }

    fn header(&self) -> Header {
        Header {
            version: self.version,
            seq_id: self.seq_id,
            command: self.command,
            sub_command: self.sub_command,
        }
    }

    /// Check identifiers and payload without encoding
    pub fn validate(&self) -> Result<()> {
        self.header().validate(&self.payload)
    }

    /// Encode into wire form; fails with `InvalidFrame` on zero or negative ids
    /// or an empty payload
    pub fn marshal(&self) -> Result<Bytes> {
        self.header().encode(&self.payload)
    }

    /// Decode from wire form; all bytes after the header are the payload
    pub fn unmarshal(frame: &[u8]) -> Result<Self> {
        let (h, payload) = Header::decode(frame)?;
        Ok(Self {
            version: h.version,
            seq_id: h.seq_id,
            command: h.command,
            sub_command: h.sub_command,
            payload,
        })
    }
}
