//! # Response Frames
//!
//! Responses share the request header layout. An application error travels
//! as a regular frame: the sub-command is replaced with
//! [`Command::INTERNAL_BAD`] and the payload with an encoded [`ErrorRecord`],
//! so the connection stays open.

use std::fmt;

use bytes::Bytes;

use crate::core::buffer::{ByteBuffer, Pack, Unpack};
use crate::core::command::Command;
use crate::core::request::{Header, Request};
use crate::error::Result;

/// Structured error payload carried by error responses
///
/// ```text
/// [Command(i32)] [SubCommand(i32)] [Code(i32)] [MessageLen(u16)] [Message(N)]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorRecord {
    pub command: i32,
    pub sub_command: i32,
    pub code: i32,
    pub message: String,
}

impl Pack for ErrorRecord {
    fn pack(&self, w: &mut ByteBuffer) -> Result<()> {
        w.write_i32(self.command);
        w.write_i32(self.sub_command);
        w.write_i32(self.code);
        w.write_string(&self.message)
    }
}

impl Unpack for ErrorRecord {
    fn unpack(r: &mut ByteBuffer) -> Result<Self> {
        Ok(Self {
            command: r.read_i32()?,
            sub_command: r.read_i32()?,
            code: r.read_i32()?,
            message: r.read_string()?,
        })
    }
}

/// A server response frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub version: i8,
    pub seq_id: u32,
    pub command: Command,
    pub sub_command: Command,
    pub payload: Bytes,
    /// Application error in string form; a numeric string becomes the wire code
    pub error: Option<String>,
}

impl Response {
    /// Reply to `req` with `payload`, echoing its version, sequence id and commands
    pub fn reply(req: &Request, payload: impl Into<Bytes>) -> Self {
        Self {
            version: req.version,
            seq_id: req.seq_id,
            command: req.command,
            sub_command: req.sub_command,
            payload: payload.into(),
            error: None,
        }
    }

    /// Reply to `req` with an application error
    pub fn failure(req: &Request, err: impl fmt::Display) -> Self {
        Self::reply(req, Bytes::new()).with_error(err)
    }

    pub fn with_error(mut self, err: impl fmt::Display) -> Self {
        self.error = Some(err.to_string());
        self
    }

    /// A response is in error when it carries an error or the reserved sub-command
    pub fn is_error(&self) -> bool {
        self.error.is_some() || self.sub_command == Command::INTERNAL_BAD
    }

    /// Numeric code parsed from the error string, defaulting to 0
    pub fn error_code(&self) -> i32 {
        self.error
            .as_deref()
            .and_then(|e| e.trim().parse::<i32>().ok())
            .unwrap_or(0)
    }

    /// Decode the error record carried in the payload of an error response
    pub fn error_record(&self) -> Option<ErrorRecord> {
        if self.sub_command != Command::INTERNAL_BAD {
            return None;
        }
        ErrorRecord::from_bytes(&self.payload).ok()
    }

    /// Sub-command and payload as they appear on the wire
    fn wire_body(&self) -> Result<(Command, Bytes)> {
        match &self.error {
            Some(message) if self.sub_command != Command::INTERNAL_BAD => {
                let record = ErrorRecord {
                    command: self.command.as_i16() as i32,
                    sub_command: self.sub_command.as_i16() as i32,
                    code: self.error_code(),
                    message: message.clone(),
                };
                Ok((Command::INTERNAL_BAD, record.to_bytes()?))
            }
            _ => Ok((self.sub_command, self.payload.clone())),
        }
    }

    /// Encode into wire form. Error responses are rewritten to the reserved
    /// sub-command with an [`ErrorRecord`] payload before validation.
    pub fn marshal(&self) -> Result<Bytes> {
        let (sub_command, payload) = self.wire_body()?;
        Header {
            version: self.version,
            seq_id: self.seq_id,
            command: self.command,
            sub_command,
        }
        .encode(&payload)
    }

    /// Decode from wire form. An error response restores `error` as the
    /// record's code, or the reserved sub-command when the record is unreadable.
    pub fn unmarshal(frame: &[u8]) -> Result<Self> {
        let (h, payload) = Header::decode(frame)?;
        let mut resp = Self {
            version: h.version,
            seq_id: h.seq_id,
            command: h.command,
            sub_command: h.sub_command,
            payload,
            error: None,
        };
        if resp.sub_command == Command::INTERNAL_BAD {
            resp.error = Some(match resp.error_record() {
                Some(record) => record.code.to_string(),
                None => Command::INTERNAL_BAD.to_string(),
            });
        }
        Ok(resp)
    }
}
