//! # Core Protocol Components
//!
//! Byte-level encoding, frame layout and transport framing.
//!
//! ## Components
//! - **Buffer**: big-endian read/write primitives with bounds checks
//! - **Command**: command identifiers and the reserved error sub-command
//! - **Request / Response**: application frames and the error-record convention
//! - **Codec**: Tokio codec for the `u16` length prefix
//!
//! ## Wire Format
//! ```text
//! [Length(u16)] [Version(i8)] [SequenceId(u32)] [Command(i16)] [SubCommand(i16)] [Payload(N)]
//! ```
//!
//! ## Limits
//! - Maximum frame size: 65535 bytes (bounded by the length prefix)
//! - Identifiers must be positive and payloads non-empty before encoding

pub mod buffer;
pub mod codec;
pub mod command;
pub mod request;
pub mod response;
