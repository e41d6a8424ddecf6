//! Edge case tests for the wire codec
//!
//! Boundary sizes, malformed prefixes and error-record corner cases.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::{Bytes, BytesMut};
use edge_gateway::config::{MAX_FRAME_SIZE, PROTOCOL_VERSION};
use edge_gateway::core::buffer::{ByteBuffer, Pack, Unpack};
use edge_gateway::core::codec::{strip_prefix, FrameCodec, LENGTH_PREFIX};
use edge_gateway::core::command::Command;
use edge_gateway::core::request::{Request, HEADER_LEN};
use edge_gateway::core::response::{ErrorRecord, Response};
use edge_gateway::error::GatewayError;
use tokio_util::codec::{Decoder, Encoder};

#[test]
fn test_zero_length_frame() {
    let mut buf = BytesMut::new();
    FrameCodec.encode(&b""[..], &mut buf).unwrap();
    assert_eq!(&buf[..], &[0, 0]);

    let frame = FrameCodec.decode(&mut buf).unwrap().unwrap();
    assert!(frame.is_empty());
    assert!(buf.is_empty());
}

#[test]
fn test_max_frame_size_boundary() {
    let mut buf = BytesMut::new();
    let max = vec![0xAB; MAX_FRAME_SIZE];
    FrameCodec.encode(&max[..], &mut buf).unwrap();
    assert_eq!(buf.len(), LENGTH_PREFIX + MAX_FRAME_SIZE);
    assert_eq!(&buf[..2], &[0xFF, 0xFF]);

    let over = vec![0u8; MAX_FRAME_SIZE + 1];
    let mut out = BytesMut::new();
    let err = FrameCodec.encode(&over[..], &mut out).unwrap_err();
    assert!(matches!(err, GatewayError::OversizedFrame(n) if n == MAX_FRAME_SIZE + 1));
    assert!(out.is_empty());
}

#[test]
fn test_partial_prefix_waits() {
    let mut codec = FrameCodec;
    let mut buf = BytesMut::from(&[0u8][..]);
    assert!(codec.decode(&mut buf).unwrap().is_none());

    buf.extend_from_slice(&[3, b'a', b'b']);
    assert!(codec.decode(&mut buf).unwrap().is_none());

    buf.extend_from_slice(&[b'c', 0]);
    assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), Bytes::from_static(b"abc"));
    assert_eq!(&buf[..], &[0]);
}

#[test]
fn test_strip_prefix_trims_trailing_bytes() {
    let msg = [0u8, 2, b'h', b'i', b'!', b'!'];
    assert_eq!(strip_prefix(&msg).unwrap(), b"hi");
}

#[test]
fn test_strip_prefix_short_message() {
    assert!(strip_prefix(&[0]).is_err());
    assert!(strip_prefix(&[0, 5, 1, 2]).is_err());
    assert_eq!(strip_prefix(&[0, 0]).unwrap(), b"");
}

#[test]
fn test_request_header_only_is_rejected() {
    let mut w = ByteBuffer::new();
    w.write_i8(PROTOCOL_VERSION);
    w.write_u32(1);
    w.write_i16(1);
    w.write_i16(1);
    let wire = w.freeze();
    assert_eq!(wire.len(), HEADER_LEN);

    // Decoding is lenient about the empty payload; validation is not
    let req = Request::unmarshal(&wire).unwrap();
    assert!(req.payload.is_empty());
    assert!(req.validate().is_err());
}

#[test]
fn test_negative_command_on_wire_decodes_but_fails_validation() {
    let mut w = ByteBuffer::new();
    w.write_i8(PROTOCOL_VERSION);
    w.write_u32(7);
    w.write_i16(-3);
    w.write_i16(1);
    w.write_bytes(b"x");

    let req = Request::unmarshal(w.as_slice()).unwrap();
    assert_eq!(req.command, Command(-3));
    assert!(matches!(req.validate(), Err(GatewayError::InvalidFrame(_))));
}

#[test]
fn test_non_numeric_error_has_zero_code() {
    let req = Request::new(3, 4, 5, &b"p"[..]);
    let resp = Response::failure(&req, "not a number");
    let back = Response::unmarshal(&resp.marshal().unwrap()).unwrap();

    assert!(back.is_error());
    assert_eq!(back.error_code(), 0);
    assert_eq!(back.error_record().unwrap().message, "not a number");
}

#[test]
fn test_unreadable_error_record_falls_back() {
    let mut w = ByteBuffer::new();
    w.write_i8(PROTOCOL_VERSION);
    w.write_u32(3);
    w.write_i16(4);
    w.write_i16(Command::INTERNAL_BAD.as_i16());
    w.write_bytes(&[0xFF]);

    let resp = Response::unmarshal(w.as_slice()).unwrap();
    assert!(resp.is_error());
    assert_eq!(resp.error_code(), 110);
    assert!(resp.error_record().is_none());
}

#[test]
fn test_error_record_roundtrip_with_long_message() {
    let record = ErrorRecord {
        command: 12,
        sub_command: 34,
        code: -1,
        message: "x".repeat(u16::MAX as usize),
    };
    let bytes = record.to_bytes().unwrap();
    assert_eq!(ErrorRecord::from_bytes(&bytes).unwrap(), record);

    let too_long = ErrorRecord {
        message: "x".repeat(u16::MAX as usize + 1),
        ..record
    };
    assert!(too_long.to_bytes().is_err());
}

#[test]
fn test_buffer_underrun_does_not_consume() {
    let mut rd = ByteBuffer::from_slice(&[0, 0, 0]);
    assert!(matches!(rd.read_u32(), Err(GatewayError::UnexpectedEof)));
    assert_eq!(rd.remaining(), 3);
    assert_eq!(rd.read_u16().unwrap(), 0);
    assert_eq!(rd.remaining(), 1);
}

#[test]
fn test_reply_echoes_request_identity() {
    let req = Request::new(0xFFFF_FFFF, i16::MAX, 1, &b"q"[..]);
    let resp = Response::reply(&req, &b"a"[..]);
    let back = Response::unmarshal(&resp.marshal().unwrap()).unwrap();

    assert_eq!(back.seq_id, 0xFFFF_FFFF);
    assert_eq!(back.command, Command(i16::MAX));
    assert_eq!(back.version, PROTOCOL_VERSION);
    assert!(!back.is_error());
}
