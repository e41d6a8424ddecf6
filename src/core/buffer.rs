//! # Byte Buffer
//!
//! Growable big-endian read/write buffer used by every frame encoder in the crate.
//!
//! Writes append to the tail; reads consume from an internal cursor. Fixed-width
//! reads check the remaining length first and fail with
//! [`GatewayError::UnexpectedEof`] on underrun, so malformed input never panics.
//!
//! Strings and byte slices written with [`ByteBuffer::write_string`] and
//! [`ByteBuffer::write_u16_bytes`] carry a `u16` length prefix. Raw appends
//! ([`ByteBuffer::write_bytes`]) carry none; their length is implied by the
//! enclosing transport frame.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{constants, GatewayError, Result};

/// Big-endian byte buffer with a read cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteBuffer {
    data: BytesMut,
    pos: usize,
}

impl ByteBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with preallocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            pos: 0,
        }
    }

    /// Create a reader over a copy of `frame`
    pub fn from_slice(frame: &[u8]) -> Self {
        Self {
            data: BytesMut::from(frame),
            pos: 0,
        }
    }

    /// Total number of bytes held, including consumed ones
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Entire written contents
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Unread tail, without consuming it
    pub fn unread(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    /// Consume and return the unread tail
    pub fn take_remaining(&mut self) -> Bytes {
        let tail = Bytes::copy_from_slice(&self.data[self.pos..]);
        self.pos = self.data.len();
        tail
    }

    /// Freeze the entire written contents
    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Reset the buffer, keeping its allocation
    pub fn clear(&mut self) {
        self.data.clear();
        self.pos = 0;
    }

    #[inline]
    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        if self.remaining() < N {
            return Err(GatewayError::UnexpectedEof);
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    fn take_slice(&mut self, n: usize) -> Result<&[u8]> {
        if self.remaining() < n {
            return Err(GatewayError::UnexpectedEof);
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..start + n])
    }

    pub fn write_bool(&mut self, v: bool) {
        self.data.put_u8(v as u8);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.data.put_u8(v);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.data.put_i8(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.data.put_u16(v);
    }

    pub fn write_i16(&mut self, v: i16) {
        self.data.put_i16(v);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.data.put_u32(v);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.data.put_i32(v);
    }

    pub fn write_u64(&mut self, v: u64) {
        self.data.put_u64(v);
    }

    pub fn write_i64(&mut self, v: i64) {
        self.data.put_i64(v);
    }

    pub fn write_f32(&mut self, v: f32) {
        self.data.put_f32(v);
    }

    pub fn write_f64(&mut self, v: f64) {
        self.data.put_f64(v);
    }

    /// Append raw bytes with no length prefix
    pub fn write_bytes(&mut self, v: &[u8]) {
        self.data.put_slice(v);
    }

    /// Append a `u16` length prefix followed by `v`
    pub fn write_u16_bytes(&mut self, v: &[u8]) -> Result<()> {
        let len = u16::try_from(v.len())
            .map_err(|_| GatewayError::InvalidFrame(constants::ERR_STRING_TOO_LONG))?;
        self.data.put_u16(len);
        self.data.put_slice(v);
        Ok(())
    }

    /// Append a UTF-8 string with a `u16` length prefix
    pub fn write_string(&mut self, v: &str) -> Result<()> {
        self.write_u16_bytes(v.as_bytes())
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.take::<1>()?[0] != 0)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_be_bytes(self.take()?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.take()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.take()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_be_bytes(self.take()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.take()?))
    }

    /// Read exactly `n` raw bytes
    pub fn read_bytes(&mut self, n: usize) -> Result<Bytes> {
        self.take_slice(n).map(Bytes::copy_from_slice)
    }

    /// Read a `u16` length prefix followed by that many bytes
    pub fn read_u16_bytes(&mut self) -> Result<Bytes> {
        let len = self.read_u16()? as usize;
        self.read_bytes(len)
    }

    /// Read a `u16`-prefixed UTF-8 string; invalid UTF-8 is replaced lossily
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        let raw = self.take_slice(len)?;
        Ok(String::from_utf8_lossy(raw).into_owned())
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(v: Vec<u8>) -> Self {
        Self {
            data: BytesMut::from(&v[..]),
            pos: 0,
        }
    }
}

/// Types that encode themselves into a [`ByteBuffer`].
pub trait Pack {
    fn pack(&self, w: &mut ByteBuffer) -> Result<()>;

    /// Encode into a fresh buffer
    fn to_bytes(&self) -> Result<Bytes> {
        let mut w = ByteBuffer::new();
        self.pack(&mut w)?;
        Ok(w.freeze())
    }
}

/// Types that decode themselves from a [`ByteBuffer`].
pub trait Unpack: Sized {
    fn unpack(r: &mut ByteBuffer) -> Result<Self>;

    fn from_bytes(frame: &[u8]) -> Result<Self> {
        Self::unpack(&mut ByteBuffer::from_slice(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_is_big_endian() {
        let mut w = ByteBuffer::new();
        w.write_u16(0x0102);
        w.write_i32(-2);
        w.write_u64(1);
        assert_eq!(
            w.as_slice(),
            &[1, 2, 0xFF, 0xFF, 0xFF, 0xFE, 0, 0, 0, 0, 0, 0, 0, 1]
        );
    }

    #[test]
    fn test_mixed_read_back() {
        let mut w = ByteBuffer::new();
        w.write_bool(true);
        w.write_i8(-7);
        w.write_i16(-300);
        w.write_f32(1.5);
        w.write_f64(-0.25);
        w.write_i64(i64::MIN);
        w.write_string("ping").unwrap();
        w.write_u16_bytes(&[9, 9]).unwrap();
        w.write_bytes(b"tail");

        let mut r = ByteBuffer::from_slice(w.as_slice());
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_i8().unwrap(), -7);
        assert_eq!(r.read_i16().unwrap(), -300);
        assert_eq!(r.read_f32().unwrap(), 1.5);
        assert_eq!(r.read_f64().unwrap(), -0.25);
        assert_eq!(r.read_i64().unwrap(), i64::MIN);
        assert_eq!(r.read_string().unwrap(), "ping");
        assert_eq!(&r.read_u16_bytes().unwrap()[..], &[9, 9]);
        assert_eq!(&r.take_remaining()[..], b"tail");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_underrun_reports_eof() {
        let mut r = ByteBuffer::from_slice(&[0, 1, 2]);
        assert!(matches!(r.read_u32(), Err(GatewayError::UnexpectedEof)));
        // A failed read must not consume anything
        assert_eq!(r.remaining(), 3);
        assert_eq!(r.read_u16().unwrap(), 1);
        assert!(matches!(r.read_u16(), Err(GatewayError::UnexpectedEof)));
    }

    #[test]
    fn test_prefixed_string_truncated() {
        // Prefix claims 10 bytes, only 2 present
        let mut r = ByteBuffer::from_slice(&[0, 10, b'h', b'i']);
        assert!(matches!(r.read_string(), Err(GatewayError::UnexpectedEof)));
    }

    #[test]
    fn test_oversized_string_rejected_on_write() {
        let mut w = ByteBuffer::new();
        let long = "x".repeat(u16::MAX as usize + 1);
        assert!(matches!(
            w.write_string(&long),
            Err(GatewayError::InvalidFrame(_))
        ));
        assert!(w.is_empty());
    }
}
