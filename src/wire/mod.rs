//! Bit-exact binary protocol codec
//!
//! Little-endian fixed-width fields and the standard prefix-byte
//! variable-length integer encoding, shared by header, transaction and
//! merkle-block serialization. Encoding and decoding round-trip exactly.

pub mod merkle_block;

pub use merkle_block::MerkleBlockMessage;

use bytes::{Buf, BufMut};
use thiserror::Error;

use crate::crypto::Hash256;

/// Wire decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("Unexpected end of input")]
    UnexpectedEof,
    #[error("Non-canonical varint encoding")]
    NonCanonicalVarInt,
    #[error("Trailing bytes after message")]
    TrailingBytes,
}

/// Cursor over a received byte buffer
pub struct ByteReader<'a> {
    buf: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn ensure(&self, n: usize) -> Result<(), WireError> {
        if self.buf.remaining() < n {
            Err(WireError::UnexpectedEof)
        } else {
            Ok(())
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_u16_le(&mut self) -> Result<u16, WireError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn read_u32_le(&mut self) -> Result<u32, WireError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn read_i32_le(&mut self) -> Result<i32, WireError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn read_u64_le(&mut self) -> Result<u64, WireError> {
        self.ensure(8)?;
        Ok(self.buf.get_u64_le())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, WireError> {
        self.ensure(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head.to_vec())
    }

    pub fn read_hash(&mut self) -> Result<Hash256, WireError> {
        self.ensure(32)?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.buf[..32]);
        self.buf.advance(32);
        Ok(Hash256(out))
    }

    /// Standard variable-length integer: single byte below 0xfd,
    /// 0xfd + u16, 0xfe + u32, 0xff + u64. Values must use the
    /// shortest possible encoding.
    pub fn read_var_int(&mut self) -> Result<u64, WireError> {
        let prefix = self.read_u8()?;
        let value = match prefix {
            0xfd => self.read_u16_le()? as u64,
            0xfe => self.read_u32_le()? as u64,
            0xff => self.read_u64_le()?,
            value => return Ok(value as u64),
        };
        if var_int_size(value) != var_int_size_for_prefix(prefix) {
            return Err(WireError::NonCanonicalVarInt);
        }
        Ok(value)
    }
}

/// Append a variable-length integer in its shortest form
pub fn write_var_int(buf: &mut Vec<u8>, value: u64) {
    if value < 0xfd {
        buf.put_u8(value as u8);
    } else if value <= 0xffff {
        buf.put_u8(0xfd);
        buf.put_u16_le(value as u16);
    } else if value <= 0xffff_ffff {
        buf.put_u8(0xfe);
        buf.put_u32_le(value as u32);
    } else {
        buf.put_u8(0xff);
        buf.put_u64_le(value);
    }
}

fn var_int_size_for_prefix(prefix: u8) -> usize {
    match prefix {
        0xfd => 3,
        0xfe => 5,
        0xff => 9,
        _ => 1,
    }
}

/// Byte length of a varint-prefixed value
pub fn var_int_size(value: u64) -> usize {
    if value < 0xfd {
        1
    } else if value <= 0xffff {
        3
    } else if value <= 0xffff_ffff {
        5
    } else {
        9
    }
}
