//! Bounds-checked byte cursors for frame and packet serialization.
//!
//! [`DataWriter`] owns a buffer of fixed capacity and appends through a
//! cursor; every operation either fully succeeds or leaves the cursor where
//! it was. Frame encoders size their output exactly, write through one of
//! these, and require `remaining() == 0` at the end — any slack means the
//! size computation and the write path disagree.
//!
//! [`DataReader`] is the dual: a cursor over a borrowed slice with the
//! length-prefixed reads the TLS and HTTP/3 wire formats use.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::varint;

/// Append-only writer over a fixed-capacity buffer.
#[derive(Debug)]
pub struct DataWriter {
    buf: BytesMut,
    capacity: usize,
}

impl DataWriter {
    /// Create a writer that will accept exactly `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes still available before the capacity is reached.
    pub fn remaining(&self) -> usize {
        self.capacity - self.buf.len()
    }

    fn check(&self, needed: usize) -> Result<()> {
        if needed > self.remaining() {
            return Err(Error::WriterOverflow {
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    /// Append a single byte.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.check(1)?;
        self.buf.put_u8(value);
        Ok(())
    }

    /// Append a big-endian u16.
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.check(2)?;
        self.buf.put_u16(value);
        Ok(())
    }

    /// Append a variable-length integer.
    pub fn write_varint(&mut self, value: u64) -> Result<()> {
        let len = varint::encoded_len(value);
        if len == 0 {
            return Err(Error::VarIntRange(value));
        }
        self.check(len)?;
        let mut tmp = [0u8; 8];
        let written = varint::encode(value, &mut tmp)?;
        self.buf.put_slice(&tmp[..written]);
        Ok(())
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, src: &[u8]) -> Result<()> {
        self.check(src.len())?;
        self.buf.put_slice(src);
        Ok(())
    }

    /// Append `varint(bytes.len())` followed by the bytes themselves.
    pub fn write_length_prefixed_varint(&mut self, bytes: &[u8]) -> Result<()> {
        let prefix_len = varint::encoded_len(bytes.len() as u64);
        if prefix_len == 0 {
            return Err(Error::VarIntRange(bytes.len() as u64));
        }
        // Check up front so a failure leaves the cursor untouched.
        self.check(prefix_len + bytes.len())?;
        self.write_varint(bytes.len() as u64)?;
        self.write_bytes(bytes)
    }

    /// Consume the writer and return the written bytes.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Cursor over a borrowed byte slice.
#[derive(Debug)]
pub struct DataReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DataReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current cursor position in bytes.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// True once every byte has been consumed.
    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        if self.remaining() < 1 {
            return Err(Error::Truncated("u8"));
        }
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        if self.remaining() < 2 {
            return Err(Error::Truncated("u16"));
        }
        let value = u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(value)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        if self.remaining() < 4 {
            return Err(Error::Truncated("u32"));
        }
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(u32::from_be_bytes(bytes))
    }

    /// Borrow the next `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::Truncated("bytes"));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read a variable-length integer.
    pub fn read_varint(&mut self) -> Result<u64> {
        let (value, consumed) =
            varint::decode(&self.data[self.pos..]).ok_or(Error::Truncated("varint"))?;
        self.pos += consumed;
        Ok(value)
    }

    /// Read a u8-length-prefixed byte string (TLS `opaque<0..255>`).
    pub fn read_length_prefixed_u8(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u8()? as usize;
        self.read_bytes(len)
    }

    /// Read a u16-length-prefixed byte string (TLS `opaque<0..2^16-1>`).
    pub fn read_length_prefixed_u16(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u16()? as usize;
        self.read_bytes(len)
    }
}
