//! Buffer reader for SchemaPack deserialization

use std::string::String;
use std::vec::Vec;

use crate::errors::{Error, Result};

/// A forward-only cursor over an encoded buffer
#[derive(Debug, Clone)]
pub struct BufferReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> BufferReader<'a> {
    /// Create a new reader positioned at the start of `buffer`
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Current read position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Total buffer length
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the underlying buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// Advance past `width` bytes and return the offset they start at
    #[inline]
    fn take(&mut self, width: usize) -> Result<usize> {
        if width > self.remaining() {
            return Err(Error::OutOfBounds {
                needed: width,
                available: self.remaining(),
            });
        }
        let offset = self.position;
        self.position += width;
        Ok(offset)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let offset = self.take(N)?;
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.buffer[offset..offset + N]);
        Ok(bytes)
    }

    /// Read a u8 value
    pub fn read_u8(&mut self) -> Result<u8> {
        let offset = self.take(1)?;
        Ok(self.buffer[offset])
    }

    /// Read a u16 value
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    /// Read a u32 value
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// Read an i8 value
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read an i16 value
    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    /// Read an i32 value
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// Read an f32 value
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Read an f64 value
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(u64::from_be_bytes(self.read_array()?)))
    }

    /// Read a bool value; only `1` decodes as `true`
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? == 1)
    }

    /// Borrow the next `len` bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let offset = self.take(len)?;
        Ok(&self.buffer[offset..offset + len])
    }

    /// Read one byte written by `BufferBuilder::write_bits`
    ///
    /// Returns the flags below the leading marker bit, most significant first.
    /// A zero byte has no marker and yields no flags.
    pub fn read_bits(&mut self) -> Result<Vec<bool>> {
        let packed = self.read_u8()?;
        if packed == 0 {
            return Ok(Vec::new());
        }
        let count = 7 - packed.leading_zeros() as usize;
        Ok((0..count)
            .rev()
            .map(|bit| (packed >> bit) & 1 == 1)
            .collect())
    }

    /// Read a u16-length-prefixed UTF-16 string
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        let units: Vec<u16> = self
            .read_bytes(len * 2)?
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        Ok(String::from_utf16(&units)?)
    }

    /// Fail unless every byte of the buffer has been consumed
    pub fn assert_fully_consumed(&self) -> Result<()> {
        if self.position != self.buffer.len() {
            return Err(Error::TrailingBytes {
                position: self.position,
                len: self.buffer.len(),
            });
        }
        Ok(())
    }
}
