//! Buffer builder for SchemaPack serialization

use std::vec::Vec;

use crate::{
    constants::{GROWTH_FACTOR, INITIAL_CAPACITY, MAX_BITMASK_FLAGS},
    errors::{Error, Result},
};

/// An append-only binary sink with a position cursor
///
/// A builder runs in one of two modes. In estimate mode (`new`,
/// `with_capacity`) the backing storage grows by [`GROWTH_FACTOR`] whenever a
/// write would overflow it. In exact mode (`exact`) the caller has already
/// computed the final size, so the storage is allocated once and writes skip
/// the capacity check entirely.
#[derive(Debug)]
pub struct BufferBuilder {
    buffer: Vec<u8>,
    exact: bool,
}

impl BufferBuilder {
    /// Create a new builder in estimate mode
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    /// Create a builder in estimate mode with an initial capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            exact: false,
        }
    }

    /// Create a builder for a message whose encoded size is already known
    pub fn exact(size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(size),
            exact: true,
        }
    }

    /// Number of bytes written so far
    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    /// Whether this builder was created with a precomputed size
    pub fn is_exact(&self) -> bool {
        self.exact
    }

    /// Bytes the backing storage can hold without reallocating
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    #[inline]
    fn reserve(&mut self, added: usize) {
        if self.exact {
            return;
        }
        let needed = self.buffer.len() + added;
        if needed > self.buffer.capacity() {
            let mut target = self.buffer.capacity().max(1);
            while target < needed {
                target *= GROWTH_FACTOR;
            }
            self.buffer.reserve_exact(target - self.buffer.len());
        }
    }

    #[inline]
    fn put(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len());
        self.buffer.extend_from_slice(bytes);
    }

    /// Write a u8 value
    pub fn write_u8(&mut self, value: u8) {
        self.put(&[value]);
    }

    /// Write a u16 value
    pub fn write_u16(&mut self, value: u16) {
        self.put(&value.to_be_bytes());
    }

    /// Write a u32 value
    pub fn write_u32(&mut self, value: u32) {
        self.put(&value.to_be_bytes());
    }

    /// Write an i8 value
    pub fn write_i8(&mut self, value: i8) {
        self.write_u8(value as u8);
    }

    /// Write an i16 value
    pub fn write_i16(&mut self, value: i16) {
        self.write_u16(value as u16);
    }

    /// Write an i32 value
    pub fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    /// Write an f32 value
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    /// Write an f64 value
    pub fn write_f64(&mut self, value: f64) {
        self.put(&value.to_bits().to_be_bytes());
    }

    /// Write a bool value as a single 0/1 byte
    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(value as u8);
    }

    /// Write raw bytes with no length prefix
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.put(bytes);
    }

    /// Pack up to seven flags into one byte behind a leading marker bit
    ///
    /// The byte reads `0b1 f0 f1 .. fn` from the marker down, so `[true,
    /// false, true]` becomes `0b1101`.
    pub fn write_bits(&mut self, flags: &[bool]) -> Result<()> {
        if flags.len() > MAX_BITMASK_FLAGS {
            return Err(Error::InvalidValue(format!(
                "bitmask holds at most {} flags, got {}",
                MAX_BITMASK_FLAGS,
                flags.len()
            )));
        }
        let packed = flags
            .iter()
            .fold(1u8, |acc, &flag| (acc << 1) | flag as u8);
        self.write_u8(packed);
        Ok(())
    }

    /// Write a string as a u16 count of UTF-16 code units followed by the units
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let len = value.encode_utf16().count();
        let len = u16::try_from(len).map_err(|_| {
            Error::InvalidValue(format!(
                "string of {} UTF-16 code units exceeds the u16 length prefix",
                len
            ))
        })?;
        self.reserve(2 + 2 * len as usize);
        self.write_u16(len);
        for unit in value.encode_utf16() {
            self.write_u16(unit);
        }
        Ok(())
    }

    /// Encoded size of a string, including its length prefix
    pub fn string_size(value: &str) -> usize {
        2 + 2 * value.encode_utf16().count()
    }

    /// Finish building and return exactly the bytes written
    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

impl Default for BufferBuilder {
    fn default() -> Self {
        Self::new()
    }
}
