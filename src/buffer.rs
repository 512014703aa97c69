//! A reusable staging buffer for one record at a time.

use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

/// A bounded, growable byte buffer with separate read and write views.
///
/// The buffer operates in one of two modes. In *write* mode the `put_*`
/// methods append bytes and the read cursor is pinned at the start. In
/// *read* mode the `get_*` methods consume bytes and writes are rejected.
/// Calling a method of the inactive view fails with
/// [`InvalidState`](crate::Error::InvalidState).
///
/// Switching the mode resets the active cursor to the start of the
/// currently populated region. In particular, switching to write mode
/// discards the previous contents.
///
/// All multi-byte values are stored big-endian. The store owns a single
/// buffer and lends it to the user codec during one operation; the codec
/// must not retain any data obtained from it across calls.
pub struct Buffer {
    data: Vec<u8>,
    cursor: usize,
    mode: Mode,
}

impl Buffer {
    /// Creates an empty buffer in write mode.
    ///
    /// The capacity is an optimization hint only. The buffer grows on
    /// demand regardless of it.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            cursor: 0,
            mode: Mode::Write,
        }
    }

    /// Switches to write mode and discards the previous contents.
    pub fn switch_to_write(&mut self) {
        self.mode = Mode::Write;
        self.data.clear();
        self.cursor = 0;
    }

    /// Switches to read mode with the cursor at the start of the populated
    /// region.
    pub fn switch_to_read(&mut self) {
        self.mode = Mode::Read;
        self.cursor = 0;
    }

    /// Returns the number of bytes currently pending transfer.
    ///
    /// In write mode this is the number of bytes written so far; in read
    /// mode the number of bytes not yet consumed.
    pub fn transferable_data(&self) -> usize {
        match self.mode {
            Mode::Write => self.data.len(),
            Mode::Read => self.data.len() - self.cursor,
        }
    }

    /// Appends a single byte. Write mode only.
    pub fn put_u8(&mut self, value: u8) -> Result<()> {
        self.writable()?.write_u8(value)?;
        Ok(())
    }

    /// Appends an unsigned 16-bit integer in big-endian order. Write mode
    /// only.
    pub fn put_u16(&mut self, value: u16) -> Result<()> {
        self.writable()?.write_u16::<BigEndian>(value)?;
        Ok(())
    }

    /// Appends an unsigned 32-bit integer in big-endian order. Write mode
    /// only.
    pub fn put_u32(&mut self, value: u32) -> Result<()> {
        self.writable()?.write_u32::<BigEndian>(value)?;
        Ok(())
    }

    /// Appends an unsigned 64-bit integer in big-endian order. Write mode
    /// only.
    pub fn put_u64(&mut self, value: u64) -> Result<()> {
        self.writable()?.write_u64::<BigEndian>(value)?;
        Ok(())
    }

    /// Appends a slice of raw bytes. Write mode only.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.writable()?.extend_from_slice(bytes);
        Ok(())
    }

    /// Consumes a single byte. Read mode only.
    pub fn get_u8(&mut self) -> Result<u8> {
        let mut slice = self.readable(1)?;
        let value = slice.read_u8()?;
        self.cursor += 1;
        Ok(value)
    }

    /// Consumes an unsigned 16-bit integer in big-endian order. Read mode
    /// only.
    pub fn get_u16(&mut self) -> Result<u16> {
        let mut slice = self.readable(2)?;
        let value = slice.read_u16::<BigEndian>()?;
        self.cursor += 2;
        Ok(value)
    }

    /// Consumes an unsigned 32-bit integer in big-endian order. Read mode
    /// only.
    pub fn get_u32(&mut self) -> Result<u32> {
        let mut slice = self.readable(4)?;
        let value = slice.read_u32::<BigEndian>()?;
        self.cursor += 4;
        Ok(value)
    }

    /// Consumes an unsigned 64-bit integer in big-endian order. Read mode
    /// only.
    pub fn get_u64(&mut self) -> Result<u64> {
        let mut slice = self.readable(8)?;
        let value = slice.read_u64::<BigEndian>()?;
        self.cursor += 8;
        Ok(value)
    }

    /// Consumes `len` raw bytes. Read mode only.
    pub fn get_bytes(&mut self, len: usize) -> Result<&[u8]> {
        self.readable(len)?;
        let bytes = &self.data[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(bytes)
    }

    /// Fills the buffer with exactly `len` bytes from the reader. Write
    /// mode only.
    pub(crate) fn fill_from<R: Read>(&mut self, reader: &mut R, len: usize) -> Result<()> {
        self.writable()?;
        let start = self.data.len();
        self.data.resize(start + len, 0);
        reader.read_exact(&mut self.data[start..])?;
        Ok(())
    }

    /// Returns the pending region as a slice without consuming it. Read
    /// mode only.
    pub(crate) fn pending(&self) -> Result<&[u8]> {
        if self.mode != Mode::Read {
            return Err(Error::InvalidState("buffer is not in read mode"));
        }

        Ok(&self.data[self.cursor..])
    }

    fn writable(&mut self) -> Result<&mut Vec<u8>> {
        if self.mode != Mode::Write {
            return Err(Error::InvalidState("buffer is not in write mode"));
        }

        Ok(&mut self.data)
    }

    fn readable(&self, len: usize) -> Result<&[u8]> {
        if self.mode != Mode::Read {
            return Err(Error::InvalidState("buffer is not in read mode"));
        }

        let remaining = self.data.len() - self.cursor;
        if remaining < len {
            return Err(Error::Corruption(format!(
                "record truncated: needed {} bytes, {} available",
                len, remaining
            )));
        }

        Ok(&self.data[self.cursor..])
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Buffer {{ mode: {:?}, pending: {} }}",
            self.mode,
            self.transferable_data()
        )
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Mode {
    Write,
    Read,
}
