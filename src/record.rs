//! Value types shared across the store: identifiers, byte ranges and the
//! fixed-size description record.

use std::fmt;

use crate::buffer::Buffer;
use crate::error::Result;

/// The size of one description slot on disk: a live flag, the identifier
/// and the data range, all fixed-width.
pub(crate) const SLOT_SIZE: u64 = 1 + 8 + 8 + 8;

const LIVE: u8 = 1;
const CLEARED: u8 = 0;

/// The identifier of a stored item.
///
/// Identifiers are 64-bit, allocated monotonically and never reused, not
/// even after the item that held one is deleted. They stay valid across
/// closing and reopening the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(pub(crate) u64);

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A half-open byte range `[offset, offset + length)` in the data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRange {
    /// The first byte of the range.
    pub offset: u64,
    /// The number of bytes in the range.
    pub length: u64,
}

impl DataRange {
    /// Returns the first byte past the range.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// The metadata record of one live item: its identifier, the index of its
/// description slot and the data range holding its payload.
///
/// On disk, the slot index is positional and only the live flag, the
/// identifier and the range are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Description {
    pub(crate) id: StoreId,
    pub(crate) slot: u64,
    pub(crate) range: DataRange,
}

impl Description {
    /// Encodes the record as one slot's worth of bytes into the buffer.
    pub(crate) fn write_to(&self, buf: &mut Buffer) -> Result<()> {
        buf.put_u8(LIVE)?;
        buf.put_u64(self.id.0)?;
        buf.put_u64(self.range.offset)?;
        buf.put_u64(self.range.length)?;
        Ok(())
    }

    /// Decodes one slot's worth of bytes from the buffer. Returns `None`
    /// for a cleared slot, whose remaining bytes are stale and are not
    /// inspected.
    pub(crate) fn read_from(slot: u64, buf: &mut Buffer) -> Result<Option<Self>> {
        if buf.get_u8()? == CLEARED {
            return Ok(None);
        }

        let id = StoreId(buf.get_u64()?);
        let offset = buf.get_u64()?;
        let length = buf.get_u64()?;

        Ok(Some(Self {
            id,
            slot,
            range: DataRange { offset, length },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_encoding() {
        let description = Description {
            id: StoreId(42),
            slot: 3,
            range: DataRange {
                offset: 1024,
                length: 17,
            },
        };

        let mut buf = Buffer::with_capacity(32);
        description.write_to(&mut buf).unwrap();
        assert_eq!(buf.transferable_data() as u64, SLOT_SIZE);

        buf.switch_to_read();
        let decoded = Description::read_from(3, &mut buf).unwrap().unwrap();
        assert_eq!(decoded, description);
    }

    #[test]
    fn cleared_slot() {
        let mut buf = Buffer::with_capacity(32);
        // A cleared slot has the flag zeroed and the rest stale.
        buf.put_u8(0).unwrap();
        buf.put_bytes(&[0xff; 24]).unwrap();

        buf.switch_to_read();
        assert_eq!(Description::read_from(0, &mut buf).unwrap(), None);
    }
}
