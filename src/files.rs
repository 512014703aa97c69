//! Bytes on disk: the description, data and id counter files.
//!
//! All I/O goes through unbuffered [`std::fs::File`] handles, so every
//! write reaches the operating system in issue order before the call
//! returns. That is the only durability level the store promises per
//! operation; [`FileManager::close`] additionally syncs all three files.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::buffer::Buffer;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::record::{DataRange, Description, StoreId, SLOT_SIZE};

/// The first identifier ever allocated by a fresh store.
const FIRST_ID: u64 = 1;

/// Owner of the three store files.
///
/// The description file is an array of fixed-size slots addressed by slot
/// index, the data file holds raw payload bytes addressed by byte ranges,
/// and the id file holds the big-endian counter of the next identifier to
/// allocate. Slot indices of cleared descriptions are kept in an internal
/// free list and reused; identifiers never are.
pub(crate) struct FileManager {
    descriptions: File,
    data: File,
    ids: File,
    free_slots: Vec<u64>,
    slots: u64,
}

impl FileManager {
    /// Opens or creates the store files under `base_path/store_name/`.
    pub fn open(config: &Config) -> Result<Self> {
        fs::create_dir_all(config.directory())?;

        let descriptions = open_file(config, &config.description_suffix)?;
        let data = open_file(config, &config.data_suffix)?;
        let mut ids = open_file(config, &config.id_suffix)?;

        // A fresh id file starts counting at one.
        if ids.metadata()?.len() == 0 {
            ids.write_u64::<BigEndian>(FIRST_ID)?;
        }

        let description_len = descriptions.metadata()?.len();
        if description_len % SLOT_SIZE != 0 {
            return Err(Error::Corruption(format!(
                "description file length {} is not a multiple of the slot size {}",
                description_len, SLOT_SIZE
            )));
        }

        Ok(Self {
            descriptions,
            data,
            ids,
            free_slots: Vec::new(),
            slots: description_len / SLOT_SIZE,
        })
    }

    /// Scans the description file in slot order and returns every live
    /// description. Cleared slots go to the internal free list.
    pub fn recover(&mut self, buf: &mut Buffer) -> Result<Vec<Description>> {
        let next_id = self.peek_next_id()?;
        let mut live = Vec::new();

        self.descriptions.seek(SeekFrom::Start(0))?;

        for slot in 0..self.slots {
            buf.switch_to_write();
            buf.fill_from(&mut self.descriptions, SLOT_SIZE as usize)?;
            buf.switch_to_read();

            match Description::read_from(slot, buf)? {
                Some(description) => {
                    // The counter must stay strictly above every id ever
                    // handed out.
                    if description.id.0 >= next_id {
                        return Err(Error::Corruption(format!(
                            "live id {} is not below the id counter {}",
                            description.id, next_id
                        )));
                    }

                    live.push(description);
                }
                None => self.free_slots.push(slot),
            }
        }

        debug!(
            "recovered {} live descriptions, {} free slots",
            live.len(),
            self.free_slots.len()
        );

        Ok(live)
    }

    /// Allocates a fresh identifier and a description slot for a payload
    /// at the given range.
    ///
    /// The id counter is bumped and persisted before the description
    /// referencing the id is ever written. A crash in between leaks the id,
    /// which is fine; reusing one would not be.
    pub fn new_description(&mut self, range: DataRange) -> Result<Description> {
        let id = self.next_id()?;

        let slot = match self.free_slots.pop() {
            Some(slot) => slot,
            None => {
                let slot = self.slots;
                self.slots += 1;
                slot
            }
        };

        Ok(Description { id, slot, range })
    }

    /// Writes exactly one slot's worth of pending bytes at the slot's
    /// position.
    pub fn write_description(&mut self, slot: u64, buf: &Buffer) -> Result<()> {
        let pending = buf.pending()?;

        if pending.len() as u64 != SLOT_SIZE {
            return Err(Error::Corruption(format!(
                "description record has {} bytes instead of {}",
                pending.len(),
                SLOT_SIZE
            )));
        }

        self.descriptions.seek(SeekFrom::Start(slot * SLOT_SIZE))?;
        self.descriptions.write_all(pending)?;

        Ok(())
    }

    /// Overwrites the live flag of the slot with zero. The rest of the
    /// slot remains stale.
    pub fn clear_description(&mut self, slot: u64) -> Result<()> {
        self.descriptions.seek(SeekFrom::Start(slot * SLOT_SIZE))?;
        self.descriptions.write_all(&[0])?;
        Ok(())
    }

    /// Records the slot index as reusable.
    pub fn add_empty_slot(&mut self, slot: u64) {
        self.free_slots.push(slot);
    }

    /// Reads `range.length` bytes at `range.offset` from the data file
    /// into the buffer. The buffer is switched to write mode; the caller
    /// flips it to read mode for consumption.
    pub fn read_data(&mut self, range: DataRange, buf: &mut Buffer) -> Result<()> {
        buf.switch_to_write();
        self.data.seek(SeekFrom::Start(range.offset))?;
        buf.fill_from(&mut self.data, range.length as usize)?;
        Ok(())
    }

    /// Writes the buffer's pending bytes at `range.offset` into the data
    /// file. The pending count must equal the range length.
    pub fn write_data(&mut self, range: DataRange, buf: &Buffer) -> Result<()> {
        let pending = buf.pending()?;

        if pending.len() as u64 != range.length {
            return Err(Error::Corruption(format!(
                "payload of {} bytes does not fit range of {} bytes",
                pending.len(),
                range.length
            )));
        }

        self.data.seek(SeekFrom::Start(range.offset))?;
        self.data.write_all(pending)?;

        Ok(())
    }

    /// Truncates the description file right past the highest live slot and
    /// drops the now out-of-range indices from the free list.
    pub fn trim_descriptions(&mut self) -> Result<()> {
        let free: HashSet<u64> = self.free_slots.iter().copied().collect();

        while self.slots > 0 && free.contains(&(self.slots - 1)) {
            self.slots -= 1;
        }

        let slots = self.slots;
        self.free_slots.retain(|&slot| slot < slots);
        self.descriptions.set_len(self.slots * SLOT_SIZE)?;

        Ok(())
    }

    /// Returns the current length of the data file.
    pub fn total_space(&self) -> Result<u64> {
        Ok(self.data.metadata()?.len())
    }

    /// Sets the length of the data file. Growing pads with zeros.
    pub fn set_data_len(&mut self, len: u64) -> Result<()> {
        self.data.set_len(len)?;
        Ok(())
    }

    /// Flushes all three files to persistent storage.
    pub fn close(&mut self) -> Result<()> {
        self.descriptions.sync_all()?;
        self.data.sync_all()?;
        self.ids.sync_all()?;
        Ok(())
    }

    fn next_id(&mut self) -> Result<StoreId> {
        let id = self.peek_next_id()?;

        self.ids.seek(SeekFrom::Start(0))?;
        self.ids.write_u64::<BigEndian>(id + 1)?;

        Ok(StoreId(id))
    }

    fn peek_next_id(&mut self) -> Result<u64> {
        self.ids.seek(SeekFrom::Start(0))?;
        Ok(self.ids.read_u64::<BigEndian>()?)
    }

    #[cfg(test)]
    pub fn free_slot_count(&self) -> usize {
        self.free_slots.len()
    }
}

fn open_file(config: &Config, suffix: &str) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(config.file_path(suffix))?;

    Ok(file)
}
