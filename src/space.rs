//! Free-space management of the data file.

use std::collections::BTreeMap;

use log::debug;

use crate::error::{Error, Result};
use crate::files::FileManager;
use crate::record::{DataRange, Description};

/// Manager of the free byte ranges in the data file.
///
/// The free set is kept as a map from range offset to range length, so both
/// first-fit allocation and merging walk the ranges in offset order. The
/// set is always pairwise disjoint; adjacent ranges are tolerated between
/// calls to [`merge`](LocationManager::merge).
pub(crate) struct LocationManager {
    free: BTreeMap<u64, u64>,
    minimum_growth: u64,
}

impl LocationManager {
    pub fn new(minimum_growth: u64) -> Self {
        Self {
            free: BTreeMap::new(),
            minimum_growth,
        }
    }

    /// Computes the initial free set as the complement of the live ranges
    /// in `[0, total)`. Called exactly once, right after file recovery.
    pub fn recover(&mut self, live: &[Description], total: u64) -> Result<()> {
        let mut ranges: Vec<DataRange> = live.iter().map(|description| description.range).collect();
        ranges.sort_by_key(|range| range.offset);

        let mut cursor = 0;

        for range in ranges {
            if range.offset < cursor {
                return Err(Error::Corruption(format!(
                    "live ranges overlap at offset {}",
                    range.offset
                )));
            }

            if range.end() > total {
                return Err(Error::Corruption(format!(
                    "live range [{}, {}) exceeds the data file length {}",
                    range.offset,
                    range.end(),
                    total
                )));
            }

            if range.offset > cursor {
                self.free.insert(cursor, range.offset - cursor);
            }

            cursor = range.end();
        }

        if cursor < total {
            self.free.insert(cursor, total - cursor);
        }

        debug!(
            "computed {} free ranges holding {} bytes",
            self.free.len(),
            self.free_space()
        );

        Ok(())
    }

    /// Returns a free range of exactly `size` bytes, carved off the front
    /// of the lowest-offset free range that can hold it (first-fit; the
    /// remainder stays free). If no range fits, the data file grows by
    /// `max(size, minimum_growth)` and the new tail satisfies the request.
    pub fn allocate(&mut self, files: &mut FileManager, size: u64) -> Result<DataRange> {
        if size == 0 {
            return Err(Error::InvalidArgument("cannot allocate zero bytes"));
        }

        loop {
            let found = self
                .free
                .iter()
                .find(|(_, &length)| length >= size)
                .map(|(&offset, &length)| (offset, length));

            match found {
                Some((offset, length)) => {
                    self.free.remove(&offset);

                    if length > size {
                        self.free.insert(offset + size, length - size);
                    }

                    return Ok(DataRange {
                        offset,
                        length: size,
                    });
                }
                None => {
                    let total = files.total_space()?;
                    let growth = size.max(self.minimum_growth);

                    debug!("growing data file from {} by {} bytes", total, growth);

                    files.set_data_len(total + growth)?;
                    // The new tail may touch an existing free range; that
                    // is tolerated until the next merge.
                    self.free.insert(total, growth);
                }
            }
        }
    }

    /// Adds the range to the free set without merging.
    pub fn release(&mut self, files: &FileManager, range: DataRange) -> Result<()> {
        if range.length == 0 {
            return Err(Error::InvalidArgument("cannot release an empty range"));
        }

        if range.end() > files.total_space()? {
            return Err(Error::Corruption(format!(
                "released range [{}, {}) exceeds the data file length",
                range.offset,
                range.end()
            )));
        }

        // The predecessor (which includes an exact duplicate offset) must
        // end at or before the new range; the successor must start at or
        // after its end.
        let predecessor = self.free.range(..=range.offset).next_back();
        if let Some((&offset, &length)) = predecessor {
            if offset + length > range.offset {
                return Err(overlap(range));
            }
        }

        let successor = self.free.range(range.offset..).next();
        if let Some((&offset, _)) = successor {
            if offset < range.end() {
                return Err(overlap(range));
            }
        }

        self.free.insert(range.offset, range.length);

        Ok(())
    }

    /// Coalesces every pair of free ranges where one ends exactly where
    /// the other begins.
    pub fn merge(&mut self) {
        let mut merged = BTreeMap::new();
        let mut current: Option<(u64, u64)> = None;

        for (&offset, &length) in &self.free {
            current = match current {
                Some((start, run)) if start + run == offset => Some((start, run + length)),
                Some((start, run)) => {
                    merged.insert(start, run);
                    Some((offset, length))
                }
                None => Some((offset, length)),
            };
        }

        if let Some((start, run)) = current {
            merged.insert(start, run);
        }

        self.free = merged;
    }

    /// Removes the highest free range from the set and truncates the data
    /// file by its length, provided the range touches the end of the file.
    /// Call after [`merge`](LocationManager::merge) so the tail range is
    /// maximal.
    pub fn trim(&mut self, files: &mut FileManager) -> Result<()> {
        let last = self
            .free
            .iter()
            .next_back()
            .map(|(&offset, &length)| (offset, length));

        if let Some((offset, length)) = last {
            if offset + length == files.total_space()? {
                self.free.remove(&offset);
                files.set_data_len(offset)?;
                debug!("trimmed {} bytes off the data file tail", length);
            }
        }

        Ok(())
    }

    /// Returns the total number of free bytes.
    pub fn free_space(&self) -> u64 {
        self.free.values().sum()
    }

    /// Returns the number of free ranges.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    #[cfg(test)]
    pub fn free_ranges(&self) -> Vec<DataRange> {
        self.free
            .iter()
            .map(|(&offset, &length)| DataRange { offset, length })
            .collect()
    }
}

fn overlap(range: DataRange) -> Error {
    Error::Corruption(format!(
        "released range [{}, {}) overlaps a free range",
        range.offset,
        range.end()
    ))
}
