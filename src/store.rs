//! The public store facade.

use log::{debug, trace};

use crate::buffer::Buffer;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::files::FileManager;
use crate::index::ItemManager;
use crate::record::{DataRange, Description, StoreId};
use crate::space::LocationManager;

type EncodeFn<V> = Box<dyn Fn(&V, &mut Buffer) -> Result<()>>;
type DecodeFn<V> = Box<dyn Fn(&mut Buffer) -> Result<V>>;

/// An item handed out by the store: the identifier and the value it maps
/// to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item<V> {
    id: StoreId,
    value: V,
}

impl<V> Item<V> {
    /// Returns the identifier of the item.
    pub fn id(&self) -> StoreId {
        self.id
    }

    /// Returns a reference to the value of the item.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the item and returns its value.
    pub fn into_value(self) -> V {
        self.value
    }
}

/// A persistent store of values identified by [`StoreId`]s.
///
/// The store keeps descriptions (fixed-size metadata records) in one file
/// and variable-length payloads in another, maintains an in-memory index
/// with a per-item payload cache, and reclaims the space of deleted and
/// replaced payloads for later allocations.
///
/// Values are serialized through a pair of callbacks captured at
/// construction; see [`Store::open`].
///
/// # Single-threaded use
///
/// A store must be used from a single thread. There is no internal
/// locking; the exclusive references required by the mutating methods are
/// the only enforcement.
///
/// # Durability
///
/// Every write reaches the operating system before the operation returns,
/// in a fixed order: new payload bytes before the description that points
/// at them, and a cleared description before its payload range is
/// reusable. A crash in between leaves either the old state, the new
/// state, or an unreferenced payload range that the next recovery
/// reclaims. Syncing to the disk itself happens on [`close`](Store::close).
///
/// # Examples
///
/// ```
/// use silo::{Config, Store};
///
/// # fn main() -> silo::Result<()> {
/// # let dir = tempfile::tempdir().unwrap();
/// # let base_path = dir.path();
/// let mut store = Store::open(
///     Config::new(base_path, "numbers"),
///     |value: &u64, buf| buf.put_u64(*value),
///     |buf| buf.get_u64(),
/// )?;
///
/// let item = store.store(42)?;
/// assert_eq!(store.get(item.id())?.value(), &42);
///
/// store.close()?;
/// # Ok(())
/// # }
/// ```
pub struct Store<V> {
    files: FileManager,
    locations: LocationManager,
    items: ItemManager<V>,
    buffer: Buffer,
    encode: EncodeFn<V>,
    decode: DecodeFn<V>,
    closed: bool,
}

impl<V: Clone> Store<V> {
    /// Opens the store described by the configuration, creating its
    /// directory and files on first use.
    ///
    /// The two callbacks form the value codec. `encode` appends the
    /// serialized value to the buffer; `decode` consumes exactly one value
    /// from it. The callbacks must not retain anything obtained from the
    /// buffer.
    ///
    /// Opening scans the description file, installs an index entry for
    /// every live description (payloads stay unloaded until first access)
    /// and computes the free ranges of the data file as the complement of
    /// the live ones.
    pub fn open<E, D>(config: Config, encode: E, decode: D) -> Result<Self>
    where
        E: Fn(&V, &mut Buffer) -> Result<()> + 'static,
        D: Fn(&mut Buffer) -> Result<V> + 'static,
    {
        config.validate()?;

        let mut files = FileManager::open(&config)?;
        let mut buffer = Buffer::with_capacity(config.buffer_size);
        let live = files.recover(&mut buffer)?;

        let mut locations = LocationManager::new(config.minimum_data_file_size);
        locations.recover(&live, files.total_space()?)?;

        let mut items = ItemManager::new();
        for description in live {
            if items.contains(description.id) {
                return Err(Error::Corruption(format!(
                    "id {} appears in two description slots",
                    description.id
                )));
            }

            items.insert(description, None);
        }

        debug!("opened store with {} items", items.len());

        Ok(Self {
            files,
            locations,
            items,
            buffer,
            encode: Box::new(encode),
            decode: Box::new(decode),
            closed: false,
        })
    }

    /// Stores a new value and returns the item holding its identifier.
    ///
    /// Identifiers are allocated monotonically and never reused, not even
    /// after the item is deleted.
    pub fn store(&mut self, value: V) -> Result<Item<V>> {
        self.ensure_open()?;

        let range = self.stage_and_write(&value)?;
        let description = self.files.new_description(range)?;
        self.write_description(description)?;

        self.items.insert(description, Some(value.clone()));

        trace!(
            "stored item {} in range [{}, {})",
            description.id,
            range.offset,
            range.end()
        );

        Ok(Item {
            id: description.id,
            value,
        })
    }

    /// Replaces the value of an existing item, keeping its identifier and
    /// its description slot.
    ///
    /// The new payload is written to a fresh range and the description
    /// slot is rewritten in place; only then is the previous range
    /// released.
    pub fn update(&mut self, id: StoreId, value: V) -> Result<Item<V>> {
        self.ensure_open()?;

        let old_range = self.items.location(id)?;
        let slot = self.items.slot(id)?;

        let range = self.stage_and_write(&value)?;
        let description = Description { id, slot, range };
        self.write_description(description)?;

        self.locations.release(&self.files, old_range)?;
        self.items.replace(description, Some(value.clone()))?;

        trace!(
            "updated item {} into range [{}, {})",
            id,
            range.offset,
            range.end()
        );

        Ok(Item { id, value })
    }

    /// Returns the item with the given identifier.
    ///
    /// If the payload is not cached, it is read from the data file,
    /// deserialized and cached first.
    pub fn get(&mut self, id: StoreId) -> Result<Item<V>> {
        self.ensure_open()?;

        if !self.items.is_loaded(id)? {
            let range = self.items.location(id)?;
            self.files.read_data(range, &mut self.buffer)?;
            self.buffer.switch_to_read();

            let value = (self.decode)(&mut self.buffer)?;
            self.items.set_payload(id, value)?;

            trace!("loaded item {} from range [{}, {})", id, range.offset, range.end());
        }

        let value = self.items.payload(id)?.clone();

        Ok(Item { id, value })
    }

    /// Deletes the item with the given identifier.
    ///
    /// The description slot is cleared first and becomes reusable, then
    /// the payload range is released. The identifier itself is never
    /// handed out again.
    pub fn delete(&mut self, id: StoreId) -> Result<()> {
        self.ensure_open()?;

        let range = self.items.location(id)?;
        let slot = self.items.slot(id)?;

        // An unreferenced payload range is reclaimed at the next recovery;
        // a description pointing at freed bytes would not be.
        self.files.clear_description(slot)?;
        self.files.add_empty_slot(slot);
        self.locations.release(&self.files, range)?;
        self.items.remove(id)?;

        trace!("deleted item {}", id);

        Ok(())
    }

    /// Returns whether an item with the given identifier exists.
    pub fn contains(&self, id: StoreId) -> bool {
        self.items.contains(id)
    }

    /// Returns the items accepted by the filter, loading payloads as
    /// needed.
    pub fn query<F>(&mut self, mut filter: F) -> Result<Vec<Item<V>>>
    where
        F: FnMut(StoreId, &V) -> bool,
    {
        self.ensure_open()?;

        let ids: Vec<StoreId> = self.items.ids().collect();
        let mut found = Vec::new();

        for id in ids {
            let item = self.get(id)?;

            // A rejected item is skipped, not a reason to stop.
            if filter(id, item.value()) {
                found.push(item);
            }
        }

        Ok(found)
    }

    /// Compacts the bookkeeping: truncates the description file past the
    /// highest live slot, merges adjacent free ranges and trims free tail
    /// space off the data file. Live data is never moved.
    pub fn organize(&mut self) -> Result<()> {
        self.ensure_open()?;

        self.files.trim_descriptions()?;
        self.locations.merge();
        self.locations.trim(&mut self.files)?;

        debug!(
            "organized store: {} free ranges, {} total bytes",
            self.locations.free_count(),
            self.files.total_space()?
        );

        Ok(())
    }

    /// Returns an iteration view over the live identifiers.
    pub fn ids(&self) -> impl Iterator<Item = StoreId> + '_ {
        self.items.ids()
    }

    /// Returns the current length of the data file in bytes.
    pub fn total_space(&self) -> Result<u64> {
        self.ensure_open()?;
        self.files.total_space()
    }

    /// Returns the number of free bytes in the data file.
    pub fn free_space(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.locations.free_space())
    }

    /// Returns the number of bytes occupied by live payloads.
    pub fn used_space(&self) -> Result<u64> {
        Ok(self.total_space()? - self.free_space()?)
    }

    /// Drops every cached payload. Descriptions stay; payloads are loaded
    /// again on access.
    pub fn clear_cache(&mut self) {
        self.items.clear_cache();
    }

    /// Closes the store, syncing all files. Idempotent; any further
    /// operation fails with [`Closed`](Error::Closed).
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.closed = true;
        self.files.close()?;

        debug!("closed store");

        Ok(())
    }

    fn stage_and_write(&mut self, value: &V) -> Result<DataRange> {
        self.buffer.switch_to_write();
        (self.encode)(value, &mut self.buffer)?;
        self.buffer.switch_to_read();

        let size = self.buffer.transferable_data() as u64;
        let range = self.locations.allocate(&mut self.files, size)?;
        self.files.write_data(range, &self.buffer)?;

        Ok(range)
    }

    fn write_description(&mut self, description: Description) -> Result<()> {
        self.buffer.switch_to_write();
        description.write_to(&mut self.buffer)?;
        self.buffer.switch_to_read();
        self.files.write_description(description.slot, &self.buffer)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }
}

impl<V> Drop for Store<V> {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.files.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn open_numbers(dir: &Path) -> Store<u64> {
        Store::open(
            Config::new(dir, "numbers"),
            |value: &u64, buf| buf.put_u64(*value),
            |buf| buf.get_u64(),
        )
        .unwrap()
    }

    fn open_blobs(dir: &Path) -> Store<Vec<u8>> {
        Store::open(
            Config::new(dir, "blobs"),
            |value: &Vec<u8>, buf| buf.put_bytes(value),
            |buf| {
                let len = buf.transferable_data();
                Ok(buf.get_bytes(len)?.to_vec())
            },
        )
        .unwrap()
    }

    #[test]
    fn empty_round_trip() {
        let dir = tempfile::tempdir().unwrap();

        let mut store = open_numbers(dir.path());
        let first = store.store(0x11).unwrap();
        let second = store.store(0x22).unwrap();

        assert_eq!(first.id(), StoreId(1));
        assert_eq!(second.id(), StoreId(2));
        assert_eq!(store.get(first.id()).unwrap().value(), &0x11);
        assert_eq!(store.get(second.id()).unwrap().value(), &0x22);

        store.close().unwrap();
        drop(store);

        let mut store = open_numbers(dir.path());
        assert_eq!(store.get(StoreId(1)).unwrap().value(), &0x11);
        assert_eq!(store.get(StoreId(2)).unwrap().value(), &0x22);
    }

    #[test]
    fn delete_reclaims_space() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_numbers(dir.path());

        let first = store.store(0x11).unwrap();
        let second = store.store(0x22).unwrap();

        let first_offset = store.items.location(first.id()).unwrap().offset;

        store.delete(first.id()).unwrap();
        assert!(store.free_space().unwrap() >= 8);

        // First-fit lands the new payload on the freed range.
        let third = store.store(0x33).unwrap();
        assert_eq!(third.id(), StoreId(3));
        assert_eq!(
            store.items.location(third.id()).unwrap().offset,
            first_offset
        );

        assert_eq!(store.get(second.id()).unwrap().value(), &0x22);
        assert_eq!(store.get(third.id()).unwrap().value(), &0x33);
    }

    #[test]
    fn update_grows_into_a_new_range() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_blobs(dir.path());

        let item = store.store(vec![0xaa; 4]).unwrap();
        let old_range = store.items.location(item.id()).unwrap();
        let old_slot = store.items.slot(item.id()).unwrap();

        store.update(item.id(), vec![0xbb; 12]).unwrap();

        // The old range is free again, the slot stayed put and the
        // description points at the new payload.
        assert!(store.locations.free_ranges().contains(&old_range));
        assert_eq!(store.items.slot(item.id()).unwrap(), old_slot);

        let new_range = store.items.location(item.id()).unwrap();
        assert_eq!(new_range.length, 12);
        assert_ne!(new_range.offset, old_range.offset);

        assert_eq!(store.get(item.id()).unwrap().value(), &vec![0xbb; 12]);
    }

    #[test]
    fn update_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let mut store = open_blobs(dir.path());
        let item = store.store(vec![1, 2, 3]).unwrap();
        store.update(item.id(), vec![4, 5, 6, 7]).unwrap();
        store.close().unwrap();
        drop(store);

        let mut store = open_blobs(dir.path());
        assert_eq!(store.get(item.id()).unwrap().value(), &vec![4, 5, 6, 7]);
    }

    #[test]
    fn recovery_skips_cleared_slots() {
        let dir = tempfile::tempdir().unwrap();

        let mut store = open_numbers(dir.path());
        let first = store.store(1).unwrap();
        let second = store.store(2).unwrap();
        let third = store.store(3).unwrap();

        store.delete(second.id()).unwrap();
        store.close().unwrap();
        drop(store);

        let mut store = open_numbers(dir.path());
        assert!(store.contains(first.id()));
        assert!(!store.contains(second.id()));
        assert!(store.contains(third.id()));

        assert_eq!(store.get(first.id()).unwrap().value(), &1);
        assert_eq!(store.get(third.id()).unwrap().value(), &3);
    }

    #[test]
    fn organize_trims_the_tail() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_numbers(dir.path());

        let _first = store.store(0x11).unwrap();
        let second = store.store(0x22).unwrap();

        let before = store.total_space().unwrap();
        store.delete(second.id()).unwrap();
        store.organize().unwrap();

        let after = store.total_space().unwrap();
        assert!(before - after >= 8);

        // Accounting still holds after the truncation.
        assert_eq!(
            store.used_space().unwrap() + store.free_space().unwrap(),
            store.total_space().unwrap()
        );
    }

    #[test]
    fn ids_grow_across_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let mut store = open_numbers(dir.path());
        let first = store.store(0x11).unwrap();
        store.delete(first.id()).unwrap();
        store.close().unwrap();
        drop(store);

        let mut store = open_numbers(dir.path());
        let second = store.store(0x22).unwrap();
        assert!(second.id() > first.id());
    }

    #[test]
    fn space_accounting() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_numbers(dir.path());

        for value in 0..10 {
            store.store(value).unwrap();
        }
        store.delete(StoreId(4)).unwrap();
        store.delete(StoreId(7)).unwrap();

        assert_eq!(
            store.used_space().unwrap() + store.free_space().unwrap(),
            store.total_space().unwrap()
        );
        assert_eq!(store.used_space().unwrap(), 8 * 8);
    }

    #[test]
    fn get_of_deleted_item_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_numbers(dir.path());

        let item = store.store(0x11).unwrap();
        store.delete(item.id()).unwrap();

        assert!(!store.contains(item.id()));
        assert!(matches!(
            store.get(item.id()),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.delete(item.id()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn update_of_unknown_id_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_numbers(dir.path());

        let result = store.update(StoreId(9), 0x11);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn closed_store_rejects_operations() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_numbers(dir.path());

        let item = store.store(0x11).unwrap();
        store.close().unwrap();

        assert!(matches!(store.store(0x22), Err(Error::Closed)));
        assert!(matches!(store.get(item.id()), Err(Error::Closed)));
        assert!(matches!(store.delete(item.id()), Err(Error::Closed)));
        assert!(matches!(store.organize(), Err(Error::Closed)));
        assert!(matches!(store.total_space(), Err(Error::Closed)));

        // Closing twice is fine.
        store.close().unwrap();
    }

    #[test]
    fn clear_cache_reloads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_numbers(dir.path());

        let item = store.store(0x77).unwrap();
        store.clear_cache();

        assert_eq!(store.get(item.id()).unwrap().value(), &0x77);
    }

    #[test]
    fn query_filters_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_numbers(dir.path());

        for value in 1..=5u64 {
            store.store(value).unwrap();
        }

        let mut odd = store.query(|_, value| value % 2 == 1).unwrap();
        odd.sort_by_key(|item| item.id());

        // The rejected even items do not stop the iteration.
        let values: Vec<u64> = odd.iter().map(|item| *item.value()).collect();
        assert_eq!(values, vec![1, 3, 5]);
    }
}
