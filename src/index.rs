//! The in-memory index mapping identifiers to descriptions and cached
//! payloads.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::record::{DataRange, Description, StoreId};

/// One indexed item: its description and, when loaded, the deserialized
/// payload.
pub(crate) struct CacheEntry<V> {
    pub description: Description,
    pub payload: Option<V>,
}

/// The index of all live items.
///
/// The index is the single owner of descriptions in memory; only the store
/// mutates it. Payloads are populated lazily and can be dropped wholesale
/// without touching the descriptions.
pub(crate) struct ItemManager<V> {
    entries: HashMap<StoreId, CacheEntry<V>>,
}

impl<V> ItemManager<V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Installs an entry for a freshly recovered or stored item.
    pub fn insert(&mut self, description: Description, payload: Option<V>) {
        self.entries
            .insert(description.id, CacheEntry { description, payload });
    }

    /// Replaces the entry of an existing item with a new description and
    /// payload.
    pub fn replace(&mut self, description: Description, payload: Option<V>) -> Result<()> {
        let entry = self.entry_mut(description.id)?;
        *entry = CacheEntry { description, payload };
        Ok(())
    }

    /// Sets the cached payload of an item, preserving its description.
    pub fn set_payload(&mut self, id: StoreId, payload: V) -> Result<()> {
        self.entry_mut(id)?.payload = Some(payload);
        Ok(())
    }

    /// Returns the cached payload of an item.
    ///
    /// An item whose payload has not been loaded fails with
    /// [`NotLoaded`](Error::NotLoaded), not with
    /// [`NotFound`](Error::NotFound); the store is expected to load it.
    pub fn payload(&self, id: StoreId) -> Result<&V> {
        self.entry(id)?
            .payload
            .as_ref()
            .ok_or(Error::NotLoaded(id))
    }

    /// Returns whether the item's payload is cached.
    pub fn is_loaded(&self, id: StoreId) -> Result<bool> {
        Ok(self.entry(id)?.payload.is_some())
    }

    /// Removes the item and returns its entry.
    pub fn remove(&mut self, id: StoreId) -> Result<CacheEntry<V>> {
        self.entries.remove(&id).ok_or(Error::NotFound(id))
    }

    pub fn contains(&self, id: StoreId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Returns the data range holding the item's payload.
    pub fn location(&self, id: StoreId) -> Result<DataRange> {
        Ok(self.entry(id)?.description.range)
    }

    /// Returns the index of the item's description slot.
    pub fn slot(&self, id: StoreId) -> Result<u64> {
        Ok(self.entry(id)?.description.slot)
    }

    /// Drops every cached payload, keeping the descriptions.
    pub fn clear_cache(&mut self) {
        for entry in self.entries.values_mut() {
            entry.payload = None;
        }
    }

    /// Returns an iteration view over the live identifiers.
    pub fn ids(&self) -> impl Iterator<Item = StoreId> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn entry(&self, id: StoreId) -> Result<&CacheEntry<V>> {
        self.entries.get(&id).ok_or(Error::NotFound(id))
    }

    fn entry_mut(&mut self, id: StoreId) -> Result<&mut CacheEntry<V>> {
        self.entries.get_mut(&id).ok_or(Error::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description(id: u64, slot: u64, offset: u64, length: u64) -> Description {
        Description {
            id: StoreId(id),
            slot,
            range: DataRange { offset, length },
        }
    }

    #[test]
    fn lookup_distinguishes_missing_and_unloaded() {
        let mut items = ItemManager::new();
        items.insert(description(1, 0, 0, 8), None::<u32>);

        assert!(matches!(items.payload(StoreId(2)), Err(Error::NotFound(_))));
        assert!(matches!(
            items.payload(StoreId(1)),
            Err(Error::NotLoaded(_))
        ));

        items.set_payload(StoreId(1), 7).unwrap();
        assert_eq!(items.payload(StoreId(1)).unwrap(), &7);
    }

    #[test]
    fn replace_swaps_description_and_payload() {
        let mut items = ItemManager::new();
        items.insert(description(1, 0, 0, 8), Some(7));

        items.replace(description(1, 0, 32, 16), Some(9)).unwrap();

        assert_eq!(
            items.location(StoreId(1)).unwrap(),
            DataRange {
                offset: 32,
                length: 16
            }
        );
        assert_eq!(items.payload(StoreId(1)).unwrap(), &9);
    }

    #[test]
    fn clear_cache_keeps_descriptions() {
        let mut items = ItemManager::new();
        items.insert(description(1, 0, 0, 8), Some(7));
        items.insert(description(2, 1, 8, 8), Some(9));

        items.clear_cache();

        assert!(items.contains(StoreId(1)));
        assert_eq!(items.location(StoreId(2)).unwrap().offset, 8);
        assert!(matches!(
            items.payload(StoreId(1)),
            Err(Error::NotLoaded(_))
        ));
    }

    #[test]
    fn remove_returns_the_entry() {
        let mut items = ItemManager::new();
        items.insert(description(1, 3, 16, 8), Some(7));

        let entry = items.remove(StoreId(1)).unwrap();
        assert_eq!(entry.description.slot, 3);
        assert!(!items.contains(StoreId(1)));

        assert!(matches!(items.remove(StoreId(1)), Err(Error::NotFound(_))));
    }
}
