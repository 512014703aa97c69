//! An embedded, single-process, persistent object store backed by plain
//! files.
//!
//! In short, *silo* maps opaque numeric identifiers to values of a
//! user-chosen type, serialized to variable-length byte payloads. Items
//! can be stored, retrieved, updated, deleted and queried; they survive
//! restarts in a small set of on-disk files, and an in-memory index with a
//! per-item payload cache keeps reads cheap.
//!
//! # Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! silo = "0.1"
//! ```
//!
//! Then open a [`Store`](crate::Store) with a [`Config`](crate::Config)
//! and a pair of serialization callbacks:
//!
//! ```
//! use silo::{Config, Store};
//!
//! # fn main() -> silo::Result<()> {
//! # let dir = tempfile::tempdir().unwrap();
//! # let base_path = dir.path();
//! let mut store = Store::open(
//!     Config::new(base_path, "greetings"),
//!     |value: &String, buf| buf.put_bytes(value.as_bytes()),
//!     |buf| {
//!         let len = buf.transferable_data();
//!         let bytes = buf.get_bytes(len)?.to_vec();
//!         Ok(String::from_utf8_lossy(&bytes).into_owned())
//!     },
//! )?;
//!
//! let item = store.store("hello".to_owned())?;
//! assert_eq!(store.get(item.id())?.value(), "hello");
//!
//! store.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! # On-disk layout
//!
//! A store named `things` under a base path `/data` occupies the
//! directory `/data/things/` with three files:
//!
//! * `things.def` — an array of fixed-size description records, one per
//!   item, holding a live flag, the identifier and the position of the
//!   payload,
//! * `things.daf` — the raw payload bytes,
//! * `things.id` — the big-endian counter of the next identifier.
//!
//! Deleting an item clears its description and hands the payload bytes
//! back to the free-space bookkeeping for later allocations; the file
//! shrinks only when [`organize`](crate::Store::organize) finds free space
//! at its tail. All multi-byte values on disk are big-endian.
//!
//! # Concurrency
//!
//! A store is strictly single-threaded. There is no internal locking and
//! no crash-atomicity beyond the documented write ordering; see the
//! [`Store`](crate::Store) documentation.
//!
//! # Errors
//!
//! All fallible operations return [`Result`](crate::Result). I/O errors
//! are propagated from the filesystem unchanged; detected violations of
//! the on-disk format are reported as
//! [`Corruption`](crate::Error::Corruption).
//!
//! # Name
//!
//! A [silo](https://en.wikipedia.org/wiki/Silo) is a farm structure that
//! keeps grain safe between harvest and use. So the metaphor is obvious:
//! *silo* will keep your items safe between the runs of your program,
//! stacked in files instead of towers.

#![doc(html_root_url = "https://docs.rs/silo/0.1.0")]
#![deny(missing_docs)]

mod buffer;
mod config;
mod error;
mod files;
mod index;
mod record;
mod space;
mod store;

pub use buffer::Buffer;
pub use config::{
    Config, DEFAULT_BUFFER_SIZE, DEFAULT_DATA_SUFFIX, DEFAULT_DESCRIPTION_SUFFIX, DEFAULT_ID_SUFFIX,
    DEFAULT_MINIMUM_DATA_FILE_SIZE,
};
pub use error::{Error, Result};
pub use record::StoreId;
pub use store::{Item, Store};
