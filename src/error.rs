use std::io;

use thiserror::Error;

use crate::record::StoreId;

/// The error type for all store operations.
///
/// I/O errors from the filesystem are propagated unchanged in the
/// [`Io`](Error::Io) variant. [`Corruption`](Error::Corruption) indicates
/// that an on-disk invariant does not hold, either because the files were
/// tampered with or because of a bug; a store that reports it should be
/// closed and reopened so that recovery can restore consistency.
#[derive(Debug, Error)]
pub enum Error {
    /// There is no item with the given identifier.
    #[error("no item with id {0}")]
    NotFound(StoreId),

    /// The item exists but its payload is not cached.
    ///
    /// This is reported by the in-memory index only. The store resolves it
    /// internally by loading the payload from the data file, so callers of
    /// the public API never observe it.
    #[error("item {0} has no cached payload")]
    NotLoaded(StoreId),

    /// The operation was called on a closed store.
    #[error("store is closed")]
    Closed,

    /// An argument is outside of the accepted domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The operation is not available in the current buffer mode.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// An error from the underlying filesystem.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// An on-disk invariant does not hold.
    #[error("corruption: {0}")]
    Corruption(String),
}

/// A specialized result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;
