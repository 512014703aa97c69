//! Store configuration and path assembly.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// The default extension of the data file.
pub const DEFAULT_DATA_SUFFIX: &str = "daf";

/// The default extension of the description file.
pub const DEFAULT_DESCRIPTION_SUFFIX: &str = "def";

/// The default extension of the id counter file.
pub const DEFAULT_ID_SUFFIX: &str = "id";

/// The default initial capacity of the staging buffer. Currently, it is
/// 512 bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 512;

/// The default minimum growth step of the data file. Currently, it is
/// 1 KiB.
pub const DEFAULT_MINIMUM_DATA_FILE_SIZE: u64 = 1024;

/// Configuration of a [`Store`](crate::Store).
///
/// Only the base path and the store name are required; everything else has
/// a default. The store creates the directory `base_path/store_name/` and
/// keeps its three files in it, each named `store_name.<suffix>`.
///
/// # Examples
///
/// ```no_run
/// use silo::Config;
///
/// let config = Config::new("/var/lib/myapp", "articles")
///     .buffer_size(4096)
///     .minimum_data_file_size(64 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) base_path: PathBuf,
    pub(crate) store_name: String,
    pub(crate) data_suffix: String,
    pub(crate) description_suffix: String,
    pub(crate) id_suffix: String,
    pub(crate) buffer_size: usize,
    pub(crate) minimum_data_file_size: u64,
}

impl Config {
    /// Creates a configuration with the given base path and store name and
    /// all other options at their defaults.
    pub fn new<P: Into<PathBuf>, S: Into<String>>(base_path: P, store_name: S) -> Self {
        Self {
            base_path: base_path.into(),
            store_name: store_name.into(),
            data_suffix: DEFAULT_DATA_SUFFIX.to_owned(),
            description_suffix: DEFAULT_DESCRIPTION_SUFFIX.to_owned(),
            id_suffix: DEFAULT_ID_SUFFIX.to_owned(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            minimum_data_file_size: DEFAULT_MINIMUM_DATA_FILE_SIZE,
        }
    }

    /// Sets the extension of the data file.
    pub fn data_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.data_suffix = suffix.into();
        self
    }

    /// Sets the extension of the description file.
    pub fn description_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.description_suffix = suffix.into();
        self
    }

    /// Sets the extension of the id counter file.
    pub fn id_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.id_suffix = suffix.into();
        self
    }

    /// Sets the initial capacity of the staging buffer.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Sets the minimum growth step of the data file.
    pub fn minimum_data_file_size(mut self, size: u64) -> Self {
        self.minimum_data_file_size = size;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.store_name.is_empty() {
            return Err(Error::InvalidArgument("store name must not be empty"));
        }

        if self.data_suffix.is_empty()
            || self.description_suffix.is_empty()
            || self.id_suffix.is_empty()
        {
            return Err(Error::InvalidArgument("file suffix must not be empty"));
        }

        if self.buffer_size == 0 {
            return Err(Error::InvalidArgument("buffer size must be positive"));
        }

        if self.minimum_data_file_size == 0 {
            return Err(Error::InvalidArgument(
                "minimum data file size must be positive",
            ));
        }

        Ok(())
    }

    pub(crate) fn directory(&self) -> PathBuf {
        self.base_path.join(&self.store_name)
    }

    pub(crate) fn file_path(&self, suffix: &str) -> PathBuf {
        let mut path = self.directory();
        path.push(format!("{}.{}", self.store_name, suffix));
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::new("/tmp", "things");

        assert_eq!(config.data_suffix, DEFAULT_DATA_SUFFIX);
        assert_eq!(config.description_suffix, DEFAULT_DESCRIPTION_SUFFIX);
        assert_eq!(config.id_suffix, DEFAULT_ID_SUFFIX);
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(config.minimum_data_file_size, DEFAULT_MINIMUM_DATA_FILE_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_strings() {
        let config = Config::new("/tmp", "");
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidArgument(_))
        ));

        let config = Config::new("/tmp", "things").data_suffix("");
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_zero_sizes() {
        let config = Config::new("/tmp", "things").buffer_size(0);
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidArgument(_))
        ));

        let config = Config::new("/tmp", "things").minimum_data_file_size(0);
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn path_assembly() {
        let config = Config::new("/data", "things");

        assert_eq!(config.directory(), PathBuf::from("/data/things"));
        assert_eq!(
            config.file_path("daf"),
            PathBuf::from("/data/things/things.daf")
        );
    }
}
