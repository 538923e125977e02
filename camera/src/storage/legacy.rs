use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{check_display_name, EntryRequest, Locator, PlatformStorage, StorageError, WriteChannel};

/// Flat-directory storage for platforms without collections or a pending
/// state. Entries are visible from the moment they are allocated.
pub struct LegacyStorage {
    root: PathBuf,
}

impl LegacyStorage {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn path(&self, locator: &Locator) -> Result<PathBuf, StorageError> {
        check_display_name(locator.as_str())
            .map_err(|_| StorageError::UnknownLocator(locator.clone()))?;
        Ok(self.root.join(locator.as_str()))
    }
}

impl PlatformStorage for LegacyStorage {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn allocate(&self, request: &EntryRequest) -> Result<Locator, StorageError> {
        check_display_name(&request.display_name)?;
        if let Some(collection) = &request.collection {
            debug!(collection, "collection hint not supported by legacy storage, ignoring");
        }
        let path = self.root.join(&request.display_name);
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    StorageError::AlreadyExists(request.display_name.clone())
                }
                _ => StorageError::Create {
                    name: request.display_name.clone(),
                    source,
                },
            })?;
        let locator = Locator::new(request.display_name.clone());
        debug!(%locator, mime = request.mime_type, "allocated entry");
        Ok(locator)
    }

    fn open_for_write(&self, locator: &Locator) -> Result<WriteChannel, StorageError> {
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(self.path(locator)?)
            .map_err(|source| StorageError::Open {
                locator: locator.clone(),
                source,
            })?;
        Ok(Box::new(file))
    }

    fn finalize(&self, locator: &Locator) -> Result<(), StorageError> {
        // Already visible; just make sure the bytes are durable.
        fs::File::open(self.path(locator)?)
            .and_then(|f| f.sync_all())
            .map_err(|source| StorageError::Finalize {
                locator: locator.clone(),
                source,
            })
    }

    fn read(&self, locator: &Locator) -> Result<Vec<u8>, StorageError> {
        fs::read(self.path(locator)?).map_err(|source| StorageError::Read {
            locator: locator.clone(),
            source,
        })
    }
}
