use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{
    check_display_name, join_relative, EntryRequest, Locator, PlatformStorage, StorageError,
    WriteChannel,
};

const PENDING_PREFIX: &str = ".pending-";

/// Collection-aware storage with a pending state.
///
/// Entries live at `<root>/<collection>/<name>`. Until finalized, the bytes
/// sit in a hidden `.pending-<name>` sibling that readers never see; finalize
/// links it into place and drops the pending name. Linking fails if the
/// visible name is taken, so a finalized entry is never replaced. The locator
/// is the entry's path relative to root.
pub struct ScopedStorage {
    root: PathBuf,
}

impl ScopedStorage {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn visible_path(&self, locator: &Locator) -> Result<PathBuf, StorageError> {
        join_relative(&self.root, locator.as_str())
            .ok_or_else(|| StorageError::UnknownLocator(locator.clone()))
    }

    fn pending_path(&self, locator: &Locator) -> Result<PathBuf, StorageError> {
        let visible = self.visible_path(locator)?;
        let name = visible
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::UnknownLocator(locator.clone()))?;
        Ok(visible.with_file_name(format!("{PENDING_PREFIX}{name}")))
    }
}

impl PlatformStorage for ScopedStorage {
    fn name(&self) -> &'static str {
        "scoped"
    }

    fn allocate(&self, request: &EntryRequest) -> Result<Locator, StorageError> {
        check_display_name(&request.display_name)?;
        let relative = match request.collection.as_deref() {
            Some(collection) if !collection.is_empty() => {
                format!("{}/{}", collection.trim_end_matches('/'), request.display_name)
            }
            _ => request.display_name.clone(),
        };
        let locator = Locator::new(relative);
        let visible = join_relative(&self.root, locator.as_str())
            .ok_or_else(|| StorageError::InvalidName(locator.to_string()))?;
        let pending = self.pending_path(&locator)?;

        if let Some(dir) = visible.parent() {
            fs::create_dir_all(dir).map_err(|source| StorageError::Create {
                name: request.display_name.clone(),
                source,
            })?;
        }
        if visible.exists() {
            return Err(StorageError::AlreadyExists(request.display_name.clone()));
        }
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&pending)
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    StorageError::AlreadyExists(request.display_name.clone())
                }
                _ => StorageError::Create {
                    name: request.display_name.clone(),
                    source,
                },
            })?;

        debug!(%locator, mime = request.mime_type, "allocated pending entry");
        Ok(locator)
    }

    fn open_for_write(&self, locator: &Locator) -> Result<WriteChannel, StorageError> {
        let pending = self.pending_path(locator)?;
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&pending)
            .map_err(|source| StorageError::Open {
                locator: locator.clone(),
                source,
            })?;
        Ok(Box::new(file))
    }

    fn finalize(&self, locator: &Locator) -> Result<(), StorageError> {
        let pending = self.pending_path(locator)?;
        let visible = self.visible_path(locator)?;
        let finalize_err = |source| StorageError::Finalize {
            locator: locator.clone(),
            source,
        };

        fs::File::open(&pending)
            .and_then(|f| f.sync_all())
            .map_err(finalize_err)?;
        if let Err(source) = fs::hard_link(&pending, &visible) {
            if source.kind() == std::io::ErrorKind::AlreadyExists {
                // Lost a same-name race to an entry finalized after our
                // allocate-time check. Ours has nowhere to go.
                fs::remove_file(&pending).ok();
                return Err(StorageError::AlreadyExists(locator.to_string()));
            }
            return Err(finalize_err(source));
        }
        fs::remove_file(&pending).map_err(finalize_err)?;

        debug!(%locator, "entry finalized");
        Ok(())
    }

    fn read(&self, locator: &Locator) -> Result<Vec<u8>, StorageError> {
        let visible = self.visible_path(locator)?;
        fs::read(visible).map_err(|source| StorageError::Read {
            locator: locator.clone(),
            source,
        })
    }
}
