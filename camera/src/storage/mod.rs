mod legacy;
#[cfg(test)]
pub mod mock;
mod scoped;

pub use legacy::LegacyStorage;
pub use scoped::ScopedStorage;

use serde::Serialize;
use snapcam_common::config::{StorageConfig, StorageLayout};
use std::fmt;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub const PNG_MIME: &str = "image/png";

/// Opaque handle to one storage entry, issued by [`PlatformStorage::allocate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub(crate) fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What to create in [`PlatformStorage::allocate`].
#[derive(Debug, Clone)]
pub struct EntryRequest {
    pub display_name: String,
    pub mime_type: &'static str,
    /// Logical collection, e.g. `Pictures/Snapcam`. Backends without
    /// collections ignore it.
    pub collection: Option<String>,
}

/// Write side of a storage entry.
pub type WriteChannel = Box<dyn Write + Send>;

/// Shared image storage managed by the platform.
///
/// All methods block; call them from a blocking context.
pub trait PlatformStorage: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Create a new, empty entry. Never reuses an existing one.
    fn allocate(&self, request: &EntryRequest) -> Result<Locator, StorageError>;

    fn open_for_write(&self, locator: &Locator) -> Result<WriteChannel, StorageError>;

    /// Mark a written entry complete and visible to other readers.
    fn finalize(&self, locator: &Locator) -> Result<(), StorageError>;

    fn read(&self, locator: &Locator) -> Result<Vec<u8>, StorageError>;
}

/// Pick the backend for the configured layout. Done once at startup; an
/// error here means the storage gate is closed and nothing should start.
pub fn open(config: &StorageConfig) -> Result<Arc<dyn PlatformStorage>, StorageError> {
    std::fs::create_dir_all(&config.root).map_err(|source| StorageError::Unavailable {
        root: config.root.clone(),
        source,
    })?;
    probe_writable(&config.root).map_err(|source| StorageError::Unavailable {
        root: config.root.clone(),
        source,
    })?;

    let storage: Arc<dyn PlatformStorage> = match config.layout {
        StorageLayout::Scoped => Arc::new(ScopedStorage::new(&config.root)),
        StorageLayout::Legacy => Arc::new(LegacyStorage::new(&config.root)),
    };
    info!(
        backend = storage.name(),
        root = %config.root.display(),
        "storage ready"
    );
    Ok(storage)
}

/// Check the root is writable by creating and removing a marker file.
fn probe_writable(root: &Path) -> std::io::Result<()> {
    let marker = root.join(format!(".snapcam-probe-{}", std::process::id()));
    std::fs::write(&marker, b"")?;
    std::fs::remove_file(&marker)
}

/// Join a relative, slash-separated path under `root`, refusing anything
/// that could escape it.
pub(crate) fn join_relative(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    if relative.as_os_str().is_empty() {
        return None;
    }
    let mut path = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(path)
}

/// Entry names are single, non-hidden path components.
pub(crate) fn check_display_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage root {} is not usable: {source}", root.display())]
    Unavailable {
        root: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid entry name or collection {0:?}")]
    InvalidName(String),
    #[error("an entry named {0:?} already exists")]
    AlreadyExists(String),
    #[error("failed to create entry {name:?}: {source}")]
    Create {
        name: String,
        source: std::io::Error,
    },
    #[error("unknown locator {0}")]
    UnknownLocator(Locator),
    #[error("failed to open {locator} for writing: {source}")]
    Open {
        locator: Locator,
        source: std::io::Error,
    },
    #[error("failed to finalize {locator}: {source}")]
    Finalize {
        locator: Locator,
        source: std::io::Error,
    },
    #[error("failed to read {locator}: {source}")]
    Read {
        locator: Locator,
        source: std::io::Error,
    },
}
