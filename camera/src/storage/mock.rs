//! In-memory storage with failure injection, for tests.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use super::{EntryRequest, Locator, PlatformStorage, StorageError, WriteChannel};

#[derive(Debug, Clone, Default)]
pub struct Entry {
    pub request_name: String,
    pub mime_type: String,
    pub collection: Option<String>,
    pub bytes: Vec<u8>,
    pub finalized: bool,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<Locator, Entry>,
    allocations: usize,
    opens: usize,
}

#[derive(Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<Inner>>,
    fail_allocate: bool,
    fail_open: bool,
    /// Fail the write channel once this many bytes have gone through.
    fail_write_after: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_allocate() -> Self {
        Self {
            fail_allocate: true,
            ..Self::default()
        }
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn failing_write_after(bytes: usize) -> Self {
        Self {
            fail_write_after: Some(bytes),
            ..Self::default()
        }
    }

    pub fn allocations(&self) -> usize {
        self.inner.lock().unwrap().allocations
    }

    pub fn opens(&self) -> usize {
        self.inner.lock().unwrap().opens
    }

    pub fn entries(&self) -> HashMap<Locator, Entry> {
        self.inner.lock().unwrap().entries.clone()
    }
}

impl PlatformStorage for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn allocate(&self, request: &EntryRequest) -> Result<Locator, StorageError> {
        if self.fail_allocate {
            return Err(StorageError::Create {
                name: request.display_name.clone(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "quota exhausted"),
            });
        }
        let mut inner = self.inner.lock().unwrap();
        let locator = Locator::new(format!("memory://{}", request.display_name));
        if inner.entries.contains_key(&locator) {
            return Err(StorageError::AlreadyExists(request.display_name.clone()));
        }
        inner.allocations += 1;
        inner.entries.insert(
            locator.clone(),
            Entry {
                request_name: request.display_name.clone(),
                mime_type: request.mime_type.to_string(),
                collection: request.collection.clone(),
                ..Entry::default()
            },
        );
        Ok(locator)
    }

    fn open_for_write(&self, locator: &Locator) -> Result<WriteChannel, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        inner.opens += 1;
        if self.fail_open {
            return Err(StorageError::Open {
                locator: locator.clone(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "revoked"),
            });
        }
        let entry = inner
            .entries
            .get_mut(locator)
            .ok_or_else(|| StorageError::UnknownLocator(locator.clone()))?;
        entry.bytes.clear();
        Ok(Box::new(MemoryWriter {
            inner: Arc::clone(&self.inner),
            locator: locator.clone(),
            written: 0,
            fail_after: self.fail_write_after,
        }))
    }

    fn finalize(&self, locator: &Locator) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .entries
            .get_mut(locator)
            .ok_or_else(|| StorageError::UnknownLocator(locator.clone()))?;
        entry.finalized = true;
        Ok(())
    }

    fn read(&self, locator: &Locator) -> Result<Vec<u8>, StorageError> {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .get(locator)
            .filter(|e| e.finalized)
            .map(|e| e.bytes.clone())
            .ok_or_else(|| StorageError::UnknownLocator(locator.clone()))
    }
}

struct MemoryWriter {
    inner: Arc<Mutex<Inner>>,
    locator: Locator,
    written: usize,
    fail_after: Option<usize>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_after.is_some_and(|limit| self.written >= limit) {
            return Err(io::Error::other("device full"));
        }
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .entries
            .get_mut(&self.locator)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "entry vanished"))?;
        entry.bytes.extend_from_slice(buf);
        self.written += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
