pub mod encode;
pub mod naming;

use std::io::{self, Read, Write};
use std::sync::Arc;

use chrono::Utc;
use snapcam_common::frame::Frame;
use tracing::{debug, info};

use crate::storage::{EntryRequest, Locator, PlatformStorage, StorageError, PNG_MIME};
use encode::{encode_png, EncodeError};
use naming::{capture_file_name, capture_time_label};

/// Size of the intermediate buffer the encoded image is streamed through.
const WRITE_BUFFER_SIZE: usize = 8192;

/// Turns one frame into one durable PNG entry in platform storage.
pub struct Capturer {
    storage: Arc<dyn PlatformStorage>,
    file_prefix: String,
    collection: Option<String>,
}

impl Capturer {
    pub fn new(
        storage: Arc<dyn PlatformStorage>,
        file_prefix: impl Into<String>,
        collection: Option<String>,
    ) -> Self {
        Self {
            storage,
            file_prefix: file_prefix.into(),
            collection: collection.filter(|c| !c.is_empty()),
        }
    }

    /// Encode `frame` and persist it under a name derived from the current time.
    ///
    /// Encoding and storage I/O both run on the blocking pool. There is no
    /// retry and no rollback: an entry allocated before a failure is left
    /// as the storage layer leaves it.
    pub async fn capture(&self, frame: Frame) -> Result<Locator, CaptureError> {
        let started_ms = Utc::now().timestamp_millis();
        let request = EntryRequest {
            display_name: capture_file_name(&self.file_prefix, started_ms),
            mime_type: PNG_MIME,
            collection: self.collection.clone(),
        };
        let seq = frame.seq;
        debug!(
            seq,
            name = request.display_name,
            started = capture_time_label(started_ms),
            "capture started"
        );

        let png = tokio::task::spawn_blocking(move || encode_png(&frame)).await??;
        let size = png.len();

        let storage = Arc::clone(&self.storage);
        let locator =
            tokio::task::spawn_blocking(move || persist(storage.as_ref(), &request, &png))
                .await??;

        info!(seq, %locator, bytes = size, "capture stored");
        Ok(locator)
    }
}

/// Allocate, stream, finalize. Blocking.
pub fn persist(
    storage: &dyn PlatformStorage,
    request: &EntryRequest,
    bytes: &[u8],
) -> Result<Locator, CaptureError> {
    let locator = storage.allocate(request).map_err(CaptureError::Allocate)?;

    let mut channel = storage
        .open_for_write(&locator)
        .map_err(|source| CaptureError::Open {
            locator: locator.clone(),
            source,
        })?;
    stream_bytes(bytes, &mut channel).map_err(|source| CaptureError::Write {
        locator: locator.clone(),
        source,
    })?;
    drop(channel);

    storage.finalize(&locator).map_err(CaptureError::Finalize)?;
    Ok(locator)
}

fn stream_bytes(bytes: &[u8], out: &mut dyn Write) -> io::Result<u64> {
    let mut input = bytes;
    let mut buffer = [0u8; WRITE_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = input.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        out.write_all(&buffer[..n])?;
        total += n as u64;
    }
    out.flush()?;
    Ok(total)
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to encode frame: {0}")]
    Encode(#[from] EncodeError),
    #[error("could not allocate a storage entry: {0}")]
    Allocate(#[source] StorageError),
    #[error("write channel unavailable: {source}")]
    Open {
        locator: Locator,
        source: StorageError,
    },
    #[error("failed writing {locator}: {source}")]
    Write {
        locator: Locator,
        source: io::Error,
    },
    #[error("could not finalize the entry: {0}")]
    Finalize(#[source] StorageError),
    #[error("capture task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl CaptureError {
    /// Coarse failure class, stable for clients.
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureError::Encode(_) => "encode",
            CaptureError::Allocate(_) => "allocate",
            CaptureError::Open { .. } | CaptureError::Write { .. } => "write",
            CaptureError::Finalize(_) => "finalize",
            CaptureError::Task(_) => "task",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::mock::MemoryStorage;
    use image::ImageFormat;
    use snapcam_common::frame::ChannelOrder;
    use std::time::Duration;

    fn frame(seq: u64, rgba: [u8; 4]) -> Frame {
        Frame::filled(64, 48, ChannelOrder::Rgba, rgba)
            .unwrap()
            .with_seq(seq)
    }

    fn capturer(storage: &Arc<MemoryStorage>) -> Capturer {
        let storage: Arc<dyn PlatformStorage> = storage.clone();
        Capturer::new(storage, "snapcam", Some("Pictures/Snapcam".into()))
    }

    #[tokio::test]
    async fn stores_a_finalized_png() {
        let storage = Arc::new(MemoryStorage::new());
        let locator = capturer(&storage)
            .capture(frame(1, [10, 20, 30, 255]))
            .await
            .unwrap();

        let entries = storage.entries();
        let entry = &entries[&locator];
        assert!(entry.finalized);
        assert_eq!(entry.mime_type, PNG_MIME);
        assert_eq!(entry.collection.as_deref(), Some("Pictures/Snapcam"));
        assert!(entry.request_name.starts_with("snapcam_"));
        assert!(entry.request_name.ends_with(".png"));

        let png = storage.read(&locator).unwrap();
        let img = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .unwrap()
            .to_rgb8();
        assert_eq!(img.dimensions(), (64, 48));
        assert_eq!(img.get_pixel(10, 10).0, [10, 20, 30]);
    }

    #[tokio::test]
    async fn allocation_failure_writes_nothing() {
        let storage = Arc::new(MemoryStorage::failing_allocate());
        let err = capturer(&storage)
            .capture(frame(1, [0, 0, 0, 255]))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Allocate(_)));
        assert_eq!(err.kind(), "allocate");
        assert_eq!(storage.opens(), 0);
        assert!(storage.entries().is_empty());
    }

    #[tokio::test]
    async fn write_failure_is_distinct_from_allocation() {
        let storage = Arc::new(MemoryStorage::failing_write_after(0));
        let err = capturer(&storage)
            .capture(frame(1, [0, 0, 0, 255]))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Write { .. }));
        assert_eq!(err.kind(), "write");
        // allocated but never finalized; left for the storage layer
        assert_eq!(storage.allocations(), 1);
        assert!(storage.entries().values().all(|e| !e.finalized));
    }

    #[tokio::test]
    async fn open_failure_reports_as_write() {
        let storage = Arc::new(MemoryStorage::failing_open());
        let err = capturer(&storage)
            .capture(frame(1, [0, 0, 0, 255]))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Open { .. }));
        assert_eq!(err.kind(), "write");
    }

    #[tokio::test]
    async fn empty_frame_never_reaches_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let empty = Frame::new(0, 0, ChannelOrder::Rgba, Vec::new(), 0, 0).unwrap();
        let err = capturer(&storage).capture(empty).await.unwrap_err();
        assert!(matches!(err, CaptureError::Encode(EncodeError::Empty { .. })));
        assert_eq!(storage.allocations(), 0);
    }

    #[tokio::test]
    async fn two_captures_make_two_entries() {
        let storage = Arc::new(MemoryStorage::new());
        let capturer = capturer(&storage);

        let first = capturer.capture(frame(1, [255, 0, 0, 255])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(3)).await;
        let second = capturer.capture(frame(2, [0, 0, 255, 255])).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(storage.entries().len(), 2);
        assert_ne!(storage.read(&first).unwrap(), storage.read(&second).unwrap());
    }

    #[test]
    fn persist_streams_in_fixed_chunks() {
        let storage = MemoryStorage::new();
        let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let request = EntryRequest {
            display_name: "big.png".into(),
            mime_type: PNG_MIME,
            collection: None,
        };
        let locator = persist(&storage, &request, &payload).unwrap();
        assert_eq!(storage.read(&locator).unwrap(), payload);
    }

    #[test]
    fn persist_fails_mid_stream() {
        let storage = MemoryStorage::failing_write_after(WRITE_BUFFER_SIZE);
        let payload = vec![7u8; WRITE_BUFFER_SIZE * 2 + 1];
        let request = EntryRequest {
            display_name: "partial.png".into(),
            mime_type: PNG_MIME,
            collection: None,
        };
        let err = persist(&storage, &request, &payload).unwrap_err();
        assert!(matches!(err, CaptureError::Write { .. }));

        let entries = storage.entries();
        let entry = entries.values().next().unwrap();
        assert_eq!(entry.bytes.len(), WRITE_BUFFER_SIZE);
        assert!(!entry.finalized);
    }
}
