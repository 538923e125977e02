use bytes::BytesMut;
use chrono::Utc;
use futures_util::StreamExt;
use image::ImageReader;
use snapcam_common::frame::{ChannelOrder, Frame};
use std::io::Cursor;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::listener::{FrameListener, PreviewSink, StreamSession};
use crate::SourceError;

const BOUNDARY: &[u8] = b"--frame\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Parse state for the MJPEG multipart stream.
enum ParseState {
    /// Looking for the boundary marker `--frame\r\n`.
    SeekingBoundary,
    /// Found boundary, now looking for end of headers `\r\n\r\n`.
    SeekingHeaderEnd,
    /// Collecting JPEG bytes until the next boundary.
    CollectingJpeg { scanned: usize },
}

/// Incremental splitter for a `multipart/x-mixed-replace` JPEG stream.
pub struct MjpegParser {
    buffer: BytesMut,
    state: ParseState,
}

impl Default for MjpegParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MjpegParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256 * 1024),
            state: ParseState::SeekingBoundary,
        }
    }

    /// Feed one network chunk; returns every JPEG part completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);
        let mut parts = Vec::new();

        loop {
            match self.state {
                ParseState::SeekingBoundary => {
                    if let Some(pos) = find_subsequence(&self.buffer, BOUNDARY) {
                        let _ = self.buffer.split_to(pos + BOUNDARY.len());
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // Keep the tail in case the boundary spans chunks
                        if self.buffer.len() > BOUNDARY.len() {
                            let _ = self.buffer.split_to(self.buffer.len() - BOUNDARY.len());
                        }
                        break;
                    }
                }
                ParseState::SeekingHeaderEnd => {
                    if let Some(pos) = find_subsequence(&self.buffer, HEADER_END) {
                        let _ = self.buffer.split_to(pos + HEADER_END.len());
                        self.state = ParseState::CollectingJpeg { scanned: 0 };
                    } else {
                        break;
                    }
                }
                ParseState::CollectingJpeg { scanned } => {
                    if let Some(pos) = find_subsequence(&self.buffer[scanned..], BOUNDARY) {
                        let jpeg_end = scanned + pos;
                        // Strip trailing \r\n before boundary
                        let end = if self.buffer[..jpeg_end].ends_with(b"\r\n") {
                            jpeg_end - 2
                        } else {
                            jpeg_end
                        };
                        let jpeg = self.buffer[..end].to_vec();
                        let _ = self.buffer.split_to(jpeg_end + BOUNDARY.len());
                        if !jpeg.is_empty() {
                            parts.push(jpeg);
                        }
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // Skip already-scanned bytes next time
                        self.state = ParseState::CollectingJpeg {
                            scanned: self.buffer.len().saturating_sub(BOUNDARY.len()),
                        };
                        break;
                    }
                }
            }
        }

        parts
    }
}

/// Camera reached over HTTP as an MJPEG stream.
pub struct MjpegSource {
    url: String,
    max_backoff: Duration,
}

impl MjpegSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_backoff: Duration::from_secs(30),
        }
    }

    /// Consume the stream until shutdown, reconnecting with exponential
    /// backoff. Every connection is its own stream session.
    pub async fn run(
        &self,
        listener: &mut dyn FrameListener,
        preview: &mut dyn PreviewSink,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), SourceError> {
        let mut backoff = Duration::from_secs(2);

        while !*shutdown.borrow() {
            info!(url = self.url, "connecting to MJPEG stream");
            let mut session = StreamSession::new(listener, preview);
            let result = tokio::select! {
                result = consume_stream(&self.url, &mut session) => result,
                _ = shutdown.changed() => break,
            };
            let delivered = session.finish();
            match result {
                Ok(()) => {
                    info!(delivered, "stream ended cleanly, reconnecting");
                    backoff = Duration::from_secs(2);
                }
                Err(e) => {
                    error!(error = %e, delivered, "stream error, reconnecting in {:?}", backoff);
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = shutdown.changed() => break,
            }
            backoff = (backoff * 2).min(self.max_backoff);
        }

        info!("MJPEG source shut down");
        Ok(())
    }
}

async fn consume_stream(url: &str, session: &mut StreamSession<'_>) -> Result<(), SourceError> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(SourceError::HttpConnect)?;
    let response = client
        .get(url)
        .send()
        .await
        .map_err(SourceError::HttpConnect)?;

    if !response.status().is_success() {
        return Err(SourceError::HttpStatus(response.status().as_u16()));
    }

    info!(status = %response.status(), "connected to MJPEG stream");

    let mut byte_stream = response.bytes_stream();
    let mut parser = MjpegParser::new();
    let mut seq = session.delivered();

    while let Some(chunk) = byte_stream.next().await {
        let chunk = chunk.map_err(SourceError::HttpStream)?;
        for jpeg in parser.push(&chunk) {
            match decode_jpeg(&jpeg, seq) {
                Ok(frame) => {
                    session.deliver(frame);
                    seq += 1;
                }
                Err(e) => warn!(error = %e, bytes = jpeg.len(), "undecodable JPEG part, skipping"),
            }
        }
    }

    Ok(())
}

/// Decode one JPEG part into an RGBA frame stamped with the current time.
pub fn decode_jpeg(jpeg: &[u8], seq: u64) -> Result<Frame, SourceError> {
    let img = ImageReader::new(Cursor::new(jpeg))
        .with_guessed_format()
        .map_err(|e| SourceError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| SourceError::Decode(e.to_string()))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    debug!(seq, width, height, "decoded JPEG frame");
    Ok(Frame::new(
        width,
        height,
        ChannelOrder::Rgba,
        img.into_raw(),
        seq,
        Utc::now().timestamp_millis(),
    )?)
}

/// Find the position of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
