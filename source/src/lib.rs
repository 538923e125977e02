//! Frame sources: things that produce a live stream of raster frames and
//! drive a [`FrameListener`] with them.

pub mod listener;
pub mod mjpeg;
pub mod pattern;

use snapcam_common::config::{SourceConfig, SourceKind};
use snapcam_common::frame::FrameError;
use tokio::sync::watch;

pub use listener::{FrameListener, PreviewSink, StreamSession};
pub use mjpeg::MjpegSource;
pub use pattern::PatternSource;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP connection failed: {0}")]
    HttpConnect(reqwest::Error),
    #[error("HTTP stream error: {0}")]
    HttpStream(reqwest::Error),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("failed to decode frame: {0}")]
    Decode(String),
    #[error("invalid frame: {0}")]
    Frame(#[from] FrameError),
    #[error("frame rate must be positive and finite, got {0}")]
    InvalidRate(f64),
    #[error("source kind {0:?} needs a url")]
    MissingUrl(SourceKind),
}

/// The configured frame source.
pub enum FrameSource {
    Pattern(PatternSource),
    Mjpeg(MjpegSource),
}

impl FrameSource {
    pub fn from_config(config: &SourceConfig) -> Result<Self, SourceError> {
        match config.kind {
            SourceKind::Pattern => Ok(Self::Pattern(PatternSource::from_config(config)?)),
            SourceKind::Mjpeg => {
                let url = config
                    .url
                    .as_deref()
                    .ok_or(SourceError::MissingUrl(config.kind))?;
                Ok(Self::Mjpeg(MjpegSource::new(url)))
            }
        }
    }

    /// Run until the shutdown flag flips to `true` (or the source runs dry).
    pub async fn run(
        &self,
        listener: &mut dyn FrameListener,
        preview: &mut dyn PreviewSink,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), SourceError> {
        match self {
            Self::Pattern(source) => source.run(listener, preview, shutdown).await,
            Self::Mjpeg(source) => source.run(listener, preview, shutdown).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mjpeg_requires_url() {
        let config = SourceConfig {
            kind: SourceKind::Mjpeg,
            ..SourceConfig::default()
        };
        assert!(matches!(
            FrameSource::from_config(&config),
            Err(SourceError::MissingUrl(SourceKind::Mjpeg))
        ));
    }

    #[test]
    fn pattern_is_built_from_defaults() {
        let source = FrameSource::from_config(&SourceConfig::default()).unwrap();
        assert!(matches!(source, FrameSource::Pattern(_)));
    }
}
