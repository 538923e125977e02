use std::time::Duration;

use chrono::Utc;
use snapcam_common::config::SourceConfig;
use snapcam_common::frame::{ChannelOrder, Frame};
use tokio::sync::watch;
use tracing::info;

use crate::listener::{FrameListener, PreviewSink, StreamSession};
use crate::SourceError;

/// Synthetic camera: a diagonal gradient that scrolls one pixel per frame.
pub struct PatternSource {
    width: u32,
    height: u32,
    order: ChannelOrder,
    interval: Duration,
    max_frames: Option<u64>,
}

impl PatternSource {
    pub fn new(
        width: u32,
        height: u32,
        order: ChannelOrder,
        fps: f64,
    ) -> Result<Self, SourceError> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(SourceError::InvalidRate(fps));
        }
        Ok(Self {
            width,
            height,
            order,
            interval: Duration::from_secs_f64(1.0 / fps),
            max_frames: None,
        })
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self, SourceError> {
        let source = Self::new(config.width, config.height, config.channel_order, config.fps)?;
        Ok(match config.max_frames {
            Some(max) => source.with_max_frames(max),
            None => source,
        })
    }

    /// Stop after this many frames instead of running until shutdown.
    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    /// Deliver frames at the configured rate until shutdown or the frame limit.
    pub async fn run(
        &self,
        listener: &mut dyn FrameListener,
        preview: &mut dyn PreviewSink,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), SourceError> {
        info!(
            width = self.width,
            height = self.height,
            interval_ms = self.interval.as_millis() as u64,
            "starting test-pattern source"
        );
        let mut ticker = tokio::time::interval(self.interval);
        let mut session = StreamSession::new(listener, preview);
        let mut seq: u64 = 0;

        loop {
            if self.max_frames.is_some_and(|max| seq >= max) || *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    let frame = render(self.width, self.height, self.order, seq)?;
                    session.deliver(frame);
                    seq += 1;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        session.finish();
        Ok(())
    }
}

/// Render frame number `seq` of the pattern.
pub fn render(width: u32, height: u32, order: ChannelOrder, seq: u64) -> Result<Frame, SourceError> {
    let mut frame = Frame::filled(width, height, order, [0, 0, 0, 255])?;
    let shift = seq as u32;
    for y in 0..height {
        for x in 0..width {
            let r = (x.wrapping_add(shift) & 0xff) as u8;
            let g = (y & 0xff) as u8;
            let b = ((x.wrapping_add(y).wrapping_add(shift) / 2) & 0xff) as u8;
            frame.put_rgba(x, y, [r, g, b, 255]);
        }
    }
    frame.seq = seq;
    frame.captured_at_ms = Utc::now().timestamp_millis();
    Ok(frame)
}
