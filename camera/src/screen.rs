use std::sync::Arc;

use snapcam_common::frame::Frame;
use snapcam_source::FrameListener;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::capture::Capturer;
use crate::notify::{Notification, Notifier};
use crate::overlay::CircleMarker;
use crate::trigger::CaptureTrigger;

/// The camera preview screen: marks every frame and, when asked, hands a
/// copy of the current frame to the capturer.
///
/// `on_frame` never waits on a capture. The copy is moved into a task on
/// `runtime`, and the result comes back through the notifier.
pub struct CameraScreen {
    marker: CircleMarker,
    trigger: CaptureTrigger,
    capturer: Arc<Capturer>,
    notifier: Arc<dyn Notifier>,
    runtime: Handle,
    stream_size: Option<(u32, u32)>,
}

impl CameraScreen {
    pub fn new(
        marker: CircleMarker,
        trigger: CaptureTrigger,
        capturer: Arc<Capturer>,
        notifier: Arc<dyn Notifier>,
        runtime: Handle,
    ) -> Self {
        Self {
            marker,
            trigger,
            capturer,
            notifier,
            runtime,
            stream_size: None,
        }
    }

    fn start_capture(&self, snapshot: Frame) {
        let capturer = Arc::clone(&self.capturer);
        let notifier = Arc::clone(&self.notifier);
        let seq = snapshot.seq;
        let frame_at_ms = snapshot.captured_at_ms;
        debug!(seq, frame_at_ms, "capture requested, handing off frame");
        // Fire and forget: no cancellation once handed off.
        self.runtime.spawn(async move {
            let result = capturer.capture(snapshot).await;
            notifier.notify(
                Notification::from_result(seq, &result).with_frame_time(frame_at_ms),
            );
        });
    }
}

impl FrameListener for CameraScreen {
    fn on_stream_started(&mut self, width: u32, height: u32) {
        info!(width, height, "camera view started");
        self.stream_size = Some((width, height));
    }

    fn on_frame(&mut self, mut frame: Frame) -> Frame {
        self.marker.draw(&mut frame);
        if self.trigger.take() {
            self.start_capture(frame.clone());
        }
        frame
    }

    fn on_stream_stopped(&mut self) {
        if let Some((width, height)) = self.stream_size.take() {
            info!(width, height, "camera view stopped");
        }
    }
}
