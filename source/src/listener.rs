use snapcam_common::frame::Frame;
use tracing::{debug, info};

/// Receiver of a live frame stream.
///
/// The source calls these hooks from its delivery loop. `on_frame` runs
/// synchronously for every frame and must return quickly; whatever it
/// returns is what gets displayed.
pub trait FrameListener: Send {
    /// A stream session began. Called once, before the first frame.
    fn on_stream_started(&mut self, width: u32, height: u32);

    /// Transform one frame for display.
    fn on_frame(&mut self, frame: Frame) -> Frame;

    /// The stream session ended. Called once per started session.
    fn on_stream_stopped(&mut self);
}

/// Where displayed frames go.
pub trait PreviewSink: Send {
    fn present(&mut self, frame: &Frame);
}

impl<F> PreviewSink for F
where
    F: FnMut(&Frame) + Send,
{
    fn present(&mut self, frame: &Frame) {
        self(frame)
    }
}

/// Drives one listener through one stream session, enforcing the
/// started/stopped pairing.
pub struct StreamSession<'a> {
    listener: &'a mut dyn FrameListener,
    preview: &'a mut dyn PreviewSink,
    started: bool,
    delivered: u64,
}

impl<'a> StreamSession<'a> {
    pub fn new(listener: &'a mut dyn FrameListener, preview: &'a mut dyn PreviewSink) -> Self {
        Self {
            listener,
            preview,
            started: false,
            delivered: 0,
        }
    }

    /// Hand one frame to the listener and present the result.
    pub fn deliver(&mut self, frame: Frame) {
        if !self.started {
            let (width, height) = frame.dimensions();
            info!(width, height, "stream started");
            self.listener.on_stream_started(width, height);
            self.started = true;
        }
        let shown = self.listener.on_frame(frame);
        self.preview.present(&shown);
        self.delivered += 1;
        if self.delivered % 100 == 0 {
            debug!(delivered = self.delivered, "frames delivered");
        }
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// End the session. Fires `on_stream_stopped` only if a frame was ever delivered.
    pub fn finish(mut self) -> u64 {
        self.stop();
        self.delivered
    }

    fn stop(&mut self) {
        if self.started {
            self.started = false;
            info!(delivered = self.delivered, "stream stopped");
            self.listener.on_stream_stopped();
        }
    }
}

impl Drop for StreamSession<'_> {
    fn drop(&mut self) {
        self.stop();
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingListener;
    use super::*;
    use snapcam_common::frame::ChannelOrder;

    fn frame(seq: u64) -> Frame {
        Frame::filled(4, 3, ChannelOrder::Rgba, [0, 0, 0, 255])
            .unwrap()
            .with_seq(seq)
    }

    #[test]
    fn started_once_before_first_frame_and_stopped_once() {
        let mut listener = RecordingListener::default();
        let mut shown = Vec::new();
        let mut preview = |f: &Frame| shown.push(f.pixel_rgba(0, 0).unwrap());
        let mut session = StreamSession::new(&mut listener, &mut preview);
        session.deliver(frame(0));
        session.deliver(frame(1));
        assert_eq!(session.finish(), 2);

        assert_eq!(listener.started, vec![(4, 3)]);
        assert_eq!(listener.frames, vec![0, 1]);
        assert_eq!(listener.stopped, 1);
        // The preview sees the listener's returned frame, not the original.
        assert_eq!(shown, vec![[1, 2, 3, 4], [1, 2, 3, 4]]);
    }

    #[test]
    fn empty_session_fires_no_hooks() {
        let mut listener = RecordingListener::default();
        let mut preview = |_: &Frame| {};
        let session = StreamSession::new(&mut listener, &mut preview);
        assert_eq!(session.finish(), 0);
        assert!(listener.started.is_empty());
        assert_eq!(listener.stopped, 0);
    }

    #[test]
    fn dropping_a_started_session_stops_it() {
        let mut listener = RecordingListener::default();
        let mut preview = |_: &Frame| {};
        {
            let mut session = StreamSession::new(&mut listener, &mut preview);
            session.deliver(frame(7));
        }
        assert_eq!(listener.stopped, 1);
    }
}
