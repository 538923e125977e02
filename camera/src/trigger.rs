use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Edge-triggered capture request shared between the control surface and the
/// frame delivery path.
///
/// Requests are not counted: several `request()` calls before the next frame
/// collapse into a single capture.
#[derive(Debug, Clone, Default)]
pub struct CaptureTrigger {
    pending: Arc<AtomicBool>,
}

impl CaptureTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Clear the flag, reporting whether it was set.
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}
