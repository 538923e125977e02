use snapcam_common::config::OverlayConfig;
use snapcam_common::frame::Frame;

/// Circle outline drawn at the center of every frame.
#[derive(Debug, Clone)]
pub struct CircleMarker {
    radius: u32,
    thickness: u32,
    color: [u8; 4],
}

impl CircleMarker {
    pub fn new(radius: u32, thickness: u32, color: [u8; 4]) -> Self {
        Self {
            radius,
            thickness: thickness.max(1),
            color,
        }
    }

    pub fn from_config(config: &OverlayConfig) -> Self {
        Self::new(config.radius, config.thickness, config.color)
    }

    /// Center of the marker for a frame of the given size.
    pub fn center(width: u32, height: u32) -> (u32, u32) {
        (width / 2, height / 2)
    }

    /// Paint the ring in place. The stroke is centered on the radius; parts
    /// outside the frame are clipped.
    pub fn draw(&self, frame: &mut Frame) {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        let (cx, cy) = Self::center(width, height);
        let half = self.thickness as f64 / 2.0;
        let inner = (self.radius as f64 - half).max(0.0);
        let outer = self.radius as f64 + half;
        let reach = outer.ceil() as i64;

        let x_range = (cx as i64 - reach).max(0)..=(cx as i64 + reach).min(width as i64 - 1);
        let y_range = (cy as i64 - reach).max(0)..=(cy as i64 + reach).min(height as i64 - 1);

        for y in y_range {
            let dy = (y - cy as i64) as f64;
            for x in x_range.clone() {
                let dx = (x - cx as i64) as f64;
                let dist = (dx * dx + dy * dy).sqrt();
                if dist >= inner && dist <= outer {
                    frame.put_rgba(x as u32, y as u32, self.color);
                }
            }
        }
    }
}
