use serde::{Deserialize, Serialize};

/// Byte order of the color channels inside one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    Rgba,
    Bgra,
    Rgb,
    Bgr,
}

impl ChannelOrder {
    /// Bytes per pixel.
    pub fn channels(self) -> usize {
        match self {
            ChannelOrder::Rgba | ChannelOrder::Bgra => 4,
            ChannelOrder::Rgb | ChannelOrder::Bgr => 3,
        }
    }

    /// Offsets of the red, green and blue bytes within a pixel.
    pub fn rgb_offsets(self) -> [usize; 3] {
        match self {
            ChannelOrder::Rgba | ChannelOrder::Rgb => [0, 1, 2],
            ChannelOrder::Bgra | ChannelOrder::Bgr => [2, 1, 0],
        }
    }

    pub fn alpha_offset(self) -> Option<usize> {
        match self {
            ChannelOrder::Rgba | ChannelOrder::Bgra => Some(3),
            ChannelOrder::Rgb | ChannelOrder::Bgr => None,
        }
    }
}

/// One raster image from the live stream.
///
/// Pixels are stored row-major and tightly packed: `data.len()` is always
/// `width * height * order.channels()`. A zero-sized frame (empty `data`) is
/// representable; consumers that cannot handle one reject it themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    order: ChannelOrder,
    data: Vec<u8>,
    /// Position of this frame in its stream.
    pub seq: u64,
    /// Unix millis at which the source produced the frame.
    pub captured_at_ms: i64,
}

impl Frame {
    /// Wrap an existing pixel buffer, checking that its length matches the geometry.
    pub fn new(
        width: u32,
        height: u32,
        order: ChannelOrder,
        data: Vec<u8>,
        seq: u64,
        captured_at_ms: i64,
    ) -> Result<Self, FrameError> {
        let expected = buffer_len(width, height, order)?;
        if data.len() != expected {
            return Err(FrameError::BufferSize {
                width,
                height,
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            order,
            data,
            seq,
            captured_at_ms,
        })
    }

    /// A frame where every pixel has the given RGBA color.
    pub fn filled(
        width: u32,
        height: u32,
        order: ChannelOrder,
        rgba: [u8; 4],
    ) -> Result<Self, FrameError> {
        let len = buffer_len(width, height, order)?;
        let pixel = encode_pixel(order, rgba);
        let data = pixel
            .iter()
            .copied()
            .take(order.channels())
            .cycle()
            .take(len)
            .collect();
        Ok(Self {
            width,
            height,
            order,
            data,
            seq: 0,
            captured_at_ms: chrono::Utc::now().timestamp_millis(),
        })
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.order.channels()
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.stride() + x as usize * self.order.channels())
    }

    /// Read a pixel as RGBA regardless of the native order. Frames without an
    /// alpha channel report alpha as 255.
    pub fn pixel_rgba(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let start = self.offset(x, y)?;
        let px = &self.data[start..start + self.order.channels()];
        let [r, g, b] = self.order.rgb_offsets();
        let a = self.order.alpha_offset().map_or(255, |i| px[i]);
        Some([px[r], px[g], px[b], a])
    }

    /// Write an RGBA color into the native layout. Out-of-bounds writes are ignored.
    pub fn put_rgba(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let Some(start) = self.offset(x, y) else {
            return;
        };
        let channels = self.order.channels();
        let pixel = encode_pixel(self.order, rgba);
        self.data[start..start + channels].copy_from_slice(&pixel[..channels]);
    }
}

fn buffer_len(width: u32, height: u32, order: ChannelOrder) -> Result<usize, FrameError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(order.channels()))
        .ok_or(FrameError::TooLarge { width, height })
}

fn encode_pixel(order: ChannelOrder, rgba: [u8; 4]) -> [u8; 4] {
    let mut out = [0u8; 4];
    let [r, g, b] = order.rgb_offsets();
    out[r] = rgba[0];
    out[g] = rgba[1];
    out[b] = rgba[2];
    if let Some(a) = order.alpha_offset() {
        out[a] = rgba[3];
    }
    out
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("pixel buffer for {width}x{height} frame has {got} bytes, expected {expected}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },
    #[error("frame dimensions {width}x{height} overflow the address space")]
    TooLarge { width: u32, height: u32 },
}
