use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use snapcam_common::frame::Frame;

/// Normalize a frame of any channel order to packed RGB, dropping alpha.
pub fn to_rgb(frame: &Frame) -> Result<RgbImage, EncodeError> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err(EncodeError::Empty { width, height });
    }
    let order = frame.order();
    let [r, g, b] = order.rgb_offsets();
    let rgb: Vec<u8> = frame
        .data()
        .chunks_exact(order.channels())
        .flat_map(|px| [px[r], px[g], px[b]])
        .collect();
    RgbImage::from_raw(width, height, rgb).ok_or(EncodeError::Layout { width, height })
}

/// Encode a frame as a PNG byte stream.
pub fn encode_png(frame: &Frame) -> Result<Vec<u8>, EncodeError> {
    let rgb = to_rgb(frame)?;
    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(png)
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("cannot encode a {width}x{height} frame")]
    Empty { width: u32, height: u32 },
    #[error("pixel buffer does not match {width}x{height}")]
    Layout { width: u32, height: u32 },
    #[error("PNG encoding failed: {0}")]
    Png(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;
    use snapcam_common::frame::ChannelOrder;

    fn sample(order: ChannelOrder) -> Frame {
        let mut frame = Frame::filled(5, 3, order, [0, 0, 0, 255]).unwrap();
        for y in 0..3 {
            for x in 0..5 {
                frame.put_rgba(x, y, [x as u8 * 40, y as u8 * 70, 200, 128]);
            }
        }
        frame
    }

    #[test]
    fn every_channel_order_normalizes_to_the_same_rgb() {
        let reference = to_rgb(&sample(ChannelOrder::Rgba)).unwrap();
        for order in [ChannelOrder::Bgra, ChannelOrder::Rgb, ChannelOrder::Bgr] {
            assert_eq!(to_rgb(&sample(order)).unwrap(), reference, "{order:?}");
        }
        assert_eq!(reference.get_pixel(4, 2).0, [160, 140, 200]);
    }

    #[test]
    fn png_decodes_back_to_the_same_pixels() {
        let frame = sample(ChannelOrder::Bgra);
        let png = encode_png(&frame).unwrap();
        assert_eq!(&png[1..4], b"PNG");

        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .unwrap()
            .to_rgb8();
        assert_eq!(decoded.dimensions(), (5, 3));
        for y in 0..3 {
            for x in 0..5 {
                let [r, g, b, _] = frame.pixel_rgba(x, y).unwrap();
                assert_eq!(decoded.get_pixel(x, y).0, [r, g, b]);
            }
        }
    }

    #[test]
    fn zero_sized_frame_is_rejected() {
        let frame = Frame::new(0, 4, ChannelOrder::Rgba, Vec::new(), 0, 0).unwrap();
        assert!(matches!(
            encode_png(&frame),
            Err(EncodeError::Empty {
                width: 0,
                height: 4
            })
        ));
    }
}
