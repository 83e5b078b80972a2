// SPDX-License-Identifier: GPL-3.0-only

//! Pixel format conversion and JPEG encoding helpers

use crate::device::{PixelFormat, SensorFrame};

/// Convert a sensor frame to packed RGB
pub fn frame_to_rgb(frame: &SensorFrame) -> Vec<u8> {
    match frame.format {
        PixelFormat::Rgb => frame.data.to_vec(),
        PixelFormat::Yuyv => yuyv_to_rgb(&frame.data, frame.width, frame.height),
    }
}

/// Convert YUYV (YUV 4:2:2) to packed RGB
///
/// YUYV format: Y0 U Y1 V - each 4-byte group encodes 2 pixels.
/// Uses BT.601 coefficients for YUV to RGB conversion.
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let pixel_count = (width * height) as usize;
    let mut rgb = Vec::with_capacity(pixel_count * 3);

    for chunk in data.chunks_exact(4) {
        let y0 = chunk[0] as f32;
        let u = chunk[1] as f32 - 128.0;
        let y1 = chunk[2] as f32;
        let v = chunk[3] as f32 - 128.0;

        for y in [y0, y1] {
            let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
            let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
            let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

            rgb.push(r);
            rgb.push(g);
            rgb.push(b);

            if rgb.len() >= pixel_count * 3 {
                return rgb;
            }
        }
    }

    rgb.resize(pixel_count * 3, 0);
    rgb
}

/// Nearest-neighbor downsample of a packed RGB image
pub fn downsample_rgb(rgb: &[u8], src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Vec<u8> {
    let (src_w, src_h) = (src_w as usize, src_h as usize);
    let (dst_w, dst_h) = (dst_w.max(1) as usize, dst_h.max(1) as usize);
    let mut out = Vec::with_capacity(dst_w * dst_h * 3);

    for dy in 0..dst_h {
        let sy = (dy * src_h / dst_h).min(src_h.saturating_sub(1));
        for dx in 0..dst_w {
            let sx = (dx * src_w / dst_w).min(src_w.saturating_sub(1));
            let idx = (sy * src_w + sx) * 3;
            if idx + 3 <= rgb.len() {
                out.extend_from_slice(&rgb[idx..idx + 3]);
            } else {
                out.extend_from_slice(&[0, 0, 0]);
            }
        }
    }

    out
}

/// Encode packed RGB as JPEG at the given quality (0-100)
pub fn encode_jpeg(rgb: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>, String> {
    let expected = (width * height * 3) as usize;
    if rgb.len() != expected {
        return Err(format!(
            "RGB buffer is {} bytes, expected {} for {}x{}",
            rgb.len(),
            expected,
            width,
            height
        ));
    }

    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);

    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
    encoder
        .encode(rgb, width, height, image::ExtendedColorType::Rgb8)
        .map_err(|e| format!("JPEG encoding failed: {}", e))?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_to_rgb_gray() {
        // Y=128, U=V=128 -> mid gray
        let data = [128u8, 128, 128, 128];
        let rgb = yuyv_to_rgb(&data, 2, 1);
        assert_eq!(rgb.len(), 6);
        for c in rgb {
            assert!((c as i32 - 128).abs() <= 2);
        }
    }

    #[test]
    fn test_downsample_halves() {
        let src = vec![10u8; 4 * 4 * 3];
        let out = downsample_rgb(&src, 4, 4, 2, 2);
        assert_eq!(out.len(), 2 * 2 * 3);
        assert!(out.iter().all(|&c| c == 10));
    }

    #[test]
    fn test_encode_jpeg_magic() {
        let rgb = vec![200u8; 8 * 8 * 3];
        let jpeg = encode_jpeg(&rgb, 8, 8, 80).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "JPEG SOI marker");
    }

    #[test]
    fn test_encode_jpeg_rejects_bad_length() {
        assert!(encode_jpeg(&[0u8; 10], 8, 8, 80).is_err());
    }
}
