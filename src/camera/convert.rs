//! YUV 4:2:0 to grayscale / BGR / RGB conversion.
//!
//! Color conversion uses the ITU-R BT.601 "video range" transform in 20-bit
//! fixed point:
//! - R = 1.164 * (Y - 16) + 1.596 * (V - 128)
//! - G = 1.164 * (Y - 16) - 0.813 * (V - 128) - 0.391 * (U - 128)
//! - B = 1.164 * (Y - 16) + 2.018 * (U - 128)

use super::types::{CameraError, ChannelOrder, PixelFormat, PixelLayout, Resolution};

const SHIFT: u32 = 20;
const ROUND: i32 = 1 << (SHIFT - 1);
const C_Y: i32 = 1_220_542;
const C_VR: i32 = 1_673_527;
const C_VG: i32 = -852_492;
const C_UG: i32 = -409_993;
const C_UB: i32 = 2_116_026;

#[inline]
fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// BT.601 video-range YUV to RGB for one pixel.
#[inline]
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = (y as i32 - 16).max(0) * C_Y;
    let u = u as i32 - 128;
    let v = v as i32 - 128;
    [
        clamp_u8((y + C_VR * v + ROUND) >> SHIFT),
        clamp_u8((y + C_VG * v + C_UG * u + ROUND) >> SHIFT),
        clamp_u8((y + C_UB * u + ROUND) >> SHIFT),
    ]
}

fn check_len(src: &[u8], resolution: Resolution) -> Result<(), CameraError> {
    // a size that does not fit in memory can never be satisfied
    let expected = resolution.yuv420_len().unwrap_or(usize::MAX);
    if src.len() < expected {
        return Err(CameraError::BufferTooSmall {
            expected,
            actual: src.len(),
        });
    }
    Ok(())
}

/// The luma plane of a YUV 4:2:0 buffer, usable directly as an 8-bit gray image.
pub fn luma_plane(src: &[u8], resolution: Resolution) -> Result<&[u8], CameraError> {
    check_len(src, resolution)?;
    Ok(&src[..resolution.pixel_count()])
}

/// Convert a semi-planar YUV 4:2:0 buffer into `dst` using `layout`.
///
/// Returns `Ok(false)` without touching `dst` when `format` is
/// [`PixelFormat::Unknown`]. Odd dimensions are rejected: 4:2:0 chroma
/// covers 2x2 blocks and cannot describe a half block.
pub fn yuv420_to_color(
    src: &[u8],
    resolution: Resolution,
    format: PixelFormat,
    layout: PixelLayout,
    dst: &mut Vec<u8>,
) -> Result<bool, CameraError> {
    // (U, V) offsets within each chroma pair
    let (u_off, v_off) = match format {
        PixelFormat::Yuv420SemiPlanar => (1, 0),
        PixelFormat::Yuv420Interleaved => (0, 1),
        PixelFormat::Unknown => return Ok(false),
    };
    if !resolution.is_even() {
        return Err(CameraError::OddDimensions {
            width: resolution.width,
            height: resolution.height,
        });
    }
    check_len(src, resolution)?;

    let width = resolution.width as usize;
    let height = resolution.height as usize;
    let channels = layout.channels;
    let (luma, chroma) = src.split_at(width * height);

    dst.clear();
    dst.resize(width * height * channels, 0);

    for (row, out_row) in dst.chunks_exact_mut(width * channels).enumerate() {
        let y_row = &luma[row * width..(row + 1) * width];
        let uv_row = &chroma[(row / 2) * width..(row / 2 + 1) * width];

        for (col, out) in out_row.chunks_exact_mut(channels).enumerate() {
            let pair = col & !1;
            let [r, g, b] = yuv_to_rgb(y_row[col], uv_row[pair + u_off], uv_row[pair + v_off]);
            match layout.order {
                ChannelOrder::Rgb => out[..3].copy_from_slice(&[r, g, b]),
                _ => out[..3].copy_from_slice(&[b, g, r]),
            }
            if channels == 4 {
                out[3] = 255;
            }
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::types::OutputKind;

    /// 2x2 frame: four luma samples and one chroma pair.
    fn tiny(y: u8, c0: u8, c1: u8) -> Vec<u8> {
        vec![y, y, y, y, c0, c1]
    }

    #[test]
    fn test_yuv_to_rgb_video_range_extremes() {
        assert_eq!(yuv_to_rgb(16, 128, 128), [0, 0, 0]);
        assert_eq!(yuv_to_rgb(235, 128, 128), [255, 255, 255]);
        assert_eq!(yuv_to_rgb(0, 128, 128), [0, 0, 0]);
        assert_eq!(yuv_to_rgb(128, 128, 128), [130, 130, 130]);
    }

    #[test]
    fn test_semi_planar_reads_v_first() {
        let mut dst = Vec::new();
        let ok = yuv420_to_color(
            &tiny(128, 255, 128),
            Resolution::new(2, 2),
            PixelFormat::Yuv420SemiPlanar,
            OutputKind::ColorRgb.layout(),
            &mut dst,
        )
        .unwrap();
        assert!(ok);
        assert_eq!(dst.len(), 12);
        assert_eq!(&dst[..3], &[255, 27, 130]);
    }

    #[test]
    fn test_interleaved_reads_u_first() {
        let mut dst = Vec::new();
        yuv420_to_color(
            &tiny(128, 255, 128),
            Resolution::new(2, 2),
            PixelFormat::Yuv420Interleaved,
            OutputKind::ColorRgb.layout(),
            &mut dst,
        )
        .unwrap();
        assert_eq!(&dst[..3], &[130, 81, 255]);
    }

    #[test]
    fn test_bgr_order_and_alpha() {
        let mut bgr = Vec::new();
        let mut bgra = Vec::new();
        let src = tiny(128, 255, 128);
        let res = Resolution::new(2, 2);
        yuv420_to_color(
            &src,
            res,
            PixelFormat::Yuv420SemiPlanar,
            OutputKind::ColorBgr.layout(),
            &mut bgr,
        )
        .unwrap();
        yuv420_to_color(
            &src,
            res,
            PixelFormat::Yuv420SemiPlanar,
            OutputKind::ColorBgra.layout(),
            &mut bgra,
        )
        .unwrap();

        assert_eq!(bgr.len(), 12);
        assert_eq!(bgra.len(), 16);
        assert_eq!(&bgr[..3], &[130, 27, 255]);
        assert_eq!(&bgra[..4], &[130, 27, 255, 255]);
    }

    #[test]
    fn test_chroma_shared_by_2x2_block() {
        // 4x2: two chroma pairs, left block neutral, right block red-ish
        let src = vec![
            128, 128, 128, 128, //
            128, 128, 128, 128, //
            128, 128, 255, 128, // V,U pairs
        ];
        let mut dst = Vec::new();
        yuv420_to_color(
            &src,
            Resolution::new(4, 2),
            PixelFormat::Yuv420SemiPlanar,
            OutputKind::ColorRgb.layout(),
            &mut dst,
        )
        .unwrap();
        for row in 0..2 {
            let px = |col: usize| &dst[(row * 4 + col) * 3..(row * 4 + col) * 3 + 3];
            assert_eq!(px(0), &[130, 130, 130]);
            assert_eq!(px(1), &[130, 130, 130]);
            assert_eq!(px(2), &[255, 27, 130]);
            assert_eq!(px(3), &[255, 27, 130]);
        }
    }

    #[test]
    fn test_unknown_format_is_not_converted() {
        let mut dst = vec![1, 2, 3];
        let ok = yuv420_to_color(
            &tiny(128, 128, 128),
            Resolution::new(2, 2),
            PixelFormat::Unknown,
            OutputKind::ColorBgr.layout(),
            &mut dst,
        )
        .unwrap();
        assert!(!ok);
        assert_eq!(dst, vec![1, 2, 3]);
    }

    #[test]
    fn test_odd_dimensions_rejected() {
        let res = Resolution::new(3, 2);
        let src = vec![0; res.yuv420_len().unwrap()];
        let err = yuv420_to_color(
            &src,
            res,
            PixelFormat::Yuv420SemiPlanar,
            OutputKind::ColorBgr.layout(),
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CameraError::OddDimensions {
                width: 3,
                height: 2
            }
        ));
    }

    #[test]
    fn test_short_buffer_rejected() {
        let err = yuv420_to_color(
            &[0; 5],
            Resolution::new(2, 2),
            PixelFormat::Yuv420SemiPlanar,
            OutputKind::ColorBgr.layout(),
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CameraError::BufferTooSmall {
                expected: 6,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_luma_plane() {
        let src = [1, 2, 3, 4, 9, 9];
        assert_eq!(luma_plane(&src, Resolution::new(2, 2)).unwrap(), &[1, 2, 3, 4]);
        assert!(luma_plane(&src[..3], Resolution::new(2, 2)).is_err());
    }
}
