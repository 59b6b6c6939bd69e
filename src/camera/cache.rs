//! Per-grab memo of decoded images.
//!
//! One grayscale slot and one color slot. Both are invalidated together on
//! every successful grab. The color slot remembers the exact layout it was
//! filled with, so asking for BGRA after BGR converts again instead of
//! handing back a 3-channel image.

use super::buffers::RawFrame;
use super::convert;
use super::types::{CameraError, OutputCategory, OutputKind, PixelFormat, PixelLayout};

#[derive(Debug, Default)]
pub(crate) struct ConversionCache {
    /// Copy the luma plane instead of borrowing it from the raw frame
    copy_gray: bool,
    gray_valid: bool,
    gray: Vec<u8>,
    /// Layout the color buffer currently holds; `None` when stale
    color_layout: Option<PixelLayout>,
    color: Vec<u8>,
    conversions: u64,
}

impl ConversionCache {
    pub fn new(copy_gray: bool) -> Self {
        Self {
            copy_gray,
            ..Self::default()
        }
    }

    /// Forget both decoded images. Allocations are kept for the next frame.
    pub fn invalidate(&mut self) {
        self.gray_valid = false;
        self.color_layout = None;
    }

    pub fn is_valid(&self, kind: OutputKind) -> bool {
        let layout = kind.layout();
        match layout.category {
            OutputCategory::Gray => self.gray_valid,
            OutputCategory::Color => self.color_layout == Some(layout),
        }
    }

    /// Number of conversions actually performed (cache misses).
    pub fn conversions(&self) -> u64 {
        self.conversions
    }

    /// Grayscale image of `frame`, `width * height` bytes.
    pub fn gray<'a>(&'a mut self, frame: &'a RawFrame) -> Result<&'a [u8], CameraError> {
        let luma = convert::luma_plane(frame.data(), frame.resolution())?;
        if !self.gray_valid {
            if self.copy_gray {
                self.gray.clear();
                self.gray.extend_from_slice(luma);
            }
            self.gray_valid = true;
            self.conversions += 1;
        }
        if self.copy_gray {
            Ok(self.gray.as_slice())
        } else {
            Ok(luma)
        }
    }

    /// Color image of `frame` in `layout`, or `None` if `format` is unknown.
    pub fn color(
        &mut self,
        frame: &RawFrame,
        format: PixelFormat,
        layout: PixelLayout,
    ) -> Result<Option<&[u8]>, CameraError> {
        if self.color_layout != Some(layout) {
            self.color_layout = None;
            let converted = convert::yuv420_to_color(
                frame.data(),
                frame.resolution(),
                format,
                layout,
                &mut self.color,
            )?;
            if !converted {
                return Ok(None);
            }
            self.color_layout = Some(layout);
            self.conversions += 1;
        }
        Ok(Some(self.color.as_slice()))
    }
}
