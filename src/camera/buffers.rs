//! Raw YUV 4:2:0 frame storage shared by the producer and the consumer.
//!
//! Two [`RawFrame`]s exist once the first frame has been grabbed: the
//! "next" one is written by the camera callback inside the gate, the
//! "current" one belongs to the consumer after a grab. They trade places by
//! moving the owned buffers, never by copying pixels.

use super::types::Resolution;

/// An owned planar YUV 4:2:0 frame tagged with the size it was allocated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    resolution: Resolution,
    data: Vec<u8>,
}

impl RawFrame {
    /// Allocate a zeroed buffer of `len` bytes, the validated
    /// `width*height*3/2` of `resolution`.
    pub(crate) fn new(resolution: Resolution, len: usize) -> Self {
        Self {
            resolution,
            data: vec![0; len],
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The luma plane: the first `width*height` bytes.
    pub fn luma(&self) -> &[u8] {
        &self.data[..self.resolution.pixel_count()]
    }

    /// Copy a delivered buffer in. The caller has already checked the length.
    pub(crate) fn fill_from(&mut self, src: &[u8]) {
        self.data.copy_from_slice(src);
    }
}

/// A slot that holds a [`RawFrame`] and reallocates it only on resize.
pub(crate) type FrameSlot = Option<RawFrame>;

/// Make sure `slot` holds a frame of `resolution`, returning it.
///
/// A frame of another size is dropped and replaced; a frame of the same
/// size is kept untouched so its allocation is reused.
pub(crate) fn prepare_slot(
    slot: &mut FrameSlot,
    resolution: Resolution,
    len: usize,
) -> &mut RawFrame {
    let needs_alloc = slot
        .as_ref()
        .map_or(true, |frame| frame.resolution() != resolution);

    if needs_alloc {
        if let Some(old) = slot.as_ref() {
            log::debug!(
                "Changing size of frame buffer from {} to {}",
                old.resolution(),
                resolution
            );
        }
        *slot = Some(RawFrame::new(resolution, len));
    }

    slot.get_or_insert_with(|| RawFrame::new(resolution, len))
}
