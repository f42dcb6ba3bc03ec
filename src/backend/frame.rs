// Frame loop driver
//
// Per draw, strictly in this order:
//   1. wait on the current slot's fence, then reset it
//   2. acquire an image (signals the slot's image-available semaphore)
//   3. submit the *image's* command buffer, waiting on image-available at
//      color-attachment output, signaling render-finished and the fence
//   4. present the image once render-finished is signaled
//   5. advance the slot
//
// The CPU can therefore be at most `slot_count` frames ahead of the GPU, and
// an image's command buffer is never resubmitted while still executing.
// Any failure is returned as-is; the slot is not advanced.

use crate::error::Result;

/// Number of frames that may be in flight at once.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// The GPU side of one draw, addressed by frame slot.
pub trait FrameTarget {
    /// Block until the slot's fence is signaled.
    fn wait_for_slot(&mut self, slot: usize) -> Result<()>;

    fn reset_slot(&mut self, slot: usize) -> Result<()>;

    /// Index of the next presentable image; readiness is signaled later on
    /// the slot's image-available semaphore.
    fn acquire_image(&mut self, slot: usize) -> Result<u32>;

    fn submit(&mut self, slot: usize, image_index: u32) -> Result<()>;

    fn present(&mut self, slot: usize, image_index: u32) -> Result<()>;
}

/// Owns the current-frame index.
#[derive(Debug)]
pub struct FrameLoop {
    current_frame: usize,
    slot_count: usize,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new(MAX_FRAMES_IN_FLIGHT)
    }
}

impl FrameLoop {
    pub fn new(slot_count: usize) -> Self {
        assert!(slot_count > 0, "frame loop needs at least one slot");
        Self {
            current_frame: 0,
            slot_count,
        }
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn draw(&mut self, target: &mut impl FrameTarget) -> Result<()> {
        let slot = self.current_frame;

        // Throttle
        target.wait_for_slot(slot)?;
        target.reset_slot(slot)?;

        let image_index = target.acquire_image(slot)?;
        target.submit(slot, image_index)?;
        target.present(slot, image_index)?;

        self.current_frame = (slot + 1) % self.slot_count;
        Ok(())
    }
}
