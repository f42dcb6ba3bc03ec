// Synchronization primitives
//
// One frame slot = one fence (GPU -> CPU) and two semaphores (GPU -> GPU).
// The fence is created signaled so the very first wait on a slot returns
// immediately.

use super::VulkanDevice;
use crate::error::{Result, VkResultExt};
use ash::vk;
use std::sync::Arc;

/// Frame synchronization - one per frame in flight
pub struct FrameSlot {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
    device: Arc<VulkanDevice>,
}

impl FrameSlot {
    pub fn new(device: Arc<VulkanDevice>) -> Result<Self> {
        // Null handles are fine to destroy if a later creation fails.
        let mut slot = Self {
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            in_flight_fence: vk::Fence::null(),
            device,
        };

        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        let device = &slot.device.device;
        slot.image_available = unsafe { device.create_semaphore(&semaphore_info, None) }
            .renderer_context("Failed to create semaphore")?;
        slot.render_finished = unsafe { device.create_semaphore(&semaphore_info, None) }
            .renderer_context("Failed to create semaphore")?;
        slot.in_flight_fence = unsafe { device.create_fence(&fence_info, None) }
            .renderer_context("Failed to create fence")?;

        Ok(slot)
    }

    /// Block until the GPU is done with the last frame that used this slot.
    pub fn wait(&self) -> Result<()> {
        unsafe {
            self.device
                .device
                .wait_for_fences(&[self.in_flight_fence], true, u64::MAX)
        }
        .renderer_context("Cannot wait for fences")
    }

    pub fn reset(&self) -> Result<()> {
        unsafe { self.device.device.reset_fences(&[self.in_flight_fence]) }
            .renderer_context("Cannot reset fence")
    }
}

impl Drop for FrameSlot {
    fn drop(&mut self) {
        let device = &self.device.device;
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_semaphore(self.render_finished, None);
            device.destroy_fence(self.in_flight_fence, None);
        }
    }
}
