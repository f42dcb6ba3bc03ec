// Renderer
//
// Builds the backend in dependency order and owns it in drop order:
// frame slots, command buffers, pipeline + framebuffers, swapchain, device.
// Struct fields drop top to bottom, so the declaration order below is the
// teardown order.

use crate::backend::{
    CommandRecorder, FrameLoop, FrameSlot, FrameTarget, Swapchain, TrianglePipeline, VulkanDevice,
    MAX_FRAMES_IN_FLIGHT,
};
use crate::config::Config;
use crate::error::{Result, VkResultExt};
use crate::fs::FileSystem;
use crate::window::Window;
use ash::vk;
use std::sync::Arc;

/// Everything a draw touches on the GPU side.
struct Presenter {
    slots: Vec<FrameSlot>,
    commands: CommandRecorder,
    // Referenced by the recorded command buffers
    _pipeline: TrianglePipeline,
    swapchain: Swapchain,
    device: Arc<VulkanDevice>,
}

impl Presenter {
    fn slot(&self, slot: usize) -> &FrameSlot {
        &self.slots[slot]
    }
}

impl FrameTarget for Presenter {
    fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
        self.slot(slot).wait()
    }

    fn reset_slot(&mut self, slot: usize) -> Result<()> {
        self.slot(slot).reset()
    }

    fn acquire_image(&mut self, slot: usize) -> Result<u32> {
        self.swapchain
            .acquire_next_image(self.slot(slot).image_available)
    }

    fn submit(&mut self, slot: usize, image_index: u32) -> Result<()> {
        let sync = self.slot(slot);

        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [self.commands.buffers[image_index as usize]];
        let signal_semaphores = [sync.render_finished];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.device.queue_submit(
                self.device.graphics_queue,
                &[submit_info.build()],
                sync.in_flight_fence,
            )
        }
        .renderer_context("Cannot submit draw command buffer")
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<()> {
        // Presentation family's queue; the same as graphics when they match.
        self.swapchain.present(
            self.device.present_queue,
            image_index,
            &[self.slot(slot).render_finished],
        )
    }
}

/// Draws the triangle, one frame per `draw()` call.
pub struct Renderer {
    frames: FrameLoop,
    presenter: Presenter,
}

impl Renderer {
    pub fn new(file_system: &dyn FileSystem, window: &dyn Window, config: &Config) -> Result<Self> {
        log::info!("Initializing Vulkan...");

        let device = VulkanDevice::new(
            &config.window.title,
            window,
            config.debug.validation_layers,
        )?;
        let swapchain = Swapchain::new(device.clone(), window.size())?;
        let pipeline =
            TrianglePipeline::new(device.clone(), &swapchain, file_system, &config.shaders)?;
        let commands = CommandRecorder::new(
            device.clone(),
            &pipeline,
            swapchain.extent,
            config.graphics.clear_color,
        )?;
        let slots = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| FrameSlot::new(device.clone()))
            .collect::<Result<Vec<_>>>()?;

        log::info!("Vulkan initialized successfully!");
        Ok(Self {
            frames: FrameLoop::new(MAX_FRAMES_IN_FLIGHT),
            presenter: Presenter {
                slots,
                commands,
                _pipeline: pipeline,
                swapchain,
                device,
            },
        })
    }

    pub fn draw(&mut self) -> Result<()> {
        self.frames.draw(&mut self.presenter)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources...");
        // Nothing may be destroyed while a submitted frame still uses it.
        if let Err(e) = self.presenter.device.wait_idle() {
            log::error!("Failed to wait for device idle: {e}");
        }
    }
}
