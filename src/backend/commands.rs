// Command recording
//
// One primary command buffer per swapchain image, recorded exactly once.
// Nothing in the pass changes between frames (no dynamic state, fixed
// geometry, fixed attachments), so the same buffers are resubmitted forever.

use super::pipeline::TrianglePipeline;
use super::VulkanDevice;
use crate::error::{Result, VkResultExt};
use ash::vk;
use std::sync::Arc;

/// The whole scene: three vertices, one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

pub const TRIANGLE: DrawCall = DrawCall {
    vertex_count: 3,
    instance_count: 1,
    first_vertex: 0,
    first_instance: 0,
};

pub fn clear_value(color: [f32; 4]) -> vk::ClearValue {
    vk::ClearValue {
        color: vk::ClearColorValue { float32: color },
    }
}

pub struct CommandRecorder {
    pool: vk::CommandPool,
    /// Indexed by swapchain image
    pub buffers: Vec<vk::CommandBuffer>,
    device: Arc<VulkanDevice>,
}

impl CommandRecorder {
    pub fn new(
        device: Arc<VulkanDevice>,
        pipeline: &TrianglePipeline,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) -> Result<Self> {
        // Buffers are never reset, so the pool needs no flags.
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.queue_families.graphics);

        let pool = unsafe { device.device.create_command_pool(&pool_info, None) }
            .renderer_context("Failed to create command pool")?;

        let mut recorder = Self {
            pool,
            buffers: Vec::new(),
            device,
        };

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(pipeline.framebuffers.len() as u32);

        recorder.buffers = unsafe { recorder.device.device.allocate_command_buffers(&alloc_info) }
            .renderer_context("Failed to allocate command buffers")?;

        recorder.record(pipeline, extent, clear_value(clear_color))?;

        log::info!("Recorded {} command buffers", recorder.buffers.len());
        Ok(recorder)
    }

    fn record(
        &self,
        pipeline: &TrianglePipeline,
        extent: vk::Extent2D,
        clear: vk::ClearValue,
    ) -> Result<()> {
        let device = &self.device.device;
        let clear_values = [clear];

        for (&cmd, &framebuffer) in self.buffers.iter().zip(&pipeline.framebuffers) {
            // No SIMULTANEOUS_USE: the frame loop never has one image's
            // buffer in flight twice.
            let begin_info = vk::CommandBufferBeginInfo::builder();

            let render_pass_begin = vk::RenderPassBeginInfo::builder()
                .render_pass(pipeline.render_pass)
                .framebuffer(framebuffer)
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                })
                .clear_values(&clear_values);

            unsafe {
                device
                    .begin_command_buffer(cmd, &begin_info)
                    .renderer_context("Failed to begin command buffer")?;

                device.cmd_begin_render_pass(cmd, &render_pass_begin, vk::SubpassContents::INLINE);
                device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
                device.cmd_draw(
                    cmd,
                    TRIANGLE.vertex_count,
                    TRIANGLE.instance_count,
                    TRIANGLE.first_vertex,
                    TRIANGLE.first_instance,
                );
                device.cmd_end_render_pass(cmd);

                device
                    .end_command_buffer(cmd)
                    .renderer_context("Failed to end command buffer")?;
            }
        }

        Ok(())
    }
}

impl Drop for CommandRecorder {
    fn drop(&mut self) {
        // Frees the buffers too
        unsafe { self.device.device.destroy_command_pool(self.pool, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_is_a_single_non_indexed_draw() {
        assert_eq!(TRIANGLE.vertex_count, 3);
        assert_eq!(TRIANGLE.instance_count, 1);
        assert_eq!(TRIANGLE.first_vertex, 0);
        assert_eq!(TRIANGLE.first_instance, 0);
    }

    #[test]
    fn clear_value_carries_the_color() {
        let clear = clear_value([0.5, 0.5, 0.5, 0.5]);
        let color = unsafe { clear.color.float32 };
        assert_eq!(color, [0.5, 0.5, 0.5, 0.5]);
    }
}
