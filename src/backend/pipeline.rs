// Graphics pipeline creation and management
//
// One render pass (one color attachment, one subpass), a pipeline layout with
// no descriptor sets, and a fixed-function pipeline for the triangle. The
// geometry lives in the vertex shader, so no vertex input is declared.
// Everything here is immutable after construction.

use super::shader::ShaderModule;
use super::swapchain::Swapchain;
use super::VulkanDevice;
use crate::config::ShaderConfig;
use crate::error::{Error, Result, VkResultExt};
use crate::fs::FileSystem;
use ash::vk;
use std::ffi::CStr;
use std::sync::Arc;

const SHADER_ENTRY: &CStr = c"main";

/// The swapchain image: cleared on load, kept on store, handed to the
/// presentation engine afterwards.
pub fn color_attachment(format: vk::Format) -> vk::AttachmentDescription {
    vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build()
}

/// Layout transitions around subpass 0:
/// UNDEFINED -> COLOR_ATTACHMENT_OPTIMAL on entry, -> PRESENT_SRC_KHR on exit.
pub fn subpass_dependencies() -> [vk::SubpassDependency; 2] {
    let color_access =
        vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE;

    [
        // Entry: no color-attachment access until earlier reads are done.
        vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::MEMORY_READ)
            .dst_access_mask(color_access)
            .build(),
        // Exit: writes finish before the presentation engine reads.
        vk::SubpassDependency::builder()
            .src_subpass(0)
            .dst_subpass(vk::SUBPASS_EXTERNAL)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
            .src_access_mask(color_access)
            .dst_access_mask(vk::AccessFlags::MEMORY_READ)
            .build(),
    ]
}

/// Standard alpha compositing: src.a * src + (1 - src.a) * dst, alpha passes through.
pub fn alpha_blend_attachment() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::builder()
        .blend_enable(true)
        .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
        .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
        .alpha_blend_op(vk::BlendOp::ADD)
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .build()
}

/// Viewport covering the whole swapchain image.
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Render pass, pipeline and one framebuffer per swapchain image.
pub struct TrianglePipeline {
    pub framebuffers: Vec<vk::Framebuffer>,
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    device: Arc<VulkanDevice>,
}

impl TrianglePipeline {
    pub fn new(
        device: Arc<VulkanDevice>,
        swapchain: &Swapchain,
        file_system: &dyn FileSystem,
        shaders: &ShaderConfig,
    ) -> Result<Self> {
        // Null handles are valid to destroy, so a half-built pipeline
        // cleans up after itself on early return.
        let mut this = Self {
            framebuffers: Vec::new(),
            pipeline: vk::Pipeline::null(),
            layout: vk::PipelineLayout::null(),
            render_pass: vk::RenderPass::null(),
            device,
        };

        this.render_pass = this.create_render_pass(swapchain.format)?;
        this.layout = this.create_layout()?;

        let vertex_code = file_system.read_file(&shaders.vertex)?;
        let fragment_code = file_system.read_file(&shaders.fragment)?;
        this.pipeline = this.create_pipeline(swapchain.extent, &vertex_code, &fragment_code)?;

        for &view in &swapchain.image_views {
            let framebuffer = this.create_framebuffer(view, swapchain.extent)?;
            this.framebuffers.push(framebuffer);
        }

        log::info!(
            "Graphics pipeline ready ({} framebuffers)",
            this.framebuffers.len()
        );
        Ok(this)
    }

    fn create_render_pass(&self, format: vk::Format) -> Result<vk::RenderPass> {
        let attachments = [color_attachment(format)];

        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];

        let subpasses = [vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .build()];

        let dependencies = subpass_dependencies();

        let render_pass_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        unsafe { self.device.device.create_render_pass(&render_pass_info, None) }
            .renderer_context("Failed to create render pass")
    }

    fn create_layout(&self) -> Result<vk::PipelineLayout> {
        // No descriptor sets, no push constants.
        let layout_info = vk::PipelineLayoutCreateInfo::builder();

        unsafe { self.device.device.create_pipeline_layout(&layout_info, None) }
            .renderer_context("Failed to create pipeline layout")
    }

    fn create_pipeline(
        &self,
        extent: vk::Extent2D,
        vertex_code: &[u8],
        fragment_code: &[u8],
    ) -> Result<vk::Pipeline> {
        // Modules are dropped as soon as the pipeline exists.
        let vert_shader = ShaderModule::new(&self.device, vertex_code)?;
        let frag_shader = ShaderModule::new(&self.device, fragment_code)?;

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vert_shader.module)
                .name(SHADER_ENTRY)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(frag_shader.module)
                .name(SHADER_ENTRY)
                .build(),
        ];

        // Vertex input: nothing, positions come from gl_VertexIndex
        let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder();

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewports = [full_viewport(extent)];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let color_blend_attachments = [alpha_blend_attachment()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        // No depth/stencil state, no dynamic state
        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .layout(self.layout)
            .render_pass(self.render_pass)
            .subpass(0)
            .build();

        let pipelines = unsafe {
            self.device.device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                &[pipeline_info],
                None,
            )
        }
        .map_err(|(_, e)| e)
        .renderer_context("Failed to create graphics pipeline")?;

        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| Error::renderer("Driver returned no graphics pipeline"))
    }

    fn create_framebuffer(&self, view: vk::ImageView, extent: vk::Extent2D) -> Result<vk::Framebuffer> {
        // Must match the render pass attachment list
        let attachments = [view];
        let framebuffer_info = vk::FramebufferCreateInfo::builder()
            .render_pass(self.render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        unsafe { self.device.device.create_framebuffer(&framebuffer_info, None) }
            .renderer_context("Failed to create framebuffer")
    }
}

impl Drop for TrianglePipeline {
    fn drop(&mut self) {
        let device = &self.device.device;
        unsafe {
            for &framebuffer in &self.framebuffers {
                device.destroy_framebuffer(framebuffer, None);
            }
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_pipeline_layout(self.layout, None);
            device.destroy_render_pass(self.render_pass, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_attachment_goes_from_undefined_to_present() {
        let attachment = color_attachment(vk::Format::B8G8R8A8_UNORM);

        assert_eq!(attachment.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(attachment.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(attachment.initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(attachment.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn entry_dependency_waits_for_color_output() {
        let [entry, _] = subpass_dependencies();

        assert_eq!(entry.src_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(entry.dst_subpass, 0);
        assert_eq!(entry.dst_stage_mask, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert!(entry
            .dst_access_mask
            .contains(vk::AccessFlags::COLOR_ATTACHMENT_WRITE));
    }

    #[test]
    fn exit_dependency_finishes_before_presentation() {
        let [_, exit] = subpass_dependencies();

        assert_eq!(exit.src_subpass, 0);
        assert_eq!(exit.dst_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(exit.src_stage_mask, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(exit.dst_stage_mask, vk::PipelineStageFlags::BOTTOM_OF_PIPE);
        assert_eq!(exit.dst_access_mask, vk::AccessFlags::MEMORY_READ);
    }

    #[test]
    fn blending_is_standard_alpha_compositing() {
        let blend = alpha_blend_attachment();

        assert_eq!(blend.blend_enable, vk::TRUE);
        assert_eq!(blend.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
        assert_eq!(blend.dst_color_blend_factor, vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
        assert_eq!(blend.color_blend_op, vk::BlendOp::ADD);
        assert_eq!(blend.color_write_mask, vk::ColorComponentFlags::RGBA);
    }

    #[test]
    fn viewport_matches_extent() {
        let viewport = full_viewport(vk::Extent2D {
            width: 800,
            height: 600,
        });

        assert_eq!(viewport.width, 800.0);
        assert_eq!(viewport.height, 600.0);
        assert_eq!(viewport.max_depth, 1.0);
    }
}
