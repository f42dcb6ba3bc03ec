// Swapchain - Window presentation
//
// Negotiates format, present mode, extent and image count with the surface,
// then wraps each swapchain image in a color view. Built once; this renderer
// never resizes, so there is no recreation path.

use super::device::{QueueFamilies, VulkanDevice};
use crate::error::{Error, Result, VkResultExt};
use ash::extensions::khr;
use ash::vk;
use std::sync::Arc;

/// Format used when the surface accepts anything.
pub const DEFAULT_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::R8G8B8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Pick the surface format.
///
/// A single `UNDEFINED` entry means the surface has no preference. Otherwise
/// RGBA8/BGRA8 unorm with sRGB non-linear is preferred, then the first entry.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Result<vk::SurfaceFormatKHR> {
    if let [only] = formats {
        if only.format == vk::Format::UNDEFINED {
            return Ok(DEFAULT_SURFACE_FORMAT);
        }
    }

    let preferred = formats.iter().find(|f| {
        (f.format == vk::Format::R8G8B8A8_UNORM || f.format == vk::Format::B8G8R8A8_UNORM)
            && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    match preferred {
        Some(format) => Ok(*format),
        None => {
            let fallback = formats
                .first()
                .copied()
                .ok_or_else(|| Error::renderer("Surface reports no formats"))?;
            log::warn!(
                "Cannot find required surface format. Falling back to {:?} / {:?}",
                fallback.format,
                fallback.color_space
            );
            Ok(fallback)
        }
    }
}

/// MAILBOX if offered, otherwise FIFO (always available).
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        log::warn!("Cannot find mailbox presentation mode. Falling back to FIFO.");
        vk::PresentModeKHR::FIFO
    }
}

/// Use the surface's extent unless it is the "any" sentinel; then take the
/// window size clamped per axis into the surface limits.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, window_size: (u32, u32)) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    let (width, height) = window_size;
    // Height is bounded by the height limits, not the width limits.
    vk::Extent2D {
        width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// One more than the minimum, capped by the maximum. A maximum of 0 means no cap.
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = caps.min_image_count + 1;
    if caps.max_image_count == 0 {
        count
    } else {
        count.clamp(caps.min_image_count, caps.max_image_count)
    }
}

/// Exclusive when one family does both jobs, otherwise concurrent across both.
pub fn choose_sharing(families: &QueueFamilies) -> (vk::SharingMode, Vec<u32>) {
    if families.is_shared() {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (vk::SharingMode::CONCURRENT, families.unique())
    }
}

pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub swapchain_loader: khr::Swapchain,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    device: Arc<VulkanDevice>,
}

impl Swapchain {
    pub fn new(device: Arc<VulkanDevice>, window_size: (u32, u32)) -> Result<Self> {
        let surface = device.surface;
        let surface_loader = &device.surface_loader;

        let caps = unsafe {
            surface_loader.get_physical_device_surface_capabilities(device.physical_device, surface)
        }
        .renderer_context("Cannot query surface capabilities")?;

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(device.physical_device, surface)
        }
        .renderer_context("Cannot query surface formats")?;

        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(device.physical_device, surface)
        }
        .renderer_context("Cannot query surface present modes")?;

        let surface_format = choose_surface_format(&formats)?;
        let present_mode = choose_present_mode(&present_modes);
        let extent = choose_extent(&caps, window_size);
        let image_count = choose_image_count(&caps);
        let (sharing_mode, queue_family_indices) = choose_sharing(&device.queue_families);

        log::info!(
            "Creating swapchain: {}x{}, {:?}, {:?}, {} images requested, {:?}",
            extent.width,
            extent.height,
            surface_format.format,
            present_mode,
            image_count,
            sharing_mode
        );

        let swapchain_loader = khr::Swapchain::new(&device.instance, &device.device);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&queue_family_indices)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None) }
            .renderer_context("Failed to create swapchain")?;

        // Build the wrapper early so a failed view creation still tears down
        // whatever already exists.
        let mut this = Self {
            swapchain,
            swapchain_loader,
            images: Vec::new(),
            image_views: Vec::new(),
            format: surface_format.format,
            extent,
            present_mode,
            device,
        };

        this.images = unsafe { this.swapchain_loader.get_swapchain_images(swapchain) }
            .renderer_context("Cannot get swapchain images")?;

        log::info!("Created swapchain with {} images", this.images.len());

        for i in 0..this.images.len() {
            let view = this.create_image_view(this.images[i])?;
            this.image_views.push(view);
        }

        Ok(this)
    }

    fn create_image_view(&self, image: vk::Image) -> Result<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(self.format)
            .components(vk::ComponentMapping::default())
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        unsafe { self.device.device.create_image_view(&create_info, None) }
            .renderer_context("Failed to create image view")
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Ask for the next image; `semaphore` is signaled once it is really free.
    /// Anything but plain success (including SUBOPTIMAL) is an error.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<u32> {
        let (index, suboptimal) = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        }
        .renderer_context("Cannot acquire next image from swapchain")?;

        if suboptimal {
            return Err(Error::Renderer {
                message: "Cannot acquire next image from swapchain (suboptimal)".to_string(),
                source: Some(vk::Result::SUBOPTIMAL_KHR),
            });
        }
        Ok(index)
    }

    /// Queue `image_index` for presentation once `wait_semaphores` signal.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<()> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let suboptimal = unsafe { self.swapchain_loader.queue_present(queue, &present_info) }
            .renderer_context("Cannot present image")?;

        if suboptimal {
            return Err(Error::Renderer {
                message: "Cannot present image (suboptimal)".to_string(),
                source: Some(vk::Result::SUBOPTIMAL_KHR),
            });
        }
        Ok(())
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.device.destroy_image_view(view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn capabilities(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            ..Default::default()
        }
    }

    #[test]
    fn single_undefined_format_means_anything_goes() {
        let chosen = choose_surface_format(&[format(
            vk::Format::UNDEFINED,
            vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        )])
        .unwrap();

        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn prefers_unorm_srgb_nonlinear() {
        let formats = [
            format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];

        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn falls_back_to_first_format() {
        let formats = [
            format(vk::Format::A2B10G10R10_UNORM_PACK32, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];

        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::A2B10G10R10_UNORM_PACK32);
    }

    #[test]
    fn no_formats_is_an_error() {
        assert!(choose_surface_format(&[]).is_err());
    }

    #[test]
    fn present_mode_prefers_mailbox() {
        let chosen = choose_present_mode(&[
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::MAILBOX,
        ]);
        assert_eq!(chosen, vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let chosen = choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE]);
        assert_eq!(chosen, vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn extent_uses_current_when_fixed() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1280,
                height: 720,
            },
            ..Default::default()
        };

        let chosen = choose_extent(&caps, (800, 600));
        assert_eq!(chosen.width, 1280);
        assert_eq!(chosen.height, 720);
    }

    #[test]
    fn extent_clamps_each_axis_to_its_own_bounds() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 640,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..Default::default()
        };

        // Height 1500 sits below the max width but above the max height.
        let chosen = choose_extent(&caps, (4000, 1500));
        assert_eq!(chosen.width, 1920);
        assert_eq!(chosen.height, 1080);

        let chosen = choose_extent(&caps, (320, 50));
        assert_eq!(chosen.width, 640);
        assert_eq!(chosen.height, 100);
    }

    #[test]
    fn image_count_without_cap() {
        assert_eq!(choose_image_count(&capabilities(2, 0)), 3);
    }

    #[test]
    fn image_count_clamped_to_max() {
        assert_eq!(choose_image_count(&capabilities(2, 3)), 3);
        assert_eq!(choose_image_count(&capabilities(3, 3)), 3);
    }

    #[test]
    fn sharing_follows_queue_families() {
        let (mode, indices) = choose_sharing(&QueueFamilies {
            graphics: 0,
            present: 0,
        });
        assert_eq!(mode, vk::SharingMode::EXCLUSIVE);
        assert!(indices.is_empty());

        let (mode, indices) = choose_sharing(&QueueFamilies {
            graphics: 2,
            present: 1,
        });
        assert_eq!(mode, vk::SharingMode::CONCURRENT);
        assert_eq!(indices, vec![1, 2]);
    }
}
