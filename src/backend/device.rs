// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Instance creation (window extensions, optional validation)
// - Diagnostics messenger
// - Presentation surface
// - Physical device selection (first suitable, not best)
// - Logical device + graphics/presentation queues
// - Memory allocator setup

use super::capabilities;
use super::debug::{DebugMessenger, VALIDATION_LAYER};
use crate::error::{Error, Result, VkResultExt};
use crate::window::Window;
use ash::extensions::{ext::DebugUtils, khr};
use ash::{vk, Entry};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::ffi::{CStr, CString};
use std::mem::ManuallyDrop;
use std::sync::Arc;

/// Device extensions every candidate must support.
pub const REQUIRED_DEVICE_EXTENSIONS: [&CStr; 1] = [c"VK_KHR_swapchain"];

static QUEUE_PRIORITIES: [f32; 1] = [1.0];

/// Queue family indices found while scanning a physical device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Both indices resolved, or `None`.
    pub fn resolve(self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics?,
            present: self.present?,
        })
    }
}

/// Resolved queue families of the selected device. May name the same family twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Distinct family indices, ascending.
    pub fn unique(&self) -> Vec<u32> {
        BTreeSet::from([self.graphics, self.present])
            .into_iter()
            .collect()
    }

    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }
}

/// Scan queue families, keeping the *last* graphics-capable and the *last*
/// presentation-capable index. Empty families are skipped.
pub fn find_queue_families(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: impl FnMut(u32) -> Result<bool>,
) -> Result<QueueFamilyIndices> {
    let mut indices = QueueFamilyIndices::default();

    for (index, props) in families.iter().enumerate() {
        let index = index as u32;
        if props.queue_count == 0 {
            continue;
        }
        if props.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics = Some(index);
        }
        if supports_present(index)? {
            indices.present = Some(index);
        }
    }

    Ok(indices)
}

/// Everything that decides whether a physical device is usable.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceSuitability {
    pub queue_families: QueueFamilyIndices,
    pub extensions_supported: bool,
    pub present_mode_count: usize,
    pub surface_format_count: usize,
}

impl DeviceSuitability {
    pub fn is_suitable(&self) -> bool {
        self.queue_families.resolve().is_some()
            && self.extensions_supported
            && self.present_mode_count > 0
            && self.surface_format_count > 0
    }
}

/// Return the first device, in enumeration order, whose probe says it is
/// suitable. No ranking beyond that.
pub fn select_first_suitable<T: Copy>(
    devices: &[T],
    mut probe: impl FnMut(T) -> Result<DeviceSuitability>,
) -> Result<(T, QueueFamilies)> {
    for &device in devices {
        let suitability = probe(device)?;
        if !suitability.is_suitable() {
            continue;
        }
        if let Some(families) = suitability.queue_families.resolve() {
            return Ok((device, families));
        }
    }
    Err(Error::renderer("Cannot find suitable physical device"))
}

/// One create-info per distinct family, one queue each.
pub fn queue_create_infos(families: &QueueFamilies) -> Vec<vk::DeviceQueueCreateInfo> {
    families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family)
                .queue_priorities(&QUEUE_PRIORITIES)
                .build()
        })
        .collect()
}

/// Vulkan device wrapper with automatic cleanup
pub struct VulkanDevice {
    allocator: ManuallyDrop<Mutex<Allocator>>,
    pub device: ash::Device,

    // Queue handles (may alias the same queue)
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub queue_families: QueueFamilies,

    pub physical_device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,

    // Presentation surface, created by the window
    pub surface: vk::SurfaceKHR,
    pub surface_loader: khr::Surface,

    debug: Option<DebugMessenger>,
    pub instance: ash::Instance,
    _entry: Entry,
}

impl VulkanDevice {
    /// Create the instance, surface and logical device for `window`.
    ///
    /// # Arguments
    /// * `app_name` - Application name reported to the driver
    /// * `window` - Supplies instance extensions and the surface
    /// * `enable_validation` - Require validation layers and route their output to the log
    pub fn new(app_name: &str, window: &dyn Window, enable_validation: bool) -> Result<Arc<Self>> {
        log::info!("Creating Vulkan device: {}", app_name);

        // Step 1: Load Vulkan library
        let entry = unsafe { Entry::load() }
            .map_err(|e| Error::renderer(format!("Failed to load Vulkan library: {e}")))?;

        // Step 2: Create instance
        let instance = Self::create_instance(&entry, app_name, window, enable_validation)?;

        // Step 3: Diagnostics
        let debug = if enable_validation {
            Some(DebugMessenger::new(&entry, &instance)?)
        } else {
            None
        };

        // Step 4: Surface
        let surface_loader = khr::Surface::new(&entry, &instance);
        let surface = window.create_surface(&entry, &instance)?;

        // Step 5: Pick physical device (GPU)
        let (physical_device, queue_families) =
            Self::pick_physical_device(&instance, &surface_loader, surface)?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        log::info!(
            "Selected GPU: {}",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy()
        );
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );
        log::info!(
            "Queue families: graphics {}, presentation {}",
            queue_families.graphics,
            queue_families.present
        );

        // Step 6: Create logical device
        let device = Self::create_logical_device(&instance, physical_device, &queue_families)?;
        let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(queue_families.present, 0) };

        // Step 7: Create memory allocator
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| Error::renderer(format!("Cannot create memory allocator: {e}")))?;

        Ok(Arc::new(Self {
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            device,
            graphics_queue,
            present_queue,
            queue_families,
            physical_device,
            properties,
            surface,
            surface_loader,
            debug,
            instance,
            _entry: entry,
        }))
    }

    fn create_instance(
        entry: &Entry,
        app_name: &str,
        window: &dyn Window,
        enable_validation: bool,
    ) -> Result<ash::Instance> {
        let app_name_cstr = CString::new(app_name)
            .map_err(|_| Error::renderer("Application name contains a NUL byte"))?;

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(1)
            .engine_name(c"vk-triangle")
            .engine_version(1)
            .api_version(vk::API_VERSION_1_1);

        let mut extensions = window.required_instance_extensions()?;
        if enable_validation {
            extensions.push(DebugUtils::name());
        }

        if !capabilities::instance_extensions_supported(entry, &extensions)? {
            return Err(Error::renderer(
                "Some required Vulkan instance extensions are not supported",
            ));
        }

        let layers: Vec<&CStr> = if enable_validation {
            vec![VALIDATION_LAYER]
        } else {
            vec![]
        };

        if !capabilities::instance_layers_supported(entry, &layers)? {
            return Err(Error::renderer(
                "Some required Vulkan instance layers are not supported",
            ));
        }

        let extension_ptrs: Vec<_> = extensions.iter().map(|name| name.as_ptr()).collect();
        let layer_ptrs: Vec<_> = layers.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        unsafe { entry.create_instance(&create_info, None) }
            .renderer_context("Failed to create Vulkan instance")
    }

    fn pick_physical_device(
        instance: &ash::Instance,
        surface_loader: &khr::Surface,
        surface: vk::SurfaceKHR,
    ) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
        let devices = unsafe { instance.enumerate_physical_devices() }
            .renderer_context("Cannot enumerate physical devices")?;

        select_first_suitable(&devices, |device| {
            Self::probe_device(instance, surface_loader, surface, device)
        })
    }

    /// Gather suitability facts, stopping at the first failed predicate.
    fn probe_device(
        instance: &ash::Instance,
        surface_loader: &khr::Surface,
        surface: vk::SurfaceKHR,
        device: vk::PhysicalDevice,
    ) -> Result<DeviceSuitability> {
        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
        let queue_families = find_queue_families(&families, |index| {
            unsafe { surface_loader.get_physical_device_surface_support(device, index, surface) }
                .renderer_context("Cannot query surface support")
        })?;

        let mut suitability = DeviceSuitability {
            queue_families,
            ..Default::default()
        };
        if queue_families.resolve().is_none() {
            return Ok(suitability);
        }

        suitability.extensions_supported = capabilities::device_extensions_supported(
            instance,
            device,
            &REQUIRED_DEVICE_EXTENSIONS,
        )?;
        if !suitability.extensions_supported {
            return Ok(suitability);
        }

        suitability.present_mode_count = unsafe {
            surface_loader.get_physical_device_surface_present_modes(device, surface)
        }
        .renderer_context("Cannot query surface present modes")?
        .len();
        if suitability.present_mode_count == 0 {
            return Ok(suitability);
        }

        suitability.surface_format_count =
            unsafe { surface_loader.get_physical_device_surface_formats(device, surface) }
                .renderer_context("Cannot query surface formats")?
                .len();

        Ok(suitability)
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        queue_families: &QueueFamilies,
    ) -> Result<ash::Device> {
        let queue_infos = queue_create_infos(queue_families);
        let extensions: Vec<_> = REQUIRED_DEVICE_EXTENSIONS
            .iter()
            .map(|name| name.as_ptr())
            .collect();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions);

        unsafe { instance.create_device(physical_device, &create_info, None) }
            .renderer_context("Failed to create logical device")
    }

    /// Allocator shared by buffer helpers.
    pub fn allocator(&self) -> &Mutex<Allocator> {
        &self.allocator
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.renderer_context("Cannot wait for device idle")
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        let _ = self.wait_idle();

        // Cleanup in reverse order of creation
        unsafe {
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            drop(self.debug.take());
            self.instance.destroy_instance(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    fn suitable(graphics: u32, present: u32) -> DeviceSuitability {
        DeviceSuitability {
            queue_families: QueueFamilyIndices {
                graphics: Some(graphics),
                present: Some(present),
            },
            extensions_supported: true,
            present_mode_count: 2,
            surface_format_count: 1,
        }
    }

    #[test]
    fn scan_keeps_last_matching_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 1),
            family(vk::QueueFlags::TRANSFER, 1),
            family(vk::QueueFlags::GRAPHICS, 2),
        ];

        let indices = find_queue_families(&families, |index| Ok(index < 2)).unwrap();
        assert_eq!(indices.graphics, Some(2));
        assert_eq!(indices.present, Some(1));
    }

    #[test]
    fn scan_skips_empty_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 1),
            family(vk::QueueFlags::GRAPHICS, 0),
        ];

        let mut asked = Vec::new();
        let indices = find_queue_families(&families, |index| {
            asked.push(index);
            Ok(true)
        })
        .unwrap();

        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(0));
        assert_eq!(asked, vec![0]);
    }

    #[test]
    fn scan_without_presentation_leaves_it_unresolved() {
        let families = [family(vk::QueueFlags::GRAPHICS, 1)];
        let indices = find_queue_families(&families, |_| Ok(false)).unwrap();

        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, None);
        assert!(indices.resolve().is_none());
    }

    #[test]
    fn every_predicate_is_required() {
        assert!(suitable(0, 0).is_suitable());

        let mut no_present = suitable(0, 0);
        no_present.queue_families.present = None;
        assert!(!no_present.is_suitable());

        let mut no_extensions = suitable(0, 0);
        no_extensions.extensions_supported = false;
        assert!(!no_extensions.is_suitable());

        let mut no_modes = suitable(0, 0);
        no_modes.present_mode_count = 0;
        assert!(!no_modes.is_suitable());

        let mut no_formats = suitable(0, 0);
        no_formats.surface_format_count = 0;
        assert!(!no_formats.is_suitable());
    }

    #[test]
    fn selection_is_first_match_in_enumeration_order() {
        let devices = [10u32, 20, 30, 40];
        let (chosen, families) = select_first_suitable(&devices, |device| {
            Ok(match device {
                // Enumerated first but lacks the swapchain extension.
                10 => DeviceSuitability {
                    extensions_supported: false,
                    ..suitable(0, 0)
                },
                20 => suitable(1, 2),
                _ => suitable(0, 0),
            })
        })
        .unwrap();

        assert_eq!(chosen, 20);
        assert_eq!(families, QueueFamilies { graphics: 1, present: 2 });
    }

    #[test]
    fn no_suitable_device_is_a_renderer_error() {
        let devices = [1u32, 2];
        let result = select_first_suitable(&devices, |_| Ok(DeviceSuitability::default()));

        assert!(matches!(result, Err(Error::Renderer { .. })));
    }

    #[test]
    fn probe_failures_propagate() {
        let devices = [1u32];
        let result = select_first_suitable(&devices, |_| {
            Err::<DeviceSuitability, _>(Error::renderer("lost"))
        });
        assert!(result.is_err());
    }

    #[test]
    fn shared_family_gets_one_queue_create_entry() {
        let families = QueueFamilies { graphics: 3, present: 3 };
        let infos = queue_create_infos(&families);

        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].queue_family_index, 3);
        assert_eq!(infos[0].queue_count, 1);
        assert!(families.is_shared());
    }

    #[test]
    fn distinct_families_get_two_queue_create_entries() {
        let families = QueueFamilies { graphics: 2, present: 0 };
        let infos = queue_create_infos(&families);

        let indices: Vec<u32> = infos.iter().map(|info| info.queue_family_index).collect();
        assert_eq!(indices, vec![0, 2]);
        assert!(!families.is_shared());
    }
}
