// Capability queries - instance/device extension and layer support
//
// Pure yes/no answers. A missing name is not an error here; the caller
// decides whether it is fatal.

use crate::error::{Result, VkResultExt};
use ash::vk;
use std::ffi::{c_char, CStr};

/// Exact, case-sensitive check that every `required` name is in `available`.
pub fn names_supported<'a>(
    available: impl IntoIterator<Item = &'a CStr> + Clone,
    required: &[&CStr],
) -> bool {
    required.iter().all(|&name| {
        let found = available.clone().into_iter().any(|candidate| candidate == name);
        log::debug!(
            "Checking '{}': {}",
            name.to_string_lossy(),
            if found { "supported" } else { "missing" }
        );
        found
    })
}

fn fixed_name(raw: &[c_char]) -> &CStr {
    // SAFETY: Vulkan guarantees the fixed-size name arrays are NUL-terminated.
    unsafe { CStr::from_ptr(raw.as_ptr()) }
}

pub fn extensions_supported(available: &[vk::ExtensionProperties], required: &[&CStr]) -> bool {
    names_supported(
        available.iter().map(|props| fixed_name(&props.extension_name)),
        required,
    )
}

pub fn layers_supported(available: &[vk::LayerProperties], required: &[&CStr]) -> bool {
    names_supported(
        available.iter().map(|props| fixed_name(&props.layer_name)),
        required,
    )
}

pub fn instance_extensions_supported(entry: &ash::Entry, required: &[&CStr]) -> Result<bool> {
    log::debug!("Checking instance extension support");
    let available = entry
        .enumerate_instance_extension_properties(None)
        .renderer_context("Cannot enumerate instance extensions")?;
    Ok(extensions_supported(&available, required))
}

pub fn instance_layers_supported(entry: &ash::Entry, required: &[&CStr]) -> Result<bool> {
    log::debug!("Checking instance layer support");
    let available = entry
        .enumerate_instance_layer_properties()
        .renderer_context("Cannot enumerate instance layers")?;
    Ok(layers_supported(&available, required))
}

pub fn device_extensions_supported(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    required: &[&CStr],
) -> Result<bool> {
    log::debug!("Checking physical device extension support");
    let available = unsafe { instance.enumerate_device_extension_properties(physical_device) }
        .renderer_context("Cannot enumerate device extensions")?;
    Ok(extensions_supported(&available, required))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extension(name: &str) -> vk::ExtensionProperties {
        let mut props = vk::ExtensionProperties::default();
        for (dst, src) in props.extension_name.iter_mut().zip(name.bytes()) {
            *dst = src as c_char;
        }
        props
    }

    fn layer(name: &str) -> vk::LayerProperties {
        let mut props = vk::LayerProperties::default();
        for (dst, src) in props.layer_name.iter_mut().zip(name.bytes()) {
            *dst = src as c_char;
        }
        props
    }

    #[test]
    fn all_present_in_any_order() {
        let available = [
            extension("VK_KHR_surface"),
            extension("VK_EXT_debug_utils"),
            extension("VK_KHR_xlib_surface"),
        ];
        assert!(extensions_supported(
            &available,
            &[c"VK_EXT_debug_utils", c"VK_KHR_surface"]
        ));
    }

    #[test]
    fn one_missing_name_fails() {
        let available = [extension("VK_KHR_surface")];
        assert!(!extensions_supported(
            &available,
            &[c"VK_KHR_surface", c"VK_KHR_swapchain"]
        ));
    }

    #[test]
    fn matching_is_exact_and_case_sensitive() {
        let available = [extension("VK_KHR_swapchain_mutable_format"), extension("vk_khr_swapchain")];
        assert!(!extensions_supported(&available, &[c"VK_KHR_swapchain"]));
    }

    #[test]
    fn empty_requirement_is_always_met() {
        assert!(extensions_supported(&[], &[]));
    }

    #[test]
    fn layers_use_the_same_rules() {
        let available = [layer("VK_LAYER_KHRONOS_validation")];
        assert!(layers_supported(&available, &[c"VK_LAYER_KHRONOS_validation"]));
        assert!(!layers_supported(&available, &[c"VK_LAYER_LUNARG_api_dump"]));
    }
}
