// Diagnostics channel - validation messages into the log
//
// The messenger is purely a side channel: the callback logs and always
// returns VK_FALSE, so it never aborts the call that triggered it.

use crate::error::{Error, Result, VkResultExt};
use ash::extensions::ext::DebugUtils;
use ash::vk;
use std::ffi::CStr;

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Owns the debug-utils entry points and the messenger created with them.
/// Must be dropped before the instance.
pub struct DebugMessenger {
    loader: DebugUtils,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    pub fn new(entry: &ash::Entry, instance: &ash::Instance) -> Result<Self> {
        // The loader silently substitutes panicking stubs for missing entry
        // points, so resolve both explicitly first.
        for name in [
            c"vkCreateDebugUtilsMessengerEXT",
            c"vkDestroyDebugUtilsMessengerEXT",
        ] {
            let resolved =
                unsafe { entry.get_instance_proc_addr(instance.handle(), name.as_ptr()) };
            if resolved.is_none() {
                return Err(Error::renderer(format!(
                    "GetInstanceProcAddr: Unable to find {} function",
                    name.to_string_lossy()
                )));
            }
        }

        let loader = DebugUtils::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }
            .renderer_context("Cannot create debug messenger")?;

        log::info!("Validation messages routed to the log");
        Ok(Self { loader, messenger })
    }
}

impl Drop for DebugMessenger {
    fn drop(&mut self) {
        unsafe {
            self.loader
                .destroy_debug_utils_messenger(self.messenger, None);
        }
    }
}

/// Log level a validation message is reported at.
fn severity_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> log::Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::Level::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::Level::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        log::Level::Info
    } else {
        log::Level::Debug
    }
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message);

    log::log!(
        severity_level(message_severity),
        "[Vulkan] {}",
        message.to_string_lossy()
    );

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_map_to_log_levels() {
        use vk::DebugUtilsMessageSeverityFlagsEXT as Severity;

        assert_eq!(severity_level(Severity::ERROR), log::Level::Error);
        assert_eq!(severity_level(Severity::WARNING), log::Level::Warn);
        assert_eq!(severity_level(Severity::INFO), log::Level::Info);
        assert_eq!(severity_level(Severity::VERBOSE), log::Level::Debug);
    }

    #[test]
    fn callback_never_aborts_the_call() {
        let callback_data = vk::DebugUtilsMessengerCallbackDataEXT {
            p_message: c"vkCreateDevice: something odd".as_ptr(),
            ..Default::default()
        };

        let verdict = unsafe {
            debug_callback(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
                &callback_data,
                std::ptr::null_mut(),
            )
        };
        assert_eq!(verdict, vk::FALSE);

        let verdict = unsafe {
            debug_callback(
                vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL,
                std::ptr::null(),
                std::ptr::null_mut(),
            )
        };
        assert_eq!(verdict, vk::FALSE);
    }
}
