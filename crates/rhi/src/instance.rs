//! Vulkan instance creation and debug messenger wiring.

use std::ffi::CStr;

use ash::{Entry, vk};
use tracing::{error, info, warn};

use crate::error::RhiResult;

const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan instance wrapper with optional validation layer support.
///
/// Owns the entry loader, the instance handle and, when validation is
/// active, the debug messenger. Dropping the wrapper destroys everything
/// in the right order.
pub struct Instance {
    entry: Entry,
    instance: ash::Instance,
    debug_utils: Option<ash::ext::debug_utils::Instance>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl Instance {
    /// Creates a new Vulkan instance.
    ///
    /// When `enable_validation` is set and the Khronos validation layer is
    /// installed, a debug messenger routes validation output into tracing.
    /// A missing layer downgrades to a warning rather than an error.
    pub fn new(enable_validation: bool) -> RhiResult<Self> {
        let entry = unsafe { Entry::load()? };

        let validation_available =
            enable_validation && Self::is_validation_layer_available(&entry)?;
        if enable_validation && !validation_available {
            warn!("Validation layer requested but not available, proceeding without it");
        }

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"Prism")
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"Prism")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_2);

        let mut extensions = Self::required_extensions();
        if validation_available {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let layers = if validation_available {
            vec![VALIDATION_LAYER_NAME.as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None)? };
        info!("Vulkan instance created (API version 1.2)");

        let (debug_utils, debug_messenger) = if validation_available {
            let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
            let messenger = Self::create_debug_messenger(&debug_utils)?;
            info!("Validation layers enabled");
            (Some(debug_utils), Some(messenger))
        } else {
            (None, None)
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
            debug_messenger,
        })
    }

    /// Returns the Vulkan instance handle.
    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    /// Returns the Vulkan entry point loader.
    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Returns whether validation layers are enabled.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.debug_messenger.is_some()
    }

    /// Instance extensions for surface creation on the current platform.
    fn required_extensions() -> Vec<*const i8> {
        let mut extensions = vec![ash::khr::surface::NAME.as_ptr()];

        #[cfg(target_os = "windows")]
        extensions.push(ash::khr::win32_surface::NAME.as_ptr());

        #[cfg(target_os = "linux")]
        {
            extensions.push(ash::khr::xlib_surface::NAME.as_ptr());
            extensions.push(ash::khr::wayland_surface::NAME.as_ptr());
        }

        #[cfg(target_os = "macos")]
        extensions.push(ash::ext::metal_surface::NAME.as_ptr());

        extensions
    }

    fn is_validation_layer_available(entry: &Entry) -> RhiResult<bool> {
        let available_layers = unsafe { entry.enumerate_instance_layer_properties()? };
        let wanted = VALIDATION_LAYER_NAME.to_bytes_with_nul();

        Ok(available_layers.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name.to_bytes_with_nul() == wanted
        }))
    }

    fn create_debug_messenger(
        debug_utils: &ash::ext::debug_utils::Instance,
    ) -> RhiResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger =
            unsafe { debug_utils.create_debug_utils_messenger(&create_info, None)? };
        Ok(messenger)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            // Messenger must go before the instance
            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

/// Validation layer callback routing Vulkan messages into tracing.
///
/// # Safety
///
/// Called from the Vulkan driver; follows the driver's contract for debug
/// callbacks.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = unsafe { &*p_callback_data };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    let type_str = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "General",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "Validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "Performance",
        _ => "Unknown",
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            error!("[Vulkan {}] {}", type_str, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            warn!("[Vulkan {}] {}", type_str, message);
        }
        _ => {
            info!("[Vulkan {}] {}", type_str, message);
        }
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_extensions_include_surface() {
        let extensions = Instance::required_extensions();
        assert!(!extensions.is_empty());
        assert!(extensions.contains(&ash::khr::surface::NAME.as_ptr()));
    }

    #[test]
    fn test_instance_creation_without_validation() {
        // Requires a Vulkan loader and driver on the test machine
        match Instance::new(false) {
            Ok(instance) => assert!(!instance.has_validation()),
            Err(e) => {
                eprintln!("Skipping test: Vulkan not available ({})", e);
            }
        }
    }
}
