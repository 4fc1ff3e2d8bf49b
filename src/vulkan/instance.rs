use std::{
    borrow::Cow,
    ffi::{c_void, CStr},
    os::raw::c_char,
    sync::Arc,
    thread,
};

use ash::{
    extensions::{ext, khr},
    vk,
};

use crate::{auxil, ApiVersion, ExtensionSet, InstanceError, InstanceFlags};

/// The newest API version whose promotions the backend accounts for.
const MAX_API_VERSION: ApiVersion = ApiVersion::V1_3;

const VALIDATION_LAYER: &[u8] = b"VK_LAYER_KHRONOS_validation\0";

unsafe fn lossy_cstr<'a>(ptr: *const c_char) -> Cow<'a, str> {
    if ptr.is_null() {
        Cow::Borrowed("")
    } else {
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy()
    }
}

unsafe extern "system" fn debug_utils_messenger_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data_ptr: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    if thread::panicking() {
        return vk::FALSE;
    }

    let level = match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE => log::Level::Debug,
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::Level::Info,
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::Level::Warn,
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::Level::Error,
        _ => log::Level::Warn,
    };

    let cd = unsafe { &*callback_data_ptr };
    let message_id_name = unsafe { lossy_cstr(cd.p_message_id_name) };
    let message = unsafe { lossy_cstr(cd.p_message) };

    let _ = std::panic::catch_unwind(|| {
        log::log!(
            level,
            "{:?} [{} (0x{:x})]\n\t{}",
            message_type,
            message_id_name,
            cd.message_id_number,
            message,
        );
    });

    if cd.object_count != 0 {
        let objects =
            unsafe { std::slice::from_raw_parts(cd.p_objects, cd.object_count as usize) };
        let names = objects
            .iter()
            .map(|obj_info| {
                let name = if obj_info.p_object_name.is_null() {
                    Cow::Borrowed("?")
                } else {
                    unsafe { lossy_cstr(obj_info.p_object_name) }
                };
                format!(
                    "(type: {:?}, hndl: 0x{:x}, name: {})",
                    obj_info.object_type, obj_info.object_handle, name
                )
            })
            .collect::<Vec<_>>();
        let _ = std::panic::catch_unwind(|| {
            log::log!(level, "\tobjects: {}", names.join(", "));
        });
    }

    vk::FALSE
}

impl super::InstanceShared {
    pub(super) fn raw(&self) -> &ash::Instance {
        &self.raw
    }

    pub(super) fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    /// `vkGetPhysicalDeviceFeatures2` through whichever entry point is available.
    pub(super) unsafe fn get_physical_device_features2(
        &self,
        phd: vk::PhysicalDevice,
        features: &mut vk::PhysicalDeviceFeatures2,
    ) -> bool {
        match self.get_physical_device_properties {
            Some(super::ExtensionFn::Extension(ref ext)) => unsafe {
                ext.get_physical_device_features2(phd, features)
            },
            Some(super::ExtensionFn::Promoted) => unsafe {
                self.raw.get_physical_device_features2(phd, features)
            },
            None => return false,
        }
        true
    }

    /// `vkGetPhysicalDeviceProperties2` through whichever entry point is available.
    pub(super) unsafe fn get_physical_device_properties2(
        &self,
        phd: vk::PhysicalDevice,
        properties: &mut vk::PhysicalDeviceProperties2,
    ) -> bool {
        match self.get_physical_device_properties {
            Some(super::ExtensionFn::Extension(ref ext)) => unsafe {
                ext.get_physical_device_properties2(phd, properties)
            },
            Some(super::ExtensionFn::Promoted) => unsafe {
                self.raw.get_physical_device_properties2(phd, properties)
            },
            None => return false,
        }
        true
    }
}

impl super::Instance {
    /// Instance extensions the backend would like to enable, filtered to the available ones.
    fn desired_extensions(
        available: &ExtensionSet,
        api_version: ApiVersion,
        flags: InstanceFlags,
    ) -> Vec<&'static CStr> {
        let mut extensions: Vec<&'static CStr> = Vec::new();

        if flags.contains(InstanceFlags::DEBUG) {
            extensions.push(ext::DebugUtils::name());
        }

        // Promoted to 1.1, the extension is only needed on 1.0 instances.
        if api_version < ApiVersion::V1_1 {
            extensions.push(khr::GetPhysicalDeviceProperties2::name());
        }

        extensions.retain(|&ext| {
            let name = ext.to_string_lossy();
            if available.contains(&name) {
                true
            } else {
                log::warn!("Unable to find extension: {}", name);
                false
            }
        });
        extensions
    }

    pub fn init(flags: InstanceFlags) -> Result<Self, InstanceError> {
        profiling::scope!("Init Vulkan Backend");

        let entry = unsafe {
            profiling::scope!("Load vk library");
            ash::Entry::load()
        }
        .map_err(|err| {
            InstanceError::with_source(String::from("missing Vulkan entry points"), err)
        })?;

        let loader_version = {
            profiling::scope!("vkEnumerateInstanceVersion");
            entry.try_enumerate_instance_version()
        };
        let loader_version = match loader_version {
            // Vulkan 1.1+
            Ok(Some(version)) => ApiVersion::unpack(version),
            Ok(None) => ApiVersion::V1_0,
            Err(err) => {
                return Err(InstanceError::with_source(
                    String::from("try_enumerate_instance_version() failed"),
                    err,
                ));
            }
        };
        let api_version = if loader_version < ApiVersion::V1_1 {
            // Vulkan 1.0 doesn't like anything but 1.0 passed in here...
            ApiVersion::V1_0
        } else {
            let minor = ApiVersion::new(loader_version.major, loader_version.minor, 0);
            minor.min(MAX_API_VERSION)
        };
        log::info!("Instance version: {} (loader {})", api_version, loader_version);

        let available = {
            profiling::scope!("vkEnumerateInstanceExtensionProperties");
            entry.enumerate_instance_extension_properties(None)
        }
        .map_err(|e| {
            InstanceError::with_source(
                String::from("enumerate_instance_extension_properties() failed"),
                e,
            )
        })?;
        let supported_extensions = ExtensionSet::from_properties(&available);
        let extensions = Self::desired_extensions(&supported_extensions, api_version, flags);

        let instance_layers = {
            profiling::scope!("vkEnumerateInstanceLayerProperties");
            entry.enumerate_instance_layer_properties()
        }
        .map_err(|e| {
            InstanceError::with_source(
                String::from("enumerate_instance_layer_properties() failed"),
                e,
            )
        })?;

        let validation_layer = CStr::from_bytes_with_nul(VALIDATION_LAYER)
            .map_err(|e| InstanceError::with_source(String::from("bad layer name"), e))?;
        let mut layers: Vec<&CStr> = Vec::new();
        if flags.contains(InstanceFlags::VALIDATION) {
            if instance_layers.iter().any(|layer| {
                auxil::cstr_from_bytes_until_nul(&layer.layer_name) == Some(validation_layer)
            }) {
                layers.push(validation_layer);
            } else {
                log::warn!(
                    "InstanceFlags::VALIDATION requested, but unable to find layer: {}",
                    validation_layer.to_string_lossy()
                );
            }
        }

        let app_name = CStr::from_bytes_with_nul(b"vkcts\0")
            .map_err(|e| InstanceError::with_source(String::from("bad application name"), e))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(app_name)
            .application_version(1)
            .engine_name(app_name)
            .engine_version(1)
            .api_version(api_version.pack());

        let str_pointers = layers
            .iter()
            .chain(extensions.iter())
            .map(|&s| s.as_ptr())
            .collect::<Vec<_>>();
        let (layer_pointers, extension_pointers) = str_pointers.split_at(layers.len());

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_layer_names(layer_pointers)
            .enabled_extension_names(extension_pointers);

        let raw = {
            profiling::scope!("vkCreateInstance");
            unsafe { entry.create_instance(&create_info, None) }
        }
        .map_err(|e| InstanceError::with_source(String::from("vkCreateInstance failed"), e))?;

        let debug_utils = if extensions.contains(&ext::DebugUtils::name()) {
            log::info!("Enabling debug utils");
            // having ERROR unconditionally because Vk doesn't like empty flags
            let mut severity = vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
            if log::max_level() >= log::LevelFilter::Debug {
                severity |= vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE;
            }
            if log::max_level() >= log::LevelFilter::Info {
                severity |= vk::DebugUtilsMessageSeverityFlagsEXT::INFO;
            }
            if log::max_level() >= log::LevelFilter::Warn {
                severity |= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING;
            }
            let vk_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
                .message_severity(severity)
                .message_type(
                    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                )
                .pfn_user_callback(Some(debug_utils_messenger_callback));

            let extension = ext::DebugUtils::new(&entry, &raw);
            match unsafe { extension.create_debug_utils_messenger(&vk_info, None) } {
                Ok(messenger) => Some(super::DebugUtils {
                    extension,
                    messenger,
                }),
                Err(err) => {
                    log::warn!("Failed to create debug messenger: {:?}", err);
                    None
                }
            }
        } else {
            None
        };

        let get_physical_device_properties =
            if extensions.contains(&khr::GetPhysicalDeviceProperties2::name()) {
                log::debug!("Enabling device properties2");
                Some(super::ExtensionFn::Extension(
                    khr::GetPhysicalDeviceProperties2::new(&entry, &raw),
                ))
            } else if api_version >= ApiVersion::V1_1 {
                Some(super::ExtensionFn::Promoted)
            } else {
                None
            };

        Ok(Self {
            shared: Arc::new(super::InstanceShared {
                raw,
                debug_utils,
                get_physical_device_properties,
                supported_extensions,
                api_version,
                _entry: entry,
            }),
        })
    }

    pub fn api_version(&self) -> ApiVersion {
        self.shared.api_version
    }

    pub fn supported_extensions(&self) -> &ExtensionSet {
        &self.shared.supported_extensions
    }

    pub fn enumerate_adapters(&self) -> Vec<super::Adapter> {
        let raw_devices = match unsafe { self.shared.raw.enumerate_physical_devices() } {
            Ok(devices) => devices,
            Err(err) => {
                log::error!("enumerate_adapters: {}", err);
                Vec::new()
            }
        };

        raw_devices
            .into_iter()
            .filter_map(|phd| super::Adapter::expose(&self.shared, phd))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desired_extensions_are_filtered() {
        let available: ExtensionSet = ["VK_EXT_debug_utils", "VK_KHR_surface"]
            .into_iter()
            .collect();

        let extensions =
            crate::vulkan::Instance::desired_extensions(&available, ApiVersion::V1_0, InstanceFlags::all());
        assert_eq!(extensions, [ext::DebugUtils::name()]);

        let extensions = crate::vulkan::Instance::desired_extensions(
            &available,
            ApiVersion::V1_2,
            InstanceFlags::empty(),
        );
        assert!(extensions.is_empty());
    }
}
