/*!
# Vulkan backend

The backend owns one instance, one physical device and one logical device
with a single universal queue.

Every object created through [`Device`] is an RAII wrapper holding an
`Arc<DeviceShared>`, so the logical device and the instance outlive all of
their children no matter in which order the caller drops things.

Host access to device memory goes through `gpu-alloc` blocks. Reading a
buffer back requires the [`SubmissionComplete`] token returned by
[`Device::submit_and_wait`], which ties host reads to a finished fence wait.
!*/

mod adapter;
mod command;
mod context;
mod conv;
mod device;
mod instance;

use std::sync::Arc;

use ash::{
    extensions::{ext, khr},
    vk,
};
use parking_lot::Mutex;

pub use adapter::{Adapter, AdapterInfo, PhysicalDeviceCapabilities, RayTracingProperties};
pub use command::{CommandEncoder, TraceRegions};
pub use context::Context;
pub use device::{
    Buffer, BufferDescriptor, DescriptorPool, DescriptorSetLayout, Image, ImageDescriptor,
    ImageView, MemoryUsage, Pipeline, PipelineLayout, ShaderModule, SubmissionComplete,
};

use crate::{ApiVersion, ExtensionSet};

type DeviceResult<T> = Result<T, crate::DeviceError>;

struct DebugUtils {
    extension: ext::DebugUtils,
    messenger: vk::DebugUtilsMessengerEXT,
}

/// Either the loaded functions of an extension, or a marker that the
/// functionality is core in the API version in use.
enum ExtensionFn<T> {
    /// The loaded function pointer struct for an extension.
    Extension(T),
    /// The extension was promoted to a core version of Vulkan and the functions on `ash::Instance`
    /// or `ash::Device` should be used.
    Promoted,
}

pub(crate) struct InstanceShared {
    raw: ash::Instance,
    debug_utils: Option<DebugUtils>,
    get_physical_device_properties: Option<ExtensionFn<khr::GetPhysicalDeviceProperties2>>,
    /// Extensions the loader reports, enabled or not.
    supported_extensions: ExtensionSet,
    /// Version passed in `VkApplicationInfo`, clamped to what the backend knows.
    api_version: ApiVersion,
    // Last, so that the library is unloaded after the instance is destroyed.
    _entry: ash::Entry,
}

pub struct Instance {
    shared: Arc<InstanceShared>,
}

struct DeviceExtensionFunctions {
    buffer_device_address: Option<ExtensionFn<khr::BufferDeviceAddress>>,
    ray_tracing_pipeline: Option<khr::RayTracingPipeline>,
}

pub(crate) struct DeviceShared {
    raw: ash::Device,
    /// Destroyed after the device.
    _instance: Arc<InstanceShared>,
    family_index: u32,
    extension_fns: DeviceExtensionFunctions,
    mem_allocator: Mutex<gpu_alloc::GpuAllocator<vk::DeviceMemory>>,
    valid_ash_memory_types: u32,
}

pub struct Device {
    shared: Arc<DeviceShared>,
    raw_queue: Mutex<vk::Queue>,
    api_version: ApiVersion,
    ray_tracing: Option<RayTracingProperties>,
}

impl Drop for InstanceShared {
    fn drop(&mut self) {
        unsafe {
            if let Some(du) = self.debug_utils.take() {
                du.extension
                    .destroy_debug_utils_messenger(du.messenger, None);
            }
            self.raw.destroy_instance(None);
        }
    }
}

impl Drop for DeviceShared {
    fn drop(&mut self) {
        unsafe {
            if let Err(err) = self.raw.device_wait_idle() {
                log::warn!("vkDeviceWaitIdle failed on drop: {:?}", err);
            }
            self.mem_allocator.lock().cleanup(&*self);
            self.raw.destroy_device(None);
        }
    }
}

impl From<vk::Result> for crate::DeviceError {
    fn from(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
                Self::OutOfMemory
            }
            vk::Result::ERROR_DEVICE_LOST => Self::Lost,
            vk::Result::ERROR_EXTENSION_NOT_PRESENT | vk::Result::ERROR_FEATURE_NOT_PRESENT => {
                Self::Unsupported
            }
            _ => {
                log::warn!("Unrecognized device error {:?}", result);
                Self::Lost
            }
        }
    }
}

impl From<gpu_alloc::AllocationError> for crate::DeviceError {
    fn from(error: gpu_alloc::AllocationError) -> Self {
        use gpu_alloc::AllocationError as Ae;
        match error {
            Ae::OutOfDeviceMemory | Ae::OutOfHostMemory => Self::OutOfMemory,
            _ => {
                log::error!("memory allocation: {:?}", error);
                Self::Lost
            }
        }
    }
}

impl From<gpu_alloc::MapError> for crate::DeviceError {
    fn from(error: gpu_alloc::MapError) -> Self {
        use gpu_alloc::MapError as Me;
        match error {
            Me::OutOfDeviceMemory | Me::OutOfHostMemory => Self::OutOfMemory,
            _ => {
                log::error!("memory mapping: {:?}", error);
                Self::Lost
            }
        }
    }
}

impl From<vk::Result> for crate::ShaderError {
    fn from(result: vk::Result) -> Self {
        Self::Device(result.into())
    }
}

impl From<vk::Result> for crate::PipelineError {
    fn from(result: vk::Result) -> Self {
        Self::Device(result.into())
    }
}

#[cfg(test)]
mod tests {
    use ash::vk;

    use crate::DeviceError;

    #[test]
    fn vk_results_map_to_device_errors() {
        assert_eq!(
            DeviceError::from(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
            DeviceError::OutOfMemory
        );
        assert_eq!(
            DeviceError::from(vk::Result::ERROR_DEVICE_LOST),
            DeviceError::Lost
        );
        assert_eq!(
            DeviceError::from(vk::Result::ERROR_FEATURE_NOT_PRESENT),
            DeviceError::Unsupported
        );
        assert_eq!(
            DeviceError::from(gpu_alloc::AllocationError::NoCompatibleMemoryTypes),
            DeviceError::Lost
        );
    }
}
