use std::{ffi::CStr, ptr, sync::Arc};

use ash::{extensions::khr, vk};
use parking_lot::Mutex;

use super::conv;
use crate::{auxil, ApiVersion, DeviceFeatures, ExtensionSet, FeatureDescriptor, FeatureTag};

/// Ray tracing pipeline limits relevant to shader binding tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RayTracingProperties {
    pub shader_group_handle_size: u32,
    pub shader_group_base_alignment: u32,
    pub shader_group_handle_alignment: u32,
}

#[derive(Clone, Debug)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor: u32,
    pub device: u32,
    pub device_type: vk::PhysicalDeviceType,
    pub driver: String,
}

pub struct PhysicalDeviceCapabilities {
    supported_extensions: ExtensionSet,
    properties: vk::PhysicalDeviceProperties,
    maintenance_3: Option<vk::PhysicalDeviceMaintenance3Properties>,
    driver: Option<vk::PhysicalDeviceDriverProperties>,
    ray_tracing_pipeline: Option<vk::PhysicalDeviceRayTracingPipelinePropertiesKHR>,
    /// The device API version.
    ///
    /// Which is the version of Vulkan supported for device-level functionality.
    device_api_version: ApiVersion,
}

// This is safe because the structs have `p_next: *mut c_void`, which we null out/never read.
unsafe impl Send for PhysicalDeviceCapabilities {}
unsafe impl Sync for PhysicalDeviceCapabilities {}

impl PhysicalDeviceCapabilities {
    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    pub fn supported_extensions(&self) -> &ExtensionSet {
        &self.supported_extensions
    }

    pub fn device_api_version(&self) -> ApiVersion {
        self.device_api_version
    }

    pub fn supports_extension(&self, extension: &CStr) -> bool {
        self.supported_extensions
            .contains(&extension.to_string_lossy())
    }

    pub fn ray_tracing(&self) -> Option<RayTracingProperties> {
        self.ray_tracing_pipeline
            .map(|rt| RayTracingProperties {
                shader_group_handle_size: rt.shader_group_handle_size,
                shader_group_base_alignment: rt.shader_group_base_alignment,
                shader_group_handle_alignment: rt.shader_group_handle_alignment,
            })
    }

    fn max_memory_allocation_size(&self) -> u64 {
        match self.maintenance_3 {
            Some(ref maintenance_3) => maintenance_3.max_memory_allocation_size,
            None => u64::max_value(),
        }
    }

    /// Extensions the suite knows how to enable, filtered to the supported ones.
    fn required_device_extensions(&self) -> Vec<&'static CStr> {
        let mut extensions = vec![
            vk::KhrStorageBufferStorageClassFn::name(),
            vk::KhrMaintenance1Fn::name(),
            vk::KhrMaintenance2Fn::name(),
            vk::KhrMaintenance3Fn::name(),
            vk::KhrGetMemoryRequirements2Fn::name(),
            vk::KhrBindMemory2Fn::name(),
            vk::KhrDedicatedAllocationFn::name(),
            vk::KhrDriverPropertiesFn::name(),
            vk::KhrCreateRenderpass2Fn::name(),
            // feature structs
            vk::Khr16bitStorageFn::name(),
            vk::Khr8bitStorageFn::name(),
            vk::KhrBufferDeviceAddressFn::name(),
            vk::ExtDescriptorIndexingFn::name(),
            vk::ExtHostQueryResetFn::name(),
            vk::KhrImagelessFramebufferFn::name(),
            vk::KhrMultiviewFn::name(),
            vk::ExtRobustness2Fn::name(),
            vk::ExtImageRobustnessFn::name(),
            vk::KhrSamplerYcbcrConversionFn::name(),
            vk::ExtScalarBlockLayoutFn::name(),
            vk::KhrShaderAtomicInt64Fn::name(),
            vk::KhrShaderClockFn::name(),
            vk::KhrShaderFloat16Int8Fn::name(),
            vk::KhrTimelineSemaphoreFn::name(),
            vk::ExtTransformFeedbackFn::name(),
            vk::KhrUniformBufferStandardLayoutFn::name(),
            vk::KhrVariablePointersFn::name(),
            vk::KhrVulkanMemoryModelFn::name(),
            vk::ExtIndexTypeUint8Fn::name(),
            vk::ExtLineRasterizationFn::name(),
            // ray tracing and its dependencies
            vk::KhrDeferredHostOperationsFn::name(),
            vk::KhrAccelerationStructureFn::name(),
            vk::KhrRayTracingPipelineFn::name(),
            vk::KhrRayQueryFn::name(),
            vk::KhrSpirv14Fn::name(),
            vk::KhrShaderFloatControlsFn::name(),
        ];
        extensions.retain(|&ext| self.supports_extension(ext));
        extensions
    }
}

pub struct Adapter {
    raw: vk::PhysicalDevice,
    instance: Arc<super::InstanceShared>,
    info: AdapterInfo,
    phd_capabilities: PhysicalDeviceCapabilities,
    phd_features: DeviceFeatures,
    queue_family_index: u32,
}

impl super::InstanceShared {
    fn inspect(&self, phd: vk::PhysicalDevice) -> (PhysicalDeviceCapabilities, DeviceFeatures) {
        let capabilities = {
            let supported_extensions = match unsafe {
                self.raw().enumerate_device_extension_properties(phd)
            } {
                Ok(properties) => ExtensionSet::from_properties(&properties),
                Err(err) => {
                    log::error!("enumerate_device_extension_properties: {}", err);
                    ExtensionSet::new()
                }
            };
            let properties = unsafe { self.raw().get_physical_device_properties(phd) };
            let mut capabilities = PhysicalDeviceCapabilities {
                supported_extensions,
                properties,
                maintenance_3: None,
                driver: None,
                ray_tracing_pipeline: None,
                device_api_version: ApiVersion::unpack(properties.api_version),
            };

            // Get these now to avoid borrowing conflicts later
            let supports_maintenance3 = capabilities.device_api_version >= ApiVersion::V1_1
                || capabilities.supports_extension(vk::KhrMaintenance3Fn::name());
            let supports_driver_properties = capabilities.device_api_version >= ApiVersion::V1_2
                || capabilities.supports_extension(vk::KhrDriverPropertiesFn::name());
            let supports_ray_tracing_pipeline =
                capabilities.supports_extension(vk::KhrRayTracingPipelineFn::name());

            let mut builder = vk::PhysicalDeviceProperties2::builder();
            if supports_maintenance3 {
                let next = capabilities
                    .maintenance_3
                    .insert(vk::PhysicalDeviceMaintenance3Properties::default());
                builder = builder.push_next(next);
            }
            if supports_driver_properties {
                let next = capabilities
                    .driver
                    .insert(vk::PhysicalDeviceDriverProperties::default());
                builder = builder.push_next(next);
            }
            if supports_ray_tracing_pipeline {
                let next = capabilities
                    .ray_tracing_pipeline
                    .insert(vk::PhysicalDeviceRayTracingPipelinePropertiesKHR::default());
                builder = builder.push_next(next);
            }

            let mut properties2 = builder.build();
            let queried = unsafe { self.get_physical_device_properties2(phd, &mut properties2) };
            if !queried {
                capabilities.maintenance_3 = None;
                capabilities.driver = None;
                capabilities.ray_tracing_pipeline = None;
            }
            if let Some(ref mut next) = capabilities.maintenance_3 {
                next.p_next = ptr::null_mut();
            }
            if let Some(ref mut next) = capabilities.driver {
                next.p_next = ptr::null_mut();
            }
            if let Some(ref mut next) = capabilities.ray_tracing_pipeline {
                next.p_next = ptr::null_mut();
            }
            capabilities
        };

        // Feature structs are only valid when both sides know about them.
        let version = capabilities.device_api_version.min(self.api_version());
        let mut descriptors = FeatureTag::ALL
            .iter()
            .filter(|tag| {
                tag.gate()
                    .is_open(version, &capabilities.supported_extensions)
            })
            .map(|tag| tag.empty_descriptor())
            .collect::<Vec<FeatureDescriptor>>();

        let mut builder = vk::PhysicalDeviceFeatures2::builder();
        for descriptor in descriptors.iter_mut() {
            builder = descriptor.push_to_query(builder);
        }
        let mut features2 = builder.build();
        let features = if unsafe { self.get_physical_device_features2(phd, &mut features2) } {
            let mut features = DeviceFeatures::new(features2.features);
            for descriptor in descriptors {
                features.insert(descriptor);
            }
            features
        } else {
            DeviceFeatures::new(unsafe { self.raw().get_physical_device_features(phd) })
        };

        (capabilities, features)
    }
}

impl Adapter {
    pub(super) fn expose(
        instance: &Arc<super::InstanceShared>,
        phd: vk::PhysicalDevice,
    ) -> Option<Self> {
        let (phd_capabilities, phd_features) = instance.inspect(phd);

        let info = AdapterInfo {
            name: auxil::cstr_from_bytes_until_nul(&phd_capabilities.properties.device_name)
                .and_then(|info| info.to_str().ok())
                .unwrap_or("?")
                .to_owned(),
            vendor: phd_capabilities.properties.vendor_id,
            device: phd_capabilities.properties.device_id,
            device_type: phd_capabilities.properties.device_type,
            driver: phd_capabilities
                .driver
                .as_ref()
                .and_then(|driver| auxil::cstr_from_bytes_until_nul(&driver.driver_name))
                .and_then(|name| name.to_str().ok())
                .unwrap_or("?")
                .to_owned(),
        };

        let queue_families = unsafe {
            instance
                .raw()
                .get_physical_device_queue_family_properties(phd)
        };
        let universal = vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE;
        let queue_family_index = match queue_families
            .iter()
            .position(|family| family.queue_flags.contains(universal))
        {
            Some(index) => index as u32,
            None => {
                log::warn!(
                    "No universal queue family, hiding adapter: {}",
                    info.name
                );
                return None;
            }
        };

        log::info!(
            "Adapter: {} ({}, {}, driver {}), API {}",
            info.name,
            auxil::db::vendor_name(info.vendor),
            conv::map_device_type(info.device_type),
            info.driver,
            phd_capabilities.device_api_version,
        );

        Some(Self {
            raw: phd,
            instance: Arc::clone(instance),
            info,
            phd_capabilities,
            phd_features,
            queue_family_index,
        })
    }

    pub fn info(&self) -> &AdapterInfo {
        &self.info
    }

    pub fn physical_device_capabilities(&self) -> &PhysicalDeviceCapabilities {
        &self.phd_capabilities
    }

    /// Everything the device reports.
    pub fn physical_device_features(&self) -> &DeviceFeatures {
        &self.phd_features
    }

    /// The feature set a device opened from this adapter gets.
    pub fn enabled_features(&self) -> DeviceFeatures {
        let mut features = self.phd_features.clone();
        features.mask_robustness();
        features
    }

    /// Opens the default device: every known supported extension and every
    /// reported feature, except robust access.
    pub fn open(&self) -> Result<super::Device, crate::DeviceError> {
        let enabled_extensions = self.phd_capabilities.required_device_extensions();
        let mut enabled_features = self.enabled_features();
        let core_features = *enabled_features.core();

        let family_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(self.queue_family_index)
            .queue_priorities(&[1.0])
            .build();
        let family_infos = [family_info];

        let str_pointers = enabled_extensions
            .iter()
            .map(|&s| {
                // Safe because `enabled_extensions` entries have static lifetime.
                s.as_ptr()
            })
            .collect::<Vec<_>>();

        let mut info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&family_infos)
            .enabled_extension_names(&str_pointers)
            .enabled_features(&core_features);
        for descriptor in enabled_features.descriptors_mut() {
            info = descriptor.push_to_device_create(info);
        }
        let info = info.build();

        let raw_device = {
            profiling::scope!("vkCreateDevice");
            unsafe {
                self.instance
                    .raw()
                    .create_device(self.raw, &info, None)?
            }
        };
        log::debug!(
            "Enabled device extensions: {:?}",
            enabled_extensions
        );

        unsafe { self.device_from_raw(raw_device, enabled_extensions, &enabled_features) }
    }

    unsafe fn device_from_raw(
        &self,
        raw_device: ash::Device,
        enabled_extensions: Vec<&'static CStr>,
        enabled_features: &DeviceFeatures,
    ) -> Result<super::Device, crate::DeviceError> {
        let instance = self.instance.raw();
        let mem_properties = {
            profiling::scope!("vkGetPhysicalDeviceMemoryProperties");
            unsafe { instance.get_physical_device_memory_properties(self.raw) }
        };
        let memory_types =
            &mem_properties.memory_types[..mem_properties.memory_type_count as usize];
        let valid_ash_memory_types = memory_types.iter().enumerate().fold(0, |u, (i, mem)| {
            if conv::known_memory_flags().contains(mem.property_flags) {
                u | (1 << i)
            } else {
                u
            }
        });

        let device_api_version = self.phd_capabilities.device_api_version;
        let buffer_device_address =
            if enabled_extensions.contains(&khr::BufferDeviceAddress::name()) {
                Some(super::ExtensionFn::Extension(khr::BufferDeviceAddress::new(
                    instance,
                    &raw_device,
                )))
            } else if device_api_version >= ApiVersion::V1_2 {
                Some(super::ExtensionFn::Promoted)
            } else {
                None
            };
        let ray_tracing_pipeline = if enabled_extensions.contains(&khr::RayTracingPipeline::name())
        {
            Some(khr::RayTracingPipeline::new(instance, &raw_device))
        } else {
            None
        };
        let device_address_enabled = enabled_features
            .get::<vk::PhysicalDeviceBufferDeviceAddressFeatures>()
            .map_or(false, |f| f.buffer_device_address == vk::TRUE);

        let mem_allocator = {
            let limits = self.phd_capabilities.properties.limits;
            let config = gpu_alloc::Config::i_am_prototyping();
            let properties = gpu_alloc::DeviceProperties {
                max_memory_allocation_count: limits.max_memory_allocation_count,
                max_memory_allocation_size: self.phd_capabilities.max_memory_allocation_size(),
                non_coherent_atom_size: limits.non_coherent_atom_size,
                memory_types: memory_types
                    .iter()
                    .map(|memory_type| gpu_alloc::MemoryType {
                        props: gpu_alloc::MemoryPropertyFlags::from_bits_truncate(
                            memory_type.property_flags.as_raw() as u8,
                        ),
                        heap: memory_type.heap_index,
                    })
                    .collect(),
                memory_heaps: mem_properties.memory_heaps
                    [..mem_properties.memory_heap_count as usize]
                    .iter()
                    .map(|&memory_heap| gpu_alloc::MemoryHeap {
                        size: memory_heap.size,
                    })
                    .collect(),
                buffer_device_address: device_address_enabled,
            };
            gpu_alloc::GpuAllocator::new(config, properties)
        };

        let raw_queue = {
            profiling::scope!("vkGetDeviceQueue");
            unsafe { raw_device.get_device_queue(self.queue_family_index, 0) }
        };

        let shared = Arc::new(super::DeviceShared {
            raw: raw_device,
            _instance: Arc::clone(&self.instance),
            family_index: self.queue_family_index,
            extension_fns: super::DeviceExtensionFunctions {
                buffer_device_address,
                ray_tracing_pipeline,
            },
            mem_allocator: Mutex::new(mem_allocator),
            valid_ash_memory_types,
        });

        Ok(super::Device {
            shared,
            raw_queue: Mutex::new(raw_queue),
            api_version: device_api_version.min(self.instance.api_version()),
            ray_tracing: self.phd_capabilities.ray_tracing(),
        })
    }
}
