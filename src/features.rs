use std::{collections::BTreeSet, fmt, ptr};

use ash::vk;
use fxhash::FxHashMap;

use crate::ApiVersion;

/// Supported extension names, sorted and deduplicated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtensionSet(BTreeSet<String>);

impl ExtensionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_properties(properties: &[vk::ExtensionProperties]) -> Self {
        properties
            .iter()
            .map(|ext| crate::auxil::string_from_driver(&ext.extension_name))
            .filter(|name| !name.is_empty())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ExtensionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// When a feature struct may be chained into `vkGetPhysicalDeviceFeatures2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FeatureGate {
    Core(ApiVersion),
    Extension(&'static str),
    CoreOrExtension(ApiVersion, &'static str),
}

impl FeatureGate {
    pub(crate) fn is_open(self, version: ApiVersion, extensions: &ExtensionSet) -> bool {
        match self {
            Self::Core(core) => version >= core,
            Self::Extension(name) => extensions.contains(name),
            Self::CoreOrExtension(core, name) => version >= core || extensions.contains(name),
        }
    }
}

/// A feature struct stored in [`DeviceFeatures`].
pub trait FeatureStruct: Copy + Sized {
    const TAG: FeatureTag;
    fn from_descriptor(descriptor: &FeatureDescriptor) -> Option<&Self>;
    fn from_descriptor_mut(descriptor: &mut FeatureDescriptor) -> Option<&mut Self>;
    fn into_descriptor(self) -> FeatureDescriptor;
}

macro_rules! feature_structs {
    ($($tag:ident => $ty:ident, $gate:expr;)*) => {
        /// Key of a feature struct in the feature map.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum FeatureTag {
            $($tag,)*
        }

        impl FeatureTag {
            pub const ALL: &'static [Self] = &[$(Self::$tag,)*];

            pub(crate) fn gate(self) -> FeatureGate {
                use FeatureGate::*;
                match self {
                    $(Self::$tag => $gate,)*
                }
            }

            pub(crate) fn empty_descriptor(self) -> FeatureDescriptor {
                match self {
                    $(Self::$tag => FeatureDescriptor::$tag(vk::$ty::default()),)*
                }
            }
        }

        /// One queried feature struct. The `p_next` member is always null once stored.
        #[derive(Clone, Copy)]
        pub enum FeatureDescriptor {
            $($tag(vk::$ty),)*
        }

        impl FeatureDescriptor {
            pub fn tag(&self) -> FeatureTag {
                match *self {
                    $(Self::$tag(_) => FeatureTag::$tag,)*
                }
            }

            fn clear_p_next(&mut self) {
                match *self {
                    $(Self::$tag(ref mut raw) => raw.p_next = ptr::null_mut(),)*
                }
            }

            pub(crate) fn push_to_query<'a>(
                &'a mut self,
                info: vk::PhysicalDeviceFeatures2Builder<'a>,
            ) -> vk::PhysicalDeviceFeatures2Builder<'a> {
                match *self {
                    $(Self::$tag(ref mut raw) => info.push_next(raw),)*
                }
            }

            pub(crate) fn push_to_device_create<'a>(
                &'a mut self,
                info: vk::DeviceCreateInfoBuilder<'a>,
            ) -> vk::DeviceCreateInfoBuilder<'a> {
                match *self {
                    $(Self::$tag(ref mut raw) => info.push_next(raw),)*
                }
            }
        }

        $(
            impl FeatureStruct for vk::$ty {
                const TAG: FeatureTag = FeatureTag::$tag;

                fn from_descriptor(descriptor: &FeatureDescriptor) -> Option<&Self> {
                    match *descriptor {
                        FeatureDescriptor::$tag(ref raw) => Some(raw),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }

                fn from_descriptor_mut(descriptor: &mut FeatureDescriptor) -> Option<&mut Self> {
                    match *descriptor {
                        FeatureDescriptor::$tag(ref mut raw) => Some(raw),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }

                fn into_descriptor(self) -> FeatureDescriptor {
                    FeatureDescriptor::$tag(self)
                }
            }
        )*
    };
}

feature_structs! {
    Storage16Bit => PhysicalDevice16BitStorageFeatures,
        CoreOrExtension(ApiVersion::V1_1, "VK_KHR_16bit_storage");
    Storage8Bit => PhysicalDevice8BitStorageFeatures,
        CoreOrExtension(ApiVersion::V1_2, "VK_KHR_8bit_storage");
    BufferDeviceAddress => PhysicalDeviceBufferDeviceAddressFeatures,
        CoreOrExtension(ApiVersion::V1_2, "VK_KHR_buffer_device_address");
    DescriptorIndexing => PhysicalDeviceDescriptorIndexingFeatures,
        CoreOrExtension(ApiVersion::V1_2, "VK_EXT_descriptor_indexing");
    HostQueryReset => PhysicalDeviceHostQueryResetFeatures,
        CoreOrExtension(ApiVersion::V1_2, "VK_EXT_host_query_reset");
    ImagelessFramebuffer => PhysicalDeviceImagelessFramebufferFeatures,
        CoreOrExtension(ApiVersion::V1_2, "VK_KHR_imageless_framebuffer");
    Multiview => PhysicalDeviceMultiviewFeatures,
        CoreOrExtension(ApiVersion::V1_1, "VK_KHR_multiview");
    Robustness2 => PhysicalDeviceRobustness2FeaturesEXT,
        Extension("VK_EXT_robustness2");
    ImageRobustness => PhysicalDeviceImageRobustnessFeaturesEXT,
        CoreOrExtension(ApiVersion::V1_3, "VK_EXT_image_robustness");
    RayTracingPipeline => PhysicalDeviceRayTracingPipelineFeaturesKHR,
        Extension("VK_KHR_ray_tracing_pipeline");
    AccelerationStructure => PhysicalDeviceAccelerationStructureFeaturesKHR,
        Extension("VK_KHR_acceleration_structure");
    RayQuery => PhysicalDeviceRayQueryFeaturesKHR,
        Extension("VK_KHR_ray_query");
    SamplerYcbcrConversion => PhysicalDeviceSamplerYcbcrConversionFeatures,
        CoreOrExtension(ApiVersion::V1_1, "VK_KHR_sampler_ycbcr_conversion");
    ScalarBlockLayout => PhysicalDeviceScalarBlockLayoutFeatures,
        CoreOrExtension(ApiVersion::V1_2, "VK_EXT_scalar_block_layout");
    ShaderAtomicInt64 => PhysicalDeviceShaderAtomicInt64Features,
        CoreOrExtension(ApiVersion::V1_2, "VK_KHR_shader_atomic_int64");
    ShaderClock => PhysicalDeviceShaderClockFeaturesKHR,
        Extension("VK_KHR_shader_clock");
    ShaderDrawParameters => PhysicalDeviceShaderDrawParametersFeatures,
        Core(ApiVersion::V1_1);
    ShaderFloat16Int8 => PhysicalDeviceShaderFloat16Int8Features,
        CoreOrExtension(ApiVersion::V1_2, "VK_KHR_shader_float16_int8");
    TimelineSemaphore => PhysicalDeviceTimelineSemaphoreFeatures,
        CoreOrExtension(ApiVersion::V1_2, "VK_KHR_timeline_semaphore");
    TransformFeedback => PhysicalDeviceTransformFeedbackFeaturesEXT,
        Extension("VK_EXT_transform_feedback");
    UniformBufferStandardLayout => PhysicalDeviceUniformBufferStandardLayoutFeatures,
        CoreOrExtension(ApiVersion::V1_2, "VK_KHR_uniform_buffer_standard_layout");
    VariablePointers => PhysicalDeviceVariablePointersFeatures,
        CoreOrExtension(ApiVersion::V1_1, "VK_KHR_variable_pointers");
    VulkanMemoryModel => PhysicalDeviceVulkanMemoryModelFeatures,
        CoreOrExtension(ApiVersion::V1_2, "VK_KHR_vulkan_memory_model");
    IndexTypeUint8 => PhysicalDeviceIndexTypeUint8FeaturesEXT,
        Extension("VK_EXT_index_type_uint8");
    LineRasterization => PhysicalDeviceLineRasterizationFeaturesEXT,
        Extension("VK_EXT_line_rasterization");
}

impl fmt::Debug for FeatureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FeatureDescriptor").field(&self.tag()).finish()
    }
}

/// Core features plus every queried feature struct, keyed by tag.
#[derive(Clone, Default)]
pub struct DeviceFeatures {
    core: vk::PhysicalDeviceFeatures,
    structs: FxHashMap<FeatureTag, FeatureDescriptor>,
}

// This is safe because the structs have `p_next: *mut c_void`, which we null out/never read.
unsafe impl Send for DeviceFeatures {}
unsafe impl Sync for DeviceFeatures {}

impl fmt::Debug for DeviceFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags = self.structs.keys().collect::<Vec<_>>();
        tags.sort();
        f.debug_struct("DeviceFeatures")
            .field("core", &self.core)
            .field("structs", &tags)
            .finish()
    }
}

impl DeviceFeatures {
    pub fn new(core: vk::PhysicalDeviceFeatures) -> Self {
        Self {
            core,
            structs: FxHashMap::default(),
        }
    }

    /// Builder-style insertion, mostly for capability fakes.
    #[must_use]
    pub fn with<T: FeatureStruct>(mut self, feature: T) -> Self {
        self.insert(feature.into_descriptor());
        self
    }

    pub fn insert(&mut self, mut descriptor: FeatureDescriptor) {
        descriptor.clear_p_next();
        self.structs.insert(descriptor.tag(), descriptor);
    }

    pub fn core(&self) -> &vk::PhysicalDeviceFeatures {
        &self.core
    }

    pub fn get<T: FeatureStruct>(&self) -> Option<&T> {
        self.structs.get(&T::TAG).and_then(T::from_descriptor)
    }

    pub(crate) fn get_mut<T: FeatureStruct>(&mut self) -> Option<&mut T> {
        self.structs.get_mut(&T::TAG).and_then(T::from_descriptor_mut)
    }

    pub(crate) fn descriptors_mut(&mut self) -> impl Iterator<Item = &mut FeatureDescriptor> {
        self.structs.values_mut()
    }

    /// Turns off the robustness features, which cost performance and change
    /// out-of-bounds behavior that tests may want to observe.
    pub(crate) fn mask_robustness(&mut self) {
        self.core.robust_buffer_access = vk::FALSE;
        if let Some(robustness2) = self.get_mut::<vk::PhysicalDeviceRobustness2FeaturesEXT>() {
            robustness2.robust_buffer_access2 = vk::FALSE;
            robustness2.robust_image_access2 = vk::FALSE;
        }
        if let Some(image) = self.get_mut::<vk::PhysicalDeviceImageRobustnessFeaturesEXT>() {
            image.robust_image_access = vk::FALSE;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tag_maps_to_its_descriptor() {
        for &tag in FeatureTag::ALL {
            assert_eq!(tag.empty_descriptor().tag(), tag);
        }
    }

    #[test]
    fn typed_lookup() {
        let features = DeviceFeatures::default().with(vk::PhysicalDeviceRayTracingPipelineFeaturesKHR {
            ray_tracing_pipeline: vk::TRUE,
            ..Default::default()
        });

        let rt = features
            .get::<vk::PhysicalDeviceRayTracingPipelineFeaturesKHR>()
            .unwrap();
        assert_eq!(rt.ray_tracing_pipeline, vk::TRUE);
        assert!(rt.p_next.is_null());
        assert!(features
            .get::<vk::PhysicalDeviceRobustness2FeaturesEXT>()
            .is_none());
    }

    #[test]
    fn gates_follow_version_and_extensions() {
        let extensions: ExtensionSet = ["VK_KHR_16bit_storage"].into_iter().collect();
        let storage = FeatureTag::Storage16Bit.gate();
        assert!(storage.is_open(ApiVersion::V1_0, &extensions));
        assert!(storage.is_open(ApiVersion::V1_1, &ExtensionSet::new()));
        assert!(!storage.is_open(ApiVersion::V1_0, &ExtensionSet::new()));
        assert!(!FeatureTag::Robustness2
            .gate()
            .is_open(ApiVersion::V1_3, &extensions));
    }

    #[test]
    fn robustness_is_masked() {
        let mut features = DeviceFeatures::new(vk::PhysicalDeviceFeatures {
            robust_buffer_access: vk::TRUE,
            ..Default::default()
        })
        .with(vk::PhysicalDeviceRobustness2FeaturesEXT {
            robust_buffer_access2: vk::TRUE,
            robust_image_access2: vk::TRUE,
            null_descriptor: vk::TRUE,
            ..Default::default()
        });
        features.mask_robustness();

        let robustness2 = features
            .get::<vk::PhysicalDeviceRobustness2FeaturesEXT>()
            .unwrap();
        assert_eq!(robustness2.robust_buffer_access2, vk::FALSE);
        assert_eq!(robustness2.robust_image_access2, vk::FALSE);
        assert_eq!(robustness2.null_descriptor, vk::TRUE);
        assert_eq!(features.core().robust_buffer_access, vk::FALSE);
    }
}
