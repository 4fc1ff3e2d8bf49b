//! A null acceleration structure handle must behave as an empty scene.
//!
//! Every ray traced against it misses, so the miss shader is the only one
//! that may write to the result image.

use ash::vk;

use super::util::{
    common_ray_generation_shader, RayTracingPipelineBuilder, ShaderBindingTable,
    ALL_RAY_TRACING_STAGES,
};
use crate::{
    harness::{TestCase, TestCaseGroup, TestInstance},
    shader::{BinaryCollection, GlslSource, ShaderBuildOptions, ShaderStage, SourceCollection},
    vulkan::{BufferDescriptor, Context, ImageDescriptor, MemoryUsage, TraceRegions},
    Capabilities, Error, NotSupported, TestStatus,
};

/// Value the miss shader stores.
pub const MISS_VALUE: u32 = 4;
/// Value the result image is cleared to before the launch.
pub const CLEAR_VALUE: u32 = 5;

const RESULT_FORMAT: vk::Format = vk::Format::R32_UINT;

/// Launch size of one case, in pixels of the result image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaseDef {
    pub width: u32,
    pub height: u32,
}

impl CaseDef {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Shader group indices of the pipeline, also the order of the binding tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderGroup {
    Raygen = 0,
    Miss = 1,
    Hit = 2,
}

impl ShaderGroup {
    pub const COUNT: u32 = 3;

    pub fn index(self) -> u32 {
        self as u32
    }
}

pub fn check_null_as_support<C: Capabilities + ?Sized>(context: &C) -> Result<(), NotSupported> {
    context.require_device_functionality("VK_KHR_ray_tracing_pipeline")?;
    let ray_tracing_pipeline = context
        .device_features()
        .get::<vk::PhysicalDeviceRayTracingPipelineFeaturesKHR>()
        .map_or(false, |features| features.ray_tracing_pipeline == vk::TRUE);
    if !ray_tracing_pipeline {
        return Err(NotSupported::new(
            "Requires VkPhysicalDeviceRayTracingPipelineFeaturesKHR.rayTracingPipeline",
        ));
    }

    context.require_device_functionality("VK_EXT_robustness2")?;
    let null_descriptor = context
        .device_features()
        .get::<vk::PhysicalDeviceRobustness2FeaturesEXT>()
        .map_or(false, |features| features.null_descriptor == vk::TRUE);
    if !null_descriptor {
        return Err(NotSupported::new(
            "Requires VkPhysicalDeviceRobustness2FeaturesEXT::nullDescriptor",
        ));
    }
    Ok(())
}

/// Number of values that differ from `expected`.
pub fn count_failures(values: &[u32], expected: u32) -> usize {
    values.iter().filter(|&&value| value != expected).count()
}

pub fn verdict(failures: usize) -> TestStatus {
    if failures == 0 {
        TestStatus::pass("Pass")
    } else {
        TestStatus::fail(format!("failures={failures}"))
    }
}

fn register_programs(programs: &mut SourceCollection) {
    let options = ShaderBuildOptions::ray_tracing();
    programs.add(
        "rgen",
        GlslSource::new(ShaderStage::RayGeneration, common_ray_generation_shader())
            .with_options(options),
    );
    programs.add(
        "sect",
        GlslSource::new(
            ShaderStage::Intersection,
            "#version 460 core
#extension GL_EXT_ray_tracing : require
hitAttributeEXT vec3 hitAttribute;
layout(r32ui, set = 0, binding = 0) uniform uimage2D result;
void main()
{
  reportIntersectionEXT(1.0f, 0);
  imageStore(result, ivec2(gl_LaunchIDEXT.xy), uvec4(1, 0, 0, 1));
}
",
        )
        .with_options(options),
    );
    programs.add(
        "ahit",
        GlslSource::new(
            ShaderStage::AnyHit,
            "#version 460 core
#extension GL_EXT_ray_tracing : require
layout(location = 0) rayPayloadInEXT vec3 hitValue;
layout(r32ui, set = 0, binding = 0) uniform uimage2D result;
void main()
{
  imageStore(result, ivec2(gl_LaunchIDEXT.xy), uvec4(2, 0, 0, 1));
}
",
        )
        .with_options(options),
    );
    programs.add(
        "miss",
        GlslSource::new(
            ShaderStage::Miss,
            format!(
                "#version 460 core
#extension GL_EXT_ray_tracing : require
layout(location = 0) rayPayloadInEXT vec3 hitValue;
layout(r32ui, set = 0, binding = 0) uniform uimage2D result;
void main()
{{
  imageStore(result, ivec2(gl_LaunchIDEXT.xy), uvec4({MISS_VALUE}, 0, 0, 1));
}}
"
            ),
        )
        .with_options(options),
    );
}

pub struct NullAsCase {
    def: CaseDef,
}

impl NullAsCase {
    pub fn new(def: CaseDef) -> Self {
        Self { def }
    }
}

impl TestCase<Context> for NullAsCase {
    fn description(&self) -> &str {
        "Traces rays against a null acceleration structure"
    }

    fn check_support(&self, context: &Context) -> Result<(), NotSupported> {
        check_null_as_support(context)
    }

    fn init_programs(&self, programs: &mut SourceCollection) {
        register_programs(programs);
    }

    fn create_instance<'a>(
        &'a self,
        context: &'a Context,
        binaries: &'a BinaryCollection,
    ) -> Result<Box<dyn TestInstance + 'a>, Error> {
        Ok(Box::new(NullAsInstance {
            context,
            binaries,
            def: self.def,
        }))
    }
}

struct NullAsInstance<'a> {
    context: &'a Context,
    binaries: &'a BinaryCollection,
    def: CaseDef,
}

impl NullAsInstance<'_> {
    /// Clears the result image, traces one ray per pixel and reads the image back.
    fn run(&self) -> Result<Vec<u32>, Error> {
        let device = self.context.device();
        let CaseDef { width, height } = self.def;
        let pixel_count = self.def.pixel_count();

        let set_layout = device.create_descriptor_set_layout(&[
            vk::DescriptorSetLayoutBinding::builder()
                .binding(0)
                .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                .descriptor_count(1)
                .stage_flags(ALL_RAY_TRACING_STAGES)
                .build(),
            vk::DescriptorSetLayoutBinding::builder()
                .binding(1)
                .descriptor_type(vk::DescriptorType::ACCELERATION_STRUCTURE_KHR)
                .descriptor_count(1)
                .stage_flags(ALL_RAY_TRACING_STAGES)
                .build(),
        ])?;
        let descriptor_pool = device.create_descriptor_pool(
            &[
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::STORAGE_IMAGE,
                    descriptor_count: 1,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::ACCELERATION_STRUCTURE_KHR,
                    descriptor_count: 1,
                },
            ],
            1,
        )?;
        let descriptor_set = descriptor_pool.allocate(&set_layout)?;
        let pipeline_layout = device.create_pipeline_layout(&[&set_layout])?;

        let rgen = device.create_shader_module(self.binaries.get("rgen")?)?;
        let ahit = device.create_shader_module(self.binaries.get("ahit")?)?;
        let sect = device.create_shader_module(self.binaries.get("sect")?)?;
        let miss = device.create_shader_module(self.binaries.get("miss")?)?;

        let mut builder = RayTracingPipelineBuilder::new();
        builder
            .add_shader(&rgen, ShaderGroup::Raygen.index())?
            .add_shader(&ahit, ShaderGroup::Hit.index())?
            .add_shader(&sect, ShaderGroup::Hit.index())?
            .add_shader(&miss, ShaderGroup::Miss.index())?;
        debug_assert_eq!(builder.group_count(), ShaderGroup::COUNT);
        let pipeline = builder.build(device, &pipeline_layout)?;

        let raygen_table = ShaderBindingTable::new(device, &pipeline, ShaderGroup::Raygen.index(), 1)?;
        let miss_table = ShaderBindingTable::new(device, &pipeline, ShaderGroup::Miss.index(), 1)?;
        let hit_table = ShaderBindingTable::new(device, &pipeline, ShaderGroup::Hit.index(), 1)?;
        let regions = TraceRegions {
            raygen: raygen_table.region(),
            miss: miss_table.region(),
            hit: hit_table.region(),
            callable: vk::StridedDeviceAddressRegionKHR::default(),
        };

        let image = device.create_image(&ImageDescriptor {
            label: Some("null_as result"),
            width,
            height,
            format: RESULT_FORMAT,
            usage: vk::ImageUsageFlags::STORAGE
                | vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST,
        })?;
        let image_view = device.create_image_view(&image)?;
        let readback = device.create_buffer(&BufferDescriptor {
            label: Some("null_as readback"),
            size: (pixel_count * std::mem::size_of::<u32>()) as u64,
            usage: vk::BufferUsageFlags::TRANSFER_DST,
            memory: MemoryUsage::Download,
            alignment: 1,
        })?;

        let image_infos = [vk::DescriptorImageInfo::builder()
            .image_view(image_view.raw())
            .image_layout(vk::ImageLayout::GENERAL)
            .build()];
        let null_structures = [vk::AccelerationStructureKHR::null()];
        let mut structure_write = vk::WriteDescriptorSetAccelerationStructureKHR::builder()
            .acceleration_structures(&null_structures);
        let mut structure_descriptor_write = vk::WriteDescriptorSet::builder()
            .dst_set(descriptor_set)
            .dst_binding(1)
            .descriptor_type(vk::DescriptorType::ACCELERATION_STRUCTURE_KHR)
            .push_next(&mut structure_write)
            .build();
        // The count is not implied by the chained struct.
        structure_descriptor_write.descriptor_count = 1;
        let writes = [
            vk::WriteDescriptorSet::builder()
                .dst_set(descriptor_set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                .image_info(&image_infos)
                .build(),
            structure_descriptor_write,
        ];
        unsafe { device.update_descriptor_sets(&writes) };

        let mut encoder = device.create_command_encoder()?;
        encoder.begin()?;
        unsafe {
            encoder.transition_image(
                &image,
                vk::ImageLayout::UNDEFINED..vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::AccessFlags::empty()..vk::AccessFlags::TRANSFER_WRITE,
                vk::PipelineStageFlags::TOP_OF_PIPE..vk::PipelineStageFlags::TRANSFER,
            );
            encoder.clear_color_image(
                &image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ClearColorValue {
                    uint32: [CLEAR_VALUE, CLEAR_VALUE, CLEAR_VALUE, 255],
                },
            );
            encoder.transition_image(
                &image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL..vk::ImageLayout::GENERAL,
                vk::AccessFlags::TRANSFER_WRITE..vk::AccessFlags::SHADER_WRITE,
                vk::PipelineStageFlags::TRANSFER..vk::PipelineStageFlags::RAY_TRACING_SHADER_KHR,
            );

            encoder.bind_pipeline(&pipeline);
            encoder.bind_descriptor_set(&pipeline, &pipeline_layout, descriptor_set);
            encoder.trace_rays(&regions, width, height, 1)?;

            encoder.memory_barrier(
                vk::AccessFlags::SHADER_WRITE..vk::AccessFlags::TRANSFER_READ,
                vk::PipelineStageFlags::RAY_TRACING_SHADER_KHR..vk::PipelineStageFlags::TRANSFER,
            );
            encoder.copy_image_to_buffer(&image, vk::ImageLayout::GENERAL, &readback);
            encoder.memory_barrier(
                vk::AccessFlags::TRANSFER_WRITE..vk::AccessFlags::HOST_READ,
                vk::PipelineStageFlags::TRANSFER..vk::PipelineStageFlags::HOST,
            );
        }
        encoder.end()?;

        let done = device.submit_and_wait(&encoder)?;
        Ok(readback.read_u32s(&done, pixel_count)?)
    }
}

impl TestInstance for NullAsInstance<'_> {
    fn iterate(&mut self) -> Result<TestStatus, Error> {
        let values = self.run()?;
        let failures = count_failures(&values, MISS_VALUE);
        if failures != 0 {
            log::warn!(
                "{} of {} pixels differ from the miss value {}",
                failures,
                values.len(),
                MISS_VALUE
            );
        }
        Ok(verdict(failures))
    }
}

pub fn create_null_as_tests() -> TestCaseGroup<Context> {
    let mut group = TestCaseGroup::new(
        "null_as",
        "Null Acceleration Structure is accepted as 'always miss' case",
    );
    group.add_case(
        "test",
        NullAsCase::new(CaseDef {
            width: 8,
            height: 8,
        }),
    );
    group
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ApiVersion, DeviceFeatures, ExtensionSet};

    struct Fake {
        device: ExtensionSet,
        features: DeviceFeatures,
        instance: ExtensionSet,
    }

    impl Capabilities for Fake {
        fn api_version(&self) -> ApiVersion {
            ApiVersion::V1_2
        }
        fn instance_extensions(&self) -> &ExtensionSet {
            &self.instance
        }
        fn device_extensions(&self) -> &ExtensionSet {
            &self.device
        }
        fn device_features(&self) -> &DeviceFeatures {
            &self.features
        }
    }

    fn fake(extensions: &[&str], pipeline: bool, null_descriptor: bool) -> Fake {
        let features = DeviceFeatures::default()
            .with(vk::PhysicalDeviceRayTracingPipelineFeaturesKHR {
                ray_tracing_pipeline: pipeline.into(),
                ..Default::default()
            })
            .with(vk::PhysicalDeviceRobustness2FeaturesEXT {
                null_descriptor: null_descriptor.into(),
                ..Default::default()
            });
        Fake {
            device: extensions.iter().copied().collect(),
            features,
            instance: ExtensionSet::new(),
        }
    }

    const BOTH: &[&str] = &["VK_KHR_ray_tracing_pipeline", "VK_EXT_robustness2"];

    #[test]
    fn support_requires_both_features() {
        assert!(check_null_as_support(&fake(BOTH, true, true)).is_ok());

        let err = check_null_as_support(&fake(BOTH, false, true)).unwrap_err();
        assert_eq!(
            err.message(),
            "Requires VkPhysicalDeviceRayTracingPipelineFeaturesKHR.rayTracingPipeline"
        );
        let err = check_null_as_support(&fake(BOTH, true, false)).unwrap_err();
        assert_eq!(
            err.message(),
            "Requires VkPhysicalDeviceRobustness2FeaturesEXT::nullDescriptor"
        );
    }

    #[test]
    fn support_requires_extensions() {
        let err = check_null_as_support(&fake(&["VK_EXT_robustness2"], true, true)).unwrap_err();
        assert_eq!(err.message(), "VK_KHR_ray_tracing_pipeline is not supported");
        let err =
            check_null_as_support(&fake(&["VK_KHR_ray_tracing_pipeline"], true, true)).unwrap_err();
        assert_eq!(err.message(), "VK_EXT_robustness2 is not supported");
    }

    #[test]
    fn failures_are_counted() {
        assert_eq!(count_failures(&[MISS_VALUE; 64], MISS_VALUE), 0);
        let mut values = vec![MISS_VALUE; 64];
        values[3] = CLEAR_VALUE;
        values[40] = 2;
        assert_eq!(count_failures(&values, MISS_VALUE), 2);
        assert_eq!(count_failures(&[], MISS_VALUE), 0);
    }

    #[test]
    fn verdict_text() {
        let status = verdict(0);
        assert!(status.is_pass());
        assert_eq!(status.description(), "Pass");
        let status = verdict(64);
        assert!(status.is_fail());
        assert_eq!(status.description(), "failures=64");
    }

    #[test]
    fn programs_use_ray_tracing_options() {
        let mut programs = SourceCollection::new();
        register_programs(&mut programs);
        assert_eq!(programs.len(), 4);
        for (_, source) in programs.iter() {
            assert!(source.stage.is_ray_tracing());
            assert_eq!(source.options, ShaderBuildOptions::ray_tracing());
        }
        let miss = programs.get("miss").unwrap();
        assert!(miss.source.contains("uvec4(4, 0, 0, 1)"));
    }

    #[test]
    fn group_has_one_case() {
        let group = create_null_as_tests();
        assert_eq!(group.cases().len(), 1);
        assert!(group.find("test").is_some());
    }
}
