//! Ray tracing pipeline and shader binding table helpers shared by the cases.

use arrayvec::ArrayVec;
use ash::vk;

use crate::{
    auxil,
    shader::ShaderStage,
    vulkan::{
        Buffer, BufferDescriptor, Device, MemoryUsage, Pipeline, PipelineLayout,
        RayTracingProperties, ShaderModule,
    },
    DeviceError, PipelineError,
};

pub const ALL_RAY_TRACING_STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
    vk::ShaderStageFlags::RAYGEN_KHR.as_raw()
        | vk::ShaderStageFlags::ANY_HIT_KHR.as_raw()
        | vk::ShaderStageFlags::CLOSEST_HIT_KHR.as_raw()
        | vk::ShaderStageFlags::MISS_KHR.as_raw()
        | vk::ShaderStageFlags::INTERSECTION_KHR.as_raw()
        | vk::ShaderStageFlags::CALLABLE_KHR.as_raw(),
);

const MAX_STAGES: usize = 16;
const MAX_GROUPS: usize = 16;
/// Rays are only traced from the ray generation stage.
const MAX_RECURSION_DEPTH: u32 = 1;

/// Ray generation shader tracing one ray per launch cell against `set = 0, binding = 1`.
///
/// Rays start on the `z = 0` plane at the cell centre and travel towards `-z`.
pub fn common_ray_generation_shader() -> &'static str {
    "#version 460 core
#extension GL_EXT_ray_tracing : require
layout(location = 0) rayPayloadEXT vec3 hitValue;
layout(set = 0, binding = 1) uniform accelerationStructureEXT topLevelAS;

void main()
{
  uint  rayFlags = 0;
  uint  cullMask = 0xFF;
  float tmin     = 0.0;
  float tmax     = 9.0;
  vec3  origin   = vec3((float(gl_LaunchIDEXT.x) + 0.5f) / float(gl_LaunchSizeEXT.x), (float(gl_LaunchIDEXT.y) + 0.5f) / float(gl_LaunchSizeEXT.y), 0.0);
  vec3  direct   = vec3(0.0, 0.0, -1.0);
  traceRayEXT(topLevelAS, rayFlags, cullMask, 0, 0, 0, origin, tmin, direct, tmax, 0);
}
"
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct GroupSlots {
    ty: Option<vk::RayTracingShaderGroupTypeKHR>,
    general: Option<u32>,
    closest_hit: Option<u32>,
    any_hit: Option<u32>,
    intersection: Option<u32>,
}

impl GroupSlots {
    fn to_vk(self) -> vk::RayTracingShaderGroupCreateInfoKHR {
        let unused = |slot: Option<u32>| slot.unwrap_or(vk::SHADER_UNUSED_KHR);
        vk::RayTracingShaderGroupCreateInfoKHR::builder()
            .ty(self.ty.unwrap_or(vk::RayTracingShaderGroupTypeKHR::GENERAL))
            .general_shader(unused(self.general))
            .closest_hit_shader(unused(self.closest_hit))
            .any_hit_shader(unused(self.any_hit))
            .intersection_shader(unused(self.intersection))
            .build()
    }
}

/// Collects shader stages into groups and creates the pipeline.
///
/// Stage indices follow the order of [`Self::add_shader`] calls. A group that
/// receives an intersection shader becomes a procedural hit group, otherwise
/// any hit stage makes it a triangles hit group.
pub struct RayTracingPipelineBuilder<'a> {
    modules: ArrayVec<&'a ShaderModule, MAX_STAGES>,
    groups: ArrayVec<GroupSlots, MAX_GROUPS>,
}

impl<'a> Default for RayTracingPipelineBuilder<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> RayTracingPipelineBuilder<'a> {
    pub fn new() -> Self {
        Self {
            modules: ArrayVec::new(),
            groups: ArrayVec::new(),
        }
    }

    pub fn add_shader(
        &mut self,
        module: &'a ShaderModule,
        group: u32,
    ) -> Result<&mut Self, PipelineError> {
        let stage_index = self.modules.len() as u32;
        self.assign(module.stage(), stage_index, group)?;
        self.modules.push(module);
        Ok(self)
    }

    fn assign(&mut self, stage: ShaderStage, stage_index: u32, group: u32) -> Result<(), PipelineError> {
        if self.modules.is_full() {
            return Err(PipelineError::Linkage(stage, String::from("too many stages")));
        }
        let group_index = group as usize;
        if group_index >= MAX_GROUPS {
            return Err(PipelineError::Linkage(stage, format!("group {group} is out of range")));
        }
        while self.groups.len() <= group_index {
            self.groups.push(GroupSlots::default());
        }

        let slots = &mut self.groups[group_index];
        match stage {
            ShaderStage::RayGeneration | ShaderStage::Miss | ShaderStage::Callable => {
                slots.ty = Some(vk::RayTracingShaderGroupTypeKHR::GENERAL);
                slots.general = Some(stage_index);
            }
            ShaderStage::ClosestHit => {
                slots.closest_hit = Some(stage_index);
                slots
                    .ty
                    .get_or_insert(vk::RayTracingShaderGroupTypeKHR::TRIANGLES_HIT_GROUP);
            }
            ShaderStage::AnyHit => {
                slots.any_hit = Some(stage_index);
                slots
                    .ty
                    .get_or_insert(vk::RayTracingShaderGroupTypeKHR::TRIANGLES_HIT_GROUP);
            }
            ShaderStage::Intersection => {
                slots.intersection = Some(stage_index);
                slots.ty = Some(vk::RayTracingShaderGroupTypeKHR::PROCEDURAL_HIT_GROUP);
            }
            ShaderStage::Compute => {
                return Err(PipelineError::Linkage(
                    stage,
                    String::from("not a ray tracing stage"),
                ))
            }
        }
        Ok(())
    }

    pub fn group_count(&self) -> u32 {
        self.groups.len() as u32
    }

    fn group_infos(&self) -> Result<Vec<vk::RayTracingShaderGroupCreateInfoKHR>, PipelineError> {
        self.groups
            .iter()
            .enumerate()
            .map(|(index, slots)| match slots.ty {
                Some(_) => Ok(slots.to_vk()),
                None => Err(PipelineError::EmptyGroup(index as u32)),
            })
            .collect()
    }

    pub fn build(&self, device: &Device, layout: &PipelineLayout) -> Result<Pipeline, PipelineError> {
        let groups = self.group_infos()?;
        log::debug!(
            "Creating ray tracing pipeline with {} stages in {} groups",
            self.modules.len(),
            groups.len()
        );
        device.create_ray_tracing_pipeline(layout, &self.modules, &groups, MAX_RECURSION_DEPTH)
    }
}

/// Stride and total size of a table holding `group_count` handles.
fn table_layout(properties: &RayTracingProperties, group_count: u32) -> (u64, u64) {
    let stride = auxil::align_to(
        u64::from(properties.shader_group_handle_size),
        u64::from(properties.shader_group_handle_alignment),
    );
    (stride, stride * u64::from(group_count))
}

/// Spreads tightly packed handles out to `stride` bytes apart.
fn pack_handles(handles: &[u8], handle_size: usize, stride: usize) -> Vec<u8> {
    let count = handles.len() / handle_size;
    let mut data = vec![0u8; stride * count];
    for (index, handle) in handles.chunks_exact(handle_size).enumerate() {
        data[index * stride..index * stride + handle_size].copy_from_slice(handle);
    }
    data
}

/// Host-visible buffer holding the handles of consecutive shader groups.
pub struct ShaderBindingTable {
    buffer: Buffer,
    region: vk::StridedDeviceAddressRegionKHR,
}

impl ShaderBindingTable {
    pub fn new(
        device: &Device,
        pipeline: &Pipeline,
        first_group: u32,
        group_count: u32,
    ) -> Result<Self, DeviceError> {
        let properties = device
            .ray_tracing_properties()
            .ok_or(DeviceError::Unsupported)?;
        let (stride, size) = table_layout(&properties, group_count);

        let handles = device.ray_tracing_shader_group_handles(pipeline, first_group, group_count)?;
        let data = pack_handles(
            &handles,
            properties.shader_group_handle_size as usize,
            stride as usize,
        );

        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some("shader binding table"),
            size,
            usage: vk::BufferUsageFlags::SHADER_BINDING_TABLE_KHR
                | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
            memory: MemoryUsage::Upload,
            alignment: u64::from(properties.shader_group_base_alignment),
        })?;
        buffer.write_bytes(0, &data)?;

        let region = vk::StridedDeviceAddressRegionKHR {
            device_address: device.buffer_device_address(&buffer)?,
            stride,
            size,
        };
        Ok(Self { buffer, region })
    }

    pub fn region(&self) -> vk::StridedDeviceAddressRegionKHR {
        self.region
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties(handle_size: u32, handle_alignment: u32) -> RayTracingProperties {
        RayTracingProperties {
            shader_group_handle_size: handle_size,
            shader_group_base_alignment: 64,
            shader_group_handle_alignment: handle_alignment,
        }
    }

    #[test]
    fn table_layout_aligns_stride() {
        assert_eq!(table_layout(&properties(32, 32), 1), (32, 32));
        assert_eq!(table_layout(&properties(32, 64), 3), (64, 192));
        assert_eq!(table_layout(&properties(16, 32), 0), (32, 0));
    }

    #[test]
    fn handles_are_spread_to_stride() {
        let handles = [1u8, 2, 3, 4];
        assert_eq!(pack_handles(&handles, 2, 4), vec![1, 2, 0, 0, 3, 4, 0, 0]);
        assert_eq!(pack_handles(&handles, 2, 2), handles.to_vec());
    }

    #[test]
    fn group_slots_fill_unused() {
        let info = GroupSlots {
            ty: Some(vk::RayTracingShaderGroupTypeKHR::PROCEDURAL_HIT_GROUP),
            any_hit: Some(2),
            intersection: Some(3),
            ..GroupSlots::default()
        }
        .to_vk();
        assert_eq!(info.ty, vk::RayTracingShaderGroupTypeKHR::PROCEDURAL_HIT_GROUP);
        assert_eq!(info.general_shader, vk::SHADER_UNUSED_KHR);
        assert_eq!(info.closest_hit_shader, vk::SHADER_UNUSED_KHR);
        assert_eq!(info.any_hit_shader, 2);
        assert_eq!(info.intersection_shader, 3);
    }

    #[test]
    fn hit_group_type_follows_stages() {
        let mut builder = RayTracingPipelineBuilder::new();
        builder.assign(ShaderStage::RayGeneration, 0, 0).unwrap();
        builder.assign(ShaderStage::Miss, 1, 1).unwrap();
        builder.assign(ShaderStage::AnyHit, 2, 2).unwrap();
        assert_eq!(
            builder.groups[2].ty,
            Some(vk::RayTracingShaderGroupTypeKHR::TRIANGLES_HIT_GROUP)
        );
        builder.assign(ShaderStage::Intersection, 3, 2).unwrap();
        assert_eq!(
            builder.groups[2].ty,
            Some(vk::RayTracingShaderGroupTypeKHR::PROCEDURAL_HIT_GROUP)
        );
        assert_eq!(builder.group_count(), 3);

        let infos = builder.group_infos().unwrap();
        assert_eq!(infos[0].general_shader, 0);
        assert_eq!(infos[1].general_shader, 1);
        assert_eq!(infos[2].any_hit_shader, 2);
        assert_eq!(infos[2].intersection_shader, 3);
    }

    #[test]
    fn gaps_and_compute_are_rejected() {
        let mut builder = RayTracingPipelineBuilder::new();
        builder.assign(ShaderStage::Miss, 0, 1).unwrap();
        assert!(matches!(
            builder.group_infos(),
            Err(PipelineError::EmptyGroup(0))
        ));
        assert!(matches!(
            builder.assign(ShaderStage::Compute, 1, 0),
            Err(PipelineError::Linkage(ShaderStage::Compute, _))
        ));
    }
}
