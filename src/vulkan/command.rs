use std::{ops::Range, sync::Arc};

use ash::vk;

use super::{conv, DeviceResult};
use crate::DeviceError;

/// Shader binding table regions consumed by one `vkCmdTraceRaysKHR`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TraceRegions {
    pub raygen: vk::StridedDeviceAddressRegionKHR,
    pub miss: vk::StridedDeviceAddressRegionKHR,
    pub hit: vk::StridedDeviceAddressRegionKHR,
    pub callable: vk::StridedDeviceAddressRegionKHR,
}

/// A command pool with a single primary command buffer.
///
/// Recording methods are unsafe: every resource they reference must stay
/// alive until the submission that executes them has completed.
pub struct CommandEncoder {
    raw: vk::CommandPool,
    active: vk::CommandBuffer,
    device: Arc<super::DeviceShared>,
}

impl super::Device {
    pub fn create_command_encoder(&self) -> DeviceResult<CommandEncoder> {
        let shared = self.shared();
        let vk_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(shared.family_index())
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        let raw = unsafe { shared.raw().create_command_pool(&vk_info, None) }?;
        let mut encoder = CommandEncoder {
            raw,
            active: vk::CommandBuffer::null(),
            device: Arc::clone(shared),
        };

        let vk_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(raw)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let cmd_buf_vec = unsafe { shared.raw().allocate_command_buffers(&vk_info) }?;
        encoder.active = cmd_buf_vec
            .into_iter()
            .next()
            .ok_or(DeviceError::OutOfMemory)?;
        Ok(encoder)
    }
}

impl CommandEncoder {
    pub(super) fn raw(&self) -> vk::CommandBuffer {
        self.active
    }

    pub fn begin(&mut self) -> DeviceResult<()> {
        let vk_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device.raw().begin_command_buffer(self.active, &vk_info) }?;
        Ok(())
    }

    pub fn end(&mut self) -> DeviceResult<()> {
        unsafe { self.device.raw().end_command_buffer(self.active) }?;
        Ok(())
    }

    pub unsafe fn transition_image(
        &mut self,
        image: &super::Image,
        layouts: Range<vk::ImageLayout>,
        access: Range<vk::AccessFlags>,
        stages: Range<vk::PipelineStageFlags>,
    ) {
        let barrier = vk::ImageMemoryBarrier::builder()
            .src_access_mask(access.start)
            .dst_access_mask(access.end)
            .old_layout(layouts.start)
            .new_layout(layouts.end)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image.raw())
            .subresource_range(conv::color_subresource_range())
            .build();
        unsafe {
            self.device.raw().cmd_pipeline_barrier(
                self.active,
                stages.start,
                stages.end,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            )
        };
    }

    pub unsafe fn memory_barrier(
        &mut self,
        access: Range<vk::AccessFlags>,
        stages: Range<vk::PipelineStageFlags>,
    ) {
        let barrier = vk::MemoryBarrier::builder()
            .src_access_mask(access.start)
            .dst_access_mask(access.end)
            .build();
        unsafe {
            self.device.raw().cmd_pipeline_barrier(
                self.active,
                stages.start,
                stages.end,
                vk::DependencyFlags::empty(),
                &[barrier],
                &[],
                &[],
            )
        };
    }

    pub unsafe fn clear_color_image(
        &mut self,
        image: &super::Image,
        layout: vk::ImageLayout,
        value: vk::ClearColorValue,
    ) {
        unsafe {
            self.device.raw().cmd_clear_color_image(
                self.active,
                image.raw(),
                layout,
                &value,
                &[conv::color_subresource_range()],
            )
        };
    }

    pub unsafe fn bind_pipeline(&mut self, pipeline: &super::Pipeline) {
        unsafe {
            self.device
                .raw()
                .cmd_bind_pipeline(self.active, pipeline.bind_point(), pipeline.raw())
        };
    }

    pub unsafe fn bind_descriptor_set(
        &mut self,
        pipeline: &super::Pipeline,
        layout: &super::PipelineLayout,
        set: vk::DescriptorSet,
    ) {
        unsafe {
            self.device.raw().cmd_bind_descriptor_sets(
                self.active,
                pipeline.bind_point(),
                layout.raw(),
                0,
                &[set],
                &[],
            )
        };
    }

    pub unsafe fn trace_rays(
        &mut self,
        regions: &TraceRegions,
        width: u32,
        height: u32,
        depth: u32,
    ) -> DeviceResult<()> {
        let functor = self
            .device
            .extension_fns
            .ray_tracing_pipeline
            .as_ref()
            .ok_or(DeviceError::Unsupported)?;
        unsafe {
            functor.cmd_trace_rays(
                self.active,
                &regions.raygen,
                &regions.miss,
                &regions.hit,
                &regions.callable,
                width,
                height,
                depth,
            )
        };
        Ok(())
    }

    pub unsafe fn copy_image_to_buffer(
        &mut self,
        image: &super::Image,
        layout: vk::ImageLayout,
        buffer: &super::Buffer,
    ) {
        let extent = image.extent();
        let region = vk::BufferImageCopy {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: conv::color_subresource_layers(),
            image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            image_extent: vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            },
        };
        unsafe {
            self.device.raw().cmd_copy_image_to_buffer(
                self.active,
                image.raw(),
                layout,
                buffer.raw(),
                &[region],
            )
        };
    }
}

impl Drop for CommandEncoder {
    fn drop(&mut self) {
        // Destroying the pool frees its command buffers.
        unsafe { self.device.raw().destroy_command_pool(self.raw, None) };
    }
}
