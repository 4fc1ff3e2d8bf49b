use std::{ffi::CStr, mem::ManuallyDrop, ptr::NonNull, sync::Arc};

use ash::vk;
use parking_lot::Mutex;

use super::{conv, DeviceResult, RayTracingProperties};
use crate::{shader::ProgramBinary, ApiVersion, DeviceError, PipelineError, ShaderError};

impl gpu_alloc::MemoryDevice<vk::DeviceMemory> for super::DeviceShared {
    unsafe fn allocate_memory(
        &self,
        size: u64,
        memory_type: u32,
        flags: gpu_alloc::AllocationFlags,
    ) -> Result<vk::DeviceMemory, gpu_alloc::OutOfMemory> {
        let mut info = vk::MemoryAllocateInfo::builder()
            .allocation_size(size)
            .memory_type_index(memory_type);

        let mut info_flags;

        if flags.contains(gpu_alloc::AllocationFlags::DEVICE_ADDRESS) {
            info_flags = vk::MemoryAllocateFlagsInfo::builder()
                .flags(vk::MemoryAllocateFlags::DEVICE_ADDRESS);
            info = info.push_next(&mut info_flags);
        }

        match unsafe { self.raw.allocate_memory(&info, None) } {
            Ok(memory) => Ok(memory),
            Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY) => {
                Err(gpu_alloc::OutOfMemory::OutOfDeviceMemory)
            }
            Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY) => {
                Err(gpu_alloc::OutOfMemory::OutOfHostMemory)
            }
            Err(err) => {
                log::error!("vkAllocateMemory: {}", err);
                Err(gpu_alloc::OutOfMemory::OutOfDeviceMemory)
            }
        }
    }

    unsafe fn deallocate_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.raw.free_memory(memory, None) };
    }

    unsafe fn map_memory(
        &self,
        memory: &mut vk::DeviceMemory,
        offset: u64,
        size: u64,
    ) -> Result<NonNull<u8>, gpu_alloc::DeviceMapError> {
        match unsafe {
            self.raw
                .map_memory(*memory, offset, size, vk::MemoryMapFlags::empty())
        } {
            Ok(ptr) => NonNull::new(ptr as *mut u8).ok_or(gpu_alloc::DeviceMapError::MapFailed),
            Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY) => {
                Err(gpu_alloc::DeviceMapError::OutOfDeviceMemory)
            }
            Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY) => {
                Err(gpu_alloc::DeviceMapError::OutOfHostMemory)
            }
            Err(vk::Result::ERROR_MEMORY_MAP_FAILED) => Err(gpu_alloc::DeviceMapError::MapFailed),
            Err(err) => {
                log::error!("vkMapMemory: {}", err);
                Err(gpu_alloc::DeviceMapError::MapFailed)
            }
        }
    }

    unsafe fn unmap_memory(&self, memory: &mut vk::DeviceMemory) {
        unsafe { self.raw.unmap_memory(*memory) };
    }

    unsafe fn invalidate_memory_ranges(
        &self,
        ranges: &[gpu_alloc::MappedMemoryRange<'_, vk::DeviceMemory>],
    ) -> Result<(), gpu_alloc::OutOfMemory> {
        let vk_ranges = map_memory_ranges(ranges);
        unsafe { self.raw.invalidate_mapped_memory_ranges(&vk_ranges) }
            .map_err(map_out_of_memory)
    }

    unsafe fn flush_memory_ranges(
        &self,
        ranges: &[gpu_alloc::MappedMemoryRange<'_, vk::DeviceMemory>],
    ) -> Result<(), gpu_alloc::OutOfMemory> {
        let vk_ranges = map_memory_ranges(ranges);
        unsafe { self.raw.flush_mapped_memory_ranges(&vk_ranges) }.map_err(map_out_of_memory)
    }
}

fn map_memory_ranges(
    ranges: &[gpu_alloc::MappedMemoryRange<'_, vk::DeviceMemory>],
) -> Vec<vk::MappedMemoryRange> {
    ranges
        .iter()
        .map(|range| {
            vk::MappedMemoryRange::builder()
                .memory(*range.memory)
                .offset(range.offset)
                .size(range.size)
                .build()
        })
        .collect()
}

fn map_out_of_memory(err: vk::Result) -> gpu_alloc::OutOfMemory {
    match err {
        vk::Result::ERROR_OUT_OF_HOST_MEMORY => gpu_alloc::OutOfMemory::OutOfHostMemory,
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => gpu_alloc::OutOfMemory::OutOfDeviceMemory,
        other => {
            log::error!("memory range operation: {}", other);
            gpu_alloc::OutOfMemory::OutOfDeviceMemory
        }
    }
}

/// Where a resource's memory should live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryUsage {
    DeviceLocal,
    /// Host writes, device reads.
    Upload,
    /// Device writes, host reads.
    Download,
}

#[derive(Clone, Debug)]
pub struct BufferDescriptor<'a> {
    pub label: Option<&'a str>,
    pub size: u64,
    pub usage: vk::BufferUsageFlags,
    pub memory: MemoryUsage,
    /// Minimum alignment of the allocation, on top of the driver's requirement.
    pub alignment: u64,
}

#[derive(Clone, Debug)]
pub struct ImageDescriptor<'a> {
    pub label: Option<&'a str>,
    pub width: u32,
    pub height: u32,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
}

/// Proof that every submission made so far has finished executing.
///
/// Only [`super::Device::submit_and_wait`] creates one, so holding it means
/// the fence wait has returned.
#[derive(Debug)]
pub struct SubmissionComplete {
    _private: (),
}

pub struct Buffer {
    raw: vk::Buffer,
    size: u64,
    block: ManuallyDrop<Mutex<gpu_alloc::MemoryBlock<vk::DeviceMemory>>>,
    device: Arc<super::DeviceShared>,
}

impl Buffer {
    pub fn raw(&self) -> vk::Buffer {
        self.raw
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Copies `data` into the buffer and flushes it for the device.
    pub fn write_bytes(&self, offset: u64, data: &[u8]) -> DeviceResult<()> {
        profiling::scope!("Buffer::write_bytes");
        let mut block = self.block.lock();
        unsafe { block.write_bytes(&*self.device, offset, data) }?;
        Ok(())
    }

    /// Invalidates the range and copies it out. The device must be done writing.
    pub fn read_bytes(
        &self,
        _done: &SubmissionComplete,
        offset: u64,
        data: &mut [u8],
    ) -> DeviceResult<()> {
        profiling::scope!("Buffer::read_bytes");
        let mut block = self.block.lock();
        unsafe { block.read_bytes(&*self.device, offset, data) }?;
        Ok(())
    }

    /// Reads `count` native-endian words from the start of the buffer.
    pub fn read_u32s(&self, done: &SubmissionComplete, count: usize) -> DeviceResult<Vec<u32>> {
        let mut bytes = vec![0u8; count * 4];
        self.read_bytes(done, 0, &mut bytes)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        let block = unsafe { ManuallyDrop::take(&mut self.block) }.into_inner();
        unsafe {
            self.device.raw.destroy_buffer(self.raw, None);
            self.device.mem_allocator.lock().dealloc(&*self.device, block);
        }
    }
}

pub struct Image {
    raw: vk::Image,
    format: vk::Format,
    extent: vk::Extent2D,
    block: ManuallyDrop<gpu_alloc::MemoryBlock<vk::DeviceMemory>>,
    device: Arc<super::DeviceShared>,
}

impl Image {
    pub fn raw(&self) -> vk::Image {
        self.raw
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        let block = unsafe { ManuallyDrop::take(&mut self.block) };
        unsafe {
            self.device.raw.destroy_image(self.raw, None);
            self.device.mem_allocator.lock().dealloc(&*self.device, block);
        }
    }
}

pub struct ImageView {
    raw: vk::ImageView,
    device: Arc<super::DeviceShared>,
}

impl ImageView {
    pub fn raw(&self) -> vk::ImageView {
        self.raw
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        unsafe { self.device.raw.destroy_image_view(self.raw, None) };
    }
}

pub struct DescriptorSetLayout {
    raw: vk::DescriptorSetLayout,
    device: Arc<super::DeviceShared>,
}

impl DescriptorSetLayout {
    pub fn raw(&self) -> vk::DescriptorSetLayout {
        self.raw
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .raw
                .destroy_descriptor_set_layout(self.raw, None)
        };
    }
}

/// Descriptor sets allocated from the pool are freed with it.
pub struct DescriptorPool {
    raw: vk::DescriptorPool,
    device: Arc<super::DeviceShared>,
}

impl DescriptorPool {
    pub fn raw(&self) -> vk::DescriptorPool {
        self.raw
    }

    pub fn allocate(&self, layout: &DescriptorSetLayout) -> DeviceResult<vk::DescriptorSet> {
        let layouts = [layout.raw];
        let info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.raw)
            .set_layouts(&layouts);
        let sets = unsafe { self.device.raw.allocate_descriptor_sets(&info) }?;
        sets.into_iter().next().ok_or(DeviceError::OutOfMemory)
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe { self.device.raw.destroy_descriptor_pool(self.raw, None) };
    }
}

pub struct PipelineLayout {
    raw: vk::PipelineLayout,
    device: Arc<super::DeviceShared>,
}

impl PipelineLayout {
    pub fn raw(&self) -> vk::PipelineLayout {
        self.raw
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe { self.device.raw.destroy_pipeline_layout(self.raw, None) };
    }
}

pub struct ShaderModule {
    raw: vk::ShaderModule,
    stage: crate::shader::ShaderStage,
    device: Arc<super::DeviceShared>,
}

impl ShaderModule {
    pub fn raw(&self) -> vk::ShaderModule {
        self.raw
    }

    pub fn stage(&self) -> crate::shader::ShaderStage {
        self.stage
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe { self.device.raw.destroy_shader_module(self.raw, None) };
    }
}

pub struct Pipeline {
    raw: vk::Pipeline,
    bind_point: vk::PipelineBindPoint,
    device: Arc<super::DeviceShared>,
}

impl Pipeline {
    pub fn raw(&self) -> vk::Pipeline {
        self.raw
    }

    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        self.bind_point
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe { self.device.raw.destroy_pipeline(self.raw, None) };
    }
}

struct Fence {
    raw: vk::Fence,
    device: Arc<super::DeviceShared>,
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe { self.device.raw.destroy_fence(self.raw, None) };
    }
}

impl super::DeviceShared {
    pub(super) fn raw(&self) -> &ash::Device {
        &self.raw
    }

    pub(super) fn family_index(&self) -> u32 {
        self.family_index
    }
}

impl super::Device {
    pub fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    pub fn ray_tracing_properties(&self) -> Option<RayTracingProperties> {
        self.ray_tracing
    }

    pub(super) fn shared(&self) -> &Arc<super::DeviceShared> {
        &self.shared
    }

    pub fn create_buffer(&self, desc: &BufferDescriptor) -> DeviceResult<Buffer> {
        let vk_info = vk::BufferCreateInfo::builder()
            .size(desc.size)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let raw = unsafe { self.shared.raw.create_buffer(&vk_info, None) }?;
        let req = unsafe { self.shared.raw.get_buffer_memory_requirements(raw) };

        let device_address = desc
            .usage
            .contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS);
        let alignment = req.alignment.max(desc.alignment).max(1);
        let block = unsafe {
            self.shared.mem_allocator.lock().alloc(
                &*self.shared,
                gpu_alloc::Request {
                    size: req.size,
                    align_mask: alignment - 1,
                    usage: conv::map_memory_usage(desc.memory, device_address),
                    memory_types: req.memory_type_bits & self.shared.valid_ash_memory_types,
                },
            )
        };
        let block = match block {
            Ok(block) => block,
            Err(err) => {
                unsafe { self.shared.raw.destroy_buffer(raw, None) };
                return Err(err.into());
            }
        };

        let buffer = Buffer {
            raw,
            size: desc.size,
            block: ManuallyDrop::new(Mutex::new(block)),
            device: Arc::clone(&self.shared),
        };
        {
            let block = buffer.block.lock();
            unsafe {
                self.shared
                    .raw
                    .bind_buffer_memory(raw, *block.memory(), block.offset())
            }?;
        }
        if let Some(label) = desc.label {
            log::trace!("Created buffer {:?} ({} bytes)", label, desc.size);
        }
        Ok(buffer)
    }

    pub fn create_image(&self, desc: &ImageDescriptor) -> DeviceResult<Image> {
        let vk_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(desc.format)
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let raw = unsafe { self.shared.raw.create_image(&vk_info, None) }?;
        let req = unsafe { self.shared.raw.get_image_memory_requirements(raw) };

        let block = unsafe {
            self.shared.mem_allocator.lock().alloc(
                &*self.shared,
                gpu_alloc::Request {
                    size: req.size,
                    align_mask: req.alignment - 1,
                    usage: gpu_alloc::UsageFlags::FAST_DEVICE_ACCESS,
                    memory_types: req.memory_type_bits & self.shared.valid_ash_memory_types,
                },
            )
        };
        let block = match block {
            Ok(block) => block,
            Err(err) => {
                unsafe { self.shared.raw.destroy_image(raw, None) };
                return Err(err.into());
            }
        };

        let image = Image {
            raw,
            format: desc.format,
            extent: vk::Extent2D {
                width: desc.width,
                height: desc.height,
            },
            block: ManuallyDrop::new(block),
            device: Arc::clone(&self.shared),
        };
        unsafe {
            self.shared
                .raw
                .bind_image_memory(raw, *image.block.memory(), image.block.offset())
        }?;
        if let Some(label) = desc.label {
            log::trace!("Created image {:?} ({}x{})", label, desc.width, desc.height);
        }
        Ok(image)
    }

    pub fn create_image_view(&self, image: &Image) -> DeviceResult<ImageView> {
        let vk_info = vk::ImageViewCreateInfo::builder()
            .image(image.raw)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(image.format)
            .subresource_range(conv::color_subresource_range());

        let raw = unsafe { self.shared.raw.create_image_view(&vk_info, None) }?;
        Ok(ImageView {
            raw,
            device: Arc::clone(&self.shared),
        })
    }

    pub fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> DeviceResult<DescriptorSetLayout> {
        let vk_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(bindings);
        let raw = unsafe {
            self.shared
                .raw
                .create_descriptor_set_layout(&vk_info, None)
        }?;
        Ok(DescriptorSetLayout {
            raw,
            device: Arc::clone(&self.shared),
        })
    }

    pub fn create_descriptor_pool(
        &self,
        sizes: &[vk::DescriptorPoolSize],
        max_sets: u32,
    ) -> DeviceResult<DescriptorPool> {
        let vk_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .pool_sizes(sizes);
        let raw = unsafe { self.shared.raw.create_descriptor_pool(&vk_info, None) }?;
        Ok(DescriptorPool {
            raw,
            device: Arc::clone(&self.shared),
        })
    }

    pub fn create_pipeline_layout(
        &self,
        set_layouts: &[&DescriptorSetLayout],
    ) -> DeviceResult<PipelineLayout> {
        let raw_layouts = set_layouts
            .iter()
            .map(|layout| layout.raw)
            .collect::<Vec<_>>();
        let vk_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&raw_layouts);
        let raw = unsafe { self.shared.raw.create_pipeline_layout(&vk_info, None) }?;
        Ok(PipelineLayout {
            raw,
            device: Arc::clone(&self.shared),
        })
    }

    pub fn create_shader_module(&self, binary: &ProgramBinary) -> Result<ShaderModule, ShaderError> {
        let vk_info = vk::ShaderModuleCreateInfo::builder().code(binary.words());
        let raw = {
            profiling::scope!("vkCreateShaderModule");
            unsafe { self.shared.raw.create_shader_module(&vk_info, None) }?
        };
        Ok(ShaderModule {
            raw,
            stage: binary.stage(),
            device: Arc::clone(&self.shared),
        })
    }

    /// Creates a ray tracing pipeline. Every module must hold a ray tracing stage.
    pub fn create_ray_tracing_pipeline(
        &self,
        layout: &PipelineLayout,
        modules: &[&ShaderModule],
        groups: &[vk::RayTracingShaderGroupCreateInfoKHR],
        max_recursion_depth: u32,
    ) -> Result<Pipeline, PipelineError> {
        let functor = self
            .shared
            .extension_fns
            .ray_tracing_pipeline
            .as_ref()
            .ok_or(DeviceError::Unsupported)?;

        if let Some(module) = modules.iter().find(|module| !module.stage.is_ray_tracing()) {
            return Err(PipelineError::Linkage(
                module.stage,
                String::from("not a ray tracing stage"),
            ));
        }

        let entry_point = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };
        let stages = modules
            .iter()
            .map(|module| {
                vk::PipelineShaderStageCreateInfo::builder()
                    .stage(module.stage.to_vk())
                    .module(module.raw)
                    .name(entry_point)
                    .build()
            })
            .collect::<Vec<_>>();

        let vk_info = vk::RayTracingPipelineCreateInfoKHR::builder()
            .stages(&stages)
            .groups(groups)
            .max_pipeline_ray_recursion_depth(max_recursion_depth)
            .layout(layout.raw)
            .build();

        let mut raw_pipelines = {
            profiling::scope!("vkCreateRayTracingPipelinesKHR");
            unsafe {
                functor.create_ray_tracing_pipelines(
                    vk::DeferredOperationKHR::null(),
                    vk::PipelineCache::null(),
                    &[vk_info],
                    None,
                )
            }?
        };
        let raw = raw_pipelines
            .pop()
            .ok_or(PipelineError::Device(DeviceError::Lost))?;
        Ok(Pipeline {
            raw,
            bind_point: vk::PipelineBindPoint::RAY_TRACING_KHR,
            device: Arc::clone(&self.shared),
        })
    }

    /// Opaque handles of `group_count` groups starting at `first_group`, tightly packed.
    pub fn ray_tracing_shader_group_handles(
        &self,
        pipeline: &Pipeline,
        first_group: u32,
        group_count: u32,
    ) -> DeviceResult<Vec<u8>> {
        let functor = self
            .shared
            .extension_fns
            .ray_tracing_pipeline
            .as_ref()
            .ok_or(DeviceError::Unsupported)?;
        let handle_size = self
            .ray_tracing
            .ok_or(DeviceError::Unsupported)?
            .shader_group_handle_size;
        let data_size = (handle_size * group_count) as usize;
        let handles = unsafe {
            functor.get_ray_tracing_shader_group_handles(
                pipeline.raw,
                first_group,
                group_count,
                data_size,
            )
        }?;
        Ok(handles)
    }

    pub fn buffer_device_address(&self, buffer: &Buffer) -> DeviceResult<vk::DeviceAddress> {
        let vk_info = vk::BufferDeviceAddressInfo::builder().buffer(buffer.raw);
        match self.shared.extension_fns.buffer_device_address {
            Some(super::ExtensionFn::Extension(ref ext)) => {
                Ok(unsafe { ext.get_buffer_device_address(&vk_info) })
            }
            Some(super::ExtensionFn::Promoted) => {
                Ok(unsafe { self.shared.raw.get_buffer_device_address(&vk_info) })
            }
            None => Err(DeviceError::Unsupported),
        }
    }

    /// # Safety
    ///
    /// Every pointer inside `writes` must be valid, and the sets must not be in use
    /// by a pending submission.
    pub unsafe fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet]) {
        unsafe { self.shared.raw.update_descriptor_sets(writes, &[]) };
    }

    /// Submits the encoder's command buffer and blocks until it has executed.
    pub fn submit_and_wait(
        &self,
        encoder: &super::CommandEncoder,
    ) -> DeviceResult<SubmissionComplete> {
        profiling::scope!("submit_and_wait");
        let vk_info = vk::FenceCreateInfo::builder();
        let fence = Fence {
            raw: unsafe { self.shared.raw.create_fence(&vk_info, None) }?,
            device: Arc::clone(&self.shared),
        };

        let command_buffers = [encoder.raw()];
        let vk_info = vk::SubmitInfo::builder()
            .command_buffers(&command_buffers)
            .build();
        {
            let queue = self.raw_queue.lock();
            profiling::scope!("vkQueueSubmit");
            unsafe { self.shared.raw.queue_submit(*queue, &[vk_info], fence.raw) }?;
        }
        {
            profiling::scope!("vkWaitForFences");
            unsafe {
                self.shared
                    .raw
                    .wait_for_fences(&[fence.raw], true, u64::MAX)
            }?;
        }
        Ok(SubmissionComplete { _private: () })
    }
}
