use ash::vk;

use super::MemoryUsage;

pub fn map_memory_usage(usage: MemoryUsage, device_address: bool) -> gpu_alloc::UsageFlags {
    let mut flags = match usage {
        MemoryUsage::DeviceLocal => gpu_alloc::UsageFlags::FAST_DEVICE_ACCESS,
        MemoryUsage::Upload => gpu_alloc::UsageFlags::HOST_ACCESS | gpu_alloc::UsageFlags::UPLOAD,
        MemoryUsage::Download => {
            gpu_alloc::UsageFlags::HOST_ACCESS | gpu_alloc::UsageFlags::DOWNLOAD
        }
    };
    flags.set(gpu_alloc::UsageFlags::DEVICE_ADDRESS, device_address);
    flags
}

pub fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

pub fn color_subresource_layers() -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level: 0,
        base_array_layer: 0,
        layer_count: 1,
    }
}

pub fn map_device_type(device_type: vk::PhysicalDeviceType) -> &'static str {
    match device_type {
        vk::PhysicalDeviceType::INTEGRATED_GPU => "integrated GPU",
        vk::PhysicalDeviceType::DISCRETE_GPU => "discrete GPU",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "virtual GPU",
        vk::PhysicalDeviceType::CPU => "CPU",
        _ => "other",
    }
}

/// Memory property flags the allocator may hand out.
pub fn known_memory_flags() -> vk::MemoryPropertyFlags {
    vk::MemoryPropertyFlags::DEVICE_LOCAL
        | vk::MemoryPropertyFlags::HOST_VISIBLE
        | vk::MemoryPropertyFlags::HOST_COHERENT
        | vk::MemoryPropertyFlags::HOST_CACHED
        | vk::MemoryPropertyFlags::LAZILY_ALLOCATED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_memory_is_host_visible() {
        let flags = map_memory_usage(MemoryUsage::Download, false);
        assert!(flags.contains(gpu_alloc::UsageFlags::HOST_ACCESS | gpu_alloc::UsageFlags::DOWNLOAD));
        assert!(!flags.contains(gpu_alloc::UsageFlags::DEVICE_ADDRESS));

        let flags = map_memory_usage(MemoryUsage::DeviceLocal, true);
        assert!(flags.contains(gpu_alloc::UsageFlags::FAST_DEVICE_ACCESS));
        assert!(flags.contains(gpu_alloc::UsageFlags::DEVICE_ADDRESS));
    }
}
