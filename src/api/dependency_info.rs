//! `requires` relations of the Vulkan registry, per API version and scope.
//!
//! The 1.1 tables drop every relation whose extension or dependency is part
//! of core Vulkan 1.1.

/// An extension and one extension it requires.
pub type ExtensionDependency = (&'static str, &'static str);

pub static INSTANCE_EXTENSION_DEPENDENCIES_1_0: &[ExtensionDependency] = &[
    ("VK_KHR_android_surface", "VK_KHR_surface"),
    ("VK_KHR_display", "VK_KHR_surface"),
    ("VK_KHR_external_fence_capabilities", "VK_KHR_get_physical_device_properties2"),
    ("VK_KHR_external_memory_capabilities", "VK_KHR_get_physical_device_properties2"),
    ("VK_KHR_external_semaphore_capabilities", "VK_KHR_get_physical_device_properties2"),
    ("VK_KHR_get_display_properties2", "VK_KHR_display"),
    ("VK_KHR_get_surface_capabilities2", "VK_KHR_surface"),
    ("VK_KHR_surface_protected_capabilities", "VK_KHR_get_surface_capabilities2"),
    ("VK_KHR_wayland_surface", "VK_KHR_surface"),
    ("VK_KHR_win32_surface", "VK_KHR_surface"),
    ("VK_KHR_xcb_surface", "VK_KHR_surface"),
    ("VK_KHR_xlib_surface", "VK_KHR_surface"),
    ("VK_EXT_acquire_xlib_display", "VK_EXT_direct_mode_display"),
    ("VK_EXT_direct_mode_display", "VK_KHR_display"),
    ("VK_EXT_display_surface_counter", "VK_KHR_display"),
    ("VK_EXT_headless_surface", "VK_KHR_surface"),
    ("VK_EXT_metal_surface", "VK_KHR_surface"),
    ("VK_EXT_swapchain_colorspace", "VK_KHR_surface"),
    ("VK_FUCHSIA_imagepipe_surface", "VK_KHR_surface"),
    ("VK_GGP_stream_descriptor_surface", "VK_KHR_surface"),
    ("VK_MVK_ios_surface", "VK_KHR_surface"),
    ("VK_MVK_macos_surface", "VK_KHR_surface"),
    ("VK_NN_vi_surface", "VK_KHR_surface"),
];

pub static INSTANCE_EXTENSION_DEPENDENCIES_1_1: &[ExtensionDependency] = &[
    ("VK_KHR_android_surface", "VK_KHR_surface"),
    ("VK_KHR_display", "VK_KHR_surface"),
    ("VK_KHR_get_display_properties2", "VK_KHR_display"),
    ("VK_KHR_get_surface_capabilities2", "VK_KHR_surface"),
    ("VK_KHR_surface_protected_capabilities", "VK_KHR_get_surface_capabilities2"),
    ("VK_KHR_wayland_surface", "VK_KHR_surface"),
    ("VK_KHR_win32_surface", "VK_KHR_surface"),
    ("VK_KHR_xcb_surface", "VK_KHR_surface"),
    ("VK_KHR_xlib_surface", "VK_KHR_surface"),
    ("VK_EXT_acquire_xlib_display", "VK_EXT_direct_mode_display"),
    ("VK_EXT_direct_mode_display", "VK_KHR_display"),
    ("VK_EXT_display_surface_counter", "VK_KHR_display"),
    ("VK_EXT_headless_surface", "VK_KHR_surface"),
    ("VK_EXT_metal_surface", "VK_KHR_surface"),
    ("VK_EXT_swapchain_colorspace", "VK_KHR_surface"),
    ("VK_FUCHSIA_imagepipe_surface", "VK_KHR_surface"),
    ("VK_GGP_stream_descriptor_surface", "VK_KHR_surface"),
    ("VK_MVK_ios_surface", "VK_KHR_surface"),
    ("VK_MVK_macos_surface", "VK_KHR_surface"),
    ("VK_NN_vi_surface", "VK_KHR_surface"),
];

pub static DEVICE_EXTENSION_DEPENDENCIES_1_0: &[ExtensionDependency] = &[
    ("VK_KHR_16bit_storage", "VK_KHR_get_physical_device_properties2"),
    ("VK_KHR_16bit_storage", "VK_KHR_storage_buffer_storage_class"),
    ("VK_KHR_8bit_storage", "VK_KHR_get_physical_device_properties2"),
    ("VK_KHR_8bit_storage", "VK_KHR_storage_buffer_storage_class"),
    ("VK_KHR_buffer_device_address", "VK_KHR_get_physical_device_properties2"),
    ("VK_KHR_create_renderpass2", "VK_KHR_multiview"),
    ("VK_KHR_create_renderpass2", "VK_KHR_maintenance2"),
    ("VK_KHR_dedicated_allocation", "VK_KHR_get_memory_requirements2"),
    ("VK_KHR_depth_stencil_resolve", "VK_KHR_create_renderpass2"),
    ("VK_KHR_device_group", "VK_KHR_device_group_creation"),
    ("VK_KHR_display_swapchain", "VK_KHR_swapchain"),
    ("VK_KHR_display_swapchain", "VK_KHR_display"),
    ("VK_KHR_driver_properties", "VK_KHR_get_physical_device_properties2"),
    ("VK_KHR_external_fence", "VK_KHR_external_fence_capabilities"),
    ("VK_KHR_external_fence_fd", "VK_KHR_external_fence"),
    ("VK_KHR_external_fence_win32", "VK_KHR_external_fence"),
    ("VK_KHR_external_memory", "VK_KHR_external_memory_capabilities"),
    ("VK_KHR_external_memory_fd", "VK_KHR_external_memory"),
    ("VK_KHR_external_memory_win32", "VK_KHR_external_memory"),
    ("VK_KHR_external_semaphore", "VK_KHR_external_semaphore_capabilities"),
    ("VK_KHR_external_semaphore_fd", "VK_KHR_external_semaphore"),
    ("VK_KHR_external_semaphore_win32", "VK_KHR_external_semaphore"),
    ("VK_KHR_imageless_framebuffer", "VK_KHR_maintenance2"),
    ("VK_KHR_imageless_framebuffer", "VK_KHR_image_format_list"),
    ("VK_KHR_incremental_present", "VK_KHR_swapchain"),
    ("VK_KHR_multiview", "VK_KHR_get_physical_device_properties2"),
    ("VK_KHR_pipeline_executable_properties", "VK_KHR_get_physical_device_properties2"),
    ("VK_KHR_push_descriptor", "VK_KHR_get_physical_device_properties2"),
    ("VK_KHR_sampler_ycbcr_conversion", "VK_KHR_maintenance1"),
    ("VK_KHR_sampler_ycbcr_conversion", "VK_KHR_bind_memory2"),
    ("VK_KHR_sampler_ycbcr_conversion", "VK_KHR_get_memory_requirements2"),
    ("VK_KHR_sampler_ycbcr_conversion", "VK_KHR_get_physical_device_properties2"),
    ("VK_KHR_separate_depth_stencil_layouts", "VK_KHR_get_physical_device_properties2"),
    ("VK_KHR_separate_depth_stencil_layouts", "VK_KHR_create_renderpass2"),
    ("VK_KHR_shader_atomic_int64", "VK_KHR_get_physical_device_properties2"),
    ("VK_KHR_shader_clock", "VK_KHR_get_physical_device_properties2"),
    ("VK_KHR_shader_float16_int8", "VK_KHR_get_physical_device_properties2"),
    ("VK_KHR_shader_float_controls", "VK_KHR_get_physical_device_properties2"),
    ("VK_KHR_shared_presentable_image", "VK_KHR_swapchain"),
    ("VK_KHR_shared_presentable_image", "VK_KHR_get_physical_device_properties2"),
    ("VK_KHR_shared_presentable_image", "VK_KHR_get_surface_capabilities2"),
    ("VK_KHR_swapchain", "VK_KHR_surface"),
    ("VK_KHR_swapchain_mutable_format", "VK_KHR_swapchain"),
    ("VK_KHR_swapchain_mutable_format", "VK_KHR_maintenance2"),
    ("VK_KHR_swapchain_mutable_format", "VK_KHR_image_format_list"),
    ("VK_KHR_timeline_semaphore", "VK_KHR_get_physical_device_properties2"),
    ("VK_KHR_uniform_buffer_standard_layout", "VK_KHR_get_physical_device_properties2"),
    ("VK_KHR_variable_pointers", "VK_KHR_get_physical_device_properties2"),
    ("VK_KHR_variable_pointers", "VK_KHR_storage_buffer_storage_class"),
    ("VK_KHR_win32_keyed_mutex", "VK_KHR_external_memory_win32"),
    ("VK_EXT_astc_decode_mode", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_buffer_device_address", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_conservative_rasterization", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_descriptor_indexing", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_descriptor_indexing", "VK_KHR_maintenance3"),
    ("VK_EXT_discard_rectangles", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_display_control", "VK_EXT_display_surface_counter"),
    ("VK_EXT_display_control", "VK_KHR_swapchain"),
    ("VK_EXT_external_memory_dma_buf", "VK_KHR_external_memory_fd"),
    ("VK_EXT_external_memory_host", "VK_KHR_external_memory"),
    ("VK_EXT_fragment_density_map", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_fragment_shader_interlock", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_full_screen_exclusive", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_full_screen_exclusive", "VK_KHR_surface"),
    ("VK_EXT_full_screen_exclusive", "VK_KHR_get_surface_capabilities2"),
    ("VK_EXT_full_screen_exclusive", "VK_KHR_swapchain"),
    ("VK_EXT_hdr_metadata", "VK_KHR_swapchain"),
    ("VK_EXT_host_query_reset", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_image_drm_format_modifier", "VK_KHR_bind_memory2"),
    ("VK_EXT_image_drm_format_modifier", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_image_drm_format_modifier", "VK_KHR_image_format_list"),
    ("VK_EXT_image_drm_format_modifier", "VK_KHR_sampler_ycbcr_conversion"),
    ("VK_EXT_index_type_uint8", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_inline_uniform_block", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_inline_uniform_block", "VK_KHR_maintenance1"),
    ("VK_EXT_line_rasterization", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_memory_budget", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_memory_priority", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_pci_bus_info", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_queue_family_foreign", "VK_KHR_external_memory"),
    ("VK_EXT_robustness2", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_sample_locations", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_sampler_filter_minmax", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_scalar_block_layout", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_shader_demote_to_helper_invocation", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_texel_buffer_alignment", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_texture_compression_astc_hdr", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_transform_feedback", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_vertex_attribute_divisor", "VK_KHR_get_physical_device_properties2"),
    ("VK_EXT_ycbcr_image_arrays", "VK_KHR_sampler_ycbcr_conversion"),
    ("VK_AMD_device_coherent_memory", "VK_KHR_get_physical_device_properties2"),
    ("VK_AMD_display_native_hdr", "VK_KHR_get_physical_device_properties2"),
    ("VK_AMD_display_native_hdr", "VK_KHR_get_surface_capabilities2"),
    ("VK_AMD_display_native_hdr", "VK_KHR_swapchain"),
    ("VK_AMD_shader_core_properties", "VK_KHR_get_physical_device_properties2"),
    ("VK_AMD_shader_core_properties2", "VK_AMD_shader_core_properties"),
    ("VK_AMD_texture_gather_bias_lod", "VK_KHR_get_physical_device_properties2"),
    ("VK_ANDROID_external_memory_android_hardware_buffer", "VK_KHR_sampler_ycbcr_conversion"),
    ("VK_ANDROID_external_memory_android_hardware_buffer", "VK_KHR_external_memory"),
    ("VK_ANDROID_external_memory_android_hardware_buffer", "VK_EXT_queue_family_foreign"),
    ("VK_ANDROID_external_memory_android_hardware_buffer", "VK_KHR_dedicated_allocation"),
    ("VK_GOOGLE_display_timing", "VK_KHR_swapchain"),
    ("VK_INTEL_shader_integer_functions2", "VK_KHR_get_physical_device_properties2"),
    ("VK_NV_compute_shader_derivatives", "VK_KHR_get_physical_device_properties2"),
    ("VK_NV_cooperative_matrix", "VK_KHR_get_physical_device_properties2"),
    ("VK_NV_corner_sampled_image", "VK_KHR_get_physical_device_properties2"),
    ("VK_NV_coverage_reduction_mode", "VK_NV_framebuffer_mixed_samples"),
    ("VK_NV_dedicated_allocation_image_aliasing", "VK_KHR_dedicated_allocation"),
    ("VK_NV_external_memory", "VK_NV_external_memory_capabilities"),
    ("VK_NV_external_memory_win32", "VK_NV_external_memory"),
    ("VK_NV_fragment_shader_barycentric", "VK_KHR_get_physical_device_properties2"),
    ("VK_NV_mesh_shader", "VK_KHR_get_physical_device_properties2"),
    ("VK_NV_ray_tracing", "VK_KHR_get_physical_device_properties2"),
    ("VK_NV_ray_tracing", "VK_KHR_get_memory_requirements2"),
    ("VK_NV_scissor_exclusive", "VK_KHR_get_physical_device_properties2"),
    ("VK_NV_shader_image_footprint", "VK_KHR_get_physical_device_properties2"),
    ("VK_NV_shading_rate_image", "VK_KHR_get_physical_device_properties2"),
    ("VK_NV_win32_keyed_mutex", "VK_NV_external_memory_win32"),
    ("VK_NVX_multiview_per_view_attributes", "VK_KHR_multiview"),
];

pub static DEVICE_EXTENSION_DEPENDENCIES_1_1: &[ExtensionDependency] = &[
    ("VK_KHR_acceleration_structure", "VK_EXT_descriptor_indexing"),
    ("VK_KHR_acceleration_structure", "VK_KHR_buffer_device_address"),
    ("VK_KHR_acceleration_structure", "VK_KHR_deferred_host_operations"),
    ("VK_KHR_depth_stencil_resolve", "VK_KHR_create_renderpass2"),
    ("VK_KHR_display_swapchain", "VK_KHR_swapchain"),
    ("VK_KHR_display_swapchain", "VK_KHR_display"),
    ("VK_KHR_imageless_framebuffer", "VK_KHR_image_format_list"),
    ("VK_KHR_incremental_present", "VK_KHR_swapchain"),
    ("VK_KHR_ray_query", "VK_KHR_spirv_1_4"),
    ("VK_KHR_ray_query", "VK_KHR_acceleration_structure"),
    ("VK_KHR_ray_tracing_pipeline", "VK_KHR_spirv_1_4"),
    ("VK_KHR_ray_tracing_pipeline", "VK_KHR_acceleration_structure"),
    ("VK_KHR_separate_depth_stencil_layouts", "VK_KHR_create_renderpass2"),
    ("VK_KHR_shared_presentable_image", "VK_KHR_swapchain"),
    ("VK_KHR_shared_presentable_image", "VK_KHR_get_surface_capabilities2"),
    ("VK_KHR_spirv_1_4", "VK_KHR_shader_float_controls"),
    ("VK_KHR_swapchain", "VK_KHR_surface"),
    ("VK_KHR_swapchain_mutable_format", "VK_KHR_swapchain"),
    ("VK_KHR_swapchain_mutable_format", "VK_KHR_image_format_list"),
    ("VK_KHR_win32_keyed_mutex", "VK_KHR_external_memory_win32"),
    ("VK_EXT_display_control", "VK_EXT_display_surface_counter"),
    ("VK_EXT_display_control", "VK_KHR_swapchain"),
    ("VK_EXT_external_memory_dma_buf", "VK_KHR_external_memory_fd"),
    ("VK_EXT_full_screen_exclusive", "VK_KHR_surface"),
    ("VK_EXT_full_screen_exclusive", "VK_KHR_get_surface_capabilities2"),
    ("VK_EXT_full_screen_exclusive", "VK_KHR_swapchain"),
    ("VK_EXT_hdr_metadata", "VK_KHR_swapchain"),
    ("VK_EXT_image_drm_format_modifier", "VK_KHR_image_format_list"),
    ("VK_AMD_display_native_hdr", "VK_KHR_get_surface_capabilities2"),
    ("VK_AMD_display_native_hdr", "VK_KHR_swapchain"),
    ("VK_AMD_shader_core_properties2", "VK_AMD_shader_core_properties"),
    ("VK_ANDROID_external_memory_android_hardware_buffer", "VK_EXT_queue_family_foreign"),
    ("VK_GOOGLE_display_timing", "VK_KHR_swapchain"),
    ("VK_NV_coverage_reduction_mode", "VK_NV_framebuffer_mixed_samples"),
    ("VK_NV_external_memory", "VK_NV_external_memory_capabilities"),
    ("VK_NV_external_memory_win32", "VK_NV_external_memory"),
    ("VK_NV_win32_keyed_mutex", "VK_NV_external_memory_win32"),
];

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn all_tables() -> [(&'static str, &'static [ExtensionDependency]); 4] {
        [
            ("instance 1.0", INSTANCE_EXTENSION_DEPENDENCIES_1_0),
            ("instance 1.1", INSTANCE_EXTENSION_DEPENDENCIES_1_1),
            ("device 1.0", DEVICE_EXTENSION_DEPENDENCIES_1_0),
            ("device 1.1", DEVICE_EXTENSION_DEPENDENCIES_1_1),
        ]
    }

    #[test]
    fn rows_are_unique() {
        for (name, table) in all_tables() {
            let unique = table.iter().collect::<BTreeSet<_>>();
            assert_eq!(unique.len(), table.len(), "{} has duplicate rows", name);
        }
    }

    #[test]
    fn names_are_registry_names() {
        for (name, table) in all_tables() {
            for &(extension, dependency) in table {
                assert!(extension.starts_with("VK_"), "{}: {}", name, extension);
                assert!(dependency.starts_with("VK_"), "{}: {}", name, dependency);
                assert_ne!(extension, dependency, "{}", name);
            }
        }
    }

    #[test]
    fn core_1_1_relations_are_absent_from_1_1_tables() {
        let promoted = [
            "VK_KHR_get_physical_device_properties2",
            "VK_KHR_maintenance1",
            "VK_KHR_maintenance2",
            "VK_KHR_maintenance3",
            "VK_KHR_multiview",
            "VK_KHR_external_memory",
            "VK_KHR_storage_buffer_storage_class",
        ];
        for table in [INSTANCE_EXTENSION_DEPENDENCIES_1_1, DEVICE_EXTENSION_DEPENDENCIES_1_1] {
            for &(extension, dependency) in table {
                assert!(!promoted.contains(&extension), "{}", extension);
                assert!(!promoted.contains(&dependency), "{}", dependency);
            }
        }
    }
}
