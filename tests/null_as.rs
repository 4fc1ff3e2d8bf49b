use ash::vk;
use vkcts::{
    ray_tracing::null_as::{check_null_as_support, count_failures, verdict, CLEAR_VALUE, MISS_VALUE},
    ApiVersion, DeviceFeatures,
};

use crate::common::FakeDevice;

fn ray_tracing_device(pipeline: bool, null_descriptor: bool) -> FakeDevice {
    let mut device = FakeDevice::new(ApiVersion::V1_2)
        .with_device_extensions(&["VK_KHR_ray_tracing_pipeline", "VK_EXT_robustness2"]);
    device.features = DeviceFeatures::default()
        .with(vk::PhysicalDeviceRayTracingPipelineFeaturesKHR {
            ray_tracing_pipeline: pipeline.into(),
            ..Default::default()
        })
        .with(vk::PhysicalDeviceRobustness2FeaturesEXT {
            null_descriptor: null_descriptor.into(),
            ..Default::default()
        });
    device
}

#[test]
fn gating() {
    assert!(check_null_as_support(&ray_tracing_device(true, true)).is_ok());
    assert!(check_null_as_support(&ray_tracing_device(false, true)).is_err());
    assert!(check_null_as_support(&ray_tracing_device(true, false)).is_err());
    assert!(check_null_as_support(&FakeDevice::new(ApiVersion::V1_3)).is_err());
}

#[test]
fn missing_feature_structs_are_unsupported() {
    let device = FakeDevice::new(ApiVersion::V1_2)
        .with_device_extensions(&["VK_KHR_ray_tracing_pipeline", "VK_EXT_robustness2"]);
    let reason = check_null_as_support(&device).unwrap_err();
    assert_eq!(
        reason.message(),
        "Requires VkPhysicalDeviceRayTracingPipelineFeaturesKHR.rayTracingPipeline"
    );
}

#[test]
fn all_miss_passes() {
    let values = vec![MISS_VALUE; 8 * 8];
    let status = verdict(count_failures(&values, MISS_VALUE));
    assert!(status.is_pass());
    assert_eq!(status.description(), "Pass");
}

#[test]
fn untouched_pixels_fail() {
    let values = vec![CLEAR_VALUE; 8 * 8];
    let status = verdict(count_failures(&values, MISS_VALUE));
    assert!(status.is_fail());
    assert_eq!(status.description(), "failures=64");
}
