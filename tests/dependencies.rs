use std::collections::HashSet;

use vkcts::{
    api::{
        dependency_info::{
            DEVICE_EXTENSION_DEPENDENCIES_1_0, DEVICE_EXTENSION_DEPENDENCIES_1_1,
            INSTANCE_EXTENSION_DEPENDENCIES_1_0, INSTANCE_EXTENSION_DEPENDENCIES_1_1,
        },
        extension_dependencies::{
            case_name, check_extension_dependency, check_support, ExtensionDependencyCase,
        },
    },
    ApiVersion, TestStatus,
};

use crate::common::FakeDevice;

fn run(context: &FakeDevice, case: &ExtensionDependencyCase) -> TestStatus {
    match check_support(context, case) {
        Ok(()) => check_extension_dependency(context, case).unwrap(),
        Err(reason) => reason.into(),
    }
}

fn ray_tracing_case(version: ApiVersion) -> ExtensionDependencyCase {
    ExtensionDependencyCase {
        version,
        extension: "VK_KHR_ray_tracing_pipeline",
        dependency: "VK_KHR_spirv_1_4",
    }
}

#[test]
fn verdict_table() {
    let case = ray_tracing_case(ApiVersion::V1_1);

    let status = run(&FakeDevice::new(ApiVersion::V1_0), &case);
    assert_eq!(status.description(), "Api version is not supported");

    let status = run(&FakeDevice::new(ApiVersion::V1_2), &case);
    assert_eq!(status.description(), "Extension is not supported");

    let device = FakeDevice::new(ApiVersion::V1_2).with_device_extensions(&[
        "VK_KHR_ray_tracing_pipeline",
        "VK_KHR_spirv_1_4",
    ]);
    assert!(run(&device, &case).is_pass());

    let device =
        FakeDevice::new(ApiVersion::V1_2).with_device_extensions(&["VK_KHR_ray_tracing_pipeline"]);
    let status = run(&device, &case);
    assert!(status.is_fail());
    assert_eq!(
        status.description(),
        "Extension VK_KHR_ray_tracing_pipeline is missing dependency: VK_KHR_spirv_1_4"
    );
}

#[test]
fn older_table_defers_to_1_1() {
    let device = FakeDevice::new(ApiVersion::V1_1)
        .with_device_extensions(&["VK_KHR_ray_tracing_pipeline", "VK_KHR_spirv_1_4"]);
    let status = run(&device, &ray_tracing_case(ApiVersion::V1_0));
    assert!(status.is_not_supported());
    assert_eq!(
        status.description(),
        "Extension has been promoted to core or tested in 1.1 dependencies"
    );
}

#[test]
fn extension_is_looked_up_on_the_device() {
    let case = ExtensionDependencyCase {
        version: ApiVersion::V1_0,
        extension: "VK_KHR_display",
        dependency: "VK_KHR_surface",
    };
    let device = FakeDevice::new(ApiVersion::V1_0).with_instance_extensions(&["VK_KHR_display"]);
    let status = run(&device, &case);
    assert!(status.is_not_supported());
    assert_eq!(status.description(), "Extension is not supported");

    let device = FakeDevice::new(ApiVersion::V1_0)
        .with_instance_extensions(&["VK_KHR_display", "VK_KHR_surface"]);
    assert!(run(&device, &case).is_not_supported());
}

#[test]
fn dependency_may_be_an_instance_extension() {
    let case = ExtensionDependencyCase {
        version: ApiVersion::V1_0,
        extension: "VK_KHR_swapchain",
        dependency: "VK_KHR_surface",
    };
    let device = FakeDevice::new(ApiVersion::V1_0)
        .with_instance_extensions(&["VK_KHR_surface"])
        .with_device_extensions(&["VK_KHR_swapchain"]);
    assert!(run(&device, &case).is_pass());

    let device = FakeDevice::new(ApiVersion::V1_0).with_device_extensions(&["VK_KHR_swapchain"]);
    assert!(run(&device, &case).is_fail());
}

#[test]
fn verdicts_are_deterministic() {
    let device =
        FakeDevice::new(ApiVersion::V1_2).with_device_extensions(&["VK_KHR_ray_tracing_pipeline"]);
    let case = ray_tracing_case(ApiVersion::V1_1);
    assert_eq!(run(&device, &case), run(&device, &case));
}

#[test]
fn case_names_are_unique_per_table() {
    let tables = [
        ("1_0_", INSTANCE_EXTENSION_DEPENDENCIES_1_0),
        ("1_1_", INSTANCE_EXTENSION_DEPENDENCIES_1_1),
    ];
    let mut names = HashSet::new();
    for &(prefix, table) in tables.iter() {
        for row in table.iter() {
            assert!(names.insert(case_name(prefix, row)), "duplicate {:?}", row);
        }
    }

    let tables = [
        ("1_0_", DEVICE_EXTENSION_DEPENDENCIES_1_0),
        ("1_1_", DEVICE_EXTENSION_DEPENDENCIES_1_1),
    ];
    let mut names = HashSet::new();
    for &(prefix, table) in tables.iter() {
        for row in table.iter() {
            let name = case_name(prefix, row);
            assert_eq!(name, name.to_lowercase());
            assert!(names.insert(name), "duplicate {:?}", row);
        }
    }
}
