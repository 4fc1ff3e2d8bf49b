//! Every supported extension must come with the extensions it requires.

use super::dependency_info::{
    ExtensionDependency, DEVICE_EXTENSION_DEPENDENCIES_1_0, DEVICE_EXTENSION_DEPENDENCIES_1_1,
    INSTANCE_EXTENSION_DEPENDENCIES_1_0, INSTANCE_EXTENSION_DEPENDENCIES_1_1,
};
use crate::{
    harness::{FunctionCase, TestCaseGroup},
    ApiVersion, Capabilities, Error, NotSupported, ResultCollector, TestStatus,
};

const VULKAN_1_0_PREFIX: &str = "1_0_";
const VULKAN_1_1_PREFIX: &str = "1_1_";

/// One row of a dependency table, bound to the API version of its table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtensionDependencyCase {
    pub version: ApiVersion,
    pub extension: &'static str,
    pub dependency: &'static str,
}

fn dependency_available<C: Capabilities + ?Sized>(context: &C, name: &str) -> bool {
    context.device_extensions().contains(name) || context.instance_extensions().contains(name)
}

/// Decides whether a row applies to the context.
///
/// Rows of the 1.0 tables are skipped on 1.1 contexts, the 1.1 tables cover them.
/// The row's extension must be advertised by the device.
pub fn check_support<C: Capabilities + ?Sized>(
    context: &C,
    case: &ExtensionDependencyCase,
) -> Result<(), NotSupported> {
    if !context.supports_version(case.version) {
        return Err(NotSupported::new("Api version is not supported"));
    }
    if context.supports_version(ApiVersion::V1_1) && case.version < ApiVersion::V1_1 {
        return Err(NotSupported::new(
            "Extension has been promoted to core or tested in 1.1 dependencies",
        ));
    }
    if !context.device_extensions().contains(case.extension) {
        return Err(NotSupported::new("Extension is not supported"));
    }
    Ok(())
}

/// Fails if the dependency is in neither the instance nor the device extension list.
pub fn check_extension_dependency<C: Capabilities + ?Sized>(
    context: &C,
    case: &ExtensionDependencyCase,
) -> Result<TestStatus, Error> {
    let mut results = ResultCollector::new();
    results.check(
        dependency_available(context, case.dependency),
        format!(
            "Extension {} is missing dependency: {}",
            case.extension, case.dependency
        ),
    );
    Ok(results.into_status())
}

pub fn case_name(prefix: &str, &(extension, dependency): &ExtensionDependency) -> String {
    format!(
        "{}{}_requires_{}",
        prefix,
        extension.to_lowercase(),
        dependency.to_lowercase()
    )
}

fn add_table_cases<C: Capabilities + 'static>(
    group: &mut TestCaseGroup<C>,
    prefix: &str,
    version: ApiVersion,
    table: &'static [ExtensionDependency],
) {
    for row in table {
        let case = ExtensionDependencyCase {
            version,
            extension: row.0,
            dependency: row.1,
        };
        group.add_case(
            case_name(prefix, row),
            FunctionCase::new(
                format!("{} requires {}", row.0, row.1),
                check_extension_dependency::<C>,
                case,
            )
            .with_support(check_support::<C>),
        );
    }
}

fn create_instance_tests<C: Capabilities + 'static>() -> TestCaseGroup<C> {
    let mut group = TestCaseGroup::new("instance", "Instance extension dependencies tests");
    add_table_cases(
        &mut group,
        VULKAN_1_0_PREFIX,
        ApiVersion::V1_0,
        INSTANCE_EXTENSION_DEPENDENCIES_1_0,
    );
    add_table_cases(
        &mut group,
        VULKAN_1_1_PREFIX,
        ApiVersion::V1_1,
        INSTANCE_EXTENSION_DEPENDENCIES_1_1,
    );
    group
}

fn create_device_tests<C: Capabilities + 'static>() -> TestCaseGroup<C> {
    let mut group = TestCaseGroup::new("device", "Device extension dependencies tests");
    add_table_cases(
        &mut group,
        VULKAN_1_0_PREFIX,
        ApiVersion::V1_0,
        DEVICE_EXTENSION_DEPENDENCIES_1_0,
    );
    add_table_cases(
        &mut group,
        VULKAN_1_1_PREFIX,
        ApiVersion::V1_1,
        DEVICE_EXTENSION_DEPENDENCIES_1_1,
    );
    group
}

pub fn create_extension_dependencies_tests<C: Capabilities + 'static>() -> TestCaseGroup<C> {
    let mut group = TestCaseGroup::new("extension_dependencies", "Extension dependencies tests");
    group.add_child(create_instance_tests());
    group.add_child(create_device_tests());
    group
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeviceFeatures, ExtensionSet};

    struct Fake {
        version: ApiVersion,
        instance: ExtensionSet,
        device: ExtensionSet,
        features: DeviceFeatures,
    }

    impl Fake {
        fn new(version: ApiVersion, instance: &[&str], device: &[&str]) -> Self {
            Self {
                version,
                instance: instance.iter().copied().collect(),
                device: device.iter().copied().collect(),
                features: DeviceFeatures::default(),
            }
        }
    }

    impl Capabilities for Fake {
        fn api_version(&self) -> ApiVersion {
            self.version
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

    const SWAPCHAIN_1_0: ExtensionDependencyCase = ExtensionDependencyCase {
        version: ApiVersion::V1_0,
        extension: "VK_KHR_swapchain",
        dependency: "VK_KHR_surface",
    };

    fn verdict(context: &Fake, case: &ExtensionDependencyCase) -> TestStatus {
        match check_support(context, case) {
            Ok(()) => check_extension_dependency(context, case).unwrap(),
            Err(reason) => reason.into(),
        }
    }

    #[test]
    fn unsupported_version() {
        let case = ExtensionDependencyCase {
            version: ApiVersion::V1_1,
            ..SWAPCHAIN_1_0
        };
        let status = verdict(&Fake::new(ApiVersion::V1_0, &[], &["VK_KHR_swapchain"]), &case);
        assert!(status.is_not_supported());
        assert_eq!(status.description(), "Api version is not supported");
    }

    #[test]
    fn superseded_by_1_1_tables() {
        let status = verdict(
            &Fake::new(ApiVersion::V1_2, &["VK_KHR_surface"], &["VK_KHR_swapchain"]),
            &SWAPCHAIN_1_0,
        );
        assert!(status.is_not_supported());
        assert_eq!(
            status.description(),
            "Extension has been promoted to core or tested in 1.1 dependencies"
        );
    }

    #[test]
    fn missing_extension() {
        let status = verdict(&Fake::new(ApiVersion::V1_0, &["VK_KHR_surface"], &[]), &SWAPCHAIN_1_0);
        assert!(status.is_not_supported());
        assert_eq!(status.description(), "Extension is not supported");
    }

    #[test]
    fn instance_only_extension_is_not_supported() {
        let status = verdict(
            &Fake::new(ApiVersion::V1_0, &["VK_KHR_swapchain"], &[]),
            &SWAPCHAIN_1_0,
        );
        assert!(status.is_not_supported());
        assert_eq!(status.description(), "Extension is not supported");
    }

    #[test]
    fn dependency_found_in_either_list() {
        let status = verdict(
            &Fake::new(ApiVersion::V1_0, &["VK_KHR_surface"], &["VK_KHR_swapchain"]),
            &SWAPCHAIN_1_0,
        );
        assert!(status.is_pass());

        let status = verdict(
            &Fake::new(
                ApiVersion::V1_0,
                &[],
                &["VK_KHR_swapchain", "VK_KHR_surface"],
            ),
            &SWAPCHAIN_1_0,
        );
        assert!(status.is_pass());
    }

    #[test]
    fn missing_dependency_fails() {
        let status = verdict(&Fake::new(ApiVersion::V1_0, &[], &["VK_KHR_swapchain"]), &SWAPCHAIN_1_0);
        assert!(status.is_fail());
        assert_eq!(
            status.description(),
            "Extension VK_KHR_swapchain is missing dependency: VK_KHR_surface"
        );
    }

    #[test]
    fn names_are_lowercase_and_prefixed() {
        assert_eq!(
            case_name(VULKAN_1_1_PREFIX, &("VK_KHR_ray_query", "VK_KHR_spirv_1_4")),
            "1_1_vk_khr_ray_query_requires_vk_khr_spirv_1_4"
        );
    }

    #[test]
    fn tree_layout() {
        let group = create_extension_dependencies_tests::<Fake>();
        let cases = group.cases();
        let expected = INSTANCE_EXTENSION_DEPENDENCIES_1_0.len()
            + INSTANCE_EXTENSION_DEPENDENCIES_1_1.len()
            + DEVICE_EXTENSION_DEPENDENCIES_1_0.len()
            + DEVICE_EXTENSION_DEPENDENCIES_1_1.len();
        assert_eq!(cases.len(), expected);
        assert!(group
            .find("device.1_0_vk_khr_swapchain_requires_vk_khr_surface")
            .is_some());
        assert!(group
            .find("instance.1_1_vk_khr_display_requires_vk_khr_surface")
            .is_some());
    }
}
