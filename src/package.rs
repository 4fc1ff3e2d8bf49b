//! The root of the case tree.

use crate::{api, harness::TestCaseGroup, ray_tracing, vulkan::Context};

pub const ROOT_NAME: &str = "vk";

/// Builds every group. Case paths are relative to the root, e.g.
/// `api.extension_dependencies.device.<case>` or `ray_tracing.null_as.test`.
pub fn create_test_package() -> TestCaseGroup<Context> {
    let mut root = TestCaseGroup::new(ROOT_NAME, "Vulkan conformance tests");
    root.add_child(api::create_tests());
    root.add_child(ray_tracing::create_tests());
    root
}
