//! API-level cases.

pub mod dependency_info;
pub mod extension_dependencies;

use crate::{harness::TestCaseGroup, Capabilities};

pub fn create_tests<C: Capabilities + 'static>() -> TestCaseGroup<C> {
    let mut group = TestCaseGroup::new("api", "API Tests");
    group.add_child(extension_dependencies::create_extension_dependencies_tests());
    group
}
