//! Ray tracing pipeline cases.

pub mod null_as;
pub mod util;

use crate::{harness::TestCaseGroup, vulkan::Context};

pub fn create_tests() -> TestCaseGroup<Context> {
    let mut group = TestCaseGroup::new("ray_tracing", "Ray tracing tests");
    group.add_child(null_as::create_null_as_tests());
    group
}
