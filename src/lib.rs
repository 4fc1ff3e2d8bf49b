/*! Vulkan conformance tests.
 *
 *  The crate builds a tree of test cases and runs them against a single
 *  Vulkan device:
 *  - `api.extension_dependencies`: every supported extension must come with
 *    the extensions it depends on, per API version.
 *  - `ray_tracing.null_as`: tracing against a null acceleration structure
 *    must always invoke the miss shader.
 *
 *  Cases only see the device through [`Capabilities`] when deciding whether
 *  they apply, so the selection logic can be exercised without a GPU.
 */

#![allow(
    // We don't use syntax sugar where it's not necessary.
    clippy::match_like_matches_macro,
    // Redundant matching is more explicit.
    clippy::redundant_pattern_matching,
    // Explicit lifetimes are often easier to reason about.
    clippy::needless_lifetimes,
    // No need for defaults in the internal types.
    clippy::new_without_default,
)]
#![warn(
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_qualifications,
    // We don't match on a reference, unless required.
    clippy::pattern_type_mismatch,
)]

pub mod api;
mod api_version;
pub mod auxil;
mod config;
mod features;
pub mod harness;
pub mod package;
pub mod ray_tracing;
pub mod shader;
mod status;
pub mod vulkan;

use std::{error::Error as StdError, sync::Arc};

use thiserror::Error;

pub use api_version::ApiVersion;
pub use config::{
    adapter_name_from_env, device_index_from_env, glslc_from_env, Config, InstanceFlags,
};
pub use features::{DeviceFeatures, ExtensionSet, FeatureDescriptor, FeatureStruct, FeatureTag};
pub use status::{NotSupported, ResultCollector, StatusCode, TestStatus};

#[derive(Clone, Debug, PartialEq, Error)]
pub enum DeviceError {
    #[error("out of memory")]
    OutOfMemory,
    #[error("device is lost")]
    Lost,
    #[error("requested feature or extension is not present")]
    Unsupported,
}

#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct InstanceError {
    message: String,
    #[source]
    source: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl InstanceError {
    pub(crate) fn new(message: String) -> Self {
        Self {
            message,
            source: None,
        }
    }

    pub(crate) fn with_source(
        message: String,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message,
            source: Some(Arc::new(source)),
        }
    }
}

#[derive(Clone, Debug, Error)]
pub enum ShaderError {
    #[error("failed to launch shader compiler `{compiler}`")]
    Launch {
        compiler: String,
        #[source]
        source: Arc<std::io::Error>,
    },
    #[error("compilation of `{name}` failed: {message}")]
    Compilation { name: String, message: String },
    #[error("program `{0}` produced malformed SPIR-V")]
    InvalidBinary(String),
    #[error("program `{0}` is not in the binary collection")]
    Missing(String),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum PipelineError {
    #[error("linkage failed for stage {0:?}: {1}")]
    Linkage(shader::ShaderStage, String),
    #[error("shader group {0} has no shaders")]
    EmptyGroup(u32),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Errors that abort a run. Defects found by a case are reported through
/// [`TestStatus`] instead.
#[derive(Clone, Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Instance(#[from] InstanceError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// What a case can learn about the device before deciding to run.
pub trait Capabilities {
    /// The API version in use, i.e. the lowest of the instance and device versions.
    fn api_version(&self) -> ApiVersion;
    fn instance_extensions(&self) -> &ExtensionSet;
    fn device_extensions(&self) -> &ExtensionSet;
    fn device_features(&self) -> &DeviceFeatures;

    fn supports_version(&self, version: ApiVersion) -> bool {
        self.api_version() >= version
    }

    fn require_device_functionality(&self, extension: &str) -> Result<(), NotSupported> {
        if self.device_extensions().contains(extension) {
            Ok(())
        } else {
            Err(NotSupported::new(format!("{extension} is not supported")))
        }
    }
}
