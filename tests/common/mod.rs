use vkcts::{ApiVersion, Capabilities, DeviceFeatures, ExtensionSet};

/// Capabilities of a device that does not exist.
pub struct FakeDevice {
    pub version: ApiVersion,
    pub instance_extensions: ExtensionSet,
    pub device_extensions: ExtensionSet,
    pub features: DeviceFeatures,
}

impl FakeDevice {
    pub fn new(version: ApiVersion) -> Self {
        Self {
            version,
            instance_extensions: ExtensionSet::new(),
            device_extensions: ExtensionSet::new(),
            features: DeviceFeatures::default(),
        }
    }

    pub fn with_instance_extensions(mut self, names: &[&str]) -> Self {
        for name in names {
            self.instance_extensions.insert(*name);
        }
        self
    }

    pub fn with_device_extensions(mut self, names: &[&str]) -> Self {
        for name in names {
            self.device_extensions.insert(*name);
        }
        self
    }
}

impl Capabilities for FakeDevice {
    fn api_version(&self) -> ApiVersion {
        self.version
    }

    fn instance_extensions(&self) -> &ExtensionSet {
        &self.instance_extensions
    }

    fn device_extensions(&self) -> &ExtensionSet {
        &self.device_extensions
    }

    fn device_features(&self) -> &DeviceFeatures {
        &self.features
    }
}
