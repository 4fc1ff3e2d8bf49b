use crate::{
    ApiVersion, Capabilities, Config, DeviceFeatures, ExtensionSet, InstanceError,
};

/// Everything a case runs against: one instance, one adapter and its default device.
pub struct Context {
    device: super::Device,
    adapter: super::Adapter,
    instance: super::Instance,
    features: DeviceFeatures,
    api_version: ApiVersion,
}

/// Picks an adapter by index, or else by case-insensitive name substring, or else the first one.
fn select_adapter(
    names: &[&str],
    device_index: Option<usize>,
    adapter_name: Option<&str>,
) -> Option<usize> {
    match (device_index, adapter_name) {
        (Some(index), _) => (index < names.len()).then_some(index),
        (None, Some(filter)) => {
            let filter = filter.to_lowercase();
            names
                .iter()
                .position(|name| name.to_lowercase().contains(&filter))
        }
        (None, None) => (!names.is_empty()).then_some(0),
    }
}

impl Context {
    pub fn new(config: &Config) -> Result<Self, crate::Error> {
        profiling::scope!("Context::new");
        let instance = super::Instance::init(config.flags)?;

        let mut adapters = instance.enumerate_adapters();
        let names = adapters
            .iter()
            .map(|adapter| adapter.info().name.as_str())
            .collect::<Vec<_>>();
        let index = select_adapter(
            &names,
            config.device_index,
            config.adapter_name.as_deref(),
        )
        .ok_or_else(|| {
            InstanceError::new(format!(
                "no matching adapter among {} (index {:?}, name {:?})",
                names.len(),
                config.device_index,
                config.adapter_name
            ))
        })?;
        let adapter = adapters.swap_remove(index);

        let device = adapter.open()?;
        let features = adapter.enabled_features();
        let api_version = device.api_version();
        log::info!(
            "Testing {} with API {}, {} device extensions",
            adapter.info().name,
            api_version,
            adapter
                .physical_device_capabilities()
                .supported_extensions()
                .len()
        );

        Ok(Self {
            device,
            adapter,
            instance,
            features,
            api_version,
        })
    }

    pub fn instance(&self) -> &super::Instance {
        &self.instance
    }

    pub fn adapter(&self) -> &super::Adapter {
        &self.adapter
    }

    pub fn device(&self) -> &super::Device {
        &self.device
    }
}

impl Capabilities for Context {
    fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    fn instance_extensions(&self) -> &ExtensionSet {
        self.instance.supported_extensions()
    }

    fn device_extensions(&self) -> &ExtensionSet {
        self.adapter
            .physical_device_capabilities()
            .supported_extensions()
    }

    fn device_features(&self) -> &DeviceFeatures {
        &self.features
    }
}

#[cfg(test)]
mod tests {
    use super::select_adapter;

    #[test]
    fn adapter_selection() {
        let names = ["llvmpipe (LLVM 15.0.7, 256 bits)", "NVIDIA GeForce RTX 3080"];
        assert_eq!(select_adapter(&names, None, None), Some(0));
        assert_eq!(select_adapter(&names, Some(1), Some("llvmpipe")), Some(1));
        assert_eq!(select_adapter(&names, Some(2), None), None);
        assert_eq!(select_adapter(&names, None, Some("geforce")), Some(1));
        assert_eq!(select_adapter(&names, None, Some("radeon")), None);
        assert_eq!(select_adapter(&[], None, None), None);
    }

    #[test]
    fn adapter_name_ignores_case() {
        let names = ["llvmpipe (LLVM 15.0.7, 256 bits)", "NVIDIA GeForce RTX 3080"];
        assert_eq!(select_adapter(&names, None, Some("GeForce")), Some(1));
        assert_eq!(select_adapter(&names, None, Some("LLVMPIPE")), Some(0));
    }
}
