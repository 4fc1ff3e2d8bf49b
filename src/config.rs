use std::path::PathBuf;

bitflags::bitflags! {
    /// Instance debugging switches.
    #[repr(transparent)]
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct InstanceFlags: u32 {
        /// Register a debug messenger and forward driver messages to `log`.
        const DEBUG = 1 << 0;
        /// Enable the Khronos validation layer if the loader has it.
        const VALIDATION = 1 << 1;
    }
}

impl Default for InstanceFlags {
    fn default() -> Self {
        Self::from_build_config()
    }
}

impl InstanceFlags {
    /// Everything on. Used by the test binary.
    pub fn debugging() -> Self {
        Self::DEBUG | Self::VALIDATION
    }

    /// Debugging in debug builds, nothing in release builds.
    pub fn from_build_config() -> Self {
        if cfg!(debug_assertions) {
            Self::debugging()
        } else {
            Self::empty()
        }
    }

    /// Overrides the flags with `VKCTS_DEBUG` and `VKCTS_VALIDATION` when they are set.
    ///
    /// A value of `0` clears the flag, any other value sets it.
    #[must_use]
    pub fn with_env(mut self) -> Self {
        fn env(key: &str) -> Option<bool> {
            std::env::var(key).ok().map(|s| match s.as_str() {
                "0" => false,
                _ => true,
            })
        }

        if let Some(bit) = env("VKCTS_DEBUG") {
            self.set(Self::DEBUG, bit);
        }
        if let Some(bit) = env("VKCTS_VALIDATION") {
            self.set(Self::VALIDATION, bit);
        }
        self
    }
}

/// Get the physical device index from the environment variable VKCTS_DEVICE_INDEX.
pub fn device_index_from_env() -> Option<usize> {
    std::env::var("VKCTS_DEVICE_INDEX")
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

/// Get the lowercased device name filter from the environment variable VKCTS_ADAPTER_NAME.
pub fn adapter_name_from_env() -> Option<String> {
    std::env::var("VKCTS_ADAPTER_NAME")
        .as_deref()
        .map(str::to_lowercase)
        .ok()
}

/// Get the shader compiler path from the environment variable VKCTS_GLSLC.
pub fn glslc_from_env() -> Option<PathBuf> {
    std::env::var_os("VKCTS_GLSLC").map(PathBuf::from)
}

/// Run-wide settings.
#[derive(Clone, Debug)]
pub struct Config {
    pub flags: InstanceFlags,
    /// Physical device to test, in enumeration order.
    pub device_index: Option<usize>,
    /// Case-insensitive substring of the device name. Ignored if `device_index` is set.
    pub adapter_name: Option<String>,
    pub glslc: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flags: InstanceFlags::default(),
            device_index: None,
            adapter_name: None,
            glslc: PathBuf::from("glslc"),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            flags: default.flags.with_env(),
            device_index: device_index_from_env(),
            adapter_name: adapter_name_from_env(),
            glslc: glslc_from_env().unwrap_or(default.glslc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::InstanceFlags;

    #[test]
    fn debugging_has_every_flag() {
        assert_eq!(InstanceFlags::debugging(), InstanceFlags::all());
    }
}
