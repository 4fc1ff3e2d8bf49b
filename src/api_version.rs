use std::fmt;

use ash::vk;

/// A Vulkan API version without the variant bits.
///
/// Field order makes the derived ordering agree with the packed encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ApiVersion {
    pub const V1_0: Self = Self::new(1, 0, 0);
    pub const V1_1: Self = Self::new(1, 1, 0);
    pub const V1_2: Self = Self::new(1, 2, 0);
    pub const V1_3: Self = Self::new(1, 3, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn pack(self) -> u32 {
        vk::make_api_version(0, self.major, self.minor, self.patch)
    }

    pub fn unpack(raw: u32) -> Self {
        Self {
            major: vk::api_version_major(raw),
            minor: vk::api_version_minor(raw),
            patch: vk::api_version_patch(raw),
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::ApiVersion;

    #[test]
    fn ordering_matches_packed_encoding() {
        let versions = [
            ApiVersion::V1_0,
            ApiVersion::new(1, 0, 68),
            ApiVersion::V1_1,
            ApiVersion::new(1, 1, 130),
            ApiVersion::V1_2,
            ApiVersion::V1_3,
        ];
        for pair in versions.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].pack() < pair[1].pack());
        }
    }

    #[test]
    fn unpack_drops_nothing() {
        let version = ApiVersion::new(1, 2, 198);
        assert_eq!(ApiVersion::unpack(version.pack()), version);
        assert_eq!(ApiVersion::unpack(ash::vk::API_VERSION_1_1), ApiVersion::V1_1);
        assert_eq!(version.to_string(), "1.2.198");
    }
}
