use std::{ffi::CStr, os::raw::c_char};

pub mod db {
    pub mod amd {
        pub const VENDOR: u32 = 0x1002;
    }
    pub mod arm {
        pub const VENDOR: u32 = 0x13B5;
    }
    pub mod imgtec {
        pub const VENDOR: u32 = 0x1010;
    }
    pub mod intel {
        pub const VENDOR: u32 = 0x8086;
    }
    pub mod mesa {
        // VkVendorId of Mesa, which has no PCI vendor id.
        pub const VENDOR: u32 = 0x10005;
    }
    pub mod nvidia {
        pub const VENDOR: u32 = 0x10DE;
    }
    pub mod qualcomm {
        pub const VENDOR: u32 = 0x5143;
    }

    pub fn vendor_name(vendor_id: u32) -> &'static str {
        match vendor_id {
            amd::VENDOR => "AMD",
            arm::VENDOR => "ARM",
            imgtec::VENDOR => "ImgTec",
            intel::VENDOR => "Intel",
            mesa::VENDOR => "Mesa",
            nvidia::VENDOR => "NVIDIA",
            qualcomm::VENDOR => "Qualcomm",
            _ => "unknown",
        }
    }
}

/// Construct a `CStr` from a fixed-size driver string, up to the first zero byte.
///
/// Returns `None` if there is no zero byte in `bytes`.
pub(crate) fn cstr_from_bytes_until_nul(bytes: &[c_char]) -> Option<&CStr> {
    if bytes.contains(&0) {
        // Safety for `CStr::from_ptr`:
        // - We've ensured that the slice does contain a null terminator.
        // - The range is valid to read, because the slice covers it.
        // - The memory won't be changed, because the slice borrows it.
        unsafe { Some(CStr::from_ptr(bytes.as_ptr())) }
    } else {
        None
    }
}

/// Lossy owned copy of a fixed-size driver string. Unterminated input yields an empty string.
pub(crate) fn string_from_driver(bytes: &[c_char]) -> String {
    cstr_from_bytes_until_nul(bytes)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Round `value` up to a multiple of `alignment`, which must be a power of two.
pub fn align_to(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_to_rounds_up() {
        assert_eq!(align_to(0, 64), 0);
        assert_eq!(align_to(1, 64), 64);
        assert_eq!(align_to(32, 32), 32);
        assert_eq!(align_to(33, 32), 64);
    }

    #[test]
    fn driver_strings() {
        let name: Vec<c_char> = b"VK_KHR_ray_query\0garbage"
            .iter()
            .map(|&b| b as c_char)
            .collect();
        assert_eq!(string_from_driver(&name), "VK_KHR_ray_query");

        let unterminated: Vec<c_char> = b"abc".iter().map(|&b| b as c_char).collect();
        assert!(cstr_from_bytes_until_nul(&unterminated).is_none());
        assert_eq!(string_from_driver(&unterminated), "");
    }
}
