//! ARM64 detection. Linux and Android read `AT_HWCAP`; Apple targets
//! always have `aes`, `pmull` and `sha2`.

#[macro_export]
#[doc(hidden)]
macro_rules! __unless {
    ($($tf:tt),+ => $body:expr) => {{
        #[cfg(not(all($(target_feature = $tf,)+)))]
        $body
        #[cfg(all($(target_feature = $tf,)+))]
        true
    }};
}

#[cfg(any(target_os = "android", target_os = "linux"))]
#[macro_export]
#[doc(hidden)]
macro_rules! __detect {
    ($($tf:tt),+) => {{
        let hwcaps = $crate::aarch64::hwcaps();
        $($crate::__check!(hwcaps, $tf) & )+ true
    }};
}

#[cfg(any(target_os = "android", target_os = "linux"))]
#[doc(hidden)]
#[allow(dead_code)]
#[must_use]
pub fn hwcaps() -> u64 {
    unsafe { libc::getauxval(libc::AT_HWCAP) }
}

// every Apple ARM64 core has the crypto extensions the lane kernels ask for
#[cfg(target_vendor = "apple")]
#[macro_export]
#[doc(hidden)]
macro_rules! __detect {
    ($($tf:tt),+) => {
        true
    };
}

#[cfg(any(target_os = "android", target_os = "linux"))]
macro_rules! __generate_check {
    ($(($name:tt, $cap:ident)),+$(,)?) => {
        #[macro_export]
        #[doc(hidden)]
        macro_rules! __check {
            $(
                ($caps:expr, $name) => {
                    (($caps & $crate::aarch64::caps::$cap) != 0)
                };
            )+
        }
    };
}

#[cfg(any(target_os = "android", target_os = "linux"))]
__generate_check! {
    ("aes", AES),
    ("pmull", PMULL),
    ("sha2", SHA2),
}

#[cfg(any(target_os = "android", target_os = "linux"))]
#[doc(hidden)]
#[allow(dead_code)]
pub mod caps {
    pub const AES: u64 = libc::HWCAP_AES;
    pub const PMULL: u64 = libc::HWCAP_PMULL;
    pub const SHA2: u64 = libc::HWCAP_SHA2;
}

#[cfg(not(any(target_os = "android", target_os = "linux", target_vendor = "apple")))]
#[macro_export]
#[doc(hidden)]
macro_rules! __detect {
    ($($tf:tt),+) => {
        false
    };
}
