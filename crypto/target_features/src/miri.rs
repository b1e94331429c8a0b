//! Under miri there is no CPUID or auxv to read, so every feature is
//! reported missing, even ones enabled at compile time. Managers then pick
//! `no-aesni`, which needs none.

#[macro_export]
#[doc(hidden)]
macro_rules! __unless {
    ($($tf:tt),+ => $body:expr) => {
        false
    };
}

#[macro_export]
#[doc(hidden)]
macro_rules! __detect {
    ($($tf:tt),+) => {
        false
    };
}
