#![no_std]
#![deny(
    dead_code,
    deprecated,
    future_incompatible,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unused,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! Runtime CPU feature detection, used to pick a lane width for the
//! multi-buffer engines once at startup.
//!
//! # Supported target architectures
//!
//! ## `aarch64`
//!
//! Linux, Android, iOS and macOS only. ARM64 has no unprivileged feature
//! query instruction, so Linux and Android go through `getauxval(3)`.
//!
//! Target features: `aes`, `pmull`, `sha2`.
//!
//! ## `x86`/`x86_64`
//!
//! OS-independent and `#![no_std]` friendly. `CPUID` leaves 1 and 7 are
//! read, and `XGETBV` confirms the OS saves the register file the feature
//! needs (`xmm`, `ymm` or `zmm`).
//!
//! Target features: `sse2`, `sse4.2`, `aes`, `pclmulqdq`,
//! `sha`, `gfni`, `avx`, `avx2`, `vaes`, `vpclmulqdq`, `bmi2`, `avx512f`,
//! `avx512dq`, `avx512ifma`, `avx512cd`, `avx512bw`, `avx512vl`.
//!
//! # Example
//!
//! ```rust
//! # #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
//! # {
//! // this creates a `cpuid_avx512` module
//! target_features::detect!(cpuid_avx512, "avx512f", "avx512vl");
//!
//! // `token` is a ZST proving the cached value has been filled in
//! let token: cpuid_avx512::Features = cpuid_avx512::init();
//!
//! if token.get() {
//!     println!("16-lane kernels available");
//! }
//! assert_eq!(cpuid_avx512::get(), token.get());
//! # }
//! ```
//!
//! When every listed feature is enabled at compile time (e.g. through
//! `RUSTFLAGS`), detection is skipped and `get` returns `true`. Otherwise the
//! first call caches the answer in an [`AtomicU8`][`core::sync::atomic::AtomicU8`].

#[cfg(not(miri))]
#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(miri)]
mod miri;
#[cfg(not(miri))]
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod x86;

#[cfg(not(any(target_arch = "aarch64", target_arch = "x86", target_arch = "x86_64")))]
compile_error!("this thing only works on `aarch64`, `x86` and `x86_64` targets.");

/// Create a module containing the CPU feature detection code.
#[macro_export]
macro_rules! detect {
    ($name:ident, $($tf:tt),+$(,)?) => {
        #[allow(unused, clippy::missing_const_for_fn, clippy::inline_always)]
        mod $name {
            use core::sync::atomic::{AtomicU8, Ordering::Relaxed};
            const UNINIT: u8 = 255;
            static FEATURES: AtomicU8 = AtomicU8::new(UNINIT);
            #[derive(Debug, Clone, Copy)]
            pub struct Features(());
            impl Features {
                /// get the initialized value
                #[inline(always)]
                pub fn get(&self) -> bool {
                    $crate::__unless! {
                        $($tf),+ => {
                            FEATURES.load(Relaxed) == 1
                        }
                    }
                }
            }
            /// initialize the underlying value if needed and return it
            #[inline]
            pub fn get() -> bool {
                $crate::__unless! {
                    $($tf),+ => {
                        let val = FEATURES.load(Relaxed);
                        if val == UNINIT {
                            let res = $crate::__detect!($($tf),+);
                            FEATURES.store(u8::from(res), Relaxed);
                            res
                        } else {
                            val == 1
                        }
                    }
                }
            }
            /// initialize the underlying value if needed and return a ZST that
            /// can skip this step on subsequent calls to [`get`][Features::get]
            #[inline]
            pub fn init() -> Features {
                let _ = get();
                Features(())
            }
        }
    };
}

#[cfg(all(test, not(miri), target_arch = "x86_64"))]
mod tests {
    crate::detect!(sse2, "sse2");
    crate::detect!(avx512, "avx512f", "avx512vl");

    #[test]
    fn baseline_is_present() {
        assert!(sse2::init().get());
    }

    #[test]
    fn cached_answer_is_stable() {
        let first = avx512::get();
        assert_eq!(avx512::get(), first);
        assert_eq!(avx512::init().get(), first);
    }
}
