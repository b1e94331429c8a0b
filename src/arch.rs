//! CPU capability query and the per-architecture lane layout.
//!
//! The architecture is picked once when a manager is built and never
//! re-dispatched afterwards. Every architecture runs the same portable
//! lane kernels; what changes is how many lanes each engine gets.

use crate::{error::ErrorCode, job::Family};
use std::fmt::{Debug, Display};

/// Capability flags, one bit each.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Features(u64);

macro_rules! features {
    ($($name:ident = $bit:expr, $text:expr;)+) => {
        impl Features {
            $(pub const $name: Self = Self(1 << $bit);)+

            const NAMES: &'static [(Self, &'static str)] = &[$((Self::$name, $text)),+];
        }
    };
}

features! {
    SHANI = 0, "shani";
    AESNI = 1, "aesni";
    PCLMULQDQ = 2, "pclmulqdq";
    SSE4_2 = 3, "sse4.2";
    AVX = 4, "avx";
    AVX2 = 5, "avx2";
    AVX512F = 6, "avx512f";
    AVX512DQ = 7, "avx512dq";
    AVX512CD = 8, "avx512cd";
    AVX512BW = 9, "avx512bw";
    AVX512VL = 10, "avx512vl";
    VAES = 11, "vaes";
    VPCLMULQDQ = 12, "vpclmulqdq";
    GFNI = 13, "gfni";
    AVX512_IFMA = 14, "avx512ifma";
    BMI2 = 15, "bmi2";
    SAFE_DATA = 16, "safe-data";
    SAFE_PARAM = 17, "safe-param";
    SELF_TEST = 18, "self-test";
    SELF_TEST_PASS = 19, "self-test-pass";
}

impl Features {
    pub const AVX512_SKX: Self = Self(
        Self::AVX512F.0 | Self::AVX512DQ.0 | Self::AVX512CD.0 | Self::AVX512BW.0 | Self::AVX512VL.0,
    );

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMES
            .iter()
            .filter(move |(f, _)| self.contains(*f))
            .map(|(_, name)| *name)
    }
}

impl core::ops::BitOr for Features {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl core::ops::BitOrAssign for Features {
    fn bitor_assign(&mut self, rhs: Self) {
        self.insert(rhs);
    }
}

impl Debug for Features {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

impl Display for Features {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, name) in self.names().enumerate() {
            if i != 0 {
                f.write_str(" ")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod cpuid {
    target_features::detect!(shani, "sha");
    target_features::detect!(aesni, "aes");
    target_features::detect!(pclmulqdq, "pclmulqdq");
    target_features::detect!(sse42, "sse4.2");
    target_features::detect!(avx, "avx");
    target_features::detect!(avx2, "avx2");
    target_features::detect!(avx512f, "avx512f");
    target_features::detect!(avx512dq, "avx512dq");
    target_features::detect!(avx512cd, "avx512cd");
    target_features::detect!(avx512bw, "avx512bw");
    target_features::detect!(avx512vl, "avx512vl");
    target_features::detect!(vaes, "vaes");
    target_features::detect!(vpclmulqdq, "vpclmulqdq");
    target_features::detect!(gfni, "gfni");
    target_features::detect!(avx512ifma, "avx512ifma");
    target_features::detect!(bmi2, "bmi2");

    pub fn features() -> super::Features {
        use super::Features as F;
        [
            (shani::get(), F::SHANI),
            (aesni::get(), F::AESNI),
            (pclmulqdq::get(), F::PCLMULQDQ),
            (sse42::get(), F::SSE4_2),
            (avx::get(), F::AVX),
            (avx2::get(), F::AVX2),
            (avx512f::get(), F::AVX512F),
            (avx512dq::get(), F::AVX512DQ),
            (avx512cd::get(), F::AVX512CD),
            (avx512bw::get(), F::AVX512BW),
            (avx512vl::get(), F::AVX512VL),
            (vaes::get(), F::VAES),
            (vpclmulqdq::get(), F::VPCLMULQDQ),
            (gfni::get(), F::GFNI),
            (avx512ifma::get(), F::AVX512_IFMA),
            (bmi2::get(), F::BMI2),
        ]
        .into_iter()
        .filter(|(present, _)| *present)
        .fold(F::empty(), |acc, (_, f)| acc | f)
    }
}

#[cfg(target_arch = "aarch64")]
mod cpuid {
    target_features::detect!(aes, "aes");
    target_features::detect!(pmull, "pmull");
    target_features::detect!(sha2, "sha2");

    // closest x86 equivalents
    pub fn features() -> super::Features {
        use super::Features as F;
        let mut f = F::empty();
        if aes::get() {
            f |= F::AESNI;
        }
        if pmull::get() {
            f |= F::PCLMULQDQ;
        }
        if sha2::get() {
            f |= F::SHANI;
        }
        f
    }
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
mod cpuid {
    pub const fn features() -> super::Features {
        super::Features::empty()
    }
}

/// Features of the running CPU, plus the build-time guarantees every
/// manager gives: lane state is scrubbed on retirement and checked submits
/// validate their parameters.
#[must_use]
pub fn features() -> Features {
    cpuid::features() | Features::SAFE_DATA | Features::SAFE_PARAM
}

/// Instruction-set tier a manager is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Arch {
    NoAesni,
    Sse,
    Avx,
    Avx2,
    Avx512,
}

/// Lane count of each engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lanes {
    pub sha256: usize,
    pub sha512: usize,
    pub chacha20: usize,
}

impl Lanes {
    #[must_use]
    pub const fn uniform(width: usize) -> Self {
        Self {
            sha256: width,
            sha512: width,
            chacha20: width,
        }
    }

    #[must_use]
    pub const fn get(self, family: Family) -> usize {
        match family {
            Family::Sha256 => self.sha256,
            Family::Sha512 => self.sha512,
            Family::Chacha20 => self.chacha20,
        }
    }
}

pub const WIDTHS: [usize; 5] = [1, 2, 4, 8, 16];

impl Arch {
    pub const ALL: [Self; 5] = [Self::NoAesni, Self::Sse, Self::Avx, Self::Avx2, Self::Avx512];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoAesni => "no-aesni",
            Self::Sse => "sse",
            Self::Avx => "avx",
            Self::Avx2 => "avx2",
            Self::Avx512 => "avx512",
        }
    }

    #[must_use]
    pub const fn required(self) -> Features {
        let sse = Features::SSE4_2.union(Features::AESNI).union(Features::PCLMULQDQ);
        let avx = sse.union(Features::AVX);
        let avx2 = avx.union(Features::AVX2).union(Features::BMI2);
        match self {
            Self::NoAesni => Features::empty(),
            Self::Sse => sse,
            Self::Avx => avx,
            Self::Avx2 => avx2,
            Self::Avx512 => avx2.union(Features::AVX512_SKX),
        }
    }

    #[must_use]
    pub const fn supported_by(self, features: Features) -> bool {
        features.contains(self.required())
    }

    #[must_use]
    pub const fn lanes(self) -> Lanes {
        match self {
            Self::NoAesni | Self::Sse | Self::Avx => Lanes {
                sha256: 4,
                sha512: 2,
                chacha20: 4,
            },
            Self::Avx2 => Lanes {
                sha256: 8,
                sha512: 4,
                chacha20: 8,
            },
            Self::Avx512 => Lanes {
                sha256: 16,
                sha512: 8,
                chacha20: 16,
            },
        }
    }

    /// Best tier the given features allow.
    #[must_use]
    pub fn best_for(features: Features) -> Self {
        Self::ALL
            .into_iter()
            .rev()
            .find(|a| a.supported_by(features))
            .unwrap_or(Self::NoAesni)
    }
}

impl Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Arch {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

/// The tier a manager picks when none is forced.
#[must_use]
pub fn detect() -> Arch {
    Arch::best_for(features())
}

/// Compression and keystream kernels for one set of lane widths, resolved
/// once so engines never branch on width per round.
#[derive(Clone, Copy)]
pub(crate) struct Kernels {
    pub sha256: sha256::lanes::LanesFn,
    pub sha512: sha512::lanes::LanesFn,
    pub chacha20: chacha20::lanes::LanesFn,
}

impl Kernels {
    pub fn for_lanes(lanes: Lanes) -> Result<Self, ErrorCode> {
        Ok(Self {
            sha256: sha256::lanes::lanes_fn(lanes.sha256).ok_or(ErrorCode::InvalidWidth)?,
            sha512: sha512::lanes::lanes_fn(lanes.sha512).ok_or(ErrorCode::InvalidWidth)?,
            chacha20: chacha20::lanes::lanes_fn(lanes.chacha20).ok_or(ErrorCode::InvalidWidth)?,
        })
    }
}

impl Debug for Kernels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Kernels { ... }")
    }
}
