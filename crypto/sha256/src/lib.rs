#![no_std]
#![deny(
    dead_code,
    deprecated,
    future_incompatible,
    missing_debug_implementations,
    nonstandard_style,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unused,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::inline_always)]

use core::fmt::Debug;
use crypto_common::{
    blocks::{Block as Block_, Buffer as Buffer_},
    erase::Erase,
};

pub type Block = Block_<64>;
type Buffer = Buffer_<64>;

pub mod consts;
pub mod lanes;
mod soft;

pub use soft::compress;

pub const BLOCK_LEN: usize = 64;

#[allow(missing_copy_implementations)]
#[derive(Clone)]
struct Core {
    state: [u32; 8],
    block_len: u64,
}

impl Core {
    const fn new(iv: [u32; 8]) -> Self {
        Self {
            state: iv,
            block_len: 0,
        }
    }

    #[inline]
    fn update_blocks(&mut self, blocks: &[Block]) {
        self.block_len += blocks.len() as u64;
        compress(&mut self.state, blocks);
    }

    #[inline]
    fn finalize(&mut self, buffer: &mut Buffer, out: &mut [u8]) {
        let msg_len = u128::from(self.block_len) * 64 + buffer.get_pos() as u128;
        let tail = buffer.finish(msg_len);
        compress(&mut self.state, tail.blocks());
        for (chunk, v) in out.chunks_mut(4).zip(self.state.iter()) {
            chunk.copy_from_slice(&v.to_be_bytes()[..chunk.len()]);
        }
    }
}

impl Erase for Core {
    fn erase(&mut self) {
        self.state.erase();
        self.block_len.erase();
    }
}

macro_rules! hasher {
    ($name:ident, $iv:expr, $len:expr) => {
        #[derive(Clone)]
        pub struct $name {
            core: Core,
            buffer: Buffer,
        }

        impl Default for $name {
            #[inline]
            fn default() -> Self {
                Self {
                    core: Core::new($iv),
                    buffer: Buffer::default(),
                }
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(concat!(stringify!($name), " { ... }"))
            }
        }

        impl Erase for $name {
            fn erase(&mut self) {
                self.core.erase();
                self.buffer.erase();
            }
        }

        impl $name {
            pub const OUTPUT_LEN: usize = $len;

            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            #[inline]
            pub fn update(&mut self, input: &[u8]) {
                let Self { core, buffer } = self;
                buffer.digest_blocks(input, |blocks| core.update_blocks(blocks));
            }

            #[inline]
            pub fn finalize(&mut self) -> [u8; $len] {
                let mut out = [0; $len];
                let Self { core, buffer } = self;
                core.finalize(buffer, &mut out);
                out
            }

            #[inline]
            #[must_use]
            pub fn digest(data: &[u8]) -> [u8; $len] {
                let mut hasher = Self::new();
                hasher.update(data);
                hasher.finalize()
            }
        }
    };
}

hasher!(Sha256, consts::H256, 32);
hasher!(Sha224, consts::H224, 28);

#[cfg(test)]
mod tests {
    use super::{Sha224, Sha256};
    use sha2::Digest;

    #[test]
    fn abc() {
        assert_eq!(
            hex::encode(Sha256::digest(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            hex::encode(Sha224::digest(b"abc")),
            "23097d223405d8228642a477bda255b32aadbce4bda0b3f7e36c9da7"
        );
    }

    #[test]
    fn streaming_matches_reference() {
        let data: [u8; 300] = core::array::from_fn(|i| {
            #[allow(clippy::cast_possible_truncation)]
            let b = (i * 7) as u8;
            b
        });
        for split in [0, 1, 55, 56, 63, 64, 65, 128, 299, 300] {
            let mut h = Sha256::new();
            h.update(&data[..split]);
            h.update(&data[split..]);
            assert_eq!(h.finalize()[..], sha2::Sha256::digest(data)[..]);
        }
        for len in [0, 55, 56, 64, 119, 120, 300] {
            assert_eq!(
                Sha224::digest(&data[..len])[..],
                sha2::Sha224::digest(&data[..len])[..]
            );
        }
    }
}
