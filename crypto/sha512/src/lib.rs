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

pub type Block = Block_<128>;
type Buffer = Buffer_<128>;

pub mod consts;
pub mod lanes;
mod soft;

pub use soft::compress;

pub const BLOCK_LEN: usize = 128;

#[allow(missing_copy_implementations)]
#[derive(Clone)]
struct Core {
    state: [u64; 8],
    block_len: u128,
}

impl Core {
    const fn new(iv: [u64; 8]) -> Self {
        Self {
            state: iv,
            block_len: 0,
        }
    }

    #[inline]
    fn update_blocks(&mut self, blocks: &[Block]) {
        self.block_len += blocks.len() as u128;
        compress(&mut self.state, blocks);
    }

    #[inline]
    fn finalize(&mut self, buffer: &mut Buffer, out: &mut [u8]) {
        let msg_len = self.block_len * 128 + buffer.get_pos() as u128;
        let tail = buffer.finish(msg_len);
        compress(&mut self.state, tail.blocks());
        for (chunk, v) in out.chunks_mut(8).zip(self.state.iter()) {
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

hasher!(Sha512, consts::H512, 64);
hasher!(Sha384, consts::H384, 48);
