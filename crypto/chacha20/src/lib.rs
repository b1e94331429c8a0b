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

//! ChaCha20 as profiled in RFC 8439: 256-bit key, 96-bit nonce, 32-bit block
//! counter.

use crypto_common::{blocks::Block as Block_, erase::Erase};

pub mod lanes;

pub type Block = Block_<64>;
pub type Key = [u8; KEY_SIZE];
pub type Nonce = [u8; NONCE_SIZE];

const ROUNDS: usize = 10;
pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;
pub const BLOCK_SIZE: usize = 64;

/// Longest message a single (key, nonce) pair can cover.
pub const MAX_MESSAGE_LEN: u64 = 1 << 38;

const CONSTANTS: [u32; 4] = [0x6170_7865, 0x3320_646e, 0x7962_2d32, 0x6b20_6574];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error;

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("chacha20: keystream exhausted")
    }
}

/// Builds the 16-word input block for `counter`.
#[must_use]
pub fn init_state(key: &Key, nonce: &Nonce, counter: u32) -> [u32; 16] {
    let mut state = [0; 16];
    state[..4].copy_from_slice(&CONSTANTS);
    for (val, chunk) in state[4..12].iter_mut().zip(key.chunks_exact(4)) {
        *val = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    state[12] = counter;
    for (val, chunk) in state[13..16].iter_mut().zip(nonce.chunks_exact(4)) {
        *val = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    state
}

#[inline(always)]
const fn quarter_round(a: usize, b: usize, c: usize, d: usize, state: &mut [u32; 16]) {
    state[a] = state[a].wrapping_add(state[b]);
    state[d] ^= state[a];
    state[d] = state[d].rotate_left(16);
    state[c] = state[c].wrapping_add(state[d]);
    state[b] ^= state[c];
    state[b] = state[b].rotate_left(12);
    state[a] = state[a].wrapping_add(state[b]);
    state[d] ^= state[a];
    state[d] = state[d].rotate_left(8);
    state[c] = state[c].wrapping_add(state[d]);
    state[b] ^= state[c];
    state[b] = state[b].rotate_left(7);
}

/// One keystream block for the counter held in `state[12]`.
#[must_use]
pub fn keystream_block(state: &[u32; 16]) -> Block {
    let mut x = *state;
    for _ in 0..ROUNDS {
        quarter_round(0, 4, 8, 12, &mut x);
        quarter_round(1, 5, 9, 13, &mut x);
        quarter_round(2, 6, 10, 14, &mut x);
        quarter_round(3, 7, 11, 15, &mut x);
        quarter_round(0, 5, 10, 15, &mut x);
        quarter_round(1, 6, 11, 12, &mut x);
        quarter_round(2, 7, 8, 13, &mut x);
        quarter_round(3, 4, 9, 14, &mut x);
    }
    let mut out = [0; BLOCK_SIZE];
    for ((chunk, x), s) in out.chunks_exact_mut(4).zip(x).zip(state) {
        chunk.copy_from_slice(&x.wrapping_add(*s).to_le_bytes());
    }
    out
}

/// Streaming cipher with the block counter starting at zero.
pub struct ChaCha20 {
    state: [u32; 16],
    buffer: Block,
    pos: u8,
    exhausted: bool,
}

impl ChaCha20 {
    #[inline]
    #[must_use]
    pub fn new(key: &Key, nonce: &Nonce) -> Self {
        Self::with_counter(key, nonce, 0)
    }

    #[inline]
    #[must_use]
    pub fn with_counter(key: &Key, nonce: &Nonce, counter: u32) -> Self {
        Self {
            state: init_state(key, nonce, counter),
            buffer: [0; BLOCK_SIZE],
            pos: 64,
            exhausted: false,
        }
    }

    fn refill(&mut self) -> Result<(), Error> {
        if self.exhausted {
            return Err(Error);
        }
        self.buffer = keystream_block(&self.state);
        self.pos = 0;
        match self.state[12].checked_add(1) {
            Some(c) => self.state[12] = c,
            None => self.exhausted = true,
        }
        Ok(())
    }

    /// XORs keystream into `buf`. Nothing is written if the keystream would
    /// run out partway.
    pub fn try_apply_keystream(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        let buffered = usize::from(64 - self.pos);
        let needed = buf.len().saturating_sub(buffered).div_ceil(BLOCK_SIZE) as u64;
        let left = if self.exhausted {
            0
        } else {
            u64::from(u32::MAX - self.state[12]) + 1
        };
        if needed > left {
            return Err(Error);
        }
        for byte in buf {
            if self.pos == 64 {
                self.refill()?;
            }
            *byte ^= self.buffer[usize::from(self.pos)];
            self.pos += 1;
        }
        Ok(())
    }

    /// # Panics
    /// If the end of the keystream would be reached, this panics without
    /// modifying the buffer.
    pub fn apply_keystream(&mut self, buf: &mut [u8]) {
        if let Err(e) = self.try_apply_keystream(buf) {
            panic!("{e}");
        }
    }
}

impl Drop for ChaCha20 {
    fn drop(&mut self) {
        self.state.erase();
        self.buffer.erase();
    }
}

impl core::fmt::Debug for ChaCha20 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("ChaCha20")
    }
}

#[cfg(test)]
mod tests {
    use super::{init_state, keystream_block, ChaCha20};

    const ZERO_BLOCK: &str = "76b8e0ada0f13d90405d6ae55386bd28bdd219b8a08ded1aa836efcc8b770dc7\
                              da41597c5157488d7724e03fb8d84a376a43b8f41518a11cc387b669b2ee6586";

    #[test]
    fn zero_key_block_zero() {
        let ks = keystream_block(&init_state(&[0; 32], &[0; 12], 0));
        assert_eq!(hex::encode(ks), ZERO_BLOCK);
    }

    #[test]
    fn streaming_splits_agree() {
        let key = [0x42; 32];
        let nonce = [7; 12];
        let mut whole = [0u8; 200];
        ChaCha20::new(&key, &nonce).apply_keystream(&mut whole);
        for split in [1, 63, 64, 65, 130] {
            let mut parts = [0u8; 200];
            let mut c = ChaCha20::new(&key, &nonce);
            let (a, b) = parts.split_at_mut(split);
            c.apply_keystream(a);
            c.apply_keystream(b);
            assert_eq!(parts, whole, "split {split}");
        }
    }

    #[test]
    fn counter_exhaustion_is_an_error() {
        let mut c = ChaCha20::with_counter(&[1; 32], &[2; 12], u32::MAX);
        let mut buf = [0u8; 65];
        assert!(c.try_apply_keystream(&mut buf).is_err());
        assert_eq!(buf, [0; 65]);
        assert!(c.try_apply_keystream(&mut buf[..64]).is_ok());
        assert!(c.try_apply_keystream(&mut buf[..1]).is_err());
    }
}
