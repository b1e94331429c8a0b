//! Keystream generation for several independent (key, nonce, counter)
//! states at once. Words are stored lane-minor, as in the SHA-2 lane
//! kernels, and every lane produces `n` blocks per call. A lane whose output
//! slice is shorter than `n` still runs; its extra blocks are dropped.

use crate::{Block, ROUNDS};

pub type LanesFn = fn(states: &mut [[u32; 16]], ks: &mut [&mut [Block]], n: usize);

#[must_use]
pub const fn lanes_fn(width: usize) -> Option<LanesFn> {
    match width {
        1 => Some(keystream_lanes::<1>),
        2 => Some(keystream_lanes::<2>),
        4 => Some(keystream_lanes::<4>),
        8 => Some(keystream_lanes::<8>),
        16 => Some(keystream_lanes::<16>),
        _ => None,
    }
}

#[inline(always)]
#[allow(clippy::needless_range_loop)]
fn quarter_round<const W: usize>(x: &mut [[u32; W]; 16], a: usize, b: usize, c: usize, d: usize) {
    for l in 0..W {
        x[a][l] = x[a][l].wrapping_add(x[b][l]);
        x[d][l] = (x[d][l] ^ x[a][l]).rotate_left(16);
        x[c][l] = x[c][l].wrapping_add(x[d][l]);
        x[b][l] = (x[b][l] ^ x[c][l]).rotate_left(12);
        x[a][l] = x[a][l].wrapping_add(x[b][l]);
        x[d][l] = (x[d][l] ^ x[a][l]).rotate_left(8);
        x[c][l] = x[c][l].wrapping_add(x[d][l]);
        x[b][l] = (x[b][l] ^ x[c][l]).rotate_left(7);
    }
}

fn keystream_lanes<const W: usize>(states: &mut [[u32; 16]], ks: &mut [&mut [Block]], n: usize) {
    debug_assert!(states.len() <= W);
    let mut soa = [[0u32; W]; 16];
    for (l, s) in states.iter().enumerate() {
        for (word, v) in soa.iter_mut().zip(s) {
            word[l] = *v;
        }
    }
    for i in 0..n {
        let mut x = soa;
        for _ in 0..ROUNDS {
            quarter_round(&mut x, 0, 4, 8, 12);
            quarter_round(&mut x, 1, 5, 9, 13);
            quarter_round(&mut x, 2, 6, 10, 14);
            quarter_round(&mut x, 3, 7, 11, 15);
            quarter_round(&mut x, 0, 5, 10, 15);
            quarter_round(&mut x, 1, 6, 11, 12);
            quarter_round(&mut x, 2, 7, 8, 13);
            quarter_round(&mut x, 3, 4, 9, 14);
        }
        for (l, out) in ks.iter_mut().enumerate().take(W) {
            let Some(out) = out.get_mut(i) else {
                continue;
            };
            for ((chunk, x), s) in out.chunks_exact_mut(4).zip(&x).zip(&soa) {
                chunk.copy_from_slice(&x[l].wrapping_add(s[l]).to_le_bytes());
            }
        }
        for c in &mut soa[12] {
            *c = c.wrapping_add(1);
        }
    }
    for (l, s) in states.iter_mut().enumerate() {
        for (v, word) in s.iter_mut().zip(soa.iter()) {
            *v = word[l];
        }
    }
}
