//! SHA-256 compression over several independent messages at once.
//!
//! State and message words are held lane-minor (`[[u32; W]; 8]`) so every
//! step of a round is the same operation applied across `W` lanes, which is
//! the shape the autovectorizer wants. Lanes advance in lockstep: each call
//! compresses `n` blocks into every lane. A lane whose message slice runs
//! out before `n` keeps compressing a zero block into its own state, which
//! is how an idle lane is padded.

use crate::{
    consts::K,
    soft::{big_sigma0, big_sigma1, ch, maj, small_sigma0, small_sigma1},
    Block,
};

/// Compresses `n` blocks per lane. `states` and `msgs` are indexed by lane.
pub type LanesFn = fn(states: &mut [[u32; 8]], msgs: &[&[Block]], n: usize);

static ZERO: Block = [0; 64];

/// Kernel for a lane width in `{1, 2, 4, 8, 16}`.
#[must_use]
pub const fn lanes_fn(width: usize) -> Option<LanesFn> {
    match width {
        1 => Some(compress_lanes::<1>),
        2 => Some(compress_lanes::<2>),
        4 => Some(compress_lanes::<4>),
        8 => Some(compress_lanes::<8>),
        16 => Some(compress_lanes::<16>),
        _ => None,
    }
}

#[allow(clippy::needless_range_loop)]
fn load<const W: usize>(msgs: &[&[Block]], i: usize) -> [[u32; W]; 16] {
    let mut w = [[0u32; W]; 16];
    for l in 0..W {
        let block = msgs.get(l).and_then(|m| m.get(i)).unwrap_or(&ZERO);
        for (t, chunk) in block.chunks_exact(4).enumerate() {
            w[t][l] = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
    }
    w
}

#[allow(clippy::needless_range_loop, clippy::many_single_char_names)]
#[inline(always)]
fn compress_block<const W: usize>(state: &mut [[u32; W]; 8], block: &[[u32; W]; 16]) {
    let mut w = [[0u32; W]; 64];
    w[..16].copy_from_slice(block);
    for t in 16..64 {
        for l in 0..W {
            w[t][l] = small_sigma1(w[t - 2][l])
                .wrapping_add(w[t - 7][l])
                .wrapping_add(small_sigma0(w[t - 15][l]))
                .wrapping_add(w[t - 16][l]);
        }
    }
    let mut v = *state;
    for t in 0..64 {
        for l in 0..W {
            let [a, b, c, d, e, f, g, h] = [
                v[0][l], v[1][l], v[2][l], v[3][l], v[4][l], v[5][l], v[6][l], v[7][l],
            ];
            let t1 = h
                .wrapping_add(big_sigma1(e))
                .wrapping_add(ch(e, f, g))
                .wrapping_add(K[t])
                .wrapping_add(w[t][l]);
            let t2 = big_sigma0(a).wrapping_add(maj(a, b, c));
            v[7][l] = g;
            v[6][l] = f;
            v[5][l] = e;
            v[4][l] = d.wrapping_add(t1);
            v[3][l] = c;
            v[2][l] = b;
            v[1][l] = a;
            v[0][l] = t1.wrapping_add(t2);
        }
    }
    for (s, v) in state.iter_mut().zip(v.iter()) {
        for (s, v) in s.iter_mut().zip(v.iter()) {
            *s = s.wrapping_add(*v);
        }
    }
}

fn compress_lanes<const W: usize>(states: &mut [[u32; 8]], msgs: &[&[Block]], n: usize) {
    debug_assert!(states.len() <= W);
    let mut soa = [[0u32; W]; 8];
    for (l, s) in states.iter().enumerate() {
        for (word, v) in soa.iter_mut().zip(s) {
            word[l] = *v;
        }
    }
    for i in 0..n {
        compress_block(&mut soa, &load::<W>(msgs, i));
    }
    for (l, s) in states.iter_mut().enumerate() {
        for (v, word) in s.iter_mut().zip(soa.iter()) {
            *v = word[l];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::lanes_fn;
    use crate::{consts::H256, soft::compress, Block};

    fn message(seed: u8, blocks: usize) -> [Block; 4] {
        let mut out = [[0; 64]; 4];
        for (i, b) in out.iter_mut().take(blocks).flatten().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let i = i as u8;
            *b = seed.wrapping_mul(31).wrapping_add(i);
        }
        out
    }

    #[test]
    fn every_width_matches_single_stream() {
        for width in [1, 2, 4, 8, 16] {
            let kernel = lanes_fn(width).unwrap();
            let msgs: [[Block; 4]; 16] = core::array::from_fn(|l| {
                #[allow(clippy::cast_possible_truncation)]
                message(l as u8, 4)
            });
            let mut states = [H256; 16];
            let slices: [&[Block]; 16] = core::array::from_fn(|l| &msgs[l][..3]);
            kernel(&mut states[..width], &slices[..width], 3);
            for l in 0..width {
                let mut expected = H256;
                compress(&mut expected, &msgs[l][..3]);
                assert_eq!(states[l], expected, "width {width} lane {l}");
            }
        }
    }

    #[test]
    fn short_lane_is_padded_without_touching_siblings() {
        let kernel = lanes_fn(4).unwrap();
        let a = message(1, 2);
        let b = message(2, 2);
        let mut states = [H256; 4];
        let slices: [&[Block]; 4] = [&a[..2], &[], &b[..2], &[]];
        kernel(&mut states, &slices, 2);
        let mut expected = H256;
        compress(&mut expected, &a[..2]);
        assert_eq!(states[0], expected);
        let mut expected = H256;
        compress(&mut expected, &b[..2]);
        assert_eq!(states[2], expected);
        assert_ne!(states[1], H256);
    }

    #[test]
    fn unsupported_width() {
        assert!(lanes_fn(3).is_none());
        assert!(lanes_fn(32).is_none());
    }
}
