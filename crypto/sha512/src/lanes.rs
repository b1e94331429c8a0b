//! SHA-512 compression across lanes, laid out the same way as the SHA-256
//! lane kernel: lane-minor words, lockstep blocks, zero-block padding for
//! lanes with nothing left to hash.

use crate::{
    consts::K,
    soft::{big_sigma0, big_sigma1, ch, load_word, maj, small_sigma0, small_sigma1},
    Block,
};

pub type LanesFn = fn(states: &mut [[u64; 8]], msgs: &[&[Block]], n: usize);

static ZERO: Block = [0; 128];

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
fn load<const W: usize>(msgs: &[&[Block]], i: usize) -> [[u64; W]; 16] {
    let mut w = [[0u64; W]; 16];
    for l in 0..W {
        let block = msgs.get(l).and_then(|m| m.get(i)).unwrap_or(&ZERO);
        for (t, chunk) in block.chunks_exact(8).enumerate() {
            w[t][l] = load_word(chunk);
        }
    }
    w
}

#[allow(clippy::needless_range_loop, clippy::many_single_char_names)]
#[inline(always)]
fn compress_block<const W: usize>(state: &mut [[u64; W]; 8], block: &[[u64; W]; 16]) {
    let mut w = [[0u64; W]; 80];
    w[..16].copy_from_slice(block);
    for t in 16..80 {
        for l in 0..W {
            w[t][l] = small_sigma1(w[t - 2][l])
                .wrapping_add(w[t - 7][l])
                .wrapping_add(small_sigma0(w[t - 15][l]))
                .wrapping_add(w[t - 16][l]);
        }
    }
    let mut v = *state;
    for t in 0..80 {
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

fn compress_lanes<const W: usize>(states: &mut [[u64; 8]], msgs: &[&[Block]], n: usize) {
    debug_assert!(states.len() <= W);
    let mut soa = [[0u64; W]; 8];
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
    use crate::{consts::H512, soft::compress, Block};

    #[test]
    fn lanes_match_single_stream_with_uneven_lengths() {
        let kernel = lanes_fn(8).unwrap();
        let msgs: [[Block; 2]; 8] = core::array::from_fn(|l| {
            core::array::from_fn(|b| {
                core::array::from_fn(|i| {
                    #[allow(clippy::cast_possible_truncation)]
                    let x = (l * 131 + b * 17 + i) as u8;
                    x
                })
            })
        });
        let mut states = [H512; 8];
        let mut slices: [&[Block]; 8] = core::array::from_fn(|l| &msgs[l][..]);
        slices[5] = &[];
        kernel(&mut states, &slices, 2);
        for l in (0..8).filter(|&l| l != 5) {
            let mut expected = H512;
            compress(&mut expected, &msgs[l]);
            assert_eq!(states[l], expected, "lane {l}");
        }
    }
}
