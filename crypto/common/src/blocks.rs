use crate::erase::Erase;

pub type Block<const N: usize> = [u8; N];

/// Splits `data` into whole `N`-byte blocks and the trailing remainder.
#[inline(always)]
#[must_use]
pub const fn split_blocks<const N: usize>(data: &[u8]) -> (&[Block<N>], &[u8]) {
    let nb = data.len() / N;
    let blocks_len = nb * N;
    let tail_len = data.len() - blocks_len;
    // `Block<N>` has an alignment of 1 and `blocks_len <= data.len()`.
    unsafe {
        let blocks_ptr = data.as_ptr().cast::<Block<N>>();
        let tail_ptr = data.as_ptr().add(blocks_len);
        (
            core::slice::from_raw_parts(blocks_ptr, nb),
            core::slice::from_raw_parts(tail_ptr, tail_len),
        )
    }
}

/// The last one or two blocks of a SHA-2 style message: leftover bytes, the
/// `0x80` marker, zero fill and the big-endian bit length in the final
/// `N / 8` bytes.
///
/// Built up front so that a lane can walk a message as a plain sequence of
/// blocks without knowing where the caller's buffer ends.
#[allow(missing_copy_implementations)]
#[derive(Clone)]
pub struct Tail<const N: usize> {
    blocks: [Block<N>; 2],
    count: u8,
}

impl<const N: usize> Tail<N> {
    const LEN_BYTES: usize = N / 8;

    /// `rem` must be shorter than a block. `msg_len` is the length in bytes
    /// of everything hashed so far, `rem` included.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(rem: &[u8], msg_len: u128) -> Self {
        debug_assert!(rem.len() < N);
        let mut blocks = [[0; N]; 2];
        let n = rem.len();
        blocks[0][..n].copy_from_slice(rem);
        blocks[0][n] = 0x80;
        let count = if N - n - 1 < Self::LEN_BYTES { 2 } else { 1 };
        let bit_len = msg_len.wrapping_mul(8).to_be_bytes();
        blocks[count - 1][N - Self::LEN_BYTES..]
            .copy_from_slice(&bit_len[16 - Self::LEN_BYTES..]);
        Self {
            blocks,
            count: count as u8,
        }
    }

    #[inline(always)]
    #[must_use]
    pub fn blocks(&self) -> &[Block<N>] {
        &self.blocks[..usize::from(self.count)]
    }

    #[inline(always)]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count as usize
    }

    #[inline(always)]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl<const N: usize> core::fmt::Debug for Tail<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tail").field("count", &self.count).finish_non_exhaustive()
    }
}

/// Streaming input buffer holding less than one block.
#[allow(missing_copy_implementations)]
#[derive(Debug, Clone)]
pub struct Buffer<const N: usize> {
    buffer: Block<N>,
    pos: u8,
}

impl<const N: usize> Default for Buffer<N> {
    fn default() -> Self {
        Self {
            buffer: [0; N],
            pos: 0,
        }
    }
}

impl<const N: usize> Buffer<N> {
    /// Feeds `input`, handing every completed block to `compress`.
    #[inline]
    pub fn digest_blocks(&mut self, mut input: &[u8], mut compress: impl FnMut(&[Block<N>])) {
        let pos = self.get_pos();
        let rem = N - pos;
        let n = input.len();
        if n < rem {
            self.buffer[pos..][..n].copy_from_slice(input);
            self.set_pos(pos + n);
            return;
        }
        if pos != 0 {
            let (left, right) = input.split_at(rem);
            input = right;
            self.buffer[pos..].copy_from_slice(left);
            compress(core::slice::from_ref(&self.buffer));
        }
        let (blocks, left) = split_blocks::<N>(input);
        if !blocks.is_empty() {
            compress(blocks);
        }
        let n = left.len();
        self.buffer[..n].copy_from_slice(left);
        self.set_pos(n);
    }

    /// Pads what is buffered into a [`Tail`] and empties the buffer.
    #[inline]
    #[must_use]
    pub fn finish(&mut self, msg_len: u128) -> Tail<N> {
        let tail = Tail::new(&self.buffer[..self.get_pos()], msg_len);
        self.reset();
        tail
    }

    #[inline(always)]
    pub fn reset(&mut self) {
        self.set_pos(0);
    }

    #[inline(always)]
    #[must_use]
    pub fn get_pos(&self) -> usize {
        let pos = self.pos as usize;
        debug_assert!(pos < N);
        pos
    }

    #[inline(always)]
    #[allow(clippy::cast_possible_truncation)]
    fn set_pos(&mut self, pos: usize) {
        debug_assert!(pos < N);
        self.pos = pos as u8;
    }
}

impl<const N: usize> Erase for Buffer<N> {
    fn erase(&mut self) {
        self.buffer.erase();
        self.pos.erase();
    }
}

impl<const N: usize> Erase for Tail<N> {
    fn erase(&mut self) {
        self.blocks.erase();
        self.count.erase();
    }
}

#[cfg(test)]
mod tests {
    use super::{split_blocks, Buffer, Tail};

    #[test]
    fn short_tail_is_one_block() {
        let tail = Tail::<64>::new(b"abc", 3);
        assert_eq!(tail.len(), 1);
        let block = &tail.blocks()[0];
        assert_eq!(&block[..4], b"abc\x80");
        assert!(block[4..56].iter().all(|&b| b == 0));
        assert_eq!(&block[56..], &24u64.to_be_bytes());
    }

    #[test]
    fn long_tail_spills_into_second_block() {
        let rem = [0x61; 56];
        let tail = Tail::<64>::new(&rem, 56);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail.blocks()[0][56], 0x80);
        assert_eq!(&tail.blocks()[1][56..], &448u64.to_be_bytes());
    }

    #[test]
    fn wide_blocks_use_128_bit_length() {
        let tail = Tail::<128>::new(&[], 200);
        assert_eq!(tail.len(), 1);
        assert_eq!(&tail.blocks()[0][112..], &1600u128.to_be_bytes());
    }

    #[test]
    fn split_keeps_remainder() {
        let data = [7u8; 150];
        let (blocks, rem) = split_blocks::<64>(&data);
        assert_eq!(blocks.len(), 2);
        assert_eq!(rem.len(), 22);
    }

    #[test]
    fn buffer_matches_oneshot_tail() {
        let data = [0x5a; 100];
        let mut buffer = Buffer::<64>::default();
        let mut seen = 0;
        buffer.digest_blocks(&data[..10], |b| seen += b.len());
        buffer.digest_blocks(&data[10..], |b| seen += b.len());
        assert_eq!(seen, 1);
        let tail = buffer.finish(100);
        let (_, rem) = split_blocks::<64>(&data);
        assert_eq!(tail.blocks(), Tail::<64>::new(rem, 100).blocks());
        assert_eq!(buffer.get_pos(), 0);
    }
}
